//! # Stripe Configuration
//!
//! Configuration management for Stripe integration.
//! Secrets come from a `[drivers.<name>]` settings block.

use pet_core::{DriverSettings, PaymentError};

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";
const DEFAULT_API_VERSION: &str = "2024-12-18.acacia";

/// Stripe API configuration
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Secret API key (sk_test_... or sk_live_...)
    pub secret_key: String,

    /// Webhook signing secret (whsec_...)
    pub webhook_secret: String,

    /// Where Stripe sends the customer after paying; the order id is appended
    pub success_url: String,

    /// Where Stripe sends the customer on cancel
    pub cancel_url: String,

    /// API base URL (for testing/mocking)
    pub api_base_url: String,

    /// API version
    pub api_version: String,
}

impl StripeConfig {
    /// Build from a `[drivers.<name>]` block.
    ///
    /// Keys: `secret_key`, `webhook_secret`, `success_url`, `cancel_url`
    /// (required), `api_base_url`, `api_version` (optional).
    pub fn from_settings(settings: &DriverSettings) -> Result<Self, PaymentError> {
        let mut config = Self::new(
            settings.require("secret_key")?,
            settings.require("webhook_secret")?,
        )
        .with_success_url(settings.require("success_url")?)
        .with_cancel_url(settings.require("cancel_url")?);

        if let Some(url) = settings.get("api_base_url") {
            config.api_base_url = url.to_string();
        }
        if let Some(version) = settings.get("api_version") {
            config.api_version = version.to_string();
        }

        config.validate()?;
        Ok(config)
    }

    /// Create config with explicit values (for testing)
    pub fn new(secret_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            webhook_secret: webhook_secret.into(),
            success_url: "http://localhost:3000/payments/result".to_string(),
            cancel_url: "http://localhost:3000/payments/cancel".to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }

    /// Validate key formats
    pub fn validate(&self) -> Result<(), PaymentError> {
        if !self.secret_key.starts_with("sk_test_") && !self.secret_key.starts_with("sk_live_") {
            return Err(PaymentError::Configuration(
                "STRIPE_SECRET_KEY must start with sk_test_ or sk_live_".to_string(),
            ));
        }

        if !self.webhook_secret.starts_with("whsec_") {
            return Err(PaymentError::Configuration(
                "STRIPE_WEBHOOK_SECRET must start with whsec_".to_string(),
            ));
        }

        Ok(())
    }

    /// Check if using test keys
    pub fn is_test_mode(&self) -> bool {
        self.secret_key.starts_with("sk_test_")
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.secret_key)
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_success_url(mut self, url: impl Into<String>) -> Self {
        self.success_url = url.into();
        self
    }

    pub fn with_cancel_url(mut self, url: impl Into<String>) -> Self {
        self.cancel_url = url.into();
        self
    }
}
