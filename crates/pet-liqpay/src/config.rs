//! # LiqPay Configuration
//!
//! Credentials and URLs for the LiqPay driver, read from a
//! `[drivers.<name>]` settings block.

use pet_core::{DriverSettings, PaymentError};

/// Hosted checkout endpoint the payment form posts to
pub const LIQPAY_CHECKOUT_URL: &str = "https://www.liqpay.ua/api/3/checkout";

/// LiqPay driver configuration
#[derive(Debug, Clone)]
pub struct LiqPayConfig {
    /// Merchant public key
    pub public_key: String,

    /// Merchant private key (signs forms and callbacks)
    pub private_key: String,

    /// Where LiqPay posts payment notifications (`server_url`)
    pub callback_url: String,

    /// Where the customer lands after paying
    pub result_url: Option<String>,

    /// Form action
    pub checkout_url: String,

    /// Ask LiqPay to process payments in test mode
    pub sandbox: bool,
}

impl LiqPayConfig {
    /// Create config with explicit values
    pub fn new(
        public_key: impl Into<String>,
        private_key: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: private_key.into(),
            callback_url: callback_url.into(),
            result_url: None,
            checkout_url: LIQPAY_CHECKOUT_URL.to_string(),
            sandbox: false,
        }
    }

    /// Build from a `[drivers.<name>]` block.
    ///
    /// Keys: `public_key`, `private_key`, `callback_url` (required),
    /// `result_url`, `checkout_url`, `sandbox` (optional).
    pub fn from_settings(settings: &DriverSettings) -> Result<Self, PaymentError> {
        let mut config = Self::new(
            settings.require("public_key")?,
            settings.require("private_key")?,
            settings.require("callback_url")?,
        );
        config.result_url = settings.get("result_url").map(String::from);
        if let Some(url) = settings.get("checkout_url") {
            config.checkout_url = url.to_string();
        }
        config.sandbox = settings.get("sandbox").map(is_truthy).unwrap_or(false);
        Ok(config)
    }

    /// Builder: set the result URL
    pub fn with_result_url(mut self, url: impl Into<String>) -> Self {
        self.result_url = Some(url.into());
        self
    }

    /// Builder: toggle sandbox mode
    pub fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
