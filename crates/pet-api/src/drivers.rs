//! # Payment Driver Configuration
//!
//! Loads `[drivers.<name>]` blocks from the payment TOML file and registers
//! the driver classes this binary ships with.
//!
//! ```toml
//! default = "liqpay"
//!
//! [drivers.liqpay]
//! class = "liqpay"
//! public_key = "${LIQPAY_PUBLIC_KEY}"
//! private_key = "${LIQPAY_PRIVATE_KEY}"
//! callback_url = "${BASE_URL}/api/payments/liqpay/callback"
//! ```
//!
//! Without a file, drivers are assembled from whichever provider
//! credentials are present in the environment.

use crate::state::AppConfig;
use pet_core::{DriverRegistry, DriverSettings, PaymentSettings};
use pet_liqpay::LiqPayDriver;
use pet_stripe::StripeDriver;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Errors loading the payment configuration file
#[derive(Debug, Error)]
pub enum PaymentConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("environment variable {name} referenced by driver '{driver}' is not set")]
    MissingVar { driver: String, name: String },

    #[error("unterminated ${{...}} in driver '{driver}' setting '{key}'")]
    Unterminated { driver: String, key: String },
}

/// Registry with every driver class this binary knows about
pub fn build_registry(settings: PaymentSettings) -> DriverRegistry {
    DriverRegistry::new(settings)
        .with_class("liqpay", LiqPayDriver::factory)
        .with_class("stripe", StripeDriver::factory)
}

/// Payment settings from the configured file, or from the environment when
/// the file does not exist
pub fn load_payment_settings(config: &AppConfig) -> Result<PaymentSettings, PaymentConfigError> {
    let path = &config.payment_config;
    let lookup = |name: &str| match std::env::var(name) {
        Ok(value) => Some(value),
        Err(_) if name == "BASE_URL" => Some(config.base_url.clone()),
        Err(_) => None,
    };

    match std::fs::read_to_string(path) {
        Ok(content) => {
            let settings = parse_payment_settings(path, &content, lookup)?;
            info!(
                "Loaded {} payment driver(s) from {}",
                settings.drivers.len(),
                path.display()
            );
            Ok(settings)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("No payment config at {}, using environment", path.display());
            Ok(settings_from_env(&config.base_url, lookup))
        }
        Err(source) => Err(PaymentConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Parse a payment TOML document, expanding `${VAR}` references
pub fn parse_payment_settings(
    path: &Path,
    content: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<PaymentSettings, PaymentConfigError> {
    let mut settings: PaymentSettings =
        toml::from_str(content).map_err(|source| PaymentConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    for (driver, block) in settings.drivers.iter_mut() {
        for (key, value) in block.settings.iter_mut() {
            *value = expand_vars(value, &lookup).map_err(|e| match e {
                Expansion::Missing(name) => PaymentConfigError::MissingVar {
                    driver: driver.clone(),
                    name,
                },
                Expansion::Unterminated => PaymentConfigError::Unterminated {
                    driver: driver.clone(),
                    key: key.clone(),
                },
            })?;
        }
    }

    Ok(settings)
}

enum Expansion {
    Missing(String),
    Unterminated,
}

fn expand_vars(value: &str, lookup: &impl Fn(&str) -> Option<String>) -> Result<String, Expansion> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or(Expansion::Unterminated)?;
        let name = &after[..end];
        let resolved = lookup(name).ok_or_else(|| Expansion::Missing(name.to_string()))?;
        out.push_str(&resolved);
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Driver blocks for providers whose credentials are in the environment
pub fn settings_from_env(base_url: &str, lookup: impl Fn(&str) -> Option<String>) -> PaymentSettings {
    let base = base_url.trim_end_matches('/');
    let var = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let mut settings = PaymentSettings::default();

    if let (Some(public_key), Some(private_key)) = (var("LIQPAY_PUBLIC_KEY"), var("LIQPAY_PRIVATE_KEY")) {
        let mut block = DriverSettings::new("liqpay")
            .with("public_key", public_key)
            .with("private_key", private_key)
            .with("callback_url", format!("{base}/api/payments/liqpay/callback"))
            .with("result_url", format!("{base}/payments/result"));
        if let Some(sandbox) = var("LIQPAY_SANDBOX") {
            block = block.with("sandbox", sandbox);
        }
        settings = settings.with_driver("liqpay", block);
    }

    if let (Some(secret_key), Some(webhook_secret)) = (var("STRIPE_SECRET_KEY"), var("STRIPE_WEBHOOK_SECRET")) {
        settings = settings.with_driver(
            "stripe",
            DriverSettings::new("stripe")
                .with("secret_key", secret_key)
                .with("webhook_secret", webhook_secret)
                .with("success_url", format!("{base}/payments/result"))
                .with("cancel_url", format!("{base}/payments/cancel")),
        );
    }

    let default = var("PAYMENT_DEFAULT_DRIVER")
        .or_else(|| settings.drivers.keys().find(|name| *name == "liqpay").cloned())
        .or_else(|| settings.drivers.keys().next().cloned());
    if let Some(default) = default {
        settings = settings.with_default(default);
    }

    settings
}
