//! # Payment Driver Registry
//!
//! Resolves a configured driver name (e.g. "liqpay") to a driver instance.
//! Each `[drivers.<name>]` block names a `class`; the class selects a
//! factory registered by the application, and the remaining keys are
//! handed to that factory as settings. Instances are built on first use
//! and reused afterwards. Lookup never performs network calls.

use crate::driver::BoxedPaymentDriver;
use crate::error::{PaymentError, PaymentResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Top-level payment configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentSettings {
    /// Driver used when a request names none
    #[serde(default)]
    pub default: Option<String>,

    /// One block per driver name
    #[serde(default)]
    pub drivers: BTreeMap<String, DriverSettings>,
}

impl PaymentSettings {
    /// Builder: add a driver block
    pub fn with_driver(mut self, name: impl Into<String>, settings: DriverSettings) -> Self {
        self.drivers.insert(name.into(), settings);
        self
    }

    /// Builder: set the default driver
    pub fn with_default(mut self, name: impl Into<String>) -> Self {
        self.default = Some(name.into());
        self
    }
}

/// Configuration block for one driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverSettings {
    /// Implementation to instantiate (e.g. "liqpay", "stripe")
    pub class: String,

    /// Credentials and URLs, passed through to the driver factory
    #[serde(flatten)]
    pub settings: BTreeMap<String, String>,
}

impl DriverSettings {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            settings: BTreeMap::new(),
        }
    }

    /// Builder: add a setting
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Fetch a mandatory setting
    pub fn require(&self, key: &str) -> PaymentResult<&str> {
        self.get(key).ok_or_else(|| {
            PaymentError::Configuration(format!("{} driver requires '{}'", self.class, key))
        })
    }
}

/// Builds a driver from its settings block
pub type DriverFactory =
    Arc<dyn Fn(&DriverSettings) -> PaymentResult<BoxedPaymentDriver> + Send + Sync>;

struct DriverSlot {
    settings: DriverSettings,
    instance: OnceLock<BoxedPaymentDriver>,
}

/// Name → driver lookup over static configuration
pub struct DriverRegistry {
    factories: HashMap<String, DriverFactory>,
    slots: BTreeMap<String, DriverSlot>,
    default: Option<String>,
}

impl DriverRegistry {
    pub fn new(settings: PaymentSettings) -> Self {
        let slots = settings
            .drivers
            .into_iter()
            .map(|(name, settings)| {
                (
                    name.to_ascii_lowercase(),
                    DriverSlot {
                        settings,
                        instance: OnceLock::new(),
                    },
                )
            })
            .collect();

        Self {
            factories: HashMap::new(),
            slots,
            default: settings.default.map(|d| d.to_ascii_lowercase()),
        }
    }

    /// Register the factory for a driver class
    pub fn register_class<F>(&mut self, class: impl Into<String>, factory: F)
    where
        F: Fn(&DriverSettings) -> PaymentResult<BoxedPaymentDriver> + Send + Sync + 'static,
    {
        self.factories
            .insert(class.into().to_ascii_lowercase(), Arc::new(factory));
    }

    /// Register with builder pattern
    pub fn with_class<F>(mut self, class: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&DriverSettings) -> PaymentResult<BoxedPaymentDriver> + Send + Sync + 'static,
    {
        self.register_class(class, factory);
        self
    }

    /// Add an already constructed driver under `name`
    pub fn with_driver(mut self, name: impl Into<String>, driver: BoxedPaymentDriver) -> Self {
        let instance = OnceLock::new();
        let _ = instance.set(driver.clone());
        self.slots.insert(
            name.into().to_ascii_lowercase(),
            DriverSlot {
                settings: DriverSettings::new(driver.driver_name()),
                instance,
            },
        );
        self
    }

    /// Builder: set the default driver name
    pub fn with_default(mut self, name: impl Into<String>) -> Self {
        self.default = Some(name.into().to_ascii_lowercase());
        self
    }

    /// Look up (and on first use instantiate) the driver configured as `name`
    pub fn get_driver(&self, name: &str) -> PaymentResult<BoxedPaymentDriver> {
        let key = name.trim().to_ascii_lowercase();
        let slot = self
            .slots
            .get(&key)
            .ok_or_else(|| PaymentError::UnknownDriver {
                name: name.to_string(),
            })?;

        if let Some(driver) = slot.instance.get() {
            return Ok(driver.clone());
        }

        let factory = self
            .factories
            .get(&slot.settings.class.to_ascii_lowercase())
            .ok_or_else(|| {
                PaymentError::Configuration(format!(
                    "no implementation registered for driver class '{}'",
                    slot.settings.class
                ))
            })?;

        let driver = factory(&slot.settings)?;
        debug!(driver = %key, class = %slot.settings.class, "Instantiated payment driver");

        // A concurrent first lookup may have won; either instance is equivalent.
        let _ = slot.instance.set(driver.clone());
        Ok(slot.instance.get().cloned().unwrap_or(driver))
    }

    /// Driver for an optional request value, falling back to the default
    pub fn resolve(&self, requested: Option<&str>) -> PaymentResult<(String, BoxedPaymentDriver)> {
        let name = match requested.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_ascii_lowercase(),
            None => self.default.clone().ok_or_else(|| {
                PaymentError::validation("pay_system", "no payment system given and no default configured")
            })?,
        };
        let driver = self.get_driver(&name)?;
        Ok((name, driver))
    }

    pub fn default_driver_name(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// All configured driver names
    pub fn driver_names(&self) -> Vec<&str> {
        self.slots.keys().map(String::as_str).collect()
    }

    /// Instantiate every configured driver so configuration errors surface at startup
    pub fn validate(&self) -> PaymentResult<()> {
        if let Some(default) = &self.default {
            if !self.slots.contains_key(default) {
                return Err(PaymentError::Configuration(format!(
                    "default payment driver '{default}' is not configured"
                )));
            }
        }
        for name in self.slots.keys() {
            self.get_driver(name)?;
        }
        info!(drivers = ?self.driver_names(), "Payment drivers ready");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{CallbackOutcome, PaymentDriver, PaymentRequest, ProviderPayload, RawCallback};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullDriver;

    #[async_trait]
    impl PaymentDriver for NullDriver {
        async fn create_payment(&self, request: &PaymentRequest) -> PaymentResult<ProviderPayload> {
            Ok(ProviderPayload::Redirect {
                url: format!("https://pay.example/{}", request.order_id),
                session_id: request.order_id.to_string(),
            })
        }

        fn verify_signature(&self, _payload: &str, _signature: &str) -> bool {
            false
        }

        fn generate_signature(&self, _payload: &str) -> String {
            String::new()
        }

        fn handle_callback(&self, _callback: &RawCallback) -> PaymentResult<CallbackOutcome> {
            Err(PaymentError::MalformedCallback("unsupported".into()))
        }

        fn driver_name(&self) -> &'static str {
            "null"
        }
    }

    fn settings() -> PaymentSettings {
        PaymentSettings::default()
            .with_driver("Null", DriverSettings::new("null").with("api_key", "k"))
            .with_driver("orphan", DriverSettings::new("missing"))
            .with_default("null")
    }

    #[test]
    fn test_unknown_driver() {
        let registry = DriverRegistry::new(settings());
        assert!(matches!(
            registry.get_driver("paypal"),
            Err(PaymentError::UnknownDriver { .. })
        ));
    }

    #[test]
    fn test_class_without_factory_is_configuration_error() {
        let registry = DriverRegistry::new(settings());
        assert!(matches!(
            registry.get_driver("orphan"),
            Err(PaymentError::Configuration(_))
        ));
        assert!(registry.validate().is_err());
    }

    #[test]
    fn test_instances_are_cached() {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        let registry = DriverRegistry::new(settings()).with_class("null", move |s| {
            s.require("api_key")?;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NullDriver) as BoxedPaymentDriver)
        });

        let a = registry.get_driver("null").unwrap();
        let b = registry.get_driver("NULL").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let registry = DriverRegistry::new(PaymentSettings::default())
            .with_driver("null", Arc::new(NullDriver))
            .with_default("null");

        let (name, driver) = registry.resolve(None).unwrap();
        assert_eq!(name, "null");
        assert_eq!(driver.driver_name(), "null");
        assert!(registry.resolve(Some("  ")).is_ok());
        assert!(registry.validate().is_ok());

        let no_default = DriverRegistry::new(PaymentSettings::default());
        assert!(matches!(
            no_default.resolve(None),
            Err(PaymentError::Validation { .. })
        ));
    }

    #[test]
    fn test_missing_setting_reported() {
        let s = DriverSettings::new("liqpay").with("public_key", "");
        assert!(s.get("public_key").is_none());
        assert!(matches!(s.require("public_key"), Err(PaymentError::Configuration(_))));
    }

    #[test]
    fn test_settings_from_toml_shape() {
        let json = serde_json::json!({
            "default": "liqpay",
            "drivers": {
                "liqpay": { "class": "liqpay", "public_key": "pk", "private_key": "sk" }
            }
        });
        let parsed: PaymentSettings = serde_json::from_value(json).unwrap();
        let block = &parsed.drivers["liqpay"];
        assert_eq!(block.class, "liqpay");
        assert_eq!(block.get("private_key"), Some("sk"));
        assert!(!block.settings.contains_key("class"));
    }
}
