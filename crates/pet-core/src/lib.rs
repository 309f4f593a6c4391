//! # pet-core
//!
//! Core types and ports for the petcare backend.
//!
//! This crate provides:
//! - `LocaleResolver` and `LanguageCatalog` for per-request locale selection
//! - `LocalePersistence` for writing the chosen locale back to session, cookie and profile
//! - `PaymentDriver` trait for implementing payment providers
//! - `DriverRegistry` for config-driven driver lookup
//! - `PaymentOrderReconciler` and `OrderStore` for the order lifecycle
//! - `PaymentError` / `LocaleError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use pet_core::{CreateOrder, PaymentRequest};
//!
//! // Pick the driver named by the request (or the configured default)
//! let (name, driver) = registry.resolve(Some("liqpay"))?;
//!
//! // Create a pending order and hand the client what it needs to pay
//! let order = reconciler.create_or_get_order(create).await?;
//! let payload = driver.create_payment(&PaymentRequest::for_order(&order)).await?;
//!
//! // Later, on the provider callback
//! let outcome = driver.handle_callback(&raw)?;
//! reconciler.apply_callback(&outcome).await?;
//! ```

pub mod catalog;
pub mod driver;
pub mod error;
pub mod locale;
pub mod order;
pub mod persistence;
pub mod principal;
pub mod reconciler;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod signature;
pub mod store;

// Re-exports for convenience
pub use catalog::{InMemoryLanguageStore, LanguageCatalog, LanguageEntry, LanguageStore};
pub use driver::{
    BoxedPaymentDriver, CallbackOutcome, PaymentDriver, PaymentRequest, ProviderPayload,
    RawCallback,
};
pub use error::{LocaleError, PaymentError, PaymentResult};
pub use locale::{localized_field, parse_accept_language, LocaleCode, SupportedLocale};
pub use order::{Currency, Order, OrderId, OrderUpdate, PaymentStatus, MAX_ORDER_AMOUNT};
pub use persistence::{LocaleCookie, LocaleEffects, LocalePersistence, LocaleTarget};
pub use principal::{Capability, InMemoryUserStore, Principal, Role, UserId, UserStore};
pub use reconciler::{CreateOrder, PaymentOrderReconciler};
pub use registry::{DriverRegistry, DriverSettings, PaymentSettings};
pub use resolver::{LocaleResolver, LocaleSignals, LocaleSource, ResolvedLocale, LOCALE_PARAM};
pub use session::{SessionData, DEFAULT_SESSION_TTL};
pub use store::{CasOutcome, InMemoryOrderStore, OrderStore};
