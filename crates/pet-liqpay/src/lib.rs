//! # pet-liqpay
//!
//! LiqPay payment driver for the petcare backend.
//!
//! LiqPay uses a client-side checkout: the server never calls the provider
//! to start a payment. Instead it hands the browser a form with two fields:
//!
//! - `data` - base64 of the JSON payment parameters
//! - `signature` - `base64(sha1(private_key + data + private_key))`
//!
//! The provider later posts the same two fields to `server_url`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pet_liqpay::LiqPayDriver;
//! use pet_core::{PaymentDriver, PaymentRequest};
//!
//! let driver = LiqPayDriver::from_settings(&settings)?;
//! let payload = driver.create_payment(&PaymentRequest::for_order(&order)).await?;
//!
//! // Render payload as an auto-submitting form
//! ```

pub mod config;
pub mod driver;

// Re-exports
pub use config::{LiqPayConfig, LIQPAY_CHECKOUT_URL};
pub use driver::LiqPayDriver;
