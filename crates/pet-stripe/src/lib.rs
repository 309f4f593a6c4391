//! # pet-stripe
//!
//! Stripe payment driver for the petcare backend.
//!
//! Payments go through the Checkout Sessions API: the driver creates a
//! session for the order and hands back the hosted checkout URL. Stripe
//! reports the result through signed webhook events.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pet_stripe::StripeDriver;
//! use pet_core::{PaymentDriver, PaymentRequest};
//!
//! let driver = StripeDriver::from_settings(&settings)?;
//! let payload = driver.create_payment(&PaymentRequest::for_order(&order)).await?;
//!
//! // Redirect the user to the payload URL
//! ```
//!
//! ## Webhook Handling
//!
//! ```rust,ignore
//! // In your webhook endpoint, `raw` carries the exact body and headers:
//! let outcome = driver.handle_callback(&raw)?;
//! reconciler.apply_callback(&outcome).await?;
//! ```

pub mod config;
pub mod driver;
pub mod webhook;

// Re-exports
pub use config::StripeConfig;
pub use driver::StripeDriver;
pub use webhook::{StripeEvent, REQUIRED_WEBHOOK_EVENTS};
