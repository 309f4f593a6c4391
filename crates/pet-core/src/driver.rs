//! # Payment Driver Trait
//!
//! Uniform interface over payment providers. A driver is stateless per
//! call: it builds what the client needs to pay, authenticates callbacks
//! and normalizes them. It never touches local order state; that belongs
//! to the reconciler.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PaymentDriver (trait)                    │
//! │  ├── create_payment()                                       │
//! │  ├── verify_signature() / generate_signature()              │
//! │  ├── handle_callback()                                      │
//! │  └── driver_name()                                          │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                  ┌─────────┴─────────┐
//!                  │                   │
//!          ┌───────┴───────┐   ┌───────┴───────┐
//!          │ LiqPayDriver  │   │ StripeDriver  │
//!          └───────────────┘   └───────────────┘
//! ```

use crate::error::PaymentResult;
use crate::order::{Currency, Order, OrderId, PaymentStatus};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Parameters for initiating a payment at the provider
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub order_id: OrderId,
    pub amount: Decimal,
    pub currency: Currency,
    pub description: String,
}

impl PaymentRequest {
    pub fn for_order(order: &Order) -> Self {
        Self {
            order_id: order.order_id.clone(),
            amount: order.amount,
            currency: order.currency,
            description: order
                .description
                .clone()
                .unwrap_or_else(|| format!("Payment for Order #{}", order.order_id)),
        }
    }
}

/// What the client needs to complete payment at the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderPayload {
    /// Auto-submitting form posted to the provider
    Form {
        action: String,
        method: String,
        data: BTreeMap<String, String>,
    },
    /// Hosted checkout page
    Redirect { url: String, session_id: String },
}

/// An inbound provider notification, as received by the HTTP layer
#[derive(Debug, Clone, Default)]
pub struct RawCallback {
    /// Exact request body bytes
    pub body: Vec<u8>,
    /// Decoded form or top-level JSON string fields
    pub fields: HashMap<String, String>,
    /// Request headers, lower-cased names
    pub headers: HashMap<String, String>,
}

impl RawCallback {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A verified, provider-independent view of a callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackOutcome {
    pub order_id: OrderId,
    pub payment_status: PaymentStatus,
    /// Decoded provider data, kept for audit logging
    pub raw: serde_json::Value,
}

/// Contract every payment provider adapter satisfies
#[async_trait]
pub trait PaymentDriver: Send + Sync {
    /// Build the provider payload for a payment. Must not mutate orders.
    async fn create_payment(&self, request: &PaymentRequest) -> PaymentResult<ProviderPayload>;

    /// Constant-time check of `signature` against one recomputed from
    /// `payload`. Returns false, never panics, on malformed input.
    fn verify_signature(&self, payload: &str, signature: &str) -> bool;

    /// Compute the signature the provider would send for `payload`
    fn generate_signature(&self, payload: &str) -> String;

    /// Authenticate and normalize a callback. Verification happens before
    /// any field of the payload is trusted.
    fn handle_callback(&self, callback: &RawCallback) -> PaymentResult<CallbackOutcome>;

    /// Provider name (for logging and routing)
    fn driver_name(&self) -> &'static str;
}

/// Type alias for a shared driver (dynamic dispatch)
pub type BoxedPaymentDriver = Arc<dyn PaymentDriver>;
