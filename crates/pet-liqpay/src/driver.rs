//! # LiqPay Driver
//!
//! Builds signed checkout forms and authenticates LiqPay server callbacks.

use crate::config::LiqPayConfig;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use pet_core::signature::constant_time_eq;
use pet_core::{
    BoxedPaymentDriver, CallbackOutcome, Currency, DriverSettings, OrderId, PaymentDriver,
    PaymentError, PaymentRequest, PaymentResult, PaymentStatus, ProviderPayload, RawCallback,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

const API_VERSION: u8 = 3;

/// LiqPay checkout driver
pub struct LiqPayDriver {
    config: LiqPayConfig,
}

impl LiqPayDriver {
    pub fn new(config: LiqPayConfig) -> Self {
        Self { config }
    }

    /// Create from a driver settings block
    pub fn from_settings(settings: &DriverSettings) -> PaymentResult<Self> {
        Ok(Self::new(LiqPayConfig::from_settings(settings)?))
    }

    /// Registry factory for the `liqpay` class
    pub fn factory(settings: &DriverSettings) -> PaymentResult<BoxedPaymentDriver> {
        Ok(Arc::new(Self::from_settings(settings)?))
    }

    pub fn config(&self) -> &LiqPayConfig {
        &self.config
    }

    /// Base64 JSON `data` field for a payment
    fn encode_params(&self, request: &PaymentRequest) -> PaymentResult<String> {
        let params = CheckoutParams {
            version: API_VERSION,
            public_key: self.config.public_key.clone(),
            action: "pay".to_string(),
            amount: request.amount,
            currency: request.currency,
            description: request.description.clone(),
            order_id: request.order_id.to_string(),
            server_url: self.config.callback_url.clone(),
            result_url: self.config.result_url.clone(),
            sandbox: self.config.sandbox.then_some(1),
        };

        let json = serde_json::to_vec(&params)
            .map_err(|e| PaymentError::Serialization(format!("Failed to encode LiqPay params: {}", e)))?;
        Ok(STANDARD.encode(json))
    }
}

#[async_trait]
impl PaymentDriver for LiqPayDriver {
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn create_payment(&self, request: &PaymentRequest) -> PaymentResult<ProviderPayload> {
        let data = self.encode_params(request)?;
        let signature = self.generate_signature(&data);

        debug!(amount = %request.amount, currency = %request.currency, "Built LiqPay checkout form");

        let mut fields = BTreeMap::new();
        fields.insert("data".to_string(), data);
        fields.insert("signature".to_string(), signature);

        Ok(ProviderPayload::Form {
            action: self.config.checkout_url.clone(),
            method: "POST".to_string(),
            data: fields,
        })
    }

    fn verify_signature(&self, payload: &str, signature: &str) -> bool {
        constant_time_eq(&self.generate_signature(payload), signature)
    }

    fn generate_signature(&self, payload: &str) -> String {
        let mut hasher = Sha1::new();
        hasher.update(self.config.private_key.as_bytes());
        hasher.update(payload.as_bytes());
        hasher.update(self.config.private_key.as_bytes());
        STANDARD.encode(hasher.finalize())
    }

    #[instrument(skip(self, callback))]
    fn handle_callback(&self, callback: &RawCallback) -> PaymentResult<CallbackOutcome> {
        let data = callback
            .field("data")
            .ok_or_else(|| PaymentError::MalformedCallback("missing 'data' field".to_string()))?;
        let signature = callback.field("signature").ok_or_else(|| {
            PaymentError::SignatureVerification("missing 'signature' field".to_string())
        })?;

        if !self.verify_signature(data, signature) {
            warn!("LiqPay callback signature mismatch");
            return Err(PaymentError::SignatureVerification(
                "Signature mismatch".to_string(),
            ));
        }

        let decoded = STANDARD
            .decode(data)
            .map_err(|e| PaymentError::MalformedCallback(format!("data is not base64: {}", e)))?;
        let raw: serde_json::Value = serde_json::from_slice(&decoded)
            .map_err(|e| PaymentError::MalformedCallback(format!("data is not JSON: {}", e)))?;
        let notification: CallbackData = serde_json::from_value(raw.clone())
            .map_err(|e| PaymentError::MalformedCallback(format!("unexpected callback shape: {}", e)))?;

        let order_id = OrderId::parse(&notification.order_id)
            .map_err(|_| PaymentError::MalformedCallback("invalid order_id".to_string()))?;
        let payment_status = map_status(&notification.status);

        debug!(
            order_id = %order_id,
            liqpay_status = %notification.status,
            status = %payment_status,
            "Verified LiqPay callback"
        );

        Ok(CallbackOutcome {
            order_id,
            payment_status,
            raw,
        })
    }

    fn driver_name(&self) -> &'static str {
        "liqpay"
    }
}

/// LiqPay status → local status. Unknown values are intermediate states
/// (e.g. `wait_secure`, `processing`) and leave the order pending.
fn map_status(status: &str) -> PaymentStatus {
    match status {
        "success" | "sandbox" => PaymentStatus::Success,
        "failure" | "error" => PaymentStatus::Fail,
        "reversed" => PaymentStatus::Refund,
        "unsubscribed" => PaymentStatus::Cancel,
        _ => PaymentStatus::Pending,
    }
}

// =============================================================================
// LiqPay API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct CheckoutParams {
    version: u8,
    public_key: String,
    action: String,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    currency: Currency,
    description: String,
    order_id: String,
    server_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sandbox: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct CallbackData {
    order_id: String,
    status: String,
}
