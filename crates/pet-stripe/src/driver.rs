//! # Stripe Checkout Driver
//!
//! Creates Checkout Sessions for orders and turns signed webhook events
//! into callback outcomes.

use crate::config::StripeConfig;
use crate::webhook::{sign_header, verify_header, StripeEvent, REQUIRED_WEBHOOK_EVENTS};
use async_trait::async_trait;
use chrono::Utc;
use pet_core::{
    BoxedPaymentDriver, CallbackOutcome, DriverSettings, OrderId, PaymentDriver, PaymentError,
    PaymentRequest, PaymentResult, ProviderPayload, RawCallback,
};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Stripe Checkout Session driver
///
/// Uses Stripe's hosted checkout page for secure payments.
pub struct StripeDriver {
    config: StripeConfig,
    client: Client,
}

impl StripeDriver {
    /// Create a new Stripe driver
    pub fn new(config: StripeConfig) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PaymentError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            test_mode = config.is_test_mode(),
            webhook_events = ?REQUIRED_WEBHOOK_EVENTS,
            "Stripe driver configured"
        );
        Ok(Self { config, client })
    }

    /// Create from a driver settings block
    pub fn from_settings(settings: &DriverSettings) -> PaymentResult<Self> {
        Self::new(StripeConfig::from_settings(settings)?)
    }

    /// Registry factory for the `stripe` class
    pub fn factory(settings: &DriverSettings) -> PaymentResult<BoxedPaymentDriver> {
        Ok(Arc::new(Self::from_settings(settings)?))
    }

    /// Success URL carrying the order id back to the result page
    fn success_url(&self, order_id: &OrderId) -> String {
        let separator = if self.config.success_url.contains('?') { '&' } else { '?' };
        format!("{}{}orderId={}", self.config.success_url, separator, order_id)
    }

    /// Form parameters for a single-line-item payment session
    fn session_params(&self, request: &PaymentRequest, unit_amount: i64) -> Vec<(String, String)> {
        let order_id = request.order_id.to_string();
        vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), self.success_url(&request.order_id)),
            ("cancel_url".to_string(), self.config.cancel_url.clone()),
            ("client_reference_id".to_string(), order_id.clone()),
            ("metadata[order_id]".to_string(), order_id.clone()),
            // Refund events arrive as charges; the order id must ride along
            ("payment_intent_data[metadata][order_id]".to_string(), order_id),
            (
                "line_items[0][price_data][currency]".to_string(),
                request.currency.as_str().to_ascii_lowercase(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                unit_amount.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                request.description.clone(),
            ),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
        ]
    }
}

#[async_trait]
impl PaymentDriver for StripeDriver {
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn create_payment(&self, request: &PaymentRequest) -> PaymentResult<ProviderPayload> {
        let unit_amount = request
            .currency
            .to_minor_units(request.amount)
            .filter(|minor| *minor > 0)
            .ok_or_else(|| PaymentError::validation("amount", "amount is out of range"))?;

        debug!(unit_amount, currency = %request.currency, "Creating Stripe checkout session");

        let url = format!("{}/v1/checkout/sessions", self.config.api_base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .header("Idempotency-Key", request.order_id.as_str())
            .form(&self.session_params(request, unit_amount))
            .send()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::Network(e.to_string()))?;

        if !status.is_success() {
            error!("Stripe API error: status={}, body={}", status, body);

            // Parse Stripe error
            if let Ok(error_response) = serde_json::from_str::<StripeErrorResponse>(&body) {
                return Err(PaymentError::Provider {
                    provider: "stripe".to_string(),
                    message: error_response.error.message,
                });
            }

            return Err(PaymentError::Provider {
                provider: "stripe".to_string(),
                message: format!("HTTP {}: {}", status, body),
            });
        }

        let session: StripeCheckoutSessionResponse = serde_json::from_str(&body).map_err(|e| {
            PaymentError::Serialization(format!("Failed to parse Stripe response: {}", e))
        })?;

        info!("Created Stripe checkout session: id={}", session.id);

        Ok(ProviderPayload::Redirect {
            url: session.url,
            session_id: session.id,
        })
    }

    fn verify_signature(&self, payload: &str, signature: &str) -> bool {
        verify_header(&self.config.webhook_secret, payload, signature, Utc::now().timestamp()).is_ok()
    }

    fn generate_signature(&self, payload: &str) -> String {
        sign_header(&self.config.webhook_secret, payload, Utc::now().timestamp())
    }

    #[instrument(skip(self, callback))]
    fn handle_callback(&self, callback: &RawCallback) -> PaymentResult<CallbackOutcome> {
        let header = callback.header("stripe-signature").ok_or_else(|| {
            PaymentError::SignatureVerification("missing Stripe-Signature header".to_string())
        })?;

        if let Err(e) = verify_header(
            &self.config.webhook_secret,
            &callback.body_str(),
            header,
            Utc::now().timestamp(),
        ) {
            warn!(error = %e, "Stripe webhook rejected");
            return Err(e);
        }

        let raw: serde_json::Value = serde_json::from_slice(&callback.body)
            .map_err(|e| PaymentError::MalformedCallback(format!("Failed to parse webhook: {}", e)))?;
        let event = StripeEvent::parse(&callback.body)?;

        let order_id = event
            .order_id()
            .ok_or_else(|| {
                PaymentError::MalformedCallback(format!("{} event carries no order id", event.event_type))
            })
            .and_then(|id| {
                OrderId::parse(id)
                    .map_err(|_| PaymentError::MalformedCallback("invalid order id".to_string()))
            })?;
        let payment_status = event.payment_status();

        debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            status = %payment_status,
            "Verified Stripe webhook"
        );

        Ok(CallbackOutcome {
            order_id,
            payment_status,
            raw,
        })
    }

    fn driver_name(&self) -> &'static str {
        "stripe"
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeCheckoutSessionResponse {
    id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pet_core::{Currency, PaymentStatus};
    use rust_decimal::Decimal;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn driver(base_url: &str) -> StripeDriver {
        StripeDriver::new(
            StripeConfig::new("sk_test_abc", "whsec_test")
                .with_api_base_url(base_url)
                .with_success_url("https://vet.example/payments/result"),
        )
        .unwrap()
    }

    fn request() -> PaymentRequest {
        PaymentRequest {
            order_id: OrderId::from_trusted("ORD-1"),
            amount: Decimal::new(15050, 2),
            currency: Currency::EUR,
            description: "Payment for Order #ORD-1".to_string(),
        }
    }

    fn signed_callback(driver: &StripeDriver, body: serde_json::Value) -> RawCallback {
        let body = body.to_string();
        let mut callback = RawCallback {
            body: body.clone().into_bytes(),
            ..Default::default()
        };
        callback
            .headers
            .insert("stripe-signature".into(), driver.generate_signature(&body));
        callback
    }

    /// Every single-byte change to a valid signature must be refused
    fn assert_rejects_each_flipped_byte(driver: &dyn PaymentDriver, payload: &str) {
        let signature = driver.generate_signature(payload);
        assert!(driver.verify_signature(payload, &signature));

        for index in 0..signature.len() {
            let mut bytes = signature.clone().into_bytes();
            bytes[index] ^= 0x01;
            let tampered = String::from_utf8(bytes).unwrap();
            assert!(
                !driver.verify_signature(payload, &tampered),
                "flipped byte {index} still verified: {tampered}"
            );
        }

        let mut altered = payload.to_string();
        altered.push(' ');
        assert!(!driver.verify_signature(&altered, &signature));
        assert!(!driver.verify_signature(payload, ""));
    }

    #[test]
    fn test_tampered_signature_rejected_through_trait() {
        let driver = driver("http://localhost:1");
        let body = json!({ "id": "evt_1", "type": "checkout.session.completed" }).to_string();
        assert_rejects_each_flipped_byte(&driver, &body);
    }

    #[tokio::test]
    async fn test_create_payment_posts_checkout_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(header("Authorization", "Bearer sk_test_abc"))
            .and(header("Idempotency-Key", "ORD-1"))
            .and(body_string_contains("client_reference_id=ORD-1"))
            .and(body_string_contains("unit_amount%5D=15050"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_123",
                "url": "https://checkout.stripe.com/c/pay/cs_test_123"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let payload = driver(&server.uri()).create_payment(&request()).await.unwrap();
        assert_eq!(
            payload,
            ProviderPayload::Redirect {
                url: "https://checkout.stripe.com/c/pay/cs_test_123".into(),
                session_id: "cs_test_123".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_create_payment_surfaces_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "message": "Invalid currency", "type": "invalid_request_error" }
            })))
            .mount(&server)
            .await;

        let err = driver(&server.uri()).create_payment(&request()).await.unwrap_err();
        assert!(matches!(err, PaymentError::Provider { ref message, .. } if message == "Invalid currency"));
        assert_eq!(err.status_code(), 502);
    }

    #[test]
    fn test_success_url_carries_order_id() {
        let driver = driver("http://unused");
        assert_eq!(
            driver.success_url(&OrderId::from_trusted("ORD-1")),
            "https://vet.example/payments/result?orderId=ORD-1"
        );
    }

    #[test]
    fn test_handle_callback_verifies_then_maps() {
        let driver = driver("http://unused");
        let callback = signed_callback(
            &driver,
            json!({
                "id": "evt_1",
                "type": "checkout.session.completed",
                "created": 1_700_000_000,
                "data": { "object": { "payment_status": "paid", "metadata": { "order_id": "ORD-1" } } }
            }),
        );

        let outcome = driver.handle_callback(&callback).unwrap();
        assert_eq!(outcome.order_id.as_str(), "ORD-1");
        assert_eq!(outcome.payment_status, PaymentStatus::Success);
        assert_eq!(outcome.raw["id"], "evt_1");
    }

    #[test]
    fn test_handle_callback_rejects_bad_signatures() {
        let driver = driver("http://unused");
        let body = json!({ "id": "evt_1", "type": "charge.refunded", "data": { "object": {} } });

        let mut unsigned = RawCallback {
            body: body.to_string().into_bytes(),
            ..Default::default()
        };
        assert!(matches!(
            driver.handle_callback(&unsigned),
            Err(PaymentError::SignatureVerification(_))
        ));

        unsigned
            .headers
            .insert("stripe-signature".into(), format!("t={},v1=deadbeef", Utc::now().timestamp()));
        assert!(matches!(
            driver.handle_callback(&unsigned),
            Err(PaymentError::SignatureVerification(_))
        ));
    }

    #[test]
    fn test_handle_callback_without_order_id() {
        let driver = driver("http://unused");
        let callback = signed_callback(
            &driver,
            json!({ "id": "evt_1", "type": "charge.refunded", "data": { "object": { "metadata": {} } } }),
        );
        assert!(matches!(
            driver.handle_callback(&callback),
            Err(PaymentError::MalformedCallback(_))
        ));
    }
}
