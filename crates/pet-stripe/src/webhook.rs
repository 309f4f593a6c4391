//! # Stripe Webhook Handling
//!
//! Signature checks for the `Stripe-Signature` header and the mapping from
//! Stripe event types to order payment statuses.

use hmac::{Hmac, Mac};
use pet_core::signature::constant_time_eq;
use pet_core::{PaymentError, PaymentResult, PaymentStatus};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed webhook, in seconds
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Events that should be enabled in Stripe Dashboard for order reconciliation
pub const REQUIRED_WEBHOOK_EVENTS: &[&str] = &[
    "checkout.session.completed",
    "checkout.session.async_payment_succeeded",
    "checkout.session.async_payment_failed",
    "checkout.session.expired",
    "charge.refunded",
];

/// A verified Stripe event, reduced to what reconciliation needs
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: i64,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Map<String, serde_json::Value>,
}

impl StripeEvent {
    pub fn parse(payload: &[u8]) -> PaymentResult<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| PaymentError::MalformedCallback(format!("Failed to parse webhook: {}", e)))
    }

    /// Local order id, from `metadata.order_id` or `client_reference_id`
    pub fn order_id(&self) -> Option<&str> {
        let object = &self.data.object;
        object
            .get("metadata")
            .and_then(|m| m.get("order_id"))
            .and_then(|v| v.as_str())
            .or_else(|| object.get("client_reference_id").and_then(|v| v.as_str()))
            .filter(|id| !id.is_empty())
    }

    /// Status this event implies for the order. Unhandled event types are
    /// progress notifications and leave the order pending.
    pub fn payment_status(&self) -> PaymentStatus {
        match self.event_type.as_str() {
            "checkout.session.completed" => {
                let paid = self
                    .data
                    .object
                    .get("payment_status")
                    .and_then(|v| v.as_str())
                    == Some("paid");
                if paid {
                    PaymentStatus::Success
                } else {
                    PaymentStatus::Pending
                }
            }
            "checkout.session.async_payment_succeeded" => PaymentStatus::Success,
            "checkout.session.async_payment_failed" => PaymentStatus::Fail,
            "checkout.session.expired" => PaymentStatus::Expired,
            "charge.refunded" => PaymentStatus::Refund,
            other => {
                debug!("Unhandled webhook event: {}", other);
                PaymentStatus::Pending
            }
        }
    }
}

// =============================================================================
// Webhook Signature Verification
// =============================================================================

pub(crate) struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<String>,
}

pub(crate) fn parse_signature_header(header: &str) -> PaymentResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => signatures.push(value.to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        PaymentError::SignatureVerification("Missing timestamp in signature".to_string())
    })?;

    if signatures.is_empty() {
        return Err(PaymentError::SignatureVerification(
            "No v1 signature found".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

pub(crate) fn compute_hmac_sha256(secret: &str, message: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(message.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Check a `Stripe-Signature` header against `payload` as of `now`
pub(crate) fn verify_header(secret: &str, payload: &str, header: &str, now: i64) -> PaymentResult<()> {
    let parts = parse_signature_header(header)?;

    let within_tolerance = now
        .checked_sub(parts.timestamp)
        .is_some_and(|age| age.unsigned_abs() <= SIGNATURE_TOLERANCE_SECS.unsigned_abs());
    if !within_tolerance {
        return Err(PaymentError::SignatureVerification(
            "Timestamp outside tolerance".to_string(),
        ));
    }

    let expected = compute_hmac_sha256(secret, &format!("{}.{}", parts.timestamp, payload))
        .ok_or_else(|| PaymentError::SignatureVerification("Unusable signing secret".to_string()))?;

    if parts.signatures.iter().any(|sig| constant_time_eq(sig, &expected)) {
        Ok(())
    } else {
        Err(PaymentError::SignatureVerification(
            "Signature mismatch".to_string(),
        ))
    }
}

/// Build a `Stripe-Signature` header for `payload` at `timestamp`
pub(crate) fn sign_header(secret: &str, payload: &str, timestamp: i64) -> String {
    let signature = compute_hmac_sha256(secret, &format!("{}.{}", timestamp, payload)).unwrap_or_default();
    format!("t={},v1={}", timestamp, signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(event_type: &str, object: serde_json::Value) -> StripeEvent {
        let payload = json!({
            "id": "evt_test",
            "type": event_type,
            "created": 1_700_000_000,
            "data": { "object": object }
        });
        StripeEvent::parse(payload.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_signature_header() {
        let header = "t=1234567890,v1=abc123,v1=def456";
        let parsed = parse_signature_header(header).unwrap();

        assert_eq!(parsed.timestamp, 1234567890);
        assert_eq!(parsed.signatures.len(), 2);
        assert_eq!(parsed.signatures[0], "abc123");

        assert!(parse_signature_header("v1=abc").is_err());
        assert!(parse_signature_header("t=123").is_err());
        assert!(parse_signature_header("garbage").is_err());
    }

    #[test]
    fn test_hmac_sha256() {
        let sig = compute_hmac_sha256("whsec_test", "1234567890.{}").unwrap();

        // Should produce a 64-character hex string
        assert_eq!(sig.len(), 64);
    }

    #[test]
    fn test_sign_then_verify() {
        let header = sign_header("whsec_test", r#"{"id":"evt_1"}"#, 1_700_000_000);
        assert!(verify_header("whsec_test", r#"{"id":"evt_1"}"#, &header, 1_700_000_100).is_ok());

        // Body changed
        assert!(verify_header("whsec_test", r#"{"id":"evt_2"}"#, &header, 1_700_000_100).is_err());
        // Wrong secret
        assert!(verify_header("whsec_other", r#"{"id":"evt_1"}"#, &header, 1_700_000_100).is_err());
        // Too old
        assert!(verify_header("whsec_test", r#"{"id":"evt_1"}"#, &header, 1_700_000_301).is_err());
    }

    #[test]
    fn test_extreme_timestamps_are_rejected() {
        let payload = r#"{"id":"evt_1"}"#;
        let now = 1_700_000_000;

        for timestamp in [i64::MIN, i64::MAX, -1] {
            let header = sign_header("whsec_test", payload, timestamp);
            let err = verify_header("whsec_test", payload, &header, now).unwrap_err();
            assert!(matches!(err, PaymentError::SignatureVerification(_)));
        }

        let header = format!("t={},v1={}", i64::MIN, "0".repeat(64));
        assert!(verify_header("whsec_test", payload, &header, i64::MAX).is_err());
    }

    #[test]
    fn test_event_status_mapping() {
        let paid = json!({ "payment_status": "paid", "client_reference_id": "ORD-1" });
        let unpaid = json!({ "payment_status": "unpaid", "client_reference_id": "ORD-1" });

        assert_eq!(event("checkout.session.completed", paid).payment_status(), PaymentStatus::Success);
        assert_eq!(event("checkout.session.completed", unpaid).payment_status(), PaymentStatus::Pending);
        assert_eq!(
            event("checkout.session.async_payment_succeeded", json!({})).payment_status(),
            PaymentStatus::Success
        );
        assert_eq!(
            event("checkout.session.async_payment_failed", json!({})).payment_status(),
            PaymentStatus::Fail
        );
        assert_eq!(event("checkout.session.expired", json!({})).payment_status(), PaymentStatus::Expired);
        assert_eq!(event("charge.refunded", json!({})).payment_status(), PaymentStatus::Refund);
        assert_eq!(event("invoice.paid", json!({})).payment_status(), PaymentStatus::Pending);
    }

    #[test]
    fn test_every_required_event_settles_the_order() {
        let object = json!({ "payment_status": "paid", "client_reference_id": "ORD-1" });
        for event_type in REQUIRED_WEBHOOK_EVENTS {
            let status = event(event_type, object.clone()).payment_status();
            assert_ne!(status, PaymentStatus::Pending, "{event_type} is not mapped");
        }
    }

    #[test]
    fn test_order_id_sources() {
        let from_metadata = event(
            "checkout.session.completed",
            json!({ "metadata": { "order_id": "ORD-META" }, "client_reference_id": "ORD-REF" }),
        );
        assert_eq!(from_metadata.order_id(), Some("ORD-META"));

        let from_reference = event("checkout.session.completed", json!({ "client_reference_id": "ORD-REF" }));
        assert_eq!(from_reference.order_id(), Some("ORD-REF"));

        let none = event("charge.refunded", json!({ "metadata": {} }));
        assert_eq!(none.order_id(), None);
    }
}
