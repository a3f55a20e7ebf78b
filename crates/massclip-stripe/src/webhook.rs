//! Webhook signature verification and event decoding.
//!
//! The `Stripe-Signature` header looks like `t=1700000000,v1=<hex>,v1=<hex>`.
//! The signed payload is `{t}.{raw body}` under HMAC-SHA256 with the
//! endpoint secret. Any matching `v1` entry is accepted.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use crate::error::{StripeError, StripeResult};
use crate::types::{CheckoutSession, Invoice, Subscription};

type HmacSha256 = Hmac<Sha256>;

/// Decoded event payload for the types the backend acts on.
#[derive(Debug, Clone)]
pub enum EventKind {
    CheckoutSessionCompleted(CheckoutSession),
    InvoicePaymentSucceeded(Invoice),
    SubscriptionDeleted(Subscription),
    /// Acknowledged but not acted on
    Unhandled,
}

#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub id: String,
    pub event_type: String,
    /// Unix seconds
    pub created: i64,
    /// Connected account the event originated from
    pub account: Option<String>,
    pub kind: EventKind,
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    created: i64,
    #[serde(default)]
    account: Option<String>,
    data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Verify a signature header against the raw payload.
///
/// `now` is unix seconds; timestamps further than `tolerance_secs` from it
/// are rejected.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> StripeResult<()> {
    if secret.is_empty() {
        return Err(StripeError::config("webhook secret not configured"));
    }

    let mut timestamp: Option<i64> = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| StripeError::signature("missing timestamp"))?;
    if signatures.is_empty() {
        return Err(StripeError::signature("missing v1 signature"));
    }
    if (now - timestamp).abs() > tolerance_secs {
        return Err(StripeError::signature("timestamp outside tolerance"));
    }

    let mut signed = Vec::with_capacity(payload.len() + 12);
    signed.extend_from_slice(timestamp.to_string().as_bytes());
    signed.push(b'.');
    signed.extend_from_slice(payload);

    for candidate in signatures {
        let Some(sig_bytes) = decode_hex(candidate) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| StripeError::signature(format!("invalid secret: {}", e)))?;
        mac.update(&signed);
        if mac.verify_slice(&sig_bytes).is_ok() {
            return Ok(());
        }
    }

    Err(StripeError::signature("no matching signature"))
}

/// Decode an already-verified payload.
pub fn parse_event(payload: &[u8]) -> StripeResult<WebhookEvent> {
    let raw: RawEvent =
        serde_json::from_slice(payload).map_err(|e| StripeError::Payload(e.to_string()))?;

    let object = raw.data.object;
    let kind = match raw.event_type.as_str() {
        "checkout.session.completed" => EventKind::CheckoutSessionCompleted(decode(object)?),
        "invoice.payment_succeeded" => EventKind::InvoicePaymentSucceeded(decode(object)?),
        "customer.subscription.deleted" => EventKind::SubscriptionDeleted(decode(object)?),
        other => {
            debug!(event_type = other, "unhandled webhook event type");
            EventKind::Unhandled
        }
    };

    Ok(WebhookEvent {
        id: raw.id,
        event_type: raw.event_type,
        created: raw.created,
        account: raw.account,
        kind,
    })
}

fn decode<T: serde::de::DeserializeOwned>(object: serde_json::Value) -> StripeResult<T> {
    serde_json::from_value(object).map_err(|e| StripeError::Payload(e.to_string()))
}

/// Verify then decode.
pub fn construct_event(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
) -> StripeResult<WebhookEvent> {
    let now = chrono::Utc::now().timestamp();
    verify_signature(payload, header, secret, tolerance_secs, now)?;
    parse_event(payload)
}

#[cfg(test)]
pub(crate) fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let hex: String = mac
        .finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();
    format!("t={},v1={}", timestamp, hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    fn completed_payload() -> Vec<u8> {
        serde_json::json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "created": 1_700_000_000,
            "data": { "object": {
                "id": "cs_test_1",
                "payment_status": "paid",
                "amount_total": 999,
                "currency": "usd",
                "metadata": { "productBoxId": "b1", "buyerUid": "u1" }
            }}
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_valid_signature_is_accepted() {
        let payload = completed_payload();
        let header = sign(&payload, SECRET, 1_700_000_000);
        assert!(verify_signature(&payload, &header, SECRET, 300, 1_700_000_100).is_ok());
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let payload = completed_payload();
        let header = sign(&payload, SECRET, 1_700_000_000);
        let mut tampered = payload.clone();
        tampered.push(b' ');
        let err = verify_signature(&tampered, &header, SECRET, 300, 1_700_000_000).unwrap_err();
        assert!(matches!(err, StripeError::Signature(_)));
    }

    #[test]
    fn test_stale_timestamp_is_rejected() {
        let payload = completed_payload();
        let header = sign(&payload, SECRET, 1_700_000_000);
        assert!(verify_signature(&payload, &header, SECRET, 300, 1_700_000_301).is_err());
    }

    #[test]
    fn test_wrong_secret_and_malformed_header() {
        let payload = completed_payload();
        let header = sign(&payload, "whsec_other", 1_700_000_000);
        assert!(verify_signature(&payload, &header, SECRET, 300, 1_700_000_000).is_err());
        assert!(verify_signature(&payload, "garbage", SECRET, 300, 1_700_000_000).is_err());
        assert!(verify_signature(&payload, "t=1700000000,v1=zz", SECRET, 300, 1_700_000_000)
            .is_err());
    }

    #[test]
    fn test_any_matching_v1_entry_passes() {
        let payload = completed_payload();
        let good = sign(&payload, SECRET, 1_700_000_000);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t=1700000000,v1={},v1={}", "00".repeat(32), good_sig);
        assert!(verify_signature(&payload, &header, SECRET, 300, 1_700_000_000).is_ok());
    }

    #[test]
    fn test_parse_checkout_completed() {
        let event = parse_event(&completed_payload()).unwrap();
        assert_eq!(event.id, "evt_1");
        match event.kind {
            EventKind::CheckoutSessionCompleted(session) => {
                assert!(session.is_paid());
                assert_eq!(session.metadata_value("productBoxId"), Some("b1"));
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_unhandled() {
        let payload = br#"{"id":"evt_2","type":"charge.refunded","data":{"object":{}}}"#;
        let event = parse_event(payload).unwrap();
        assert!(matches!(event.kind, EventKind::Unhandled));
        assert!(parse_event(b"not json").is_err());
    }
}
