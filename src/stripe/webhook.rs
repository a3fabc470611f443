// Stripe webhook signature verification. Works on the exact raw body bytes;
// any re-serialization upstream breaks the signature.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::errors::ServiceError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// A signed provider event, decoded only after the signature checks out
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

struct ParsedSignature {
    timestamp: i64,
    // The header may carry several v1 entries during secret rotation
    signatures: Vec<String>,
}

fn parse_header(header: &str) -> Option<ParsedSignature> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let mut it = part.trim().splitn(2, '=');
        match (it.next(), it.next()) {
            (Some("t"), Some(value)) => timestamp = value.parse::<i64>().ok(),
            (Some("v1"), Some(value)) => signatures.push(value.to_string()),
            _ => {}
        }
    }
    match (timestamp, signatures.is_empty()) {
        (Some(timestamp), false) => Some(ParsedSignature {
            timestamp,
            signatures,
        }),
        _ => None,
    }
}

/// Hex HMAC-SHA256 over `{timestamp}.{payload}`
pub fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// A `Stripe-Signature` header value for the given payload; what the
/// provider (or a test) would send
pub fn header_value(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    format!("t={},v1={}", timestamp, sign(secret, timestamp, payload))
}

pub fn verify(
    header: &str,
    payload: &[u8],
    secret: &str,
    tolerance_secs: u64,
) -> Result<(), ServiceError> {
    verify_at(
        header,
        payload,
        secret,
        tolerance_secs,
        chrono::Utc::now().timestamp(),
    )
}

/// Signature check against a caller-supplied clock
pub fn verify_at(
    header: &str,
    payload: &[u8],
    secret: &str,
    tolerance_secs: u64,
    now: i64,
) -> Result<(), ServiceError> {
    let parsed = parse_header(header).ok_or_else(|| {
        ServiceError::WebhookSignature("malformed Stripe-Signature header".to_string())
    })?;

    let in_tolerance = now
        .checked_sub(parsed.timestamp)
        .map(|delta| delta.unsigned_abs() <= tolerance_secs)
        .unwrap_or(false);
    if !in_tolerance {
        return Err(ServiceError::WebhookSignature(format!(
            "timestamp {} outside tolerance",
            parsed.timestamp
        )));
    }

    let expected = sign(secret, parsed.timestamp, payload);
    if parsed
        .signatures
        .iter()
        .any(|candidate| constant_time_eq(&expected, candidate))
    {
        Ok(())
    } else {
        Err(ServiceError::WebhookSignature(
            "no matching v1 signature".to_string(),
        ))
    }
}

/// Verifies the signature, then decodes the event
pub fn construct_event(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: u64,
) -> Result<WebhookEvent, ServiceError> {
    verify(header, payload, secret, tolerance_secs)?;
    serde_json::from_slice(payload)
        .map_err(|e| ServiceError::InvalidInput(format!("malformed webhook payload: {}", e)))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}
