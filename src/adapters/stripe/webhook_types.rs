//! Stripe wire types for webhook handling.
//!
//! These types mirror the Stripe objects this service consumes, as they
//! arrive in webhook payloads and API responses. Unknown fields are ignored
//! so new Stripe API versions do not break parsing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ════════════════════════════════════════════════════════════════════════════════
// Signature Parsing
// ════════════════════════════════════════════════════════════════════════════════

/// Error parsing the Stripe-Signature header.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureParseError {
    #[error("missing Stripe-Signature header")]
    MissingHeader,

    #[error("missing timestamp (t=) in signature header")]
    MissingTimestamp,

    #[error("missing v1 signature in header")]
    MissingV1Signature,

    #[error("invalid timestamp format")]
    InvalidTimestamp,

    #[error("signature is not valid hex")]
    InvalidSignatureFormat,
}

/// Parsed Stripe-Signature header.
///
/// Header format: `t=<timestamp>,v1=<hex signature>`. Unknown scheme keys
/// are ignored for forward compatibility.
#[derive(Debug, Clone)]
pub struct SignatureHeader {
    /// Unix timestamp Stripe attached when signing.
    pub timestamp: i64,

    /// HMAC-SHA256 signature, decoded from hex.
    pub v1_signature: Vec<u8>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, SignatureParseError> {
        if header.is_empty() {
            return Err(SignatureParseError::MissingHeader);
        }

        let mut timestamp: Option<i64> = None;
        let mut v1_signature: Option<Vec<u8>> = None;

        for part in header.split(',') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            match key.trim() {
                "t" => {
                    timestamp = Some(
                        value
                            .trim()
                            .parse()
                            .map_err(|_| SignatureParseError::InvalidTimestamp)?,
                    );
                }
                "v1" => {
                    v1_signature = Some(
                        hex_decode(value.trim())
                            .ok_or(SignatureParseError::InvalidSignatureFormat)?,
                    );
                }
                _ => {}
            }
        }

        Ok(Self {
            timestamp: timestamp.ok_or(SignatureParseError::MissingTimestamp)?,
            v1_signature: v1_signature.ok_or(SignatureParseError::MissingV1Signature)?,
        })
    }
}

fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return None;
    }
    let mut bytes = Vec::with_capacity(hex.len() / 2);
    for i in (0..hex.len()).step_by(2) {
        bytes.push(u8::from_str_radix(&hex[i..i + 2], 16).ok()?);
    }
    Some(bytes)
}

pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// ════════════════════════════════════════════════════════════════════════════════
// Event Envelope
// ════════════════════════════════════════════════════════════════════════════════

/// Raw Stripe webhook event envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeWebhookEvent {
    /// Unique event identifier (evt_...).
    pub id: String,

    /// Event type string (e.g., "customer.subscription.updated").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp when the event was created.
    pub created: i64,

    pub data: StripeEventData,

    pub livemode: bool,
}

/// Event payload container.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object affected by this event.
    pub object: serde_json::Value,
}

// ════════════════════════════════════════════════════════════════════════════════
// Object Types
// ════════════════════════════════════════════════════════════════════════════════

/// Stripe Customer object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCustomer {
    /// Unique customer identifier (cus_...).
    pub id: String,

    pub email: Option<String>,

    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,

    #[serde(default)]
    pub deleted: bool,
}

/// Stripe Subscription object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscription {
    /// Unique subscription identifier (sub_...).
    pub id: String,

    /// Customer id owning this subscription.
    pub customer: String,

    /// Raw status string (trialing, active, past_due, canceled, unpaid, ...).
    pub status: String,

    /// Current period bounds (Unix timestamps).
    pub current_period_start: i64,
    pub current_period_end: i64,

    #[serde(default)]
    pub cancel_at_period_end: bool,

    pub canceled_at: Option<i64>,

    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,
}

/// Stripe Invoice object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoice {
    /// Unique invoice identifier (in_...).
    pub id: String,

    pub customer: String,

    pub subscription: Option<String>,

    /// Payment intent charged for this invoice, if any.
    pub payment_intent: Option<String>,

    /// Charge backing the payment, if any (ch_...).
    #[serde(default)]
    pub charge: Option<String>,

    /// Amount paid in minor units (cents).
    #[serde(default)]
    pub amount_paid: i64,

    /// Amount due in minor units.
    #[serde(default)]
    pub amount_due: i64,

    /// Currency code, lowercase.
    pub currency: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Billing period covered by the invoice (Unix timestamps).
    #[serde(default)]
    pub period_start: Option<i64>,

    #[serde(default)]
    pub period_end: Option<i64>,

    /// Customer-facing invoice page, used as the receipt URL.
    #[serde(default)]
    pub hosted_invoice_url: Option<String>,

    /// Attempt count, present on payment_failed events.
    #[serde(default)]
    pub attempt_count: i32,
}

/// Stripe PaymentIntent object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePaymentIntent {
    /// Unique payment intent identifier (pi_...).
    pub id: String,

    pub customer: Option<String>,

    /// Amount in minor units.
    #[serde(default)]
    pub amount: i64,

    pub currency: String,

    pub last_payment_error: Option<StripePaymentError>,
}

/// Error detail nested in a failed payment intent.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripePaymentError {
    pub code: Option<String>,

    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ════════════════════════════════════════════════════════════════════════
    // Signature Header Parsing
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn parses_well_formed_header() {
        let header = SignatureHeader::parse("t=1704067200,v1=deadbeef").unwrap();
        assert_eq!(header.timestamp, 1704067200);
        assert_eq!(header.v1_signature, vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn ignores_unknown_schemes() {
        let header = SignatureHeader::parse("t=1704067200,v1=00ff,v0=abcd").unwrap();
        assert_eq!(header.v1_signature, vec![0x00, 0xff]);
    }

    #[test]
    fn rejects_empty_header() {
        assert_eq!(
            SignatureHeader::parse("").unwrap_err(),
            SignatureParseError::MissingHeader
        );
    }

    #[test]
    fn rejects_missing_timestamp() {
        assert_eq!(
            SignatureHeader::parse("v1=deadbeef").unwrap_err(),
            SignatureParseError::MissingTimestamp
        );
    }

    #[test]
    fn rejects_missing_v1() {
        assert_eq!(
            SignatureHeader::parse("t=1704067200").unwrap_err(),
            SignatureParseError::MissingV1Signature
        );
    }

    #[test]
    fn rejects_non_hex_signature() {
        assert_eq!(
            SignatureHeader::parse("t=1704067200,v1=zzzz").unwrap_err(),
            SignatureParseError::InvalidSignatureFormat
        );
    }

    #[test]
    fn rejects_non_numeric_timestamp() {
        assert_eq!(
            SignatureHeader::parse("t=later,v1=deadbeef").unwrap_err(),
            SignatureParseError::InvalidTimestamp
        );
    }

    #[test]
    fn hex_roundtrip() {
        let bytes = vec![0x01, 0xab, 0xff];
        assert_eq!(hex_decode(&hex_encode(&bytes)).unwrap(), bytes);
    }

    // ════════════════════════════════════════════════════════════════════════
    // Payload Parsing
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn parses_subscription_event_payload() {
        let json = r#"{
            "id": "evt_1",
            "type": "customer.subscription.updated",
            "created": 1704067200,
            "livemode": false,
            "data": {
                "object": {
                    "id": "sub_1",
                    "customer": "cus_1",
                    "status": "active",
                    "current_period_start": 1704067200,
                    "current_period_end": 1706745600,
                    "cancel_at_period_end": false,
                    "canceled_at": null
                }
            }
        }"#;

        let event: StripeWebhookEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type, "customer.subscription.updated");

        let sub: StripeSubscription = serde_json::from_value(event.data.object).unwrap();
        assert_eq!(sub.id, "sub_1");
        assert_eq!(sub.status, "active");
        assert!(!sub.cancel_at_period_end);
    }

    #[test]
    fn parses_invoice_without_subscription() {
        let json = r#"{
            "id": "in_1",
            "customer": "cus_1",
            "subscription": null,
            "payment_intent": "pi_1",
            "amount_paid": 999,
            "currency": "usd"
        }"#;

        let invoice: StripeInvoice = serde_json::from_str(json).unwrap();
        assert!(invoice.subscription.is_none());
        assert_eq!(invoice.payment_intent.as_deref(), Some("pi_1"));
        assert_eq!(invoice.amount_paid, 999);
    }

    #[test]
    fn parses_payment_intent_failure_detail() {
        let json = r#"{
            "id": "pi_1",
            "customer": "cus_1",
            "amount": 999,
            "currency": "usd",
            "last_payment_error": {
                "code": "card_declined",
                "message": "Your card was declined."
            }
        }"#;

        let intent: StripePaymentIntent = serde_json::from_str(json).unwrap();
        let err = intent.last_payment_error.unwrap();
        assert_eq!(err.code.as_deref(), Some("card_declined"));
    }
}
