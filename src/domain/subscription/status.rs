//! Subscription and payment status enums.
//!
//! `SubscriptionStatus::from_processor` implements the mapping from Stripe's
//! status strings to the internal state machine. Unrecognized values map to
//! `Unpaid` with a warning: an unknown processor state must never be treated
//! as healthy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// In the 30-day trial window.
    Trial,

    /// Paid and current.
    Active,

    /// A billing attempt failed; the processor is retrying.
    PastDue,

    /// Canceled, either immediately or after the period ended.
    Canceled,

    /// Payment retries exhausted or processor state unknown.
    Unpaid,
}

impl SubscriptionStatus {
    /// Maps a processor-side status string to the internal status.
    ///
    /// Conservative fallback: anything unrecognized becomes `Unpaid`.
    pub fn from_processor(status: &str) -> Self {
        match status {
            "trialing" => SubscriptionStatus::Trial,
            "active" => SubscriptionStatus::Active,
            "past_due" => SubscriptionStatus::PastDue,
            "canceled" | "cancelled" => SubscriptionStatus::Canceled,
            "unpaid" => SubscriptionStatus::Unpaid,
            other => {
                tracing::warn!(
                    processor_status = other,
                    "Unrecognized processor subscription status, treating as unpaid"
                );
                SubscriptionStatus::Unpaid
            }
        }
    }

    /// Stable wire name for the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trial => "trial",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Unpaid => "unpaid",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a single billing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Canceled,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Canceled => "canceled",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_processor_statuses() {
        assert_eq!(
            SubscriptionStatus::from_processor("trialing"),
            SubscriptionStatus::Trial
        );
        assert_eq!(
            SubscriptionStatus::from_processor("active"),
            SubscriptionStatus::Active
        );
        assert_eq!(
            SubscriptionStatus::from_processor("past_due"),
            SubscriptionStatus::PastDue
        );
        assert_eq!(
            SubscriptionStatus::from_processor("unpaid"),
            SubscriptionStatus::Unpaid
        );
    }

    #[test]
    fn maps_both_cancellation_spellings() {
        assert_eq!(
            SubscriptionStatus::from_processor("canceled"),
            SubscriptionStatus::Canceled
        );
        assert_eq!(
            SubscriptionStatus::from_processor("cancelled"),
            SubscriptionStatus::Canceled
        );
    }

    #[test]
    fn unknown_processor_status_falls_back_to_unpaid() {
        assert_eq!(
            SubscriptionStatus::from_processor("incomplete_expired"),
            SubscriptionStatus::Unpaid
        );
        assert_eq!(
            SubscriptionStatus::from_processor(""),
            SubscriptionStatus::Unpaid
        );
    }

    #[test]
    fn statuses_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&SubscriptionStatus::PastDue).unwrap(),
            "\"past_due\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Succeeded).unwrap(),
            "\"succeeded\""
        );
    }
}
