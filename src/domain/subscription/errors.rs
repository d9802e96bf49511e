//! Subscription-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | NotFound | 404 |
//! | AlreadySubscribed | 409 |
//! | NotInTrial | 400 |
//! | SamePlan | 400 |
//! | InvalidPlan | 400 |
//! | ValidationFailed | 400 |
//! | InvalidWebhook | 400 |
//! | WebhookSignature | 401 |
//! | Upstream | 502 |

use crate::domain::foundation::UserId;

use super::{SubscriptionPlan, SubscriptionStatus};

/// Errors surfaced by lifecycle operations and webhook reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// No subscription exists for this user.
    NotFound(UserId),

    /// User already has a subscription.
    AlreadySubscribed(UserId),

    /// Paid activation requires the subscription to be in trial.
    NotInTrial { current: SubscriptionStatus },

    /// Plan change to the plan already in effect.
    SamePlan(SubscriptionPlan),

    /// Plan value not recognized.
    InvalidPlan(String),

    /// Request field failed validation.
    ValidationFailed { field: String, message: String },

    /// Webhook payload could not be parsed into a known event.
    InvalidWebhook(String),

    /// Webhook signature verification failed.
    WebhookSignature,

    /// The payment processor or the remote state service failed
    /// (network error or 5xx). Not retried here.
    Upstream(String),
}

impl SubscriptionError {
    pub fn not_found(user_id: UserId) -> Self {
        SubscriptionError::NotFound(user_id)
    }

    pub fn already_subscribed(user_id: UserId) -> Self {
        SubscriptionError::AlreadySubscribed(user_id)
    }

    pub fn not_in_trial(current: SubscriptionStatus) -> Self {
        SubscriptionError::NotInTrial { current }
    }

    pub fn same_plan(plan: SubscriptionPlan) -> Self {
        SubscriptionError::SamePlan(plan)
    }

    pub fn invalid_plan(value: impl Into<String>) -> Self {
        SubscriptionError::InvalidPlan(value.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        SubscriptionError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_webhook(message: impl Into<String>) -> Self {
        SubscriptionError::InvalidWebhook(message.into())
    }

    pub fn webhook_signature() -> Self {
        SubscriptionError::WebhookSignature
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        SubscriptionError::Upstream(message.into())
    }

    /// Returns a user-facing error message.
    pub fn message(&self) -> String {
        match self {
            SubscriptionError::NotFound(user_id) => {
                format!("No subscription found for user {}", user_id)
            }
            SubscriptionError::AlreadySubscribed(user_id) => {
                format!("User {} already has a subscription", user_id)
            }
            SubscriptionError::NotInTrial { current } => format!(
                "Subscription must be in trial to activate, current status is {}",
                current
            ),
            SubscriptionError::SamePlan(plan) => {
                format!("Subscription is already on the {} plan", plan)
            }
            SubscriptionError::InvalidPlan(value) => {
                format!("'{}' is not a valid plan", value)
            }
            SubscriptionError::ValidationFailed { field, message } => {
                format!("Invalid {}: {}", field, message)
            }
            SubscriptionError::InvalidWebhook(reason) => {
                format!("Invalid webhook payload: {}", reason)
            }
            SubscriptionError::WebhookSignature => {
                "Webhook signature verification failed".to_string()
            }
            SubscriptionError::Upstream(reason) => {
                format!("Upstream service unavailable: {}", reason)
            }
        }
    }
}

impl std::fmt::Display for SubscriptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for SubscriptionError {}
