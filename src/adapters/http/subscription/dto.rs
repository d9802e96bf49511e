//! HTTP DTOs for subscription endpoints.
//!
//! These types define the JSON request/response structure for the
//! subscription API. Wire JSON is camelCase; they are the boundary between
//! HTTP and the application layer.

use serde::{Deserialize, Serialize};

use crate::domain::subscription::{
    PlanPricing, StatusSummary, SubscriptionPlan, SubscriptionRecord, SubscriptionStatus,
};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to start a trial subscription.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub plan: String,
}

/// Request to start a trial subscription with a card on file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionWithCardRequest {
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub plan: String,
    pub payment_method_id: String,
}

/// Request to activate a trial into a paid subscription.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateSubscriptionRequest {
    #[serde(default)]
    pub payment_method_id: Option<String>,
}

/// Request to cancel a subscription. Defaults to at-period-end.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelSubscriptionRequest {
    #[serde(default = "default_at_period_end")]
    pub at_period_end: bool,
}

impl Default for CancelSubscriptionRequest {
    fn default() -> Self {
        Self {
            at_period_end: true,
        }
    }
}

fn default_at_period_end() -> bool {
    true
}

/// Request to change the subscription plan.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePlanRequest {
    pub plan: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Full subscription record view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub id: String,
    pub user_id: String,
    pub status: SubscriptionStatus,
    pub plan: SubscriptionPlan,
    pub trial_start: String,
    pub trial_end: String,
    pub is_trial_active: bool,
    pub current_period_start: String,
    pub current_period_end: String,
    pub next_billing_date: String,
    pub cancel_at_period_end: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canceled_at: Option<String>,
    pub card_validated: bool,
    pub pricing: PlanPricing,
    pub created_at: String,
}

impl From<SubscriptionRecord> for SubscriptionResponse {
    fn from(record: SubscriptionRecord) -> Self {
        Self {
            id: record.id.to_string(),
            user_id: record.user_id.to_string(),
            status: record.status,
            plan: record.plan,
            trial_start: record.trial_start.to_rfc3339(),
            trial_end: record.trial_end.to_rfc3339(),
            is_trial_active: record.is_trial_active,
            current_period_start: record.current_period_start.to_rfc3339(),
            current_period_end: record.current_period_end.to_rfc3339(),
            next_billing_date: record.next_billing_date.to_rfc3339(),
            cancel_at_period_end: record.cancel_at_period_end,
            canceled_at: record.canceled_at.map(|t| t.to_rfc3339()),
            card_validated: record.card_validated,
            pricing: record.pricing,
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

/// Lifecycle summary view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub has_subscription: bool,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<SubscriptionPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SubscriptionStatus>,
    pub trial_active: bool,
    pub days_remaining: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_billing_date: Option<String>,
    pub cancel_at_period_end: bool,
}

impl From<StatusSummary> for StatusResponse {
    fn from(summary: StatusSummary) -> Self {
        Self {
            has_subscription: summary.has_subscription,
            is_active: summary.is_active,
            plan: summary.plan,
            status: summary.status,
            trial_active: summary.trial_active,
            days_remaining: summary.days_remaining,
            next_billing_date: summary.next_billing_date.map(|t| t.to_rfc3339()),
            cancel_at_period_end: summary.cancel_at_period_end,
        }
    }
}

/// Response for the activity check endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveResponse {
    pub is_active: bool,
}

/// Acknowledgement body returned to the processor's webhook delivery.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAckResponse {
    pub received: bool,
}

/// Standard error body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}
