//! Payment gateway port for the external payment processor.
//!
//! Defines the contract for processor integrations (e.g., Stripe).
//! Implementations own the wire protocol, webhook signature verification,
//! and the translation of processor payloads into gateway events.

use crate::domain::foundation::UserId;
use crate::domain::subscription::SubscriptionPlan;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Port for payment processor integrations.
///
/// Handles customer management, subscription lifecycle on the processor
/// side, and webhook verification. Implementations must be safe to retry.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a customer in the processor, tagged with the internal user id.
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<GatewayCustomer, GatewayError>;

    /// Attach a payment method to a customer and make it the default.
    async fn attach_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
    ) -> Result<(), GatewayError>;

    /// Create a recurring subscription for a customer on the given plan.
    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<GatewaySubscription, GatewayError>;

    /// Cancel a subscription.
    ///
    /// If `at_period_end` is true the processor keeps it active until the
    /// current period ends.
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<GatewaySubscription, GatewayError>;

    /// Move a subscription to a different plan, prorating per processor
    /// defaults.
    async fn change_subscription_plan(
        &self,
        subscription_id: &str,
        new_plan: SubscriptionPlan,
    ) -> Result<GatewaySubscription, GatewayError>;

    /// Verify a webhook signature and parse the event.
    ///
    /// Returns the parsed event if the signature is valid and fresh.
    fn verify_webhook(&self, payload: &[u8], signature: &str)
        -> Result<GatewayEvent, GatewayError>;
}

/// Request to create a processor customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomerRequest {
    /// Internal user id, stored as processor metadata.
    pub user_id: UserId,

    pub email: String,

    pub name: Option<String>,
}

/// Customer as known to the processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayCustomer {
    /// Processor's customer id.
    pub id: String,

    pub email: String,
}

/// Request to create a processor subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubscriptionRequest {
    /// Processor's customer id.
    pub customer_id: String,

    pub plan: SubscriptionPlan,

    /// Default payment method to charge, when already attached.
    pub default_payment_method: Option<String>,

    /// Processor-side trial days. Zero bills immediately; the local trial
    /// has already elapsed by activation time.
    pub trial_period_days: u32,
}

/// Subscription as known to the processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySubscription {
    /// Processor's subscription id.
    pub id: String,

    pub customer_id: String,

    /// Raw processor status string (e.g. "trialing", "active").
    pub status: String,

    /// Current billing period bounds (Unix timestamps).
    pub current_period_start: i64,
    pub current_period_end: i64,

    pub cancel_at_period_end: bool,

    pub canceled_at: Option<i64>,
}

/// Verified webhook event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEvent {
    /// Event id from the processor.
    pub id: String,

    pub kind: GatewayEventKind,

    pub data: GatewayEventData,

    /// When the event occurred (Unix timestamp).
    pub created_at: i64,
}

/// Event types the reconciler distinguishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayEventKind {
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
    InvoicePaymentSucceeded,
    InvoicePaymentFailed,
    PaymentIntentSucceeded,
    PaymentIntentFailed,

    /// Any event type this service does not act on.
    Unknown(String),
}

/// Typed payload extracted from the event envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GatewayEventData {
    #[serde(rename = "subscription")]
    Subscription {
        subscription_id: String,
        customer_id: String,
        status: String,
        current_period_start: i64,
        current_period_end: i64,
        cancel_at_period_end: bool,
        canceled_at: Option<i64>,
    },

    #[serde(rename = "invoice")]
    Invoice {
        invoice_id: String,
        customer_id: String,
        subscription_id: Option<String>,
        payment_intent_id: Option<String>,
        charge_id: Option<String>,
        amount_minor: i64,
        currency: String,
        description: Option<String>,
        period_start: Option<i64>,
        period_end: Option<i64>,
        receipt_url: Option<String>,
        failure_reason: Option<String>,
    },

    #[serde(rename = "payment_intent")]
    PaymentIntent {
        payment_intent_id: String,
        customer_id: Option<String>,
        amount_minor: i64,
        currency: String,
        failure_reason: Option<String>,
    },

    /// Payload for event types we acknowledge without acting on.
    #[serde(rename = "raw")]
    Raw { json: String },
}

/// Errors from payment gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Webhook signature missing, malformed, or not matching.
    #[error("webhook signature verification failed: {0}")]
    InvalidSignature(String),

    /// Webhook payload verified but not parseable.
    #[error("malformed webhook payload: {0}")]
    MalformedEvent(String),

    /// Processor rejected the request (4xx).
    #[error("processor rejected request: {0}")]
    Rejected(String),

    /// Processor unreachable or failing (network error, 5xx).
    #[error("processor unavailable: {0}")]
    Unavailable(String),
}
