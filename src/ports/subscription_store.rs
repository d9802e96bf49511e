//! Subscription store port.
//!
//! All durable state lives in a remote state service; this port is the only
//! way the application reads or writes subscription and payment records.
//! Lookups that miss return `Ok(None)` so callers can distinguish absence
//! from store failure.

use crate::domain::foundation::UserId;
use crate::domain::subscription::{PaymentRecord, SubscriptionRecord};
use async_trait::async_trait;
use thiserror::Error;

/// Port for the remote subscription/payment state service.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn find_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionRecord>, StoreError>;

    /// Look up a subscription by the processor's subscription id.
    ///
    /// Webhooks identify subscriptions by the processor's own id, not the
    /// internal user id.
    async fn find_subscription_by_processor_id(
        &self,
        processor_subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, StoreError>;

    async fn save_subscription(&self, record: &SubscriptionRecord) -> Result<(), StoreError>;

    async fn update_subscription(&self, record: &SubscriptionRecord) -> Result<(), StoreError>;

    async fn save_payment(&self, record: &PaymentRecord) -> Result<(), StoreError>;

    async fn update_payment(&self, record: &PaymentRecord) -> Result<(), StoreError>;

    /// Find a payment record by the processor's payment intent id.
    async fn find_payment_by_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<PaymentRecord>, StoreError>;
}

/// Errors from the remote state service.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store reported a conflicting write.
    #[error("state service rejected write: {0}")]
    Conflict(String),

    /// Store rejected the request as malformed (4xx other than 404/409).
    #[error("state service rejected request: {0}")]
    Rejected(String),

    /// Store unreachable or failing (network error, timeout, 5xx).
    #[error("state service unavailable: {0}")]
    Unavailable(String),
}
