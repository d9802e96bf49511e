//! Identity notifier port.
//!
//! Pushes subscription state changes to the identity service so login
//! responses can carry entitlement flags. Notification is best effort:
//! callers log failures and continue, the webhook stream converges state.

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{SubscriptionPlan, SubscriptionRecord, SubscriptionStatus};
use async_trait::async_trait;
use thiserror::Error;

/// Port for the identity service's subscription mirror.
#[async_trait]
pub trait IdentityNotifier: Send + Sync {
    /// Report the user's latest subscription state.
    async fn notify_subscription_changed(
        &self,
        user_id: &UserId,
        update: SubscriptionUpdate,
    ) -> Result<(), NotifyError>;
}

/// Snapshot of the fields the identity service mirrors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionUpdate {
    pub plan: SubscriptionPlan,
    pub status: SubscriptionStatus,
    pub trial_end: Timestamp,
    pub is_active: bool,
    pub cancel_at_period_end: bool,
}

impl SubscriptionUpdate {
    /// Snapshot the notified fields from a subscription record.
    pub fn from_record(record: &SubscriptionRecord, now: Timestamp) -> Self {
        Self {
            plan: record.plan,
            status: record.status,
            trial_end: record.trial_end,
            is_active: record.is_active(now),
            cancel_at_period_end: record.cancel_at_period_end,
        }
    }
}

/// Errors from the identity service.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("identity service rejected update: {0}")]
    Rejected(String),

    #[error("identity service unavailable: {0}")]
    Unavailable(String),
}
