//! CancelSubscriptionHandler - cancels a subscription, now or at period end.
//!
//! When a processor subscription exists it is canceled there first; a
//! trial-only record has nothing on the processor side and is canceled
//! locally. At-period-end keeps access until the paid window lapses.

use std::sync::Arc;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{SubscriptionError, SubscriptionRecord};
use crate::ports::{IdentityNotifier, PaymentGateway, SubscriptionStore, SubscriptionUpdate};

/// Command to cancel a subscription.
#[derive(Debug, Clone)]
pub struct CancelSubscriptionCommand {
    pub user_id: UserId,
    pub at_period_end: bool,
}

pub struct CancelSubscriptionHandler {
    store: Arc<dyn SubscriptionStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn IdentityNotifier>,
}

impl CancelSubscriptionHandler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn IdentityNotifier>,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
        }
    }

    pub async fn handle(
        &self,
        cmd: CancelSubscriptionCommand,
    ) -> Result<SubscriptionRecord, SubscriptionError> {
        let mut record = self
            .store
            .find_subscription(&cmd.user_id)
            .await
            .map_err(|e| SubscriptionError::upstream(e.to_string()))?
            .ok_or_else(|| SubscriptionError::not_found(cmd.user_id.clone()))?;

        if let Some(sub_id) = &record.processor_subscription_id {
            self.gateway
                .cancel_subscription(sub_id, cmd.at_period_end)
                .await
                .map_err(|e| SubscriptionError::upstream(e.to_string()))?;
        }

        let now = Timestamp::now();
        record.cancel(cmd.at_period_end, now);

        self.store
            .update_subscription(&record)
            .await
            .map_err(|e| SubscriptionError::upstream(e.to_string()))?;

        if let Err(e) = self
            .notifier
            .notify_subscription_changed(
                &record.user_id,
                SubscriptionUpdate::from_record(&record, now),
            )
            .await
        {
            tracing::warn!(user_id = %record.user_id, error = %e, "identity notification failed");
        }

        tracing::info!(
            user_id = %record.user_id,
            at_period_end = cmd.at_period_end,
            status = %record.status,
            "subscription canceled"
        );

        Ok(record)
    }
}
