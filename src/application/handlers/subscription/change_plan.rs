//! ChangePlanHandler - switches a subscription between monthly and yearly.
//!
//! The same-plan check runs before the processor call so a no-op request
//! never touches the processor. Proration is left to processor defaults;
//! the local record keeps its current status and period until webhooks
//! report the new ones.

use std::sync::Arc;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{SubscriptionError, SubscriptionPlan, SubscriptionRecord};
use crate::ports::{IdentityNotifier, PaymentGateway, SubscriptionStore, SubscriptionUpdate};

/// Command to change a subscription's plan.
#[derive(Debug, Clone)]
pub struct ChangePlanCommand {
    pub user_id: UserId,
    pub new_plan: SubscriptionPlan,
}

pub struct ChangePlanHandler {
    store: Arc<dyn SubscriptionStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn IdentityNotifier>,
}

impl ChangePlanHandler {
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
        cmd: ChangePlanCommand,
    ) -> Result<SubscriptionRecord, SubscriptionError> {
        let mut record = self
            .store
            .find_subscription(&cmd.user_id)
            .await
            .map_err(|e| SubscriptionError::upstream(e.to_string()))?
            .ok_or_else(|| SubscriptionError::not_found(cmd.user_id.clone()))?;

        if record.plan == cmd.new_plan {
            return Err(SubscriptionError::same_plan(cmd.new_plan));
        }

        // Trial records have no processor subscription yet; the new plan is
        // simply what activation will use.
        if let Some(sub_id) = &record.processor_subscription_id {
            self.gateway
                .change_subscription_plan(sub_id, cmd.new_plan)
                .await
                .map_err(|e| SubscriptionError::upstream(e.to_string()))?;
        }

        let now = Timestamp::now();
        record.change_plan(cmd.new_plan, now)?;

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
            plan = %record.plan,
            "subscription plan changed"
        );

        Ok(record)
    }
}
