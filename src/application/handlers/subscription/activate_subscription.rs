//! ActivateSubscriptionHandler - converts a trial into a paid subscription.
//!
//! Creates the recurring subscription on the processor and moves the local
//! record to active with a calendar-accurate billing period. Only trials
//! can activate; everything else is rejected before the processor call.

use std::sync::Arc;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{SubscriptionError, SubscriptionRecord, SubscriptionStatus};
use crate::ports::{
    CreateSubscriptionRequest, IdentityNotifier, PaymentGateway, SubscriptionStore,
    SubscriptionUpdate,
};

/// Command to activate a trial subscription.
#[derive(Debug, Clone)]
pub struct ActivateSubscriptionCommand {
    pub user_id: UserId,

    /// Card to attach and charge, when not already on file.
    pub payment_method_id: Option<String>,
}

pub struct ActivateSubscriptionHandler {
    store: Arc<dyn SubscriptionStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn IdentityNotifier>,
}

impl ActivateSubscriptionHandler {
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
        cmd: ActivateSubscriptionCommand,
    ) -> Result<SubscriptionRecord, SubscriptionError> {
        let mut record = self
            .store
            .find_subscription(&cmd.user_id)
            .await
            .map_err(|e| SubscriptionError::upstream(e.to_string()))?
            .ok_or_else(|| SubscriptionError::not_found(cmd.user_id.clone()))?;

        // Reject before any processor call so failed attempts stay side
        // effect free.
        if record.status != SubscriptionStatus::Trial {
            return Err(SubscriptionError::not_in_trial(record.status));
        }

        if let Some(pm) = &cmd.payment_method_id {
            self.gateway
                .attach_payment_method(&record.processor_customer_id, pm)
                .await
                .map_err(|e| SubscriptionError::upstream(e.to_string()))?;
            record.card_validated = true;
        }

        let processor_sub = self
            .gateway
            .create_subscription(CreateSubscriptionRequest {
                customer_id: record.processor_customer_id.clone(),
                plan: record.plan,
                default_payment_method: cmd.payment_method_id.clone(),
                // The local trial already ran; billing starts immediately.
                trial_period_days: 0,
            })
            .await
            .map_err(|e| SubscriptionError::upstream(e.to_string()))?;

        let now = Timestamp::now();
        record.activate(processor_sub.id, now)?;

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
            period_end = %record.current_period_end,
            "subscription activated"
        );

        Ok(record)
    }
}
