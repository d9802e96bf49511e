//! CreateSubscriptionHandler - starts a trial subscription for a user.
//!
//! Covers both variants of signup: plain trial, and trial with a card
//! collected up front. When a payment method id is supplied it is attached
//! to the processor customer and becomes the default for later billing.

use std::sync::Arc;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{
    PlanPricing, SubscriptionError, SubscriptionPlan, SubscriptionRecord,
};
use crate::ports::{
    CreateCustomerRequest, IdentityNotifier, PaymentGateway, SubscriptionStore, SubscriptionUpdate,
};

/// Command to create a trial subscription.
#[derive(Debug, Clone)]
pub struct CreateSubscriptionCommand {
    pub user_id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub plan: SubscriptionPlan,

    /// Processor payment method id to attach up front, if collected.
    pub payment_method_id: Option<String>,
}

pub struct CreateSubscriptionHandler {
    store: Arc<dyn SubscriptionStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn IdentityNotifier>,
    pricing: PlanPricing,
}

impl CreateSubscriptionHandler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn IdentityNotifier>,
        pricing: PlanPricing,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            pricing,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateSubscriptionCommand,
    ) -> Result<SubscriptionRecord, SubscriptionError> {
        // 1. One subscription per user. The card variant is re-entrant so a
        //    client can retry or switch plan through the same signup call.
        let existing = self
            .store
            .find_subscription(&cmd.user_id)
            .await
            .map_err(|e| SubscriptionError::upstream(e.to_string()))?;
        if let Some(record) = existing {
            return match cmd.payment_method_id {
                Some(ref pm) => self.reenter_with_card(record, cmd.plan, pm).await,
                None => Err(SubscriptionError::already_subscribed(cmd.user_id)),
            };
        }

        // 2. Create the processor customer, tagged with our user id.
        let customer = self
            .gateway
            .create_customer(CreateCustomerRequest {
                user_id: cmd.user_id.clone(),
                email: cmd.email,
                name: cmd.name,
            })
            .await
            .map_err(|e| SubscriptionError::upstream(e.to_string()))?;

        // 3. Attach the card when one was collected at signup.
        let card_validated = match &cmd.payment_method_id {
            Some(pm) => {
                self.gateway
                    .attach_payment_method(&customer.id, pm)
                    .await
                    .map_err(|e| SubscriptionError::upstream(e.to_string()))?;
                true
            }
            None => false,
        };

        // 4. Persist the trial record.
        let now = Timestamp::now();
        let mut record = SubscriptionRecord::new_trial(
            cmd.user_id,
            customer.id,
            cmd.plan,
            self.pricing.clone(),
            now,
        );
        record.card_validated = card_validated;

        self.store
            .save_subscription(&record)
            .await
            .map_err(|e| SubscriptionError::upstream(e.to_string()))?;

        // 5. Mirror to identity, best effort.
        self.notify_best_effort(&record, now).await;

        tracing::info!(
            user_id = %record.user_id,
            plan = %record.plan,
            card_validated,
            "trial subscription created"
        );

        Ok(record)
    }

    /// Repeat signup with a card against an existing subscription.
    ///
    /// Same plan is a no-op returning the record as is. A different plan
    /// becomes a plan change, validating the card first when it never was.
    async fn reenter_with_card(
        &self,
        mut record: SubscriptionRecord,
        plan: SubscriptionPlan,
        payment_method_id: &str,
    ) -> Result<SubscriptionRecord, SubscriptionError> {
        if record.plan == plan {
            tracing::info!(
                user_id = %record.user_id,
                plan = %record.plan,
                "repeat signup for current plan, returning existing subscription"
            );
            return Ok(record);
        }

        if !record.card_validated {
            self.gateway
                .attach_payment_method(&record.processor_customer_id, payment_method_id)
                .await
                .map_err(|e| SubscriptionError::upstream(e.to_string()))?;
            record.card_validated = true;
        }

        if let Some(ref subscription_id) = record.processor_subscription_id {
            self.gateway
                .change_subscription_plan(subscription_id, plan)
                .await
                .map_err(|e| SubscriptionError::upstream(e.to_string()))?;
        }

        let now = Timestamp::now();
        record.change_plan(plan, now)?;

        self.store
            .update_subscription(&record)
            .await
            .map_err(|e| SubscriptionError::upstream(e.to_string()))?;

        self.notify_best_effort(&record, now).await;

        tracing::info!(
            user_id = %record.user_id,
            plan = %record.plan,
            "repeat signup switched plan on existing subscription"
        );

        Ok(record)
    }

    async fn notify_best_effort(&self, record: &SubscriptionRecord, now: Timestamp) {
        if let Err(e) = self
            .notifier
            .notify_subscription_changed(
                &record.user_id,
                SubscriptionUpdate::from_record(record, now),
            )
            .await
        {
            tracing::warn!(user_id = %record.user_id, error = %e, "identity notification failed");
        }
    }
}
