//! Subscription projection and lifecycle state machine.
//!
//! The record itself is persisted by the remote state service; every rule
//! about how it moves between states lives here, as pure functions of the
//! record and an explicit `now`, so the handlers stay thin and the rules are
//! testable without IO.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{SubscriptionId, Timestamp, UserId};

use super::{SubscriptionError, SubscriptionPlan, SubscriptionStatus};

/// Fixed trial window granted on creation.
pub const TRIAL_DAYS: i64 = 30;

/// Plan pricing carried on the record as metadata.
///
/// Amounts are informational; this service never computes charges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanPricing {
    pub monthly_price_minor: Option<i64>,
    pub yearly_price_minor: Option<i64>,
    pub currency: Option<String>,
}

/// Local projection of one user's subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub processor_customer_id: String,

    /// Set on paid activation, absent during trial-only life.
    pub processor_subscription_id: Option<String>,

    pub status: SubscriptionStatus,
    pub plan: SubscriptionPlan,

    pub trial_start: Timestamp,
    pub trial_end: Timestamp,
    pub is_trial_active: bool,

    pub current_period_start: Timestamp,
    pub current_period_end: Timestamp,
    pub next_billing_date: Timestamp,

    pub cancel_at_period_end: bool,
    pub canceled_at: Option<Timestamp>,

    /// True once a payment method has been attached and set default.
    pub card_validated: bool,

    #[serde(default)]
    pub pricing: PlanPricing,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SubscriptionRecord {
    /// Creates a new trial subscription: fixed 30-day window, period equal
    /// to the trial window, next billing at trial end.
    pub fn new_trial(
        user_id: UserId,
        processor_customer_id: impl Into<String>,
        plan: SubscriptionPlan,
        pricing: PlanPricing,
        now: Timestamp,
    ) -> Self {
        let trial_end = now.add_days(TRIAL_DAYS);
        Self {
            id: SubscriptionId::new(),
            user_id,
            processor_customer_id: processor_customer_id.into(),
            processor_subscription_id: None,
            status: SubscriptionStatus::Trial,
            plan,
            trial_start: now,
            trial_end,
            is_trial_active: true,
            current_period_start: now,
            current_period_end: trial_end,
            next_billing_date: trial_end,
            cancel_at_period_end: false,
            canceled_at: None,
            card_validated: false,
            pricing,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the subscription grants access at `now`.
    ///
    /// Open interval on both boundaries: the boundary instant itself is not
    /// active.
    pub fn is_active(&self, now: Timestamp) -> bool {
        (self.is_trial_active && now.is_before(&self.trial_end))
            || (self.status == SubscriptionStatus::Active
                && now.is_before(&self.current_period_end))
    }

    /// Whole days until the relevant boundary (trial end while the trial is
    /// active, otherwise period end), rounded up and never negative.
    pub fn days_remaining(&self, now: Timestamp) -> u32 {
        let boundary = if self.is_trial_active {
            self.trial_end
        } else {
            self.current_period_end
        };
        boundary.days_until_from(&now)
    }

    /// Transitions trial → active after the processor subscription was
    /// created. The new period runs one calendar month or year from `now`.
    pub fn activate(
        &mut self,
        processor_subscription_id: impl Into<String>,
        now: Timestamp,
    ) -> Result<(), SubscriptionError> {
        if self.status != SubscriptionStatus::Trial {
            return Err(SubscriptionError::not_in_trial(self.status));
        }

        let period_end = match self.plan {
            SubscriptionPlan::Monthly => now.add_calendar_months(1),
            SubscriptionPlan::Yearly => now.add_calendar_year(),
        };

        self.processor_subscription_id = Some(processor_subscription_id.into());
        self.status = SubscriptionStatus::Active;
        self.is_trial_active = false;
        self.current_period_start = now;
        self.current_period_end = period_end;
        self.next_billing_date = period_end;
        self.updated_at = now;
        Ok(())
    }

    /// Records a cancellation request.
    ///
    /// At period end: only the flag changes; the processor's own webhooks
    /// converge the status later. Immediate: status flips to canceled now.
    pub fn cancel(&mut self, at_period_end: bool, now: Timestamp) {
        self.cancel_at_period_end = at_period_end;
        if !at_period_end {
            self.status = SubscriptionStatus::Canceled;
            self.canceled_at = Some(now);
            self.is_trial_active = false;
        }
        self.updated_at = now;
    }

    /// Switches the stored plan. Status is untouched by a plan change.
    pub fn change_plan(
        &mut self,
        new_plan: SubscriptionPlan,
        now: Timestamp,
    ) -> Result<(), SubscriptionError> {
        if new_plan == self.plan {
            return Err(SubscriptionError::same_plan(new_plan));
        }
        self.plan = new_plan;
        self.updated_at = now;
        Ok(())
    }

    /// Applies processor-reported state from a subscription webhook.
    pub fn sync_from_processor(
        &mut self,
        status: SubscriptionStatus,
        period_start: Timestamp,
        period_end: Timestamp,
        cancel_at_period_end: bool,
        canceled_at: Option<Timestamp>,
        now: Timestamp,
    ) {
        self.status = status;
        self.current_period_start = period_start;
        self.current_period_end = period_end;
        self.next_billing_date = period_end;
        self.cancel_at_period_end = cancel_at_period_end;
        if canceled_at.is_some() {
            self.canceled_at = canceled_at;
        }
        if status != SubscriptionStatus::Trial {
            self.is_trial_active = false;
        }
        self.updated_at = now;
    }

    /// Forces cancellation after `customer.subscription.deleted`.
    pub fn force_canceled(&mut self, now: Timestamp) {
        self.status = SubscriptionStatus::Canceled;
        self.canceled_at = Some(now);
        self.is_trial_active = false;
        self.updated_at = now;
    }

    /// Promotes to active after a successful invoice payment.
    pub fn promote_active(&mut self, now: Timestamp) {
        self.status = SubscriptionStatus::Active;
        self.is_trial_active = false;
        self.updated_at = now;
    }

    /// Demotes to past-due after a failed invoice payment.
    pub fn mark_past_due(&mut self, now: Timestamp) {
        self.status = SubscriptionStatus::PastDue;
        self.updated_at = now;
    }

    /// Builds the lifecycle summary exposed by the status endpoint.
    pub fn status_summary(&self, now: Timestamp) -> StatusSummary {
        StatusSummary {
            has_subscription: true,
            is_active: self.is_active(now),
            plan: Some(self.plan),
            status: Some(self.status),
            trial_active: self.is_trial_active,
            days_remaining: self.days_remaining(now),
            next_billing_date: Some(self.next_billing_date),
            cancel_at_period_end: self.cancel_at_period_end,
        }
    }
}

/// Lifecycle summary for one user, computed locally from the projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub has_subscription: bool,
    pub is_active: bool,
    pub plan: Option<SubscriptionPlan>,
    pub status: Option<SubscriptionStatus>,
    pub trial_active: bool,
    pub days_remaining: u32,
    pub next_billing_date: Option<Timestamp>,
    pub cancel_at_period_end: bool,
}

impl StatusSummary {
    /// Summary returned when the user has no subscription at all.
    pub fn none() -> Self {
        Self {
            has_subscription: false,
            is_active: false,
            plan: None,
            status: None,
            trial_active: false,
            days_remaining: 0,
            next_billing_date: None,
            cancel_at_period_end: false,
        }
    }
}
