//! Payment history entries.
//!
//! Records are created only when an invoice webhook arrives; the lifecycle
//! endpoints never manufacture them. Payment-intent events may update an
//! existing record afterwards.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PaymentId, SubscriptionId, Timestamp, UserId};

use super::{PaymentStatus, SubscriptionPlan, SubscriptionRecord, SubscriptionStatus};

/// How the payment was made, as reported by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodKind {
    Card,
    BankTransfer,
    Other,
}

impl Default for PaymentMethodKind {
    fn default() -> Self {
        Self::Card
    }
}

/// Invoice fields carried into a new payment record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceDetails {
    pub invoice_id: String,
    pub payment_intent_id: String,
    pub charge_id: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub description: Option<String>,
    pub period_start: Option<Timestamp>,
    pub period_end: Option<Timestamp>,
    pub receipt_url: Option<String>,
}

/// One payment attempt tied to a user's subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub user_id: UserId,

    /// Local subscription this payment belongs to.
    pub subscription_id: SubscriptionId,

    /// Processor-side invoice id.
    pub processor_invoice_id: Option<String>,

    /// Processor payment intent id, the correlation key for intent updates.
    pub processor_payment_intent_id: Option<String>,

    pub processor_charge_id: Option<String>,

    pub amount_minor: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub method: PaymentMethodKind,
    pub plan: Option<SubscriptionPlan>,
    pub description: Option<String>,

    /// Set when the payment succeeded.
    pub paid_at: Option<Timestamp>,
    pub failure_reason: Option<String>,

    pub refunded_amount_minor: Option<i64>,
    pub refunded_at: Option<Timestamp>,

    pub receipt_url: Option<String>,

    /// Billing period covered by the invoice.
    pub period_start: Option<Timestamp>,
    pub period_end: Option<Timestamp>,

    /// The subscription was still in trial when this invoice arrived.
    pub is_trial: bool,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PaymentRecord {
    /// Entry for a successfully paid invoice.
    pub fn from_paid_invoice(
        subscription: &SubscriptionRecord,
        invoice: InvoiceDetails,
        now: Timestamp,
    ) -> Self {
        let mut record = Self::from_invoice(subscription, invoice, now);
        record.status = PaymentStatus::Succeeded;
        record.paid_at = Some(now);
        record
    }

    /// Entry for an invoice whose payment attempt failed.
    pub fn from_failed_invoice(
        subscription: &SubscriptionRecord,
        invoice: InvoiceDetails,
        reason: Option<String>,
        now: Timestamp,
    ) -> Self {
        let mut record = Self::from_invoice(subscription, invoice, now);
        record.status = PaymentStatus::Failed;
        record.failure_reason = reason;
        record
    }

    fn from_invoice(
        subscription: &SubscriptionRecord,
        invoice: InvoiceDetails,
        now: Timestamp,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            user_id: subscription.user_id.clone(),
            subscription_id: subscription.id,
            processor_invoice_id: Some(invoice.invoice_id),
            processor_payment_intent_id: Some(invoice.payment_intent_id),
            processor_charge_id: invoice.charge_id,
            amount_minor: invoice.amount_minor,
            currency: invoice.currency,
            status: PaymentStatus::Pending,
            method: PaymentMethodKind::Card,
            plan: Some(subscription.plan),
            description: invoice.description,
            paid_at: None,
            failure_reason: None,
            refunded_amount_minor: None,
            refunded_at: None,
            receipt_url: invoice.receipt_url,
            period_start: invoice.period_start,
            period_end: invoice.period_end,
            is_trial: subscription.status == SubscriptionStatus::Trial,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_succeeded(&mut self, now: Timestamp) {
        self.status = PaymentStatus::Succeeded;
        self.paid_at = Some(now);
        self.failure_reason = None;
        self.updated_at = now;
    }

    pub fn mark_failed(&mut self, reason: Option<String>, now: Timestamp) {
        self.status = PaymentStatus::Failed;
        self.failure_reason = reason;
        self.updated_at = now;
    }

    pub fn mark_refunded(&mut self, amount_minor: i64, now: Timestamp) {
        self.status = PaymentStatus::Refunded;
        self.refunded_amount_minor = Some(amount_minor);
        self.refunded_at = Some(now);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::PlanPricing;
    use chrono::{TimeZone, Utc};

    fn now() -> Timestamp {
        Timestamp::from_datetime(Utc.with_ymd_and_hms(2026, 3, 15, 10, 0, 0).unwrap())
    }

    fn subscription() -> SubscriptionRecord {
        SubscriptionRecord::new_trial(
            UserId::new("u1").unwrap(),
            "cus_1",
            SubscriptionPlan::Monthly,
            PlanPricing::default(),
            now(),
        )
    }

    fn invoice(invoice_id: &str) -> InvoiceDetails {
        InvoiceDetails {
            invoice_id: invoice_id.to_string(),
            payment_intent_id: "pi_1".to_string(),
            charge_id: Some("ch_1".to_string()),
            amount_minor: 999,
            currency: "usd".to_string(),
            description: Some("Monthly subscription".to_string()),
            period_start: Some(now()),
            period_end: Some(now().add_days(30)),
            receipt_url: Some("https://pay.stripe.com/receipts/r_1".to_string()),
        }
    }

    #[test]
    fn paid_invoice_entry_is_succeeded_with_paid_at() {
        let sub = subscription();
        let rec = PaymentRecord::from_paid_invoice(&sub, invoice("in_1"), now());

        assert_eq!(rec.status, PaymentStatus::Succeeded);
        assert_eq!(rec.paid_at, Some(now()));
        assert_eq!(rec.subscription_id, sub.id);
        assert_eq!(rec.processor_invoice_id.as_deref(), Some("in_1"));
        assert_eq!(rec.processor_charge_id.as_deref(), Some("ch_1"));
        assert_eq!(
            rec.receipt_url.as_deref(),
            Some("https://pay.stripe.com/receipts/r_1")
        );
        assert!(rec.period_start.is_some() && rec.period_end.is_some());
        assert!(rec.is_trial);
        assert!(rec.failure_reason.is_none());
    }

    #[test]
    fn failed_invoice_entry_keeps_reason_without_paid_at() {
        let sub = subscription();
        let rec = PaymentRecord::from_failed_invoice(
            &sub,
            invoice("in_2"),
            Some("card_declined".into()),
            now(),
        );

        assert_eq!(rec.status, PaymentStatus::Failed);
        assert_eq!(rec.failure_reason.as_deref(), Some("card_declined"));
        assert!(rec.paid_at.is_none());
    }

    #[test]
    fn invoice_after_activation_is_not_trial() {
        let mut sub = subscription();
        sub.activate("sub_1", now()).unwrap();
        let rec = PaymentRecord::from_paid_invoice(&sub, invoice("in_3"), now());

        assert!(!rec.is_trial);
    }

    #[test]
    fn mark_succeeded_sets_paid_at_and_clears_failure_reason() {
        let sub = subscription();
        let mut rec = PaymentRecord::from_failed_invoice(
            &sub,
            invoice("in_4"),
            Some("insufficient_funds".into()),
            now(),
        );
        let later = now().add_days(1);
        rec.mark_succeeded(later);

        assert_eq!(rec.status, PaymentStatus::Succeeded);
        assert_eq!(rec.paid_at, Some(later));
        assert!(rec.failure_reason.is_none());
    }

    #[test]
    fn mark_refunded_records_amount_and_time() {
        let sub = subscription();
        let mut rec = PaymentRecord::from_paid_invoice(&sub, invoice("in_5"), now());
        let later = now().add_days(2);
        rec.mark_refunded(999, later);

        assert_eq!(rec.status, PaymentStatus::Refunded);
        assert_eq!(rec.refunded_amount_minor, Some(999));
        assert_eq!(rec.refunded_at, Some(later));
    }
}
