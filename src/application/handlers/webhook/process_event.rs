//! ProcessWebhookHandler - reconciles processor webhook events.
//!
//! The processor's event stream is the source of truth for billing state.
//! Events can arrive out of order or reference records this service has
//! never seen; those cases are logged and acknowledged so the processor
//! stops redelivering, while genuine store failures propagate and trigger
//! redelivery.
//!
//! Event handling rules:
//! - subscription events sync the local projection to processor state
//! - invoice events are the only source of new payment records
//! - payment intent events update existing payment records, never create

use std::sync::Arc;

use crate::domain::foundation::Timestamp;
use crate::domain::subscription::{
    InvoiceDetails, PaymentRecord, SubscriptionError, SubscriptionRecord, SubscriptionStatus,
};
use crate::ports::{
    GatewayError, GatewayEvent, GatewayEventData, GatewayEventKind, IdentityNotifier,
    PaymentGateway, SubscriptionStore, SubscriptionUpdate,
};

/// Command carrying a raw webhook delivery.
#[derive(Debug, Clone)]
pub struct ProcessWebhookCommand {
    pub payload: Vec<u8>,
    pub signature: String,
}

/// What the reconciler did with the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessWebhookResult {
    /// Local subscription synced to processor state.
    SubscriptionSynced,

    /// Subscription marked canceled after a deleted event.
    SubscriptionCanceled,

    /// New payment record written from an invoice event.
    PaymentRecorded,

    /// Existing payment record updated from a payment intent event.
    PaymentUpdated,

    /// Event verified but referenced no local record; acknowledged as a
    /// no-op.
    Ignored,

    /// Event type this service does not act on.
    Acknowledged,
}

pub struct ProcessWebhookHandler {
    store: Arc<dyn SubscriptionStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn IdentityNotifier>,
}

impl ProcessWebhookHandler {
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
        cmd: ProcessWebhookCommand,
    ) -> Result<ProcessWebhookResult, SubscriptionError> {
        // Signature verification comes before anything touches the store.
        let event = self
            .gateway
            .verify_webhook(&cmd.payload, &cmd.signature)
            .map_err(|e| match e {
                GatewayError::InvalidSignature(_) => SubscriptionError::webhook_signature(),
                GatewayError::MalformedEvent(reason) => SubscriptionError::invalid_webhook(reason),
                other => SubscriptionError::upstream(other.to_string()),
            })?;

        tracing::debug!(event_id = %event.id, kind = ?event.kind, "processing webhook event");

        match event.kind {
            GatewayEventKind::SubscriptionCreated | GatewayEventKind::SubscriptionUpdated => {
                self.sync_subscription(&event).await
            }
            GatewayEventKind::SubscriptionDeleted => self.delete_subscription(&event).await,
            GatewayEventKind::InvoicePaymentSucceeded => self.record_invoice(&event, true).await,
            GatewayEventKind::InvoicePaymentFailed => self.record_invoice(&event, false).await,
            GatewayEventKind::PaymentIntentSucceeded => self.update_payment(&event, true).await,
            GatewayEventKind::PaymentIntentFailed => self.update_payment(&event, false).await,
            GatewayEventKind::Unknown(ref kind) => {
                tracing::debug!(event_id = %event.id, kind = %kind, "ignoring unhandled event type");
                Ok(ProcessWebhookResult::Acknowledged)
            }
        }
    }

    async fn sync_subscription(
        &self,
        event: &GatewayEvent,
    ) -> Result<ProcessWebhookResult, SubscriptionError> {
        let GatewayEventData::Subscription {
            ref subscription_id,
            ref status,
            current_period_start,
            current_period_end,
            cancel_at_period_end,
            canceled_at,
            ..
        } = event.data
        else {
            return Err(SubscriptionError::invalid_webhook(
                "subscription event without subscription payload",
            ));
        };

        let Some(mut record) = self.find_by_processor_id(subscription_id).await? else {
            tracing::warn!(
                event_id = %event.id,
                subscription_id = %subscription_id,
                "subscription event for unknown subscription, acknowledging"
            );
            return Ok(ProcessWebhookResult::Ignored);
        };

        let now = Timestamp::now();
        record.sync_from_processor(
            SubscriptionStatus::from_processor(status),
            Timestamp::from_unix_secs(current_period_start),
            Timestamp::from_unix_secs(current_period_end),
            cancel_at_period_end,
            canceled_at.map(Timestamp::from_unix_secs),
            now,
        );

        self.store
            .update_subscription(&record)
            .await
            .map_err(|e| SubscriptionError::upstream(e.to_string()))?;
        self.notify_best_effort(&record, now).await;

        tracing::info!(
            event_id = %event.id,
            user_id = %record.user_id,
            status = %record.status,
            "subscription synced from processor"
        );
        Ok(ProcessWebhookResult::SubscriptionSynced)
    }

    async fn delete_subscription(
        &self,
        event: &GatewayEvent,
    ) -> Result<ProcessWebhookResult, SubscriptionError> {
        let GatewayEventData::Subscription {
            ref subscription_id, ..
        } = event.data
        else {
            return Err(SubscriptionError::invalid_webhook(
                "subscription event without subscription payload",
            ));
        };

        let Some(mut record) = self.find_by_processor_id(subscription_id).await? else {
            tracing::warn!(
                event_id = %event.id,
                subscription_id = %subscription_id,
                "deleted event for unknown subscription, acknowledging"
            );
            return Ok(ProcessWebhookResult::Ignored);
        };

        let now = Timestamp::now();
        record.force_canceled(now);

        self.store
            .update_subscription(&record)
            .await
            .map_err(|e| SubscriptionError::upstream(e.to_string()))?;
        self.notify_best_effort(&record, now).await;

        tracing::info!(
            event_id = %event.id,
            user_id = %record.user_id,
            "subscription canceled by processor"
        );
        Ok(ProcessWebhookResult::SubscriptionCanceled)
    }

    async fn record_invoice(
        &self,
        event: &GatewayEvent,
        succeeded: bool,
    ) -> Result<ProcessWebhookResult, SubscriptionError> {
        let GatewayEventData::Invoice {
            ref invoice_id,
            ref subscription_id,
            ref payment_intent_id,
            ref charge_id,
            amount_minor,
            ref currency,
            ref description,
            period_start,
            period_end,
            ref receipt_url,
            ref failure_reason,
            ..
        } = event.data
        else {
            return Err(SubscriptionError::invalid_webhook(
                "invoice event without invoice payload",
            ));
        };

        // One-off invoices carry no subscription, and drafts no intent.
        // Neither belongs to a billing cycle we track.
        let (Some(subscription_id), Some(payment_intent_id)) =
            (subscription_id.as_deref(), payment_intent_id.as_deref())
        else {
            tracing::warn!(
                event_id = %event.id,
                invoice_id = %invoice_id,
                "invoice event missing subscription or payment intent reference, acknowledging"
            );
            return Ok(ProcessWebhookResult::Ignored);
        };

        let Some(mut record) = self.find_by_processor_id(subscription_id).await? else {
            tracing::warn!(
                event_id = %event.id,
                subscription_id = %subscription_id,
                invoice_id = %invoice_id,
                "invoice event for unknown subscription, acknowledging"
            );
            return Ok(ProcessWebhookResult::Ignored);
        };

        let now = Timestamp::now();
        let invoice = InvoiceDetails {
            invoice_id: invoice_id.clone(),
            payment_intent_id: payment_intent_id.to_string(),
            charge_id: charge_id.clone(),
            amount_minor,
            currency: currency.clone(),
            description: description.clone(),
            period_start: period_start.map(Timestamp::from_unix_secs),
            period_end: period_end.map(Timestamp::from_unix_secs),
            receipt_url: receipt_url.clone(),
        };
        let payment = if succeeded {
            PaymentRecord::from_paid_invoice(&record, invoice, now)
        } else {
            PaymentRecord::from_failed_invoice(&record, invoice, failure_reason.clone(), now)
        };

        self.store
            .save_payment(&payment)
            .await
            .map_err(|e| SubscriptionError::upstream(e.to_string()))?;

        if succeeded {
            record.promote_active(now);
        } else {
            record.mark_past_due(now);
        }

        self.store
            .update_subscription(&record)
            .await
            .map_err(|e| SubscriptionError::upstream(e.to_string()))?;
        self.notify_best_effort(&record, now).await;

        tracing::info!(
            event_id = %event.id,
            user_id = %record.user_id,
            invoice_id = %invoice_id,
            succeeded,
            "invoice payment recorded"
        );
        Ok(ProcessWebhookResult::PaymentRecorded)
    }

    async fn update_payment(
        &self,
        event: &GatewayEvent,
        succeeded: bool,
    ) -> Result<ProcessWebhookResult, SubscriptionError> {
        let GatewayEventData::PaymentIntent {
            ref payment_intent_id,
            ref failure_reason,
            ..
        } = event.data
        else {
            return Err(SubscriptionError::invalid_webhook(
                "payment intent event without intent payload",
            ));
        };

        // Update only; invoice events own record creation. An intent event
        // arriving first is a normal ordering race.
        let existing = self
            .store
            .find_payment_by_intent(payment_intent_id)
            .await
            .map_err(|e| SubscriptionError::upstream(e.to_string()))?;

        let Some(mut payment) = existing else {
            tracing::warn!(
                event_id = %event.id,
                payment_intent_id = %payment_intent_id,
                "payment intent event before invoice event, acknowledging"
            );
            return Ok(ProcessWebhookResult::Ignored);
        };

        let now = Timestamp::now();
        if succeeded {
            payment.mark_succeeded(now);
        } else {
            payment.mark_failed(failure_reason.clone(), now);
        }

        self.store
            .update_payment(&payment)
            .await
            .map_err(|e| SubscriptionError::upstream(e.to_string()))?;

        tracing::info!(
            event_id = %event.id,
            payment_intent_id = %payment_intent_id,
            succeeded,
            "payment record updated from intent event"
        );
        Ok(ProcessWebhookResult::PaymentUpdated)
    }

    async fn find_by_processor_id(
        &self,
        processor_subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, SubscriptionError> {
        self.store
            .find_subscription_by_processor_id(processor_subscription_id)
            .await
            .map_err(|e| SubscriptionError::upstream(e.to_string()))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;
    use crate::domain::subscription::{PaymentStatus, PlanPricing, SubscriptionPlan};
    use crate::ports::{
        CreateCustomerRequest, CreateSubscriptionRequest, GatewayCustomer, GatewaySubscription,
        NotifyError, StoreError,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    // ════════════════════════════════════════════════════════════════════════════
    // Mock Implementations
    // ════════════════════════════════════════════════════════════════════════════

    #[derive(Default)]
    struct MockStore {
        by_subscription: Mutex<Option<SubscriptionRecord>>,
        payment_by_intent: Mutex<Option<PaymentRecord>>,
        updated_subs: Mutex<Vec<SubscriptionRecord>>,
        saved_payments: Mutex<Vec<PaymentRecord>>,
        updated_payments: Mutex<Vec<PaymentRecord>>,
        fail_update: bool,
    }

    impl MockStore {
        fn with_subscription(record: SubscriptionRecord) -> Self {
            Self {
                by_subscription: Mutex::new(Some(record)),
                ..Default::default()
            }
        }

        fn with_payment(payment: PaymentRecord) -> Self {
            Self {
                payment_by_intent: Mutex::new(Some(payment)),
                ..Default::default()
            }
        }

        fn updated_subs(&self) -> Vec<SubscriptionRecord> {
            self.updated_subs.lock().unwrap().clone()
        }

        fn saved_payments(&self) -> Vec<PaymentRecord> {
            self.saved_payments.lock().unwrap().clone()
        }

        fn updated_payments(&self) -> Vec<PaymentRecord> {
            self.updated_payments.lock().unwrap().clone()
        }

        fn total_calls(&self) -> usize {
            self.updated_subs.lock().unwrap().len()
                + self.saved_payments.lock().unwrap().len()
                + self.updated_payments.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SubscriptionStore for MockStore {
        async fn find_subscription(
            &self,
            _user_id: &UserId,
        ) -> Result<Option<SubscriptionRecord>, StoreError> {
            Ok(None)
        }

        async fn find_subscription_by_processor_id(
            &self,
            processor_subscription_id: &str,
        ) -> Result<Option<SubscriptionRecord>, StoreError> {
            Ok(self
                .by_subscription
                .lock()
                .unwrap()
                .clone()
                .filter(|r| {
                    r.processor_subscription_id.as_deref() == Some(processor_subscription_id)
                }))
        }

        async fn save_subscription(
            &self,
            _record: &SubscriptionRecord,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn update_subscription(
            &self,
            record: &SubscriptionRecord,
        ) -> Result<(), StoreError> {
            if self.fail_update {
                return Err(StoreError::Unavailable("state service down".into()));
            }
            self.updated_subs.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn save_payment(&self, record: &PaymentRecord) -> Result<(), StoreError> {
            self.saved_payments.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn update_payment(&self, record: &PaymentRecord) -> Result<(), StoreError> {
            self.updated_payments.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn find_payment_by_intent(
            &self,
            _payment_intent_id: &str,
        ) -> Result<Option<PaymentRecord>, StoreError> {
            Ok(self.payment_by_intent.lock().unwrap().clone())
        }
    }

    /// Gateway whose verify_webhook returns a canned result.
    struct MockGateway {
        verify_result: Mutex<Option<Result<GatewayEvent, GatewayError>>>,
    }

    impl MockGateway {
        fn verifying(event: GatewayEvent) -> Self {
            Self {
                verify_result: Mutex::new(Some(Ok(event))),
            }
        }

        fn rejecting_signature() -> Self {
            Self {
                verify_result: Mutex::new(Some(Err(GatewayError::InvalidSignature(
                    "signature mismatch".into(),
                )))),
            }
        }
    }

    #[async_trait]
    impl PaymentGateway for MockGateway {
        async fn create_customer(
            &self,
            _request: CreateCustomerRequest,
        ) -> Result<GatewayCustomer, GatewayError> {
            unreachable!("not used by this handler")
        }

        async fn attach_payment_method(
            &self,
            _customer_id: &str,
            _payment_method_id: &str,
        ) -> Result<(), GatewayError> {
            unreachable!("not used by this handler")
        }

        async fn create_subscription(
            &self,
            _request: CreateSubscriptionRequest,
        ) -> Result<GatewaySubscription, GatewayError> {
            unreachable!("not used by this handler")
        }

        async fn cancel_subscription(
            &self,
            _subscription_id: &str,
            _at_period_end: bool,
        ) -> Result<GatewaySubscription, GatewayError> {
            unreachable!("not used by this handler")
        }

        async fn change_subscription_plan(
            &self,
            _subscription_id: &str,
            _new_plan: SubscriptionPlan,
        ) -> Result<GatewaySubscription, GatewayError> {
            unreachable!("not used by this handler")
        }

        fn verify_webhook(
            &self,
            _payload: &[u8],
            _signature: &str,
        ) -> Result<GatewayEvent, GatewayError> {
            self.verify_result
                .lock()
                .unwrap()
                .take()
                .expect("verify_webhook called more than once")
        }
    }

    #[derive(Default)]
    struct MockNotifier {
        notifications: Mutex<Vec<(UserId, SubscriptionUpdate)>>,
    }

    impl MockNotifier {
        fn count(&self) -> usize {
            self.notifications.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl IdentityNotifier for MockNotifier {
        async fn notify_subscription_changed(
            &self,
            user_id: &UserId,
            update: SubscriptionUpdate,
        ) -> Result<(), NotifyError> {
            self.notifications
                .lock()
                .unwrap()
                .push((user_id.clone(), update));
            Ok(())
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Fixtures
    // ════════════════════════════════════════════════════════════════════════════

    fn user() -> UserId {
        UserId::new("u1").unwrap()
    }

    fn trial_record() -> SubscriptionRecord {
        SubscriptionRecord::new_trial(
            user(),
            "cus_1",
            SubscriptionPlan::Monthly,
            PlanPricing::default(),
            Timestamp::now(),
        )
    }

    fn active_record() -> SubscriptionRecord {
        let mut record = trial_record();
        record.activate("sub_1", Timestamp::now()).unwrap();
        record
    }

    fn subscription_event(kind: GatewayEventKind, status: &str) -> GatewayEvent {
        GatewayEvent {
            id: "evt_1".to_string(),
            kind,
            data: GatewayEventData::Subscription {
                subscription_id: "sub_1".to_string(),
                customer_id: "cus_1".to_string(),
                status: status.to_string(),
                current_period_start: 1704067200,
                current_period_end: 1706745600,
                cancel_at_period_end: false,
                canceled_at: None,
            },
            created_at: 1704067200,
        }
    }

    fn invoice_event(kind: GatewayEventKind) -> GatewayEvent {
        invoice_event_with(kind, Some("sub_1"), Some("pi_1"))
    }

    fn invoice_event_with(
        kind: GatewayEventKind,
        subscription_id: Option<&str>,
        payment_intent_id: Option<&str>,
    ) -> GatewayEvent {
        GatewayEvent {
            id: "evt_2".to_string(),
            kind,
            data: GatewayEventData::Invoice {
                invoice_id: "in_1".to_string(),
                customer_id: "cus_1".to_string(),
                subscription_id: subscription_id.map(String::from),
                payment_intent_id: payment_intent_id.map(String::from),
                charge_id: Some("ch_1".to_string()),
                amount_minor: 999,
                currency: "usd".to_string(),
                description: Some("Monthly plan".to_string()),
                period_start: Some(1704067200),
                period_end: Some(1706745600),
                receipt_url: Some("https://pay.example.com/in_1".to_string()),
                failure_reason: None,
            },
            created_at: 1704067200,
        }
    }

    fn invoice_details() -> InvoiceDetails {
        InvoiceDetails {
            invoice_id: "in_1".to_string(),
            payment_intent_id: "pi_1".to_string(),
            charge_id: None,
            amount_minor: 999,
            currency: "usd".to_string(),
            description: None,
            period_start: None,
            period_end: None,
            receipt_url: None,
        }
    }

    fn intent_event(kind: GatewayEventKind, failure_reason: Option<&str>) -> GatewayEvent {
        GatewayEvent {
            id: "evt_3".to_string(),
            kind,
            data: GatewayEventData::PaymentIntent {
                payment_intent_id: "pi_1".to_string(),
                customer_id: Some("cus_1".to_string()),
                amount_minor: 999,
                currency: "usd".to_string(),
                failure_reason: failure_reason.map(String::from),
            },
            created_at: 1704067200,
        }
    }

    fn command() -> ProcessWebhookCommand {
        ProcessWebhookCommand {
            payload: b"{}".to_vec(),
            signature: "t=0,v1=00".to_string(),
        }
    }

    fn handler(
        store: Arc<MockStore>,
        gateway: Arc<MockGateway>,
        notifier: Arc<MockNotifier>,
    ) -> ProcessWebhookHandler {
        ProcessWebhookHandler::new(store, gateway, notifier)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn bad_signature_rejected_before_any_store_call() {
        let store = Arc::new(MockStore::with_subscription(trial_record()));
        let gateway = Arc::new(MockGateway::rejecting_signature());
        let notifier = Arc::new(MockNotifier::default());
        let h = handler(store.clone(), gateway, notifier.clone());

        let err = h.handle(command()).await.unwrap_err();

        assert_eq!(err, SubscriptionError::WebhookSignature);
        assert_eq!(store.total_calls(), 0);
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn subscription_updated_syncs_local_state() {
        let store = Arc::new(MockStore::with_subscription(active_record()));
        let gateway = Arc::new(MockGateway::verifying(subscription_event(
            GatewayEventKind::SubscriptionUpdated,
            "past_due",
        )));
        let notifier = Arc::new(MockNotifier::default());
        let h = handler(store.clone(), gateway, notifier.clone());

        let result = h.handle(command()).await.unwrap();

        assert_eq!(result, ProcessWebhookResult::SubscriptionSynced);
        let updated = store.updated_subs();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].status, SubscriptionStatus::PastDue);
        assert!(!updated[0].is_trial_active);
        assert_eq!(notifier.count(), 1);
    }

    #[tokio::test]
    async fn unknown_status_string_falls_back_to_unpaid() {
        let store = Arc::new(MockStore::with_subscription(active_record()));
        let gateway = Arc::new(MockGateway::verifying(subscription_event(
            GatewayEventKind::SubscriptionUpdated,
            "paused_experimental",
        )));
        let notifier = Arc::new(MockNotifier::default());
        let h = handler(store.clone(), gateway, notifier);

        h.handle(command()).await.unwrap();

        assert_eq!(store.updated_subs()[0].status, SubscriptionStatus::Unpaid);
    }

    #[tokio::test]
    async fn subscription_event_for_unknown_subscription_is_noop() {
        let store = Arc::new(MockStore::default());
        let gateway = Arc::new(MockGateway::verifying(subscription_event(
            GatewayEventKind::SubscriptionUpdated,
            "active",
        )));
        let notifier = Arc::new(MockNotifier::default());
        let h = handler(store.clone(), gateway, notifier.clone());

        let result = h.handle(command()).await.unwrap();

        assert_eq!(result, ProcessWebhookResult::Ignored);
        assert_eq!(store.total_calls(), 0);
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn subscription_event_matches_on_processor_subscription_id() {
        // A record under the same customer but a different processor
        // subscription must not be touched.
        let mut record = trial_record();
        record.activate("sub_other", Timestamp::now()).unwrap();

        let store = Arc::new(MockStore::with_subscription(record));
        let gateway = Arc::new(MockGateway::verifying(subscription_event(
            GatewayEventKind::SubscriptionUpdated,
            "active",
        )));
        let notifier = Arc::new(MockNotifier::default());
        let h = handler(store.clone(), gateway, notifier.clone());

        let result = h.handle(command()).await.unwrap();

        assert_eq!(result, ProcessWebhookResult::Ignored);
        assert_eq!(store.total_calls(), 0);
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn deleted_event_forces_cancellation() {
        let mut record = trial_record();
        record.activate("sub_1", Timestamp::now()).unwrap();

        let store = Arc::new(MockStore::with_subscription(record));
        let gateway = Arc::new(MockGateway::verifying(subscription_event(
            GatewayEventKind::SubscriptionDeleted,
            "canceled",
        )));
        let notifier = Arc::new(MockNotifier::default());
        let h = handler(store.clone(), gateway, notifier.clone());

        let result = h.handle(command()).await.unwrap();

        assert_eq!(result, ProcessWebhookResult::SubscriptionCanceled);
        let updated = store.updated_subs();
        assert_eq!(updated[0].status, SubscriptionStatus::Canceled);
        assert!(updated[0].canceled_at.is_some());
        assert_eq!(notifier.count(), 1);
    }

    #[tokio::test]
    async fn deleted_event_for_unknown_subscription_is_noop() {
        let store = Arc::new(MockStore::default());
        let gateway = Arc::new(MockGateway::verifying(subscription_event(
            GatewayEventKind::SubscriptionDeleted,
            "canceled",
        )));
        let notifier = Arc::new(MockNotifier::default());
        let h = handler(store.clone(), gateway, notifier);

        let result = h.handle(command()).await.unwrap();

        assert_eq!(result, ProcessWebhookResult::Ignored);
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn paid_invoice_creates_payment_and_promotes() {
        let mut record = active_record();
        record.mark_past_due(Timestamp::now());

        let store = Arc::new(MockStore::with_subscription(record));
        let gateway = Arc::new(MockGateway::verifying(invoice_event(
            GatewayEventKind::InvoicePaymentSucceeded,
        )));
        let notifier = Arc::new(MockNotifier::default());
        let h = handler(store.clone(), gateway, notifier.clone());

        let result = h.handle(command()).await.unwrap();

        assert_eq!(result, ProcessWebhookResult::PaymentRecorded);
        let payments = store.saved_payments();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].status, PaymentStatus::Succeeded);
        assert_eq!(payments[0].amount_minor, 999);
        assert_eq!(payments[0].processor_invoice_id.as_deref(), Some("in_1"));
        assert!(payments[0].paid_at.is_some());
        assert_eq!(payments[0].processor_charge_id.as_deref(), Some("ch_1"));
        assert_eq!(
            payments[0].receipt_url.as_deref(),
            Some("https://pay.example.com/in_1")
        );
        assert!(payments[0].period_start.is_some());
        assert!(payments[0].period_end.is_some());
        assert!(!payments[0].is_trial);
        assert_eq!(store.updated_subs()[0].status, SubscriptionStatus::Active);
        assert_eq!(notifier.count(), 1);
    }

    #[tokio::test]
    async fn invoice_without_subscription_reference_is_ignored() {
        let store = Arc::new(MockStore::with_subscription(active_record()));
        let gateway = Arc::new(MockGateway::verifying(invoice_event_with(
            GatewayEventKind::InvoicePaymentSucceeded,
            None,
            Some("pi_1"),
        )));
        let notifier = Arc::new(MockNotifier::default());
        let h = handler(store.clone(), gateway, notifier.clone());

        let result = h.handle(command()).await.unwrap();

        assert_eq!(result, ProcessWebhookResult::Ignored);
        assert!(store.saved_payments().is_empty());
        assert_eq!(store.total_calls(), 0);
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn invoice_without_payment_intent_reference_is_ignored() {
        let store = Arc::new(MockStore::with_subscription(active_record()));
        let gateway = Arc::new(MockGateway::verifying(invoice_event_with(
            GatewayEventKind::InvoicePaymentFailed,
            Some("sub_1"),
            None,
        )));
        let notifier = Arc::new(MockNotifier::default());
        let h = handler(store.clone(), gateway, notifier);

        let result = h.handle(command()).await.unwrap();

        assert_eq!(result, ProcessWebhookResult::Ignored);
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn failed_invoice_creates_payment_and_demotes() {
        let store = Arc::new(MockStore::with_subscription(active_record()));
        let gateway = Arc::new(MockGateway::verifying(invoice_event(
            GatewayEventKind::InvoicePaymentFailed,
        )));
        let notifier = Arc::new(MockNotifier::default());
        let h = handler(store.clone(), gateway, notifier);

        let result = h.handle(command()).await.unwrap();

        assert_eq!(result, ProcessWebhookResult::PaymentRecorded);
        assert_eq!(store.saved_payments()[0].status, PaymentStatus::Failed);
        assert_eq!(store.updated_subs()[0].status, SubscriptionStatus::PastDue);
    }

    #[tokio::test]
    async fn invoice_for_unknown_subscription_is_noop() {
        let store = Arc::new(MockStore::default());
        let gateway = Arc::new(MockGateway::verifying(invoice_event(
            GatewayEventKind::InvoicePaymentSucceeded,
        )));
        let notifier = Arc::new(MockNotifier::default());
        let h = handler(store.clone(), gateway, notifier);

        let result = h.handle(command()).await.unwrap();

        assert_eq!(result, ProcessWebhookResult::Ignored);
        assert!(store.saved_payments().is_empty());
    }

    #[tokio::test]
    async fn intent_success_updates_existing_payment() {
        let failed = PaymentRecord::from_failed_invoice(
            &active_record(),
            invoice_details(),
            Some("card_declined".to_string()),
            Timestamp::now(),
        );
        let store = Arc::new(MockStore::with_payment(failed));
        let gateway = Arc::new(MockGateway::verifying(intent_event(
            GatewayEventKind::PaymentIntentSucceeded,
            None,
        )));
        let notifier = Arc::new(MockNotifier::default());
        let h = handler(store.clone(), gateway, notifier);

        let result = h.handle(command()).await.unwrap();

        assert_eq!(result, ProcessWebhookResult::PaymentUpdated);
        let updated = store.updated_payments();
        assert_eq!(updated[0].status, PaymentStatus::Succeeded);
        assert!(updated[0].failure_reason.is_none());
    }

    #[tokio::test]
    async fn intent_failure_records_reason() {
        let pending =
            PaymentRecord::from_paid_invoice(&active_record(), invoice_details(), Timestamp::now());
        let store = Arc::new(MockStore::with_payment(pending));
        let gateway = Arc::new(MockGateway::verifying(intent_event(
            GatewayEventKind::PaymentIntentFailed,
            Some("insufficient_funds"),
        )));
        let notifier = Arc::new(MockNotifier::default());
        let h = handler(store.clone(), gateway, notifier);

        h.handle(command()).await.unwrap();

        let updated = store.updated_payments();
        assert_eq!(updated[0].status, PaymentStatus::Failed);
        assert_eq!(
            updated[0].failure_reason.as_deref(),
            Some("insufficient_funds")
        );
    }

    #[tokio::test]
    async fn intent_event_without_payment_record_is_noop() {
        let store = Arc::new(MockStore::default());
        let gateway = Arc::new(MockGateway::verifying(intent_event(
            GatewayEventKind::PaymentIntentSucceeded,
            None,
        )));
        let notifier = Arc::new(MockNotifier::default());
        let h = handler(store.clone(), gateway, notifier);

        let result = h.handle(command()).await.unwrap();

        // Update only; no payment record is manufactured.
        assert_eq!(result, ProcessWebhookResult::Ignored);
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn unknown_event_type_is_acknowledged() {
        let store = Arc::new(MockStore::default());
        let gateway = Arc::new(MockGateway::verifying(GatewayEvent {
            id: "evt_9".to_string(),
            kind: GatewayEventKind::Unknown("charge.refunded".to_string()),
            data: GatewayEventData::Raw {
                json: "{}".to_string(),
            },
            created_at: 1704067200,
        }));
        let notifier = Arc::new(MockNotifier::default());
        let h = handler(store.clone(), gateway, notifier);

        let result = h.handle(command()).await.unwrap();

        assert_eq!(result, ProcessWebhookResult::Acknowledged);
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn store_failure_propagates_for_redelivery() {
        let store = Arc::new(MockStore {
            by_subscription: Mutex::new(Some(active_record())),
            fail_update: true,
            ..Default::default()
        });
        let gateway = Arc::new(MockGateway::verifying(subscription_event(
            GatewayEventKind::SubscriptionUpdated,
            "active",
        )));
        let notifier = Arc::new(MockNotifier::default());
        let h = handler(store, gateway, notifier.clone());

        let err = h.handle(command()).await.unwrap_err();

        assert!(matches!(err, SubscriptionError::Upstream(_)));
        assert_eq!(notifier.count(), 0);
    }
}
