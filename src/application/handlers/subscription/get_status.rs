//! GetStatusHandler - computes the lifecycle summary for a user.
//!
//! Read only. A user with no subscription gets an empty summary rather
//! than an error, so clients can render signup state without special
//! casing a 404.

use std::sync::Arc;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::subscription::{StatusSummary, SubscriptionError};
use crate::ports::SubscriptionStore;

/// Query for a user's subscription status.
#[derive(Debug, Clone)]
pub struct GetStatusQuery {
    pub user_id: UserId,
}

pub struct GetStatusHandler {
    store: Arc<dyn SubscriptionStore>,
}

impl GetStatusHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, query: GetStatusQuery) -> Result<StatusSummary, SubscriptionError> {
        let record = self
            .store
            .find_subscription(&query.user_id)
            .await
            .map_err(|e| SubscriptionError::upstream(e.to_string()))?;

        Ok(match record {
            Some(record) => record.status_summary(Timestamp::now()),
            None => StatusSummary::none(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::{
        PaymentRecord, PlanPricing, SubscriptionPlan, SubscriptionRecord, SubscriptionStatus,
    };
    use crate::ports::StoreError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockStore {
        existing: Mutex<Option<SubscriptionRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl SubscriptionStore for MockStore {
        async fn find_subscription(
            &self,
            _user_id: &UserId,
        ) -> Result<Option<SubscriptionRecord>, StoreError> {
            if self.fail {
                return Err(StoreError::Unavailable("state service down".into()));
            }
            Ok(self.existing.lock().unwrap().clone())
        }

        async fn find_subscription_by_processor_id(
            &self,
            _processor_subscription_id: &str,
        ) -> Result<Option<SubscriptionRecord>, StoreError> {
            Ok(None)
        }

        async fn save_subscription(
            &self,
            _record: &SubscriptionRecord,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn update_subscription(
            &self,
            _record: &SubscriptionRecord,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        async fn save_payment(&self, _record: &PaymentRecord) -> Result<(), StoreError> {
            Ok(())
        }

        async fn update_payment(&self, _record: &PaymentRecord) -> Result<(), StoreError> {
            Ok(())
        }

        async fn find_payment_by_intent(
            &self,
            _payment_intent_id: &str,
        ) -> Result<Option<PaymentRecord>, StoreError> {
            Ok(None)
        }
    }

    fn user() -> UserId {
        UserId::new("u1").unwrap()
    }

    #[tokio::test]
    async fn trial_summary_reports_active_trial() {
        let record = SubscriptionRecord::new_trial(
            user(),
            "cus_u1",
            SubscriptionPlan::Monthly,
            PlanPricing::default(),
            Timestamp::now(),
        );
        let store = Arc::new(MockStore {
            existing: Mutex::new(Some(record)),
            fail: false,
        });
        let h = GetStatusHandler::new(store);

        let summary = h.handle(GetStatusQuery { user_id: user() }).await.unwrap();

        assert!(summary.has_subscription);
        assert!(summary.is_active);
        assert!(summary.trial_active);
        assert_eq!(summary.status, Some(SubscriptionStatus::Trial));
        assert_eq!(summary.days_remaining, 30);
    }

    #[tokio::test]
    async fn no_subscription_yields_empty_summary() {
        let store = Arc::new(MockStore {
            existing: Mutex::new(None),
            fail: false,
        });
        let h = GetStatusHandler::new(store);

        let summary = h.handle(GetStatusQuery { user_id: user() }).await.unwrap();

        assert!(!summary.has_subscription);
        assert!(!summary.is_active);
        assert_eq!(summary.status, None);
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_upstream() {
        let store = Arc::new(MockStore {
            existing: Mutex::new(None),
            fail: true,
        });
        let h = GetStatusHandler::new(store);

        let err = h
            .handle(GetStatusQuery { user_id: user() })
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::Upstream(_)));
    }
}
