//! GetSubscriptionHandler - fetches a user's subscription record.

use std::sync::Arc;

use crate::domain::foundation::UserId;
use crate::domain::subscription::{SubscriptionError, SubscriptionRecord};
use crate::ports::SubscriptionStore;

/// Query for a user's subscription record.
#[derive(Debug, Clone)]
pub struct GetSubscriptionQuery {
    pub user_id: UserId,
}

pub struct GetSubscriptionHandler {
    store: Arc<dyn SubscriptionStore>,
}

impl GetSubscriptionHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    pub async fn handle(
        &self,
        query: GetSubscriptionQuery,
    ) -> Result<SubscriptionRecord, SubscriptionError> {
        self.store
            .find_subscription(&query.user_id)
            .await
            .map_err(|e| SubscriptionError::upstream(e.to_string()))?
            .ok_or(SubscriptionError::NotFound(query.user_id))
    }
}
