//! HTTP client for the remote state service.
//!
//! Implements the `SubscriptionStore` port over the state service's internal
//! REST API. Records travel as JSON; missing records surface as 404, which
//! this adapter maps to `Ok(None)` so absence and failure stay distinct.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::domain::foundation::UserId;
use crate::domain::subscription::{PaymentRecord, SubscriptionRecord};
use crate::ports::{StoreError, SubscriptionStore};

/// API key header the state service authenticates on.
const API_KEY_HEADER: &str = "x-internal-api-key";

/// Configuration for the state service client.
#[derive(Clone)]
pub struct StateStoreConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub timeout: Duration,
}

/// Remote state service implementation of the subscription store port.
pub struct HttpSubscriptionStore {
    config: StateStoreConfig,
    http_client: reqwest::Client,
}

impl HttpSubscriptionStore {
    pub fn new(config: StateStoreConfig) -> Result<Self, StoreError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_optional<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, StoreError> {
        let response = self
            .http_client
            .get(self.url(path))
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check_status(response).await?;
        let record = response
            .json()
            .await
            .map_err(|e| StoreError::Unavailable(format!("unparseable store response: {}", e)))?;
        Ok(Some(record))
    }

    async fn send_json<T: serde::Serialize>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &T,
    ) -> Result<(), StoreError> {
        let response = self
            .http_client
            .request(method, self.url(path))
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        tracing::error!(status = %status, error = %error_text, "state service call failed");
        match status {
            StatusCode::CONFLICT => Err(StoreError::Conflict(error_text)),
            s if s.is_client_error() => Err(StoreError::Rejected(error_text)),
            s => Err(StoreError::Unavailable(format!(
                "state service returned {}: {}",
                s, error_text
            ))),
        }
    }
}

#[async_trait]
impl SubscriptionStore for HttpSubscriptionStore {
    async fn find_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionRecord>, StoreError> {
        self.get_optional(&format!("/internal/subscriptions/user/{}", user_id))
            .await
    }

    async fn find_subscription_by_processor_id(
        &self,
        processor_subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, StoreError> {
        self.get_optional(&format!(
            "/internal/subscriptions/processor/{}",
            processor_subscription_id
        ))
        .await
    }

    async fn save_subscription(&self, record: &SubscriptionRecord) -> Result<(), StoreError> {
        self.send_json(reqwest::Method::POST, "/internal/subscriptions", record)
            .await
    }

    async fn update_subscription(&self, record: &SubscriptionRecord) -> Result<(), StoreError> {
        self.send_json(
            reqwest::Method::PUT,
            &format!("/internal/subscriptions/{}", record.id),
            record,
        )
        .await
    }

    async fn save_payment(&self, record: &PaymentRecord) -> Result<(), StoreError> {
        self.send_json(reqwest::Method::POST, "/internal/payments", record)
            .await
    }

    async fn update_payment(&self, record: &PaymentRecord) -> Result<(), StoreError> {
        self.send_json(
            reqwest::Method::PUT,
            &format!("/internal/payments/{}", record.id),
            record,
        )
        .await
    }

    async fn find_payment_by_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<PaymentRecord>, StoreError> {
        self.get_optional(&format!("/internal/payments/intent/{}", payment_intent_id))
            .await
    }
}
