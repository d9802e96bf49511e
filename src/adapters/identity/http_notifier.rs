//! HTTP client for the identity service's subscription mirror.
//!
//! Best-effort by contract: callers log failures and move on. The client
//! still reports precise errors so call sites can log cause and status.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;

use crate::domain::foundation::UserId;
use crate::ports::{IdentityNotifier, NotifyError, SubscriptionUpdate};

const API_KEY_HEADER: &str = "x-internal-api-key";

/// Configuration for the identity service client.
#[derive(Clone)]
pub struct IdentityNotifierConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub timeout: Duration,
}

/// Identity service implementation of the notifier port.
pub struct HttpIdentityNotifier {
    config: IdentityNotifierConfig,
    http_client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionUpdateBody<'a> {
    plan: &'a str,
    status: &'a str,
    trial_end: String,
    is_active: bool,
    cancel_at_period_end: bool,
}

impl HttpIdentityNotifier {
    pub fn new(config: IdentityNotifierConfig) -> Result<Self, NotifyError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotifyError::Unavailable(e.to_string()))?;
        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait]
impl IdentityNotifier for HttpIdentityNotifier {
    async fn notify_subscription_changed(
        &self,
        user_id: &UserId,
        update: SubscriptionUpdate,
    ) -> Result<(), NotifyError> {
        let url = format!(
            "{}/internal/users/{}/subscription",
            self.config.base_url.trim_end_matches('/'),
            user_id
        );

        let body = SubscriptionUpdateBody {
            plan: update.plan.as_str(),
            status: update.status.as_str(),
            trial_end: update.trial_end.to_rfc3339(),
            is_active: update.is_active,
            cancel_at_period_end: update.cancel_at_period_end,
        };

        let response = self
            .http_client
            .patch(&url)
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let error_text = response.text().await.unwrap_or_default();
        match status {
            s if s == StatusCode::NOT_FOUND || s.is_client_error() => {
                Err(NotifyError::Rejected(format!("{}: {}", s, error_text)))
            }
            s => Err(NotifyError::Unavailable(format!("{}: {}", s, error_text))),
        }
    }
}
