//! Stripe payment gateway adapter.
//!
//! Implements the `PaymentGateway` port against the Stripe REST API.
//! Calls use form-encoded bodies with the secret key as basic auth, matching
//! Stripe's API conventions. Webhook verification uses HMAC-SHA256 with
//! constant-time comparison and a replay window on the signed timestamp.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::subscription::SubscriptionPlan;
use crate::ports::{
    CreateCustomerRequest, CreateSubscriptionRequest, GatewayCustomer, GatewayError, GatewayEvent,
    GatewayEventData, GatewayEventKind, GatewaySubscription, PaymentGateway,
};

use super::webhook_types::{
    hex_encode, SignatureHeader, StripeCustomer, StripeInvoice, StripePaymentIntent,
    StripeSubscription, StripeWebhookEvent,
};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age for webhook events (5 minutes).
const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

/// Clock skew tolerance for future timestamps.
const MAX_FUTURE_TOLERANCE_SECS: i64 = 60;

/// Stripe API configuration for the gateway adapter.
#[derive(Clone)]
pub struct StripeGatewayConfig {
    /// Secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Webhook signing secret (whsec_...).
    webhook_secret: SecretString,

    api_base_url: String,

    /// Price ids for the two plans, configured per environment.
    monthly_price_id: String,
    yearly_price_id: String,
}

impl StripeGatewayConfig {
    pub fn new(
        api_key: SecretString,
        webhook_secret: SecretString,
        monthly_price_id: impl Into<String>,
        yearly_price_id: impl Into<String>,
    ) -> Self {
        Self {
            api_key,
            webhook_secret,
            api_base_url: "https://api.stripe.com".to_string(),
            monthly_price_id: monthly_price_id.into(),
            yearly_price_id: yearly_price_id.into(),
        }
    }

    /// Point the adapter at a different API host (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

/// Stripe implementation of the payment gateway port.
pub struct StripeGateway {
    config: StripeGatewayConfig,
    http_client: reqwest::Client,
}

impl StripeGateway {
    pub fn new(config: StripeGatewayConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn price_id(&self, plan: SubscriptionPlan) -> &str {
        match plan {
            SubscriptionPlan::Monthly => &self.config.monthly_price_id,
            SubscriptionPlan::Yearly => &self.config.yearly_price_id,
        }
    }

    async fn post_form(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<reqwest::Response, GatewayError> {
        let url = format!("{}{}", self.config.api_base_url, path);
        let response = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(params)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        Self::check_status(response).await
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        tracing::error!(status = %status, error = %error_text, "Stripe API call failed");
        if status.is_server_error() {
            Err(GatewayError::Unavailable(format!(
                "Stripe returned {}: {}",
                status, error_text
            )))
        } else {
            Err(GatewayError::Rejected(error_text))
        }
    }

    async fn parse_subscription(
        response: reqwest::Response,
    ) -> Result<GatewaySubscription, GatewayError> {
        let sub: StripeSubscription = response
            .json()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("unparseable Stripe response: {}", e)))?;
        Ok(subscription_from_stripe(sub))
    }

    /// Verify the HMAC-SHA256 signature over `timestamp.payload`.
    fn verify_signature(
        &self,
        payload: &[u8],
        header: &SignatureHeader,
    ) -> Result<(), GatewayError> {
        let now = chrono::Utc::now().timestamp();
        let age = now - header.timestamp;

        if age > MAX_TIMESTAMP_AGE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                age_secs = age,
                "webhook event too old, rejecting as possible replay"
            );
            return Err(GatewayError::InvalidSignature(format!(
                "event too old ({} seconds)",
                age
            )));
        }

        if age < -MAX_FUTURE_TOLERANCE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                "webhook event timestamp is in the future"
            );
            return Err(GatewayError::InvalidSignature(
                "event timestamp in future".to_string(),
            ));
        }

        let signed_payload = format!(
            "{}.{}",
            header.timestamp,
            String::from_utf8_lossy(payload)
        );

        let mut mac =
            HmacSha256::new_from_slice(self.config.webhook_secret.expose_secret().as_bytes())
                .expect("HMAC can take key of any size");
        mac.update(signed_payload.as_bytes());
        let expected = mac.finalize().into_bytes();

        if expected
            .as_slice()
            .ct_eq(header.v1_signature.as_slice())
            .unwrap_u8()
            != 1
        {
            tracing::warn!(
                expected_signature = hex_encode(expected.as_slice()),
                "webhook signature mismatch"
            );
            return Err(GatewayError::InvalidSignature(
                "signature mismatch".to_string(),
            ));
        }

        Ok(())
    }

    fn parse_event(&self, payload: &[u8]) -> Result<GatewayEvent, GatewayError> {
        let event: StripeWebhookEvent = serde_json::from_slice(payload).map_err(|e| {
            tracing::warn!(error = %e, "failed to parse webhook payload");
            GatewayError::MalformedEvent(format!("invalid JSON: {}", e))
        })?;

        let kind = event_kind(&event.event_type);
        let data = extract_event_data(&event)?;

        Ok(GatewayEvent {
            id: event.id,
            kind,
            data,
            created_at: event.created,
        })
    }
}

fn event_kind(event_type: &str) -> GatewayEventKind {
    match event_type {
        "customer.subscription.created" => GatewayEventKind::SubscriptionCreated,
        "customer.subscription.updated" => GatewayEventKind::SubscriptionUpdated,
        "customer.subscription.deleted" => GatewayEventKind::SubscriptionDeleted,
        "invoice.payment_succeeded" => GatewayEventKind::InvoicePaymentSucceeded,
        "invoice.payment_failed" => GatewayEventKind::InvoicePaymentFailed,
        "payment_intent.succeeded" => GatewayEventKind::PaymentIntentSucceeded,
        "payment_intent.payment_failed" => GatewayEventKind::PaymentIntentFailed,
        other => GatewayEventKind::Unknown(other.to_string()),
    }
}

fn extract_event_data(event: &StripeWebhookEvent) -> Result<GatewayEventData, GatewayError> {
    match event.event_type.as_str() {
        s if s.starts_with("customer.subscription.") => {
            let sub: StripeSubscription = serde_json::from_value(event.data.object.clone())
                .map_err(|e| {
                    GatewayError::MalformedEvent(format!("invalid subscription object: {}", e))
                })?;
            Ok(GatewayEventData::Subscription {
                subscription_id: sub.id,
                customer_id: sub.customer,
                status: sub.status,
                current_period_start: sub.current_period_start,
                current_period_end: sub.current_period_end,
                cancel_at_period_end: sub.cancel_at_period_end,
                canceled_at: sub.canceled_at,
            })
        }

        s if s.starts_with("invoice.") => {
            let invoice: StripeInvoice = serde_json::from_value(event.data.object.clone())
                .map_err(|e| {
                    GatewayError::MalformedEvent(format!("invalid invoice object: {}", e))
                })?;
            let failed = event.event_type == "invoice.payment_failed";
            Ok(GatewayEventData::Invoice {
                invoice_id: invoice.id,
                customer_id: invoice.customer,
                subscription_id: invoice.subscription,
                payment_intent_id: invoice.payment_intent,
                charge_id: invoice.charge,
                amount_minor: if failed {
                    invoice.amount_due
                } else {
                    invoice.amount_paid
                },
                currency: invoice.currency,
                description: invoice.description,
                period_start: invoice.period_start,
                period_end: invoice.period_end,
                receipt_url: invoice.hosted_invoice_url,
                failure_reason: None,
            })
        }

        s if s.starts_with("payment_intent.") => {
            let intent: StripePaymentIntent = serde_json::from_value(event.data.object.clone())
                .map_err(|e| {
                    GatewayError::MalformedEvent(format!("invalid payment intent object: {}", e))
                })?;
            // The human-readable message is the canonical reason; the error
            // code is only a fallback.
            let failure_reason = intent
                .last_payment_error
                .and_then(|e| e.message.or(e.code));
            Ok(GatewayEventData::PaymentIntent {
                payment_intent_id: intent.id,
                customer_id: intent.customer,
                amount_minor: intent.amount,
                currency: intent.currency,
                failure_reason,
            })
        }

        _ => Ok(GatewayEventData::Raw {
            json: serde_json::to_string(&event.data.object).unwrap_or_default(),
        }),
    }
}

fn subscription_from_stripe(sub: StripeSubscription) -> GatewaySubscription {
    GatewaySubscription {
        id: sub.id,
        customer_id: sub.customer,
        status: sub.status,
        current_period_start: sub.current_period_start,
        current_period_end: sub.current_period_end,
        cancel_at_period_end: sub.cancel_at_period_end,
        canceled_at: sub.canceled_at,
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<GatewayCustomer, GatewayError> {
        let mut params = vec![
            ("email", request.email.clone()),
            ("metadata[user_id]", request.user_id.to_string()),
        ];
        if let Some(name) = &request.name {
            params.push(("name", name.clone()));
        }

        let response = self.post_form("/v1/customers", &params).await?;
        let customer: StripeCustomer = response
            .json()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("unparseable Stripe response: {}", e)))?;

        Ok(GatewayCustomer {
            id: customer.id,
            email: customer.email.unwrap_or(request.email),
        })
    }

    async fn attach_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
    ) -> Result<(), GatewayError> {
        self.post_form(
            &format!("/v1/payment_methods/{}/attach", payment_method_id),
            &[("customer", customer_id.to_string())],
        )
        .await?;

        // Make it the default for future subscription invoices.
        self.post_form(
            &format!("/v1/customers/{}", customer_id),
            &[(
                "invoice_settings[default_payment_method]",
                payment_method_id.to_string(),
            )],
        )
        .await?;

        Ok(())
    }

    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<GatewaySubscription, GatewayError> {
        let mut params = vec![
            ("customer", request.customer_id.clone()),
            ("items[0][price]", self.price_id(request.plan).to_string()),
            (
                "trial_period_days",
                request.trial_period_days.to_string(),
            ),
        ];
        if let Some(pm) = &request.default_payment_method {
            params.push(("default_payment_method", pm.clone()));
        }

        let response = self.post_form("/v1/subscriptions", &params).await?;
        Self::parse_subscription(response).await
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> Result<GatewaySubscription, GatewayError> {
        let path = format!("/v1/subscriptions/{}", subscription_id);

        let response = if at_period_end {
            self.post_form(&path, &[("cancel_at_period_end", "true".to_string())])
                .await?
        } else {
            let url = format!("{}{}", self.config.api_base_url, path);
            let response = self
                .http_client
                .delete(&url)
                .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
                .send()
                .await
                .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
            Self::check_status(response).await?
        };

        Self::parse_subscription(response).await
    }

    async fn change_subscription_plan(
        &self,
        subscription_id: &str,
        new_plan: SubscriptionPlan,
    ) -> Result<GatewaySubscription, GatewayError> {
        // Fetch the subscription item id first; Stripe updates plans by
        // replacing the item's price.
        let url = format!(
            "{}/v1/subscriptions/{}",
            self.config.api_base_url, subscription_id
        );
        let response = self
            .http_client
            .get(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        let response = Self::check_status(response).await?;

        #[derive(serde::Deserialize)]
        struct SubWithItems {
            items: Items,
        }
        #[derive(serde::Deserialize)]
        struct Items {
            data: Vec<Item>,
        }
        #[derive(serde::Deserialize)]
        struct Item {
            id: String,
        }

        let sub: SubWithItems = response
            .json()
            .await
            .map_err(|e| GatewayError::Unavailable(format!("unparseable Stripe response: {}", e)))?;
        let item_id = sub
            .items
            .data
            .first()
            .map(|i| i.id.clone())
            .ok_or_else(|| GatewayError::Rejected("subscription has no items".to_string()))?;

        let response = self
            .post_form(
                &format!("/v1/subscriptions/{}", subscription_id),
                &[
                    ("items[0][id]", item_id),
                    ("items[0][price]", self.price_id(new_plan).to_string()),
                ],
            )
            .await?;
        Self::parse_subscription(response).await
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<GatewayEvent, GatewayError> {
        let header = SignatureHeader::parse(signature)
            .map_err(|e| GatewayError::InvalidSignature(e.to_string()))?;
        self.verify_signature(payload, &header)?;
        self.parse_event(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> StripeGateway {
        StripeGateway::new(StripeGatewayConfig::new(
            SecretString::new("sk_test_123".to_string()),
            SecretString::new("whsec_test".to_string()),
            "price_monthly",
            "price_yearly",
        ))
    }

    fn sign(secret: &str, timestamp: i64, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", timestamp, payload).as_bytes());
        let sig = hex_encode(mac.finalize().into_bytes().as_slice());
        format!("t={},v1={}", timestamp, sig)
    }

    fn subscription_payload() -> String {
        r#"{
            "id": "evt_1",
            "type": "customer.subscription.updated",
            "created": 1704067200,
            "livemode": false,
            "data": {
                "object": {
                    "id": "sub_1",
                    "customer": "cus_1",
                    "status": "past_due",
                    "current_period_start": 1704067200,
                    "current_period_end": 1706745600,
                    "cancel_at_period_end": false,
                    "canceled_at": null
                }
            }
        }"#
        .to_string()
    }

    #[test]
    fn accepts_fresh_valid_signature() {
        let gw = gateway();
        let payload = subscription_payload();
        let now = chrono::Utc::now().timestamp();
        let header = sign("whsec_test", now, &payload);

        let event = gw.verify_webhook(payload.as_bytes(), &header).unwrap();
        assert_eq!(event.kind, GatewayEventKind::SubscriptionUpdated);
        match event.data {
            GatewayEventData::Subscription { ref status, .. } => assert_eq!(status, "past_due"),
            ref other => panic!("unexpected data: {:?}", other),
        }
    }

    #[test]
    fn rejects_wrong_secret() {
        let gw = gateway();
        let payload = subscription_payload();
        let now = chrono::Utc::now().timestamp();
        let header = sign("whsec_wrong", now, &payload);

        let err = gw.verify_webhook(payload.as_bytes(), &header).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidSignature(_)));
    }

    #[test]
    fn rejects_stale_timestamp() {
        let gw = gateway();
        let payload = subscription_payload();
        let stale = chrono::Utc::now().timestamp() - 600;
        let header = sign("whsec_test", stale, &payload);

        let err = gw.verify_webhook(payload.as_bytes(), &header).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidSignature(_)));
    }

    #[test]
    fn rejects_future_timestamp() {
        let gw = gateway();
        let payload = subscription_payload();
        let future = chrono::Utc::now().timestamp() + 300;
        let header = sign("whsec_test", future, &payload);

        let err = gw.verify_webhook(payload.as_bytes(), &header).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidSignature(_)));
    }

    #[test]
    fn rejects_tampered_payload() {
        let gw = gateway();
        let payload = subscription_payload();
        let now = chrono::Utc::now().timestamp();
        let header = sign("whsec_test", now, &payload);

        let tampered = payload.replace("past_due", "active");
        let err = gw.verify_webhook(tampered.as_bytes(), &header).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidSignature(_)));
    }

    #[test]
    fn rejects_garbage_header() {
        let gw = gateway();
        let err = gw
            .verify_webhook(b"{}", "not-a-signature")
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidSignature(_)));
    }

    #[test]
    fn maps_event_types() {
        assert_eq!(
            event_kind("invoice.payment_succeeded"),
            GatewayEventKind::InvoicePaymentSucceeded
        );
        assert_eq!(
            event_kind("payment_intent.payment_failed"),
            GatewayEventKind::PaymentIntentFailed
        );
        assert_eq!(
            event_kind("charge.refunded"),
            GatewayEventKind::Unknown("charge.refunded".to_string())
        );
    }

    #[test]
    fn unknown_event_carries_raw_payload() {
        let gw = gateway();
        let payload = r#"{
            "id": "evt_2",
            "type": "charge.refunded",
            "created": 1704067200,
            "livemode": false,
            "data": { "object": { "id": "ch_1" } }
        }"#;
        let now = chrono::Utc::now().timestamp();
        let header = sign("whsec_test", now, payload);

        let event = gw.verify_webhook(payload.as_bytes(), &header).unwrap();
        assert!(matches!(event.data, GatewayEventData::Raw { .. }));
    }

    #[test]
    fn failed_invoice_uses_amount_due() {
        let gw = gateway();
        let payload = r#"{
            "id": "evt_3",
            "type": "invoice.payment_failed",
            "created": 1704067200,
            "livemode": false,
            "data": {
                "object": {
                    "id": "in_1",
                    "customer": "cus_1",
                    "subscription": "sub_1",
                    "payment_intent": "pi_1",
                    "amount_paid": 0,
                    "amount_due": 999,
                    "currency": "usd"
                }
            }
        }"#;
        let now = chrono::Utc::now().timestamp();
        let header = sign("whsec_test", now, payload);

        let event = gw.verify_webhook(payload.as_bytes(), &header).unwrap();
        match event.data {
            GatewayEventData::Invoice { amount_minor, .. } => assert_eq!(amount_minor, 999),
            ref other => panic!("unexpected data: {:?}", other),
        }
    }

    #[test]
    fn paid_invoice_carries_period_receipt_and_charge() {
        let gw = gateway();
        let payload = r#"{
            "id": "evt_4",
            "type": "invoice.payment_succeeded",
            "created": 1704067200,
            "livemode": false,
            "data": {
                "object": {
                    "id": "in_2",
                    "customer": "cus_1",
                    "subscription": "sub_1",
                    "payment_intent": "pi_2",
                    "charge": "ch_2",
                    "amount_paid": 999,
                    "amount_due": 999,
                    "currency": "usd",
                    "description": "Monthly subscription",
                    "period_start": 1704067200,
                    "period_end": 1706745600,
                    "hosted_invoice_url": "https://invoice.stripe.com/i/in_2"
                }
            }
        }"#;
        let now = chrono::Utc::now().timestamp();
        let header = sign("whsec_test", now, payload);

        let event = gw.verify_webhook(payload.as_bytes(), &header).unwrap();
        match event.data {
            GatewayEventData::Invoice {
                ref charge_id,
                period_start,
                period_end,
                ref receipt_url,
                ref description,
                ..
            } => {
                assert_eq!(charge_id.as_deref(), Some("ch_2"));
                assert_eq!(period_start, Some(1704067200));
                assert_eq!(period_end, Some(1706745600));
                assert_eq!(
                    receipt_url.as_deref(),
                    Some("https://invoice.stripe.com/i/in_2")
                );
                assert_eq!(description.as_deref(), Some("Monthly subscription"));
            }
            ref other => panic!("unexpected data: {:?}", other),
        }
    }

    #[test]
    fn intent_failure_reason_prefers_error_message() {
        let gw = gateway();
        let payload = r#"{
            "id": "evt_5",
            "type": "payment_intent.payment_failed",
            "created": 1704067200,
            "livemode": false,
            "data": {
                "object": {
                    "id": "pi_3",
                    "customer": "cus_1",
                    "amount": 999,
                    "currency": "usd",
                    "last_payment_error": {
                        "code": "card_declined",
                        "message": "Your card was declined."
                    }
                }
            }
        }"#;
        let now = chrono::Utc::now().timestamp();
        let header = sign("whsec_test", now, payload);

        let event = gw.verify_webhook(payload.as_bytes(), &header).unwrap();
        match event.data {
            GatewayEventData::PaymentIntent {
                ref failure_reason, ..
            } => assert_eq!(failure_reason.as_deref(), Some("Your card was declined.")),
            ref other => panic!("unexpected data: {:?}", other),
        }
    }
}
