//! HTTP handlers for subscription endpoints.
//!
//! These handlers connect axum routes to application layer command/query
//! handlers. Callers identify users by path parameter; the webhook endpoint
//! is unauthenticated and relies on signature verification instead.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::handlers::subscription::{
    ActivateSubscriptionCommand, ActivateSubscriptionHandler, CancelSubscriptionCommand,
    CancelSubscriptionHandler, ChangePlanCommand, ChangePlanHandler, CreateSubscriptionCommand,
    CreateSubscriptionHandler, GetStatusHandler, GetStatusQuery, GetSubscriptionHandler,
    GetSubscriptionQuery,
};
use crate::application::handlers::webhook::{ProcessWebhookCommand, ProcessWebhookHandler};
use crate::domain::foundation::UserId;
use crate::domain::subscription::{PlanPricing, SubscriptionError, SubscriptionPlan};
use crate::ports::{IdentityNotifier, PaymentGateway, SubscriptionStore};

use super::dto::{
    ActivateSubscriptionRequest, ActiveResponse, CancelSubscriptionRequest, ChangePlanRequest,
    CreateSubscriptionRequest, CreateSubscriptionWithCardRequest, ErrorResponse, StatusResponse,
    SubscriptionResponse, WebhookAckResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state, cloned per request with Arc-wrapped ports.
#[derive(Clone)]
pub struct SubscriptionAppState {
    pub store: Arc<dyn SubscriptionStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn IdentityNotifier>,
    pub pricing: PlanPricing,
}

impl SubscriptionAppState {
    /// Create handlers on demand from the shared state.
    pub fn create_subscription_handler(&self) -> CreateSubscriptionHandler {
        CreateSubscriptionHandler::new(
            self.store.clone(),
            self.gateway.clone(),
            self.notifier.clone(),
            self.pricing.clone(),
        )
    }

    pub fn activate_subscription_handler(&self) -> ActivateSubscriptionHandler {
        ActivateSubscriptionHandler::new(
            self.store.clone(),
            self.gateway.clone(),
            self.notifier.clone(),
        )
    }

    pub fn cancel_subscription_handler(&self) -> CancelSubscriptionHandler {
        CancelSubscriptionHandler::new(
            self.store.clone(),
            self.gateway.clone(),
            self.notifier.clone(),
        )
    }

    pub fn change_plan_handler(&self) -> ChangePlanHandler {
        ChangePlanHandler::new(
            self.store.clone(),
            self.gateway.clone(),
            self.notifier.clone(),
        )
    }

    pub fn get_subscription_handler(&self) -> GetSubscriptionHandler {
        GetSubscriptionHandler::new(self.store.clone())
    }

    pub fn get_status_handler(&self) -> GetStatusHandler {
        GetStatusHandler::new(self.store.clone())
    }

    pub fn webhook_handler(&self) -> ProcessWebhookHandler {
        ProcessWebhookHandler::new(
            self.store.clone(),
            self.gateway.clone(),
            self.notifier.clone(),
        )
    }
}

fn parse_user_id(raw: &str) -> Result<UserId, SubscriptionError> {
    UserId::new(raw).map_err(|e| SubscriptionError::validation("userId", e.to_string()))
}

fn parse_plan(raw: &str) -> Result<SubscriptionPlan, SubscriptionError> {
    SubscriptionPlan::from_str(raw).map_err(|_| SubscriptionError::invalid_plan(raw))
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST/PATCH endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/subscriptions - Start a trial subscription
pub async fn create_subscription(
    State(state): State<SubscriptionAppState>,
    Json(request): Json<CreateSubscriptionRequest>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let handler = state.create_subscription_handler();
    let cmd = CreateSubscriptionCommand {
        user_id: parse_user_id(&request.user_id)?,
        email: request.email,
        name: request.name,
        plan: parse_plan(&request.plan)?,
        payment_method_id: None,
    };

    let record = handler.handle(cmd).await?;
    Ok((
        StatusCode::CREATED,
        Json(SubscriptionResponse::from(record)),
    ))
}

/// POST /api/subscriptions/card - Start a trial with a card on file
pub async fn create_subscription_with_card(
    State(state): State<SubscriptionAppState>,
    Json(request): Json<CreateSubscriptionWithCardRequest>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    if request.payment_method_id.trim().is_empty() {
        return Err(
            SubscriptionError::validation("paymentMethodId", "must not be empty").into(),
        );
    }

    let handler = state.create_subscription_handler();
    let cmd = CreateSubscriptionCommand {
        user_id: parse_user_id(&request.user_id)?,
        email: request.email,
        name: request.name,
        plan: parse_plan(&request.plan)?,
        payment_method_id: Some(request.payment_method_id),
    };

    let record = handler.handle(cmd).await?;
    Ok((
        StatusCode::CREATED,
        Json(SubscriptionResponse::from(record)),
    ))
}

/// POST /api/subscriptions/user/:user_id/activate - Convert trial to paid
pub async fn activate_subscription(
    State(state): State<SubscriptionAppState>,
    Path(user_id): Path<String>,
    request: Option<Json<ActivateSubscriptionRequest>>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let Json(request) = request.unwrap_or_default();
    let handler = state.activate_subscription_handler();
    let cmd = ActivateSubscriptionCommand {
        user_id: parse_user_id(&user_id)?,
        payment_method_id: request.payment_method_id,
    };

    let record = handler.handle(cmd).await?;
    Ok(Json(SubscriptionResponse::from(record)))
}

/// POST /api/subscriptions/user/:user_id/cancel - Cancel a subscription
pub async fn cancel_subscription(
    State(state): State<SubscriptionAppState>,
    Path(user_id): Path<String>,
    request: Option<Json<CancelSubscriptionRequest>>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let Json(request) = request.unwrap_or_default();
    let handler = state.cancel_subscription_handler();
    let cmd = CancelSubscriptionCommand {
        user_id: parse_user_id(&user_id)?,
        at_period_end: request.at_period_end,
    };

    let record = handler.handle(cmd).await?;
    Ok(Json(SubscriptionResponse::from(record)))
}

/// PATCH /api/subscriptions/user/:user_id/plan - Switch plans
pub async fn change_plan(
    State(state): State<SubscriptionAppState>,
    Path(user_id): Path<String>,
    Json(request): Json<ChangePlanRequest>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let handler = state.change_plan_handler();
    let cmd = ChangePlanCommand {
        user_id: parse_user_id(&user_id)?,
        new_plan: parse_plan(&request.plan)?,
    };

    let record = handler.handle(cmd).await?;
    Ok(Json(SubscriptionResponse::from(record)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/subscriptions/user/:user_id - Fetch the subscription record
pub async fn get_subscription(
    State(state): State<SubscriptionAppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let handler = state.get_subscription_handler();
    let record = handler
        .handle(GetSubscriptionQuery {
            user_id: parse_user_id(&user_id)?,
        })
        .await?;
    Ok(Json(SubscriptionResponse::from(record)))
}

/// GET /api/subscriptions/user/:user_id/status - Lifecycle summary
pub async fn get_status(
    State(state): State<SubscriptionAppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let handler = state.get_status_handler();
    let summary = handler
        .handle(GetStatusQuery {
            user_id: parse_user_id(&user_id)?,
        })
        .await?;
    Ok(Json(StatusResponse::from(summary)))
}

/// GET /api/subscriptions/user/:user_id/active - Activity check
pub async fn check_active(
    State(state): State<SubscriptionAppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let handler = state.get_status_handler();
    let summary = handler
        .handle(GetStatusQuery {
            user_id: parse_user_id(&user_id)?,
        })
        .await?;
    Ok(Json(ActiveResponse {
        is_active: summary.is_active,
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook Handler
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/webhooks/stripe - Processor webhook delivery
///
/// Any error here returns non-2xx so the processor redelivers; a 2xx with
/// `{"received": true}` acknowledges the event.
pub async fn handle_stripe_webhook(
    State(state): State<SubscriptionAppState>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(SubscriptionError::WebhookSignature)?;

    let handler = state.webhook_handler();
    handler
        .handle(ProcessWebhookCommand {
            payload: body.to_vec(),
            signature: signature.to_string(),
        })
        .await?;

    Ok(Json(WebhookAckResponse { received: true }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Mapping
// ════════════════════════════════════════════════════════════════════════════════

/// Wrapper translating domain errors into HTTP responses.
pub struct SubscriptionApiError(SubscriptionError);

impl From<SubscriptionError> for SubscriptionApiError {
    fn from(err: SubscriptionError) -> Self {
        Self(err)
    }
}

impl IntoResponse for SubscriptionApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self.0 {
            SubscriptionError::NotFound(_) => (StatusCode::NOT_FOUND, "SUBSCRIPTION_NOT_FOUND"),
            SubscriptionError::AlreadySubscribed(_) => {
                (StatusCode::CONFLICT, "ALREADY_SUBSCRIBED")
            }
            SubscriptionError::NotInTrial { .. } => (StatusCode::BAD_REQUEST, "NOT_IN_TRIAL"),
            SubscriptionError::SamePlan(_) => (StatusCode::BAD_REQUEST, "SAME_PLAN"),
            SubscriptionError::InvalidPlan(_) => (StatusCode::BAD_REQUEST, "INVALID_PLAN"),
            SubscriptionError::ValidationFailed { .. } => {
                (StatusCode::BAD_REQUEST, "VALIDATION_FAILED")
            }
            SubscriptionError::InvalidWebhook(_) => (StatusCode::BAD_REQUEST, "INVALID_WEBHOOK"),
            SubscriptionError::WebhookSignature => {
                (StatusCode::UNAUTHORIZED, "INVALID_WEBHOOK_SIGNATURE")
            }
            SubscriptionError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE"),
        };

        let body = ErrorResponse::new(code, self.0.message());
        (status, Json(body)).into_response()
    }
}
