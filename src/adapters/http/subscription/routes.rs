//! Axum router configuration for subscription endpoints.

use axum::{
    routing::{get, patch, post},
    Router,
};

use super::handlers::{
    activate_subscription, cancel_subscription, change_plan, check_active, create_subscription,
    create_subscription_with_card, get_status, get_subscription, handle_stripe_webhook,
    SubscriptionAppState,
};

/// Create the subscription API router.
///
/// # Routes
///
/// - `POST /` - Start a trial subscription
/// - `POST /card` - Start a trial with a card on file
/// - `GET /user/:user_id` - Fetch the subscription record
/// - `GET /user/:user_id/status` - Lifecycle summary
/// - `GET /user/:user_id/active` - Activity check
/// - `POST /user/:user_id/activate` - Convert trial to paid
/// - `POST /user/:user_id/cancel` - Cancel (default at period end)
/// - `PATCH /user/:user_id/plan` - Switch plans
pub fn subscription_routes() -> Router<SubscriptionAppState> {
    Router::new()
        .route("/", post(create_subscription))
        .route("/card", post(create_subscription_with_card))
        .route("/user/:user_id", get(get_subscription))
        .route("/user/:user_id/status", get(get_status))
        .route("/user/:user_id/active", get(check_active))
        .route("/user/:user_id/activate", post(activate_subscription))
        .route("/user/:user_id/cancel", post(cancel_subscription))
        .route("/user/:user_id/plan", patch(change_plan))
}

/// Create the webhook router.
///
/// Separate from the subscription routes because webhook deliveries carry
/// no user auth; they are verified by signature instead.
pub fn webhook_routes() -> Router<SubscriptionAppState> {
    Router::new().route("/stripe", post(handle_stripe_webhook))
}

/// Complete API router, suitable for mounting at `/api`.
pub fn api_router() -> Router<SubscriptionAppState> {
    Router::new()
        .nest("/subscriptions", subscription_routes())
        .nest("/webhooks", webhook_routes())
}
