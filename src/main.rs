use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{Method, header};
use secrecy::SecretString;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use subscription_service::adapters::http::subscription::{SubscriptionAppState, api_router};
use subscription_service::adapters::identity::{HttpIdentityNotifier, IdentityNotifierConfig};
use subscription_service::adapters::state::{HttpSubscriptionStore, StateStoreConfig};
use subscription_service::adapters::stripe::{StripeGateway, StripeGatewayConfig};
use subscription_service::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (reads .env if present)
    let config = AppConfig::load()?;
    config.validate()?;

    init_tracing(&config);

    tracing::info!(
        environment = ?config.server.environment,
        stripe_test_mode = config.payment.is_test_mode(),
        "starting subscription service"
    );

    let gateway = StripeGateway::new(StripeGatewayConfig::new(
        SecretString::new(config.payment.stripe_api_key.clone()),
        SecretString::new(config.payment.stripe_webhook_secret.clone()),
        config.payment.stripe_monthly_price_id.clone(),
        config.payment.stripe_yearly_price_id.clone(),
    ));

    let store = HttpSubscriptionStore::new(StateStoreConfig {
        base_url: config.state_service.base_url.clone(),
        api_key: SecretString::new(config.state_service.api_key.clone()),
        timeout: Duration::from_secs(config.state_service.timeout_secs),
    })?;

    let notifier = HttpIdentityNotifier::new(IdentityNotifierConfig {
        base_url: config.identity_service.base_url.clone(),
        api_key: SecretString::new(config.identity_service.api_key.clone()),
        timeout: Duration::from_secs(config.identity_service.timeout_secs),
    })?;

    let state = SubscriptionAppState {
        store: Arc::new(store),
        gateway: Arc::new(gateway),
        notifier: Arc::new(notifier),
        pricing: config.payment.plan_pricing(),
    };

    let app = create_app(state, &config);

    let addr = config.server.socket_addr()?;
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level));

    if config.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn create_app(state: SubscriptionAppState, config: &AppConfig) -> Router {
    Router::new()
        .nest("/api", api_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.server.request_timeout_secs,
                )))
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([Method::GET, Method::POST, Method::PATCH])
                        .allow_headers([header::CONTENT_TYPE]),
                )
                .layer(DefaultBodyLimit::max(1024 * 1024)),
        )
        .with_state(state)
}
