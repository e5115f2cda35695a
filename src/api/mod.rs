pub mod handlers;
pub mod middleware;
pub mod response;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    services::ServeDir,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    service::ServiceContext,
    uploads::MAX_RECEIPT_SIZE,
};
use state::AppState;

/// Room for the receipt plus the other multipart fields.
const BANK_TRANSFER_BODY_LIMIT: usize = MAX_RECEIPT_SIZE + 1024 * 1024;

pub fn create_app(service_context: Arc<ServiceContext>, settings: Arc<Settings>) -> Router {
    let uploads_dir = settings.server.uploads_dir.clone();
    let app_state = AppState::new(service_context, settings);

    Router::new()
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))
        .nest("/api/v1", api_routes(app_state.clone()))
        // Receipts are stored as "uploads/receipts/<file>"
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .with_state(app_state)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Public: login and the gateway webhook
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/payments/payhere/notify", post(handlers::payments::payhere_notify))
        .merge(authenticated_routes(state))
}

fn authenticated_routes(state: AppState) -> Router<AppState> {
    let admin = from_fn_with_state(state.clone(), middleware::auth::require_admin);

    let mut router = Router::new()
        // Payments
        .route("/payments/checkout", post(handlers::payments::checkout))
        .route("/payments/my", get(handlers::payments::list_mine))
        .route("/payments/:id", get(handlers::payments::get))
        .route(
            "/payments",
            get(handlers::payments::list).route_layer(admin.clone()),
        )
        // Bank transfers
        .route(
            "/bank-transfers/account-details",
            get(handlers::bank_transfers::account_details),
        )
        .route("/bank-transfers/my", get(handlers::bank_transfers::list_mine))
        .route(
            "/bank-transfers",
            post(handlers::bank_transfers::submit)
                .layer(DefaultBodyLimit::max(BANK_TRANSFER_BODY_LIMIT))
                .merge(get(handlers::bank_transfers::list).route_layer(admin.clone())),
        )
        .route(
            "/bank-transfers/:id/approve",
            post(handlers::bank_transfers::approve).route_layer(admin.clone()),
        )
        .route(
            "/bank-transfers/:id/decline",
            post(handlers::bank_transfers::decline).route_layer(admin.clone()),
        )
        // Refund requests
        .route("/refund-requests/my", get(handlers::refunds::list_mine))
        .route(
            "/refund-requests",
            post(handlers::refunds::submit)
                .merge(get(handlers::refunds::list).route_layer(admin.clone())),
        )
        .route(
            "/refund-requests/:id/approve",
            post(handlers::refunds::approve).route_layer(admin.clone()),
        )
        .route(
            "/refund-requests/:id/decline",
            post(handlers::refunds::decline).route_layer(admin.clone()),
        )
        // Reports
        .nest("/reports", report_routes().route_layer(admin));

    if state.settings.server.is_development() {
        tracing::warn!("Development payment completion endpoint is enabled");
        router = router.route("/payments/dev/complete", post(handlers::payments::dev_complete));
    }

    router.route_layer(from_fn_with_state(state, middleware::auth::require_auth))
}

fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/overview", get(handlers::reports::overview))
        .route("/revenue", get(handlers::reports::revenue))
        .route("/payments", get(handlers::reports::payments))
        .route("/refunds", get(handlers::reports::refunds))
}
