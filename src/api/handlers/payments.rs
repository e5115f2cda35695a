use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Form, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, response::ApiResponse, state::AppState},
    domain::{CheckoutRequest, Payment, PaymentFilter},
    error::Result,
    payments::PayHereNotification,
    service::{CallbackOutcome, CheckoutSession},
};

pub async fn checkout(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, ApiResponse<CheckoutSession>)> {
    let session = state
        .service_context
        .payment_service
        .initiate_checkout(current_user.member.id, request)
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(session, "Redirect to the payment gateway to complete payment"),
    ))
}

pub async fn list_mine(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<ApiResponse<Vec<Payment>>> {
    let payments = state
        .service_context
        .payment_service
        .list_for_member(current_user.member.id)
        .await?;

    Ok(ApiResponse::ok(payments))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Payment>> {
    let payment = state
        .service_context
        .payment_service
        .get_for(&current_user.member, id)
        .await?;

    Ok(ApiResponse::ok(payment))
}

pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<PaymentFilter>,
) -> Result<ApiResponse<Vec<Payment>>> {
    let payments = state.service_context.payment_service.list(&filter).await?;
    Ok(ApiResponse::ok(payments))
}

/// PayHere server-to-server notification. Public, authenticated by `md5sig`.
pub async fn payhere_notify(
    State(state): State<AppState>,
    Form(notification): Form<PayHereNotification>,
) -> Result<ApiResponse<CallbackOutcome>> {
    tracing::debug!(
        "PayHere notification for {} with status {}",
        notification.order_id,
        notification.status_code
    );

    let outcome = state
        .service_context
        .payment_service
        .handle_notification(notification)
        .await?;

    Ok(ApiResponse::ok(outcome))
}

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
pub enum DevOutcome {
    #[default]
    Completed,
    Failed,
}

#[derive(Debug, Deserialize)]
pub struct DevCompleteRequest {
    pub transaction_id: String,
    #[serde(default)]
    pub outcome: DevOutcome,
}

/// Stand-in for the gateway callback; only routed in development.
pub async fn dev_complete(
    State(state): State<AppState>,
    Json(request): Json<DevCompleteRequest>,
) -> Result<ApiResponse<CallbackOutcome>> {
    let outcome = state
        .service_context
        .payment_service
        .complete_for_development(
            request.transaction_id.trim(),
            request.outcome == DevOutcome::Completed,
        )
        .await?;

    Ok(ApiResponse::ok(outcome))
}
