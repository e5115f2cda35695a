use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, response::ApiResponse, state::AppState},
    domain::{CreateRefundRequest, RefundRequest, RefundStatus, ReviewDecision},
    error::Result,
};

pub async fn submit(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(request): Json<CreateRefundRequest>,
) -> Result<(StatusCode, ApiResponse<RefundRequest>)> {
    let created = state
        .service_context
        .refund_service
        .submit(current_user.member.id, request)
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(created, "Refund request submitted"),
    ))
}

pub async fn list_mine(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<ApiResponse<Vec<RefundRequest>>> {
    let requests = state
        .service_context
        .refund_service
        .list_for_member(current_user.member.id)
        .await?;

    Ok(ApiResponse::ok(requests))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<RefundStatus>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<ApiResponse<Vec<RefundRequest>>> {
    let requests = state.service_context.refund_service.list(query.status).await?;
    Ok(ApiResponse::ok(requests))
}

pub async fn approve(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    decision: Option<Json<ReviewDecision>>,
) -> Result<ApiResponse<RefundRequest>> {
    let decision = decision.map(|Json(d)| d).unwrap_or_default();
    let request = state
        .service_context
        .refund_service
        .approve(id, current_user.member.id, decision)
        .await?;

    Ok(ApiResponse::with_message(request, "Refund approved"))
}

pub async fn decline(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    decision: Option<Json<ReviewDecision>>,
) -> Result<ApiResponse<RefundRequest>> {
    let decision = decision.map(|Json(d)| d).unwrap_or_default();
    let request = state
        .service_context
        .refund_service
        .decline(id, current_user.member.id, decision)
        .await?;

    Ok(ApiResponse::with_message(request, "Refund declined"))
}
