use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, response::ApiResponse, state::AppState},
    config::BankConfig,
    domain::{BankTransfer, BankTransferStatus, ReviewDecision},
    error::{AppError, Result},
    service::{ReceiptUpload, SubmitBankTransfer},
};

pub async fn account_details(State(state): State<AppState>) -> ApiResponse<BankConfig> {
    ApiResponse::ok(
        state
            .service_context
            .bank_transfer_service
            .account_details()
            .clone(),
    )
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::BadRequest(format!("Invalid multipart body: {}", e))
}

/// Multipart upload: `membership_id`, `amount_cents`, optional `currency`
/// and `notes`, plus the `receipt` image.
pub async fn submit(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<(StatusCode, ApiResponse<BankTransfer>)> {
    let mut membership_id = None;
    let mut amount_cents = None;
    let mut currency = None;
    let mut notes = None;
    let mut receipt = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "membership_id" => membership_id = Some(field.text().await.map_err(multipart_error)?),
            "amount_cents" => amount_cents = Some(field.text().await.map_err(multipart_error)?),
            "currency" => currency = Some(field.text().await.map_err(multipart_error)?),
            "notes" => notes = Some(field.text().await.map_err(multipart_error)?),
            "receipt" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                if !data.is_empty() {
                    receipt = Some(ReceiptUpload {
                        filename,
                        data: data.to_vec(),
                    });
                }
            }
            _ => {
                let _ = field.bytes().await;
            }
        }
    }

    // Checked before anything else so a missing file never creates records
    if receipt.is_none() {
        return Err(AppError::BadRequest("No file uploaded".to_string()));
    }

    let membership_id = membership_id
        .as_deref()
        .map(str::trim)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| AppError::BadRequest("membership_id must be a valid id".to_string()))?;

    let amount_cents = amount_cents
        .as_deref()
        .map(str::trim)
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| AppError::BadRequest("amount_cents must be a whole number".to_string()))?;

    let transfer = state
        .service_context
        .bank_transfer_service
        .submit(
            current_user.member.id,
            SubmitBankTransfer {
                membership_id,
                amount_cents,
                currency,
                notes,
            },
            receipt,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(transfer, "Bank transfer submitted for review"),
    ))
}

pub async fn list_mine(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<ApiResponse<Vec<BankTransfer>>> {
    let transfers = state
        .service_context
        .bank_transfer_service
        .list_for_member(current_user.member.id)
        .await?;

    Ok(ApiResponse::ok(transfers))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<BankTransferStatus>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<ApiResponse<Vec<BankTransfer>>> {
    let transfers = state
        .service_context
        .bank_transfer_service
        .list(query.status)
        .await?;

    Ok(ApiResponse::ok(transfers))
}

pub async fn approve(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    decision: Option<Json<ReviewDecision>>,
) -> Result<ApiResponse<BankTransfer>> {
    let decision = decision.map(|Json(d)| d).unwrap_or_default();
    let transfer = state
        .service_context
        .bank_transfer_service
        .approve(id, current_user.member.id, decision)
        .await?;

    Ok(ApiResponse::with_message(transfer, "Bank transfer approved"))
}

pub async fn decline(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    decision: Option<Json<ReviewDecision>>,
) -> Result<ApiResponse<BankTransfer>> {
    let decision = decision.map(|Json(d)| d).unwrap_or_default();
    let transfer = state
        .service_context
        .bank_transfer_service
        .decline(id, current_user.member.id, decision)
        .await?;

    Ok(ApiResponse::with_message(transfer, "Bank transfer declined"))
}
