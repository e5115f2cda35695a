use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{
    api::{response::ApiResponse, state::AppState},
    domain::{DateRange, GroupTotal, Overview, PaymentGrouping, ReportPeriod, RevenueBucket},
    error::Result,
};

/// `?from=..&to=..` as RFC 3339 timestamps, plus the report-specific knobs.
#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub period: Option<ReportPeriod>,
    pub group_by: Option<PaymentGrouping>,
}

impl ReportQuery {
    fn range(&self) -> DateRange {
        DateRange {
            from: self.from,
            to: self.to,
        }
    }
}

pub async fn overview(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<ApiResponse<Overview>> {
    let overview = state.service_context.report_service.overview(query.range()).await?;
    Ok(ApiResponse::ok(overview))
}

pub async fn revenue(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<ApiResponse<Vec<RevenueBucket>>> {
    let buckets = state
        .service_context
        .report_service
        .revenue(query.period.unwrap_or_default(), query.range())
        .await?;

    Ok(ApiResponse::ok(buckets))
}

pub async fn payments(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<ApiResponse<Vec<GroupTotal>>> {
    let totals = state
        .service_context
        .report_service
        .payment_breakdown(query.group_by.unwrap_or_default(), query.range())
        .await?;

    Ok(ApiResponse::ok(totals))
}

pub async fn refunds(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<ApiResponse<Vec<GroupTotal>>> {
    let totals = state.service_context.report_service.refund_summary(query.range()).await?;
    Ok(ApiResponse::ok(totals))
}
