use std::sync::Arc;

use crate::{
    domain::*,
    error::{AppError, Result},
    repository::ReportRepository,
};

pub struct ReportService {
    repo: Arc<dyn ReportRepository>,
}

impl ReportService {
    pub fn new(repo: Arc<dyn ReportRepository>) -> Self {
        Self { repo }
    }

    pub async fn overview(&self, range: DateRange) -> Result<Overview> {
        check_range(&range)?;
        self.repo.overview(range).await.map_err(aggregation_failed)
    }

    pub async fn revenue(&self, period: ReportPeriod, range: DateRange) -> Result<Vec<RevenueBucket>> {
        check_range(&range)?;
        self.repo.revenue(period, range).await.map_err(aggregation_failed)
    }

    pub async fn payment_breakdown(&self, grouping: PaymentGrouping, range: DateRange) -> Result<Vec<GroupTotal>> {
        check_range(&range)?;
        self.repo.payment_breakdown(grouping, range).await.map_err(aggregation_failed)
    }

    pub async fn refund_summary(&self, range: DateRange) -> Result<Vec<GroupTotal>> {
        check_range(&range)?;
        self.repo.refund_summary(range).await.map_err(aggregation_failed)
    }
}

fn check_range(range: &DateRange) -> Result<()> {
    if let (Some(from), Some(to)) = (range.from, range.to) {
        if from > to {
            return Err(AppError::BadRequest("`from` must not be after `to`".to_string()));
        }
    }
    Ok(())
}

fn aggregation_failed(err: AppError) -> AppError {
    AppError::Internal(format!("Report aggregation failed: {}", err))
}
