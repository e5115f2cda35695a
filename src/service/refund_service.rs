use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::*,
    error::{AppError, Result},
    notifications::{NotificationEvent, NotificationManager},
    repository::{MemberRepository, PaymentRepository, RefundRepository},
};

pub struct RefundService {
    repo: Arc<dyn RefundRepository>,
    payment_repo: Arc<dyn PaymentRepository>,
    member_repo: Arc<dyn MemberRepository>,
    notifications: Arc<NotificationManager>,
}

impl RefundService {
    pub fn new(
        repo: Arc<dyn RefundRepository>,
        payment_repo: Arc<dyn PaymentRepository>,
        member_repo: Arc<dyn MemberRepository>,
        notifications: Arc<NotificationManager>,
    ) -> Self {
        Self {
            repo,
            payment_repo,
            member_repo,
            notifications,
        }
    }

    pub async fn submit(&self, member_id: Uuid, request: CreateRefundRequest) -> Result<RefundRequest> {
        request.validate()?;

        let payment = self
            .payment_repo
            .find_by_id(request.payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if payment.member_id != member_id {
            return Err(AppError::Forbidden);
        }

        payment
            .check_refundable(request.requested_cents)
            .map_err(|reason| match reason {
                RefundIneligibility::PaymentNotCompleted(_) => AppError::Conflict(reason.to_string()),
                _ => AppError::BadRequest(reason.to_string()),
            })?;

        if self.repo.find_pending_for_payment(payment.id).await?.is_some() {
            return Err(AppError::Conflict(
                "A refund request is already pending for this payment".to_string(),
            ));
        }

        let notes = request.notes.filter(|n| !n.trim().is_empty());
        let created = self
            .repo
            .create(RefundRequest::new(payment.id, member_id, request.requested_cents, notes))
            .await?;

        tracing::info!(
            "Refund request {} for {} cents on payment {}",
            created.id,
            created.requested_cents,
            payment.transaction_id
        );

        Ok(created)
    }

    pub async fn approve(&self, id: Uuid, admin_id: Uuid, decision: ReviewDecision) -> Result<RefundRequest> {
        decision.validate()?;
        let admin_notes = decision.admin_notes.filter(|n| !n.trim().is_empty());

        let (request, payment) = self.repo.approve(id, admin_id, admin_notes).await?;

        tracing::info!(
            "Refund request {} approved by {}; payment {} refunded {} of {} cents",
            request.id,
            admin_id,
            payment.transaction_id,
            payment.refunded_cents,
            payment.amount_cents
        );

        if let Some(member) = self.member_repo.find_by_id(request.member_id).await? {
            self.notifications
                .notify(NotificationEvent::RefundApproved {
                    member,
                    request: request.clone(),
                    payment,
                })
                .await;
        }

        Ok(request)
    }

    pub async fn decline(&self, id: Uuid, admin_id: Uuid, decision: ReviewDecision) -> Result<RefundRequest> {
        decision.validate()?;
        let admin_notes = decision.admin_notes.filter(|n| !n.trim().is_empty());

        let request = self.repo.decline(id, admin_id, admin_notes).await?;

        tracing::info!("Refund request {} declined by {}", request.id, admin_id);

        if let Some(member) = self.member_repo.find_by_id(request.member_id).await? {
            self.notifications
                .notify(NotificationEvent::RefundDeclined {
                    member,
                    request: request.clone(),
                })
                .await;
        }

        Ok(request)
    }

    pub async fn list_for_member(&self, member_id: Uuid) -> Result<Vec<RefundRequest>> {
        self.repo.find_by_member(member_id).await
    }

    pub async fn list(&self, status: Option<RefundStatus>) -> Result<Vec<RefundRequest>> {
        self.repo.list(status).await
    }
}
