use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::BankConfig,
    domain::*,
    error::{AppError, Result},
    notifications::{NotificationEvent, NotificationManager},
    repository::{BankTransferRepository, MemberRepository, MembershipRepository, PaymentRepository},
    service::payment_service::{ensure_no_payment_in_flight, ensure_payable},
    uploads,
};

/// Receipt file as received from the client.
pub struct ReceiptUpload {
    pub filename: String,
    pub data: Vec<u8>,
}

pub struct SubmitBankTransfer {
    pub membership_id: Uuid,
    pub amount_cents: i64,
    pub currency: Option<String>,
    pub notes: Option<String>,
}

pub struct BankTransferService {
    repo: Arc<dyn BankTransferRepository>,
    membership_repo: Arc<dyn MembershipRepository>,
    payment_repo: Arc<dyn PaymentRepository>,
    member_repo: Arc<dyn MemberRepository>,
    notifications: Arc<NotificationManager>,
    bank: BankConfig,
    default_currency: String,
    uploads_dir: String,
}

impl BankTransferService {
    pub fn new(
        repo: Arc<dyn BankTransferRepository>,
        membership_repo: Arc<dyn MembershipRepository>,
        payment_repo: Arc<dyn PaymentRepository>,
        member_repo: Arc<dyn MemberRepository>,
        notifications: Arc<NotificationManager>,
        bank: BankConfig,
        default_currency: String,
        uploads_dir: String,
    ) -> Self {
        Self {
            repo,
            membership_repo,
            payment_repo,
            member_repo,
            notifications,
            bank,
            default_currency,
            uploads_dir,
        }
    }

    pub fn account_details(&self) -> &BankConfig {
        &self.bank
    }

    /// Store the receipt and open a pending transfer with its pending payment.
    pub async fn submit(
        &self,
        member_id: Uuid,
        request: SubmitBankTransfer,
        receipt: Option<ReceiptUpload>,
    ) -> Result<BankTransfer> {
        let receipt = receipt
            .filter(|r| !r.data.is_empty())
            .ok_or_else(|| AppError::BadRequest("No file uploaded".to_string()))?;

        if request.amount_cents <= 0 {
            return Err(AppError::Validation(
                "amount_cents: Amount must be greater than zero".to_string(),
            ));
        }

        let membership = self
            .membership_repo
            .find_by_id(request.membership_id)
            .await?
            .filter(|m| m.member_id == member_id)
            .ok_or_else(|| AppError::NotFound("Membership not found".to_string()))?;
        ensure_payable(&membership, request.amount_cents)?;
        ensure_no_payment_in_flight(self.payment_repo.as_ref(), membership.id).await?;

        // Validates type and size before anything is written
        uploads::receipt_extension(&receipt.filename)?;
        let receipt_url = uploads::save_receipt(&self.uploads_dir, &receipt.filename, &receipt.data).await?;

        let currency = request
            .currency
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| self.default_currency.clone());

        let created = self
            .repo
            .create_with_payment(NewBankTransfer {
                member_id,
                membership_id: membership.id,
                amount_cents: request.amount_cents,
                currency,
                receipt_url: receipt_url.clone(),
                notes: request.notes.filter(|n| !n.trim().is_empty()),
            })
            .await;

        let (transfer, payment) = match created {
            Ok(pair) => pair,
            Err(e) => {
                if let Err(cleanup) = uploads::delete_receipt(&self.uploads_dir, &receipt_url).await {
                    tracing::warn!("Failed to remove orphaned receipt {}: {}", receipt_url, cleanup);
                }
                return Err(e);
            }
        };

        tracing::info!(
            "Bank transfer {} submitted by member {} (payment {})",
            transfer.id,
            member_id,
            payment.transaction_id
        );

        Ok(transfer)
    }

    pub async fn approve(&self, id: Uuid, admin_id: Uuid, decision: ReviewDecision) -> Result<BankTransfer> {
        self.review(id, ReviewAction::Approve, admin_id, decision).await
    }

    pub async fn decline(&self, id: Uuid, admin_id: Uuid, decision: ReviewDecision) -> Result<BankTransfer> {
        self.review(id, ReviewAction::Decline, admin_id, decision).await
    }

    async fn review(
        &self,
        id: Uuid,
        action: ReviewAction,
        admin_id: Uuid,
        decision: ReviewDecision,
    ) -> Result<BankTransfer> {
        decision.validate()?;
        let admin_notes = decision.admin_notes.filter(|n| !n.trim().is_empty());
        let review = self.repo.review(id, action, admin_id, admin_notes).await?;
        let transfer = review.transfer;

        tracing::info!(
            "Bank transfer {} {} by {} (membership activated: {})",
            transfer.id,
            transfer.status.as_str(),
            admin_id,
            review.settlement.membership_activated
        );

        if let Some(member) = self.member_repo.find_by_id(transfer.member_id).await? {
            let event = match action {
                ReviewAction::Approve => NotificationEvent::BankTransferApproved {
                    member,
                    transfer: transfer.clone(),
                },
                ReviewAction::Decline => NotificationEvent::BankTransferDeclined {
                    member,
                    transfer: transfer.clone(),
                },
            };
            self.notifications.notify(event).await;
        }

        Ok(transfer)
    }

    pub async fn list_for_member(&self, member_id: Uuid) -> Result<Vec<BankTransfer>> {
        self.repo.find_by_member(member_id).await
    }

    pub async fn list(&self, status: Option<BankTransferStatus>) -> Result<Vec<BankTransfer>> {
        self.repo.list(status).await
    }
}
