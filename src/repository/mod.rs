use async_trait::async_trait;
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod member_repository;
pub mod membership_repository;
pub mod payment_repository;
pub mod bank_transfer_repository;
pub mod refund_repository;
pub mod report_repository;

pub use member_repository::SqliteMemberRepository;
pub use membership_repository::SqliteMembershipRepository;
pub use payment_repository::SqlitePaymentRepository;
pub use bank_transfer_repository::{BankTransferReview, SqliteBankTransferRepository};
pub use refund_repository::SqliteRefundRepository;
pub use report_repository::SqliteReportRepository;

#[async_trait]
pub trait MemberRepository: Send + Sync {
    async fn create(&self, member: CreateMemberRequest) -> Result<Member>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Member>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Member>>;
}

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn create(&self, request: CreateMembershipRequest) -> Result<Membership>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Membership>>;
    async fn find_by_member(&self, member_id: Uuid) -> Result<Vec<Membership>>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: Payment) -> Result<Payment>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>>;
    async fn find_pending_for_membership(&self, membership_id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_member(&self, member_id: Uuid) -> Result<Vec<Payment>>;
    async fn list(&self, filter: &PaymentFilter) -> Result<Vec<Payment>>;
    /// Move a pending payment to `to` and, on completion, activate the
    /// membership it paid for. Both happen in one transaction.
    async fn settle_pending(
        &self,
        id: Uuid,
        to: PaymentStatus,
        gateway_payment_id: Option<&str>,
        membership_id: Option<Uuid>,
    ) -> Result<Settlement>;
}

#[async_trait]
pub trait BankTransferRepository: Send + Sync {
    /// Store the transfer together with its pending payment.
    async fn create_with_payment(&self, new: NewBankTransfer) -> Result<(BankTransfer, Payment)>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<BankTransfer>>;
    async fn find_by_member(&self, member_id: Uuid) -> Result<Vec<BankTransfer>>;
    async fn list(&self, status: Option<BankTransferStatus>) -> Result<Vec<BankTransfer>>;
    async fn review(
        &self,
        id: Uuid,
        action: ReviewAction,
        processed_by: Uuid,
        admin_notes: Option<String>,
    ) -> Result<BankTransferReview>;
}

#[async_trait]
pub trait RefundRepository: Send + Sync {
    async fn create(&self, request: RefundRequest) -> Result<RefundRequest>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<RefundRequest>>;
    async fn find_pending_for_payment(&self, payment_id: Uuid) -> Result<Option<RefundRequest>>;
    async fn find_by_member(&self, member_id: Uuid) -> Result<Vec<RefundRequest>>;
    async fn list(&self, status: Option<RefundStatus>) -> Result<Vec<RefundRequest>>;
    /// Re-checks the refundable balance and applies the increment atomically.
    async fn approve(
        &self,
        id: Uuid,
        processed_by: Uuid,
        admin_notes: Option<String>,
    ) -> Result<(RefundRequest, Payment)>;
    async fn decline(
        &self,
        id: Uuid,
        processed_by: Uuid,
        admin_notes: Option<String>,
    ) -> Result<RefundRequest>;
}

#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn revenue(&self, period: ReportPeriod, range: DateRange) -> Result<Vec<RevenueBucket>>;
    async fn payment_breakdown(&self, grouping: PaymentGrouping, range: DateRange) -> Result<Vec<GroupTotal>>;
    async fn refund_summary(&self, range: DateRange) -> Result<Vec<GroupTotal>>;
    async fn overview(&self, range: DateRange) -> Result<Overview>;
}
