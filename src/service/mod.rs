pub mod payment_service;
pub mod bank_transfer_service;
pub mod refund_service;
pub mod report_service;

use std::sync::Arc;
use sqlx::SqlitePool;
use crate::repository::*;
use crate::auth::AuthService;
use crate::config::Settings;
use crate::notifications::NotificationManager;
use crate::payments::PayHereGateway;
use payment_service::PaymentService;
use bank_transfer_service::BankTransferService;
use refund_service::RefundService;
use report_service::ReportService;

pub use payment_service::{CallbackOutcome, CheckoutSession};
pub use bank_transfer_service::{ReceiptUpload, SubmitBankTransfer};

pub struct ServiceContext {
    pub member_repo: Arc<dyn MemberRepository>,
    pub membership_repo: Arc<dyn MembershipRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub notifications: Arc<NotificationManager>,
    pub auth_service: Arc<AuthService>,
    pub payment_service: Arc<PaymentService>,
    pub bank_transfer_service: Arc<BankTransferService>,
    pub refund_service: Arc<RefundService>,
    pub report_service: Arc<ReportService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        db_pool: SqlitePool,
        settings: &Settings,
        notifications: Arc<NotificationManager>,
    ) -> Self {
        let member_repo: Arc<dyn MemberRepository> =
            Arc::new(SqliteMemberRepository::new(db_pool.clone()));
        let membership_repo: Arc<dyn MembershipRepository> =
            Arc::new(SqliteMembershipRepository::new(db_pool.clone()));
        let payment_repo: Arc<dyn PaymentRepository> =
            Arc::new(SqlitePaymentRepository::new(db_pool.clone()));
        let bank_transfer_repo = Arc::new(SqliteBankTransferRepository::new(db_pool.clone()));
        let refund_repo = Arc::new(SqliteRefundRepository::new(db_pool.clone()));
        let report_repo = Arc::new(SqliteReportRepository::new(db_pool.clone()));

        let auth_service = Arc::new(AuthService::new(
            db_pool.clone(),
            settings.auth.session_duration_hours,
        ));
        let gateway = Arc::new(PayHereGateway::new(settings.payhere.clone()));

        let payment_service = Arc::new(PaymentService::new(
            payment_repo.clone(),
            membership_repo.clone(),
            member_repo.clone(),
            gateway,
            notifications.clone(),
        ));
        let bank_transfer_service = Arc::new(BankTransferService::new(
            bank_transfer_repo,
            membership_repo.clone(),
            payment_repo.clone(),
            member_repo.clone(),
            notifications.clone(),
            settings.bank.clone(),
            settings.payhere.currency.clone(),
            settings.server.uploads_dir.clone(),
        ));
        let refund_service = Arc::new(RefundService::new(
            refund_repo,
            payment_repo.clone(),
            member_repo.clone(),
            notifications.clone(),
        ));
        let report_service = Arc::new(ReportService::new(report_repo));

        Self {
            member_repo,
            membership_repo,
            payment_repo,
            notifications,
            auth_service,
            payment_service,
            bank_transfer_service,
            refund_service,
            report_service,
            db_pool,
        }
    }
}
