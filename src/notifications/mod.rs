use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::{BankTransfer, Member, Payment, RefundRequest};
use crate::error::Result;

pub mod email;

pub use email::{EmailNotifier, LogMailer, Mailer, SmtpMailer};

/// Member-facing outcomes of payment decisions.
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    PaymentCompleted { member: Member, payment: Payment },
    PaymentFailed { member: Member, payment: Payment },
    BankTransferApproved { member: Member, transfer: BankTransfer },
    BankTransferDeclined { member: Member, transfer: BankTransfer },
    RefundApproved { member: Member, request: RefundRequest, payment: Payment },
    RefundDeclined { member: Member, request: RefundRequest },
}

impl NotificationEvent {
    pub fn member(&self) -> &Member {
        match self {
            NotificationEvent::PaymentCompleted { member, .. }
            | NotificationEvent::PaymentFailed { member, .. }
            | NotificationEvent::BankTransferApproved { member, .. }
            | NotificationEvent::BankTransferDeclined { member, .. }
            | NotificationEvent::RefundApproved { member, .. }
            | NotificationEvent::RefundDeclined { member, .. } => member,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::PaymentCompleted { .. } => "payment_completed",
            NotificationEvent::PaymentFailed { .. } => "payment_failed",
            NotificationEvent::BankTransferApproved { .. } => "bank_transfer_approved",
            NotificationEvent::BankTransferDeclined { .. } => "bank_transfer_declined",
            NotificationEvent::RefundApproved { .. } => "refund_approved",
            NotificationEvent::RefundDeclined { .. } => "refund_declined",
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;
    fn is_enabled(&self) -> bool;
    async fn handle_event(&self, event: &NotificationEvent) -> Result<()>;
}

/// Fans events out to every registered notifier. Delivery is best-effort:
/// failures are logged and never reach the caller.
pub struct NotificationManager {
    notifiers: RwLock<Vec<Arc<dyn Notifier>>>,
}

impl NotificationManager {
    pub fn new() -> Self {
        Self {
            notifiers: RwLock::new(Vec::new()),
        }
    }

    pub async fn register(&self, notifier: Arc<dyn Notifier>) {
        if notifier.is_enabled() {
            tracing::info!("Registered notifier: {}", notifier.name());
            self.notifiers.write().await.push(notifier);
        }
    }

    pub async fn notify(&self, event: NotificationEvent) {
        let notifiers = self.notifiers.read().await;

        for notifier in notifiers.iter() {
            match notifier.handle_event(&event).await {
                Ok(_) => {
                    tracing::debug!(
                        "Notifier {} delivered {} to {}",
                        notifier.name(),
                        event.kind(),
                        event.member().email
                    );
                }
                Err(e) => {
                    tracing::error!(
                        "Notifier {} failed to deliver {}: {:?}",
                        notifier.name(),
                        event.kind(),
                        e
                    );
                }
            }
        }
    }
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}
