use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::{
    config::EmailConfig,
    error::{AppError, Result},
    notifications::{NotificationEvent, Notifier},
    payments::payhere::format_amount,
};

/// Outbound mail transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| AppError::Email(format!("Invalid SMTP host: {}", e)))?
            .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = config
            .from_address
            .parse::<Mailbox>()
            .map_err(|e| AppError::Email(format!("Invalid from address: {}", e)))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let to = to
            .parse::<Mailbox>()
            .map_err(|e| AppError::Email(format!("Invalid recipient {}: {}", to, e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AppError::Email(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Email(e.to_string()))?;

        Ok(())
    }
}

/// Used when SMTP is disabled; writes the message to the log instead.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        tracing::info!(to = %to, subject = %subject, "Email (not sent): {}", body);
        Ok(())
    }
}

pub struct EmailNotifier {
    mailer: Arc<dyn Mailer>,
}

impl EmailNotifier {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn handle_event(&self, event: &NotificationEvent) -> Result<()> {
        let (subject, body) = render(event);
        self.mailer.send(&event.member().email, &subject, &body).await
    }
}

fn money(cents: i64, currency: &str) -> String {
    format!("{} {}", currency, format_amount(cents))
}

/// Subject and plain-text body for an event.
pub fn render(event: &NotificationEvent) -> (String, String) {
    let greeting = format!("Hi {},", event.member().full_name);

    match event {
        NotificationEvent::PaymentCompleted { payment, .. } => (
            "Payment received".to_string(),
            format!(
                "{}\n\nWe received your payment of {} (reference {}). Thank you!",
                greeting,
                money(payment.amount_cents, &payment.currency),
                payment.transaction_id
            ),
        ),
        NotificationEvent::PaymentFailed { payment, .. } => (
            "Payment unsuccessful".to_string(),
            format!(
                "{}\n\nYour payment of {} (reference {}) did not go through. \
                 No money has been taken; please try again.",
                greeting,
                money(payment.amount_cents, &payment.currency),
                payment.transaction_id
            ),
        ),
        NotificationEvent::BankTransferApproved { transfer, .. } => (
            "Bank transfer approved".to_string(),
            format!(
                "{}\n\nYour bank transfer of {} has been verified and your membership is now active.{}",
                greeting,
                money(transfer.amount_cents, &transfer.currency),
                admin_note(transfer.admin_notes.as_deref())
            ),
        ),
        NotificationEvent::BankTransferDeclined { transfer, .. } => (
            "Bank transfer declined".to_string(),
            format!(
                "{}\n\nWe could not verify your bank transfer of {}.{}",
                greeting,
                money(transfer.amount_cents, &transfer.currency),
                admin_note(transfer.admin_notes.as_deref())
            ),
        ),
        NotificationEvent::RefundApproved { request, payment, .. } => (
            "Refund approved".to_string(),
            format!(
                "{}\n\nYour refund of {} for payment {} has been approved.{}",
                greeting,
                money(request.requested_cents, &payment.currency),
                payment.transaction_id,
                admin_note(request.admin_notes.as_deref())
            ),
        ),
        NotificationEvent::RefundDeclined { request, .. } => (
            "Refund declined".to_string(),
            format!(
                "{}\n\nYour refund request has been declined.{}",
                greeting,
                admin_note(request.admin_notes.as_deref())
            ),
        ),
    }
}

fn admin_note(notes: Option<&str>) -> String {
    match notes.map(str::trim).filter(|n| !n.is_empty()) {
        Some(n) => format!("\n\nNote from the gym: {}", n),
        None => String::new(),
    }
}
