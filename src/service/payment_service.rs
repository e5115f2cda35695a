use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    domain::*,
    error::{AppError, Result},
    notifications::{NotificationEvent, NotificationManager},
    payments::{
        payhere::parse_amount, CheckoutForm, NotificationStatus, PayHereGateway,
        PayHereNotification,
    },
    repository::{MemberRepository, MembershipRepository, PaymentRepository},
};

/// A freshly created pending payment and the form that sends the member to PayHere.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub payment: Payment,
    pub checkout: CheckoutForm,
}

/// What a completion callback did to the payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome")]
pub enum CallbackOutcome {
    Settled {
        status: PaymentStatus,
        membership_activated: bool,
    },
    /// The payment had already left Pending; nothing was changed.
    AlreadyResolved { status: PaymentStatus },
    /// The notification carries no state change we act on.
    Ignored,
}

pub struct PaymentService {
    payment_repo: Arc<dyn PaymentRepository>,
    membership_repo: Arc<dyn MembershipRepository>,
    member_repo: Arc<dyn MemberRepository>,
    gateway: Arc<PayHereGateway>,
    notifications: Arc<NotificationManager>,
}

impl PaymentService {
    pub fn new(
        payment_repo: Arc<dyn PaymentRepository>,
        membership_repo: Arc<dyn MembershipRepository>,
        member_repo: Arc<dyn MemberRepository>,
        gateway: Arc<PayHereGateway>,
        notifications: Arc<NotificationManager>,
    ) -> Self {
        Self {
            payment_repo,
            membership_repo,
            member_repo,
            gateway,
            notifications,
        }
    }

    pub async fn initiate_checkout(
        &self,
        member_id: Uuid,
        mut request: CheckoutRequest,
    ) -> Result<CheckoutSession> {
        request.customer = request.customer.normalized();
        request.validate()?;

        let currency = request
            .currency
            .as_deref()
            .map(str::to_uppercase)
            .unwrap_or_else(|| self.gateway.default_currency().to_string());

        if request.payment_type == PaymentType::Membership {
            let membership_id = request.related_id.ok_or_else(|| {
                AppError::BadRequest("Membership payments must reference a membership".to_string())
            })?;
            let membership = self
                .membership_repo
                .find_by_id(membership_id)
                .await?
                .filter(|m| m.member_id == member_id)
                .ok_or_else(|| AppError::NotFound("Membership not found".to_string()))?;

            ensure_payable(&membership, request.amount_cents)?;
            ensure_no_payment_in_flight(self.payment_repo.as_ref(), membership.id).await?;
        }

        let description = request
            .description
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();

        let payment = self
            .payment_repo
            .create(Payment::new_pending(
                member_id,
                request.amount_cents,
                currency,
                request.payment_type,
                PaymentMethod::Card,
                request.related_id,
                description,
            ))
            .await?;

        tracing::info!(
            "Created pending payment {} ({} cents {}) for member {}",
            payment.transaction_id,
            payment.amount_cents,
            payment.currency,
            member_id
        );

        let checkout = self.gateway.build_checkout(&payment, &request.customer);

        Ok(CheckoutSession { payment, checkout })
    }

    /// Apply a signed PayHere server-to-server notification.
    pub async fn handle_notification(&self, notification: PayHereNotification) -> Result<CallbackOutcome> {
        self.gateway.verify_notification(&notification)?;

        let payment = self.find_by_transaction_id(&notification.order_id).await?;

        if parse_amount(&notification.payhere_amount) != Some(payment.amount_cents)
            || !notification.payhere_currency.eq_ignore_ascii_case(&payment.currency)
        {
            tracing::warn!(
                "Notification for {} reports {} {}, expected {} cents {}",
                payment.transaction_id,
                notification.payhere_amount,
                notification.payhere_currency,
                payment.amount_cents,
                payment.currency
            );
            return Err(AppError::BadRequest(
                "Notification amount does not match payment".to_string(),
            ));
        }

        let target = match NotificationStatus::from(notification.status_code) {
            NotificationStatus::Success => PaymentStatus::Completed,
            NotificationStatus::Cancelled | NotificationStatus::Failed => PaymentStatus::Failed,
            NotificationStatus::Pending => {
                tracing::debug!("Payment {} still pending at gateway", payment.transaction_id);
                return Ok(CallbackOutcome::Ignored);
            }
            NotificationStatus::ChargedBack => {
                tracing::warn!(
                    "Chargeback reported for payment {}; refunds go through refund requests",
                    payment.transaction_id
                );
                return Ok(CallbackOutcome::Ignored);
            }
            NotificationStatus::Unknown(code) => {
                tracing::warn!(
                    "Unknown PayHere status code {} for payment {}",
                    code,
                    payment.transaction_id
                );
                return Ok(CallbackOutcome::Ignored);
            }
        };

        self.settle(payment, target, notification.payment_id.as_deref()).await
    }

    /// Manual completion used in development in place of the gateway callback.
    pub async fn complete_for_development(
        &self,
        transaction_id: &str,
        success: bool,
    ) -> Result<CallbackOutcome> {
        let payment = self.find_by_transaction_id(transaction_id).await?;
        let target = if success {
            PaymentStatus::Completed
        } else {
            PaymentStatus::Failed
        };

        tracing::info!("Development completion of {} as {}", transaction_id, target.as_str());
        self.settle(payment, target, None).await
    }

    async fn settle(
        &self,
        payment: Payment,
        to: PaymentStatus,
        gateway_payment_id: Option<&str>,
    ) -> Result<CallbackOutcome> {
        let membership_id = match payment.payment_type {
            PaymentType::Membership => payment.related_id,
            _ => None,
        };

        let settlement = self
            .payment_repo
            .settle_pending(payment.id, to, gateway_payment_id, membership_id)
            .await?;

        if !settlement.transitioned {
            // Another delivery may have won the race after our read
            let current = self
                .payment_repo
                .find_by_id(payment.id)
                .await?
                .map(|p| p.status)
                .unwrap_or(payment.status);
            tracing::debug!(
                "Payment {} already {}; ignoring duplicate completion",
                payment.transaction_id,
                current.as_str()
            );
            return Ok(CallbackOutcome::AlreadyResolved { status: current });
        }

        tracing::info!(
            "Payment {} moved to {} (membership activated: {})",
            payment.transaction_id,
            to.as_str(),
            settlement.membership_activated
        );

        let updated = self
            .payment_repo
            .find_by_id(payment.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if let Some(member) = self.member_repo.find_by_id(updated.member_id).await? {
            let event = match to {
                PaymentStatus::Completed => NotificationEvent::PaymentCompleted {
                    member,
                    payment: updated,
                },
                _ => NotificationEvent::PaymentFailed {
                    member,
                    payment: updated,
                },
            };
            self.notifications.notify(event).await;
        }

        Ok(CallbackOutcome::Settled {
            status: to,
            membership_activated: settlement.membership_activated,
        })
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Payment> {
        self.payment_repo
            .find_by_transaction_id(transaction_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))
    }

    /// A payment visible to `viewer`: their own, or any payment for admins.
    pub async fn get_for(&self, viewer: &Member, id: Uuid) -> Result<Payment> {
        let payment = self
            .payment_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if payment.member_id != viewer.id && !viewer.is_admin() {
            return Err(AppError::Forbidden);
        }
        Ok(payment)
    }

    pub async fn list_for_member(&self, member_id: Uuid) -> Result<Vec<Payment>> {
        self.payment_repo.find_by_member(member_id).await
    }

    pub async fn list(&self, filter: &PaymentFilter) -> Result<Vec<Payment>> {
        self.payment_repo.list(filter).await
    }
}

/// A membership can be paid for once, and only at its listed price.
pub(crate) fn ensure_payable(membership: &Membership, amount_cents: i64) -> Result<()> {
    if membership.status != MembershipStatus::PendingPayment {
        return Err(AppError::Conflict(format!(
            "Membership is {} and is not awaiting payment",
            membership.status.as_str()
        )));
    }
    if membership.price_cents != amount_cents {
        return Err(AppError::BadRequest(format!(
            "Amount must match the membership price of {} cents",
            membership.price_cents
        )));
    }
    Ok(())
}

/// A second payment may only start once the previous one has settled.
pub(crate) async fn ensure_no_payment_in_flight(
    payment_repo: &dyn PaymentRepository,
    membership_id: Uuid,
) -> Result<()> {
    if let Some(pending) = payment_repo.find_pending_for_membership(membership_id).await? {
        return Err(AppError::Conflict(format!(
            "Payment {} for this membership is still pending",
            pending.transaction_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::repository::{SqliteMemberRepository, SqliteMembershipRepository, SqlitePaymentRepository};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn service() -> (PaymentService, Arc<dyn PaymentRepository>, Arc<dyn MemberRepository>) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let payments: Arc<dyn PaymentRepository> = Arc::new(SqlitePaymentRepository::new(pool.clone()));
        let members: Arc<dyn MemberRepository> = Arc::new(SqliteMemberRepository::new(pool.clone()));
        let service = PaymentService::new(
            payments.clone(),
            Arc::new(SqliteMembershipRepository::new(pool)),
            members.clone(),
            Arc::new(PayHereGateway::new(Settings::default().payhere)),
            Arc::new(NotificationManager::new()),
        );
        (service, payments, members)
    }

    #[tokio::test]
    async fn late_duplicate_reports_the_status_that_won() {
        let (service, payments, members) = service().await;
        let member = members
            .create(CreateMemberRequest {
                email: "kasun@example.com".to_string(),
                full_name: "Kasun Silva".to_string(),
                phone: None,
                password: "password123".to_string(),
                role: MemberRole::Member,
            })
            .await
            .unwrap();
        let payment = payments
            .create(Payment::new_pending(
                member.id,
                150000,
                "LKR",
                PaymentType::Booking,
                PaymentMethod::Card,
                None,
                "Personal training",
            ))
            .await
            .unwrap();

        // The other delivery settles after this one read the payment as Pending
        service
            .settle(payment.clone(), PaymentStatus::Completed, Some("320025071278"))
            .await
            .unwrap();
        let outcome = service
            .settle(payment, PaymentStatus::Failed, None)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            CallbackOutcome::AlreadyResolved {
                status: PaymentStatus::Completed
            }
        );
    }

    #[test]
    fn only_pending_memberships_at_list_price_are_payable() {
        let mut membership = Membership {
            id: Uuid::new_v4(),
            member_id: Uuid::new_v4(),
            plan_name: "Monthly Unlimited".to_string(),
            duration_days: 30,
            price_cents: 750000,
            status: MembershipStatus::PendingPayment,
            starts_at: None,
            ends_at: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        assert!(ensure_payable(&membership, 750000).is_ok());
        assert!(matches!(ensure_payable(&membership, 700000), Err(AppError::BadRequest(_))));

        membership.status = MembershipStatus::Active;
        assert!(matches!(ensure_payable(&membership, 750000), Err(AppError::Conflict(_))));
    }
}
