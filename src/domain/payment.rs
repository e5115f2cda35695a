use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    /// Order id sent to the gateway; unique per payment
    pub transaction_id: String,
    pub gateway_payment_id: Option<String>,
    pub member_id: Uuid,
    pub amount_cents: i64,
    pub refunded_cents: i64,
    pub currency: String,
    pub payment_type: PaymentType,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    pub related_id: Option<Uuid>,
    pub description: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Build a new pending payment with a fresh transaction id.
    pub fn new_pending(
        member_id: Uuid,
        amount_cents: i64,
        currency: impl Into<String>,
        payment_type: PaymentType,
        payment_method: PaymentMethod,
        related_id: Option<Uuid>,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            transaction_id: generate_transaction_id(),
            gateway_payment_id: None,
            member_id,
            amount_cents,
            refunded_cents: 0,
            currency: currency.into(),
            payment_type,
            payment_method,
            status: PaymentStatus::Pending,
            related_id,
            description: description.into(),
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn refundable_cents(&self) -> i64 {
        (self.amount_cents - self.refunded_cents).max(0)
    }

    /// Check whether `requested_cents` may be refunded from this payment right now.
    pub fn check_refundable(&self, requested_cents: i64) -> std::result::Result<(), RefundIneligibility> {
        if self.status != PaymentStatus::Completed {
            return Err(RefundIneligibility::PaymentNotCompleted(self.status));
        }
        if requested_cents <= 0 {
            return Err(RefundIneligibility::NonPositiveAmount);
        }
        let refundable = self.refundable_cents();
        if requested_cents > refundable {
            return Err(RefundIneligibility::ExceedsRefundable {
                requested_cents,
                refundable_cents: refundable,
            });
        }
        Ok(())
    }
}

/// Outcome of resolving a pending payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Settlement {
    /// False when the payment had already left `Pending`
    pub transitioned: bool,
    pub membership_activated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundIneligibility {
    PaymentNotCompleted(PaymentStatus),
    NonPositiveAmount,
    ExceedsRefundable { requested_cents: i64, refundable_cents: i64 },
}

impl std::fmt::Display for RefundIneligibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefundIneligibility::PaymentNotCompleted(status) => {
                write!(f, "Payment is {} and cannot be refunded", status.as_str())
            }
            RefundIneligibility::NonPositiveAmount => {
                write!(f, "Refund amount must be greater than zero")
            }
            RefundIneligibility::ExceedsRefundable { requested_cents, refundable_cents } => write!(
                f,
                "Requested refund of {} exceeds the refundable balance of {}",
                requested_cents, refundable_cents
            ),
        }
    }
}

/// `GYM-` followed by 16 upper-case hex characters.
pub fn generate_transaction_id() -> String {
    let simple = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("GYM-{}", &simple[..16])
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Refunded => "Refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(PaymentStatus::Pending),
            "Completed" => Some(PaymentStatus::Completed),
            "Failed" => Some(PaymentStatus::Failed),
            "Refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentType {
    Membership,
    Inventory,
    Booking,
    Other,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Membership => "Membership",
            PaymentType::Inventory => "Inventory",
            PaymentType::Booking => "Booking",
            PaymentType::Other => "Other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Membership" => Some(PaymentType::Membership),
            "Inventory" => Some(PaymentType::Inventory),
            "Booking" => Some(PaymentType::Booking),
            "Other" => Some(PaymentType::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "Card",
            PaymentMethod::BankTransfer => "BankTransfer",
            PaymentMethod::Cash => "Cash",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Card" => Some(PaymentMethod::Card),
            "BankTransfer" => Some(PaymentMethod::BankTransfer),
            "Cash" => Some(PaymentMethod::Cash),
            _ => None,
        }
    }
}

/// Contact details the gateway insists on for every checkout.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CustomerDetails {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 7, max = 20, message = "A valid phone number is required"))]
    pub phone: String,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "Country is required"))]
    pub country: String,
}

impl CustomerDetails {
    /// Trim surrounding whitespace so blank fields fail validation.
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.first_name,
            &mut self.last_name,
            &mut self.email,
            &mut self.phone,
            &mut self.address,
            &mut self.city,
            &mut self.country,
        ] {
            *field = field.trim().to_string();
        }
        self
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(range(min = 1, message = "Amount must be greater than zero"))]
    pub amount_cents: i64,
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: Option<String>,
    pub payment_type: PaymentType,
    pub related_id: Option<Uuid>,
    #[validate(length(max = 255, message = "Description must be at most 255 characters"))]
    pub description: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub customer: CustomerDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentFilter {
    pub status: Option<PaymentStatus>,
    pub payment_type: Option<PaymentType>,
    pub payment_method: Option<PaymentMethod>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
