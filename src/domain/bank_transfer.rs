use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A membership paid by bank transfer, awaiting admin review of the receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankTransfer {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub member_id: Uuid,
    pub membership_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub receipt_url: String,
    pub status: BankTransferStatus,
    pub notes: Option<String>,
    pub admin_notes: Option<String>,
    pub processed_by: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BankTransferStatus {
    Pending,
    Approved,
    Declined,
}

impl BankTransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BankTransferStatus::Pending => "Pending",
            BankTransferStatus::Approved => "Approved",
            BankTransferStatus::Declined => "Declined",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(BankTransferStatus::Pending),
            "Approved" => Some(BankTransferStatus::Approved),
            "Declined" => Some(BankTransferStatus::Declined),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewBankTransfer {
    pub member_id: Uuid,
    pub membership_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub receipt_url: String,
    pub notes: Option<String>,
}
