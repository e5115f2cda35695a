use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub member_id: Uuid,
    pub requested_cents: i64,
    pub notes: Option<String>,
    pub admin_notes: Option<String>,
    pub status: RefundStatus,
    pub processed_by: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RefundRequest {
    pub fn new(payment_id: Uuid, member_id: Uuid, requested_cents: i64, notes: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            payment_id,
            member_id,
            requested_cents,
            notes,
            admin_notes: None,
            status: RefundStatus::Pending,
            processed_by: None,
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.status, RefundStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RefundStatus {
    Pending,
    Approved,
    Declined,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "Pending",
            RefundStatus::Approved => "Approved",
            RefundStatus::Declined => "Declined",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(RefundStatus::Pending),
            "Approved" => Some(RefundStatus::Approved),
            "Declined" => Some(RefundStatus::Declined),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRefundRequest {
    pub payment_id: Uuid,
    #[validate(range(min = 1, message = "Refund amount must be greater than zero"))]
    pub requested_cents: i64,
    #[validate(length(max = 1000, message = "Notes must be at most 1000 characters"))]
    pub notes: Option<String>,
}

/// An admin's verdict on a pending refund request or bank transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Approve,
    Decline,
}

/// Body of an admin approve/decline action.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ReviewDecision {
    #[validate(length(max = 1000, message = "Admin notes must be at most 1000 characters"))]
    pub admin_notes: Option<String>,
}
