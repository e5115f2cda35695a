use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub id: Uuid,
    pub member_id: Uuid,
    pub plan_name: String,
    pub duration_days: i64,
    pub price_cents: i64,
    pub status: MembershipStatus,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MembershipStatus {
    PendingPayment,
    Active,
    Expired,
    Cancelled,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::PendingPayment => "PendingPayment",
            MembershipStatus::Active => "Active",
            MembershipStatus::Expired => "Expired",
            MembershipStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PendingPayment" => Some(MembershipStatus::PendingPayment),
            "Active" => Some(MembershipStatus::Active),
            "Expired" => Some(MembershipStatus::Expired),
            "Cancelled" => Some(MembershipStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateMembershipRequest {
    pub member_id: Uuid,
    pub plan_name: String,
    pub duration_days: i64,
    pub price_cents: i64,
}
