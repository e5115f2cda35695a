use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Time bucket for revenue reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportPeriod {
    Day,
    #[default]
    Month,
    Year,
}

impl ReportPeriod {
    /// Length of the `YYYY-MM-DD HH:MM:SS` prefix that identifies a bucket.
    pub fn key_length(&self) -> i64 {
        match self {
            ReportPeriod::Day => 10,
            ReportPeriod::Month => 7,
            ReportPeriod::Year => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentGrouping {
    #[default]
    Type,
    Status,
    Method,
}

impl PaymentGrouping {
    pub fn column(&self) -> &'static str {
        match self {
            PaymentGrouping::Type => "payment_type",
            PaymentGrouping::Status => "status",
            PaymentGrouping::Method => "payment_method",
        }
    }
}

/// Optional inclusive `created_at` bounds.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RevenueBucket {
    pub period: String,
    pub payment_count: i64,
    pub gross_cents: i64,
    pub refunded_cents: i64,
    pub net_cents: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GroupTotal {
    pub group: String,
    pub count: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Overview {
    pub total_payments: i64,
    pub completed_gross_cents: i64,
    pub refunded_cents: i64,
    pub net_cents: i64,
    pub pending_payments: i64,
    pub pending_bank_transfers: i64,
    pub pending_refund_requests: i64,
}
