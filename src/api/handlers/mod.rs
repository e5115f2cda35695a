pub mod root;
pub mod auth;
pub mod payments;
pub mod bank_transfers;
pub mod refunds;
pub mod reports;
