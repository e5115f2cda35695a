pub mod member;
pub mod membership;
pub mod payment;
pub mod bank_transfer;
pub mod refund;
pub mod report;

pub use member::*;
pub use membership::*;
pub use payment::*;
pub use bank_transfer::*;
pub use refund::*;
pub use report::*;
