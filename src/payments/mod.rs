pub mod payhere;

pub use payhere::{CheckoutForm, NotificationStatus, PayHereGateway, PayHereNotification};
