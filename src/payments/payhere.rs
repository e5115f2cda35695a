//! PayHere hosted-checkout adapter.
//!
//! Checkout is a browser POST of hidden form fields to PayHere, signed with
//! `hash`. PayHere later calls our notify URL with a form-encoded body signed
//! with `md5sig`. Both signatures are upper-case MD5 over concatenated fields
//! plus the upper-case MD5 of the merchant secret.

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::{
    config::PayHereConfig,
    domain::{CustomerDetails, Payment},
    error::{AppError, Result},
};

const SANDBOX_CHECKOUT_URL: &str = "https://sandbox.payhere.lk/pay/checkout";
const LIVE_CHECKOUT_URL: &str = "https://www.payhere.lk/pay/checkout";

/// Everything the client needs to send the member to PayHere.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutForm {
    pub action_url: String,
    pub fields: Vec<(String, String)>,
    /// Self-submitting HTML page carrying the same fields
    pub html: String,
}

impl CheckoutForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Body of PayHere's server-to-server notification.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayHereNotification {
    pub merchant_id: String,
    pub order_id: String,
    #[serde(default)]
    pub payment_id: Option<String>,
    pub payhere_amount: String,
    pub payhere_currency: String,
    pub status_code: i32,
    pub md5sig: String,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStatus {
    Success,
    Pending,
    Cancelled,
    Failed,
    ChargedBack,
    Unknown(i32),
}

impl From<i32> for NotificationStatus {
    fn from(code: i32) -> Self {
        match code {
            2 => NotificationStatus::Success,
            0 => NotificationStatus::Pending,
            -1 => NotificationStatus::Cancelled,
            -2 => NotificationStatus::Failed,
            -3 => NotificationStatus::ChargedBack,
            other => NotificationStatus::Unknown(other),
        }
    }
}

pub struct PayHereGateway {
    config: PayHereConfig,
}

impl PayHereGateway {
    pub fn new(config: PayHereConfig) -> Self {
        Self { config }
    }

    pub fn checkout_url(&self) -> &'static str {
        if self.config.sandbox {
            SANDBOX_CHECKOUT_URL
        } else {
            LIVE_CHECKOUT_URL
        }
    }

    pub fn default_currency(&self) -> &str {
        &self.config.currency
    }

    fn hashed_secret(&self) -> String {
        md5_upper(&self.config.merchant_secret)
    }

    /// `hash` field for a checkout request.
    pub fn request_hash(&self, order_id: &str, amount_cents: i64, currency: &str) -> String {
        md5_upper(&format!(
            "{}{}{}{}{}",
            self.config.merchant_id,
            order_id,
            format_amount(amount_cents),
            currency,
            self.hashed_secret()
        ))
    }

    /// Expected `md5sig` for a notification.
    pub fn notification_signature(&self, notification: &PayHereNotification) -> String {
        md5_upper(&format!(
            "{}{}{}{}{}{}",
            notification.merchant_id,
            notification.order_id,
            notification.payhere_amount,
            notification.payhere_currency,
            notification.status_code,
            self.hashed_secret()
        ))
    }

    pub fn verify_notification(&self, notification: &PayHereNotification) -> Result<()> {
        if notification.merchant_id != self.config.merchant_id {
            return Err(AppError::BadRequest("Unknown merchant".to_string()));
        }

        let expected = self.notification_signature(notification);
        let received = notification.md5sig.trim().to_uppercase();
        let matches: bool = expected.as_bytes().ct_eq(received.as_bytes()).into();

        if !matches {
            return Err(AppError::BadRequest("Invalid signature".to_string()));
        }
        Ok(())
    }

    pub fn build_checkout(&self, payment: &Payment, customer: &CustomerDetails) -> CheckoutForm {
        let items = if payment.description.is_empty() {
            format!("{} payment", payment.payment_type.as_str())
        } else {
            payment.description.clone()
        };

        let fields: Vec<(String, String)> = [
            ("merchant_id", self.config.merchant_id.clone()),
            ("return_url", self.config.return_url.clone()),
            ("cancel_url", self.config.cancel_url.clone()),
            ("notify_url", self.config.notify_url.clone()),
            ("order_id", payment.transaction_id.clone()),
            ("items", items),
            ("currency", payment.currency.clone()),
            ("amount", format_amount(payment.amount_cents)),
            ("first_name", customer.first_name.clone()),
            ("last_name", customer.last_name.clone()),
            ("email", customer.email.clone()),
            ("phone", customer.phone.clone()),
            ("address", customer.address.clone()),
            ("city", customer.city.clone()),
            ("country", customer.country.clone()),
            ("custom_1", payment.id.to_string()),
            ("custom_2", payment.payment_type.as_str().to_string()),
            (
                "hash",
                self.request_hash(&payment.transaction_id, payment.amount_cents, &payment.currency),
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let html = render_auto_submit_form(self.checkout_url(), &fields);

        CheckoutForm {
            action_url: self.checkout_url().to_string(),
            fields,
            html,
        }
    }
}

fn md5_upper(input: &str) -> String {
    format!("{:X}", md5::compute(input.as_bytes()))
}

/// Minor units to PayHere's two-decimal string, e.g. 150000 -> "1500.00".
pub fn format_amount(amount_cents: i64) -> String {
    let sign = if amount_cents < 0 { "-" } else { "" };
    let abs = amount_cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parse "1500", "1500.5" or "1500.50" into minor units.
pub fn parse_amount(amount: &str) -> Option<i64> {
    let amount = amount.trim();
    let (whole, fraction) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };

    if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if fraction.len() > 2 || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole: i64 = whole.parse().ok()?;
    let fraction: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };

    whole.checked_mul(100)?.checked_add(fraction)
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn render_auto_submit_form(action: &str, fields: &[(String, String)]) -> String {
    let inputs: String = fields
        .iter()
        .map(|(name, value)| {
            format!(
                r#"    <input type="hidden" name="{}" value="{}">"#,
                escape_html(name),
                escape_html(value)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Redirecting to payment gateway</title></head>
<body onload="document.forms[0].submit()">
  <form method="post" action="{}">
{}
    <noscript><button type="submit">Continue to payment</button></noscript>
  </form>
</body>
</html>"#,
        escape_html(action),
        inputs
    )
}
