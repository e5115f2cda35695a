use serde::{Deserialize, Serialize};
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub payhere: PayHereConfig,
    #[serde(default)]
    pub bank: BankConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
    /// "development" enables the manual payment completion endpoint
    pub environment: String,
    pub uploads_dir: String,
}

impl ServerConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub session_duration_hours: i64,
    #[serde(default)]
    pub secure_cookies: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PayHereConfig {
    pub merchant_id: String,
    pub merchant_secret: String,
    #[serde(default = "default_true")]
    pub sandbox: bool,
    pub currency: String,
    pub return_url: String,
    pub cancel_url: String,
    pub notify_url: String,
}

/// Account details shown to members paying by bank transfer.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct BankConfig {
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
    pub branch: String,
    #[serde(default)]
    pub instructions: Option<String>,
}

/// Missing keys fall back to `Default`, so SMTP stays off until configured.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            username: None,
            password: None,
            from_address: "Barbell Gym <no-reply@barbell.local>".to_string(),
        }
    }
}

fn default_true() -> bool {
    true
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_url", "http://localhost:8080")?
            .set_default("server.environment", "production")?
            .set_default("server.uploads_dir", "uploads")?
            .set_default("database.url", "sqlite://barbell.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("auth.session_duration_hours", 24)?
            .set_default("payhere.sandbox", true)?
            .set_default("payhere.currency", "LKR")?
            .set_default("payhere.return_url", "http://localhost:3000/payment/success")?
            .set_default("payhere.cancel_url", "http://localhost:3000/payment/cancel")?
            .set_default("payhere.notify_url", "http://localhost:8080/api/v1/payments/payhere/notify")?
            .set_default("email.enabled", false)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Environment variables (BARBELL__PAYHERE__MERCHANT_SECRET etc.)
            .add_source(Environment::with_prefix("BARBELL").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
                environment: "production".to_string(),
                uploads_dir: "uploads".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://barbell.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig {
                session_duration_hours: 24,
                secure_cookies: false,
            },
            payhere: PayHereConfig {
                merchant_id: "1211149".to_string(),
                merchant_secret: "change-me-in-production".to_string(),
                sandbox: true,
                currency: "LKR".to_string(),
                return_url: "http://localhost:3000/payment/success".to_string(),
                cancel_url: "http://localhost:3000/payment/cancel".to_string(),
                notify_url: "http://localhost:8080/api/v1/payments/payhere/notify".to_string(),
            },
            bank: BankConfig {
                bank_name: "Example Bank".to_string(),
                account_name: "Barbell Fitness (Pvt) Ltd".to_string(),
                account_number: "0000000000".to_string(),
                branch: "Main".to_string(),
                instructions: Some("Use your email address as the transfer reference.".to_string()),
            },
            email: EmailConfig::default(),
        }
    }
}
