#![allow(dead_code)]

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use barbell::{
    config::Settings,
    domain::{
        CreateMemberRequest, CreateMembershipRequest, CustomerDetails, Member, MemberRole,
        Membership, Payment, PaymentMethod, PaymentType,
    },
    error::Result as AppResult,
    notifications::{EmailNotifier, Mailer, NotificationManager},
    payments::PayHereNotification,
    repository::{
        MemberRepository, MembershipRepository, PaymentRepository, SqliteMemberRepository,
        SqliteMembershipRepository, SqlitePaymentRepository,
    },
    service::ServiceContext,
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mailer that keeps every message in memory.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.sent().into_iter().map(|m| m.subject).collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

pub struct TestContext {
    pub pool: SqlitePool,
    pub ctx: Arc<ServiceContext>,
    pub settings: Settings,
    pub mailer: Arc<RecordingMailer>,
    pub uploads_dir: PathBuf,
}

impl Drop for TestContext {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.uploads_dir);
    }
}

/// One shared connection so the in-memory database lives for the whole test.
pub async fn test_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

pub fn test_settings(environment: &str, uploads_dir: &PathBuf) -> Settings {
    let mut settings = Settings::default();
    settings.server.environment = environment.to_string();
    settings.server.uploads_dir = uploads_dir.to_string_lossy().to_string();
    settings.payhere.merchant_id = "1211149".to_string();
    settings.payhere.merchant_secret = "test-secret".to_string();
    settings
}

pub async fn setup() -> anyhow::Result<TestContext> {
    setup_in("development").await
}

/// A database file with several connections, so transactions really race.
pub async fn file_pool(path: &std::path::Path, connections: u32) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("barbell-test-{}", uuid::Uuid::new_v4()))
}

pub async fn setup_in(environment: &str) -> anyhow::Result<TestContext> {
    let pool = test_pool().await?;
    context_for(pool, environment, scratch_dir()).await
}

/// Same as `setup`, backed by a file database in the scratch directory.
pub async fn setup_on_file(connections: u32) -> anyhow::Result<TestContext> {
    let dir = scratch_dir();
    std::fs::create_dir_all(&dir)?;
    let pool = file_pool(&dir.join("barbell.db"), connections).await?;
    context_for(pool, "development", dir).await
}

async fn context_for(
    pool: SqlitePool,
    environment: &str,
    uploads_dir: PathBuf,
) -> anyhow::Result<TestContext> {
    let settings = test_settings(environment, &uploads_dir);

    let mailer = Arc::new(RecordingMailer::default());
    let notifications = Arc::new(NotificationManager::new());
    notifications
        .register(Arc::new(EmailNotifier::new(mailer.clone())))
        .await;

    let ctx = Arc::new(ServiceContext::new(pool.clone(), &settings, notifications));

    Ok(TestContext {
        pool,
        ctx,
        settings,
        mailer,
        uploads_dir,
    })
}

pub async fn create_member(pool: &SqlitePool, email: &str, role: MemberRole) -> anyhow::Result<Member> {
    let member = SqliteMemberRepository::new(pool.clone())
        .create(CreateMemberRequest {
            email: email.to_string(),
            full_name: "Test Member".to_string(),
            phone: Some("0771234567".to_string()),
            password: "password123".to_string(),
            role,
        })
        .await?;
    Ok(member)
}

pub async fn create_pending_membership(
    pool: &SqlitePool,
    member_id: uuid::Uuid,
    price_cents: i64,
) -> anyhow::Result<Membership> {
    let membership = SqliteMembershipRepository::new(pool.clone())
        .create(CreateMembershipRequest {
            member_id,
            plan_name: "Monthly Unlimited".to_string(),
            duration_days: 30,
            price_cents,
        })
        .await?;
    Ok(membership)
}

pub async fn find_membership(pool: &SqlitePool, id: uuid::Uuid) -> anyhow::Result<Membership> {
    SqliteMembershipRepository::new(pool.clone())
        .find_by_id(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("membership {} missing", id))
}

pub async fn find_payment(pool: &SqlitePool, id: uuid::Uuid) -> anyhow::Result<Payment> {
    SqlitePaymentRepository::new(pool.clone())
        .find_by_id(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("payment {} missing", id))
}

/// A payment that has already been completed by the gateway.
pub async fn completed_payment(
    pool: &SqlitePool,
    member_id: uuid::Uuid,
    amount_cents: i64,
) -> anyhow::Result<Payment> {
    let repo = SqlitePaymentRepository::new(pool.clone());
    let payment = repo
        .create(Payment::new_pending(
            member_id,
            amount_cents,
            "LKR",
            PaymentType::Booking,
            PaymentMethod::Card,
            None,
            "Personal training",
        ))
        .await?;
    repo.settle_pending(payment.id, barbell::domain::PaymentStatus::Completed, Some("320000000001"), None)
        .await?;
    find_payment(pool, payment.id).await
}

pub fn customer() -> CustomerDetails {
    CustomerDetails {
        first_name: "Nimal".to_string(),
        last_name: "Perera".to_string(),
        email: "nimal@example.com".to_string(),
        phone: "0771234567".to_string(),
        address: "12 Galle Road".to_string(),
        city: "Colombo".to_string(),
        country: "Sri Lanka".to_string(),
    }
}

/// Notification signed the way PayHere signs it, using the test secret.
pub fn signed_notification(payment: &Payment, status_code: i32) -> PayHereNotification {
    let secret_hash = format!("{:X}", md5::compute(b"test-secret"));
    let amount = format!("{}.{:02}", payment.amount_cents / 100, payment.amount_cents % 100);
    let md5sig = format!(
        "{:X}",
        md5::compute(
            format!(
                "1211149{}{}{}{}{}",
                payment.transaction_id, amount, payment.currency, status_code, secret_hash
            )
            .as_bytes()
        )
    );

    PayHereNotification {
        merchant_id: "1211149".to_string(),
        order_id: payment.transaction_id.clone(),
        payment_id: Some("320025071278".to_string()),
        payhere_amount: amount,
        payhere_currency: payment.currency.clone(),
        status_code,
        md5sig,
        status_message: Some("Successfully completed the payment.".to_string()),
        method: Some("VISA".to_string()),
    }
}
