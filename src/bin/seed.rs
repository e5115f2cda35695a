use barbell::{
    domain::{
        CreateMemberRequest, CreateMembershipRequest, MemberRole, Payment, PaymentMethod,
        PaymentStatus, PaymentType,
    },
    repository::{
        MemberRepository, MembershipRepository, PaymentRepository, SqliteMemberRepository,
        SqliteMembershipRepository, SqlitePaymentRepository,
    },
};
use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;

/// Populate a database with demo members, memberships and payments.
#[derive(Parser)]
#[command(name = "seed")]
struct Args {
    /// SQLite connection string
    #[arg(long, default_value = "sqlite://barbell.db?mode=rwc")]
    database_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    println!("🌱 Seeding {}...", args.database_url);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&args.database_url)
        .await?;

    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let member_repo = SqliteMemberRepository::new(db_pool.clone());
    let membership_repo = SqliteMembershipRepository::new(db_pool.clone());
    let payment_repo = SqlitePaymentRepository::new(db_pool.clone());

    println!("👥 Creating members...");
    member_repo.create(CreateMemberRequest {
        email: "admin@barbell.local".to_string(),
        full_name: "Front Desk Admin".to_string(),
        phone: None,
        password: "admin123".to_string(),
        role: MemberRole::Admin,
    }).await?;
    println!("  ✅ admin@barbell.local / admin123");

    let member = member_repo.create(CreateMemberRequest {
        email: "member@barbell.local".to_string(),
        full_name: "Sample Member".to_string(),
        phone: Some("0771234567".to_string()),
        password: "password123".to_string(),
        role: MemberRole::Member,
    }).await?;
    println!("  ✅ member@barbell.local / password123");

    println!("🏋️ Creating memberships...");
    let pending = membership_repo.create(CreateMembershipRequest {
        member_id: member.id,
        plan_name: "Monthly Unlimited".to_string(),
        duration_days: 30,
        price_cents: 750000,
    }).await?;
    println!("  ✅ Pending membership {} (LKR 7,500.00)", pending.id);

    let paid = membership_repo.create(CreateMembershipRequest {
        member_id: member.id,
        plan_name: "Annual Unlimited".to_string(),
        duration_days: 365,
        price_cents: 7500000,
    }).await?;

    println!("💳 Creating payments...");
    let completed = payment_repo.create(Payment::new_pending(
        member.id,
        paid.price_cents,
        "LKR",
        PaymentType::Membership,
        PaymentMethod::Card,
        Some(paid.id),
        "Annual Unlimited",
    )).await?;
    payment_repo
        .settle_pending(completed.id, PaymentStatus::Completed, Some("SEED-320000000001"), Some(paid.id))
        .await?;
    println!("  ✅ Completed {} (activated annual membership)", completed.transaction_id);

    let failed = payment_repo.create(Payment::new_pending(
        member.id,
        250000,
        "LKR",
        PaymentType::Inventory,
        PaymentMethod::Card,
        None,
        "Protein powder 2kg",
    )).await?;
    payment_repo
        .settle_pending(failed.id, PaymentStatus::Failed, None, None)
        .await?;
    println!("  ✅ Failed {}", failed.transaction_id);

    let booking = payment_repo.create(Payment::new_pending(
        member.id,
        150000,
        "LKR",
        PaymentType::Booking,
        PaymentMethod::Card,
        None,
        "Personal training session",
    )).await?;
    payment_repo
        .settle_pending(booking.id, PaymentStatus::Completed, Some("SEED-320000000002"), None)
        .await?;
    println!("  ✅ Completed {} (refundable)", booking.transaction_id);

    let open = payment_repo.create(Payment::new_pending(
        member.id,
        pending.price_cents,
        "LKR",
        PaymentType::Membership,
        PaymentMethod::Card,
        Some(pending.id),
        "Monthly Unlimited",
    )).await?;
    println!("  ✅ Pending {} (complete it via /api/v1/payments/dev/complete)", open.transaction_id);

    println!("🎉 Done.");
    Ok(())
}
