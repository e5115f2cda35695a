use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc, NaiveDateTime};
use sqlx::{SqlitePool, SqliteConnection, FromRow};
use uuid::Uuid;

use crate::{
    domain::{CreateMembershipRequest, Membership, MembershipStatus},
    error::{AppError, Result},
    repository::MembershipRepository,
};

#[derive(FromRow)]
struct MembershipRow {
    id: String,
    member_id: String,
    plan_name: String,
    duration_days: i64,
    price_cents: i64,
    status: String,
    starts_at: Option<NaiveDateTime>,
    ends_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

fn row_to_membership(row: MembershipRow) -> Result<Membership> {
    Ok(Membership {
        id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
        member_id: Uuid::parse_str(&row.member_id).map_err(|e| AppError::Database(e.to_string()))?,
        plan_name: row.plan_name,
        duration_days: row.duration_days,
        price_cents: row.price_cents,
        status: MembershipStatus::parse(&row.status)
            .ok_or_else(|| AppError::Database(format!("Invalid membership status: {}", row.status)))?,
        starts_at: row.starts_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
        ends_at: row.ends_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
        created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
    })
}

/// Activate a membership that is still awaiting payment. Returns false if it
/// was already activated (or is otherwise not awaiting payment).
pub(crate) async fn activate_pending_membership(conn: &mut SqliteConnection, id: Uuid) -> Result<bool> {
    let now = Utc::now().naive_utc();

    let duration_days: Option<i64> = sqlx::query_scalar(
        "SELECT duration_days FROM memberships WHERE id = ? AND status = 'PendingPayment'"
    )
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(duration_days) = duration_days else {
        return Ok(false);
    };

    let ends_at = now + Duration::days(duration_days);

    let result = sqlx::query(
        r#"
        UPDATE memberships
        SET status = 'Active', starts_at = ?, ends_at = ?, updated_at = ?
        WHERE id = ? AND status = 'PendingPayment'
        "#
    )
    .bind(now)
    .bind(ends_at)
    .bind(now)
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub struct SqliteMembershipRepository {
    pool: SqlitePool,
}

impl SqliteMembershipRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipRepository for SqliteMembershipRepository {
    async fn create(&self, request: CreateMembershipRequest) -> Result<Membership> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO memberships (
                id, member_id, plan_name, duration_days, price_cents,
                status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, 'PendingPayment', ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(request.member_id.to_string())
        .bind(&request.plan_name)
        .bind(request.duration_days)
        .bind(request.price_cents)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created membership".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Membership>> {
        let row = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT id, member_id, plan_name, duration_days, price_cents, status,
                   starts_at, ends_at, created_at, updated_at
            FROM memberships
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_membership).transpose()
    }

    async fn find_by_member(&self, member_id: Uuid) -> Result<Vec<Membership>> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT id, member_id, plan_name, duration_days, price_cents, status,
                   starts_at, ends_at, created_at, updated_at
            FROM memberships
            WHERE member_id = ?
            ORDER BY created_at DESC
            "#
        )
        .bind(member_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_membership).collect()
    }
}
