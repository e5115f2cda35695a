use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, SqliteConnection, FromRow};
use uuid::Uuid;

use crate::{
    domain::{Payment, RefundIneligibility, RefundRequest, RefundStatus},
    error::{contention_as_conflict, is_unique_violation, AppError, Result},
    repository::{
        payment_repository::{row_to_payment, PaymentRow, PAYMENT_COLUMNS},
        RefundRepository,
    },
};

const REFUND_COLUMNS: &str = r#"
    id, payment_id, member_id, requested_cents, notes, admin_notes, status,
    processed_by, processed_at, created_at, updated_at
"#;

#[derive(FromRow)]
struct RefundRow {
    id: String,
    payment_id: String,
    member_id: String,
    requested_cents: i64,
    notes: Option<String>,
    admin_notes: Option<String>,
    status: String,
    processed_by: Option<String>,
    processed_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}

fn row_to_refund(row: RefundRow) -> Result<RefundRequest> {
    Ok(RefundRequest {
        id: parse_uuid(&row.id)?,
        payment_id: parse_uuid(&row.payment_id)?,
        member_id: parse_uuid(&row.member_id)?,
        requested_cents: row.requested_cents,
        notes: row.notes,
        admin_notes: row.admin_notes,
        status: RefundStatus::parse(&row.status)
            .ok_or_else(|| AppError::Database(format!("Invalid refund status: {}", row.status)))?,
        processed_by: row.processed_by.as_deref().map(parse_uuid).transpose()?,
        processed_at: row.processed_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
        created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
    })
}

async fn fetch_refund(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<RefundRequest>> {
    let sql = format!("SELECT {} FROM refund_requests WHERE id = ?", REFUND_COLUMNS);
    let row = sqlx::query_as::<_, RefundRow>(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.map(row_to_refund).transpose()
}

async fn fetch_payment(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Payment>> {
    let sql = format!("SELECT {} FROM payments WHERE id = ?", PAYMENT_COLUMNS);
    let row = sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.map(row_to_payment).transpose()
}

/// Move a pending request to its decided status. This is the first write of a
/// review, so the transaction holds the write lock before anything is read.
async fn claim_pending_refund(
    conn: &mut SqliteConnection,
    id: Uuid,
    status: RefundStatus,
    processed_by: Uuid,
    admin_notes: &Option<String>,
) -> Result<()> {
    let now = Utc::now().naive_utc();
    let result = sqlx::query(
        r#"
        UPDATE refund_requests
        SET status = ?, admin_notes = ?, processed_by = ?, processed_at = ?, updated_at = ?
        WHERE id = ? AND status = 'Pending'
        "#
    )
    .bind(status.as_str())
    .bind(admin_notes)
    .bind(processed_by.to_string())
    .bind(now)
    .bind(now)
    .bind(id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(contention_as_conflict)?;

    if result.rows_affected() == 1 {
        return Ok(());
    }

    match fetch_refund(conn, id).await? {
        None => Err(AppError::NotFound("Refund request not found".to_string())),
        Some(request) => Err(AppError::Conflict(format!(
            "Refund request has already been {}",
            request.status.as_str().to_lowercase()
        ))),
    }
}

pub struct SqliteRefundRepository {
    pool: SqlitePool,
}

impl SqliteRefundRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefundRepository for SqliteRefundRepository {
    async fn create(&self, request: RefundRequest) -> Result<RefundRequest> {
        sqlx::query(
            r#"
            INSERT INTO refund_requests (
                id, payment_id, member_id, requested_cents, notes,
                status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(request.id.to_string())
        .bind(request.payment_id.to_string())
        .bind(request.member_id.to_string())
        .bind(request.requested_cents)
        .bind(&request.notes)
        .bind(request.status.as_str())
        .bind(request.created_at.naive_utc())
        .bind(request.updated_at.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("A refund request is already pending for this payment".to_string())
            } else {
                AppError::from(e)
            }
        })?;

        self.find_by_id(request.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created refund request".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<RefundRequest>> {
        let mut conn = self.pool.acquire().await?;
        fetch_refund(&mut conn, id).await
    }

    async fn find_pending_for_payment(&self, payment_id: Uuid) -> Result<Option<RefundRequest>> {
        let sql = format!(
            "SELECT {} FROM refund_requests WHERE payment_id = ? AND status = 'Pending'",
            REFUND_COLUMNS
        );
        let row = sqlx::query_as::<_, RefundRow>(&sql)
            .bind(payment_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_refund).transpose()
    }

    async fn find_by_member(&self, member_id: Uuid) -> Result<Vec<RefundRequest>> {
        let sql = format!(
            "SELECT {} FROM refund_requests WHERE member_id = ? ORDER BY created_at DESC",
            REFUND_COLUMNS
        );
        let rows = sqlx::query_as::<_, RefundRow>(&sql)
            .bind(member_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_refund).collect()
    }

    async fn list(&self, status: Option<RefundStatus>) -> Result<Vec<RefundRequest>> {
        let rows = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {} FROM refund_requests WHERE status = ? ORDER BY created_at DESC",
                    REFUND_COLUMNS
                );
                sqlx::query_as::<_, RefundRow>(&sql)
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM refund_requests ORDER BY created_at DESC",
                    REFUND_COLUMNS
                );
                sqlx::query_as::<_, RefundRow>(&sql)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(row_to_refund).collect()
    }

    async fn approve(
        &self,
        id: Uuid,
        processed_by: Uuid,
        admin_notes: Option<String>,
    ) -> Result<(RefundRequest, Payment)> {
        let mut tx = self.pool.begin().await?;

        claim_pending_refund(&mut tx, id, RefundStatus::Approved, processed_by, &admin_notes).await?;

        let request = fetch_refund(&mut tx, id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve approved refund request".to_string())
        })?;
        let payment = fetch_payment(&mut tx, request.payment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        // The balance may have moved since submission; returning early rolls the claim back
        payment
            .check_refundable(request.requested_cents)
            .map_err(|reason: RefundIneligibility| AppError::Conflict(reason.to_string()))?;

        let now = Utc::now().naive_utc();
        let swapped = sqlx::query(
            r#"
            UPDATE payments
            SET refunded_cents = refunded_cents + ?,
                status = CASE
                    WHEN refunded_cents + ? >= amount_cents THEN 'Refunded'
                    ELSE status
                END,
                updated_at = ?
            WHERE id = ?
              AND status = 'Completed'
              AND refunded_cents = ?
              AND refunded_cents + ? <= amount_cents
            "#
        )
        .bind(request.requested_cents)
        .bind(request.requested_cents)
        .bind(now)
        .bind(payment.id.to_string())
        .bind(payment.refunded_cents)
        .bind(request.requested_cents)
        .execute(&mut *tx)
        .await
        .map_err(contention_as_conflict)?;

        if swapped.rows_affected() != 1 {
            return Err(AppError::Conflict(
                "Payment changed while the refund was being approved".to_string(),
            ));
        }

        let payment = fetch_payment(&mut tx, payment.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve refunded payment".to_string())
        })?;

        tx.commit().await.map_err(contention_as_conflict)?;

        Ok((request, payment))
    }

    async fn decline(
        &self,
        id: Uuid,
        processed_by: Uuid,
        admin_notes: Option<String>,
    ) -> Result<RefundRequest> {
        let mut tx = self.pool.begin().await?;

        claim_pending_refund(&mut tx, id, RefundStatus::Declined, processed_by, &admin_notes).await?;

        let request = fetch_refund(&mut tx, id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve declined refund request".to_string())
        })?;

        tx.commit().await.map_err(contention_as_conflict)?;

        Ok(request)
    }
}
