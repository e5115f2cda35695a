use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, SqliteConnection, FromRow, QueryBuilder, Sqlite};
use uuid::Uuid;

use crate::{
    domain::{Payment, PaymentFilter, PaymentMethod, PaymentStatus, PaymentType, Settlement},
    error::{is_unique_violation, AppError, Result},
    repository::{membership_repository::activate_pending_membership, PaymentRepository},
};

pub(crate) const PAYMENT_COLUMNS: &str = r#"
    id, transaction_id, gateway_payment_id, member_id, amount_cents,
    refunded_cents, currency, payment_type, payment_method, status,
    related_id, description, paid_at, created_at, updated_at
"#;

#[derive(FromRow)]
pub(crate) struct PaymentRow {
    id: String,
    transaction_id: String,
    gateway_payment_id: Option<String>,
    member_id: String,
    amount_cents: i64,
    refunded_cents: i64,
    currency: String,
    payment_type: String,
    payment_method: String,
    status: String,
    related_id: Option<String>,
    description: String,
    paid_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub(crate) fn row_to_payment(row: PaymentRow) -> Result<Payment> {
    Ok(Payment {
        id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
        transaction_id: row.transaction_id,
        gateway_payment_id: row.gateway_payment_id,
        member_id: Uuid::parse_str(&row.member_id).map_err(|e| AppError::Database(e.to_string()))?,
        amount_cents: row.amount_cents,
        refunded_cents: row.refunded_cents,
        currency: row.currency,
        payment_type: PaymentType::parse(&row.payment_type)
            .ok_or_else(|| AppError::Database(format!("Invalid payment type: {}", row.payment_type)))?,
        payment_method: PaymentMethod::parse(&row.payment_method)
            .ok_or_else(|| AppError::Database(format!("Invalid payment method: {}", row.payment_method)))?,
        status: PaymentStatus::parse(&row.status)
            .ok_or_else(|| AppError::Database(format!("Invalid payment status: {}", row.status)))?,
        related_id: row
            .related_id
            .map(|s| Uuid::parse_str(&s))
            .transpose()
            .map_err(|e| AppError::Database(e.to_string()))?,
        description: row.description,
        paid_at: row.paid_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
        created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
    })
}

/// Insert a payment on a pooled connection or inside an open transaction.
pub(crate) async fn insert_payment(conn: &mut SqliteConnection, payment: &Payment) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            id, transaction_id, gateway_payment_id, member_id, amount_cents,
            refunded_cents, currency, payment_type, payment_method, status,
            related_id, description, paid_at, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#
    )
    .bind(payment.id.to_string())
    .bind(&payment.transaction_id)
    .bind(&payment.gateway_payment_id)
    .bind(payment.member_id.to_string())
    .bind(payment.amount_cents)
    .bind(payment.refunded_cents)
    .bind(&payment.currency)
    .bind(payment.payment_type.as_str())
    .bind(payment.payment_method.as_str())
    .bind(payment.status.as_str())
    .bind(payment.related_id.map(|id| id.to_string()))
    .bind(&payment.description)
    .bind(payment.paid_at.map(|dt| dt.naive_utc()))
    .bind(payment.created_at.naive_utc())
    .bind(payment.updated_at.naive_utc())
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) && e.to_string().contains("payments.related_id") {
            AppError::Conflict("A payment for this membership is already pending".to_string())
        } else {
            AppError::from(e)
        }
    })?;

    Ok(())
}

/// Move a payment out of `Pending`. Returns false when it was not pending.
pub(crate) async fn resolve_pending_payment(
    conn: &mut SqliteConnection,
    id: Uuid,
    to: PaymentStatus,
    gateway_payment_id: Option<&str>,
) -> Result<bool> {
    let now = Utc::now().naive_utc();
    let paid_at = if to == PaymentStatus::Completed { Some(now) } else { None };

    let result = sqlx::query(
        r#"
        UPDATE payments
        SET status = ?,
            gateway_payment_id = COALESCE(?, gateway_payment_id),
            paid_at = COALESCE(?, paid_at),
            updated_at = ?
        WHERE id = ? AND status = 'Pending'
        "#
    )
    .bind(to.as_str())
    .bind(gateway_payment_id)
    .bind(paid_at)
    .bind(now)
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn create(&self, payment: Payment) -> Result<Payment> {
        let mut conn = self.pool.acquire().await?;
        insert_payment(&mut conn, &payment).await?;
        drop(conn);

        self.find_by_id(payment.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created payment".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        let sql = format!("SELECT {} FROM payments WHERE id = ?", PAYMENT_COLUMNS);
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_payment).transpose()
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>> {
        let sql = format!("SELECT {} FROM payments WHERE transaction_id = ?", PAYMENT_COLUMNS);
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_payment).transpose()
    }

    async fn find_pending_for_membership(&self, membership_id: Uuid) -> Result<Option<Payment>> {
        let sql = format!(
            "SELECT {} FROM payments WHERE related_id = ? AND payment_type = 'Membership' AND status = 'Pending'",
            PAYMENT_COLUMNS
        );
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(membership_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_payment).transpose()
    }

    async fn find_by_member(&self, member_id: Uuid) -> Result<Vec<Payment>> {
        let sql = format!(
            "SELECT {} FROM payments WHERE member_id = ? ORDER BY created_at DESC",
            PAYMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(member_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_payment).collect()
    }

    async fn list(&self, filter: &PaymentFilter) -> Result<Vec<Payment>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM payments WHERE 1 = 1",
            PAYMENT_COLUMNS
        ));

        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(payment_type) = filter.payment_type {
            builder.push(" AND payment_type = ").push_bind(payment_type.as_str());
        }
        if let Some(method) = filter.payment_method {
            builder.push(" AND payment_method = ").push_bind(method.as_str());
        }

        builder
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(filter.limit.unwrap_or(50).clamp(1, 500))
            .push(" OFFSET ")
            .push_bind(filter.offset.unwrap_or(0).max(0));

        let rows = builder
            .build_query_as::<PaymentRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_payment).collect()
    }

    async fn settle_pending(
        &self,
        id: Uuid,
        to: PaymentStatus,
        gateway_payment_id: Option<&str>,
        membership_id: Option<Uuid>,
    ) -> Result<Settlement> {
        let mut tx = self.pool.begin().await?;

        let transitioned = resolve_pending_payment(&mut tx, id, to, gateway_payment_id).await?;
        let membership_activated = match membership_id {
            Some(membership_id) if transitioned && to == PaymentStatus::Completed => {
                activate_pending_membership(&mut tx, membership_id).await?
            }
            _ => false,
        };

        tx.commit().await?;

        Ok(Settlement { transitioned, membership_activated })
    }
}
