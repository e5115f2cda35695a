use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, SqliteConnection, FromRow};
use uuid::Uuid;

use crate::{
    domain::{
        BankTransfer, BankTransferStatus, NewBankTransfer, Payment, PaymentMethod,
        PaymentStatus, PaymentType, ReviewAction, Settlement,
    },
    error::{contention_as_conflict, AppError, Result},
    repository::{
        membership_repository::activate_pending_membership,
        payment_repository::{insert_payment, resolve_pending_payment},
        BankTransferRepository, PaymentRepository, SqlitePaymentRepository,
    },
};

const BANK_TRANSFER_COLUMNS: &str = r#"
    id, payment_id, member_id, membership_id, amount_cents, currency,
    receipt_url, status, notes, admin_notes, processed_by, processed_at,
    created_at, updated_at
"#;

#[derive(FromRow)]
struct BankTransferRow {
    id: String,
    payment_id: String,
    member_id: String,
    membership_id: String,
    amount_cents: i64,
    currency: String,
    receipt_url: String,
    status: String,
    notes: Option<String>,
    admin_notes: Option<String>,
    processed_by: Option<String>,
    processed_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}

fn row_to_bank_transfer(row: BankTransferRow) -> Result<BankTransfer> {
    Ok(BankTransfer {
        id: parse_uuid(&row.id)?,
        payment_id: parse_uuid(&row.payment_id)?,
        member_id: parse_uuid(&row.member_id)?,
        membership_id: parse_uuid(&row.membership_id)?,
        amount_cents: row.amount_cents,
        currency: row.currency,
        receipt_url: row.receipt_url,
        status: BankTransferStatus::parse(&row.status)
            .ok_or_else(|| AppError::Database(format!("Invalid bank transfer status: {}", row.status)))?,
        notes: row.notes,
        admin_notes: row.admin_notes,
        processed_by: row.processed_by.as_deref().map(parse_uuid).transpose()?,
        processed_at: row.processed_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
        created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
    })
}

async fn fetch_bank_transfer(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<BankTransfer>> {
    let sql = format!("SELECT {} FROM bank_transfers WHERE id = ?", BANK_TRANSFER_COLUMNS);
    let row = sqlx::query_as::<_, BankTransferRow>(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;

    row.map(row_to_bank_transfer).transpose()
}

/// Result of an admin review, with what happened to the linked payment.
#[derive(Debug, Clone)]
pub struct BankTransferReview {
    pub transfer: BankTransfer,
    pub settlement: Settlement,
}

pub struct SqliteBankTransferRepository {
    pool: SqlitePool,
}

impl SqliteBankTransferRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BankTransferRepository for SqliteBankTransferRepository {
    async fn create_with_payment(&self, new: NewBankTransfer) -> Result<(BankTransfer, Payment)> {
        let payment = Payment::new_pending(
            new.member_id,
            new.amount_cents,
            new.currency.clone(),
            PaymentType::Membership,
            PaymentMethod::BankTransfer,
            Some(new.membership_id),
            "Membership payment by bank transfer",
        );
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        let mut tx = self.pool.begin().await?;

        insert_payment(&mut tx, &payment).await?;

        sqlx::query(
            r#"
            INSERT INTO bank_transfers (
                id, payment_id, member_id, membership_id, amount_cents, currency,
                receipt_url, status, notes, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 'Pending', ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(payment.id.to_string())
        .bind(new.member_id.to_string())
        .bind(new.membership_id.to_string())
        .bind(new.amount_cents)
        .bind(&new.currency)
        .bind(&new.receipt_url)
        .bind(&new.notes)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let transfer = fetch_bank_transfer(&mut tx, id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created bank transfer".to_string())
        })?;

        tx.commit().await?;

        let payment = SqlitePaymentRepository::new(self.pool.clone())
            .find_by_id(payment.id)
            .await?
            .ok_or_else(|| AppError::Database("Failed to retrieve created payment".to_string()))?;

        Ok((transfer, payment))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<BankTransfer>> {
        let mut conn = self.pool.acquire().await?;
        fetch_bank_transfer(&mut conn, id).await
    }

    async fn find_by_member(&self, member_id: Uuid) -> Result<Vec<BankTransfer>> {
        let sql = format!(
            "SELECT {} FROM bank_transfers WHERE member_id = ? ORDER BY created_at DESC",
            BANK_TRANSFER_COLUMNS
        );
        let rows = sqlx::query_as::<_, BankTransferRow>(&sql)
            .bind(member_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_bank_transfer).collect()
    }

    async fn list(&self, status: Option<BankTransferStatus>) -> Result<Vec<BankTransfer>> {
        let rows = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {} FROM bank_transfers WHERE status = ? ORDER BY created_at DESC",
                    BANK_TRANSFER_COLUMNS
                );
                sqlx::query_as::<_, BankTransferRow>(&sql)
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM bank_transfers ORDER BY created_at DESC",
                    BANK_TRANSFER_COLUMNS
                );
                sqlx::query_as::<_, BankTransferRow>(&sql)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(row_to_bank_transfer).collect()
    }

    async fn review(
        &self,
        id: Uuid,
        action: ReviewAction,
        processed_by: Uuid,
        admin_notes: Option<String>,
    ) -> Result<BankTransferReview> {
        let (new_status, payment_status) = match action {
            ReviewAction::Approve => (BankTransferStatus::Approved, PaymentStatus::Completed),
            ReviewAction::Decline => (BankTransferStatus::Declined, PaymentStatus::Failed),
        };
        let now = Utc::now().naive_utc();

        let mut tx = self.pool.begin().await?;

        // Claim the transfer before reading so a concurrent reviewer waits on the lock
        let updated = sqlx::query(
            r#"
            UPDATE bank_transfers
            SET status = ?, admin_notes = ?, processed_by = ?, processed_at = ?, updated_at = ?
            WHERE id = ? AND status = 'Pending'
            "#
        )
        .bind(new_status.as_str())
        .bind(&admin_notes)
        .bind(processed_by.to_string())
        .bind(now)
        .bind(now)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(contention_as_conflict)?;

        let transfer = fetch_bank_transfer(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Bank transfer not found".to_string()))?;

        if updated.rows_affected() != 1 {
            return Err(AppError::Conflict(format!(
                "Bank transfer has already been {}",
                transfer.status.as_str().to_lowercase()
            )));
        }

        let transitioned =
            resolve_pending_payment(&mut tx, transfer.payment_id, payment_status, None).await?;
        if !transitioned {
            tracing::warn!(
                "Payment {} for bank transfer {} was not pending; leaving its status unchanged",
                transfer.payment_id,
                id
            );
        }

        let membership_activated = if transitioned && action == ReviewAction::Approve {
            activate_pending_membership(&mut tx, transfer.membership_id).await?
        } else {
            false
        };

        tx.commit().await.map_err(contention_as_conflict)?;

        Ok(BankTransferReview {
            transfer,
            settlement: Settlement { transitioned, membership_activated },
        })
    }
}
