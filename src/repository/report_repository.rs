use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::{
    domain::{DateRange, GroupTotal, Overview, PaymentGrouping, ReportPeriod, RevenueBucket},
    error::Result,
    repository::ReportRepository,
};

// Both bounds are optional; `? IS NULL` lets one statement serve every case
const RANGE_FILTER: &str = "(? IS NULL OR created_at >= ?) AND (? IS NULL OR created_at <= ?)";

pub struct SqliteReportRepository {
    pool: SqlitePool,
}

impl SqliteReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportRepository for SqliteReportRepository {
    async fn revenue(&self, period: ReportPeriod, range: DateRange) -> Result<Vec<RevenueBucket>> {
        let from = range.from.map(|dt| dt.naive_utc());
        let to = range.to.map(|dt| dt.naive_utc());

        let sql = format!(
            r#"
            SELECT substr(created_at, 1, ?) AS period,
                   COUNT(*) AS payment_count,
                   COALESCE(SUM(amount_cents), 0) AS gross_cents,
                   COALESCE(SUM(refunded_cents), 0) AS refunded_cents
            FROM payments
            WHERE status IN ('Completed', 'Refunded') AND {}
            GROUP BY period
            ORDER BY period
            "#,
            RANGE_FILTER
        );

        let rows = sqlx::query_as::<_, (String, i64, i64, i64)>(&sql)
            .bind(period.key_length())
            .bind(from)
            .bind(from)
            .bind(to)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(period, payment_count, gross_cents, refunded_cents)| RevenueBucket {
                period,
                payment_count,
                gross_cents,
                refunded_cents,
                net_cents: gross_cents - refunded_cents,
            })
            .collect())
    }

    async fn payment_breakdown(&self, grouping: PaymentGrouping, range: DateRange) -> Result<Vec<GroupTotal>> {
        let from = range.from.map(|dt| dt.naive_utc());
        let to = range.to.map(|dt| dt.naive_utc());
        let column = grouping.column();

        let sql = format!(
            r#"
            SELECT {column} AS grp,
                   COUNT(*) AS count,
                   COALESCE(SUM(amount_cents), 0) AS total_cents
            FROM payments
            WHERE {range}
            GROUP BY {column}
            ORDER BY {column}
            "#,
            column = column,
            range = RANGE_FILTER
        );

        let rows = sqlx::query_as::<_, (String, i64, i64)>(&sql)
            .bind(from)
            .bind(from)
            .bind(to)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(group, count, total_cents)| GroupTotal { group, count, total_cents })
            .collect())
    }

    async fn refund_summary(&self, range: DateRange) -> Result<Vec<GroupTotal>> {
        let from = range.from.map(|dt| dt.naive_utc());
        let to = range.to.map(|dt| dt.naive_utc());

        let sql = format!(
            r#"
            SELECT status,
                   COUNT(*) AS count,
                   COALESCE(SUM(requested_cents), 0) AS total_cents
            FROM refund_requests
            WHERE {}
            GROUP BY status
            ORDER BY status
            "#,
            RANGE_FILTER
        );

        let rows = sqlx::query_as::<_, (String, i64, i64)>(&sql)
            .bind(from)
            .bind(from)
            .bind(to)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(group, count, total_cents)| GroupTotal { group, count, total_cents })
            .collect())
    }

    async fn overview(&self, range: DateRange) -> Result<Overview> {
        let from = range.from.map(|dt| dt.naive_utc());
        let to = range.to.map(|dt| dt.naive_utc());

        let sql = format!(
            r#"
            SELECT
                (SELECT COUNT(*) FROM payments WHERE {range}),
                (SELECT COALESCE(SUM(amount_cents), 0) FROM payments
                    WHERE status IN ('Completed', 'Refunded') AND {range}),
                (SELECT COALESCE(SUM(refunded_cents), 0) FROM payments WHERE {range}),
                (SELECT COUNT(*) FROM payments WHERE status = 'Pending' AND {range}),
                (SELECT COUNT(*) FROM bank_transfers WHERE status = 'Pending' AND {range}),
                (SELECT COUNT(*) FROM refund_requests WHERE status = 'Pending' AND {range})
            "#,
            range = RANGE_FILTER
        );

        let mut query = sqlx::query_as::<_, (i64, i64, i64, i64, i64, i64)>(&sql);
        for _ in 0..6 {
            query = query.bind(from).bind(from).bind(to).bind(to);
        }

        let (
            total_payments,
            completed_gross_cents,
            refunded_cents,
            pending_payments,
            pending_bank_transfers,
            pending_refund_requests,
        ) = query.fetch_one(&self.pool).await?;

        Ok(Overview {
            total_payments,
            completed_gross_cents,
            refunded_cents,
            net_cents: completed_gross_cents - refunded_cents,
            pending_payments,
            pending_bank_transfers,
            pending_refund_requests,
        })
    }
}
