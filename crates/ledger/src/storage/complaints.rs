//! Complaint storage operations.

use super::{to_b256_opt, to_datetime, to_datetime_opt, ActiveComplaint, ComplaintRecord, NewComplaint, Storage};
use anyhow::{Context, Result};
use annsuraksha_core::{ComplaintStatus, Priority};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

const COMPLAINT_COLUMNS: &str = r#"
    id, delivery_id, user_id, text, category, severity, priority, status,
    resolution, dealer_at_fault, resolution_time, tx_hash, created_at
"#;

fn complaint_from_row(row: &SqliteRow) -> Result<ComplaintRecord> {
    let priority: String = row.try_get("priority")?;
    let status: String = row.try_get("status")?;

    Ok(ComplaintRecord {
        id: row.try_get("id")?,
        delivery_id: row.try_get("delivery_id")?,
        user_id: row.try_get("user_id")?,
        text: row.try_get("text")?,
        category: row.try_get("category")?,
        severity: row.try_get("severity")?,
        priority: priority.parse::<Priority>().map_err(anyhow::Error::msg)?,
        status: status.parse::<ComplaintStatus>()?,
        resolution: row.try_get("resolution")?,
        dealer_at_fault: row.try_get("dealer_at_fault")?,
        resolution_time: to_datetime_opt(row.try_get("resolution_time")?)?,
        tx_hash: to_b256_opt(row.try_get("tx_hash")?)?,
        created_at: to_datetime(row.try_get("created_at")?)?,
    })
}

impl Storage {
    /// Insert a Pending complaint. Returns the new row id.
    pub async fn insert_complaint(&self, complaint: &NewComplaint) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO complaints (
                delivery_id, user_id, text, category, severity, priority, status,
                tx_hash, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, 'Pending', ?, ?)
            "#,
        )
        .bind(complaint.delivery_id)
        .bind(complaint.user_id)
        .bind(&complaint.text)
        .bind(&complaint.category)
        .bind(complaint.severity)
        .bind(complaint.priority.as_str())
        .bind(complaint.tx_hash.as_ref().map(|h| h.as_slice()))
        .bind(complaint.created_at.timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to insert complaint")?;

        Ok(result.last_insert_rowid())
    }

    /// All complaints, newest first.
    pub async fn list_complaints(&self) -> Result<Vec<ComplaintRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM complaints ORDER BY created_at DESC, id DESC",
            COMPLAINT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list complaints")?;

        rows.iter().map(complaint_from_row).collect()
    }

    /// Complaints filed against a delivery, oldest first.
    pub async fn complaints_for_delivery(&self, delivery_id: i64) -> Result<Vec<ComplaintRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM complaints WHERE delivery_id = ? ORDER BY created_at, id",
            COMPLAINT_COLUMNS
        ))
        .bind(delivery_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch complaints for delivery")?;

        rows.iter().map(complaint_from_row).collect()
    }

    /// Newest complaints joined with the complainant's name.
    pub async fn active_complaints(&self, limit: i64) -> Result<Vec<ActiveComplaint>> {
        let rows = sqlx::query(
            r#"
            SELECT COALESCE(u.name, 'Unknown') AS user_name,
                   c.text, c.severity, c.priority, c.status, c.created_at
            FROM complaints c
            LEFT JOIN users u ON u.id = c.user_id
            ORDER BY c.created_at DESC, c.id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch active complaints")?;

        rows.iter()
            .map(|row| {
                let priority: String = row.try_get("priority")?;
                let status: String = row.try_get("status")?;
                Ok(ActiveComplaint {
                    user_name: row.try_get("user_name")?,
                    issue: row.try_get("text")?,
                    severity: row.try_get("severity")?,
                    priority: priority.parse::<Priority>().map_err(anyhow::Error::msg)?,
                    status: status.parse::<ComplaintStatus>()?,
                    created_at: to_datetime(row.try_get("created_at")?)?,
                })
            })
            .collect()
    }

    /// Resolve every Pending complaint on a delivery. Returns rows changed.
    pub async fn resolve_complaints_for_delivery(
        &self,
        delivery_id: i64,
        resolution: &str,
        dealer_at_fault: bool,
        at: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE complaints
            SET status = 'Resolved', resolution = ?, dealer_at_fault = ?, resolution_time = ?
            WHERE delivery_id = ? AND status = 'Pending'
            "#,
        )
        .bind(resolution)
        .bind(dealer_at_fault)
        .bind(at.timestamp())
        .bind(delivery_id)
        .execute(&self.pool)
        .await
        .context("Failed to resolve complaints")?;

        Ok(result.rows_affected())
    }

    /// Complaints filed by a user.
    pub async fn count_complaints_by_user(&self, user_id: i64) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM complaints WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count complaints for user")
    }

    /// All complaints.
    pub async fn count_complaints(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM complaints")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count complaints")
    }
}
