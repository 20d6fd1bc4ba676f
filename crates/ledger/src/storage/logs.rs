//! Blockchain audit log operations (append-only).

use super::{to_b256_opt, to_datetime, BlockchainLogRecord, NewLogEntry, Storage};
use anyhow::{Context, Result};
use annsuraksha_core::LogAction;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

fn log_from_row(row: &SqliteRow) -> Result<BlockchainLogRecord> {
    let action: String = row.try_get("action")?;
    let payload: String = row.try_get("payload")?;

    Ok(BlockchainLogRecord {
        id: row.try_get("id")?,
        action: action.parse::<LogAction>().map_err(anyhow::Error::msg)?,
        user_id: row.try_get("user_id")?,
        delivery_id: row.try_get("delivery_id")?,
        tx_hash: to_b256_opt(row.try_get("tx_hash")?)?,
        payload: serde_json::from_str(&payload).context("Failed to decode log payload")?,
        created_at: to_datetime(row.try_get("created_at")?)?,
    })
}

impl Storage {
    /// Append an audit entry. Returns the new row id.
    pub async fn append_log(&self, entry: &NewLogEntry) -> Result<i64> {
        let payload = serde_json::to_string(&entry.payload).context("Failed to encode payload")?;

        let result = sqlx::query(
            r#"
            INSERT INTO blockchain_logs (action, user_id, delivery_id, tx_hash, payload, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.action.as_str())
        .bind(entry.user_id)
        .bind(entry.delivery_id)
        .bind(entry.tx_hash.as_ref().map(|h| h.as_slice()))
        .bind(payload)
        .bind(entry.created_at.timestamp())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to append {} log", entry.action.as_str()))?;

        Ok(result.last_insert_rowid())
    }

    /// Newest entries whose action is one of `actions`.
    pub async fn recent_logs(
        &self,
        actions: &[LogAction],
        limit: i64,
    ) -> Result<Vec<BlockchainLogRecord>> {
        if actions.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; actions.len()].join(", ");
        let sql = format!(
            r#"
            SELECT id, action, user_id, delivery_id, tx_hash, payload, created_at
            FROM blockchain_logs
            WHERE action IN ({})
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for action in actions {
            query = query.bind(action.as_str());
        }
        let rows = query
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch recent logs")?;

        rows.iter().map(log_from_row).collect()
    }
}
