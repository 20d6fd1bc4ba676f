//! Delivery storage operations.
//!
//! Status updates are conditional on the current status, so two racing
//! requests cannot both move the same delivery.

use super::{to_b256_opt, to_datetime, to_datetime_opt, DeliveryRecord, NewDelivery, Storage};
use alloy::primitives::B256;
use anyhow::{Context, Result};
use annsuraksha_core::{DeliveryItem, DeliveryStatus};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::HashMap;

const DELIVERY_COLUMNS: &str = r#"
    id, user_id, dealer_id, fps_code, location, amount, items, ipfs_hash, status,
    delivery_time, collection_time, dispute_time, blockchain_delivery_id,
    tx_hash, confirmation_tx_hash, dispute_tx_hash, resolution_tx_hash,
    fraud_checked, fraud_probability, created_at
"#;

fn delivery_from_row(row: &SqliteRow) -> Result<DeliveryRecord> {
    let items: String = row.try_get("items")?;
    let items: Vec<DeliveryItem> =
        serde_json::from_str(&items).context("Failed to decode delivery items")?;
    let status: String = row.try_get("status")?;
    let chain_id: Option<i64> = row.try_get("blockchain_delivery_id")?;

    Ok(DeliveryRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        dealer_id: row.try_get("dealer_id")?,
        fps_code: row.try_get("fps_code")?,
        location: row.try_get("location")?,
        amount: row.try_get("amount")?,
        items,
        ipfs_hash: row.try_get("ipfs_hash")?,
        status: status.parse::<DeliveryStatus>()?,
        delivery_time: to_datetime(row.try_get("delivery_time")?)?,
        collection_time: to_datetime_opt(row.try_get("collection_time")?)?,
        dispute_time: to_datetime_opt(row.try_get("dispute_time")?)?,
        blockchain_delivery_id: chain_id.map(|id| id as u64),
        tx_hash: to_b256_opt(row.try_get("tx_hash")?)?,
        confirmation_tx_hash: to_b256_opt(row.try_get("confirmation_tx_hash")?)?,
        dispute_tx_hash: to_b256_opt(row.try_get("dispute_tx_hash")?)?,
        resolution_tx_hash: to_b256_opt(row.try_get("resolution_tx_hash")?)?,
        fraud_checked: row.try_get("fraud_checked")?,
        fraud_probability: row.try_get("fraud_probability")?,
        created_at: to_datetime(row.try_get("created_at")?)?,
    })
}

impl Storage {
    /// Insert a delivery. Returns the new row id.
    pub async fn insert_delivery(&self, delivery: &NewDelivery) -> Result<i64> {
        let items = serde_json::to_string(&delivery.items).context("Failed to encode items")?;

        let result = sqlx::query(
            r#"
            INSERT INTO deliveries (
                user_id, dealer_id, fps_code, location, amount, items, ipfs_hash, status,
                delivery_time, collection_time, dispute_time, blockchain_delivery_id, tx_hash,
                created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(delivery.user_id)
        .bind(delivery.dealer_id)
        .bind(&delivery.fps_code)
        .bind(&delivery.location)
        .bind(delivery.amount)
        .bind(items)
        .bind(delivery.ipfs_hash.as_deref())
        .bind(delivery.status.as_str())
        .bind(delivery.delivery_time.timestamp())
        .bind(delivery.collection_time.map(|t| t.timestamp()))
        .bind(delivery.dispute_time.map(|t| t.timestamp()))
        .bind(delivery.blockchain_delivery_id.map(|id| id as i64))
        .bind(delivery.tx_hash.as_ref().map(|h| h.as_slice()))
        .bind(delivery.created_at.timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to insert delivery")?;

        Ok(result.last_insert_rowid())
    }

    /// Get a delivery by id.
    pub async fn get_delivery(&self, id: i64) -> Result<Option<DeliveryRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM deliveries WHERE id = ?",
            DELIVERY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch delivery")?;

        row.as_ref().map(delivery_from_row).transpose()
    }

    /// Pending -> Delivered. Returns `false` if the delivery was not Pending.
    pub async fn mark_delivered(
        &self,
        id: i64,
        collection_time: DateTime<Utc>,
        tx_hash: Option<B256>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE deliveries
            SET status = 'Delivered', collection_time = ?, confirmation_tx_hash = ?
            WHERE id = ? AND status = 'Pending'
            "#,
        )
        .bind(collection_time.timestamp())
        .bind(tx_hash.as_ref().map(|h| h.as_slice()))
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to mark delivery delivered")?;

        Ok(result.rows_affected() > 0)
    }

    /// Pending|Delivered -> Disputed. Returns `false` otherwise.
    pub async fn mark_disputed(
        &self,
        id: i64,
        dispute_time: DateTime<Utc>,
        tx_hash: Option<B256>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE deliveries
            SET status = 'Disputed', dispute_time = ?, dispute_tx_hash = ?
            WHERE id = ? AND status IN ('Pending', 'Delivered')
            "#,
        )
        .bind(dispute_time.timestamp())
        .bind(tx_hash.as_ref().map(|h| h.as_slice()))
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to mark delivery disputed")?;

        Ok(result.rows_affected() > 0)
    }

    /// Disputed -> Resolved. Returns `false` otherwise.
    pub async fn mark_resolved(&self, id: i64, tx_hash: Option<B256>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE deliveries
            SET status = 'Resolved', resolution_tx_hash = ?
            WHERE id = ? AND status = 'Disputed'
            "#,
        )
        .bind(tx_hash.as_ref().map(|h| h.as_slice()))
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to mark delivery resolved")?;

        Ok(result.rows_affected() > 0)
    }

    /// Newest deliveries first.
    pub async fn recent_deliveries(&self, limit: i64) -> Result<Vec<DeliveryRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM deliveries ORDER BY created_at DESC, id DESC LIMIT ?",
            DELIVERY_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch recent deliveries")?;

        rows.iter().map(delivery_from_row).collect()
    }

    /// All deliveries for a beneficiary, oldest first.
    pub async fn deliveries_for_user(&self, user_id: i64) -> Result<Vec<DeliveryRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM deliveries WHERE user_id = ? ORDER BY delivery_time, id",
            DELIVERY_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch deliveries for user")?;

        rows.iter().map(delivery_from_row).collect()
    }

    /// Delivered/Pending deliveries of a beneficiary, excluding `exclude_id`.
    pub async fn fraud_history(
        &self,
        user_id: i64,
        exclude_id: i64,
    ) -> Result<Vec<DeliveryRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM deliveries
            WHERE user_id = ?
              AND id != ?
              AND status IN ('Delivered', 'Pending')
            ORDER BY delivery_time, id
            "#,
            DELIVERY_COLUMNS
        ))
        .bind(user_id)
        .bind(exclude_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch fraud history")?;

        rows.iter().map(delivery_from_row).collect()
    }

    /// Pending deliveries the monitor has not scored yet, oldest first.
    pub async fn unchecked_pending_deliveries(&self, limit: i64) -> Result<Vec<DeliveryRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM deliveries
            WHERE status = 'Pending' AND fraud_checked = 0
            ORDER BY created_at, id
            LIMIT ?
            "#,
            DELIVERY_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch unchecked deliveries")?;

        rows.iter().map(delivery_from_row).collect()
    }

    /// Store the monitor's fraud probability and mark the delivery checked.
    pub async fn set_fraud_result(&self, id: i64, probability: f64) -> Result<()> {
        sqlx::query(
            "UPDATE deliveries SET fraud_checked = 1, fraud_probability = ? WHERE id = ?",
        )
        .bind(probability)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to store fraud result")?;
        Ok(())
    }

    /// Number of deliveries in each status.
    pub async fn delivery_status_counts(&self) -> Result<HashMap<DeliveryStatus, i64>> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM deliveries GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .context("Failed to count deliveries by status")?;

        let mut counts: HashMap<DeliveryStatus, i64> =
            DeliveryStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for row in rows {
            let status: String = row.try_get("status")?;
            counts.insert(status.parse()?, row.try_get("n")?);
        }
        Ok(counts)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::super::test_support::{new_user, storage};
    use super::*;
    use annsuraksha_core::Role;
    use chrono::Duration;

    pub fn new_delivery(user_id: i64, status: DeliveryStatus) -> NewDelivery {
        let now = Utc::now();
        NewDelivery {
            user_id,
            dealer_id: None,
            fps_code: "FPS100001".to_string(),
            location: "28.61,77.20".to_string(),
            amount: 750,
            items: vec![DeliveryItem {
                name: "Rice".to_string(),
                quantity: 5.0,
                unit: "kg".to_string(),
            }],
            ipfs_hash: None,
            status,
            delivery_time: now,
            collection_time: None,
            dispute_time: None,
            blockchain_delivery_id: Some(7),
            tx_hash: Some(B256::repeat_byte(0xAB)),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let (storage, _temp_db) = storage().await;
        let user_id = storage
            .insert_user(&new_user("b@example.com", Role::Beneficiary, None))
            .await
            .unwrap();

        let id = storage
            .insert_delivery(&new_delivery(user_id, DeliveryStatus::Pending))
            .await
            .unwrap();
        let delivery = storage.get_delivery(id).await.unwrap().unwrap();

        assert_eq!(delivery.status, DeliveryStatus::Pending);
        assert_eq!(delivery.items.len(), 1);
        assert_eq!(delivery.items[0].name, "Rice");
        assert_eq!(delivery.blockchain_delivery_id, Some(7));
        assert_eq!(delivery.tx_hash, Some(B256::repeat_byte(0xAB)));
        assert!(!delivery.fraud_checked);
    }

    #[tokio::test]
    async fn test_conditional_status_updates() {
        let (storage, _temp_db) = storage().await;
        let user_id = storage
            .insert_user(&new_user("b@example.com", Role::Beneficiary, None))
            .await
            .unwrap();
        let id = storage
            .insert_delivery(&new_delivery(user_id, DeliveryStatus::Pending))
            .await
            .unwrap();
        let now = Utc::now();

        assert!(!storage.mark_resolved(id, None).await.unwrap());
        assert!(storage.mark_delivered(id, now, None).await.unwrap());
        assert!(!storage.mark_delivered(id, now, None).await.unwrap());
        assert!(storage
            .mark_disputed(id, now + Duration::hours(1), None)
            .await
            .unwrap());
        assert!(storage
            .mark_resolved(id, Some(B256::repeat_byte(1)))
            .await
            .unwrap());
        assert!(!storage.mark_disputed(id, now, None).await.unwrap());

        let delivery = storage.get_delivery(id).await.unwrap().unwrap();
        assert_eq!(delivery.status, DeliveryStatus::Resolved);
        assert!(delivery.collection_time.is_some());
        assert_eq!(delivery.resolution_tx_hash, Some(B256::repeat_byte(1)));
    }

    #[tokio::test]
    async fn test_unchecked_and_history() {
        let (storage, _temp_db) = storage().await;
        let user_id = storage
            .insert_user(&new_user("b@example.com", Role::Beneficiary, None))
            .await
            .unwrap();

        let pending = storage
            .insert_delivery(&new_delivery(user_id, DeliveryStatus::Pending))
            .await
            .unwrap();
        storage
            .insert_delivery(&new_delivery(user_id, DeliveryStatus::Delivered))
            .await
            .unwrap();
        storage
            .insert_delivery(&new_delivery(user_id, DeliveryStatus::Disputed))
            .await
            .unwrap();

        let unchecked = storage.unchecked_pending_deliveries(10).await.unwrap();
        assert_eq!(unchecked.len(), 1);
        assert_eq!(unchecked[0].id, pending);

        let history = storage.fraud_history(user_id, pending).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, DeliveryStatus::Delivered);

        storage.set_fraud_result(pending, 0.0).await.unwrap();
        assert!(storage
            .unchecked_pending_deliveries(10)
            .await
            .unwrap()
            .is_empty());

        let counts = storage.delivery_status_counts().await.unwrap();
        assert_eq!(counts[&DeliveryStatus::Pending], 1);
        assert_eq!(counts[&DeliveryStatus::Resolved], 0);
    }
}
