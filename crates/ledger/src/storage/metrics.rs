//! Dashboard metrics and the activity timeline.

use super::{to_datetime, DashboardMetrics, Storage, TimelineEvent, TimelineKind};
use anyhow::{Context, Result};
use annsuraksha_core::DeliveryStatus;
use chrono::Utc;
use sqlx::Row;

impl Storage {
    /// Compute dashboard counters from the live tables.
    pub async fn live_metrics(&self) -> Result<DashboardMetrics> {
        let counts = self.delivery_status_counts().await?;
        let count = |status: DeliveryStatus| counts.get(&status).copied().unwrap_or(0);

        let total_beneficiaries: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'beneficiary'")
                .fetch_one(&self.pool)
                .await
                .context("Failed to count beneficiaries")?;
        let avg_trust_score: Option<f64> = sqlx::query_scalar("SELECT AVG(trust_score) FROM users")
            .fetch_one(&self.pool)
            .await
            .context("Failed to average trust scores")?;

        Ok(DashboardMetrics {
            total_beneficiaries,
            total_deliveries: counts.values().sum(),
            pending_deliveries: count(DeliveryStatus::Pending),
            delivered_deliveries: count(DeliveryStatus::Delivered),
            disputed_deliveries: count(DeliveryStatus::Disputed),
            resolved_deliveries: count(DeliveryStatus::Resolved),
            total_complaints: self.count_complaints().await?,
            avg_trust_score: avg_trust_score.map(|v| (v * 100.0).round() / 100.0).unwrap_or(0.0),
            last_updated: Utc::now(),
        })
    }

    /// Recompute the counters and store them as the dashboard snapshot.
    pub async fn refresh_metrics_snapshot(&self) -> Result<DashboardMetrics> {
        let metrics = self.live_metrics().await?;

        sqlx::query(
            r#"
            INSERT INTO dashboard_metrics (
                id, total_beneficiaries, total_deliveries, pending_deliveries,
                delivered_deliveries, disputed_deliveries, resolved_deliveries,
                total_complaints, avg_trust_score, last_updated
            )
            VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                total_beneficiaries = excluded.total_beneficiaries,
                total_deliveries = excluded.total_deliveries,
                pending_deliveries = excluded.pending_deliveries,
                delivered_deliveries = excluded.delivered_deliveries,
                disputed_deliveries = excluded.disputed_deliveries,
                resolved_deliveries = excluded.resolved_deliveries,
                total_complaints = excluded.total_complaints,
                avg_trust_score = excluded.avg_trust_score,
                last_updated = excluded.last_updated
            "#,
        )
        .bind(metrics.total_beneficiaries)
        .bind(metrics.total_deliveries)
        .bind(metrics.pending_deliveries)
        .bind(metrics.delivered_deliveries)
        .bind(metrics.disputed_deliveries)
        .bind(metrics.resolved_deliveries)
        .bind(metrics.total_complaints)
        .bind(metrics.avg_trust_score)
        .bind(metrics.last_updated.timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to store metrics snapshot")?;

        Ok(metrics)
    }

    /// Last stored snapshot, if any.
    pub async fn get_metrics_snapshot(&self) -> Result<Option<DashboardMetrics>> {
        let row = sqlx::query(
            r#"
            SELECT total_beneficiaries, total_deliveries, pending_deliveries,
                   delivered_deliveries, disputed_deliveries, resolved_deliveries,
                   total_complaints, avg_trust_score, last_updated
            FROM dashboard_metrics
            WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch metrics snapshot")?;

        row.map(|row| -> Result<DashboardMetrics> {
            Ok(DashboardMetrics {
                total_beneficiaries: row.try_get("total_beneficiaries")?,
                total_deliveries: row.try_get("total_deliveries")?,
                pending_deliveries: row.try_get("pending_deliveries")?,
                delivered_deliveries: row.try_get("delivered_deliveries")?,
                disputed_deliveries: row.try_get("disputed_deliveries")?,
                resolved_deliveries: row.try_get("resolved_deliveries")?,
                total_complaints: row.try_get("total_complaints")?,
                avg_trust_score: row.try_get("avg_trust_score")?,
                last_updated: to_datetime(row.try_get("last_updated")?)?,
            })
        })
        .transpose()
    }

    /// Newest deliveries and complaints merged, newest first, at most `limit`.
    ///
    /// Both kinds are ordered by when they were recorded.
    pub async fn timeline(&self, limit: i64) -> Result<Vec<TimelineEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT kind, user_id, aadhar_number, at, details FROM (
                SELECT 'delivery' AS kind, d.user_id, u.aadhar_number,
                       d.created_at AS at,
                       'Delivery at ' || d.fps_code || ' (' || d.status || ')' AS details,
                       d.id AS seq
                FROM deliveries d
                LEFT JOIN users u ON u.id = d.user_id
                UNION ALL
                SELECT 'complaint' AS kind, c.user_id, u.aadhar_number,
                       c.created_at AS at,
                       c.text AS details,
                       c.id AS seq
                FROM complaints c
                LEFT JOIN users u ON u.id = c.user_id
            )
            ORDER BY at DESC, seq DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to build timeline")?;

        rows.iter()
            .map(|row| {
                let kind: String = row.try_get("kind")?;
                Ok(TimelineEvent {
                    kind: if kind == "complaint" {
                        TimelineKind::Complaint
                    } else {
                        TimelineKind::Delivery
                    },
                    user_id: row.try_get("user_id")?,
                    aadhar_number: row.try_get("aadhar_number")?,
                    timestamp: to_datetime(row.try_get("at")?)?,
                    details: row.try_get("details")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::deliveries::tests::new_delivery;
    use super::super::test_support::{new_user, storage};
    use super::super::NewComplaint;
    use super::*;
    use annsuraksha_core::{Priority, Role};
    use chrono::Duration;

    #[tokio::test]
    async fn test_metrics_on_empty_database() {
        let (storage, _temp_db) = storage().await;

        let metrics = storage.live_metrics().await.unwrap();
        assert_eq!(metrics.total_deliveries, 0);
        assert_eq!(metrics.avg_trust_score, 0.0);
        assert!(storage.get_metrics_snapshot().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_metrics_snapshot_and_timeline() {
        let (storage, _temp_db) = storage().await;
        let mut user = new_user("b@example.com", Role::Beneficiary, Some("1234 5678 9012"));
        user.trust_score = 80;
        let user_id = storage.insert_user(&user).await.unwrap();
        storage
            .insert_user(&new_user("d@example.com", Role::Dealer, None))
            .await
            .unwrap();

        let mut older = new_delivery(user_id, DeliveryStatus::Delivered);
        older.delivery_time = Utc::now() - Duration::days(2);
        storage.insert_delivery(&older).await.unwrap();
        let disputed = storage
            .insert_delivery(&new_delivery(user_id, DeliveryStatus::Disputed))
            .await
            .unwrap();
        storage
            .insert_complaint(&NewComplaint {
                delivery_id: disputed,
                user_id,
                text: "Received less quantity".to_string(),
                category: "shortage".to_string(),
                severity: 0.9,
                priority: Priority::High,
                tx_hash: None,
                created_at: Utc::now() + Duration::minutes(1),
            })
            .await
            .unwrap();

        let metrics = storage.refresh_metrics_snapshot().await.unwrap();
        assert_eq!(metrics.total_beneficiaries, 1);
        assert_eq!(metrics.total_deliveries, 2);
        assert_eq!(metrics.disputed_deliveries, 1);
        assert_eq!(metrics.total_complaints, 1);
        assert_eq!(metrics.avg_trust_score, 90.0);

        let stored = storage.get_metrics_snapshot().await.unwrap().unwrap();
        assert_eq!(stored.total_deliveries, 2);

        let timeline = storage.timeline(2).await.unwrap();
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].kind, TimelineKind::Complaint);
        assert_eq!(timeline[0].aadhar_number.as_deref(), Some("1234 5678 9012"));
        assert_eq!(timeline[1].kind, TimelineKind::Delivery);
    }

    #[tokio::test]
    async fn test_timeline_orders_by_record_time() {
        let (storage, _temp_db) = storage().await;
        let user_id = storage
            .insert_user(&new_user("b@example.com", Role::Beneficiary, None))
            .await
            .unwrap();
        let now = Utc::now();

        let mut earlier = new_delivery(user_id, DeliveryStatus::Delivered);
        earlier.delivery_time = now - Duration::minutes(10);
        earlier.created_at = now - Duration::minutes(10);
        storage.insert_delivery(&earlier).await.unwrap();

        // Recorded last, but with a delivery time a month back.
        let mut backdated = new_delivery(user_id, DeliveryStatus::Pending);
        backdated.delivery_time = now - Duration::days(30);
        backdated.created_at = now;
        storage.insert_delivery(&backdated).await.unwrap();

        let timeline = storage.timeline(10).await.unwrap();
        assert_eq!(timeline.len(), 2);
        assert!(timeline[0].details.contains("Pending"));
        assert_eq!(timeline[0].timestamp.timestamp(), now.timestamp());
        assert!(timeline[1].details.contains("Delivered"));
    }
}
