//! Fair Price Shop storage operations.

use super::{to_datetime, to_datetime_opt, FpsRecord, NewFps, Storage};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

const FPS_COLUMNS: &str = r#"
    id, fps_code, name, dealer_id, city, state, latitude, longitude,
    delivery_count, last_delivery, created_at
"#;

fn fps_from_row(row: &SqliteRow) -> Result<FpsRecord> {
    Ok(FpsRecord {
        id: row.try_get("id")?,
        fps_code: row.try_get("fps_code")?,
        name: row.try_get("name")?,
        dealer_id: row.try_get("dealer_id")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        delivery_count: row.try_get("delivery_count")?,
        last_delivery: to_datetime_opt(row.try_get("last_delivery")?)?,
        created_at: to_datetime(row.try_get("created_at")?)?,
    })
}

impl Storage {
    /// Insert a shop, or refresh its descriptive fields if the code exists.
    ///
    /// Delivery counters are left untouched on conflict.
    pub async fn upsert_fps(&self, fps: &NewFps) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fps (
                fps_code, name, dealer_id, city, state, latitude, longitude, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (fps_code) DO UPDATE SET
                name = excluded.name,
                dealer_id = COALESCE(excluded.dealer_id, fps.dealer_id),
                city = COALESCE(excluded.city, fps.city),
                state = COALESCE(excluded.state, fps.state),
                latitude = COALESCE(excluded.latitude, fps.latitude),
                longitude = COALESCE(excluded.longitude, fps.longitude)
            "#,
        )
        .bind(&fps.fps_code)
        .bind(&fps.name)
        .bind(fps.dealer_id)
        .bind(fps.city.as_deref())
        .bind(fps.state.as_deref())
        .bind(fps.latitude)
        .bind(fps.longitude)
        .bind(fps.created_at.timestamp())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to upsert FPS {}", fps.fps_code))?;

        Ok(())
    }

    /// Count a delivery against a shop, creating the shop (named after its
    /// code) if it is not registered yet.
    pub async fn record_fps_delivery(
        &self,
        fps_code: &str,
        dealer_id: Option<i64>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fps (fps_code, name, dealer_id, delivery_count, last_delivery, created_at)
            VALUES (?, ?, ?, 1, ?, ?)
            ON CONFLICT (fps_code) DO UPDATE SET
                delivery_count = fps.delivery_count + 1,
                last_delivery = MAX(COALESCE(fps.last_delivery, 0), excluded.last_delivery),
                dealer_id = COALESCE(fps.dealer_id, excluded.dealer_id)
            "#,
        )
        .bind(fps_code)
        .bind(fps_code)
        .bind(dealer_id)
        .bind(at.timestamp())
        .bind(at.timestamp())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to update FPS stats for {}", fps_code))?;

        Ok(())
    }

    /// Get a shop by code.
    pub async fn get_fps(&self, fps_code: &str) -> Result<Option<FpsRecord>> {
        let row = sqlx::query(&format!("SELECT {} FROM fps WHERE fps_code = ?", FPS_COLUMNS))
            .bind(fps_code)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch FPS")?;

        row.as_ref().map(fps_from_row).transpose()
    }

    /// All shops ordered by code.
    pub async fn list_fps(&self) -> Result<Vec<FpsRecord>> {
        let rows = sqlx::query(&format!("SELECT {} FROM fps ORDER BY fps_code", FPS_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list FPS")?;

        rows.iter().map(fps_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::storage;
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_record_delivery_creates_and_counts() {
        let (storage, _temp_db) = storage().await;
        let now = Utc::now();

        storage
            .record_fps_delivery("FPS123456", None, now - Duration::hours(1))
            .await
            .unwrap();
        storage.record_fps_delivery("FPS123456", None, now).await.unwrap();

        let fps = storage.get_fps("FPS123456").await.unwrap().unwrap();
        assert_eq!(fps.name, "FPS123456");
        assert_eq!(fps.delivery_count, 2);
        assert_eq!(fps.last_delivery.map(|t| t.timestamp()), Some(now.timestamp()));
    }

    #[tokio::test]
    async fn test_upsert_keeps_counters() {
        let (storage, _temp_db) = storage().await;
        let now = Utc::now();

        storage.record_fps_delivery("FPS000001", None, now).await.unwrap();
        storage
            .upsert_fps(&NewFps {
                fps_code: "FPS000001".to_string(),
                name: "Mumbai Ration Store".to_string(),
                dealer_id: None,
                city: Some("Mumbai".to_string()),
                state: Some("Maharashtra".to_string()),
                latitude: Some(19.07),
                longitude: Some(72.87),
                created_at: now,
            })
            .await
            .unwrap();

        let all = storage.list_fps().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Mumbai Ration Store");
        assert_eq!(all[0].city.as_deref(), Some("Mumbai"));
        assert_eq!(all[0].delivery_count, 1);
    }
}
