//! Trust-score storage operations.
//!
//! Every score change writes the new score and its history row in one
//! transaction, so `users.trust_score` always matches the newest record.

use super::{to_datetime, Storage, TrustChange, TrustScoreRecord};
use anyhow::{Context, Result};
use annsuraksha_core::apply_delta;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use tracing::{debug, warn};

fn record_from_row(row: &SqliteRow) -> Result<TrustScoreRecord> {
    let old_score: i64 = row.try_get("old_score")?;
    let new_score: i64 = row.try_get("new_score")?;
    let delta: i64 = row.try_get("delta")?;

    Ok(TrustScoreRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        old_score: u8::try_from(old_score).context("Stored old_score out of range")?,
        new_score: u8::try_from(new_score).context("Stored new_score out of range")?,
        delta: i32::try_from(delta).context("Stored delta out of range")?,
        reason: row.try_get("reason")?,
        created_at: to_datetime(row.try_get("created_at")?)?,
    })
}

async fn write_trust_delta(
    conn: &mut SqliteConnection,
    user_id: i64,
    delta: i32,
    reason: &str,
    at: DateTime<Utc>,
) -> Result<Option<TrustChange>> {
    let current: Option<i64> = sqlx::query_scalar("SELECT trust_score FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to read trust score")?;

    let Some(current) = current else {
        return Ok(None);
    };
    let old_score = u8::try_from(current).context("Stored trust score out of range")?;
    let new_score = apply_delta(old_score, delta);

    sqlx::query("UPDATE users SET trust_score = ? WHERE id = ?")
        .bind(new_score as i64)
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .context("Failed to update trust score")?;

    sqlx::query(
        r#"
        INSERT INTO trust_scores (user_id, old_score, new_score, delta, reason, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(old_score as i64)
    .bind(new_score as i64)
    .bind(delta as i64)
    .bind(reason)
    .bind(at.timestamp())
    .execute(&mut *conn)
    .await
    .context("Failed to insert trust score record")?;

    Ok(Some(TrustChange {
        old_score,
        new_score,
    }))
}

impl Storage {
    /// Apply `delta` to a user's trust score, clamped to 0..=100, and append
    /// a history record.
    ///
    /// The write lock is taken before the current score is read, so
    /// concurrent callers queue on the busy timeout instead of failing on
    /// a lock upgrade.
    ///
    /// Returns `None` if the user does not exist.
    pub async fn apply_trust_delta(
        &self,
        user_id: i64,
        delta: i32,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<TrustChange>> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .context("Failed to start trust update")?;

        let result = match write_trust_delta(&mut conn, user_id, delta, reason, at).await {
            Ok(change) => sqlx::query("COMMIT")
                .execute(&mut *conn)
                .await
                .context("Failed to commit trust update")
                .map(|_| change),
            Err(err) => Err(err),
        };

        if result.is_err() {
            let rollback = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            if let Err(err) = rollback {
                warn!(user_id, error = %err, "Rollback failed, discarding connection");
                let _ = conn.close().await;
            }
            return result;
        }

        if let Ok(Some(change)) = &result {
            debug!(
                user_id,
                old_score = change.old_score,
                new_score = change.new_score,
                delta,
                reason,
                "Trust score updated"
            );
        }

        result
    }

    /// Append a history record without touching the user's current score.
    pub async fn insert_trust_record(
        &self,
        user_id: i64,
        old_score: u8,
        new_score: u8,
        delta: i32,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO trust_scores (user_id, old_score, new_score, delta, reason, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(old_score as i64)
        .bind(new_score as i64)
        .bind(delta as i64)
        .bind(reason)
        .bind(at.timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to insert trust score record")?;

        Ok(result.last_insert_rowid())
    }

    /// Trust history for a user, newest first.
    pub async fn trust_history(&self, user_id: i64) -> Result<Vec<TrustScoreRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, old_score, new_score, delta, reason, created_at
            FROM trust_scores
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch trust history")?;

        rows.iter().map(record_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{new_user, storage};
    use annsuraksha_core::Role;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_delta_is_clamped_and_recorded() {
        let (storage, _temp_db) = storage().await;
        let id = storage
            .insert_user(&new_user("b@example.com", Role::Beneficiary, None))
            .await
            .unwrap();
        let now = Utc::now();

        let change = storage
            .apply_trust_delta(id, 5, "Delivery confirmed", now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!((change.old_score, change.new_score), (100, 100));

        let change = storage
            .apply_trust_delta(id, -250, "Penalty", now + Duration::seconds(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!((change.old_score, change.new_score), (100, 0));

        let user = storage.get_user(id).await.unwrap().unwrap();
        assert_eq!(user.trust_score, 0);

        let history = storage.trust_history(id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].reason, "Penalty");
        assert_eq!(history[0].delta, -250);
        assert_eq!(history[0].new_score, 0);
        assert_eq!(history[1].reason, "Delivery confirmed");
    }

    #[tokio::test]
    async fn test_missing_user() {
        let (storage, _temp_db) = storage().await;
        let result = storage
            .apply_trust_delta(42, -10, "Complaint", Utc::now())
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(storage.trust_history(42).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_deltas_all_apply() {
        let (storage, _temp_db) = storage().await;

        let mut ids = Vec::new();
        for i in 0..4 {
            let email = format!("user{}@example.com", i);
            ids.push(
                storage
                    .insert_user(&new_user(&email, Role::Beneficiary, None))
                    .await
                    .unwrap(),
            );
        }

        let handles: Vec<_> = (0..40)
            .map(|n| {
                let storage = storage.clone();
                let user_id = ids[n % ids.len()];
                tokio::spawn(async move {
                    storage
                        .apply_trust_delta(user_id, -3, "Complaint filed", Utc::now())
                        .await
                })
            })
            .collect();

        let mut failures = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(Some(_)) => {}
                _ => failures += 1,
            }
        }
        assert_eq!(failures, 0);

        for id in ids {
            let user = storage.get_user(id).await.unwrap().unwrap();
            assert_eq!(user.trust_score, 70);

            // Every update starts from the score the previous one left.
            let history = storage.trust_history(id).await.unwrap();
            assert_eq!(history.len(), 10);
            let mut old_scores: Vec<u8> = history.iter().map(|r| r.old_score).collect();
            old_scores.sort_unstable();
            let expected: Vec<u8> = (0..10).map(|k| 73 + 3 * k).collect();
            assert_eq!(old_scores, expected);
            assert!(history.iter().all(|r| r.new_score + 3 == r.old_score));
        }
    }
}
