//! DAO vote storage operations.

use super::{DaoTally, Storage};
use anyhow::{Context, Result};
use annsuraksha_core::Vote;
use chrono::{DateTime, Utc};
use sqlx::Row;

impl Storage {
    /// Record one vote on a dealer. Votes are not deduplicated per voter.
    pub async fn insert_vote(
        &self,
        dealer_id: &str,
        vote: Vote,
        voter_email: &str,
        at: DateTime<Utc>,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO dao_votes (dealer_id, vote, voter_email, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(dealer_id)
        .bind(vote.as_str())
        .bind(voter_email)
        .bind(at.timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to insert DAO vote")?;

        Ok(result.last_insert_rowid())
    }

    /// Yes/no counts for a dealer; zeros when nobody voted.
    pub async fn tally(&self, dealer_id: &str) -> Result<DaoTally> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(vote = 'yes'), 0) AS yes,
                   COALESCE(SUM(vote = 'no'), 0)  AS no
            FROM dao_votes
            WHERE dealer_id = ?
            "#,
        )
        .bind(dealer_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to tally DAO votes")?;

        Ok(DaoTally {
            yes: row.try_get("yes")?,
            no: row.try_get("no")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::storage;
    use super::*;

    #[tokio::test]
    async fn test_tally_per_dealer() {
        let (storage, _temp_db) = storage().await;
        let now = Utc::now();

        assert_eq!(storage.tally("D1").await.unwrap(), DaoTally::default());

        storage.insert_vote("D1", Vote::Yes, "a@x.in", now).await.unwrap();
        storage.insert_vote("D1", Vote::Yes, "b@x.in", now).await.unwrap();
        storage.insert_vote("D1", Vote::No, "c@x.in", now).await.unwrap();
        storage.insert_vote("D2", Vote::No, "a@x.in", now).await.unwrap();

        assert_eq!(storage.tally("D1").await.unwrap(), DaoTally { yes: 2, no: 1 });
        assert_eq!(storage.tally("D2").await.unwrap(), DaoTally { yes: 0, no: 1 });
    }
}
