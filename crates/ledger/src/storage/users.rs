//! User storage operations.

use super::{to_address_opt, to_datetime, to_datetime_opt, NewUser, Storage, TrustOverview, UserRecord};
use anyhow::{Context, Result};
use annsuraksha_core::Role;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

const USER_COLUMNS: &str = r#"
    id, name, email, password_hash, role, trust_score, aadhar_number,
    wallet_address, phone, reputation_score, created_at, last_login, last_alert
"#;

fn user_from_row(row: &SqliteRow) -> Result<UserRecord> {
    let role: String = row.try_get("role")?;
    let trust_score: i64 = row.try_get("trust_score")?;

    Ok(UserRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: role.parse::<Role>()?,
        trust_score: u8::try_from(trust_score)
            .with_context(|| format!("Stored trust score out of range: {}", trust_score))?,
        aadhar_number: row.try_get("aadhar_number")?,
        wallet_address: to_address_opt(row.try_get("wallet_address")?)?,
        phone: row.try_get("phone")?,
        reputation_score: row.try_get("reputation_score")?,
        created_at: to_datetime(row.try_get("created_at")?)?,
        last_login: to_datetime_opt(row.try_get("last_login")?)?,
        last_alert: to_datetime_opt(row.try_get("last_alert")?)?,
    })
}

impl Storage {
    /// Insert a user. Returns the new row id.
    ///
    /// Fails on a duplicate email or aadhar number.
    pub async fn insert_user(&self, user: &NewUser) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (
                name, email, password_hash, role, trust_score,
                aadhar_number, wallet_address, phone, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.trust_score as i64)
        .bind(user.aadhar_number.as_deref())
        .bind(user.wallet_address.as_ref().map(|a| a.as_slice()))
        .bind(user.phone.as_deref())
        .bind(user.created_at.timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to insert user")?;

        Ok(result.last_insert_rowid())
    }

    /// Get a user by id.
    pub async fn get_user(&self, id: i64) -> Result<Option<UserRecord>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user")?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Get a user by email.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE email = ?",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by email")?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Get a user by aadhar number.
    pub async fn get_user_by_aadhar(&self, aadhar_number: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE aadhar_number = ?",
            USER_COLUMNS
        ))
        .bind(aadhar_number)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by aadhar number")?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// List users with the given role, oldest first.
    pub async fn list_users_by_role(&self, role: Role) -> Result<Vec<UserRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users WHERE role = ? ORDER BY id",
            USER_COLUMNS
        ))
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list users by role")?;

        rows.iter().map(user_from_row).collect()
    }

    /// Whether an account with this email exists.
    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check email")?;
        Ok(count > 0)
    }

    /// Record a successful login.
    pub async fn set_last_login(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(at.timestamp())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update last_login")?;
        Ok(())
    }

    /// Record that the monitor alerted on this user.
    pub async fn set_last_alert(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET last_alert = ? WHERE id = ?")
            .bind(at.timestamp())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update last_alert")?;
        Ok(())
    }

    /// Users below `threshold` that were not alerted on or after `alerted_before`.
    pub async fn low_trust_candidates(
        &self,
        threshold: u8,
        alerted_before: DateTime<Utc>,
    ) -> Result<Vec<UserRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM users
            WHERE trust_score < ?
              AND (last_alert IS NULL OR last_alert < ?)
            ORDER BY trust_score, id
            "#,
            USER_COLUMNS
        ))
        .bind(threshold as i64)
        .bind(alerted_before.timestamp())
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch low-trust candidates")?;

        rows.iter().map(user_from_row).collect()
    }

    /// Users registered before `created_before`, oldest first, at most `limit`.
    pub async fn users_created_before(
        &self,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<UserRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM users
            WHERE created_at < ?
            ORDER BY created_at
            LIMIT ?
            "#,
            USER_COLUMNS
        ))
        .bind(created_before.timestamp())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch training users")?;

        rows.iter().map(user_from_row).collect()
    }

    /// Add `delta` to a dealer's reputation.
    pub async fn adjust_reputation(&self, id: i64, delta: i64) -> Result<()> {
        sqlx::query("UPDATE users SET reputation_score = reputation_score + ? WHERE id = ?")
            .bind(delta)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update reputation_score")?;
        Ok(())
    }

    /// Average/min/max/count of all trust scores; zeros when there are no users.
    pub async fn trust_overview(&self) -> Result<TrustOverview> {
        let row = sqlx::query(
            r#"
            SELECT AVG(trust_score) AS average,
                   MIN(trust_score) AS min,
                   MAX(trust_score) AS max,
                   COUNT(*)         AS count
            FROM users
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to compute trust overview")?;

        let count: i64 = row.try_get("count")?;
        if count == 0 {
            return Ok(TrustOverview::default());
        }

        let average: f64 = row.try_get("average")?;
        Ok(TrustOverview {
            average: (average * 100.0).round() / 100.0,
            min: row.try_get("min")?,
            max: row.try_get("max")?,
            count,
        })
    }
}
