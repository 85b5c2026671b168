//! Postgres-backed store.
//!
//! Counters, accounts, the session whitelist and the ban ledger each map to
//! one table of `db/sql/schema.sql`. Atomicity comes from single statements:
//! the counter increment is one `UPDATE ... RETURNING`, first-use creation is
//! one `INSERT ... ON CONFLICT DO NOTHING`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, Connection, PgPool, Row};
use std::time::Duration;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::{
    AccountStore, BanStore, CounterStore, InsertOutcome, SessionStore, Store, StoreError,
};
use crate::identity::models::{Account, BanRecord, LoginIdentifier, NewBan, SessionRecord};

pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/db/sql/schema.sql"));

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a small pool whose acquire timeout matches the store timeout.
    ///
    /// # Errors
    /// Returns an error if the database cannot be reached.
    pub async fn connect(dsn: &str, store_timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .acquire_timeout(store_timeout)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply `db/sql/schema.sql`; every statement is idempotent.
    ///
    /// # Errors
    /// Returns an error if any statement fails.
    pub async fn migrate(&self) -> Result<()> {
        for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }
        Ok(())
    }
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');
        if trimmed.ends_with(';') {
            statements.push(std::mem::take(&mut current));
        }
    }
    if !current.trim().is_empty() {
        statements.push(current);
    }

    statements
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn span(operation: &'static str, statement: &'static str) -> tracing::Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn account_from_row(row: &PgRow) -> Account {
    Account {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
    }
}

fn ban_from_row(row: &PgRow) -> BanRecord {
    BanRecord {
        ban_id: row.get("id"),
        user_id: row.get("user_id"),
        banned_by: row.get("banned_by"),
        reason: row.get("reason"),
        ban_start: row.get("ban_start"),
        ban_end: row.get("ban_end"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl CounterStore for PgStore {
    async fn increment_counter(&self, name: &str) -> Result<Option<i64>, StoreError> {
        let query = "UPDATE counters SET value = value + 1 WHERE name = $1 RETURNING value";
        let row = sqlx::query(query)
            .bind(name)
            .fetch_optional(&self.pool)
            .instrument(span("UPDATE", query))
            .await?;
        Ok(row.map(|row| row.get("value")))
    }

    async fn create_counter(&self, name: &str) -> Result<bool, StoreError> {
        let query = r"
            INSERT INTO counters (name, value)
            VALUES ($1, 1)
            ON CONFLICT (name) DO NOTHING
            RETURNING value
        ";
        let row = sqlx::query(query)
            .bind(name)
            .fetch_optional(&self.pool)
            .instrument(span("INSERT", query))
            .await?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn account_exists(&self, username: &str, email: &str) -> Result<bool, StoreError> {
        let query = "SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 OR email = $2) AS taken";
        let row = sqlx::query(query)
            .bind(username)
            .bind(email)
            .fetch_one(&self.pool)
            .instrument(span("SELECT", query))
            .await?;
        Ok(row.get("taken"))
    }

    async fn insert_account(&self, account: &Account) -> Result<InsertOutcome, StoreError> {
        let query = r"
            INSERT INTO users (id, username, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5)
        ";
        let result = sqlx::query(query)
            .bind(account.id)
            .bind(&account.username)
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(account.created_at)
            .execute(&self.pool)
            .instrument(span("INSERT", query))
            .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Created),
            Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_account(
        &self,
        identifier: &LoginIdentifier,
    ) -> Result<Option<Account>, StoreError> {
        let row = match identifier {
            LoginIdentifier::Id(id) => {
                let query = "SELECT id, username, email, password_hash, created_at FROM users WHERE id = $1";
                sqlx::query(query)
                    .bind(*id)
                    .fetch_optional(&self.pool)
                    .instrument(span("SELECT", query))
                    .await?
            }
            LoginIdentifier::Email(email) => {
                let query = "SELECT id, username, email, password_hash, created_at FROM users WHERE email = $1";
                sqlx::query(query)
                    .bind(email)
                    .fetch_optional(&self.pool)
                    .instrument(span("SELECT", query))
                    .await?
            }
            LoginIdentifier::Username(username) => {
                let query = "SELECT id, username, email, password_hash, created_at FROM users WHERE username = $1";
                sqlx::query(query)
                    .bind(username)
                    .fetch_optional(&self.pool)
                    .instrument(span("SELECT", query))
                    .await?
            }
        };
        Ok(row.as_ref().map(account_from_row))
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn insert_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let query = "INSERT INTO user_sessions (token_id, user_id, expires_at) VALUES ($1, $2, $3)";
        sqlx::query(query)
            .bind(&record.token_id)
            .bind(record.user_id)
            .bind(record.expires_at)
            .execute(&self.pool)
            .instrument(span("INSERT", query))
            .await?;
        Ok(())
    }

    async fn find_session(
        &self,
        token_id: &str,
        user_id: i64,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let query = r"
            SELECT token_id, user_id, expires_at
            FROM user_sessions
            WHERE token_id = $1 AND user_id = $2
        ";
        let row = sqlx::query(query)
            .bind(token_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(span("SELECT", query))
            .await?;
        Ok(row.map(|row| SessionRecord {
            token_id: row.get("token_id"),
            user_id: row.get("user_id"),
            expires_at: row.get("expires_at"),
        }))
    }

    async fn extend_session(
        &self,
        token_id: &str,
        user_id: i64,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let query = "UPDATE user_sessions SET expires_at = $3 WHERE token_id = $1 AND user_id = $2";
        sqlx::query(query)
            .bind(token_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .instrument(span("UPDATE", query))
            .await?;
        Ok(())
    }

    async fn delete_session(&self, token_id: &str) -> Result<bool, StoreError> {
        let query = "DELETE FROM user_sessions WHERE token_id = $1";
        let result = sqlx::query(query)
            .bind(token_id)
            .execute(&self.pool)
            .instrument(span("DELETE", query))
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user_sessions(&self, user_id: i64) -> Result<u64, StoreError> {
        let query = "DELETE FROM user_sessions WHERE user_id = $1";
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(span("DELETE", query))
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let query = "DELETE FROM user_sessions WHERE expires_at <= $1";
        let result = sqlx::query(query)
            .bind(now)
            .execute(&self.pool)
            .instrument(span("DELETE", query))
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl BanStore for PgStore {
    async fn insert_ban(&self, ban: &NewBan, now: DateTime<Utc>) -> Result<BanRecord, StoreError> {
        let query = r"
            INSERT INTO user_bans
                (id, user_id, banned_by, reason, ban_start, ban_end, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE, $5, $5)
            RETURNING id, user_id, banned_by, reason, ban_start, ban_end, is_active, created_at, updated_at
        ";
        let row = sqlx::query(query)
            .bind(Uuid::new_v4())
            .bind(ban.user_id)
            .bind(ban.banned_by)
            .bind(ban.reason.as_deref())
            .bind(now)
            .bind(ban.ban_end)
            .fetch_one(&self.pool)
            .instrument(span("INSERT", query))
            .await?;
        Ok(ban_from_row(&row))
    }

    async fn find_active_ban(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<BanRecord>, StoreError> {
        let query = r"
            SELECT id, user_id, banned_by, reason, ban_start, ban_end, is_active, created_at, updated_at
            FROM user_bans
            WHERE user_id = $1
              AND is_active = TRUE
              AND (ban_end IS NULL OR ban_end > $2)
            ORDER BY ban_start DESC
            LIMIT 1
        ";
        let row = sqlx::query(query)
            .bind(user_id)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(span("SELECT", query))
            .await?;
        Ok(row.as_ref().map(ban_from_row))
    }

    async fn deactivate_bans(&self, user_id: i64, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let query = r"
            UPDATE user_bans
            SET is_active = FALSE, updated_at = $2
            WHERE user_id = $1 AND is_active = TRUE
        ";
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(now)
            .execute(&self.pool)
            .instrument(span("UPDATE", query))
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_bans(&self, user_id: i64) -> Result<Vec<BanRecord>, StoreError> {
        let query = r"
            SELECT id, user_id, banned_by, reason, ban_start, ban_end, is_active, created_at, updated_at
            FROM user_bans
            WHERE user_id = $1
            ORDER BY ban_start DESC
        ";
        let rows = sqlx::query(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .instrument(span("SELECT", query))
            .await?;
        Ok(rows.iter().map(ban_from_row).collect())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .instrument(info_span!(
                "db.acquire",
                db.system = "postgresql",
                db.operation = "ACQUIRE"
            ))
            .await?;
        conn.ping()
            .instrument(info_span!(
                "db.ping",
                db.system = "postgresql",
                db.operation = "PING"
            ))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_splits_into_statements() {
        let statements = split_sql_statements(SCHEMA_SQL);
        assert!(statements.len() >= 4);
        assert!(statements.iter().all(|s| s.trim_end().ends_with(';')));
        assert!(statements
            .iter()
            .any(|s| s.contains("CREATE TABLE IF NOT EXISTS counters")));
    }

    #[test]
    fn split_skips_comments_and_blank_lines() {
        let sql = "-- comment\n\nCREATE TABLE a (id INT);\nCREATE TABLE b (\n  id INT\n);\n";
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[1].contains("CREATE TABLE b"));
    }

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
