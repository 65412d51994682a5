//! User persistence and the refresh-token reference stored on each user row.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::token::Role;

use super::utils::is_unique_violation;

/// Full user row minus the refresh-token columns.
#[derive(Clone, Debug)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Created(Uuid),
    Conflict,
}

/// Storage seam for the auth handlers.
///
/// `rotate_refresh_token` must be atomic: when two callers present the same
/// hash, at most one of them gets a row back.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> Result<InsertOutcome>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>>;

    /// Owner of a stored refresh-token hash, expired or not.
    async fn find_by_refresh_token(&self, token_hash: &[u8]) -> Result<Option<UserRecord>>;

    async fn list_users(&self) -> Result<Vec<UserRecord>>;

    /// Overwrite the user's refresh-token reference.
    async fn store_refresh_token(
        &self,
        user_id: Uuid,
        token_hash: &[u8],
        ttl_seconds: i64,
    ) -> Result<()>;

    /// Swap `presented` for `replacement` if it is stored and unexpired.
    async fn rotate_refresh_token(
        &self,
        presented: &[u8],
        replacement: &[u8],
        ttl_seconds: i64,
    ) -> Result<Option<UserRecord>>;

    async fn clear_refresh_token(&self, user_id: Uuid) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &PgRow) -> Result<UserRecord> {
    let role: String = row.try_get("role")?;
    Ok(UserRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: role.parse::<Role>().map_err(|err| anyhow!(err))?,
    })
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert_user(&self, user: NewUser) -> Result<InsertOutcome> {
        let query = r"
            INSERT INTO users
                (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(row) => Ok(InsertOutcome::Created(row.try_get("id")?)),
            Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let query = "SELECT id, name, email, password_hash, role FROM users WHERE email = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by email")?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>> {
        let query = "SELECT id, name, email, password_hash, role FROM users WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by id")?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_refresh_token(&self, token_hash: &[u8]) -> Result<Option<UserRecord>> {
        let query = r"
            SELECT id, name, email, password_hash, role
            FROM users
            WHERE refresh_token_hash = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup refresh token owner")?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>> {
        let query = r"
            SELECT id, name, email, password_hash, role
            FROM users
            ORDER BY created_at DESC
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list users")?;

        rows.iter().map(user_from_row).collect()
    }

    async fn store_refresh_token(
        &self,
        user_id: Uuid,
        token_hash: &[u8],
        ttl_seconds: i64,
    ) -> Result<()> {
        let query = r"
            UPDATE users
            SET refresh_token_hash = $2,
                refresh_token_expires_at = NOW() + ($3 * INTERVAL '1 second'),
                updated_at = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(token_hash)
            .bind(ttl_seconds)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to store refresh token")?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("user {user_id} not found while storing refresh token"));
        }

        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        presented: &[u8],
        replacement: &[u8],
        ttl_seconds: i64,
    ) -> Result<Option<UserRecord>> {
        // Single conditional UPDATE: the row lock serializes concurrent
        // rotations and the loser no longer matches the WHERE clause.
        let query = r"
            UPDATE users
            SET refresh_token_hash = $2,
                refresh_token_expires_at = NOW() + ($3 * INTERVAL '1 second'),
                updated_at = NOW()
            WHERE refresh_token_hash = $1
              AND refresh_token_expires_at > NOW()
            RETURNING id, name, email, password_hash, role
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(presented)
            .bind(replacement)
            .bind(ttl_seconds)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to rotate refresh token")?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn clear_refresh_token(&self, user_id: Uuid) -> Result<()> {
        let query = r"
            UPDATE users
            SET refresh_token_hash = NULL,
                refresh_token_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to clear refresh token")?;

        Ok(())
    }
}
