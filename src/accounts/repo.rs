use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Address, Credentials, User};
use crate::error::ApiError;

const USER_COLUMNS: &str = "id, name, email, avatar, phone_number, role, addresses, created_at";

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(user)
    }

    /// Persists an activated registration. The UNIQUE constraint on `email`
    /// is the last line of defense against two redemptions racing past the
    /// existence check.
    pub async fn create(
        db: &PgPool,
        name: &str,
        email: &str,
        password_hash: &str,
        avatar: &str,
    ) -> Result<User, ApiError> {
        let query = format!(
            "INSERT INTO users (name, email, password_hash, avatar) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        let result = sqlx::query_as::<_, User>(&query)
            .bind(name)
            .bind(email)
            .bind(password_hash)
            .bind(avatar)
            .fetch_one(db)
            .await;
        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(ApiError::DuplicateAccount)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The only reads that may touch the stored hash.
    pub async fn credentials_by_email(
        db: &PgPool,
        email: &str,
    ) -> anyhow::Result<Option<Credentials>> {
        let creds = sqlx::query_as::<_, Credentials>(
            "SELECT id, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(creds)
    }

    pub async fn credentials_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Credentials>> {
        let creds =
            sqlx::query_as::<_, Credentials>("SELECT id, password_hash FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(db)
                .await?;
        Ok(creds)
    }

    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        name: &str,
        email: &str,
        phone_number: Option<&str>,
    ) -> Result<User, ApiError> {
        let query = format!(
            "UPDATE users SET name = $2, email = $3, phone_number = $4 \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let result = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(name)
            .bind(email)
            .bind(phone_number)
            .fetch_one(db)
            .await;
        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(ApiError::DuplicateAccount)
            }
            Err(sqlx::Error::RowNotFound) => Err(ApiError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn update_avatar(db: &PgPool, id: Uuid, avatar: &str) -> anyhow::Result<User> {
        let query = format!("UPDATE users SET avatar = $2 WHERE id = $1 RETURNING {USER_COLUMNS}");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(avatar)
            .fetch_one(db)
            .await?;
        Ok(user)
    }

    /// Replaces the whole address list in one write; per-row atomicity is
    /// what keeps the addressType invariant under concurrent requests.
    pub async fn update_addresses(
        db: &PgPool,
        id: Uuid,
        addresses: &[Address],
    ) -> anyhow::Result<User> {
        let query =
            format!("UPDATE users SET addresses = $2 WHERE id = $1 RETURNING {USER_COLUMNS}");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(Json(addresses))
            .fetch_one(db)
            .await?;
        Ok(user)
    }

    pub async fn update_password(db: &PgPool, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(db)
            .await?;
        Ok(())
    }
}
