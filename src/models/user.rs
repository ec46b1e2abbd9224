use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub api_key: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    fn generate_api_key() -> String {
        format!("key-{}", Uuid::new_v4())
    }

    pub async fn register(pool: &PgPool, name: &str) -> Result<Self> {
        if name.trim().len() < 3 {
            return Err(Error::Validation("name must be at least 3 characters".into()));
        }

        let api_key = Self::generate_api_key();
        let user = sqlx::query_as::<_, Self>(
            "INSERT INTO users (name, role, api_key) VALUES ($1, 'user', $2) RETURNING *",
        )
        .bind(name)
        .bind(&api_key)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn create_admin(pool: &PgPool, name: &str, api_key: &str) -> Result<Self> {
        let user = sqlx::query_as::<_, Self>(
            "INSERT INTO users (name, role, api_key) VALUES ($1, 'admin', $2) RETURNING *",
        )
        .bind(name)
        .bind(api_key)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn any_admin_exists(pool: &PgPool) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
            .fetch_one(pool)
            .await?;
        Ok(count > 0)
    }

    pub async fn find_by_api_key(pool: &PgPool, api_key: &str) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, Self>("SELECT * FROM users WHERE api_key = $1")
            .bind(api_key)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, Self>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    /// Deletes the user, cancelling every active order through the normal
    /// refunding cancel path first so no reservation is stranded. Uses
    /// `cancel_internal` rather than the owner-checked, limit-only `cancel`
    /// since cascading deletion must also refund any market order the
    /// engine left live after a partial fill.
    pub async fn delete_cascading(pool: &PgPool, user_id: Uuid) -> Result<Self> {
        let user = Self::find_by_id(pool, user_id)
            .await?
            .ok_or(Error::NotFound)?;

        let active: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM orders WHERE user_id = $1 AND status IN ('NEW', 'PARTIALLY_EXECUTED')",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        for order_id in active {
            let mut tx = pool.begin().await?;
            super::Order::cancel_internal(&mut tx, order_id).await?;
            tx.commit().await?;
        }

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(user)
    }
}
