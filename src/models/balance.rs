use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{Error, Result};

/// The Ledger: a per-(user, ticker) integer balance store with
/// reserve/release/transfer primitives. There is no separate "reserved"
/// column — reservation is modelled by debiting free balance at order entry;
/// refunds and settlement credits are plain credits. Every mutation goes
/// through `credit`/`debit` so the non-negative invariant is enforced in one
/// place.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Balance {
    pub user_id: Uuid,
    pub ticker: String,
    pub amount: i64,
}

impl Balance {
    fn lock_key(user_id: Uuid, ticker: &str) -> i64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let bytes = user_id.as_bytes();
        let uuid_part = i64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]);

        let mut hasher = DefaultHasher::new();
        ticker.hash(&mut hasher);
        let ticker_hash = hasher.finish() as i64;

        uuid_part ^ ticker_hash
    }

    pub async fn get(pool: &PgPool, user_id: Uuid, ticker: &str) -> Result<i64> {
        let amount: Option<i64> =
            sqlx::query_scalar("SELECT amount FROM balances WHERE user_id = $1 AND ticker = $2")
                .bind(user_id)
                .bind(ticker)
                .fetch_optional(pool)
                .await?;
        Ok(amount.unwrap_or(0))
    }

    pub async fn snapshot(pool: &PgPool, user_id: Uuid) -> Result<HashMap<String, i64>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT ticker, amount FROM balances WHERE user_id = $1 ORDER BY ticker")
                .bind(user_id)
                .fetch_all(pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    /// `balance += amount`, creating the row if absent. Always succeeds.
    pub async fn credit(pool: &PgPool, user_id: Uuid, ticker: &str, amount: i64) -> Result<()> {
        let mut tx = pool.begin().await?;
        Self::credit_in_tx(&mut tx, user_id, ticker, amount).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Fails with `InsufficientFunds` when balance absent or `< amount`.
    pub async fn debit(pool: &PgPool, user_id: Uuid, ticker: &str, amount: i64) -> Result<()> {
        let mut tx = pool.begin().await?;
        Self::debit_in_tx(&mut tx, user_id, ticker, amount).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn credit_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        ticker: &str,
        amount: i64,
    ) -> Result<()> {
        debug_assert!(amount > 0);
        let lock_key = Self::lock_key(user_id, ticker);
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(lock_key)
            .execute(&mut **tx)
            .await?;

        sqlx::query(
            "INSERT INTO balances (user_id, ticker, amount) VALUES ($1, $2, $3)
             ON CONFLICT (user_id, ticker) DO UPDATE SET amount = balances.amount + $3, updated_at = NOW()",
        )
        .bind(user_id)
        .bind(ticker)
        .bind(amount)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    pub async fn debit_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        ticker: &str,
        amount: i64,
    ) -> Result<()> {
        debug_assert!(amount > 0);
        let lock_key = Self::lock_key(user_id, ticker);
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(lock_key)
            .execute(&mut **tx)
            .await?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT amount FROM balances WHERE user_id = $1 AND ticker = $2")
                .bind(user_id)
                .bind(ticker)
                .fetch_optional(&mut **tx)
                .await?;

        let current = current.unwrap_or(0);
        if current < amount {
            return Err(Error::InsufficientFunds);
        }

        sqlx::query("UPDATE balances SET amount = amount - $3, updated_at = NOW() WHERE user_id = $1 AND ticker = $2")
            .bind(user_id)
            .bind(ticker)
            .bind(amount)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }
}
