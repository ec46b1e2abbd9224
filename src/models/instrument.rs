use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::{Error, Result};

pub const QUOTE_CURRENCY: &str = "USD";
const WELL_KNOWN_FIAT: [&str; 3] = ["USD", "EUR", "RUB"];

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Instrument {
    pub ticker: String,
    pub name: String,
}

impl Instrument {
    fn validate_ticker(ticker: &str) -> Result<()> {
        let len = ticker.len();
        if !(2..=10).contains(&len) || !ticker.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(Error::Validation(
                "ticker must be 2-10 uppercase letters".into(),
            ));
        }
        Ok(())
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        let rows = sqlx::query_as::<_, Self>("SELECT * FROM instruments ORDER BY ticker")
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    pub async fn exists(pool: &PgPool, ticker: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM instruments WHERE ticker = $1")
            .bind(ticker)
            .fetch_one(pool)
            .await?;
        Ok(count > 0)
    }

    pub async fn require_exists(pool: &PgPool, ticker: &str) -> Result<()> {
        if Self::exists(pool, ticker).await? {
            Ok(())
        } else {
            Err(Error::UnknownInstrument(ticker.to_string()))
        }
    }

    pub async fn register(pool: &PgPool, ticker: &str, name: &str) -> Result<Self> {
        Self::validate_ticker(ticker)?;
        if Self::exists(pool, ticker).await? {
            return Err(Error::DuplicateInstrument(ticker.to_string()));
        }

        let instrument =
            sqlx::query_as::<_, Self>("INSERT INTO instruments (ticker, name) VALUES ($1, $2) RETURNING *")
                .bind(ticker)
                .bind(name)
                .fetch_one(pool)
                .await?;

        Ok(instrument)
    }

    /// Deletes the instrument, cancelling active orders on it through the
    /// normal refunding cancel path. Uses `cancel_internal` rather than the
    /// owner-checked, limit-only `cancel` since cascading deletion must also
    /// refund any market order the engine left live after a partial fill.
    pub async fn delete_cascading(pool: &PgPool, ticker: &str) -> Result<()> {
        if !Self::exists(pool, ticker).await? {
            return Err(Error::NotFound);
        }

        let active: Vec<uuid::Uuid> = sqlx::query_scalar(
            "SELECT id FROM orders WHERE ticker = $1 AND status IN ('NEW', 'PARTIALLY_EXECUTED')",
        )
        .bind(ticker)
        .fetch_all(pool)
        .await?;

        for order_id in active {
            let mut tx = pool.begin().await?;
            super::Order::cancel_internal(&mut tx, order_id).await?;
            tx.commit().await?;
        }

        sqlx::query("DELETE FROM instruments WHERE ticker = $1")
            .bind(ticker)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Auto-vivifies the well-known fiat instruments on deposit, per the
    /// source's `deposit_balance`. Other tickers must already be registered.
    pub async fn ensure_fiat(pool: &PgPool, ticker: &str) -> Result<()> {
        if Self::exists(pool, ticker).await? {
            return Ok(());
        }
        if WELL_KNOWN_FIAT.contains(&ticker) {
            sqlx::query(
                "INSERT INTO instruments (ticker, name) VALUES ($1, $1) ON CONFLICT (ticker) DO NOTHING",
            )
            .bind(ticker)
            .execute(pool)
            .await?;
            Ok(())
        } else {
            Err(Error::UnknownInstrument(ticker.to_string()))
        }
    }
}
