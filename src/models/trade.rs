use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::Result;

/// Append-only record of executed trades. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Trade {
    pub id: i64,
    pub ticker: String,
    pub amount: i64,
    pub price: i64,
    pub created_at: DateTime<Utc>,
}

impl Trade {
    pub async fn append(
        tx: &mut Transaction<'_, Postgres>,
        ticker: &str,
        amount: i64,
        price: i64,
    ) -> Result<Trade> {
        let trade = sqlx::query_as::<_, Trade>(
            "INSERT INTO transactions (ticker, amount, price) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(ticker)
        .bind(amount)
        .bind(price)
        .fetch_one(&mut **tx)
        .await?;
        Ok(trade)
    }

    pub async fn recent(pool: &PgPool, ticker: &str, limit: i64) -> Result<Vec<Trade>> {
        let rows = sqlx::query_as::<_, Trade>(
            "SELECT * FROM transactions WHERE ticker = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(ticker)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}
