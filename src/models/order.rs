use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::instrument::{Instrument, QUOTE_CURRENCY};
use crate::models::Balance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit,
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyExecuted,
    Executed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::PartiallyExecuted)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ticker: String,
    pub direction: Direction,
    pub order_type: OrderType,
    /// Present for limit orders, absent for market orders.
    pub price: Option<i64>,
    pub qty: i64,
    pub filled: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitOrderBody {
    pub direction: Direction,
    pub ticker: String,
    pub qty: i64,
    pub price: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketOrderBody {
    pub direction: Direction,
    pub ticker: String,
    pub qty: i64,
}

/// Discriminated by the presence of `price` in the request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PlaceOrderBody {
    Limit(LimitOrderBody),
    Market(MarketOrderBody),
}

impl Order {
    pub fn remaining(&self) -> i64 {
        self.qty - self.filled
    }

    /// The asset a reservation for this order is denominated in: `USD` for a
    /// BUY (the quote side), the instrument ticker for a SELL.
    pub fn reservation_asset(&self) -> &str {
        match self.direction {
            Direction::Buy => QUOTE_CURRENCY,
            Direction::Sell => &self.ticker,
        }
    }

    /// Outstanding reservation as a pure function of (body, filled, status).
    /// Market BUY orders never reserve (mirrored source hazard, see
    /// DESIGN.md). A non-live order has nothing outstanding.
    pub fn outstanding_reservation(&self) -> i64 {
        if !self.status.is_live() {
            return 0;
        }
        match (self.order_type, self.direction) {
            (OrderType::Market, Direction::Buy) => 0,
            (_, Direction::Buy) => {
                let price = self.price.expect("BUY limit order without price");
                self.remaining() * price
            }
            (_, Direction::Sell) => self.remaining(),
        }
    }

    fn validate_body(body: &PlaceOrderBody) -> Result<()> {
        let (ticker, qty, price) = match body {
            PlaceOrderBody::Limit(b) => (&b.ticker, b.qty, Some(b.price)),
            PlaceOrderBody::Market(b) => (&b.ticker, b.qty, None),
        };
        let len = ticker.len();
        if !(2..=10).contains(&len) || !ticker.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(Error::Validation("ticker must be 2-10 uppercase letters".into()));
        }
        if qty <= 0 {
            return Err(Error::Validation("qty must be positive".into()));
        }
        if let Some(p) = price {
            if p <= 0 {
                return Err(Error::Validation("price must be positive".into()));
            }
        }
        Ok(())
    }

    async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        body: &PlaceOrderBody,
    ) -> Result<Self> {
        let (ticker, direction, order_type, price, qty) = match body {
            PlaceOrderBody::Limit(b) => (&b.ticker, b.direction, OrderType::Limit, Some(b.price), b.qty),
            PlaceOrderBody::Market(b) => (&b.ticker, b.direction, OrderType::Market, None, b.qty),
        };

        let order = sqlx::query_as::<_, Self>(
            "INSERT INTO orders (user_id, ticker, direction, order_type, price, qty, filled, status)
             VALUES ($1, $2, $3, $4, $5, $6, 0, 'NEW')
             RETURNING *",
        )
        .bind(user_id)
        .bind(ticker)
        .bind(direction)
        .bind(order_type)
        .bind(price)
        .bind(qty)
        .fetch_one(&mut **tx)
        .await?;

        Ok(order)
    }

    /// `place(user, body)`: validates the ticker, reserves funds, persists
    /// the order as `NEW`, then runs the matching engine — all inside one
    /// transaction so that reservation, order insert, counter-order fills,
    /// trade records, and settlement either all commit or none do.
    pub async fn place(pool: &PgPool, user_id: Uuid, body: PlaceOrderBody) -> Result<Uuid> {
        Self::validate_body(&body)?;

        let ticker = match &body {
            PlaceOrderBody::Limit(b) => b.ticker.clone(),
            PlaceOrderBody::Market(b) => b.ticker.clone(),
        };
        Instrument::require_exists(pool, &ticker).await?;

        let mut tx = pool.begin().await?;

        let order = Self::insert(&mut tx, user_id, &body).await?;
        let reservation = order.outstanding_reservation();
        if reservation > 0 {
            Balance::debit_in_tx(&mut tx, user_id, order.reservation_asset(), reservation).await?;
        }

        let order_id = order.id;
        crate::engine::run(&mut tx, order).await?;

        tx.commit().await?;
        Ok(order_id)
    }

    /// `cancel(order_id, user_id)`: refunds the unfilled reservation for
    /// live limit orders and marks the order `CANCELLED`. Market orders
    /// never rest and so are never externally cancellable.
    pub async fn cancel(pool: &PgPool, user_id: Uuid, order_id: Uuid) -> Result<Order> {
        let mut tx = pool.begin().await?;

        let order = sqlx::query_as::<_, Self>(
            "SELECT * FROM orders WHERE id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(Error::NotFound)?;

        // Market orders never rest (spec.md §4.6); a market order left live
        // by the engine's partial-fill bookkeeping is not externally
        // cancellable, only resolved internally.
        if order.order_type != OrderType::Limit {
            return Err(Error::NotFound);
        }
        if !order.status.is_live() {
            return Err(Error::NotFound);
        }

        let refund = order.outstanding_reservation();
        if refund > 0 {
            Balance::credit_in_tx(&mut tx, user_id, order.reservation_asset(), refund).await?;
        }

        let updated = Self::set_status(&mut tx, order_id, OrderStatus::Cancelled).await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Same refund-then-cancel path as `cancel`, invoked by the matching
    /// engine for a market order that leaves an unfilled remainder, or by
    /// cascading deletion, without the owner check a user-facing cancel
    /// needs.
    pub async fn cancel_internal(tx: &mut Transaction<'_, Postgres>, order_id: Uuid) -> Result<Order> {
        let order = sqlx::query_as::<_, Self>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_one(&mut **tx)
            .await?;

        let refund = order.outstanding_reservation();
        if refund > 0 {
            Balance::credit_in_tx(tx, order.user_id, order.reservation_asset(), refund).await?;
        }

        Self::set_status(tx, order_id, OrderStatus::Cancelled).await
    }

    pub async fn get(pool: &PgPool, user_id: Uuid, order_id: Uuid) -> Result<Order> {
        sqlx::query_as::<_, Self>("SELECT * FROM orders WHERE id = $1 AND user_id = $2")
            .bind(order_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?
            .ok_or(Error::NotFound)
    }

    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, Self>(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// Live limit orders for `ticker`, in price-time priority for the given
    /// `direction` — candidates for an incoming order on the opposing side.
    /// `direction` here is the resting side's own direction. `limit_price`
    /// restricts to prices an incoming limit order may legally cross at
    /// (`None` for a market order, which crosses at any price).
    pub async fn list_resting(
        tx: &mut Transaction<'_, Postgres>,
        ticker: &str,
        direction: Direction,
        ascending: bool,
        limit_price: Option<i64>,
    ) -> Result<Vec<Order>> {
        let rows = match (ascending, limit_price) {
            (true, Some(limit)) => {
                sqlx::query_as::<_, Self>(
                    "SELECT * FROM orders
                     WHERE ticker = $1 AND direction = $2 AND status IN ('NEW', 'PARTIALLY_EXECUTED')
                           AND price IS NOT NULL AND price <= $3
                     ORDER BY price ASC, created_at ASC, id ASC
                     FOR UPDATE",
                )
                .bind(ticker)
                .bind(direction)
                .bind(limit)
                .fetch_all(&mut **tx)
                .await?
            }
            (true, None) => {
                sqlx::query_as::<_, Self>(
                    "SELECT * FROM orders
                     WHERE ticker = $1 AND direction = $2 AND status IN ('NEW', 'PARTIALLY_EXECUTED')
                           AND price IS NOT NULL
                     ORDER BY price ASC, created_at ASC, id ASC
                     FOR UPDATE",
                )
                .bind(ticker)
                .bind(direction)
                .fetch_all(&mut **tx)
                .await?
            }
            (false, Some(limit)) => {
                sqlx::query_as::<_, Self>(
                    "SELECT * FROM orders
                     WHERE ticker = $1 AND direction = $2 AND status IN ('NEW', 'PARTIALLY_EXECUTED')
                           AND price IS NOT NULL AND price >= $3
                     ORDER BY price DESC, created_at ASC, id ASC
                     FOR UPDATE",
                )
                .bind(ticker)
                .bind(direction)
                .bind(limit)
                .fetch_all(&mut **tx)
                .await?
            }
            (false, None) => {
                sqlx::query_as::<_, Self>(
                    "SELECT * FROM orders
                     WHERE ticker = $1 AND direction = $2 AND status IN ('NEW', 'PARTIALLY_EXECUTED')
                           AND price IS NOT NULL
                     ORDER BY price DESC, created_at ASC, id ASC
                     FOR UPDATE",
                )
                .bind(ticker)
                .bind(direction)
                .fetch_all(&mut **tx)
                .await?
            }
        };
        Ok(rows)
    }

    /// All live limit orders for a ticker, for the order-book view. No
    /// locking beyond the backing read transaction's snapshot consistency.
    pub async fn list_live_limits(pool: &PgPool, ticker: &str) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, Self>(
            "SELECT * FROM orders
             WHERE ticker = $1 AND status IN ('NEW', 'PARTIALLY_EXECUTED') AND price IS NOT NULL
             ORDER BY price ASC",
        )
        .bind(ticker)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    pub async fn update_fill(
        tx: &mut Transaction<'_, Postgres>,
        order_id: Uuid,
        new_filled: i64,
        new_status: OrderStatus,
    ) -> Result<Order> {
        let updated = sqlx::query_as::<_, Self>(
            "UPDATE orders SET filled = $2, status = $3 WHERE id = $1 RETURNING *",
        )
        .bind(order_id)
        .bind(new_filled)
        .bind(new_status)
        .fetch_one(&mut **tx)
        .await?;
        Ok(updated)
    }

    pub async fn set_status(
        tx: &mut Transaction<'_, Postgres>,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<Order> {
        let updated = sqlx::query_as::<_, Self>(
            "UPDATE orders SET status = $2 WHERE id = $1 RETURNING *",
        )
        .bind(order_id)
        .bind(status)
        .fetch_one(&mut **tx)
        .await?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn order(
        direction: Direction,
        order_type: OrderType,
        price: Option<i64>,
        qty: i64,
        filled: i64,
        status: OrderStatus,
    ) -> Order {
        Order {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            ticker: "AAPL".into(),
            direction,
            order_type,
            price,
            qty,
            filled,
            status,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn limit_buy_reserves_price_times_remaining() {
        let o = order(Direction::Buy, OrderType::Limit, Some(160), 10, 0, OrderStatus::New);
        assert_eq!(o.outstanding_reservation(), 1600);
        assert_eq!(o.reservation_asset(), "USD");
    }

    #[test]
    fn limit_sell_reserves_remaining_qty() {
        let o = order(Direction::Sell, OrderType::Limit, Some(160), 10, 4, OrderStatus::PartiallyExecuted);
        assert_eq!(o.outstanding_reservation(), 6);
        assert_eq!(o.reservation_asset(), "AAPL");
    }

    #[test]
    fn market_buy_reserves_nothing() {
        let o = order(Direction::Buy, OrderType::Market, None, 10, 0, OrderStatus::New);
        assert_eq!(o.outstanding_reservation(), 0);
    }

    #[test]
    fn market_sell_reserves_full_qty() {
        let o = order(Direction::Sell, OrderType::Market, None, 10, 0, OrderStatus::New);
        assert_eq!(o.outstanding_reservation(), 10);
    }

    #[test]
    fn cancelled_order_has_no_outstanding_reservation() {
        let o = order(Direction::Buy, OrderType::Limit, Some(160), 10, 3, OrderStatus::Cancelled);
        assert_eq!(o.outstanding_reservation(), 0);
    }

    #[test]
    fn executed_limit_order_has_no_outstanding_reservation() {
        let o = order(Direction::Sell, OrderType::Limit, Some(160), 10, 10, OrderStatus::Executed);
        assert_eq!(o.outstanding_reservation(), 0);
    }
}
