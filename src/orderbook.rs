//! Order-Book View: aggregates resting limit orders into L2 price levels
//! on demand. A read-only projection over live orders, not a stored entity.

use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::PgPool;

use crate::error::Result;
use crate::models::order::Direction;
use crate::models::Order;

#[derive(Debug, Clone, Serialize)]
pub struct Level {
    pub price: i64,
    pub qty: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct L2OrderBook {
    pub bid_levels: Vec<Level>,
    pub ask_levels: Vec<Level>,
}

pub async fn view(pool: &PgPool, ticker: &str, depth_limit: usize) -> Result<L2OrderBook> {
    let live = Order::list_live_limits(pool, ticker).await?;

    let mut bids: BTreeMap<i64, i64> = BTreeMap::new();
    let mut asks: BTreeMap<i64, i64> = BTreeMap::new();

    for order in &live {
        let price = order.price.expect("live limit order always has a price");
        let remaining = order.remaining();
        if remaining == 0 {
            continue;
        }
        let book = match order.direction {
            Direction::Buy => &mut bids,
            Direction::Sell => &mut asks,
        };
        *book.entry(price).or_insert(0) += remaining;
    }

    let bid_levels = bids
        .into_iter()
        .rev() // price descending
        .take(depth_limit)
        .map(|(price, qty)| Level { price, qty })
        .collect();

    let ask_levels = asks
        .into_iter() // price ascending
        .take(depth_limit)
        .map(|(price, qty)| Level { price, qty })
        .collect();

    Ok(L2OrderBook { bid_levels, ask_levels })
}
