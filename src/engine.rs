//! Matching engine: walks the opposing side of the book in price-time
//! priority and generates fills for one incoming order. Invoked once per
//! placed order, after the order has been persisted with `status = NEW`,
//! inside the same transaction as reservation and order insert so that
//! counter-order fills, trade-log appends, ledger settlement, and the
//! incoming order's terminal status all commit atomically.

use sqlx::{Postgres, Transaction};

use crate::error::Result;
use crate::models::instrument::QUOTE_CURRENCY;
use crate::models::order::Direction;
use crate::models::{Balance, Order, OrderStatus, OrderType, Trade};

/// Runs the fill loop for `incoming` and settles its terminal status.
pub async fn run(tx: &mut Transaction<'_, Postgres>, incoming: Order) -> Result<()> {
    let opposing_direction = match incoming.direction {
        Direction::Buy => Direction::Sell,
        Direction::Sell => Direction::Buy,
    };
    // Bids match lowest asks first; asks match highest bids first.
    let ascending = matches!(incoming.direction, Direction::Buy);

    let limit_price = match incoming.order_type {
        OrderType::Market => None,
        OrderType::Limit => incoming.price,
    };
    let candidates =
        Order::list_resting(tx, &incoming.ticker, opposing_direction, ascending, limit_price).await?;

    let mut remaining = incoming.remaining();

    for mut resting in candidates {
        if remaining == 0 {
            break;
        }

        let resting_price = resting.price.expect("resting candidate is always a limit order");
        let m = remaining.min(resting.remaining());
        if m == 0 {
            continue;
        }

        let new_filled = resting.filled + m;
        let new_status = if new_filled == resting.qty {
            OrderStatus::Executed
        } else {
            OrderStatus::PartiallyExecuted
        };
        resting = Order::update_fill(tx, resting.id, new_filled, new_status).await?;

        settle(tx, &incoming, &resting, m, resting_price).await?;
        Trade::append(tx, &incoming.ticker, m, resting_price).await?;

        remaining -= m;
    }

    finalize_incoming(tx, &incoming, remaining).await?;
    Ok(())
}

/// Credits the buyer's ticker and the seller's USD at the trade price. Both
/// sides' reservations were already debited at order entry; this settles the
/// offsetting credit only.
async fn settle(
    tx: &mut Transaction<'_, Postgres>,
    incoming: &Order,
    resting: &Order,
    qty: i64,
    price: i64,
) -> Result<()> {
    let (buyer_id, seller_id) = match incoming.direction {
        Direction::Buy => (incoming.user_id, resting.user_id),
        Direction::Sell => (resting.user_id, incoming.user_id),
    };

    Balance::credit_in_tx(tx, buyer_id, &incoming.ticker, qty).await?;
    Balance::credit_in_tx(tx, seller_id, QUOTE_CURRENCY, qty * price).await?;

    Ok(())
}

/// Applies the terminal-state rules to the incoming order once the fill
/// loop has run out of eligible counter-orders or fully filled it.
async fn finalize_incoming(tx: &mut Transaction<'_, Postgres>, incoming: &Order, remaining: i64) -> Result<()> {
    let filled = incoming.qty - remaining;

    match incoming.order_type {
        OrderType::Limit => {
            let status = if remaining == 0 {
                OrderStatus::Executed
            } else if remaining < incoming.qty {
                OrderStatus::PartiallyExecuted
            } else {
                OrderStatus::New
            };
            Order::update_fill(tx, incoming.id, filled, status).await?;
        }
        OrderType::Market => {
            if remaining == 0 {
                Order::update_fill(tx, incoming.id, filled, OrderStatus::Executed).await?;
            } else if remaining == incoming.qty {
                // No fills at all: cancel and refund through the normal
                // cancel path (fixes the source's no-refund bug for SELL;
                // a no-reservation market BUY simply has nothing to refund).
                Order::cancel_internal(tx, incoming.id).await?;
            } else {
                Order::update_fill(tx, incoming.id, filled, OrderStatus::PartiallyExecuted).await?;
            }
        }
    }

    Ok(())
}
