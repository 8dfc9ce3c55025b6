//! Per-order coalescer.
//!
//! Maintains derived fields (`unhandled_amount`) outside the sink so
//! sinks that persist only the last-known order state need not
//! reconstruct fill history themselves.
//!
//! A naive port would guard this state behind one process-wide lock;
//! instead it's a [`dashmap::DashMap`] keyed by
//! `(exchange, symbol, order_id)`, since order fill coalescing is
//! independently keyed work with no cross-key contention. `DashMap`
//! internally shards its buckets and takes a short-lived per-shard lock
//! on each access, giving serial read-modify-write per key without a
//! single lock serializing unrelated orders.

use dashmap::DashMap;
use rust_decimal::Decimal;

use crate::schema::OrderEvent;

#[derive(Debug, Clone)]
struct CoalesceState {
    previous_filled: Decimal,
    unhandled_amount: Decimal,
}

type OrderKey = (String, String, String);

fn key_for(order: &OrderEvent) -> OrderKey {
    (
        order.exchange.clone(),
        order.symbol.as_str().to_string(),
        order.order_id.clone(),
    )
}

/// Stateful helper guarded by a sharded lock table keyed per
/// (exchange, symbol, order-id).
#[derive(Default)]
pub struct OrderCoalescer {
    state: DashMap<OrderKey, CoalesceState>,
}

impl OrderCoalescer {
    pub fn new() -> Self {
        Self {
            state: DashMap::new(),
        }
    }

    /// Processes one order event: computes
    /// `new_filled = current_filled - previous_filled`, accumulates it
    /// (floored at zero) into the running `unhandled_amount`, and
    /// overwrites the persisted state with the merged record.
    ///
    /// The `DashMap` entry API guarantees this read-modify-write is
    /// atomic per key even under concurrent callers for different
    /// orders.
    pub fn record(&self, order: &OrderEvent) -> Decimal {
        let key = key_for(order);
        let mut entry = self.state.entry(key).or_insert(CoalesceState {
            previous_filled: Decimal::ZERO,
            unhandled_amount: Decimal::ZERO,
        });

        let new_filled = order.filled - entry.previous_filled;
        let delta = new_filled.max(Decimal::ZERO);
        entry.unhandled_amount += delta;
        entry.previous_filled = order.filled;
        entry.unhandled_amount
    }

    pub fn unhandled_amount(&self, exchange: &str, symbol: &crate::symbol::Symbol, order_id: &str) -> Option<Decimal> {
        self.state
            .get(&(exchange.to_string(), symbol.as_str().to_string(), order_id.to_string()))
            .map(|e| e.unhandled_amount)
    }
}
