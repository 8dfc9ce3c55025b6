//! Read-only snapshot of one side-pair, handed to the router for
//! dispatch without copying the engine's live maps.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::schema::Level;

/// Cheap, cloned read of one (exchange, symbol) book, ordered per
/// Bids descending, asks ascending. Both sides are stored
/// internally as plain ascending `BTreeMap<Decimal, Decimal>`; the bid
/// side is simply reversed at view-construction time rather than paying
/// for a custom descending key type on every insert.
#[derive(Debug, Clone, Default)]
pub struct BookView {
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

impl BookView {
    pub fn from_sides(bids: &BTreeMap<Decimal, Decimal>, asks: &BTreeMap<Decimal, Decimal>) -> Self {
        Self {
            bids: bids
                .iter()
                .rev()
                .map(|(&price, &size)| Level { price, size })
                .collect(),
            asks: asks
                .iter()
                .map(|(&price, &size)| Level { price, size })
                .collect(),
        }
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// No crossed book: best bid must stay below best ask.
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid >= ask,
            _ => false,
        }
    }
}
