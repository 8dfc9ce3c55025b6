//! Normalized event model.
//!
//! Replaces a keyword-dictionary callback (and a prior
//! three-variant `MarketMessage`) with one tagged `Event` enum covering
//! every canonical entity of the data model: trades, tickers, book
//! snapshots/deltas, funding, orders, and positions. Sinks dispatch on
//! the tag.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::symbol::Symbol;

/// Book side, distinct from [`TradeSide`] per the data model: order
/// books have BID/ASK, trades have BUY/SELL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

/// Trade execution side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

/// Order lifecycle status, normalized across exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Open,
    Closed,
    Canceled,
    Canceling,
    Rejected,
    Failed,
}

/// The top-level normalized event, tagged by kind for sink dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Trade(TradeEvent),
    Ticker(TickerEvent),
    BookSnapshot(BookSnapshotEvent),
    BookDelta(BookDeltaEvent),
    Funding(FundingEvent),
    Order(OrderEvent),
    Position(PositionEvent),
    Instrument(InstrumentEvent),
}

impl Event {
    /// Stable label used in logs and sink-error messages; never the
    /// serde tag string directly, so renaming the tag doesn't silently
    /// change log output.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Event::Trade(_) => "trade",
            Event::Ticker(_) => "ticker",
            Event::BookSnapshot(_) => "book_snapshot",
            Event::BookDelta(_) => "book_delta",
            Event::Funding(_) => "funding",
            Event::Order(_) => "order",
            Event::Position(_) => "position",
            Event::Instrument(_) => "instrument",
        }
    }

    pub fn exchange(&self) -> &str {
        match self {
            Event::Trade(e) => &e.exchange,
            Event::Ticker(e) => &e.exchange,
            Event::BookSnapshot(e) => &e.exchange,
            Event::BookDelta(e) => &e.exchange,
            Event::Funding(e) => &e.exchange,
            Event::Order(e) => &e.exchange,
            Event::Position(e) => &e.exchange,
            Event::Instrument(e) => &e.exchange,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        match self {
            Event::Trade(e) => &e.symbol,
            Event::Ticker(e) => &e.symbol,
            Event::BookSnapshot(e) => &e.symbol,
            Event::BookDelta(e) => &e.symbol,
            Event::Funding(e) => &e.symbol,
            Event::Order(e) => &e.symbol,
            Event::Position(e) => &e.symbol,
            Event::Instrument(e) => &e.symbol,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    pub exchange: String,
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,
    pub side: TradeSide,
    pub amount: Decimal,
    pub price: Decimal,
    pub trade_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerEvent {
    pub exchange: String,
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,
    pub best_bid: Decimal,
    pub best_ask: Decimal,
}

/// One price level, used in both snapshot and delta payloads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Level {
    pub price: Decimal,
    pub size: Decimal,
}

/// A full-book callback. Always accompanies the first `apply-forced`
/// delta outcome from the book engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSnapshotEvent {
    pub exchange: String,
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

/// An incremental book update. `forced` flags the first delta applied
/// after a snapshot bridge; recipients must discard prior state for
/// that (exchange, symbol) and treat this callback (plus any
/// accompanying snapshot) as truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookDeltaEvent {
    pub exchange: String,
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
    pub forced: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingEvent {
    pub exchange: String,
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,
    pub interval: String,
    pub rate: Decimal,
    pub rate_daily: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub exchange: String,
    pub symbol: Symbol,
    pub order_id: String,
    pub client_order_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub side: TradeSide,
    pub status: OrderStatus,
    pub amount: Decimal,
    pub filled: Decimal,
    pub remaining: Decimal,
    pub price: Option<Decimal>,
    pub average: Option<Decimal>,
}

/// Exchange-opaque dictionary of position fields. Kept as a JSON value
/// rather than a fixed struct since position schemas vary widely across
/// exchanges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionEvent {
    pub exchange: String,
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,
    pub fields: serde_json::Value,
}

/// Instrument/contract reference-data update (tick size, lot size,
/// state, ...). Kept as a JSON dictionary like `PositionEvent`, for the
/// same reason: field sets vary per exchange and this crate only
/// relays them, it doesn't interpret them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentEvent {
    pub exchange: String,
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,
    pub fields: serde_json::Value,
}
