//! The `ExchangeDialect` trait: one implementation per exchange family,
//! covering endpoint, subscription/auth framing, and message parsing.
//!
//! Generalizes a prior `ExchangeAdapter` trait, whose
//! `parse_message` returned `Option<MarketMessage>`, but every adapter
//! implementation actually built and returned a `ParseResult` (`Market`
//! / `Control` / `Error`) that the trait itself never declared — a
//! majority pattern taken here as the intended shape and made
//! consistent. `ParseResult` is widened into [`ParsedFrame`] so a
//! dialect can hand back the pieces of a book snapshot/delta/action
//! without owning a `BookEngine` itself: book state belongs to the
//! stream session (one engine per session), not to the dialect, so the
//! dialect only describes what arrived on the wire.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::book::{EngineMode, OrderBookAction};
use crate::config::{Channel, Credentials};
use crate::error::AggregatorError;
use crate::schema::{
    FundingEvent, InstrumentEvent, OrderEvent, PositionEvent, Side, TickerEvent, TradeEvent,
};
use crate::symbol::{Symbol, SymbolTable};

/// Everything one parsed WebSocket frame can resolve to.
#[derive(Debug, Clone)]
pub enum ParsedFrame {
    /// Subscription ack, pong, heartbeat — nothing to emit.
    Control,
    Trade(TradeEvent),
    Ticker(TickerEvent),
    Funding(FundingEvent),
    Order(OrderEvent),
    Position(PositionEvent),
    Instrument(InstrumentEvent),
    /// A REST-shaped snapshot arriving over the stream itself (Bitmex
    /// `partial` doesn't use this; it uses `BookAction`).
    BookSnapshot {
        symbol: Symbol,
        bids: Vec<(Decimal, Decimal)>,
        asks: Vec<(Decimal, Decimal)>,
        last_update_id: u64,
    },
    /// A sequenced delta, destined for `BookEngine::apply_delta`.
    BookDelta {
        symbol: Symbol,
        first_id: u64,
        final_id: u64,
        bids: Vec<(Decimal, Decimal)>,
        asks: Vec<(Decimal, Decimal)>,
    },
    /// An order-id-indexed action, destined for
    /// `BookEngine::apply_order_action`.
    BookAction {
        symbol: Symbol,
        action: OrderBookAction,
        side: Side,
        order_id: u64,
        price: Option<Decimal>,
        size: Option<Decimal>,
    },
}

/// One exchange's wire protocol: endpoint, subscribe/auth framing, and
/// frame parsing. Stateless — any per-symbol book state lives in the
/// session's `BookEngine`, not here.
#[async_trait]
pub trait ExchangeDialect: Send + Sync {
    fn name(&self) -> &'static str;

    fn default_ws_url(&self) -> &'static str;

    fn symbol_table(&self) -> SymbolTable;

    /// Which book reconciliation strategy this exchange's book channel
    /// speaks. Exchanges with no book channel subscribed still need a
    /// mode so the session can construct a `BookEngine`; pick
    /// `Sequenced` unless the exchange is order-id-indexed (Bitmex).
    fn engine_mode(&self) -> EngineMode;

    /// Whether the session must fetch a REST snapshot before trusting
    /// deltas. False for order-id-indexed exchanges, which stream their
    /// own `partial` instead.
    fn needs_rest_snapshot(&self) -> bool {
        matches!(self.engine_mode(), EngineMode::Sequenced(_))
    }

    /// Builds the subscribe frame for one channel and its native-format
    /// symbols.
    fn build_subscribe_message(&self, channel: Channel, native_symbols: &[String]) -> Value;

    /// Builds the private-channel auth frame, if this exchange
    /// authenticates over the WebSocket itself rather than a REST
    /// listen key. `None` means no WS-level auth step (Binance: auth is
    /// baked into the listen-key URL instead).
    fn build_auth_message(&self, _creds: &Credentials) -> Option<Value> {
        None
    }

    /// Parses one raw text frame.
    fn parse_frame(&self, raw: &str) -> Result<ParsedFrame, AggregatorError>;

    /// Whether binary WebSocket frames from this exchange are
    /// raw-DEFLATE compressed (OKEx family) and must be inflated before
    /// `parse_frame` sees them as text.
    fn uses_raw_deflate(&self) -> bool {
        false
    }
}

pub(crate) fn invalid_json(exchange: &str, err: serde_json::Error) -> AggregatorError {
    AggregatorError::ProtocolDecode {
        exchange: exchange.to_string(),
        reason: format!("invalid JSON: {err}"),
    }
}
