//! Exchange REST helper: order-book snapshot fetch and listen-key
//! lifecycle. Nothing beyond what the stream session needs
//! lives here — no order placement, no account endpoints.

pub mod binance;
pub mod bybit;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::AggregatorError;

/// `GET {base}/depth?symbol={native}&limit={depth}` response, or the
/// exchange-equivalent thereof.
#[derive(Debug, Clone)]
pub struct BookSnapshot {
    pub last_update_id: u64,
    pub bids: Vec<(Decimal, Decimal)>,
    pub asks: Vec<(Decimal, Decimal)>,
}

/// An exchange-issued, opaque token scoping a private user-data
/// WebSocket subscription.
#[derive(Debug, Clone)]
pub struct ListenKey {
    pub value: String,
}

/// What the stream session needs from an exchange's REST surface.
/// Adapters that need neither snapshots nor listen keys (e.g. Bitmex,
/// which streams `partial` instead of fetching a snapshot) simply don't
/// implement this trait.
#[async_trait]
pub trait RestClient: Send + Sync {
    async fn fetch_snapshot(&self, native_symbol: &str, depth: usize) -> Result<BookSnapshot, AggregatorError>;

    /// Exchanges without a listen-key concept (Bybit, OKX) return
    /// `Ok(None)`; the default here keeps those adapters' REST clients
    /// from having to stub out the method.
    async fn create_listen_key(&self) -> Result<Option<ListenKey>, AggregatorError> {
        Ok(None)
    }

    async fn keepalive_listen_key(&self, _key: &ListenKey) -> Result<(), AggregatorError> {
        Ok(())
    }
}
