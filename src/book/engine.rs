//! Sequence reconciliation and order-id-indexed book reconstruction.
//!
//! Two independent reconciliation strategies live side by side because
//! exchanges split along this line:
//!
//! - Most exchanges (Binance, OKX, Bybit, ...) publish a REST snapshot
//!   terminated by `lastUpdateId`, then a stream of deltas each carrying
//!   `(U, u)` = (first_id, final_id). [`SequenceRule`] picks the exact
//!   off-by-one a given exchange's spot vs futures API uses.
//! - Bitmex instead streams `partial`/`insert`/`update`/`delete`
//!   messages keyed by an opaque order id; there is no snapshot RPC and
//!   no sequence number, only the order-id -> price index described in
//!   [`OrderBookAction`].
//!
//! A `Resync` outcome is surfaced as `Err(AggregatorError::SnapshotGap)`
//! rather than a fourth `DeltaOutcome` variant: a snapshot gap is
//! session-fatal, so returning it through `Result` lets the session use
//! `?` instead of matching a variant it would immediately convert to an
//! error anyway.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;

use crate::error::AggregatorError;
use crate::schema::Side;
use crate::symbol::Symbol;

use super::view::BookView;

/// Which off-by-one rule governs sequence overlap for a given adapter.
/// See DESIGN.md's Open Question entry for the reasoning: this
/// is reproduced faithfully per exchange, not "fixed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceRule {
    /// `u <= last` => skip; `U <= last+1 <= u` => forced.
    /// Grounded on `cryptofeed/exchange/binance.py::_check_update_id`.
    Spot,
    /// `u < last` => skip; `U <= last <= u` => forced.
    /// Grounded on
    /// `cryptofeed/exchange/binance_futures.py::_check_update_id`.
    Futures,
}

/// The reconciliation protocol this engine instance speaks. Fixed for
/// the engine's lifetime: one engine belongs to one session, which
/// belongs to one exchange adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    Sequenced(SequenceRule),
    OrderIdIndexed,
}

/// Result of applying one delta in sequenced mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOutcome {
    /// Already covered by the snapshot; the delta is discarded.
    Skip,
    /// Applied normally; no reset semantics for the recipient.
    Apply,
    /// The one delta per snapshot generation that bridges the gap
    /// between the REST snapshot and the stream. The recipient should
    /// treat this (and any accompanying snapshot) as the new source of
    /// truth; every later delta against the same snapshot returns
    /// `Apply` instead.
    ApplyForced,
}

/// Tracks, per symbol, where a sequenced engine is relative to its last
/// REST snapshot. `Bridging` -> `Streaming` is a one-way transition per
/// snapshot generation: it's what makes `ApplyForced` fire exactly once.
#[derive(Debug, Clone, Copy)]
enum SequenceProgress {
    /// No snapshot recorded yet; every delta is treated as forced until
    /// one arrives, matching a freshly (re)connected session.
    AwaitingSnapshot,
    /// Snapshot loaded at `last`, stream not yet bridged to it.
    Bridging { last: u64 },
    /// Already bridged; `last` now tracks the most recent applied
    /// delta's `final_id` purely for skip/gap detection.
    Streaming { last: u64 },
}

/// Bitmex-style book actions, keyed by order id rather than sequence
/// number. Grounded on `cryptofeed/exchange/bitmex.py::_book`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBookAction {
    Partial,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone)]
struct SequencedState {
    progress: SequenceProgress,
    bids: BTreeMap<Decimal, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
}

#[derive(Debug, Clone, Default)]
struct OrderIndexedState {
    partial_received: bool,
    bids: BTreeMap<Decimal, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
    /// order_id -> (side, price), so `update`/`delete` can dereference
    /// the resting order's price without it being retransmitted.
    order_index: HashMap<u64, (Side, Decimal)>,
}

#[derive(Debug, Clone)]
enum SymbolState {
    Sequenced(SequencedState),
    OrderIndexed(OrderIndexedState),
}

/// Per-(exchange, symbol) order-book reconstruction state, owned
/// exclusively by one stream session.
pub struct BookEngine {
    exchange: String,
    mode: EngineMode,
    symbols: HashMap<Symbol, SymbolState>,
}

impl BookEngine {
    pub fn new(exchange: impl Into<String>, mode: EngineMode) -> Self {
        Self {
            exchange: exchange.into(),
            mode,
            symbols: HashMap::new(),
        }
    }

    fn new_symbol_state(&self) -> SymbolState {
        match self.mode {
            EngineMode::Sequenced(_) => SymbolState::Sequenced(SequencedState {
                progress: SequenceProgress::AwaitingSnapshot,
                bids: BTreeMap::new(),
                asks: BTreeMap::new(),
            }),
            EngineMode::OrderIdIndexed => SymbolState::OrderIndexed(OrderIndexedState::default()),
        }
    }

    /// Replaces state for `symbol` with a REST snapshot and records its
    /// terminal sequence id. Only valid in `Sequenced` mode.
    pub fn init_from_snapshot(
        &mut self,
        symbol: &Symbol,
        bids: Vec<(Decimal, Decimal)>,
        asks: Vec<(Decimal, Decimal)>,
        last_update_id: u64,
    ) -> Result<(), AggregatorError> {
        let EngineMode::Sequenced(_) = self.mode else {
            return Err(AggregatorError::FatalConfig(format!(
                "{}: init_from_snapshot called on an order-id-indexed engine",
                self.exchange
            )));
        };

        let mut bid_map = BTreeMap::new();
        for (price, size) in bids {
            upsert_level(&mut bid_map, price, size);
        }
        let mut ask_map = BTreeMap::new();
        for (price, size) in asks {
            upsert_level(&mut ask_map, price, size);
        }

        self.symbols.insert(
            symbol.clone(),
            SymbolState::Sequenced(SequencedState {
                progress: SequenceProgress::Bridging { last: last_update_id },
                bids: bid_map,
                asks: ask_map,
            }),
        );
        Ok(())
    }

    /// Applies a delta carrying `(first_id, final_id)` against the
    /// recorded snapshot sequence.
    pub fn apply_delta(
        &mut self,
        symbol: &Symbol,
        first_id: u64,
        final_id: u64,
        bids_delta: &[(Decimal, Decimal)],
        asks_delta: &[(Decimal, Decimal)],
    ) -> Result<DeltaOutcome, AggregatorError> {
        let rule = match self.mode {
            EngineMode::Sequenced(rule) => rule,
            EngineMode::OrderIdIndexed => {
                return Err(AggregatorError::FatalConfig(format!(
                    "{}: apply_delta called on an order-id-indexed engine",
                    self.exchange
                )))
            }
        };

        let state = self
            .symbols
            .entry(symbol.clone())
            .or_insert_with(|| SymbolState::Sequenced(SequencedState {
                progress: SequenceProgress::AwaitingSnapshot,
                bids: BTreeMap::new(),
                asks: BTreeMap::new(),
            }));

        let SymbolState::Sequenced(state) = state else {
            unreachable!("mode is Sequenced, entry must be Sequenced")
        };

        let outcome = match state.progress {
            SequenceProgress::AwaitingSnapshot => {
                // No snapshot recorded yet for this symbol: treat every
                // delta as forced until a snapshot arrives, matching a
                // freshly (re)connected session with no prior sequence.
                DeltaOutcome::ApplyForced
            }
            SequenceProgress::Bridging { last } => {
                let skip = match rule {
                    SequenceRule::Spot => final_id <= last,
                    SequenceRule::Futures => final_id < last,
                };
                if skip {
                    return Ok(DeltaOutcome::Skip);
                }

                let bridges = match rule {
                    SequenceRule::Spot => first_id <= last + 1 && last + 1 <= final_id,
                    SequenceRule::Futures => first_id <= last && last <= final_id,
                };

                if bridges {
                    state.progress = SequenceProgress::Streaming { last: final_id };
                    DeltaOutcome::ApplyForced
                } else {
                    return Err(AggregatorError::SnapshotGap {
                        exchange: self.exchange.clone(),
                        symbol: symbol.to_string(),
                        first_id,
                        final_id,
                        last_update_id: last,
                    });
                }
            }
            SequenceProgress::Streaming { last } => {
                let skip = match rule {
                    SequenceRule::Spot => final_id <= last,
                    SequenceRule::Futures => final_id < last,
                };
                if skip {
                    return Ok(DeltaOutcome::Skip);
                }

                let continuous = match rule {
                    SequenceRule::Spot => first_id <= last + 1 && last + 1 <= final_id,
                    SequenceRule::Futures => first_id <= last && last <= final_id,
                };

                if continuous {
                    state.progress = SequenceProgress::Streaming { last: final_id };
                    DeltaOutcome::Apply
                } else {
                    return Err(AggregatorError::SnapshotGap {
                        exchange: self.exchange.clone(),
                        symbol: symbol.to_string(),
                        first_id,
                        final_id,
                        last_update_id: last,
                    });
                }
            }
        };

        for &(price, size) in bids_delta {
            upsert_level(&mut state.bids, price, size);
        }
        for &(price, size) in asks_delta {
            upsert_level(&mut state.asks, price, size);
        }

        Ok(outcome)
    }

    /// Applies one Bitmex-style order-id-indexed action. Messages
    /// arriving before the first `partial` are discarded.
    pub fn apply_order_action(
        &mut self,
        symbol: &Symbol,
        action: OrderBookAction,
        side: Side,
        order_id: u64,
        price: Option<Decimal>,
        size: Option<Decimal>,
    ) -> Result<(), AggregatorError> {
        if self.mode != EngineMode::OrderIdIndexed {
            return Err(AggregatorError::FatalConfig(format!(
                "{}: apply_order_action called on a sequenced engine",
                self.exchange
            )));
        }

        let state = self
            .symbols
            .entry(symbol.clone())
            .or_insert_with(|| self.new_symbol_state());
        let SymbolState::OrderIndexed(state) = state else {
            unreachable!("mode is OrderIdIndexed, entry must be OrderIndexed")
        };

        if !state.partial_received && action != OrderBookAction::Partial {
            return Ok(());
        }

        let side_map = |state: &mut OrderIndexedState| match side {
            Side::Bid => &mut state.bids,
            Side::Ask => &mut state.asks,
        };

        match action {
            OrderBookAction::Partial => {
                state.partial_received = true;
                let price = price.ok_or_else(|| missing_field(&self.exchange, "price"))?;
                let size = size.ok_or_else(|| missing_field(&self.exchange, "size"))?;
                state.order_index.insert(order_id, (side, price));
                upsert_level(side_map(state), price, size);
            }
            OrderBookAction::Insert => {
                let price = price.ok_or_else(|| missing_field(&self.exchange, "price"))?;
                let size = size.ok_or_else(|| missing_field(&self.exchange, "size"))?;
                state.order_index.insert(order_id, (side, price));
                upsert_level(side_map(state), price, size);
            }
            OrderBookAction::Update => {
                let size = size.ok_or_else(|| missing_field(&self.exchange, "size"))?;
                let Some(&(_, price)) = state.order_index.get(&order_id) else {
                    return Ok(()); // unknown order id: nothing to update
                };
                upsert_level(side_map(state), price, size);
            }
            OrderBookAction::Delete => {
                if let Some((_, price)) = state.order_index.remove(&order_id) {
                    side_map(state).remove(&price);
                }
            }
        }

        Ok(())
    }

    /// Cheap read of the ordered sides for dispatch.
    pub fn book_view(&self, symbol: &Symbol) -> Option<BookView> {
        match self.symbols.get(symbol)? {
            SymbolState::Sequenced(s) => Some(BookView::from_sides(&s.bids, &s.asks)),
            SymbolState::OrderIndexed(s) => Some(BookView::from_sides(&s.bids, &s.asks)),
        }
    }

    /// Drops all state for `symbol`, used on session reconnect before
    /// re-subscribing on the next connect.
    pub fn reset(&mut self, symbol: &Symbol) {
        self.symbols.remove(symbol);
    }
}

fn missing_field(exchange: &str, field: &'static str) -> AggregatorError {
    AggregatorError::ProtocolDecode {
        exchange: exchange.to_string(),
        reason: format!("order-book action missing required field `{field}`"),
    }
}

/// Size-zero updates always remove a level; nonzero always upserts.
fn upsert_level(side: &mut BTreeMap<Decimal, Decimal>, price: Decimal, size: Decimal) {
    if size.is_zero() {
        side.remove(&price);
    } else {
        side.insert(price, size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sym() -> Symbol {
        Symbol::new("BTC/USDT")
    }

    /// Spot snapshot+delta bridge.
    #[test]
    fn spot_snapshot_delta_bridge() {
        let mut engine = BookEngine::new("binance", EngineMode::Sequenced(SequenceRule::Spot));
        engine
            .init_from_snapshot(&sym(), vec![(dec!(10), dec!(1))], vec![], 100)
            .unwrap();

        // Delta A: U=95, u=99 -> skip
        let outcome = engine.apply_delta(&sym(), 95, 99, &[], &[]).unwrap();
        assert_eq!(outcome, DeltaOutcome::Skip);

        // Delta B: U=100, u=101 -> apply-forced
        let outcome = engine.apply_delta(&sym(), 100, 101, &[], &[]).unwrap();
        assert_eq!(outcome, DeltaOutcome::ApplyForced);

        // Delta C: U=102, u=103, bids [[10,0],[9,2]] -> apply
        let outcome = engine
            .apply_delta(
                &sym(),
                102,
                103,
                &[(dec!(10), dec!(0)), (dec!(9), dec!(2))],
                &[],
            )
            .unwrap();
        assert_eq!(outcome, DeltaOutcome::Apply);

        let view = engine.book_view(&sym()).unwrap();
        assert_eq!(view.bids.len(), 1);
        assert_eq!(view.bids[0].price, dec!(9));
        assert_eq!(view.bids[0].size, dec!(2));
    }

    /// Futures snapshot+delta bridge, note the
    /// `<=` on `last_update_id` itself.
    #[test]
    fn futures_snapshot_delta_bridge() {
        let mut engine =
            BookEngine::new("binance_futures", EngineMode::Sequenced(SequenceRule::Futures));
        engine
            .init_from_snapshot(&sym(), vec![(dec!(10), dec!(1))], vec![], 100)
            .unwrap();

        let outcome = engine.apply_delta(&sym(), 99, 100, &[], &[]).unwrap();
        assert_eq!(outcome, DeltaOutcome::ApplyForced);
    }

    /// A gap raises snapshot-gap.
    #[test]
    fn gap_raises_snapshot_gap() {
        let mut engine = BookEngine::new("binance", EngineMode::Sequenced(SequenceRule::Spot));
        engine.init_from_snapshot(&sym(), vec![], vec![], 100).unwrap();

        let err = engine.apply_delta(&sym(), 105, 110, &[], &[]).unwrap_err();
        assert!(matches!(err, AggregatorError::SnapshotGap { .. }));
    }

    /// Bitmex order-id book.
    #[test]
    fn bitmex_order_id_book() {
        let mut engine = BookEngine::new("bitmex", EngineMode::OrderIdIndexed);

        engine
            .apply_order_action(&sym(), OrderBookAction::Partial, Side::Bid, 1, Some(dec!(10)), Some(dec!(5)))
            .unwrap();
        let view = engine.book_view(&sym()).unwrap();
        assert_eq!(view.bids[0].price, dec!(10));
        assert_eq!(view.bids[0].size, dec!(5));

        engine
            .apply_order_action(&sym(), OrderBookAction::Update, Side::Bid, 1, None, Some(dec!(3)))
            .unwrap();
        let view = engine.book_view(&sym()).unwrap();
        assert_eq!(view.bids[0].size, dec!(3));

        engine
            .apply_order_action(&sym(), OrderBookAction::Delete, Side::Bid, 1, None, None)
            .unwrap();
        let view = engine.book_view(&sym()).unwrap();
        assert!(view.bids.is_empty());
    }

    /// Bitmex: messages before the first `partial` are discarded.
    #[test]
    fn bitmex_discards_messages_before_partial() {
        let mut engine = BookEngine::new("bitmex", EngineMode::OrderIdIndexed);
        engine
            .apply_order_action(&sym(), OrderBookAction::Insert, Side::Bid, 1, Some(dec!(10)), Some(dec!(5)))
            .unwrap();
        assert!(engine.book_view(&sym()).unwrap().bids.is_empty());
    }

    /// Every price in the book has size > 0.
    #[test]
    fn size_zero_delta_removes_level() {
        let mut engine = BookEngine::new("binance", EngineMode::Sequenced(SequenceRule::Spot));
        engine
            .init_from_snapshot(&sym(), vec![(dec!(10), dec!(1))], vec![], 100)
            .unwrap();
        engine.apply_delta(&sym(), 100, 101, &[], &[]).unwrap();
        engine
            .apply_delta(&sym(), 102, 103, &[(dec!(10), dec!(0))], &[])
            .unwrap();
        assert!(engine.book_view(&sym()).unwrap().bids.is_empty());
    }

    /// Round-trip property: applying the same size-zero
    /// delete twice leaves the book unchanged.
    #[test]
    fn duplicate_delete_is_idempotent() {
        let mut engine = BookEngine::new("binance", EngineMode::Sequenced(SequenceRule::Spot));
        engine
            .init_from_snapshot(&sym(), vec![(dec!(10), dec!(1))], vec![], 100)
            .unwrap();
        engine.apply_delta(&sym(), 100, 101, &[], &[]).unwrap();
        engine
            .apply_delta(&sym(), 102, 103, &[(dec!(10), dec!(0))], &[])
            .unwrap();
        let before = engine.book_view(&sym()).unwrap().bids.len();
        engine
            .apply_delta(&sym(), 104, 105, &[(dec!(10), dec!(0))], &[])
            .unwrap();
        let after = engine.book_view(&sym()).unwrap().bids.len();
        assert_eq!(before, after);
    }

    /// Applying deltas in sequence equals
    /// applying the same total delta set in one pass.
    #[test]
    fn sequential_deltas_equal_one_pass() {
        let mut incremental =
            BookEngine::new("binance", EngineMode::Sequenced(SequenceRule::Spot));
        incremental
            .init_from_snapshot(&sym(), vec![(dec!(10), dec!(1))], vec![], 100)
            .unwrap();
        incremental.apply_delta(&sym(), 100, 101, &[], &[]).unwrap();
        incremental
            .apply_delta(
                &sym(),
                102,
                103,
                &[(dec!(10), dec!(0)), (dec!(9), dec!(2))],
                &[],
            )
            .unwrap();
        incremental
            .apply_delta(&sym(), 104, 104, &[(dec!(8), dec!(4))], &[])
            .unwrap();

        let mut one_pass = BookEngine::new("binance", EngineMode::Sequenced(SequenceRule::Spot));
        one_pass
            .init_from_snapshot(&sym(), vec![(dec!(10), dec!(1))], vec![], 100)
            .unwrap();
        one_pass
            .apply_delta(
                &sym(),
                100,
                104,
                &[
                    (dec!(10), dec!(0)),
                    (dec!(9), dec!(2)),
                    (dec!(8), dec!(4)),
                ],
                &[],
            )
            .unwrap();

        let a = incremental.book_view(&sym()).unwrap();
        let b = one_pass.book_view(&sym()).unwrap();
        assert_eq!(
            a.bids.iter().map(|l| (l.price, l.size)).collect::<Vec<_>>(),
            b.bids.iter().map(|l| (l.price, l.size)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn reset_clears_symbol_state() {
        let mut engine = BookEngine::new("binance", EngineMode::Sequenced(SequenceRule::Spot));
        engine
            .init_from_snapshot(&sym(), vec![(dec!(10), dec!(1))], vec![], 100)
            .unwrap();
        engine.reset(&sym());
        assert!(engine.book_view(&sym()).is_none());
    }
}
