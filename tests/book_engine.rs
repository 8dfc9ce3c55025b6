//! Integration coverage for the order-book engine's two reconciliation
//! modes, exercised through the public crate API rather than the
//! module-internal `#[cfg(test)]` suite in `book/engine.rs`.

use aggregator_core::book::{BookEngine, DeltaOutcome, EngineMode, OrderBookAction, SequenceRule};
use aggregator_core::error::AggregatorError;
use aggregator_core::schema::Side;
use aggregator_core::symbol::Symbol;
use rust_decimal_macros::dec;

fn btc_usdt() -> Symbol {
    Symbol::new("BTC/USDT")
}

#[test]
fn spot_engine_rejects_a_non_overlapping_delta_as_snapshot_gap() {
    let mut engine = BookEngine::new("binance", EngineMode::Sequenced(SequenceRule::Spot));
    engine
        .init_from_snapshot(&btc_usdt(), vec![(dec!(100), dec!(1))], vec![], 1000)
        .unwrap();

    let err = engine
        .apply_delta(&btc_usdt(), 1500, 1600, &[], &[])
        .unwrap_err();
    assert!(matches!(err, AggregatorError::SnapshotGap { .. }));
}

#[test]
fn futures_engine_uses_the_inclusive_lower_bound() {
    let mut engine = BookEngine::new(
        "binance_futures",
        EngineMode::Sequenced(SequenceRule::Futures),
    );
    engine
        .init_from_snapshot(&btc_usdt(), vec![], vec![], 500)
        .unwrap();

    // Futures bridges when U <= last <= u (note: last itself, not last+1).
    let outcome = engine.apply_delta(&btc_usdt(), 499, 500, &[], &[]).unwrap();
    assert_eq!(outcome, DeltaOutcome::ApplyForced);
}

#[test]
fn order_id_indexed_engine_rebuilds_full_depth_from_partial_insert_update_delete() {
    let mut engine = BookEngine::new("bitmex", EngineMode::OrderIdIndexed);

    engine
        .apply_order_action(&btc_usdt(), OrderBookAction::Partial, Side::Ask, 1, Some(dec!(101)), Some(dec!(2)))
        .unwrap();
    engine
        .apply_order_action(&btc_usdt(), OrderBookAction::Insert, Side::Ask, 2, Some(dec!(102)), Some(dec!(3)))
        .unwrap();
    engine
        .apply_order_action(&btc_usdt(), OrderBookAction::Update, Side::Ask, 1, None, Some(dec!(5)))
        .unwrap();

    let view = engine.book_view(&btc_usdt()).unwrap();
    assert_eq!(view.asks.len(), 2);
    assert!(view.asks.iter().any(|l| l.price == dec!(101) && l.size == dec!(5)));
    assert!(view.asks.iter().any(|l| l.price == dec!(102) && l.size == dec!(3)));

    engine
        .apply_order_action(&btc_usdt(), OrderBookAction::Delete, Side::Ask, 2, None, None)
        .unwrap();
    let view = engine.book_view(&btc_usdt()).unwrap();
    assert_eq!(view.asks.len(), 1);
}

#[test]
fn reset_drops_state_so_the_next_snapshot_starts_clean() {
    let mut engine = BookEngine::new("binance", EngineMode::Sequenced(SequenceRule::Spot));
    engine
        .init_from_snapshot(&btc_usdt(), vec![(dec!(100), dec!(1))], vec![], 1000)
        .unwrap();
    assert!(engine.book_view(&btc_usdt()).is_some());

    engine.reset(&btc_usdt());
    assert!(engine.book_view(&btc_usdt()).is_none());
}
