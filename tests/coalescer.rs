//! Integration coverage for `OrderCoalescer`, exercised through the
//! public `router` module rather than its module-internal test suite.

use aggregator_core::router::EventRouter;
use aggregator_core::schema::{Event, OrderEvent, OrderStatus, TradeSide};
use aggregator_core::symbol::Symbol;
use chrono::Utc;
use rust_decimal_macros::dec;

fn order(order_id: &str, filled: rust_decimal::Decimal) -> OrderEvent {
    OrderEvent {
        exchange: "binance".into(),
        symbol: Symbol::new("BTC/USDT"),
        order_id: order_id.into(),
        client_order_id: None,
        timestamp: Utc::now(),
        side: TradeSide::Buy,
        status: OrderStatus::Open,
        amount: dec!(10),
        filled,
        remaining: dec!(10) - filled,
        price: Some(dec!(100)),
        average: None,
    }
}

#[tokio::test]
async fn router_emit_feeds_order_events_through_the_coalescer() {
    let router = EventRouter::new();

    router.emit(Event::Order(order("1", dec!(3)))).await;
    router.emit(Event::Order(order("1", dec!(7)))).await;

    let unhandled = router
        .unhandled_amount("binance", &Symbol::new("BTC/USDT"), "1")
        .unwrap();
    assert_eq!(unhandled, dec!(7));
}

#[tokio::test]
async fn a_filled_amount_rollback_never_reduces_unhandled_amount() {
    let router = EventRouter::new();

    router.emit(Event::Order(order("2", dec!(5)))).await;
    router.emit(Event::Order(order("2", dec!(1)))).await; // spurious rollback

    let unhandled = router
        .unhandled_amount("binance", &Symbol::new("BTC/USDT"), "2")
        .unwrap();
    assert_eq!(unhandled, dec!(5));
}
