//! Integration coverage for canonical/native symbol round-trips across
//! the two native conventions, exercised through the public crate API.

use aggregator_core::symbol::{Symbol, SymbolRegistry, SymbolTable};

#[test]
fn registry_dispatches_to_the_table_registered_per_exchange() {
    let mut registry = SymbolRegistry::new();
    registry.register("binance", SymbolTable::concatenated());
    registry.register("okx", SymbolTable::separated('-'));

    let btc_usdt = Symbol::new("BTC/USDT");

    let binance_table = registry.table("binance").unwrap();
    assert_eq!(binance_table.to_native(&btc_usdt), "BTCUSDT");

    let okx_table = registry.table("okx").unwrap();
    assert_eq!(okx_table.to_native(&btc_usdt), "BTC-USDT");

    assert!(registry.table("bitmex").is_none());
}

#[test]
fn concatenated_table_round_trips_every_known_quote_suffix() {
    let t = SymbolTable::concatenated();
    for (native, canonical) in [
        ("ETHBTC", "ETH/BTC"),
        ("SOLUSDC", "SOL/USDC"),
        ("BNBBUSD", "BNB/BUSD"),
        ("XRPUSD", "XRP/USD"),
    ] {
        let sym = t.from_native(native);
        assert_eq!(sym.as_str(), canonical);
        assert_eq!(t.to_native(&sym), native);
    }
}

#[test]
fn concatenated_table_falls_back_to_opaque_passthrough_on_unknown_quote() {
    let t = SymbolTable::concatenated();
    let sym = t.from_native("XBTUSD"); // Bitmex-style, no clean base/quote split
    assert_eq!(sym.as_str(), "XBTUSD");
}
