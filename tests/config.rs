//! Integration coverage for `config.json` deserialization and
//! subscription-shape resolution, exercised through the public crate API.

use aggregator_core::config::{Channel, Config, SubscriptionConfig};

fn sample_config() -> &'static str {
    r#"{
        "master": {
            "url": "wss://master.example/stream",
            "connections": 2,
            "key": "demo-key"
        },
        "exchanges": [
            {
                "name": "binance",
                "enabled": true,
                "channels": ["trades", "l2_book"],
                "symbols": ["BTC/USDT", "ETH/USDT"],
                "endpoint_override": null,
                "book_depth": 50,
                "idle_timeout_secs": 30,
                "backoff": { "initial_ms": 250, "max_ms": 10000, "multiplier": 2.0 }
            },
            {
                "name": "bitmex",
                "enabled": true,
                "subscriptions": {
                    "orders": ["XBTUSD"],
                    "funding": ["XBTUSD"]
                },
                "endpoint_override": null
            },
            {
                "name": "okx",
                "enabled": false,
                "channels": ["ticker"],
                "symbols": ["BTC-USDT"],
                "endpoint_override": "wss://override.example/v5"
            }
        ]
    }"#
}

#[test]
fn config_deserializes_master_and_all_exchange_entries() {
    let config: Config = serde_json::from_str(sample_config()).unwrap();
    assert_eq!(config.master.connections, 2);
    assert_eq!(config.exchanges.len(), 3);
    assert_eq!(config.exchanges[0].name, "binance");
    assert!(config.exchanges[2].endpoint_override.is_some());
}

#[test]
fn disabled_exchanges_are_preserved_but_distinguishable() {
    let config: Config = serde_json::from_str(sample_config()).unwrap();
    let enabled: Vec<&str> = config
        .exchanges
        .iter()
        .filter(|e| e.enabled)
        .map(|e| e.name.as_str())
        .collect();
    assert_eq!(enabled, vec!["binance", "bitmex"]);
}

#[test]
fn cartesian_product_entry_resolves_to_channel_symbol_pairs() {
    let config: Config = serde_json::from_str(sample_config()).unwrap();
    let binance = &config.exchanges[0];
    let resolved = SubscriptionConfig::resolve(binance).unwrap();
    let pairs = resolved.pairs();
    assert_eq!(pairs.len(), 2);
    assert!(pairs
        .iter()
        .any(|(c, syms)| *c == Channel::Trades && syms.len() == 2));
    assert!(pairs
        .iter()
        .any(|(c, syms)| *c == Channel::L2Book && syms.len() == 2));
}

#[test]
fn explicit_map_entry_resolves_without_a_cartesian_product() {
    let config: Config = serde_json::from_str(sample_config()).unwrap();
    let bitmex = &config.exchanges[1];
    let resolved = SubscriptionConfig::resolve(bitmex).unwrap();
    let pairs = resolved.pairs();
    assert_eq!(pairs.len(), 2);
    assert!(pairs.iter().all(|(_, syms)| syms == &vec!["XBTUSD".to_string()]));
}

#[test]
fn backoff_falls_back_to_default_when_omitted() {
    let config: Config = serde_json::from_str(sample_config()).unwrap();
    let bitmex = &config.exchanges[1];
    assert!(bitmex.backoff.is_none());
}
