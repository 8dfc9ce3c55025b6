//! Configuration structures loaded from `config.json`.
//!
//! Generalizes `Config`/`ExchangeConfig`/`ExchangePairs` into a
//! `SubscriptionConfig` sum type (Cartesian product of channels x
//! symbols, or an explicit
//! channel -> symbols map — the second shape wins when non-empty and
//! mixing the two within one feed is rejected at validation time), plus
//! per-adapter endpoint override, book depth, idle timeout, and backoff
//! parameters.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::AggregatorError;

/// Logical channel requested for a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Trades,
    Ticker,
    L2Book,
    Funding,
    Orders,
    Positions,
}

/// Root configuration loaded from `config.json`.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Master ingestion pool settings (sink-agnostic: the master is
    /// simply the first registered sink in this crate's scope).
    pub master: MasterConfig,
    pub exchanges: Vec<ExchangeConfig>,
    pub debug: Option<DebugConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MasterConfig {
    pub url: String,
    pub connections: usize,
    pub key: String,
    pub demo: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DebugConfig {
    pub raw: Option<bool>,
    pub log: Option<bool>,
}

/// Per-adapter configuration. One instance per feed.
#[derive(Debug, Deserialize, Clone)]
pub struct ExchangeConfig {
    pub name: String,
    pub enabled: bool,

    /// Cartesian-product shape: a flat channel + symbol list.
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub symbols: Vec<String>,

    /// Explicit shape: channel -> symbols. Wins over the Cartesian
    /// shape when non-empty.
    #[serde(default)]
    pub subscriptions: BTreeMap<Channel, Vec<String>>,

    /// Overrides the adapter's compiled-in WebSocket endpoint.
    pub endpoint_override: Option<String>,

    pub book_depth: Option<usize>,
    pub idle_timeout_secs: Option<u64>,
    pub backoff: Option<BackoffConfig>,
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Credentials {
    pub key_id: String,
    pub key_secret: String,
    pub passphrase: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct BackoffConfig {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: 500,
            max_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

impl BackoffConfig {
    /// The delay before attempt `n` (0-indexed), capped at `max_ms`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let ms = self.initial_ms as f64 * self.multiplier.powi(attempt as i32);
        Duration::from_millis(ms.min(self.max_ms as f64) as u64)
    }
}

/// Resolved subscription shape for one feed, computed once at
/// `add_feed` time from `ExchangeConfig`'s two input shapes.
#[derive(Debug, Clone)]
pub enum SubscriptionConfig {
    CartesianProduct {
        channels: Vec<Channel>,
        symbols: Vec<String>,
    },
    Explicit(BTreeMap<Channel, Vec<String>>),
}

impl SubscriptionConfig {
    /// Builds and validates a `SubscriptionConfig` from an
    /// `ExchangeConfig`. Mixing both shapes within one feed is a
    /// fatal-config error ("mixing is not permitted within
    /// one feed instance").
    pub fn resolve(cfg: &ExchangeConfig) -> Result<Self, AggregatorError> {
        let cartesian_present = !cfg.channels.is_empty() || !cfg.symbols.is_empty();
        let explicit_present = !cfg.subscriptions.is_empty();

        match (cartesian_present, explicit_present) {
            (true, true) => Err(AggregatorError::FatalConfig(format!(
                "{}: subscription config mixes the channels+symbols shape with the explicit map shape",
                cfg.name
            ))),
            (false, false) => Err(AggregatorError::FatalConfig(format!(
                "{}: no channels or symbols configured",
                cfg.name
            ))),
            (true, false) => {
                if cfg.channels.is_empty() {
                    return Err(AggregatorError::FatalConfig(format!(
                        "{}: symbols given without any channels",
                        cfg.name
                    )));
                }
                if cfg.symbols.is_empty() {
                    return Err(AggregatorError::FatalConfig(format!(
                        "{}: channels given without any symbols",
                        cfg.name
                    )));
                }
                Ok(SubscriptionConfig::CartesianProduct {
                    channels: cfg.channels.clone(),
                    symbols: cfg.symbols.clone(),
                })
            }
            (false, true) => {
                if cfg.subscriptions.values().any(|v| v.is_empty()) {
                    return Err(AggregatorError::FatalConfig(format!(
                        "{}: a channel in the explicit subscription map has no symbols",
                        cfg.name
                    )));
                }
                Ok(SubscriptionConfig::Explicit(cfg.subscriptions.clone()))
            }
        }
    }

    /// Flattens into `(channel, symbols)` pairs for iteration by the
    /// session runner, independent of which shape produced them.
    pub fn pairs(&self) -> Vec<(Channel, Vec<String>)> {
        match self {
            SubscriptionConfig::CartesianProduct { channels, symbols } => {
                channels.iter().map(|c| (*c, symbols.clone())).collect()
            }
            SubscriptionConfig::Explicit(map) => {
                map.iter().map(|(c, s)| (*c, s.clone())).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cfg() -> ExchangeConfig {
        ExchangeConfig {
            name: "binance".into(),
            enabled: true,
            channels: vec![],
            symbols: vec![],
            subscriptions: BTreeMap::new(),
            endpoint_override: None,
            book_depth: None,
            idle_timeout_secs: None,
            backoff: None,
            credentials: None,
        }
    }

    #[test]
    fn cartesian_shape_resolves() {
        let mut cfg = base_cfg();
        cfg.channels = vec![Channel::Trades];
        cfg.symbols = vec!["BTC/USDT".into()];
        let resolved = SubscriptionConfig::resolve(&cfg).unwrap();
        assert_eq!(resolved.pairs().len(), 1);
    }

    #[test]
    fn explicit_shape_wins_and_cartesian_rejected_when_both_present() {
        let mut cfg = base_cfg();
        cfg.channels = vec![Channel::Trades];
        cfg.symbols = vec!["BTC/USDT".into()];
        cfg.subscriptions
            .insert(Channel::L2Book, vec!["ETH/USDT".into()]);
        assert!(SubscriptionConfig::resolve(&cfg).is_err());
    }

    #[test]
    fn empty_config_is_fatal() {
        let cfg = base_cfg();
        assert!(SubscriptionConfig::resolve(&cfg).is_err());
    }

    #[test]
    fn backoff_delay_grows_and_caps() {
        let backoff = BackoffConfig {
            initial_ms: 100,
            max_ms: 1000,
            multiplier: 2.0,
        };
        assert_eq!(backoff.delay_for_attempt(0).as_millis(), 100);
        assert_eq!(backoff.delay_for_attempt(1).as_millis(), 200);
        assert_eq!(backoff.delay_for_attempt(10).as_millis(), 1000);
    }
}
