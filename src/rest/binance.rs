//! Binance REST helper: depth snapshot + user-data listen-key lifecycle.
//!
//! Grounded on `cryptofeed/rest/binance.py` (`create_listen_key`,
//! `keepalive_listen_key`, `generate_signature`/`stringify_params`) and
//! `cryptofeed/exchange/binance.py::_snapshot`.

use async_trait::async_trait;
use serde::Deserialize;

use crate::decimal::decimal_from_value;
use crate::error::AggregatorError;
use crate::signer::binance_query_signature;

use super::{BookSnapshot, ListenKey, RestClient};

pub struct BinanceRest {
    http: reqwest::Client,
    rest_base: String,
    key_id: Option<String>,
    key_secret: Option<String>,
}

impl BinanceRest {
    pub fn new(rest_base: impl Into<String>, key_id: Option<String>, key_secret: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            rest_base: rest_base.into(),
            key_id,
            key_secret,
        }
    }

    fn exchange(&self) -> String {
        "binance".to_string()
    }
}

#[derive(Deserialize)]
struct DepthResponse {
    #[serde(rename = "lastUpdateId")]
    last_update_id: u64,
    bids: Vec<[serde_json::Value; 2]>,
    asks: Vec<[serde_json::Value; 2]>,
}

#[derive(Deserialize)]
struct ListenKeyResponse {
    #[serde(rename = "listenKey")]
    listen_key: String,
}

fn parse_levels(raw: &[[serde_json::Value; 2]]) -> Vec<(rust_decimal::Decimal, rust_decimal::Decimal)> {
    raw.iter()
        .filter_map(|pair| {
            let price = decimal_from_value(Some(&pair[0]))?;
            let size = decimal_from_value(Some(&pair[1]))?;
            Some((price, size))
        })
        .collect()
}

#[async_trait]
impl RestClient for BinanceRest {
    async fn fetch_snapshot(&self, native_symbol: &str, depth: usize) -> Result<BookSnapshot, AggregatorError> {
        let url = format!(
            "{}/depth?symbol={}&limit={}",
            self.rest_base, native_symbol, depth
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AggregatorError::Rest {
                exchange: self.exchange(),
                source: e,
            })?
            .json::<DepthResponse>()
            .await
            .map_err(|e| AggregatorError::Rest {
                exchange: self.exchange(),
                source: e,
            })?;

        Ok(BookSnapshot {
            last_update_id: resp.last_update_id,
            bids: parse_levels(&resp.bids),
            asks: parse_levels(&resp.asks),
        })
    }

    async fn create_listen_key(&self) -> Result<Option<ListenKey>, AggregatorError> {
        let (Some(key_id), Some(_)) = (&self.key_id, &self.key_secret) else {
            return Ok(None);
        };
        let url = format!("{}/userDataStream", self.rest_base);
        let resp = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", key_id)
            .send()
            .await
            .map_err(|e| AggregatorError::Rest {
                exchange: self.exchange(),
                source: e,
            })?
            .json::<ListenKeyResponse>()
            .await
            .map_err(|e| AggregatorError::Rest {
                exchange: self.exchange(),
                source: e,
            })?;
        Ok(Some(ListenKey {
            value: resp.listen_key,
        }))
    }

    async fn keepalive_listen_key(&self, key: &ListenKey) -> Result<(), AggregatorError> {
        let Some(key_id) = &self.key_id else {
            return Ok(());
        };
        let url = format!(
            "{}/userDataStream?listenKey={}",
            self.rest_base, key.value
        );
        self.http
            .put(&url)
            .header("X-MBX-APIKEY", key_id)
            .send()
            .await
            .map_err(|e| AggregatorError::Rest {
                exchange: self.exchange(),
                source: e,
            })?;
        Ok(())
    }
}

/// Signed futures listen-key refresh query string, grounded on
/// `cryptofeed/rest/binance.py::stringify_params` (futures variants
/// require `recvWindow`/`timestamp` and a query-string signature).
pub fn signed_futures_query(secret: &str, recv_window: u64, timestamp: i64) -> String {
    let base = format!("recvWindow={recv_window}&timestamp={timestamp}");
    let signature = binance_query_signature(secret, &base);
    format!("{base}&signature={signature}")
}
