//! Bybit REST helper: depth snapshot only. Bybit authenticates its
//! private WebSocket channels directly with a signed `auth` op (see
//! [`crate::signer::bybit_ws_auth_signature`]) rather than a listen-key
//! lifecycle, so this client relies on [`RestClient`]'s default no-op
//! listen-key methods.

use async_trait::async_trait;

use crate::decimal::decimal_from_value;
use crate::error::AggregatorError;

use super::{BookSnapshot, RestClient};

pub struct BybitRest {
    http: reqwest::Client,
    rest_base: String,
}

impl BybitRest {
    pub fn new(rest_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            rest_base: rest_base.into(),
        }
    }
}

#[async_trait]
impl RestClient for BybitRest {
    async fn fetch_snapshot(&self, native_symbol: &str, depth: usize) -> Result<BookSnapshot, AggregatorError> {
        let url = format!(
            "{}/v5/market/orderbook?category=linear&symbol={}&limit={}",
            self.rest_base, native_symbol, depth
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AggregatorError::Rest {
                exchange: "bybit".to_string(),
                source: e,
            })?
            .json::<serde_json::Value>()
            .await
            .map_err(|e| AggregatorError::Rest {
                exchange: "bybit".to_string(),
                source: e,
            })?;

        let result = &resp["result"];
        let last_update_id = result["u"].as_u64().unwrap_or(0);

        let parse_side = |key: &str| -> Vec<(rust_decimal::Decimal, rust_decimal::Decimal)> {
            result[key]
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|pair| {
                    let price = decimal_from_value(pair.get(0))?;
                    let size = decimal_from_value(pair.get(1))?;
                    Some((price, size))
                })
                .collect()
        };

        Ok(BookSnapshot {
            last_update_id,
            bids: parse_side("b"),
            asks: parse_side("a"),
        })
    }
}
