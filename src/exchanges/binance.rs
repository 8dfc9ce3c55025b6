//! Binance Spot dialect.
//!
//! Grounded on `cryptofeed/exchange/binance.py`: combined-stream
//! subscribe framing, `depthUpdate`/`trade` event tags, and the
//! `U <= last+1 <= u` snapshot-bridge rule captured by
//! [`SequenceRule::Spot`].

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::book::{EngineMode, SequenceRule};
use crate::config::Channel;
use crate::decimal::decimal_from_value;
use crate::error::AggregatorError;
use crate::schema::{TradeEvent, TradeSide};
use crate::symbol::SymbolTable;

use super::adapter::{invalid_json, ExchangeDialect, ParsedFrame};

pub struct BinanceSpot;

fn parse_levels(raw: Option<&Value>) -> Vec<(Decimal, Decimal)> {
    raw.and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|pair| {
            let price = decimal_from_value(pair.get(0))?;
            let size = decimal_from_value(pair.get(1))?;
            Some((price, size))
        })
        .collect()
}

#[async_trait]
impl ExchangeDialect for BinanceSpot {
    fn name(&self) -> &'static str {
        "binance"
    }

    fn default_ws_url(&self) -> &'static str {
        "wss://stream.binance.com:9443/ws"
    }

    fn symbol_table(&self) -> SymbolTable {
        SymbolTable::concatenated()
    }

    fn engine_mode(&self) -> EngineMode {
        EngineMode::Sequenced(SequenceRule::Spot)
    }

    fn build_subscribe_message(&self, channel: Channel, native_symbols: &[String]) -> Value {
        let streams: Vec<String> = native_symbols
            .iter()
            .map(|s| {
                let lower = s.to_lowercase();
                match channel {
                    Channel::Trades => format!("{lower}@trade"),
                    Channel::L2Book => format!("{lower}@depth"),
                    Channel::Ticker => format!("{lower}@bookTicker"),
                    Channel::Funding | Channel::Orders | Channel::Positions => lower,
                }
            })
            .collect();

        json!({
            "method": "SUBSCRIBE",
            "params": streams,
            "id": 1,
        })
    }

    fn parse_frame(&self, raw: &str) -> Result<ParsedFrame, AggregatorError> {
        let v: Value = serde_json::from_str(raw).map_err(|e| invalid_json(self.name(), e))?;

        if v.get("result").is_some() {
            return Ok(ParsedFrame::Control);
        }

        let data = v.get("data").unwrap_or(&v);
        let event = match data.get("e").and_then(Value::as_str) {
            Some(e) => e,
            None => return Ok(ParsedFrame::Control),
        };

        match event {
            "trade" => {
                let symbol_table = self.symbol_table();
                let native = data["s"].as_str().unwrap_or_default();
                let price = decimal_from_value(data.get("p")).ok_or_else(|| missing(self.name(), "p"))?;
                let amount = decimal_from_value(data.get("q")).ok_or_else(|| missing(self.name(), "q"))?;
                let ts_ms = data["T"].as_i64().unwrap_or(0);
                Ok(ParsedFrame::Trade(TradeEvent {
                    exchange: self.name().to_string(),
                    symbol: symbol_table.from_native(native),
                    timestamp: Utc.timestamp_millis_opt(ts_ms).single().unwrap_or_else(Utc::now),
                    side: if data["m"].as_bool().unwrap_or(false) {
                        TradeSide::Sell
                    } else {
                        TradeSide::Buy
                    },
                    amount,
                    price,
                    trade_id: data["t"].to_string(),
                }))
            }
            "depthUpdate" => {
                let symbol_table = self.symbol_table();
                let native = data["s"].as_str().unwrap_or_default();
                let first_id = data["U"].as_u64().ok_or_else(|| missing(self.name(), "U"))?;
                let final_id = data["u"].as_u64().ok_or_else(|| missing(self.name(), "u"))?;
                Ok(ParsedFrame::BookDelta {
                    symbol: symbol_table.from_native(native),
                    first_id,
                    final_id,
                    bids: parse_levels(data.get("b")),
                    asks: parse_levels(data.get("a")),
                })
            }
            _ => Ok(ParsedFrame::Control),
        }
    }
}

fn missing(exchange: &str, field: &'static str) -> AggregatorError {
    AggregatorError::ProtocolDecode {
        exchange: exchange.to_string(),
        reason: format!("missing required field `{field}`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_depth_update_into_book_delta() {
        let raw = r#"{"e":"depthUpdate","E":123,"s":"BTCUSDT","U":100,"u":101,"b":[["10.0","1.0"]],"a":[]}"#;
        let frame = BinanceSpot.parse_frame(raw).unwrap();
        match frame {
            ParsedFrame::BookDelta { first_id, final_id, bids, .. } => {
                assert_eq!(first_id, 100);
                assert_eq!(final_id, 101);
                assert_eq!(bids.len(), 1);
            }
            other => panic!("expected BookDelta, got {other:?}"),
        }
    }

    #[test]
    fn parses_trade_event() {
        let raw = r#"{"e":"trade","E":123,"s":"BTCUSDT","t":1,"p":"10.5","q":"2.0","T":1700000000000,"m":false}"#;
        let frame = BinanceSpot.parse_frame(raw).unwrap();
        match frame {
            ParsedFrame::Trade(t) => {
                assert_eq!(t.side, TradeSide::Buy);
                assert_eq!(t.symbol.as_str(), "BTC/USDT");
            }
            other => panic!("expected Trade, got {other:?}"),
        }
    }

    #[test]
    fn ack_is_control() {
        let raw = r#"{"result":null,"id":1}"#;
        assert!(matches!(BinanceSpot.parse_frame(raw).unwrap(), ParsedFrame::Control));
    }
}
