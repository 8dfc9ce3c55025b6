//! OKX dialect.
//!
//! Wire framing (`{"arg":{"channel":...,"instId":...},"data":[...]}`)
//! kept from a prior v5 adapter; field extraction for ticker/trade
//! payloads grounded on `cryptofeed/exchange/okcoin.py::_ticker`/`_trade`
//! (OKX's v3-era OKCoin sibling uses the same field names).
//!
//! OKX's depth channel streams `action: "partial"|"update"` keyed by
//! price with a checksum, not a sequence id or order id — the same
//! shape Bybit's book channel uses, and likewise left unwired to
//! `BookEngine` for now (see `exchanges::bybit`'s module doc comment).
//! Frames arriving over this dialect are assumed already raw-deflate
//! decompressed by the session (OKX's `public`/`private` endpoints
//! compress every frame; see `session::transport`).

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::book::{EngineMode, SequenceRule};
use crate::config::Channel;
use crate::decimal::decimal_from_value;
use crate::error::AggregatorError;
use crate::schema::{TickerEvent, TradeEvent, TradeSide};
use crate::symbol::SymbolTable;

use super::adapter::{invalid_json, ExchangeDialect, ParsedFrame};

pub struct Okx;

#[async_trait]
impl ExchangeDialect for Okx {
    fn name(&self) -> &'static str {
        "okx"
    }

    fn default_ws_url(&self) -> &'static str {
        "wss://ws.okx.com:8443/ws/v5/public"
    }

    fn symbol_table(&self) -> SymbolTable {
        SymbolTable::separated('-')
    }

    fn engine_mode(&self) -> EngineMode {
        EngineMode::Sequenced(SequenceRule::Spot)
    }

    fn needs_rest_snapshot(&self) -> bool {
        // See the module doc comment: OKX's depth channel isn't wired
        // to BookEngine yet.
        false
    }

    fn uses_raw_deflate(&self) -> bool {
        true
    }

    fn build_subscribe_message(&self, channel: Channel, native_symbols: &[String]) -> Value {
        let topic = match channel {
            Channel::Trades => "trades",
            Channel::L2Book => "books",
            Channel::Ticker => "tickers",
            Channel::Funding => "funding-rate",
            Channel::Orders => "orders",
            Channel::Positions => "positions",
        };
        let args: Vec<Value> = native_symbols
            .iter()
            .map(|inst_id| json!({ "channel": topic, "instId": inst_id }))
            .collect();
        json!({ "op": "subscribe", "args": args })
    }

    fn parse_frame(&self, raw: &str) -> Result<ParsedFrame, AggregatorError> {
        let v: Value = serde_json::from_str(raw).map_err(|e| invalid_json(self.name(), e))?;

        if let Some(event) = v.get("event").and_then(Value::as_str) {
            if event == "error" {
                return Err(AggregatorError::ProtocolReject {
                    exchange: self.name().to_string(),
                    what: "subscribe",
                    reason: v
                        .get("msg")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown")
                        .to_string(),
                });
            }
            return Ok(ParsedFrame::Control);
        }

        let arg = match v.get("arg") {
            Some(a) => a,
            None => return Ok(ParsedFrame::Control),
        };
        let channel = match arg.get("channel").and_then(Value::as_str) {
            Some(c) => c,
            None => return Ok(ParsedFrame::Control),
        };
        let symbol_table = self.symbol_table();
        let inst_id = arg.get("instId").and_then(Value::as_str).unwrap_or_default();

        let rows = match v.get("data").and_then(Value::as_array) {
            Some(r) if !r.is_empty() => r,
            _ => return Ok(ParsedFrame::Control),
        };

        match channel {
            "trades" => {
                let row = &rows[0];
                let price = decimal_from_value(row.get("px")).ok_or_else(|| missing(self.name(), "px"))?;
                let amount = decimal_from_value(row.get("sz")).ok_or_else(|| missing(self.name(), "sz"))?;
                Ok(ParsedFrame::Trade(TradeEvent {
                    exchange: self.name().to_string(),
                    symbol: symbol_table.from_native(inst_id),
                    timestamp: parse_millis(row["ts"].as_str()),
                    side: if row["side"].as_str() == Some("sell") {
                        TradeSide::Sell
                    } else {
                        TradeSide::Buy
                    },
                    amount,
                    price,
                    trade_id: row["tradeId"].as_str().unwrap_or_default().to_string(),
                }))
            }
            "tickers" => {
                let row = &rows[0];
                let best_bid = decimal_from_value(row.get("bidPx")).unwrap_or(Decimal::ZERO);
                let best_ask = decimal_from_value(row.get("askPx")).unwrap_or(Decimal::ZERO);
                Ok(ParsedFrame::Ticker(TickerEvent {
                    exchange: self.name().to_string(),
                    symbol: symbol_table.from_native(inst_id),
                    timestamp: parse_millis(row["ts"].as_str()),
                    best_bid,
                    best_ask,
                }))
            }
            _ => Ok(ParsedFrame::Control),
        }
    }
}

fn parse_millis(s: Option<&str>) -> DateTime<Utc> {
    s.and_then(|s| s.parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now)
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
    fn parses_trade_frame() {
        let raw = r#"{"arg":{"channel":"trades","instId":"BTC-USDT"},"data":[{"instId":"BTC-USDT","tradeId":"1","px":"10","sz":"2","side":"buy","ts":"1700000000000"}]}"#;
        let frame = Okx.parse_frame(raw).unwrap();
        match frame {
            ParsedFrame::Trade(t) => assert_eq!(t.symbol.as_str(), "BTC/USDT"),
            other => panic!("expected Trade, got {other:?}"),
        }
    }

    #[test]
    fn error_event_is_protocol_reject() {
        let raw = r#"{"event":"error","msg":"bad instId","code":"60012"}"#;
        let err = Okx.parse_frame(raw).unwrap_err();
        assert!(matches!(err, AggregatorError::ProtocolReject { .. }));
    }

    #[test]
    fn subscribe_ack_is_control() {
        let raw = r#"{"event":"subscribe","arg":{"channel":"trades","instId":"BTC-USDT"}}"#;
        assert!(matches!(Okx.parse_frame(raw).unwrap(), ParsedFrame::Control));
    }
}
