//! Bitmex dialect: order-id-indexed book, `table`-tagged envelopes.
//!
//! Grounded on `cryptofeed/exchange/bitmex.py`: `partial`/`insert`/
//! `update`/`delete` actions keyed by `id`, discarding anything before
//! the first `partial`, and the `trade`/`funding`/`order` table shapes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::book::{EngineMode, OrderBookAction};
use crate::config::Channel;
use crate::decimal::decimal_from_value;
use crate::error::AggregatorError;
use crate::schema::{FundingEvent, InstrumentEvent, OrderEvent, OrderStatus, Side, TradeEvent, TradeSide};
use crate::symbol::SymbolTable;

use super::adapter::{invalid_json, ExchangeDialect, ParsedFrame};

pub struct Bitmex;

fn parse_order_status(status: &str) -> Option<OrderStatus> {
    match status {
        "PendingNew" | "New" | "PartiallyFilled" => Some(OrderStatus::Open),
        "Filled" => Some(OrderStatus::Closed),
        "Canceled" => Some(OrderStatus::Canceled),
        "Rejected" => Some(OrderStatus::Rejected),
        _ => None,
    }
}

#[async_trait]
impl ExchangeDialect for Bitmex {
    fn name(&self) -> &'static str {
        "bitmex"
    }

    fn default_ws_url(&self) -> &'static str {
        "wss://www.bitmex.com/realtime"
    }

    fn symbol_table(&self) -> SymbolTable {
        // Bitmex native symbols (XBTUSD) carry no separator and aren't
        // simply BASE+QUOTE concatenation; treat as opaque passthrough.
        SymbolTable::concatenated()
    }

    fn engine_mode(&self) -> EngineMode {
        EngineMode::OrderIdIndexed
    }

    fn build_subscribe_message(&self, channel: Channel, native_symbols: &[String]) -> Value {
        let topic = match channel {
            Channel::Trades => "trade",
            Channel::L2Book => "orderBookL2",
            Channel::Ticker => "quote",
            Channel::Funding => "funding",
            Channel::Orders => "order",
            Channel::Positions => "position",
        };
        let args: Vec<String> = native_symbols
            .iter()
            .map(|s| format!("{topic}:{s}"))
            .collect();
        json!({ "op": "subscribe", "args": args })
    }

    fn parse_frame(&self, raw: &str) -> Result<ParsedFrame, AggregatorError> {
        let v: Value = serde_json::from_str(raw).map_err(|e| invalid_json(self.name(), e))?;

        let table = match v.get("table").and_then(Value::as_str) {
            Some(t) => t,
            None => return Ok(ParsedFrame::Control),
        };
        let action = v.get("action").and_then(Value::as_str).unwrap_or("");
        let rows = v.get("data").and_then(Value::as_array).cloned().unwrap_or_default();
        let symbol_table = self.symbol_table();

        match table {
            "trade" => {
                let row = rows.first().ok_or_else(|| missing(self.name(), "data[0]"))?;
                let native = row["symbol"].as_str().unwrap_or_default();
                let price = decimal_from_value(row.get("price")).ok_or_else(|| missing(self.name(), "price"))?;
                let amount = decimal_from_value(row.get("size")).ok_or_else(|| missing(self.name(), "size"))?;
                Ok(ParsedFrame::Trade(TradeEvent {
                    exchange: self.name().to_string(),
                    symbol: symbol_table.from_native(native),
                    timestamp: parse_iso(row["timestamp"].as_str()),
                    side: if row["side"].as_str() == Some("Buy") {
                        TradeSide::Buy
                    } else {
                        TradeSide::Sell
                    },
                    amount,
                    price,
                    trade_id: row["trdMatchID"].as_str().unwrap_or_default().to_string(),
                }))
            }
            "orderBookL2" => {
                let row = match rows.first() {
                    Some(r) => r,
                    None => return Ok(ParsedFrame::Control),
                };
                let native = row["symbol"].as_str().unwrap_or_default();
                let symbol = symbol_table.from_native(native);
                let book_action = match action {
                    "partial" => OrderBookAction::Partial,
                    "insert" => OrderBookAction::Insert,
                    "update" => OrderBookAction::Update,
                    "delete" => OrderBookAction::Delete,
                    _ => return Ok(ParsedFrame::Control),
                };
                let order_id = row["id"].as_u64().ok_or_else(|| missing(self.name(), "id"))?;
                let side = if row["side"].as_str() == Some("Buy") {
                    Side::Bid
                } else {
                    Side::Ask
                };
                Ok(ParsedFrame::BookAction {
                    symbol,
                    action: book_action,
                    side,
                    order_id,
                    price: decimal_from_value(row.get("price")),
                    size: decimal_from_value(row.get("size")),
                })
            }
            "funding" => {
                let row = rows.first().ok_or_else(|| missing(self.name(), "data[0]"))?;
                let native = row["symbol"].as_str().unwrap_or_default();
                Ok(ParsedFrame::Funding(FundingEvent {
                    exchange: self.name().to_string(),
                    symbol: symbol_table.from_native(native),
                    timestamp: parse_iso(row["timestamp"].as_str()),
                    interval: row["fundingInterval"].as_str().unwrap_or_default().to_string(),
                    rate: decimal_from_value(row.get("fundingRate")).unwrap_or(Decimal::ZERO),
                    rate_daily: decimal_from_value(row.get("fundingRateDaily")).unwrap_or(Decimal::ZERO),
                }))
            }
            "order" => {
                let row = rows.first().ok_or_else(|| missing(self.name(), "data[0]"))?;
                let native = row["symbol"].as_str().unwrap_or_default();
                let status = row["ordStatus"]
                    .as_str()
                    .and_then(parse_order_status)
                    .unwrap_or(OrderStatus::Open);
                Ok(ParsedFrame::Order(OrderEvent {
                    exchange: self.name().to_string(),
                    symbol: symbol_table.from_native(native),
                    order_id: row["orderID"].as_str().unwrap_or_default().to_string(),
                    client_order_id: row["clOrdID"].as_str().map(str::to_string),
                    timestamp: parse_iso(row["timestamp"].as_str()),
                    side: if row["side"].as_str() == Some("Buy") {
                        TradeSide::Buy
                    } else {
                        TradeSide::Sell
                    },
                    status,
                    amount: decimal_from_value(row.get("orderQty")).unwrap_or(Decimal::ZERO),
                    filled: decimal_from_value(row.get("cumQty")).unwrap_or(Decimal::ZERO),
                    remaining: decimal_from_value(row.get("leavesQty")).unwrap_or(Decimal::ZERO),
                    price: decimal_from_value(row.get("price")),
                    average: decimal_from_value(row.get("avgPx")),
                }))
            }
            "instrument" => {
                let row = rows.first().ok_or_else(|| missing(self.name(), "data[0]"))?;
                let native = row["symbol"].as_str().unwrap_or_default();
                Ok(ParsedFrame::Instrument(InstrumentEvent {
                    exchange: self.name().to_string(),
                    symbol: symbol_table.from_native(native),
                    timestamp: parse_iso(row["timestamp"].as_str()),
                    fields: Value::Object(row.as_object().cloned().unwrap_or_default()),
                }))
            }
            _ => Ok(ParsedFrame::Control),
        }
    }
}

fn parse_iso(s: Option<&str>) -> DateTime<Utc> {
    s.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
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
    fn parses_partial_into_book_action() {
        let raw = r#"{"table":"orderBookL2","action":"partial","data":[{"symbol":"XBTUSD","id":1,"side":"Buy","size":5,"price":10}]}"#;
        let frame = Bitmex.parse_frame(raw).unwrap();
        match frame {
            ParsedFrame::BookAction { action, side, order_id, .. } => {
                assert_eq!(action, OrderBookAction::Partial);
                assert_eq!(side, Side::Bid);
                assert_eq!(order_id, 1);
            }
            other => panic!("expected BookAction, got {other:?}"),
        }
    }

    #[test]
    fn parses_delete_without_price_or_size() {
        let raw = r#"{"table":"orderBookL2","action":"delete","data":[{"symbol":"XBTUSD","id":1,"side":"Buy"}]}"#;
        let frame = Bitmex.parse_frame(raw).unwrap();
        assert!(matches!(frame, ParsedFrame::BookAction { action: OrderBookAction::Delete, .. }));
    }

    #[test]
    fn unrecognized_table_is_control() {
        let raw = r#"{"table":"liquidation","action":"update","data":[]}"#;
        assert!(matches!(Bitmex.parse_frame(raw).unwrap(), ParsedFrame::Control));
    }

    #[test]
    fn empty_instrument_update_is_control() {
        let raw = r#"{"table":"instrument","action":"update","data":[]}"#;
        assert!(matches!(Bitmex.parse_frame(raw).unwrap(), ParsedFrame::Control));
    }

    #[test]
    fn parses_instrument_update() {
        let raw = r#"{"table":"instrument","action":"update","data":[{"symbol":"XBTUSD","timestamp":"2023-01-01T00:00:00.000Z","tickSize":0.5,"state":"Open"}]}"#;
        let frame = Bitmex.parse_frame(raw).unwrap();
        match frame {
            ParsedFrame::Instrument(event) => {
                assert_eq!(event.symbol.as_str(), "XBTUSD");
                assert_eq!(event.fields["state"], "Open");
            }
            other => panic!("expected Instrument, got {other:?}"),
        }
    }
}
