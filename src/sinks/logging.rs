//! Reference sink that logs every event it receives.
//!
//! Grounded on a prior `master_sender.rs` debug logging
//! (`println!("[Master SEND] {}", json)`), promoted from `println!` to
//! `log::info!` so it composes with the rest of the crate's `env_logger`
//! setup instead of bypassing it.

use async_trait::async_trait;
use log::info;

use crate::error::AggregatorError;
use crate::schema::Event;

use super::Sink;

pub struct LoggingSink {
    name: String,
}

impl LoggingSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Sink for LoggingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, event: &Event) -> Result<(), AggregatorError> {
        let payload = serde_json::to_string(event).map_err(|e| AggregatorError::SinkError {
            kind: event.kind_label(),
            sink: self.name.clone(),
            reason: e.to_string(),
        })?;
        info!("[{}] {}", self.name, payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TickerEvent;
    use crate::symbol::Symbol;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn write_never_fails_for_a_well_formed_event() {
        let sink = LoggingSink::new("test");
        let event = Event::Ticker(TickerEvent {
            exchange: "binance".into(),
            symbol: Symbol::new("BTC/USDT"),
            timestamp: Utc::now(),
            best_bid: dec!(100),
            best_ask: dec!(101),
        });
        assert!(sink.write(&event).await.is_ok());
    }
}
