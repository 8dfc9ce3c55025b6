//! Event dispatch fabric.
//!
//! A registry from *event kind x optional (exchange, symbol) filter* to
//! an ordered set of sinks. `emit` awaits each sink in registration
//! order before moving to the next for the same event; a failing sink
//! logs and is skipped, never unregistered.

pub mod coalescer;

use std::collections::HashMap;
use std::sync::Arc;

use log::{error, warn};

use crate::error::AggregatorError;
use crate::schema::Event;
use crate::sinks::Sink;
use crate::symbol::Symbol;

pub use coalescer::OrderCoalescer;

/// Discriminant used as the router's registry key, independent of the
/// payload each `Event` variant carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Trade,
    Ticker,
    BookSnapshot,
    BookDelta,
    Funding,
    Order,
    Position,
    Instrument,
}

impl From<&Event> for EventKind {
    fn from(event: &Event) -> Self {
        match event {
            Event::Trade(_) => EventKind::Trade,
            Event::Ticker(_) => EventKind::Ticker,
            Event::BookSnapshot(_) => EventKind::BookSnapshot,
            Event::BookDelta(_) => EventKind::BookDelta,
            Event::Funding(_) => EventKind::Funding,
            Event::Order(_) => EventKind::Order,
            Event::Position(_) => EventKind::Position,
            Event::Instrument(_) => EventKind::Instrument,
        }
    }
}

/// Optional (exchange, symbol) narrowing for a sink registration. `None`
/// means "every exchange" / "every symbol" on that axis.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct SinkFilter {
    pub exchange: Option<String>,
    pub symbol: Option<Symbol>,
}

impl SinkFilter {
    pub fn any() -> Self {
        Self {
            exchange: None,
            symbol: None,
        }
    }

    fn matches(&self, exchange: &str, symbol: &Symbol) -> bool {
        self.exchange.as_deref().is_none_or(|e| e == exchange)
            && self.symbol.as_ref().is_none_or(|s| s == symbol)
    }
}

struct Registration {
    filter: SinkFilter,
    sink: Arc<dyn Sink>,
}

/// Registry from event kind to an ordered list of filtered sink
/// registrations. `emit` delivers to every registration whose filter
/// matches the event's (exchange, symbol), in registration order.
#[derive(Default)]
pub struct EventRouter {
    registrations: HashMap<EventKind, Vec<Registration>>,
    coalescer: OrderCoalescer,
}

impl EventRouter {
    pub fn new() -> Self {
        Self {
            registrations: HashMap::new(),
            coalescer: OrderCoalescer::new(),
        }
    }

    /// Registers `sink` for `kind`, optionally narrowed by `filter`.
    /// Registration order is preserved for delivery ordering.
    pub fn register(&mut self, kind: EventKind, filter: SinkFilter, sink: Arc<dyn Sink>) {
        self.registrations
            .entry(kind)
            .or_default()
            .push(Registration { filter, sink });
    }

    /// Delivers `event` to every matching sink in registration order,
    /// awaiting each before invoking the next. Order events are first
    /// passed through the per-order coalescer so sinks receive the
    /// merged `unhandled_amount` alongside the raw event.
    pub async fn emit(&self, event: Event) {
        if let Event::Order(order) = &event {
            self.coalescer.record(order);
        }

        let kind = EventKind::from(&event);
        let Some(registrations) = self.registrations.get(&kind) else {
            warn!(
                "no sinks registered for {} ({}/{})",
                event.kind_label(),
                event.exchange(),
                event.symbol()
            );
            return;
        };

        for reg in registrations {
            if !reg.filter.matches(event.exchange(), event.symbol()) {
                continue;
            }
            if let Err(err) = reg.sink.write(&event).await {
                error!(
                    "sink {} failed to accept {} for {}/{}: {}",
                    reg.sink.name(),
                    event.kind_label(),
                    event.exchange(),
                    event.symbol(),
                    AggregatorError::SinkError {
                        kind: event.kind_label(),
                        sink: reg.sink.name().to_string(),
                        reason: err.to_string(),
                    }
                );
            }
        }
    }

    /// Exposes the coalescer's accumulated `unhandled_amount` for a
    /// given order, for sinks or tests that want to inspect derived
    /// state without re-deriving it.
    pub fn unhandled_amount(&self, exchange: &str, symbol: &Symbol, order_id: &str) -> Option<rust_decimal::Decimal> {
        self.coalescer.unhandled_amount(exchange, symbol, order_id)
    }
}
