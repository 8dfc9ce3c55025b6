//! Sink contract.
//!
//! Sink *implementations* are out of scope for this crate:
//! the core only sees "sink accepts event E". [`Sink`] is that stable
//! boundary; [`logging::LoggingSink`] is the one reference
//! implementation this crate owns, since something has to exist for
//! tests and the example binary to register.

pub mod logging;

use async_trait::async_trait;

use crate::error::AggregatorError;
use crate::schema::Event;

/// The stable contract between the event router and a sink. Sinks must
/// tolerate duplicate delivery at reconnect and must be
/// reentrant-safe, since they are shared across sessions.
#[async_trait]
pub trait Sink: Send + Sync {
    /// A short, stable name used in logs when this sink fails.
    fn name(&self) -> &str;

    async fn write(&self, event: &Event) -> Result<(), AggregatorError>;
}
