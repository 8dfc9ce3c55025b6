//! Error taxonomy for the aggregator core.
//!
//! Every fallible operation in this crate resolves to one of the variants
//! below, each carrying exactly the context a caller needs to decide
//! whether to reconnect, skip a frame, or abort feed registration.

use thiserror::Error;

/// Errors raised anywhere inside the session/book/router pipeline.
///
/// `FatalConfig` is the only variant allowed to escape
/// `FeedHandler::add_feed`; every other variant is caught at the session
/// task boundary and translated into the reconnect-or-continue policy
/// documented on the variant itself.
#[derive(Debug, Error)]
pub enum AggregatorError {
    /// Socket-level I/O or DNS failure. Recovered by reconnect.
    #[error("transient network error on {exchange}: {source}")]
    Transient {
        exchange: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON/decompression/shape error while decoding a frame.
    /// The session logs and drops the frame; it does not reconnect.
    #[error("protocol decode error on {exchange}: {reason}")]
    ProtocolDecode { exchange: String, reason: String },

    /// Exchange-signaled subscribe/auth rejection.
    #[error("{exchange} rejected {what}: {reason}")]
    ProtocolReject {
        exchange: String,
        what: &'static str,
        reason: String,
    },

    /// Book-engine sequence-reconciliation failure: no overlap between
    /// the snapshot and the first observed delta. Fatal to the session;
    /// it resets book state and reconnects.
    #[error("snapshot-gap on {exchange}/{symbol}: first_id={first_id} final_id={final_id} last_update_id={last_update_id}")]
    SnapshotGap {
        exchange: String,
        symbol: String,
        first_id: u64,
        final_id: u64,
        last_update_id: u64,
    },

    /// Listen key expired or went silent past its refresh deadline.
    #[error("stale listen key on {exchange}: {reason}")]
    StaleListenKey { exchange: String, reason: String },

    /// A sink failed to accept an event. Isolated per sink; never
    /// propagated past the router.
    #[error("sink error delivering {kind} to {sink}: {reason}")]
    SinkError {
        kind: &'static str,
        sink: String,
        reason: String,
    },

    /// Validation failure at feed registration. The only variant allowed
    /// to escape the session task boundary.
    #[error("invalid feed configuration: {0}")]
    FatalConfig(String),

    /// REST call failure (snapshot fetch, listen-key lifecycle).
    #[error("rest request to {exchange} failed: {source}")]
    Rest {
        exchange: String,
        #[source]
        source: reqwest::Error,
    },
}

impl AggregatorError {
    /// Whether this error should trigger a session reconnect (as opposed
    /// to a log-and-continue at the frame level).
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(
            self,
            AggregatorError::Transient { .. }
                | AggregatorError::SnapshotGap { .. }
                | AggregatorError::StaleListenKey { .. }
        )
    }
}
