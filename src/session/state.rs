//! Stream session lifecycle states.

use std::fmt;

/// One stream session's lifecycle. `Authenticating` and `Snapshotting`
/// are skipped when the dialect has no credentials or no book channel
/// respectively; every path funnels into `Streaming` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authenticating,
    Subscribing,
    Snapshotting,
    Streaming,
    Closed,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Connecting => "connecting",
            SessionState::Authenticating => "authenticating",
            SessionState::Subscribing => "subscribing",
            SessionState::Snapshotting => "snapshotting",
            SessionState::Streaming => "streaming",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        f.write_str(s)
    }
}
