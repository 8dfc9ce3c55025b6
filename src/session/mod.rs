//! Stream session lifecycle: one WebSocket connection, one `BookEngine`,
//! one exchange.

pub mod runner;
pub mod state;
pub mod transport;

pub use runner::StreamSession;
pub use state::SessionState;
