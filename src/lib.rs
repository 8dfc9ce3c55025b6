//! Exchange adapter framework and order-book reconstruction engine for
//! a multi-exchange market-data aggregator.
//!
//! `main.rs` wires these modules into a running process; integration
//! tests and the binary both go through this crate root.

pub mod book;
pub mod config;
pub mod decimal;
pub mod error;
pub mod exchanges;
pub mod feed;
pub mod metrics;
pub mod rest;
pub mod router;
pub mod schema;
pub mod session;
pub mod signer;
pub mod sinks;
pub mod symbol;
