// ------------------------------------------------------------
// Module declarations
// ------------------------------------------------------------
//
// - config:    Configuration structs loaded from JSON
// - error:     Error taxonomy shared across the pipeline
// - schema:    Strongly typed, normalized event definitions
// - symbol:    Canonical symbol type and per-exchange symbol tables
// - decimal:   Decimal-safe JSON number parsing
// - signer:    HMAC request/auth signing helpers
// - exchanges: Exchange dialects and the dialect registry
// - rest:      REST helpers (snapshot fetch, listen-key lifecycle)
// - book:      Order-book reconstruction engine
// - router:    Event dispatch fabric and per-order coalescer
// - sinks:     Sink contract and the logging reference sink
// - session:   Stream session lifecycle (one exchange, one connection)
// - feed:      Supervises one session per configured exchange
// - metrics:   Process-wide runtime counters
//
use std::fs;
use std::sync::Arc;

use rustls::crypto::{ring, CryptoProvider};

use aggregator_core::config::Config;
use aggregator_core::feed::FeedHandler;
use aggregator_core::router::{self, EventRouter, SinkFilter};
use aggregator_core::sinks::logging::LoggingSink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    // rustls >= 0.23 requires an explicit CryptoProvider installed
    // exactly once, as early as possible.
    CryptoProvider::install_default(ring::default_provider())
        .expect("failed to install rustls CryptoProvider");

    let config: Config = load_config("config.json")?;

    let mut router = EventRouter::new();
    for kind in [
        router::EventKind::Trade,
        router::EventKind::Ticker,
        router::EventKind::BookSnapshot,
        router::EventKind::BookDelta,
        router::EventKind::Funding,
        router::EventKind::Order,
        router::EventKind::Position,
        router::EventKind::Instrument,
    ] {
        router.register(kind, SinkFilter::any(), Arc::new(LoggingSink::new("log")));
    }
    let router = Arc::new(router);

    let mut feeds = FeedHandler::new(router);
    for exchange_cfg in config.exchanges.iter().filter(|e| e.enabled) {
        if let Err(e) = feeds.add_feed(exchange_cfg) {
            log::error!("{}: failed to register feed: {}", exchange_cfg.name, e);
        }
    }

    feeds.run();

    tokio::signal::ctrl_c().await?;
    log::info!("shutdown signal received");
    feeds.stop().await;

    Ok(())
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    let data = fs::read_to_string(path)?;
    let cfg = serde_json::from_str(&data)?;
    Ok(cfg)
}
