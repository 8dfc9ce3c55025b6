//! Top-level feed handler: owns one `StreamSession` per configured
//! exchange and supervises its task.
//!
//! Generalizes a prior per-channel `tokio::spawn(run_ws_loop(...))`
//! call sites in `collector::runner` into one supervised task per
//! session; `StreamSession::run` already contains its own
//! reconnect/backoff loop, so supervision here only needs to restart a
//! task that exits unexpectedly (a panic, not a reconnect) and to drive
//! cooperative shutdown.

use std::sync::Arc;

use log::{error, info};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::ExchangeConfig;
use crate::error::AggregatorError;
use crate::exchanges::get_dialect;
use crate::rest::binance::BinanceRest;
use crate::rest::bybit::BybitRest;
use crate::rest::RestClient;
use crate::router::EventRouter;
use crate::session::StreamSession;

struct ManagedFeed {
    session: Arc<StreamSession>,
    shutdown: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

/// Owns every configured feed and the shared router they publish
/// through.
pub struct FeedHandler {
    router: Arc<EventRouter>,
    feeds: Vec<ManagedFeed>,
}

impl FeedHandler {
    pub fn new(router: Arc<EventRouter>) -> Self {
        Self {
            router,
            feeds: Vec::new(),
        }
    }

    /// Resolves `cfg.name` to a dialect, builds its REST client (if
    /// any), and constructs the session. Does not start it — call
    /// `run()` once every feed has been added.
    pub fn add_feed(&mut self, cfg: &ExchangeConfig) -> Result<(), AggregatorError> {
        let dialect = get_dialect(&cfg.name).ok_or_else(|| {
            AggregatorError::FatalConfig(format!("{}: no dialect registered for this exchange", cfg.name))
        })?;

        let rest = build_rest_client(&cfg.name, cfg);
        let session = Arc::new(StreamSession::new(dialect, rest, self.router.clone(), cfg)?);

        self.feeds.push(ManagedFeed {
            session,
            shutdown: Arc::new(Notify::new()),
            handle: None,
        });
        Ok(())
    }

    /// Spawns one supervised task per added feed. Idempotent: calling
    /// `run` twice without `stop` in between is a no-op for feeds
    /// already running.
    pub fn run(&mut self) {
        for feed in &mut self.feeds {
            if feed.handle.is_some() {
                continue;
            }
            let session = feed.session.clone();
            let shutdown = feed.shutdown.clone();
            let exchange = session.exchange().to_string();
            feed.handle = Some(tokio::spawn(async move {
                session.run(shutdown).await;
                info!("{exchange}: supervised task exited");
            }));
        }
    }

    /// Notifies every feed's shutdown signal and waits for its task to
    /// exit.
    pub async fn stop(&mut self) {
        for feed in &self.feeds {
            feed.shutdown.notify_waiters();
        }
        for feed in &mut self.feeds {
            if let Some(handle) = feed.handle.take() {
                if let Err(e) = handle.await {
                    error!("feed task panicked during shutdown: {e}");
                }
            }
        }
    }
}

fn build_rest_client(exchange: &str, cfg: &ExchangeConfig) -> Option<Arc<dyn RestClient>> {
    match exchange {
        "binance" => Some(Arc::new(BinanceRest::new(
            cfg.endpoint_override
                .clone()
                .unwrap_or_else(|| "https://api.binance.com/api/v3".to_string()),
            cfg.credentials.as_ref().map(|c| c.key_id.clone()),
            cfg.credentials.as_ref().map(|c| c.key_secret.clone()),
        )) as Arc<dyn RestClient>),
        "binance_futures" => Some(Arc::new(BinanceRest::new(
            cfg.endpoint_override
                .clone()
                .unwrap_or_else(|| "https://fapi.binance.com/fapi/v1".to_string()),
            cfg.credentials.as_ref().map(|c| c.key_id.clone()),
            cfg.credentials.as_ref().map(|c| c.key_secret.clone()),
        )) as Arc<dyn RestClient>),
        "bybit" => Some(Arc::new(BybitRest::new(
            cfg.endpoint_override
                .clone()
                .unwrap_or_else(|| "https://api.bybit.com".to_string()),
        )) as Arc<dyn RestClient>),
        // Bitmex streams `partial` instead of fetching a snapshot; OKX's
        // depth channel isn't wired to BookEngine yet (see
        // exchanges::okx's module doc comment).
        "bitmex" | "okx" => None,
        _ => None,
    }
}
