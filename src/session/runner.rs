//! Stream session state machine.
//!
//! Generalizes a prior `collector::runner::run_ws_loop` (a bare
//! connect/subscribe/read loop with a fixed 5s retry) into the full
//! full session lifecycle: `Connecting -> Authenticating? ->
//! Subscribing -> Snapshotting? -> Streaming -> (Closed | Failed)`,
//! with `Failed` driving the configured exponential backoff back to
//! `Connecting` instead of a fixed delay.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::Notify;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::book::{BookEngine, DeltaOutcome, OrderBookAction};
use crate::config::{Channel, Credentials, ExchangeConfig, SubscriptionConfig};
use crate::error::AggregatorError;
use crate::exchanges::adapter::{ExchangeDialect, ParsedFrame};
use crate::rest::{ListenKey, RestClient};
use crate::router::EventRouter;
use crate::schema::{BookDeltaEvent, BookSnapshotEvent, Event};
use crate::symbol::Symbol;

use super::state::SessionState;
use super::transport::inflate_raw;

/// Aborts a spawned task when dropped, so a listen-key keepalive loop
/// never outlives the session that started it, whichever path
/// `run_once` returns through.
struct AbortOnDrop(Option<tokio::task::JoinHandle<()>>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

/// One exchange feed: one WebSocket connection, one `BookEngine`,
/// supervised by `FeedHandler`.
pub struct StreamSession {
    dialect: Arc<dyn ExchangeDialect>,
    rest: Option<Arc<dyn RestClient>>,
    router: Arc<EventRouter>,
    subscriptions: SubscriptionConfig,
    ws_url: String,
    book_depth: usize,
    idle_timeout: Duration,
    backoff: crate::config::BackoffConfig,
    credentials: Option<Credentials>,
}

impl StreamSession {
    pub fn new(
        dialect: Arc<dyn ExchangeDialect>,
        rest: Option<Arc<dyn RestClient>>,
        router: Arc<EventRouter>,
        cfg: &ExchangeConfig,
    ) -> Result<Self, AggregatorError> {
        let subscriptions = SubscriptionConfig::resolve(cfg)?;
        let ws_url = cfg
            .endpoint_override
            .clone()
            .unwrap_or_else(|| dialect.default_ws_url().to_string());

        // Default full-depth book; OKX caps its public depth channel at 200.
        let default_book_depth = if dialect.name() == "okx" { 200 } else { 1000 };

        Ok(Self {
            dialect,
            rest,
            router,
            subscriptions,
            ws_url,
            book_depth: cfg.book_depth.unwrap_or(default_book_depth),
            idle_timeout: Duration::from_secs(cfg.idle_timeout_secs.unwrap_or(180)),
            backoff: cfg.backoff.unwrap_or_default(),
            credentials: cfg.credentials.clone(),
        })
    }

    pub fn exchange(&self) -> &str {
        self.dialect.name()
    }

    /// Runs the reconnect-forever loop until `shutdown` is notified.
    /// A clean close resets the backoff counter; a failed connection
    /// attempt grows it, per the configured `BackoffConfig`.
    pub async fn run(self: Arc<Self>, shutdown: Arc<Notify>) {
        let mut attempt: u32 = 0;
        loop {
            let run_once = self.run_once();
            tokio::select! {
                result = run_once => {
                    match result {
                        Ok(()) => {
                            info!("{}: session closed cleanly", self.exchange());
                            attempt = 0;
                        }
                        Err(e) => {
                            error!("{}: session failed: {}", self.exchange(), e);
                            attempt = attempt.saturating_add(1);
                        }
                    }
                }
                _ = shutdown.notified() => {
                    info!("{}: shutdown requested", self.exchange());
                    return;
                }
            }

            let delay = self.backoff.delay_for_attempt(attempt);
            debug!("{}: reconnecting in {:?}", self.exchange(), delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.notified() => return,
            }
        }
    }

    async fn run_once(&self) -> Result<(), AggregatorError> {
        let exchange = self.dialect.name();
        let mut state = SessionState::Connecting;
        debug!("{exchange}: {state}");

        let mut ws_url = self.ws_url.clone();
        let mut listen_key: Option<ListenKey> = None;
        if let (Some(rest), Some(_creds)) = (&self.rest, &self.credentials) {
            if let Some(key) = rest.create_listen_key().await? {
                ws_url = format!("{ws_url}/{}", key.value);
                listen_key = Some(key);
            }
        }

        let (ws, _) = connect_async(&ws_url).await.map_err(|e| AggregatorError::Transient {
            exchange: exchange.to_string(),
            source: std::io::Error::other(e.to_string()),
        })?;
        let (mut write, mut read) = ws.split();

        let _keepalive_guard = listen_key.clone().zip(self.rest.clone()).map(|(key, rest)| {
            AbortOnDrop(Some(tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(30 * 60));
                loop {
                    interval.tick().await;
                    if let Err(e) = rest.keepalive_listen_key(&key).await {
                        warn!("listen key keepalive failed: {e}");
                    }
                }
            })))
        });

        if let Some(creds) = &self.credentials {
            if let Some(auth) = self.dialect.build_auth_message(creds) {
                state = SessionState::Authenticating;
                debug!("{exchange}: {state}");
                write
                    .send(Message::Text(auth.to_string().into()))
                    .await
                    .map_err(|e| transient(exchange, e))?;
            }
        }

        state = SessionState::Subscribing;
        debug!("{exchange}: {state}");
        let symbol_table = self.dialect.symbol_table();
        for (channel, symbols) in self.subscriptions.pairs() {
            let native: Vec<String> = symbols
                .iter()
                .map(|s| symbol_table.to_native(&Symbol::from(s.as_str())))
                .collect();
            let sub = self.dialect.build_subscribe_message(channel, &native);
            write
                .send(Message::Text(sub.to_string().into()))
                .await
                .map_err(|e| transient(exchange, e))?;
        }

        let mut book_engine = BookEngine::new(exchange, self.dialect.engine_mode());

        if self.dialect.needs_rest_snapshot() {
            if let Some(rest) = &self.rest {
                if let Some(symbols) = self
                    .subscriptions
                    .pairs()
                    .into_iter()
                    .find(|(c, _)| *c == Channel::L2Book)
                    .map(|(_, s)| s)
                {
                    state = SessionState::Snapshotting;
                    debug!("{exchange}: {state}");
                    for canonical in symbols {
                        let symbol = Symbol::from(canonical.as_str());
                        let native = symbol_table.to_native(&symbol);
                        let snapshot = rest.fetch_snapshot(&native, self.book_depth).await?;
                        book_engine.init_from_snapshot(
                            &symbol,
                            snapshot.bids,
                            snapshot.asks,
                            snapshot.last_update_id,
                        )?;
                        if let Some(view) = book_engine.book_view(&symbol) {
                            self.router
                                .emit(Event::BookSnapshot(BookSnapshotEvent {
                                    exchange: exchange.to_string(),
                                    symbol,
                                    timestamp: Utc::now(),
                                    bids: view.bids,
                                    asks: view.asks,
                                }))
                                .await;
                        }
                    }
                }
            }
        }

        state = SessionState::Streaming;
        debug!("{exchange}: {state}");

        loop {
            let next = tokio::time::timeout(self.idle_timeout, read.next()).await;
            let message = match next {
                Ok(Some(Ok(m))) => m,
                Ok(Some(Err(e))) => return Err(transient(exchange, e)),
                Ok(None) => return Ok(()),
                Err(_) => {
                    return Err(AggregatorError::Transient {
                        exchange: exchange.to_string(),
                        source: std::io::Error::other("idle timeout waiting for a frame"),
                    })
                }
            };

            let text = match message {
                Message::Text(t) => t.to_string(),
                Message::Binary(b) if self.dialect.uses_raw_deflate() => inflate_raw(exchange, &b)?,
                Message::Close(_) => return Ok(()),
                _ => continue,
            };

            if let Err(e) = self.process_frame(&mut book_engine, exchange, &text).await {
                if e.is_fatal_to_session() {
                    return Err(e);
                }
                warn!("{exchange}: dropping frame: {e}");
            }
        }
    }

    async fn process_frame(
        &self,
        book_engine: &mut BookEngine,
        exchange: &str,
        text: &str,
    ) -> Result<(), AggregatorError> {
        let frame = self.dialect.parse_frame(text)?;

        match frame {
            ParsedFrame::Control => {}
            ParsedFrame::Trade(t) => self.router.emit(Event::Trade(t)).await,
            ParsedFrame::Ticker(t) => self.router.emit(Event::Ticker(t)).await,
            ParsedFrame::Funding(f) => self.router.emit(Event::Funding(f)).await,
            ParsedFrame::Order(o) => self.router.emit(Event::Order(o)).await,
            ParsedFrame::Position(p) => self.router.emit(Event::Position(p)).await,
            ParsedFrame::Instrument(i) => self.router.emit(Event::Instrument(i)).await,
            ParsedFrame::BookSnapshot { symbol, bids, asks, last_update_id } => {
                book_engine.init_from_snapshot(&symbol, bids, asks, last_update_id)?;
                if let Some(view) = book_engine.book_view(&symbol) {
                    self.router
                        .emit(Event::BookSnapshot(BookSnapshotEvent {
                            exchange: exchange.to_string(),
                            symbol,
                            timestamp: Utc::now(),
                            bids: view.bids,
                            asks: view.asks,
                        }))
                        .await;
                }
            }
            ParsedFrame::BookDelta { symbol, first_id, final_id, bids, asks } => {
                let outcome = book_engine.apply_delta(&symbol, first_id, final_id, &bids, &asks)?;
                if outcome != DeltaOutcome::Skip {
                    if let Some(view) = book_engine.book_view(&symbol) {
                        self.router
                            .emit(Event::BookDelta(BookDeltaEvent {
                                exchange: exchange.to_string(),
                                symbol,
                                timestamp: Utc::now(),
                                bids: view.bids,
                                asks: view.asks,
                                forced: outcome == DeltaOutcome::ApplyForced,
                            }))
                            .await;
                    }
                }
            }
            ParsedFrame::BookAction { symbol, action, side, order_id, price, size } => {
                book_engine.apply_order_action(&symbol, action, side, order_id, price, size)?;
                if let Some(view) = book_engine.book_view(&symbol) {
                    self.router
                        .emit(Event::BookDelta(BookDeltaEvent {
                            exchange: exchange.to_string(),
                            symbol,
                            timestamp: Utc::now(),
                            bids: view.bids,
                            asks: view.asks,
                            forced: action == OrderBookAction::Partial,
                        }))
                        .await;
                }
            }
        }

        Ok(())
    }
}

fn transient(exchange: &str, source: impl std::fmt::Display) -> AggregatorError {
    AggregatorError::Transient {
        exchange: exchange.to_string(),
        source: std::io::Error::other(source.to_string()),
    }
}
