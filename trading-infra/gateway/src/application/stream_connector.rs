use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use trading_core::{ExchangeMessage, MessageKind, Symbol};

use crate::domain::{ConnectionState, Decoded, SessionKeyError, SessionKeyProvider, WsRequest};
use crate::infrastructure::{FrameCodec, WsClient, WsError, WsFrame, WsReader, WsWriter};

use super::config::ConnectorConfig;
use super::rate_limiter::TokenBucket;

/// Longest slice of a malformed frame echoed into the log
const MAX_LOGGED_FRAME: usize = 256;

#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("Connector cancelled")]
    Cancelled,
    #[error("Output queue closed")]
    OutputClosed,
    #[error("Listen loop already running")]
    AlreadyRunning,
    #[error("Transport error: {0}")]
    Transport(#[from] WsError),
    #[error("Session key error: {0}")]
    SessionKey(#[from] SessionKeyError),
}

impl ConnectorError {
    /// Transport and session failures are retried; the rest end the connector
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConnectorError::Transport(_) | ConnectorError::SessionKey(_))
    }
}

/// Subscription and session state. Never held across an await.
#[derive(Default)]
struct Shared {
    /// Desired stream set; the union of everything ever subscribed
    streams: BTreeSet<String>,
    /// Replay log, one request per call that added new streams
    requests: Vec<WsRequest>,
    /// Control requests awaiting an ack, by id
    pending: HashMap<u64, Vec<String>>,
    session_key: Option<String>,
}

struct Inner {
    config: ConnectorConfig,
    codec: FrameCodec,
    ws: WsClient,
    session: Option<Arc<dyn SessionKeyProvider>>,
    shared: RwLock<Shared>,
    /// Write half of the live socket; also serialises control frames
    writer: Mutex<Option<WsWriter>>,
    output: mpsc::Sender<ExchangeMessage>,
    state: watch::Sender<ConnectionState>,
    /// Bumped every time a connection reaches `Streaming`
    generation: watch::Sender<u64>,
    session_ready: watch::Sender<bool>,
    refresh_now: Notify,
    reconnect_tx: mpsc::Sender<()>,
    reconnect_rx: Mutex<Option<mpsc::Receiver<()>>>,
    epoch: Instant,
    last_frame_ms: AtomicU64,
    request_id: AtomicU64,
    output_full_logged: AtomicBool,
    limiter: TokenBucket,
    cancel: CancellationToken,
}

/// Resilient push-feed connection for one exchange
///
/// Owns a single WebSocket at a time and keeps it alive across network
/// failures, idle sockets and session-key expiry. Every stream ever
/// subscribed is replayed on each new socket, and decoded messages are
/// forwarded to the shared output queue.
///
/// ```text
/// Disconnected -> [AwaitingSessionKey] -> Connecting -> Subscribing -> Streaming
///                          ^                                             |
///                          +------------- Reconnecting <-----------------+
/// ```
#[derive(Clone)]
pub struct StreamConnector {
    inner: Arc<Inner>,
}

impl StreamConnector {
    pub fn new(
        config: ConnectorConfig,
        output: mpsc::Sender<ExchangeMessage>,
        cancel: CancellationToken,
    ) -> Self {
        Self::build(config, output, cancel, None)
    }

    /// Connector whose socket path carries a session key from `provider`
    pub fn with_session(
        config: ConnectorConfig,
        output: mpsc::Sender<ExchangeMessage>,
        cancel: CancellationToken,
        provider: Arc<dyn SessionKeyProvider>,
    ) -> Self {
        Self::build(config, output, cancel, Some(provider))
    }

    fn build(
        config: ConnectorConfig,
        output: mpsc::Sender<ExchangeMessage>,
        cancel: CancellationToken,
        session: Option<Arc<dyn SessionKeyProvider>>,
    ) -> Self {
        let (reconnect_tx, reconnect_rx) = mpsc::channel(1);
        let codec = FrameCodec::new(config.exchange.clone());
        let limiter = TokenBucket::per_second(config.control_frames_per_second);
        StreamConnector {
            inner: Arc::new(Inner {
                codec,
                ws: WsClient::new().with_connect_timeout(config.connect_timeout),
                session,
                shared: RwLock::new(Shared::default()),
                writer: Mutex::new(None),
                output,
                state: watch::Sender::new(ConnectionState::Disconnected),
                generation: watch::Sender::new(0),
                session_ready: watch::Sender::new(false),
                refresh_now: Notify::new(),
                reconnect_tx,
                reconnect_rx: Mutex::new(Some(reconnect_rx)),
                epoch: Instant::now(),
                last_frame_ms: AtomicU64::new(0),
                request_id: AtomicU64::new(1),
                output_full_logged: AtomicBool::new(false),
                limiter,
                cancel,
                config,
            }),
        }
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Number of connections that have reached `Streaming` so far
    pub fn generation(&self) -> u64 {
        *self.inner.generation.borrow()
    }

    pub fn generation_changes(&self) -> watch::Receiver<u64> {
        self.inner.generation.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_live()
    }

    pub fn desired_streams(&self) -> Vec<String> {
        self.inner.shared.read().streams.iter().cloned().collect()
    }

    pub fn session_key(&self) -> Option<String> {
        self.inner.shared.read().session_key.clone()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    /// Subscribe `symbols`, spawn the background tasks and wait for the
    /// first connection to finish its subscriptions.
    ///
    /// Returns the handle of the listen task.
    pub async fn start(
        &self,
        symbols: &[Symbol],
    ) -> Result<JoinHandle<Result<(), ConnectorError>>, ConnectorError> {
        self.subscribe_book_tickers(symbols).await?;
        self.subscribe_trades(symbols).await?;

        if let Some(provider) = self.inner.session.clone() {
            let this = self.clone();
            tokio::spawn(async move { this.run_session_refresh(provider).await });
        }
        let this = self.clone();
        tokio::spawn(async move { this.run_idle_watchdog().await });

        let this = self.clone();
        let mut listen = tokio::spawn(async move { this.listen().await });

        let mut generation = self.generation_changes();
        tokio::select! {
            _ = self.inner.cancel.cancelled() => Err(ConnectorError::Cancelled),
            ready = generation.wait_for(|g| *g > 0) => match ready {
                Ok(_) => Ok(listen),
                Err(_) => Err(ConnectorError::Cancelled),
            },
            finished = &mut listen => match finished {
                Ok(Err(e)) => Err(e),
                _ => Err(ConnectorError::Cancelled),
            },
        }
    }

    /// Connection-owning loop. Runs until cancellation (`Ok`) or until the
    /// output queue is closed.
    pub async fn listen(&self) -> Result<(), ConnectorError> {
        let mut reconnect_rx = self
            .inner
            .reconnect_rx
            .lock()
            .await
            .take()
            .ok_or(ConnectorError::AlreadyRunning)?;

        let result = self.connection_loop(&mut reconnect_rx).await;

        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            let _ = writer.close().await;
        }
        self.set_state(ConnectionState::Disconnected);
        *self.inner.reconnect_rx.lock().await = Some(reconnect_rx);

        match result {
            Err(ConnectorError::Cancelled) => {
                info!(exchange = %self.inner.config.exchange, "connector stopped");
                Ok(())
            }
            other => other,
        }
    }

    async fn connection_loop(
        &self,
        reconnect_rx: &mut mpsc::Receiver<()>,
    ) -> Result<(), ConnectorError> {
        let exchange = &self.inner.config.exchange;
        loop {
            if self.inner.session.is_some() {
                self.set_state(ConnectionState::AwaitingSessionKey);
                self.wait_session_ready().await?;
            }

            self.set_state(ConnectionState::Connecting);
            let url = self.inner.config.stream_url(self.session_key().as_deref());
            let connected = tokio::select! {
                _ = self.inner.cancel.cancelled() => return Err(ConnectorError::Cancelled),
                connected = self.inner.ws.connect(&url) => connected,
            };

            match connected {
                Ok((writer, reader)) => {
                    info!(%exchange, "connected");
                    match self.run_connection(writer, reader, reconnect_rx).await {
                        Ok(()) => {}
                        Err(e) if e.is_retryable() => {
                            warn!(%exchange, error = %e, "connection lost");
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => warn!(%exchange, error = %e, "connect failed"),
            }

            if let Some(mut writer) = self.inner.writer.lock().await.take() {
                let _ = writer.close().await;
            }
            self.set_state(ConnectionState::Reconnecting);
            debug!(%exchange, delay_ms = self.inner.config.retry_delay.as_millis() as u64, "reconnecting");
            tokio::select! {
                _ = self.inner.cancel.cancelled() => return Err(ConnectorError::Cancelled),
                _ = tokio::time::sleep(self.inner.config.retry_delay) => {}
            }
        }
    }

    /// Replay subscriptions on a fresh socket, then pump frames until it
    /// fails or a reconnect is requested.
    async fn run_connection(
        &self,
        mut writer: WsWriter,
        mut reader: WsReader,
        reconnect_rx: &mut mpsc::Receiver<()>,
    ) -> Result<(), ConnectorError> {
        // signals raised against the previous socket are stale
        while reconnect_rx.try_recv().is_ok() {}

        self.set_state(ConnectionState::Subscribing);
        self.touch();
        {
            let mut slot = self.inner.writer.lock().await;
            let replay: Vec<WsRequest> = {
                let mut shared = self.inner.shared.write();
                shared.pending.clear();
                let replay: Vec<WsRequest> = shared
                    .requests
                    .iter()
                    .map(|req| req.with_id(self.next_id()))
                    .collect();
                for req in &replay {
                    shared.pending.insert(req.id(), req.params().to_vec());
                }
                replay
            };
            for req in &replay {
                self.throttle().await?;
                writer.send(req).await?;
            }
            debug!(requests = replay.len(), "subscriptions replayed");
            *slot = Some(writer);
        }

        self.set_state(ConnectionState::Streaming);
        self.touch();
        self.inner.generation.send_modify(|g| *g += 1);
        info!(
            exchange = %self.inner.config.exchange,
            streams = self.inner.shared.read().streams.len(),
            "streaming"
        );

        loop {
            let frame = tokio::select! {
                _ = self.inner.cancel.cancelled() => return Err(ConnectorError::Cancelled),
                Some(()) = reconnect_rx.recv() => {
                    info!("reconnect requested");
                    return Ok(());
                }
                frame = reader.next_frame() => frame,
            };

            match frame {
                None => {
                    warn!("stream ended");
                    return Ok(());
                }
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(WsFrame::Closed)) => {
                    warn!("server closed the connection");
                    return Ok(());
                }
                Some(Ok(WsFrame::Heartbeat)) => self.touch(),
                Some(Ok(WsFrame::Text(text))) => {
                    self.touch();
                    self.handle_text(&text).await?;
                }
            }
        }
    }

    async fn handle_text(&self, text: &str) -> Result<(), ConnectorError> {
        match self.inner.codec.decode(text, Utc::now()) {
            Ok(Decoded::Messages(messages)) => {
                for message in messages {
                    if self.inner.config.split_book_ticker && message.kind() == MessageKind::Bbo {
                        for half in message.split_bbo() {
                            self.emit(half).await?;
                        }
                    } else {
                        self.emit(message).await?;
                    }
                }
            }
            Ok(Decoded::Ack { id, .. }) => {
                let acked = self.inner.shared.write().pending.remove(&id);
                match acked {
                    Some(streams) => debug!(id, ?streams, "subscription acknowledged"),
                    None => trace!(id, "ack for unknown request"),
                }
            }
            Ok(Decoded::Rejected { id, code, msg }) => {
                if let Some(id) = id {
                    self.inner.shared.write().pending.remove(&id);
                }
                warn!(?id, code, msg = %msg, "control request rejected");
            }
            Ok(Decoded::SessionExpired) => {
                if self.inner.session.is_some() {
                    warn!("session key expired, refreshing");
                    self.inner.refresh_now.notify_one();
                } else {
                    warn!("session expiry on a connector without a session provider");
                }
            }
            Err(e) => {
                let shown: String = text.chars().take(MAX_LOGGED_FRAME).collect();
                warn!(error = %e, frame = %shown, "dropping undecodable frame");
            }
        }
        Ok(())
    }

    /// Forward one message downstream, waiting out a full queue
    async fn emit(&self, message: ExchangeMessage) -> Result<(), ConnectorError> {
        let message = match self.inner.output.try_send(message) {
            Ok(()) => {
                self.inner.output_full_logged.store(false, Ordering::Relaxed);
                return Ok(());
            }
            Err(mpsc::error::TrySendError::Closed(_)) => return Err(ConnectorError::OutputClosed),
            Err(mpsc::error::TrySendError::Full(message)) => message,
        };
        if !self.inner.output_full_logged.swap(true, Ordering::Relaxed) {
            warn!(
                capacity = self.inner.output.max_capacity(),
                "output queue full, applying backpressure"
            );
        }
        tokio::select! {
            _ = self.inner.cancel.cancelled() => Err(ConnectorError::Cancelled),
            sent = self.inner.output.send(message) => sent.map_err(|_| ConnectorError::OutputClosed),
        }
    }

    pub async fn subscribe_book_tickers(&self, symbols: &[Symbol]) -> Result<Option<u64>, ConnectorError> {
        let streams = symbols
            .iter()
            .map(|s| self.inner.config.book_ticker_stream(s.as_str()))
            .collect();
        self.subscribe_streams(streams).await
    }

    pub async fn subscribe_trades(&self, symbols: &[Symbol]) -> Result<Option<u64>, ConnectorError> {
        let streams = symbols
            .iter()
            .map(|s| self.inner.config.trade_stream(s.as_str()))
            .collect();
        self.subscribe_streams(streams).await
    }

    /// Add `streams` to the desired set
    ///
    /// Only streams not already desired are sent, as one control frame, and
    /// recorded for replay. Returns the request id, or `None` when nothing
    /// was new. Without a live socket the request is only recorded.
    pub async fn subscribe_streams(&self, streams: Vec<String>) -> Result<Option<u64>, ConnectorError> {
        let mut slot = self.inner.writer.lock().await;
        let request = {
            let mut shared = self.inner.shared.write();
            let fresh: Vec<String> = streams
                .into_iter()
                .filter(|s| shared.streams.insert(s.clone()))
                .collect();
            if fresh.is_empty() {
                return Ok(None);
            }
            let request = WsRequest::subscribe(self.next_id(), fresh);
            shared.requests.push(request.clone());
            if slot.is_some() {
                shared.pending.insert(request.id(), request.params().to_vec());
            }
            request
        };

        if let Some(writer) = slot.as_mut() {
            self.throttle().await?;
            if let Err(e) = writer.send(&request).await {
                // recorded above, so the next socket replays it
                warn!(error = %e, id = request.id(), "subscribe send failed");
                self.request_reconnect();
            }
        }
        Ok(Some(request.id()))
    }

    /// Ask the listen loop to drop the current socket and reconnect
    pub fn request_reconnect(&self) {
        let _ = self.inner.reconnect_tx.try_send(());
    }

    /// Time since the last inbound frame on the current socket
    pub fn idle_for(&self) -> Duration {
        let now = self.inner.epoch.elapsed().as_millis() as u64;
        let last = self.inner.last_frame_ms.load(Ordering::Relaxed);
        Duration::from_millis(now.saturating_sub(last))
    }

    async fn run_idle_watchdog(self) {
        let timeout = self.inner.config.idle_timeout;
        let mut ticker = tokio::time::interval((timeout / 4).max(Duration::from_millis(10)));
        loop {
            tokio::select! {
                _ = self.inner.cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            if !self.state().is_live() {
                continue;
            }
            let idle = self.idle_for();
            if idle > timeout {
                warn!(idle_ms = idle.as_millis() as u64, "no frames within idle timeout, forcing reconnect");
                self.touch();
                self.request_reconnect();
            }
        }
    }

    /// Obtain the session key, then keep it alive on a fixed cadence.
    ///
    /// Opens the session gate after the first success. A changed key while a
    /// socket is up forces a reconnect so the new key takes effect.
    async fn run_session_refresh(self, provider: Arc<dyn SessionKeyProvider>) {
        let config = &self.inner.config;
        let mut force_new = false;
        loop {
            let current = if force_new { None } else { self.session_key() };
            let refreshed = tokio::select! {
                _ = self.inner.cancel.cancelled() => return,
                refreshed = obtain_session_key(provider.as_ref(), current) => refreshed,
            };

            let wait = match refreshed {
                Ok(key) => {
                    let changed = {
                        let mut shared = self.inner.shared.write();
                        let changed = shared.session_key.as_deref() != Some(key.as_str());
                        shared.session_key = Some(key);
                        changed
                    };
                    self.inner.session_ready.send_if_modified(|ready| !std::mem::replace(ready, true));
                    if (changed || force_new) && self.state().has_socket() {
                        info!("session key replaced, reconnecting");
                        self.request_reconnect();
                    }
                    force_new = false;
                    config.session_refresh_interval
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_ms = config.session_retry_delay.as_millis() as u64,
                        "session key refresh failed"
                    );
                    config.session_retry_delay
                }
            };

            tokio::select! {
                _ = self.inner.cancel.cancelled() => return,
                _ = tokio::time::sleep(wait) => {}
                _ = self.inner.refresh_now.notified() => force_new = true,
            }
        }
    }

    async fn wait_session_ready(&self) -> Result<(), ConnectorError> {
        let mut ready = self.inner.session_ready.subscribe();
        tokio::select! {
            _ = self.inner.cancel.cancelled() => Err(ConnectorError::Cancelled),
            gate = ready.wait_for(|r| *r) => gate.map(|_| ()).map_err(|_| ConnectorError::Cancelled),
        }
    }

    async fn throttle(&self) -> Result<(), ConnectorError> {
        tokio::select! {
            _ = self.inner.cancel.cancelled() => Err(ConnectorError::Cancelled),
            _ = self.inner.limiter.acquire(1) => Ok(()),
        }
    }

    fn set_state(&self, next: ConnectionState) {
        let changed = self.inner.state.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
        if changed {
            debug!(exchange = %self.inner.config.exchange, state = %next, "state change");
        }
    }

    fn touch(&self) {
        let now = self.inner.epoch.elapsed().as_millis() as u64;
        self.inner.last_frame_ms.store(now, Ordering::Relaxed);
    }

    fn next_id(&self) -> u64 {
        self.inner.request_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Extend `current` if there is one, otherwise (or if that fails) create a
/// new key
async fn obtain_session_key(
    provider: &dyn SessionKeyProvider,
    current: Option<String>,
) -> Result<String, SessionKeyError> {
    if let Some(key) = current {
        match provider.keepalive_session_key(&key).await {
            Ok(()) => return Ok(key),
            Err(e) => warn!(error = %e, "session keepalive failed, creating a new key"),
        }
    }
    let key = provider.create_session_key().await?;
    if key.is_empty() {
        return Err(SessionKeyError::EmptyKey);
    }
    Ok(key)
}
