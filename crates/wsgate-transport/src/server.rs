//! WebSocket host using Axum.
//!
//! Accepts upgrades, builds one `ConnectionAdapter` per connection and
//! drives it from the connection task: frames are delivered to the adapter
//! in arrival order, writes go through an unbounded channel drained by a
//! separate writer task, and the idle-timeout detector closes connections
//! that stay silent past the adapter's read timeout.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Router,
    extract::{
        ConnectInfo, OriginalUri, State, WebSocketUpgrade,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, error, info, info_span, warn};
use wsgate_protocol::{CloseCode, InitParams, ProtocolStateMachine, SharedRequest, SocketError};

use crate::adapter::{ConnectionAdapter, ConnectionHandler};
use crate::error::TransportError;
use crate::request::UpgradeRequest;
use crate::socket::Outbound;

/// How long a closed connection's writer may take to flush queued frames.
const WRITER_DRAIN: Duration = Duration::from_secs(5);

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port to listen on (0 for OS-assigned)
    pub port: u16,
    /// Hostname to bind to
    pub hostname: String,
    /// Path WebSocket upgrades are served on
    pub path: String,
    /// Maximum concurrent connections
    pub max_connections: Option<usize>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 7070,
            hostname: "127.0.0.1".into(),
            path: "/ws".into(),
            max_connections: Some(256),
        }
    }
}

/// Shared state for the transport server.
struct AppState {
    processor: Arc<dyn ProtocolStateMachine>,
    params: InitParams,
    config: TransportConfig,
    client_count: AtomicUsize,
}

/// The transport server: accepts WebSocket connections and drives their
/// adapters.
pub struct TransportServer {
    /// Shutdown signal
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Server task handle
    handle: Option<tokio::task::JoinHandle<()>>,
    /// Actual bound port
    port: u16,
}

impl TransportServer {
    /// Bind and start serving. `params` is the process-wide configuration
    /// every adapter resolves its snapshot from.
    pub async fn start(
        config: TransportConfig,
        params: InitParams,
        processor: Arc<dyn ProtocolStateMachine>,
    ) -> Result<Self, TransportError> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let address = format!("{}:{}", config.hostname, config.port);
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| TransportError::InvalidAddress(address.clone(), e))?;

        let state = Arc::new(AppState {
            processor,
            params,
            config: config.clone(),
            client_count: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route(&config.path, get(ws_upgrade_handler))
            .route("/health", get(health_handler))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let actual_port = listener.local_addr()?.port();

        info!("wsgate listening on ws://{}:{}{}", config.hostname, actual_port, config.path);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .ok();
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            port: actual_port,
        })
    }

    /// Get the actual bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Gracefully stop the server.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("wsgate transport server stopped");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outbound channel
// ─────────────────────────────────────────────────────────────────────────────

/// Outbound side of an axum connection: frames are queued for the writer
/// task and never block the caller.
#[derive(Debug, Clone)]
pub struct ChannelOutbound {
    tx: mpsc::UnboundedSender<Message>,
}

impl ChannelOutbound {
    pub fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self { tx }
    }

    fn push(&self, message: Message) -> Result<(), SocketError> {
        self.tx
            .send(message)
            .map_err(|_| SocketError::Outbound("connection writer has stopped".into()))
    }
}

impl Outbound for ChannelOutbound {
    fn send_text(&self, text: &str) -> Result<(), SocketError> {
        self.push(Message::Text(text.to_owned().into()))
    }

    fn send_binary(&self, bytes: &[u8]) -> Result<(), SocketError> {
        self.push(Message::Binary(Bytes::copy_from_slice(bytes)))
    }

    fn send_close(&self, code: CloseCode) -> Result<(), SocketError> {
        self.push(close_message(code, ""))
    }
}

fn close_message(code: CloseCode, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code: code.code(),
        reason: Utf8Bytes::from_static(reason),
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    // Check connection limit
    if let Some(max) = state.config.max_connections {
        let current = state.client_count.load(Ordering::Relaxed);
        if current >= max {
            warn!("Connection rejected: max connections reached ({max})");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    }

    let request = headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
        .fold(
            UpgradeRequest::new(uri.path()).with_remote_addr(remote),
            |request, (name, value)| request.with_header(name, value),
        );
    let request: SharedRequest = Arc::new(request);

    let span = info_span!("connection", id = %request.id(), %remote);
    let adapter = match ConnectionAdapter::<ChannelOutbound>::new(
        request.clone(),
        &state.params,
        state.processor.clone(),
    ) {
        Ok(adapter) => adapter.with_span(span.clone()),
        Err(e) => {
            error!(parent: &span, "invalid connection configuration: {e}");
            request.destroy();
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut ws = ws;
    if let Some(limit) = adapter.config().buffer_limits().max() {
        ws = ws.max_message_size(limit).max_frame_size(limit);
    }

    ws.on_upgrade(move |socket| run_connection(socket, adapter, state).instrument(span))
        .into_response()
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "clients": state.client_count.load(Ordering::Relaxed),
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket Connection Handler
// ─────────────────────────────────────────────────────────────────────────────

async fn run_connection(
    socket: WebSocket,
    mut adapter: ConnectionAdapter<ChannelOutbound>,
    state: Arc<AppState>,
) {
    state.client_count.fetch_add(1, Ordering::Relaxed);
    info!("Client connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(
        async move {
            while let Some(message) = out_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = ws_tx.send(message).await {
                    debug!("Write failed: {e}");
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = ws_tx.close().await;
        }
        .in_current_span(),
    );

    adapter.on_open(ChannelOutbound::new(out_tx.clone()));
    let idle = adapter.idle_timeout();

    let code = loop {
        let next = match idle {
            Some(limit) => match tokio::time::timeout(limit, ws_rx.next()).await {
                Ok(next) => next,
                Err(_) => {
                    info!("Idle timeout after {}s", limit.as_secs());
                    let _ = out_tx.send(close_message(CloseCode::GOING_AWAY, "idle timeout"));
                    break CloseCode::GOING_AWAY;
                }
            },
            None => ws_rx.next().await,
        };

        let result = match next {
            Some(Ok(Message::Text(text))) => adapter.on_text(text.as_str()),
            Some(Ok(Message::Binary(bytes))) => adapter.on_binary(&bytes),
            Some(Ok(Message::Ping(data))) => {
                let _ = out_tx.send(Message::Pong(data));
                Ok(())
            }
            Some(Ok(Message::Pong(_))) => Ok(()),
            Some(Ok(Message::Close(frame))) => {
                break frame.map_or(CloseCode::NO_STATUS, |f| CloseCode(f.code));
            }
            Some(Err(e)) => {
                warn!("WebSocket error: {e}");
                break CloseCode::ABNORMAL;
            }
            None => break CloseCode::ABNORMAL,
        };

        if let Err(e) = result {
            warn!("Message callback failed: {e}");
        }
    };

    adapter.on_close(code);
    drop(adapter);
    drop(out_tx);

    // Sockets the application still holds keep the channel open; do not
    // wait on them forever.
    let mut writer = writer;
    if tokio::time::timeout(WRITER_DRAIN, &mut writer).await.is_err() {
        writer.abort();
    }

    let remaining = state.client_count.fetch_sub(1, Ordering::Relaxed) - 1;
    info!("Client disconnected: code {code} (total: {remaining})");
}
