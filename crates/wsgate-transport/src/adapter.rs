//! Connection adapter: one physical connection bound to the protocol
//! state machine.
//!
//! Lifecycle: `Created → Open → (message)* → Closed`, or
//! `Created → OpenFailed → Closed` when the protocol layer rejects the open.
//! `Closed` is terminal.
//!
//! The host calls the adapter through [`ConnectionHandler`], one callback at
//! a time; every callback takes `&mut self`, so the adapter needs no lock.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use tracing::{Span, debug, trace, warn};
use wsgate_protocol::{
    CloseCode, ConfigError, InitParams, ProcessorError, ProcessorResult, ProtocolStateMachine,
    SharedRequest, SharedSocket,
};

use crate::config::AdapterConfig;
use crate::error::AdapterError;
use crate::socket::{HostSocket, Outbound};

/// Callbacks a host delivers for one connection.
pub trait ConnectionHandler: Send {
    type Outbound: Outbound;

    /// The handshake completed; `outbound` is the connection's write side.
    fn on_open(&mut self, outbound: Self::Outbound);

    fn on_binary(&mut self, frame: &[u8]) -> Result<(), AdapterError>;

    fn on_text(&mut self, frame: &str) -> Result<(), AdapterError>;

    fn on_close(&mut self, code: CloseCode);

    /// Idle timeout in seconds for the host's detector, or `-1`.
    fn read_timeout(&self) -> i64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Created,
    Open,
    OpenFailed,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Open => "open",
            Self::OpenFailed => "open-failed",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Adapts one host connection to the [`ProtocolStateMachine`].
pub struct ConnectionAdapter<O: Outbound> {
    config: AdapterConfig,
    processor: Arc<dyn ProtocolStateMachine>,
    request: SharedRequest,
    state: ConnectionState,
    socket: Option<Arc<HostSocket<O>>>,
    span: Span,
}

impl<O: Outbound> ConnectionAdapter<O> {
    /// Resolve the configuration snapshot from `params` and build the
    /// adapter in the `Created` state.
    pub fn new(
        request: SharedRequest,
        params: &InitParams,
        processor: Arc<dyn ProtocolStateMachine>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::with_config(request, AdapterConfig::resolve(params)?, processor))
    }

    pub fn with_config(
        request: SharedRequest,
        config: AdapterConfig,
        processor: Arc<dyn ProtocolStateMachine>,
    ) -> Self {
        Self {
            config,
            processor,
            request,
            state: ConnectionState::Created,
            socket: None,
            span: Span::current(),
        }
    }

    /// Emit this connection's records under `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn id(&self) -> &str {
        self.request.id()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.config.idle_timeout()
    }

    /// The connection's socket, once `on_open` has run.
    pub fn socket(&self) -> Option<SharedSocket> {
        self.socket.clone().map(|s| s as SharedSocket)
    }

    fn gate(&self, event: &'static str) -> Result<Option<SharedSocket>, AdapterError> {
        match (self.state, &self.socket) {
            (ConnectionState::Open, Some(socket)) => Ok(Some(socket.clone() as SharedSocket)),
            (ConnectionState::OpenFailed, _) => {
                warn!(
                    parent: &self.span,
                    connection = self.id(),
                    "{event} dropped: connection did not open successfully"
                );
                Ok(None)
            }
            (state, _) => {
                warn!(parent: &self.span, connection = self.id(), %state, "{event} out of order");
                Err(AdapterError::InvalidState { event, state })
            }
        }
    }
}

impl<O: Outbound> ConnectionHandler for ConnectionAdapter<O> {
    type Outbound = O;

    fn on_open(&mut self, outbound: O) {
        if self.state != ConnectionState::Created {
            warn!(parent: &self.span, connection = self.id(), state = %self.state, "duplicate open ignored");
            return;
        }
        trace!(parent: &self.span, connection = self.id(), "connection open");

        let socket = Arc::new(HostSocket::new(
            self.request.id(),
            outbound,
            self.config.buffer_limits(),
        ));
        self.socket = Some(socket.clone());

        let processor = &self.processor;
        let request = self.request.clone();
        match invoke(|| processor.open(socket as SharedSocket, request)) {
            Ok(()) => {
                self.state = ConnectionState::Open;
                debug!(parent: &self.span, connection = self.id(), "protocol opened");
            }
            Err(e) => {
                self.state = ConnectionState::OpenFailed;
                warn!(parent: &self.span, connection = self.id(), "failed to open connection: {e}");
            }
        }
    }

    fn on_binary(&mut self, frame: &[u8]) -> Result<(), AdapterError> {
        trace!(parent: &self.span, connection = self.id(), len = frame.len(), "binary message");
        let Some(socket) = self.gate("binary message")? else {
            return Ok(());
        };
        invoke(|| self.processor.dispatch_binary(&socket, frame, 0, frame.len()))
            .map_err(AdapterError::Dispatch)
    }

    fn on_text(&mut self, frame: &str) -> Result<(), AdapterError> {
        trace!(parent: &self.span, connection = self.id(), len = frame.len(), "text message");
        let Some(socket) = self.gate("text message")? else {
            return Ok(());
        };
        invoke(|| self.processor.dispatch_text(&socket, frame)).map_err(AdapterError::Dispatch)
    }

    fn on_close(&mut self, code: CloseCode) {
        if self.state == ConnectionState::Closed {
            debug!(parent: &self.span, connection = self.id(), "duplicate close ignored");
            return;
        }
        self.state = ConnectionState::Closed;
        debug!(parent: &self.span, connection = self.id(), %code, "connection closed");

        let _teardown = Teardown(self.request.clone());

        if let Some(socket) = &self.socket {
            socket.mark_closed();
            let socket = socket.clone() as SharedSocket;
            if let Err(e) = invoke(|| self.processor.close(&socket, code)) {
                warn!(parent: &self.span, connection = self.id(), "protocol close failed: {e}");
            }
        }
    }

    fn read_timeout(&self) -> i64 {
        self.config.read_timeout()
    }
}

impl<O: Outbound> Drop for ConnectionAdapter<O> {
    fn drop(&mut self) {
        if self.state != ConnectionState::Closed {
            debug!(parent: &self.span, connection = self.id(), state = %self.state, "adapter dropped before close");
            if let Some(socket) = &self.socket {
                socket.mark_closed();
            }
            self.request.destroy();
        }
    }
}

/// Destroys the request when dropped, including while unwinding.
struct Teardown(SharedRequest);

impl Drop for Teardown {
    fn drop(&mut self) {
        self.0.destroy();
    }
}

/// Run a protocol entry point, turning a panic into an error.
fn invoke(f: impl FnOnce() -> ProcessorResult) -> ProcessorResult {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".into());
        Err(ProcessorError::Handler(format!("panicked: {message}")))
    })
}
