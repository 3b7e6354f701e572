//! Connection sessions tracked by the dispatcher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use wsgate_protocol::{CloseCode, RequestContext, SharedRequest, SharedSocket, SocketError};

/// State kept for one physical connection from open to close.
pub struct Session {
    socket: SharedSocket,
    request: SharedRequest,
    opened_at: Instant,
    received: AtomicU64,
}

impl Session {
    pub fn new(socket: SharedSocket, request: SharedRequest) -> Self {
        Self {
            socket,
            request,
            opened_at: Instant::now(),
            received: AtomicU64::new(0),
        }
    }

    /// Socket id; unique among open sessions.
    pub fn id(&self) -> &str {
        self.socket.id()
    }

    /// Path the connection was upgraded on.
    pub fn path(&self) -> &str {
        self.request.path()
    }

    pub fn socket(&self) -> &SharedSocket {
        &self.socket
    }

    pub fn request(&self) -> &dyn RequestContext {
        self.request.as_ref()
    }

    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }

    /// Frames dispatched to this session so far.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub(crate) fn record_frame(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn send_text(&self, text: &str) -> Result<(), SocketError> {
        self.socket.write_text(text)
    }

    pub fn send_binary(&self, bytes: &[u8]) -> Result<(), SocketError> {
        self.socket.write_binary(bytes)
    }

    pub fn close(&self, code: CloseCode) -> Result<(), SocketError> {
        self.socket.close(code)
    }
}
