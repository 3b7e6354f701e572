//! `Socket` implementation over a host outbound channel.

use std::sync::atomic::{AtomicBool, Ordering};

use wsgate_protocol::{BufferLimits, CloseCode, FrameKind, Socket, SocketError};

/// The host's non-blocking outbound channel for one connection.
pub trait Outbound: Send + Sync + 'static {
    fn send_text(&self, text: &str) -> Result<(), SocketError>;

    fn send_binary(&self, bytes: &[u8]) -> Result<(), SocketError>;

    fn send_close(&self, code: CloseCode) -> Result<(), SocketError>;
}

/// Uniform socket wrapping an [`Outbound`] and the connection's buffer
/// limits. Frames larger than the limit are refused before they reach the
/// host.
pub struct HostSocket<O> {
    id: String,
    outbound: O,
    limits: BufferLimits,
    open: AtomicBool,
}

impl<O: Outbound> HostSocket<O> {
    pub fn new(id: impl Into<String>, outbound: O, limits: BufferLimits) -> Self {
        Self {
            id: id.into(),
            outbound,
            limits,
            open: AtomicBool::new(true),
        }
    }

    /// Mark the socket closed without sending anything; the host has
    /// already torn the connection down.
    pub(crate) fn mark_closed(&self) {
        self.open.store(false, Ordering::Release);
    }

    fn check(&self, kind: FrameKind, size: usize) -> Result<(), SocketError> {
        if !self.is_open() {
            return Err(SocketError::Closed);
        }
        let limit = match kind {
            FrameKind::Text => self.limits.text,
            FrameKind::Binary => self.limits.binary,
        };
        match limit {
            Some(limit) if size > limit => Err(SocketError::FrameTooLarge { kind, size, limit }),
            _ => Ok(()),
        }
    }
}

impl<O: Outbound> Socket for HostSocket<O> {
    fn id(&self) -> &str {
        &self.id
    }

    fn write_text(&self, text: &str) -> Result<(), SocketError> {
        self.check(FrameKind::Text, text.len())?;
        self.outbound.send_text(text)
    }

    fn write_binary(&self, bytes: &[u8]) -> Result<(), SocketError> {
        self.check(FrameKind::Binary, bytes.len())?;
        self.outbound.send_binary(bytes)
    }

    fn close(&self, code: CloseCode) -> Result<(), SocketError> {
        if self.open.swap(false, Ordering::AcqRel) {
            self.outbound.send_close(code)
        } else {
            Ok(())
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn buffer_limits(&self) -> BufferLimits {
        self.limits
    }
}
