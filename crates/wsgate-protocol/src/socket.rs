//! The uniform socket capability.
//!
//! A `Socket` is what the protocol layer and the application see of a
//! connection, whatever host drives it underneath.

use std::sync::Arc;

use crate::close::CloseCode;
use crate::error::SocketError;

/// Frame size limits resolved from configuration.
///
/// `None` means the host's own default applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferLimits {
    pub binary: Option<usize>,
    pub text: Option<usize>,
}

impl BufferLimits {
    /// Leave both limits to the host.
    pub fn host_default() -> Self {
        Self::default()
    }

    /// The same limit for binary and text frames.
    pub fn uniform(limit: usize) -> Self {
        Self {
            binary: Some(limit),
            text: Some(limit),
        }
    }

    /// The largest configured limit, if any.
    pub fn max(&self) -> Option<usize> {
        match (self.binary, self.text) {
            (Some(b), Some(t)) => Some(b.max(t)),
            (b, t) => b.or(t),
        }
    }
}

/// Outbound side of one connection.
///
/// Writes never block: they hand the frame to the host's outbound channel
/// and return.
pub trait Socket: Send + Sync {
    /// Identifier unique to this connection for the life of the process.
    fn id(&self) -> &str;

    fn write_text(&self, text: &str) -> Result<(), SocketError>;

    fn write_binary(&self, bytes: &[u8]) -> Result<(), SocketError>;

    /// Ask the host to close the connection with `code`.
    fn close(&self, code: CloseCode) -> Result<(), SocketError>;

    fn is_open(&self) -> bool;

    fn buffer_limits(&self) -> BufferLimits;
}

pub type SharedSocket = Arc<dyn Socket>;
