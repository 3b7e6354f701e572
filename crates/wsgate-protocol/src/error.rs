//! Error types shared across the connection path.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Configuration that could not be read or parsed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for `{key}`: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("malformed init param {0:?}, expected key=value")]
    MalformedPair(String),

    #[error("init param `{0}` must be a string, number or boolean")]
    UnsupportedValue(String),

    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config is not a JSON object of init params: {0}")]
    Json(#[from] serde_json::Error),
}

/// Which kind of frame an operation concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Text,
    Binary,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Binary => f.write_str("binary"),
        }
    }
}

/// Failure writing to a connection through the [`Socket`](crate::Socket) capability.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("socket is closed")]
    Closed,

    #[error("{kind} frame of {size} bytes exceeds the {limit} byte buffer limit")]
    FrameTooLarge {
        kind: FrameKind,
        size: usize,
        limit: usize,
    },

    #[error("outbound channel unavailable: {0}")]
    Outbound(String),
}

/// Failure raised by a [`ProtocolStateMachine`](crate::ProtocolStateMachine) entry point.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("connection rejected: {0}")]
    Rejected(String),

    #[error("no open session for socket {0}")]
    UnknownSession(String),

    #[error("invalid range {offset}..{offset}+{length} for a {len} byte frame")]
    InvalidRange {
        offset: usize,
        length: usize,
        len: usize,
    },

    #[error("application handler failed: {0}")]
    Handler(String),

    #[error(transparent)]
    Socket(#[from] SocketError),
}
