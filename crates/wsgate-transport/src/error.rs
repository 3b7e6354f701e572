//! Transport error types.

use thiserror::Error;
use wsgate_protocol::ProcessorError;

use crate::adapter::ConnectionState;

/// Returned to the host from message callbacks.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{event} received while connection is {state}")]
    InvalidState {
        event: &'static str,
        state: ConnectionState,
    },

    #[error("dispatch failed: {0}")]
    Dispatch(#[source] ProcessorError),
}

/// Failure starting the transport server.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid bind address {0:?}")]
    InvalidAddress(String, #[source] std::net::AddrParseError),

    #[error("failed to bind listener: {0}")]
    Bind(#[from] std::io::Error),
}
