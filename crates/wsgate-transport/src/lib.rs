//! wsgate Transport Layer
//!
//! Binds physical connections to the protocol state machine:
//! - `ConnectionAdapter` turns one connection's open/message/close callbacks
//!   into `ProtocolStateMachine` calls, guarding dispatch on a successful
//!   open and guaranteeing request teardown on close
//! - `HostSocket` is the uniform `Socket` over a host outbound channel
//! - `TransportServer` is the axum WebSocket host that drives adapters,
//!   applies buffer limits and runs the idle-timeout detector
//!
//! The adapter is host-agnostic; the server is the one host shipped here.

pub mod adapter;
pub mod config;
pub mod error;
pub mod request;
pub mod server;
pub mod socket;

pub use adapter::{ConnectionAdapter, ConnectionHandler, ConnectionState};
pub use config::{AdapterConfig, NO_TIMEOUT};
pub use error::{AdapterError, TransportError};
pub use request::UpgradeRequest;
pub use server::{ChannelOutbound, TransportConfig, TransportServer};
pub use socket::{HostSocket, Outbound};
