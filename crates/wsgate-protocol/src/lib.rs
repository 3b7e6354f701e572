//! wsgate - Shared Contracts
//!
//! The types every other wsgate crate agrees on:
//! - The uniform `Socket` capability handed to the protocol layer
//! - The `ProtocolStateMachine` that receives open/message/close events
//! - The per-connection `RequestContext` and its teardown contract
//! - Process-wide named configuration (`InitParams`)
//!
//! This crate has no I/O dependencies beyond reading a config file.

pub mod close;
pub mod config;
pub mod context;
pub mod error;
pub mod processor;
pub mod socket;

pub use close::CloseCode;
pub use config::{InitParams, keys};
pub use context::{RequestContext, SharedRequest};
pub use error::{ConfigError, FrameKind, ProcessorError, SocketError};
pub use processor::{ProcessorResult, ProtocolStateMachine};
pub use socket::{BufferLimits, SharedSocket, Socket};
