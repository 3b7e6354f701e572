//! wsgate Server: the default protocol state machine.
//!
//! The `Dispatcher` tracks one session per open socket, forwards frames to a
//! single application `MessageHandler`, and notifies every
//! `LifecycleObserver` the extension registry holds once start-up has sealed
//! it.

pub mod dispatcher;
pub mod handler;
pub mod observer;
pub mod session;

pub use dispatcher::Dispatcher;
pub use handler::{EchoHandler, MessageHandler};
pub use observer::{LifecycleObserver, LifecycleObserverCapability, LoggingObserver, OBSERVER_MARKER};
pub use session::Session;
