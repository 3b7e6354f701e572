//! Connection lifecycle observers.
//!
//! Observers are extensions: they are declared as [`ExtensionClass`]es under
//! [`OBSERVER_MARKER`], registered at start-up under
//! [`LifecycleObserverCapability`], and read by the dispatcher from the
//! sealed registry.

use std::sync::Arc;

use tracing::{debug, info};
use wsgate_extension::{Capability, ExtensionClass};
use wsgate_protocol::CloseCode;

use crate::session::Session;

/// Marker under which lifecycle observer classes are discovered.
pub const OBSERVER_MARKER: &str = "connection-lifecycle-observer";

/// Notified as sessions open, close and are discarded.
pub trait LifecycleObserver: Send + Sync {
    fn on_open(&self, _session: &Session) {}

    fn on_close(&self, _session: &Session, _code: CloseCode) {}

    /// The session has left the dispatcher's table. Always follows
    /// `on_close` for the same session.
    fn on_destroy(&self, _session: &Session) {}
}

pub struct LifecycleObserverCapability;

impl Capability for LifecycleObserverCapability {
    type Object = dyn LifecycleObserver;
    const NAME: &'static str = "connection-lifecycle-observer";
}

/// Logs every session transition.
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl LoggingObserver {
    pub fn class() -> ExtensionClass {
        ExtensionClass::of_default::<Self>("logging-observer")
            .provides::<LifecycleObserverCapability>(|o| o as Arc<dyn LifecycleObserver>)
            .build()
    }
}

impl LifecycleObserver for LoggingObserver {
    fn on_open(&self, session: &Session) {
        info!(session = session.id(), path = session.path(), "session opened");
    }

    fn on_close(&self, session: &Session, code: CloseCode) {
        info!(
            session = session.id(),
            %code,
            frames = session.received(),
            age_ms = session.age().as_millis() as u64,
            "session closed"
        );
    }

    fn on_destroy(&self, session: &Session) {
        debug!(session = session.id(), "session destroyed");
    }
}
