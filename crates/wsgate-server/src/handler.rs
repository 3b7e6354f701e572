//! Application message handlers.

use wsgate_protocol::{CloseCode, ProcessorResult};

use crate::session::Session;

/// Trait implemented by the application behind the dispatcher.
///
/// Each callback runs on the connection's task, one at a time per session.
/// Returning an error from `on_open` rejects the connection; errors from the
/// message callbacks are reported to the host and the session stays open.
pub trait MessageHandler: Send + Sync {
    /// A session was opened. The id is already reserved in the session
    /// table; an error releases it again before any observer is notified.
    fn on_open(&self, _session: &Session) -> ProcessorResult {
        Ok(())
    }

    fn on_text(&self, session: &Session, text: &str) -> ProcessorResult;

    fn on_binary(&self, session: &Session, bytes: &[u8]) -> ProcessorResult;

    /// The session is gone; its socket no longer accepts writes.
    fn on_close(&self, _session: &Session, _code: CloseCode) {}
}

/// Writes every frame back to the session it came from.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoHandler;

impl MessageHandler for EchoHandler {
    fn on_text(&self, session: &Session, text: &str) -> ProcessorResult {
        session.send_text(text)?;
        Ok(())
    }

    fn on_binary(&self, session: &Session, bytes: &[u8]) -> ProcessorResult {
        session.send_binary(bytes)?;
        Ok(())
    }
}
