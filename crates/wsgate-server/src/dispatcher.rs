//! Dispatcher: the default protocol state machine.
//!
//! Owns the session table and routes every connection event to the
//! application handler, then to the registered lifecycle observers.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{Span, debug, info, trace};
use wsgate_extension::RegistrySnapshot;
use wsgate_protocol::{
    CloseCode, ProcessorError, ProcessorResult, ProtocolStateMachine, SharedRequest, SharedSocket,
};

use crate::handler::MessageHandler;
use crate::observer::{LifecycleObserver, LifecycleObserverCapability};
use crate::session::Session;

pub struct Dispatcher {
    /// Application handler
    handler: Box<dyn MessageHandler>,
    /// Observers read from the sealed registry, in registration order
    observers: Vec<Arc<dyn LifecycleObserver>>,
    /// Open sessions keyed by socket id
    sessions: DashMap<String, Arc<Session>>,
    span: Span,
}

impl Dispatcher {
    pub fn new<H: MessageHandler + 'static>(handler: H, registry: &RegistrySnapshot) -> Self {
        let observers = registry.instances::<LifecycleObserverCapability>();
        info!(
            observers = observers.len(),
            "Dispatcher ready ({} lifecycle observers)",
            observers.len()
        );
        Self {
            handler: Box::new(handler),
            observers,
            sessions: DashMap::new(),
            span: Span::current(),
        }
    }

    /// Emit dispatcher records under `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn session(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Send `text` to every open session. Returns how many accepted it.
    pub fn broadcast_text(&self, text: &str) -> usize {
        let sessions: Vec<Arc<Session>> = self.sessions.iter().map(|e| e.value().clone()).collect();
        sessions
            .iter()
            .filter(|session| match session.send_text(text) {
                Ok(()) => true,
                Err(e) => {
                    debug!(parent: &self.span, session = session.id(), "broadcast skipped: {e}");
                    false
                }
            })
            .count()
    }

    /// Look up the session for `socket`. The map guard is released before
    /// the handler runs.
    fn lookup(&self, socket: &SharedSocket) -> Result<Arc<Session>, ProcessorError> {
        self.session(socket.id())
            .ok_or_else(|| ProcessorError::UnknownSession(socket.id().to_string()))
    }
}

impl ProtocolStateMachine for Dispatcher {
    fn open(&self, socket: SharedSocket, request: SharedRequest) -> ProcessorResult {
        let session = Arc::new(Session::new(socket, request));
        match self.sessions.entry(session.id().to_string()) {
            Entry::Occupied(_) => {
                return Err(ProcessorError::Rejected(format!(
                    "session {} is already open",
                    session.id()
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
            }
        }

        // The shard lock is released before the handler runs.
        if let Err(err) = self.handler.on_open(&session) {
            self.sessions.remove(session.id());
            return Err(err);
        }

        for observer in &self.observers {
            observer.on_open(&session);
        }
        debug!(parent: &self.span, session = session.id(), open = self.sessions.len(), "session opened");
        Ok(())
    }

    fn close(&self, socket: &SharedSocket, code: CloseCode) -> ProcessorResult {
        let (_, session) = self
            .sessions
            .remove(socket.id())
            .ok_or_else(|| ProcessorError::UnknownSession(socket.id().to_string()))?;

        self.handler.on_close(&session, code);
        for observer in &self.observers {
            observer.on_close(&session, code);
        }
        for observer in &self.observers {
            observer.on_destroy(&session);
        }
        debug!(parent: &self.span, session = session.id(), %code, open = self.sessions.len(), "session closed");
        Ok(())
    }

    fn dispatch_binary(
        &self,
        socket: &SharedSocket,
        bytes: &[u8],
        offset: usize,
        length: usize,
    ) -> ProcessorResult {
        let session = self.lookup(socket)?;
        let frame = offset
            .checked_add(length)
            .and_then(|end| bytes.get(offset..end))
            .ok_or(ProcessorError::InvalidRange {
                offset,
                length,
                len: bytes.len(),
            })?;

        trace!(parent: &self.span, session = session.id(), len = frame.len(), "binary frame");
        session.record_frame();
        self.handler.on_binary(&session, frame)
    }

    fn dispatch_text(&self, socket: &SharedSocket, text: &str) -> ProcessorResult {
        let session = self.lookup(socket)?;

        trace!(parent: &self.span, session = session.id(), len = text.len(), "text frame");
        session.record_frame();
        self.handler.on_text(&session, text)
    }
}
