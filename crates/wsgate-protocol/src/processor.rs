//! Protocol state machine contract.

use crate::close::CloseCode;
use crate::context::SharedRequest;
use crate::error::ProcessorError;
use crate::socket::SharedSocket;

pub type ProcessorResult = Result<(), ProcessorError>;

/// Interprets connection events as application-level protocol events.
///
/// All entry points are synchronous and run on the host's connection task.
/// For a given socket the host calls them in order: `open`, any number of
/// dispatches, then `close`.
pub trait ProtocolStateMachine: Send + Sync + 'static {
    fn open(&self, socket: SharedSocket, request: SharedRequest) -> ProcessorResult;

    fn close(&self, socket: &SharedSocket, code: CloseCode) -> ProcessorResult;

    /// Dispatch `bytes[offset..offset + length]` as one binary message.
    fn dispatch_binary(
        &self,
        socket: &SharedSocket,
        bytes: &[u8],
        offset: usize,
        length: usize,
    ) -> ProcessorResult;

    fn dispatch_text(&self, socket: &SharedSocket, text: &str) -> ProcessorResult;
}
