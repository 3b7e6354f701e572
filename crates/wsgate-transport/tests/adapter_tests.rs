//! Connection adapter tests: lifecycle ordering, open guard, guaranteed
//! teardown, configuration snapshot and the host socket.

#[cfg(test)]
mod tests {
    use std::fmt;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use parking_lot::Mutex;
    use tracing::field::{Field, Visit};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::Registry;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use wsgate_protocol::*;
    use wsgate_transport::*;

    // ─────────────────────────────────────────────────────────────────────
    // Fakes
    // ─────────────────────────────────────────────────────────────────────

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Open(String),
        Binary { bytes: Vec<u8>, offset: usize, length: usize },
        Text(String),
        Close(u16),
    }

    #[derive(Default, Clone, Copy)]
    enum Behaviour {
        #[default]
        Succeed,
        Fail,
        Panic,
    }

    #[derive(Default)]
    struct RecordingProcessor {
        calls: Mutex<Vec<Call>>,
        open: Behaviour,
        close: Behaviour,
        dispatch: Behaviour,
    }

    impl RecordingProcessor {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        fn act(behaviour: Behaviour, what: &str) -> ProcessorResult {
            match behaviour {
                Behaviour::Succeed => Ok(()),
                Behaviour::Fail => Err(ProcessorError::Rejected(format!("{what} refused"))),
                Behaviour::Panic => panic!("{what} exploded"),
            }
        }
    }

    impl ProtocolStateMachine for RecordingProcessor {
        fn open(&self, socket: SharedSocket, _request: SharedRequest) -> ProcessorResult {
            self.calls.lock().push(Call::Open(socket.id().to_string()));
            Self::act(self.open, "open")
        }

        fn close(&self, _socket: &SharedSocket, code: CloseCode) -> ProcessorResult {
            self.calls.lock().push(Call::Close(code.code()));
            Self::act(self.close, "close")
        }

        fn dispatch_binary(
            &self,
            _socket: &SharedSocket,
            bytes: &[u8],
            offset: usize,
            length: usize,
        ) -> ProcessorResult {
            self.calls.lock().push(Call::Binary { bytes: bytes.to_vec(), offset, length });
            Self::act(self.dispatch, "binary")
        }

        fn dispatch_text(&self, _socket: &SharedSocket, text: &str) -> ProcessorResult {
            self.calls.lock().push(Call::Text(text.to_string()));
            Self::act(self.dispatch, "text")
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Text(String),
        Binary(Vec<u8>),
        Close(u16),
    }

    #[derive(Clone, Default)]
    struct RecordingOutbound(Arc<Mutex<Vec<Sent>>>);

    impl RecordingOutbound {
        fn sent(&self) -> Vec<Sent> {
            self.0.lock().clone()
        }
    }

    impl Outbound for RecordingOutbound {
        fn send_text(&self, text: &str) -> Result<(), SocketError> {
            self.0.lock().push(Sent::Text(text.into()));
            Ok(())
        }

        fn send_binary(&self, bytes: &[u8]) -> Result<(), SocketError> {
            self.0.lock().push(Sent::Binary(bytes.to_vec()));
            Ok(())
        }

        fn send_close(&self, code: CloseCode) -> Result<(), SocketError> {
            self.0.lock().push(Sent::Close(code.code()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingRequest {
        destroyed: AtomicUsize,
    }

    impl CountingRequest {
        fn destroy_count(&self) -> usize {
            self.destroyed.load(Ordering::SeqCst)
        }
    }

    impl RequestContext for CountingRequest {
        fn id(&self) -> &str {
            "conn-1"
        }

        fn path(&self) -> &str {
            "/ws"
        }

        fn destroy(&self) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
        }

        fn is_destroyed(&self) -> bool {
            self.destroy_count() > 0
        }
    }

    struct Fixture {
        processor: Arc<RecordingProcessor>,
        request: Arc<CountingRequest>,
        outbound: RecordingOutbound,
        adapter: ConnectionAdapter<RecordingOutbound>,
    }

    fn fixture_with(processor: RecordingProcessor, params: InitParams) -> Fixture {
        let processor = Arc::new(processor);
        let request = Arc::new(CountingRequest::default());
        let adapter = ConnectionAdapter::new(
            request.clone() as SharedRequest,
            &params,
            processor.clone() as Arc<dyn ProtocolStateMachine>,
        )
        .unwrap();
        Fixture {
            processor,
            request,
            outbound: RecordingOutbound::default(),
            adapter,
        }
    }

    fn fixture(processor: RecordingProcessor) -> Fixture {
        fixture_with(processor, InitParams::new())
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<(Level, String)>>>);

    struct Message(String);

    impl Visit for Message {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{value:?}");
            }
        }
    }

    impl<S: Subscriber> Layer<S> for Captured {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut message = Message(String::new());
            event.record(&mut message);
            self.0.lock().push((*event.metadata().level(), message.0));
        }
    }

    fn warnings_during(f: impl FnOnce()) -> Vec<String> {
        let captured = Captured::default();
        tracing::subscriber::with_default(Registry::default().with(captured.clone()), f);
        let logs = captured.0.lock();
        logs.iter()
            .filter(|(l, _)| *l == Level::WARN)
            .map(|(_, m)| m.clone())
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Configuration snapshot
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn idle_timeout_is_read_from_params() {
        let f = fixture_with(
            RecordingProcessor::default(),
            InitParams::new().with(keys::IDLE_TIMEOUT_SECONDS, "30"),
        );
        assert_eq!(f.adapter.read_timeout(), 30);
        assert_eq!(f.adapter.idle_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn absent_idle_timeout_is_sentinel() {
        let f = fixture(RecordingProcessor::default());
        assert_eq!(f.adapter.read_timeout(), -1);
        assert_eq!(f.adapter.read_timeout(), NO_TIMEOUT);
        assert_eq!(f.adapter.idle_timeout(), None);
    }

    #[test]
    fn zero_idle_timeout_disables_detector() {
        let config = AdapterConfig::resolve(&InitParams::new().with(keys::IDLE_TIMEOUT_SECONDS, "0"))
            .unwrap();
        assert_eq!(config.read_timeout(), 0);
        assert_eq!(config.idle_timeout(), None);
    }

    #[test]
    fn buffer_size_applies_to_binary_and_text() {
        let mut f = fixture_with(
            RecordingProcessor::default(),
            InitParams::new().with(keys::MAX_BUFFER_SIZE_BYTES, "4096"),
        );
        let limits = f.adapter.config().buffer_limits();
        assert_eq!(limits.binary, Some(4096));
        assert_eq!(limits.text, Some(4096));

        f.adapter.on_open(f.outbound.clone());
        assert_eq!(f.adapter.socket().unwrap().buffer_limits(), BufferLimits::uniform(4096));
    }

    #[test]
    fn absent_buffer_size_leaves_host_default() {
        let f = fixture(RecordingProcessor::default());
        assert_eq!(f.adapter.config().buffer_limits(), BufferLimits::host_default());
    }

    #[test]
    fn invalid_config_fails_construction() {
        let request = Arc::new(CountingRequest::default());
        let result = ConnectionAdapter::<RecordingOutbound>::new(
            request as SharedRequest,
            &InitParams::new().with(keys::IDLE_TIMEOUT_SECONDS, "soon"),
            Arc::new(RecordingProcessor::default()) as Arc<dyn ProtocolStateMachine>,
        );
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn config_is_snapshotted_at_construction() {
        let mut params = InitParams::new().with(keys::IDLE_TIMEOUT_SECONDS, "10");
        let f = fixture_with(RecordingProcessor::default(), params.clone());
        params.insert(keys::IDLE_TIMEOUT_SECONDS, "99");
        assert_eq!(f.adapter.read_timeout(), 10);
    }

    #[test]
    fn explicit_config_bypasses_params() {
        let config = AdapterConfig::default()
            .with_idle_timeout_secs(15)
            .with_buffer_limits(BufferLimits::uniform(512));
        let request = Arc::new(CountingRequest::default());
        let mut adapter = ConnectionAdapter::with_config(
            request as SharedRequest,
            config,
            Arc::new(RecordingProcessor::default()) as Arc<dyn ProtocolStateMachine>,
        );

        assert_eq!(adapter.read_timeout(), 15);
        assert_eq!(adapter.idle_timeout(), Some(Duration::from_secs(15)));
        adapter.on_open(RecordingOutbound::default());
        assert_eq!(adapter.socket().unwrap().buffer_limits(), BufferLimits::uniform(512));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Open / message ordering
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn open_precedes_messages_in_host_order() {
        let mut f = fixture(RecordingProcessor::default());
        assert_eq!(f.adapter.state(), ConnectionState::Created);

        f.adapter.on_open(f.outbound.clone());
        f.adapter.on_text("one").unwrap();
        f.adapter.on_binary(&[1, 2]).unwrap();
        f.adapter.on_text("two").unwrap();

        assert_eq!(f.adapter.state(), ConnectionState::Open);
        assert_eq!(
            f.processor.calls(),
            vec![
                Call::Open("conn-1".into()),
                Call::Text("one".into()),
                Call::Binary { bytes: vec![1, 2], offset: 0, length: 2 },
                Call::Text("two".into()),
            ]
        );
    }

    #[test]
    fn binary_frame_forwarded_whole() {
        let mut f = fixture(RecordingProcessor::default());
        f.adapter.on_open(f.outbound.clone());

        let frame: Vec<u8> = (0..=255u8).collect();
        f.adapter.on_binary(&frame).unwrap();

        assert_eq!(
            f.processor.calls()[1],
            Call::Binary { bytes: frame.clone(), offset: 0, length: frame.len() }
        );
    }

    #[test]
    fn empty_binary_frame_forwarded() {
        let mut f = fixture(RecordingProcessor::default());
        f.adapter.on_open(f.outbound.clone());
        f.adapter.on_binary(&[]).unwrap();
        assert_eq!(f.processor.calls()[1], Call::Binary { bytes: vec![], offset: 0, length: 0 });
    }

    #[test]
    fn text_frame_forwarded_unchanged() {
        let mut f = fixture(RecordingProcessor::default());
        f.adapter.on_open(f.outbound.clone());
        f.adapter.on_text("hello").unwrap();
        f.adapter.on_text("héllo ✓").unwrap();
        assert_eq!(f.processor.calls()[1], Call::Text("hello".into()));
        assert_eq!(f.processor.calls()[2], Call::Text("héllo ✓".into()));
    }

    #[test]
    fn message_before_open_is_rejected() {
        let mut f = fixture(RecordingProcessor::default());
        let err = f.adapter.on_text("early").unwrap_err();
        assert!(matches!(
            err,
            AdapterError::InvalidState { event: "text message", state: ConnectionState::Created }
        ));
        assert!(f.processor.calls().is_empty());
    }

    #[test]
    fn failed_open_gates_all_messages() {
        let mut f = fixture(RecordingProcessor { open: Behaviour::Fail, ..Default::default() });

        let warnings = warnings_during(|| {
            f.adapter.on_open(f.outbound.clone());
            f.adapter.on_text("ignored").unwrap();
            f.adapter.on_binary(&[9]).unwrap();
        });

        assert_eq!(f.adapter.state(), ConnectionState::OpenFailed);
        assert_eq!(f.processor.calls(), vec![Call::Open("conn-1".into())]);
        assert!(warnings.iter().any(|w| w.contains("failed to open connection")));
        assert_eq!(warnings.iter().filter(|w| w.contains("dropped")).count(), 2);
    }

    #[test]
    fn panicking_open_is_treated_as_failure() {
        let mut f = fixture(RecordingProcessor { open: Behaviour::Panic, ..Default::default() });
        f.adapter.on_open(f.outbound.clone());
        assert_eq!(f.adapter.state(), ConnectionState::OpenFailed);
        f.adapter.on_text("ignored").unwrap();
        assert_eq!(f.processor.calls().len(), 1);
    }

    #[test]
    fn duplicate_open_is_ignored() {
        let mut f = fixture(RecordingProcessor::default());
        f.adapter.on_open(f.outbound.clone());
        let first = f.adapter.socket().unwrap();
        f.adapter.on_open(RecordingOutbound::default());

        assert_eq!(f.processor.calls().len(), 1);
        assert!(Arc::ptr_eq(&first, &f.adapter.socket().unwrap()));
    }

    #[test]
    fn dispatch_failure_is_returned_to_host() {
        let mut f = fixture(RecordingProcessor { dispatch: Behaviour::Fail, ..Default::default() });
        f.adapter.on_open(f.outbound.clone());

        let err = f.adapter.on_binary(&[1]).unwrap_err();
        assert!(matches!(err, AdapterError::Dispatch(ProcessorError::Rejected(_))));
        assert_eq!(f.adapter.state(), ConnectionState::Open);

        let err = f.adapter.on_text("x").unwrap_err();
        assert!(matches!(err, AdapterError::Dispatch(_)));
    }

    #[test]
    fn dispatch_panic_is_returned_as_error() {
        let mut f = fixture(RecordingProcessor { dispatch: Behaviour::Panic, ..Default::default() });
        f.adapter.on_open(f.outbound.clone());
        let err = f.adapter.on_text("x").unwrap_err();
        assert!(err.to_string().contains("text exploded"), "{err}");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Close / teardown
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn close_notifies_protocol_then_destroys_request() {
        let mut f = fixture(RecordingProcessor::default());
        f.adapter.on_open(f.outbound.clone());
        f.adapter.on_close(CloseCode::NORMAL);

        assert_eq!(f.adapter.state(), ConnectionState::Closed);
        assert_eq!(f.processor.calls().last(), Some(&Call::Close(1000)));
        assert_eq!(f.request.destroy_count(), 1);
    }

    #[test]
    fn failing_close_still_destroys_request_once() {
        let mut f = fixture(RecordingProcessor { close: Behaviour::Fail, ..Default::default() });
        f.adapter.on_open(f.outbound.clone());

        let warnings = warnings_during(|| f.adapter.on_close(CloseCode::GOING_AWAY));

        assert_eq!(f.request.destroy_count(), 1);
        assert!(warnings.iter().any(|w| w.contains("protocol close failed")));
    }

    #[test]
    fn panicking_close_still_destroys_request_once() {
        let mut f = fixture(RecordingProcessor { close: Behaviour::Panic, ..Default::default() });
        f.adapter.on_open(f.outbound.clone());
        f.adapter.on_close(CloseCode::ABNORMAL);
        assert_eq!(f.request.destroy_count(), 1);
        drop(f.adapter);
        assert_eq!(f.request.destroy_count(), 1);
    }

    #[test]
    fn close_after_failed_open_destroys_request() {
        let mut f = fixture(RecordingProcessor { open: Behaviour::Fail, ..Default::default() });
        f.adapter.on_open(f.outbound.clone());
        f.adapter.on_close(CloseCode::NORMAL);
        assert_eq!(f.processor.calls().last(), Some(&Call::Close(1000)));
        assert_eq!(f.request.destroy_count(), 1);
    }

    #[test]
    fn close_without_open_skips_protocol_but_destroys() {
        let mut f = fixture(RecordingProcessor::default());
        f.adapter.on_close(CloseCode::ABNORMAL);
        assert!(f.processor.calls().is_empty());
        assert_eq!(f.request.destroy_count(), 1);
    }

    #[test]
    fn duplicate_close_is_ignored() {
        let mut f = fixture(RecordingProcessor::default());
        f.adapter.on_open(f.outbound.clone());
        f.adapter.on_close(CloseCode::NORMAL);
        f.adapter.on_close(CloseCode::NORMAL);

        let closes = f.processor.calls().iter().filter(|c| matches!(c, Call::Close(_))).count();
        assert_eq!(closes, 1);
        assert_eq!(f.request.destroy_count(), 1);
    }

    #[test]
    fn messages_after_close_are_rejected() {
        let mut f = fixture(RecordingProcessor::default());
        f.adapter.on_open(f.outbound.clone());
        f.adapter.on_close(CloseCode::NORMAL);

        let err = f.adapter.on_binary(&[1]).unwrap_err();
        assert!(matches!(err, AdapterError::InvalidState { state: ConnectionState::Closed, .. }));
        assert_eq!(f.processor.calls().len(), 2);
    }

    #[test]
    fn dropping_unclosed_adapter_destroys_request() {
        let mut f = fixture(RecordingProcessor::default());
        f.adapter.on_open(f.outbound.clone());
        let socket = f.adapter.socket().unwrap();
        drop(f.adapter);

        assert_eq!(f.request.destroy_count(), 1);
        assert!(!socket.is_open());
    }

    #[test]
    fn dropping_closed_adapter_does_not_destroy_again() {
        let mut f = fixture(RecordingProcessor::default());
        f.adapter.on_close(CloseCode::NORMAL);
        drop(f.adapter);
        assert_eq!(f.request.destroy_count(), 1);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Host socket
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn socket_writes_reach_outbound() {
        let mut f = fixture(RecordingProcessor::default());
        f.adapter.on_open(f.outbound.clone());
        let socket = f.adapter.socket().unwrap();

        socket.write_text("hi").unwrap();
        socket.write_binary(&[7, 8]).unwrap();

        assert_eq!(f.outbound.sent(), vec![Sent::Text("hi".into()), Sent::Binary(vec![7, 8])]);
        assert_eq!(socket.id(), "conn-1");
    }

    #[test]
    fn socket_refuses_frames_over_limit() {
        let socket = HostSocket::new("s", RecordingOutbound::default(), BufferLimits::uniform(4));

        socket.write_text("four").unwrap();
        let err = socket.write_text("fives").unwrap_err();
        assert!(matches!(
            err,
            SocketError::FrameTooLarge { kind: FrameKind::Text, size: 5, limit: 4 }
        ));
        let err = socket.write_binary(&[0; 5]).unwrap_err();
        assert!(matches!(err, SocketError::FrameTooLarge { kind: FrameKind::Binary, .. }));
    }

    #[test]
    fn socket_close_is_sent_once() {
        let outbound = RecordingOutbound::default();
        let socket = HostSocket::new("s", outbound.clone(), BufferLimits::host_default());

        socket.close(CloseCode::NORMAL).unwrap();
        socket.close(CloseCode::NORMAL).unwrap();

        assert_eq!(outbound.sent(), vec![Sent::Close(1000)]);
        assert!(matches!(socket.write_text("late"), Err(SocketError::Closed)));
    }

    #[test]
    fn socket_closed_by_connection_close() {
        let mut f = fixture(RecordingProcessor::default());
        f.adapter.on_open(f.outbound.clone());
        let socket = f.adapter.socket().unwrap();
        f.adapter.on_close(CloseCode::NORMAL);

        assert!(!socket.is_open());
        assert!(matches!(socket.write_text("late"), Err(SocketError::Closed)));
        assert!(f.outbound.sent().is_empty());
    }

    // ─────────────────────────────────────────────────────────────────────
    // UpgradeRequest
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn upgrade_request_destroy_is_idempotent() {
        let request = UpgradeRequest::new("/ws").with_header("X-Client", "tests");
        request.set_attribute("user", "ada");
        assert_eq!(request.attribute("user").as_deref(), Some("ada"));
        assert_eq!(request.header("x-client"), Some("tests"));

        request.destroy();
        request.destroy();

        assert!(request.is_destroyed());
        assert_eq!(request.attribute("user"), None);
        request.set_attribute("user", "again");
        assert_eq!(request.attribute("user"), None);
    }

    #[test]
    fn upgrade_requests_have_unique_ids() {
        let a = UpgradeRequest::new("/ws");
        let b = UpgradeRequest::new("/ws");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.path(), "/ws");
        assert_eq!(a.remote_addr(), None);
    }

    #[test]
    fn upgrade_request_keeps_remote_addr() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let request = UpgradeRequest::new("/ws").with_remote_addr(addr);
        assert_eq!(request.remote_addr(), Some(addr));
    }
}
