//! Shared test doubles for the realtime session.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use avatar_voice::audio::realtime::{
    Connection, Connector, ConnectRequest, Notification, Notifier, ReadyState, SessionEvent,
    SessionEventHandler, SessionHooks, SharedReadyState, Transcript, Transport, TransportEvent,
};
use avatar_voice::error::VoiceError;
use tokio::sync::mpsc;

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within two seconds"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Server side of one scripted connection.
pub struct ScriptedServer {
    state: Arc<SharedReadyState>,
    sent: Mutex<Vec<String>>,
    closed: Mutex<bool>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl ScriptedServer {
    pub fn open(&self) {
        self.state.set(ReadyState::Open);
        let _ = self.events.send(TransportEvent::Opened);
    }

    pub fn message(&self, value: Value) {
        self.raw(&value.to_string());
    }

    pub fn raw(&self, text: &str) {
        let _ = self.events.send(TransportEvent::Message(text.to_string()));
    }

    pub fn error(&self, message: &str) {
        let _ = self.events.send(TransportEvent::Error(message.to_string()));
    }

    pub fn close(&self, code: u16, reason: &str) {
        self.state.set(ReadyState::Closed);
        let _ = self.events.send(TransportEvent::Closed {
            code: Some(code),
            reason: reason.to_string(),
        });
    }

    /// Frames the client sent, in order.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn was_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

impl Transport for ScriptedServer {
    fn ready_state(&self) -> ReadyState {
        self.state.get()
    }

    fn send_text(&self, text: String) -> Result<(), VoiceError> {
        if self.state.get() != ReadyState::Open {
            return Err(VoiceError::InvalidState("scripted transport not open".into()));
        }
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    fn close(&self) {
        *self.closed.lock().unwrap() = true;
        self.state.set(ReadyState::Closed);
    }
}

/// Connector handing out scripted connections that tests drive by hand.
#[derive(Default)]
pub struct ScriptedConnector {
    servers: Mutex<Vec<Arc<ScriptedServer>>>,
    requests: Mutex<Vec<ConnectRequest>>,
}

impl ScriptedConnector {
    pub fn latest(&self) -> Arc<ScriptedServer> {
        self.servers
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no connection opened yet")
    }

    pub fn open_count(&self) -> usize {
        self.servers.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ConnectRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Connector for ScriptedConnector {
    fn open(&self, request: &ConnectRequest) -> Result<Connection, VoiceError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let server = Arc::new(ScriptedServer {
            state: Arc::new(SharedReadyState::default()),
            sent: Mutex::new(Vec::new()),
            closed: Mutex::new(false),
            events: events_tx,
        });
        self.requests.lock().unwrap().push(request.clone());
        self.servers.lock().unwrap().push(Arc::clone(&server));
        Ok(Connection {
            transport: server,
            events: events_rx,
        })
    }
}

#[derive(Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingHandler {
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn transcripts(&self) -> Vec<Transcript> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::Transcript(transcript) => Some(transcript),
                SessionEvent::Audio { .. } => None,
            })
            .collect()
    }

    pub fn audio(&self) -> Vec<Vec<u8>> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::Audio { buffer } => Some(buffer),
                SessionEvent::Transcript(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl SessionEventHandler for RecordingHandler {
    async fn on_event(&self, event: SessionEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteOp {
    Notify(Notification),
    Dismiss(String),
}

#[derive(Default)]
pub struct RecordingNotifier {
    ops: Mutex<Vec<NoteOp>>,
}

impl RecordingNotifier {
    pub fn ops(&self) -> Vec<NoteOp> {
        self.ops.lock().unwrap().clone()
    }

    /// Notifications shown, in order, ignoring dismissals.
    pub fn shown(&self) -> Vec<Notification> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                NoteOp::Notify(notification) => Some(notification),
                NoteOp::Dismiss(_) => None,
            })
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.ops.lock().unwrap().push(NoteOp::Notify(notification));
    }

    fn dismiss(&self, tag: &str) {
        self.ops.lock().unwrap().push(NoteOp::Dismiss(tag.to_string()));
    }
}

#[derive(Default)]
pub struct RecordingHooks {
    opens: Mutex<usize>,
    errors: Mutex<Vec<String>>,
    closes: Mutex<Vec<(Option<u16>, String)>>,
}

impl RecordingHooks {
    pub fn opens(&self) -> usize {
        *self.opens.lock().unwrap()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn closes(&self) -> Vec<(Option<u16>, String)> {
        self.closes.lock().unwrap().clone()
    }
}

impl SessionHooks for RecordingHooks {
    fn on_open(&self) {
        *self.opens.lock().unwrap() += 1;
    }

    fn on_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn on_close(&self, code: Option<u16>, reason: &str) {
        self.closes
            .lock()
            .unwrap()
            .push((code, reason.to_string()));
    }
}
