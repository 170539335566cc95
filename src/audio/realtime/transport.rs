//! Connection seam and the default WebSocket transport.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::config::ConnectRequest;
use crate::error::VoiceError;

type RealtimeWebSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection state as reported by the transport itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// The four things a transport reports to its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Error(String),
    Closed { code: Option<u16>, reason: String },
}

/// A live, message-oriented connection.
pub trait Transport: Send + Sync {
    fn ready_state(&self) -> ReadyState;

    /// Queue one text frame. Fails unless the transport is open.
    fn send_text(&self, text: String) -> Result<(), VoiceError>;

    /// Begin closing. Safe to call repeatedly.
    fn close(&self);
}

/// A freshly opened connection: the handle plus its event stream.
pub struct Connection {
    pub transport: Arc<dyn Transport>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens connections. The returned transport starts in
/// [`ReadyState::Connecting`] and reports [`TransportEvent::Opened`] later.
pub trait Connector: Send + Sync {
    fn open(&self, request: &ConnectRequest) -> Result<Connection, VoiceError>;
}

/// State shared between a transport handle and its socket task.
#[derive(Debug, Default)]
pub struct SharedReadyState(AtomicU8);

impl SharedReadyState {
    pub fn get(&self) -> ReadyState {
        ReadyState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ReadyState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Move to `Closing` unless already closing or closed.
    fn begin_close(&self) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < ReadyState::Closing as u8).then_some(ReadyState::Closing as u8)
            })
            .is_ok()
    }
}

enum Outbound {
    Text(String),
    Close,
}

/// tokio-tungstenite client connector.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    heartbeat_interval: Duration,
}

impl WebSocketConnector {
    pub fn new(heartbeat_interval: Duration) -> Self {
        Self { heartbeat_interval }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl Connector for WebSocketConnector {
    fn open(&self, request: &ConnectRequest) -> Result<Connection, VoiceError> {
        let mut client_request = request.url.as_str().into_client_request().map_err(|error| {
            VoiceError::Configuration(format!("Invalid realtime websocket URL: {error}"))
        })?;
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|error| {
                VoiceError::Configuration(format!("Invalid realtime header name: {error}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|error| {
                VoiceError::Configuration(format!("Invalid realtime header value: {error}"))
            })?;
            client_request.headers_mut().insert(name, value);
        }

        let state = Arc::new(SharedReadyState::default());
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(
            client_request,
            Arc::clone(&state),
            outbound_rx,
            events_tx,
            self.heartbeat_interval,
        ));

        Ok(Connection {
            transport: Arc::new(WebSocketTransport {
                state,
                outbound: outbound_tx,
            }),
            events: events_rx,
        })
    }
}

struct WebSocketTransport {
    state: Arc<SharedReadyState>,
    /// Dropping the last handle closes the channel, which ends the socket task.
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl Transport for WebSocketTransport {
    fn ready_state(&self) -> ReadyState {
        self.state.get()
    }

    fn send_text(&self, text: String) -> Result<(), VoiceError> {
        let state = self.state.get();
        if state != ReadyState::Open {
            return Err(VoiceError::InvalidState(format!(
                "Realtime transport is {state:?}, not open"
            )));
        }
        self.outbound
            .send(Outbound::Text(text))
            .map_err(|_| VoiceError::Transport("Realtime socket task has stopped".into()))
    }

    fn close(&self) {
        if self.state.begin_close() {
            let _ = self.outbound.send(Outbound::Close);
        }
    }
}

async fn run_socket(
    request: tokio_tungstenite::tungstenite::handshake::client::Request,
    state: Arc<SharedReadyState>,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    heartbeat_interval: Duration,
) {
    let mut socket = tokio::select! {
        result = connect_async(request) => match result {
            Ok((socket, _)) => socket,
            Err(error) => {
                let error = map_connect_error(error);
                tracing::warn!(%error, "Realtime websocket connect failed");
                state.set(ReadyState::Closed);
                let _ = events_tx.send(TransportEvent::Error(error.to_string()));
                let _ = events_tx.send(TransportEvent::Closed {
                    code: None,
                    reason: error.to_string(),
                });
                return;
            }
        },
        _ = outbound_rx.recv() => {
            state.set(ReadyState::Closed);
            let _ = events_tx.send(TransportEvent::Closed {
                code: None,
                reason: "closed before open".into(),
            });
            return;
        }
    };

    // A close requested during the handshake wins over the open.
    if state.get() != ReadyState::Connecting {
        let _ = socket.close(None).await;
        state.set(ReadyState::Closed);
        let _ = events_tx.send(TransportEvent::Closed {
            code: None,
            reason: "closed before open".into(),
        });
        return;
    }
    state.set(ReadyState::Open);
    tracing::debug!("Realtime websocket open");
    let _ = events_tx.send(TransportEvent::Opened);

    let (code, reason) =
        run_open_socket(&mut socket, &mut outbound_rx, &events_tx, heartbeat_interval).await;
    state.set(ReadyState::Closed);
    tracing::debug!(?code, %reason, "Realtime websocket closed");
    let _ = events_tx.send(TransportEvent::Closed { code, reason });
}

async fn run_open_socket(
    socket: &mut RealtimeWebSocket,
    outbound_rx: &mut mpsc::UnboundedReceiver<Outbound>,
    events_tx: &mpsc::UnboundedSender<TransportEvent>,
    heartbeat_interval: Duration,
) -> (Option<u16>, String) {
    let mut heartbeat = time::interval(heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            command = outbound_rx.recv() => match command {
                Some(Outbound::Text(text)) => {
                    if let Err(error) = socket.send(Message::Text(text)).await {
                        let _ = events_tx.send(TransportEvent::Error(format!(
                            "Realtime websocket send failed: {error}"
                        )));
                        return (None, error.to_string());
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = socket.close(None).await;
                    return (Some(1000), "closed by client".into());
                }
            },
            _ = heartbeat.tick() => {
                if let Err(error) = socket.send(Message::Ping(Default::default())).await {
                    let _ = events_tx.send(TransportEvent::Error(format!(
                        "Realtime heartbeat failed: {error}"
                    )));
                    return (None, error.to_string());
                }
            }
            frame = socket.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = events_tx.send(TransportEvent::Message(text.to_string()));
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => {
                        let _ = events_tx.send(TransportEvent::Message(text));
                    }
                    Err(_) => tracing::debug!(bytes = bytes.len(), "Ignoring non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Ping(payload))) => {
                    if let Err(error) = socket.send(Message::Pong(payload)).await {
                        let _ = events_tx.send(TransportEvent::Error(format!(
                            "Realtime pong failed: {error}"
                        )));
                        return (None, error.to_string());
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    return match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.to_string()),
                        None => (None, String::new()),
                    };
                }
                Some(Ok(Message::Pong(_) | Message::Frame(_))) => {}
                Some(Err(error)) => {
                    let _ = events_tx.send(TransportEvent::Error(format!(
                        "Realtime websocket receive failed: {error}"
                    )));
                    return (None, error.to_string());
                }
                None => return (None, "stream ended".into()),
            }
        }
    }
}

fn map_connect_error(error: WsError) -> VoiceError {
    match error {
        WsError::Http(response) => {
            let status = response.status().as_u16();
            if matches!(status, 401 | 403) {
                VoiceError::Authentication(format!(
                    "Realtime websocket authentication failed with status {status}"
                ))
            } else {
                VoiceError::api(
                    status,
                    format!("Realtime websocket handshake failed with status {status}"),
                )
            }
        }
        WsError::Io(error) => VoiceError::Io(error),
        WsError::Url(error) => {
            VoiceError::Configuration(format!("Invalid realtime websocket URL: {error}"))
        }
        other => VoiceError::Transport(format!("Realtime websocket connect failed: {other}")),
    }
}
