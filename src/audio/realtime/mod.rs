//! Realtime audio session over a persistent WebSocket.

pub mod config;
pub mod events;
pub mod notify;
pub mod session;
pub mod transport;

pub use config::{ConnectRequest, RealtimeConfiguration, RealtimeProvider};
pub use events::{ClientEvent, ConversationItem, ServerEvent, SessionConfig};
pub use notify::{
    DefaultTranslator, Notification, NotificationKind, NotificationLevel, Notifier,
    TracingNotifier, Translator,
};
pub use session::{
    session_update, RealtimeSession, SessionEvent, SessionEventHandler, SessionHooks, Transcript,
};
pub use transport::{
    Connection, Connector, ReadyState, SharedReadyState, Transport, TransportEvent,
    WebSocketConnector,
};
