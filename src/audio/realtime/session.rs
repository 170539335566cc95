//! Realtime session: connection lifecycle, handshake, dispatch, and the
//! tool-call bridge.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::config::RealtimeConfiguration;
use super::events::{
    ClientEvent, ContentPart, ConversationItem, ServerEvent, SessionConfig, TranscriptionConfig,
    TurnDetection,
};
use super::notify::{
    tool_tag, DefaultTranslator, Notification, Notifier, TracingNotifier, Translator,
    LIFECYCLE_TAGS,
};
use super::transport::{Connector, ReadyState, Transport, TransportEvent, WebSocketConnector};
use crate::audio::accumulator::{decode_audio_base64, encode_audio_base64, BufferSink, ChunkAccumulator};
use crate::error::VoiceError;
use crate::tools::{ToolCallContext, ToolRegistry};

/// A finished piece of assistant text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
    pub role: String,
    pub emotion: String,
    /// Protocol message type the transcript came from.
    pub kind: String,
}

/// What the session hands to its collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Transcript(Transcript),
    /// Merged PCM16 audio, at least one accumulator threshold long except
    /// for the final flush of a response.
    Audio { buffer: Vec<u8> },
}

/// Receives transcripts and audio in delivery order.
#[async_trait]
pub trait SessionEventHandler: Send + Sync {
    async fn on_event(&self, event: SessionEvent);
}

/// Optional observers of the connection lifecycle.
pub trait SessionHooks: Send + Sync {
    fn on_open(&self) {}
    fn on_message(&self, _event: &ServerEvent) {}
    fn on_error(&self, _message: &str) {}
    fn on_close(&self, _code: Option<u16>, _reason: &str) {}
}

#[derive(Debug, Default)]
struct NoHooks;

impl SessionHooks for NoHooks {}

struct ActiveConnection {
    transport: Arc<dyn Transport>,
    dispatch: JoinHandle<()>,
    /// Cancels tool calls still running for this connection.
    cancel: CancellationToken,
}

/// One persistent connection to a realtime endpoint.
pub struct RealtimeSession {
    config: RealtimeConfiguration,
    connector: Arc<dyn Connector>,
    tools: Arc<ToolRegistry>,
    notifier: Arc<dyn Notifier>,
    translator: Arc<dyn Translator>,
    handler: Arc<dyn SessionEventHandler>,
    hooks: Arc<dyn SessionHooks>,
    streaming: Arc<AtomicBool>,
    active: Option<ActiveConnection>,
    last_reconnect_attempt: Option<Instant>,
}

impl RealtimeSession {
    /// Create a session (does not connect yet).
    pub fn new(config: RealtimeConfiguration, handler: Arc<dyn SessionEventHandler>) -> Self {
        let connector = WebSocketConnector::new(config.heartbeat_interval);
        Self {
            config,
            connector: Arc::new(connector),
            tools: Arc::new(ToolRegistry::new()),
            notifier: Arc::new(TracingNotifier),
            translator: Arc::new(DefaultTranslator),
            handler,
            hooks: Arc::new(NoHooks),
            streaming: Arc::new(AtomicBool::new(false)),
            active: None,
            last_reconnect_attempt: None,
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Arc::new(tools);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn SessionHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(&self) -> &RealtimeConfiguration {
        &self.config
    }

    /// Open the connection and start dispatching. A session without usable
    /// credentials stays disconnected and returns `Ok`.
    pub fn connect(&mut self) -> Result<(), VoiceError> {
        if !self.config.is_enabled() {
            tracing::debug!(provider = %self.config.provider, "Realtime session not enabled, skipping connect");
            return Ok(());
        }
        if matches!(self.ready_state(), ReadyState::Connecting | ReadyState::Open) {
            return Err(VoiceError::InvalidState(
                "Realtime session is already connected".into(),
            ));
        }
        self.disconnect();

        self.dismiss_lifecycle();
        self.notifier
            .notify(Notification::connection_attempt(self.translator.as_ref()));

        let connection = match self
            .config
            .connect_request()
            .and_then(|request| self.connector.open(&request))
        {
            Ok(connection) => connection,
            Err(error) => {
                tracing::warn!(%error, "Realtime connect failed");
                self.dismiss_lifecycle();
                self.notifier
                    .notify(Notification::connection_error(self.translator.as_ref()));
                return Err(error);
            }
        };

        tracing::info!(provider = %self.config.provider, model = %self.config.model, "Connecting realtime session");
        let cancel = CancellationToken::new();
        let dispatcher = Dispatcher {
            handshake: session_update(&self.config, &self.tools),
            transport: Arc::clone(&connection.transport),
            tools: Arc::clone(&self.tools),
            notifier: Arc::clone(&self.notifier),
            translator: Arc::clone(&self.translator),
            handler: Arc::clone(&self.handler),
            hooks: Arc::clone(&self.hooks),
            streaming: Arc::clone(&self.streaming),
            cancel: cancel.clone(),
        };
        let accumulator = ChunkAccumulator::with_threshold(
            AudioForwarder {
                handler: Arc::clone(&self.handler),
            },
            self.config.buffer_threshold,
        );
        let dispatch = tokio::spawn(dispatcher.run(connection.events, accumulator));

        self.active = Some(ActiveConnection {
            transport: connection.transport,
            dispatch,
            cancel,
        });
        Ok(())
    }

    /// Close the connection. Safe to call in any state, any number of times.
    pub fn disconnect(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::debug!("Disconnecting realtime session");
            active.cancel.cancel();
            active.transport.close();
            active.dispatch.abort();
        }
        self.streaming.store(false, Ordering::Release);
    }

    /// Tear down and connect again. Returns `false` when the session is not
    /// enabled.
    pub fn reconnect(&mut self) -> bool {
        if !self.config.is_enabled() {
            return false;
        }
        self.disconnect();
        self.last_reconnect_attempt = Some(Instant::now());
        if let Err(error) = self.connect() {
            tracing::warn!(%error, "Realtime reconnect failed");
        }
        true
    }

    /// Watchdog step: reconnect when the transport is neither open nor
    /// connecting and the cooldown since the last attempt has elapsed.
    /// Returns whether a reconnect was started.
    pub fn ensure_connected(&mut self) -> bool {
        if matches!(self.ready_state(), ReadyState::Open | ReadyState::Connecting) {
            return false;
        }
        if let Some(last) = self.last_reconnect_attempt {
            if last.elapsed() < self.config.reconnect_cooldown {
                return false;
            }
        }
        tracing::debug!("Realtime transport down, reconnecting");
        self.reconnect()
    }

    pub fn ready_state(&self) -> ReadyState {
        self.active
            .as_ref()
            .map_or(ReadyState::Closed, |active| active.transport.ready_state())
    }

    pub fn is_connected(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }

    /// Whether a response is currently producing audio.
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    /// Send a tool result for `call_id` and ask for the response to resume.
    pub fn send_tool_output(&self, call_id: &str, output: &Value) -> Result<(), VoiceError> {
        send_function_output(self.open_transport()?, call_id, output)
    }

    /// Add a user text message and request a response.
    pub fn send_user_text(&self, text: &str) -> Result<(), VoiceError> {
        self.send_user_content(ContentPart::InputText {
            text: text.to_string(),
        })
    }

    /// Add user PCM16 audio and request a response.
    pub fn send_user_audio(&self, pcm: &[u8]) -> Result<(), VoiceError> {
        self.send_user_content(ContentPart::InputAudio {
            audio: encode_audio_base64(pcm),
        })
    }

    fn send_user_content(&self, part: ContentPart) -> Result<(), VoiceError> {
        let transport = self.open_transport()?;
        let item = ClientEvent::ConversationItemCreate {
            item: ConversationItem::Message {
                role: "user".into(),
                content: vec![part],
            },
        };
        transport.send_text(item.to_json()?)?;
        transport.send_text(ClientEvent::ResponseCreate.to_json()?)
    }

    fn open_transport(&self) -> Result<&dyn Transport, VoiceError> {
        match &self.active {
            Some(active) if active.transport.ready_state() == ReadyState::Open => {
                Ok(active.transport.as_ref())
            }
            _ => Err(VoiceError::InvalidState(
                "Realtime session is not connected".into(),
            )),
        }
    }

    fn dismiss_lifecycle(&self) {
        for tag in LIFECYCLE_TAGS {
            self.notifier.dismiss(tag);
        }
    }
}

impl Drop for RealtimeSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Build the `session.update` handshake for a configuration.
pub fn session_update(config: &RealtimeConfiguration, tools: &ToolRegistry) -> ClientEvent {
    let (tools, tool_choice) = if tools.is_empty() {
        (None, None)
    } else {
        (Some(tools.definitions()), Some(config.tool_choice.clone()))
    };
    ClientEvent::SessionUpdate {
        session: SessionConfig {
            modalities: vec!["text".into(), "audio".into()],
            instructions: config.instructions.clone(),
            voice: config.voice.id.clone(),
            input_audio_format: config.input_format,
            output_audio_format: config.output_format,
            input_audio_transcription: TranscriptionConfig {
                model: config.transcription_model.clone(),
            },
            turn_detection: config.turn_detection.then(TurnDetection::server_vad),
            temperature: config.temperature,
            max_response_output_tokens: config.max_output_tokens,
            tools,
            tool_choice,
        },
    }
}

fn send_function_output(
    transport: &dyn Transport,
    call_id: &str,
    output: &Value,
) -> Result<(), VoiceError> {
    let item = ClientEvent::ConversationItemCreate {
        item: ConversationItem::FunctionCallOutput {
            call_id: call_id.to_string(),
            output: serde_json::to_string(output)?,
        },
    };
    transport.send_text(item.to_json()?)?;
    transport.send_text(ClientEvent::ResponseCreate.to_json()?)
}

struct AudioForwarder {
    handler: Arc<dyn SessionEventHandler>,
}

#[async_trait]
impl BufferSink for AudioForwarder {
    async fn send(&self, buffer: Vec<u8>) {
        self.handler.on_event(SessionEvent::Audio { buffer }).await;
    }
}

/// Per-connection state owned by the dispatch task.
#[derive(Clone)]
struct Dispatcher {
    handshake: ClientEvent,
    transport: Arc<dyn Transport>,
    tools: Arc<ToolRegistry>,
    notifier: Arc<dyn Notifier>,
    translator: Arc<dyn Translator>,
    handler: Arc<dyn SessionEventHandler>,
    hooks: Arc<dyn SessionHooks>,
    streaming: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl Dispatcher {
    async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        mut accumulator: ChunkAccumulator<AudioForwarder>,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Opened => self.on_open(),
                TransportEvent::Message(text) => self.on_message(&text, &mut accumulator).await,
                TransportEvent::Error(message) => self.on_error(&message),
                TransportEvent::Closed { code, reason } => {
                    self.on_close(code, &reason);
                    break;
                }
            }
        }
    }

    fn on_open(&self) {
        tracing::info!("Realtime session open");
        self.dismiss_lifecycle();
        self.notifier
            .notify(Notification::connection_succeeded(self.translator.as_ref()));
        self.hooks.on_open();

        let result = self
            .handshake
            .to_json()
            .and_then(|payload| self.transport.send_text(payload));
        if let Err(error) = result {
            tracing::error!(%error, "Failed to send realtime session configuration");
        }
    }

    async fn on_message(&self, text: &str, accumulator: &mut ChunkAccumulator<AudioForwarder>) {
        let event = match ServerEvent::parse(text) {
            Ok(event) => event,
            Err(error) => {
                tracing::warn!(%error, "Skipping malformed realtime message");
                return;
            }
        };
        tracing::debug!(event_type = event.event_type(), "Realtime message");
        self.hooks.on_message(&event);

        match event {
            ServerEvent::Error { details } => {
                tracing::warn!(?details, "Realtime endpoint reported an error");
            }
            ServerEvent::ItemCreated { item_id } => {
                tracing::debug!(?item_id, "Conversation item created");
            }
            ServerEvent::AudioDelta { delta } => {
                self.set_streaming(true);
                let audio = delta.as_deref().map(decode_audio_base64).unwrap_or_default();
                if audio.is_empty() {
                    tracing::warn!("Dropping invalid audio delta");
                } else {
                    accumulator.add_data(&audio).await;
                }
            }
            ServerEvent::ContentPartDone { transcript } => {
                if let Some(text) = transcript.filter(|text| !text.is_empty()) {
                    self.handler
                        .on_event(SessionEvent::Transcript(Transcript {
                            text,
                            role: "assistant".into(),
                            emotion: String::new(),
                            kind: super::events::TYPE_CONTENT_PART_DONE.into(),
                        }))
                        .await;
                }
            }
            ServerEvent::InputTranscriptionCompleted { transcript } => {
                tracing::debug!(?transcript, "Input audio transcription completed");
            }
            ServerEvent::FunctionCallArgumentsDone {
                name: Some(name),
                arguments: Some(arguments),
                call_id: Some(call_id),
            } if !arguments.is_empty() => self.spawn_tool_call(name, arguments, call_id),
            ServerEvent::FunctionCallArgumentsDone { .. } => {
                tracing::warn!("Ignoring incomplete function call");
            }
            ServerEvent::AudioDone => {
                accumulator.flush().await;
                self.set_streaming(false);
            }
            ServerEvent::ResponseStarted => self.set_streaming(true),
            ServerEvent::ResponseEnded => self.set_streaming(false),
            ServerEvent::Unknown { event_type } => {
                tracing::debug!(%event_type, "Ignoring realtime message");
            }
        }
    }

    fn on_error(&self, message: &str) {
        tracing::error!(%message, "Realtime transport error");
        self.dismiss_lifecycle();
        self.notifier
            .notify(Notification::connection_error(self.translator.as_ref()));
        self.hooks.on_error(message);
        self.set_streaming(false);
    }

    fn on_close(&self, code: Option<u16>, reason: &str) {
        tracing::info!(?code, %reason, "Realtime session closed");
        self.dismiss_lifecycle();
        self.notifier
            .notify(Notification::connection_closed(self.translator.as_ref()));
        self.hooks.on_close(code, reason);
        self.set_streaming(false);
    }

    fn spawn_tool_call(&self, name: String, arguments: String, call_id: String) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let tag = tool_tag(&name);
            tokio::select! {
                biased;
                _ = dispatcher.cancel.cancelled() => {
                    tracing::debug!(%tag, "Tool call abandoned on disconnect");
                    dispatcher.notifier.dismiss(&tag);
                }
                _ = dispatcher.run_tool_call(name, arguments, call_id) => {}
            }
        });
    }

    async fn run_tool_call(&self, name: String, arguments: String, call_id: String) {
        let tag = tool_tag(&name);
        let known = self.tools.contains(&name);
        if known {
            tracing::info!(tool = %name, %call_id, "Executing tool");
            self.notifier
                .notify(Notification::tool_executing(self.translator.as_ref(), &name));
        }

        let ctx = ToolCallContext {
            call_id: call_id.clone(),
        };
        let result = match self.tools.invoke(&name, &arguments, &ctx).await {
            Ok(output) => send_function_output(self.transport.as_ref(), &call_id, &output),
            Err(error) => Err(error),
        };

        if known {
            self.notifier.dismiss(&tag);
        }
        match result {
            Ok(()) => tracing::debug!(tool = %name, %call_id, "Tool output sent"),
            Err(error) => {
                tracing::warn!(tool = %name, %call_id, %error, "Tool call failed");
                self.notifier
                    .notify(Notification::tool_failed(self.translator.as_ref(), &name));
            }
        }
    }

    fn set_streaming(&self, value: bool) {
        self.streaming.store(value, Ordering::Release);
    }

    fn dismiss_lifecycle(&self) {
        for tag in LIFECYCLE_TAGS {
            self.notifier.dismiss(tag);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{FunctionTool, ToolParameters};
    use serde_json::json;

    #[test]
    fn handshake_without_tools_omits_tool_fields() {
        let config = RealtimeConfiguration {
            instructions: "Be brief.".into(),
            ..RealtimeConfiguration::default()
        };
        let value = serde_json::to_value(session_update(&config, &ToolRegistry::new())).unwrap();

        assert_eq!(
            value,
            json!({
                "type": "session.update",
                "session": {
                    "modalities": ["text", "audio"],
                    "instructions": "Be brief.",
                    "voice": "shimmer",
                    "input_audio_format": "pcm16",
                    "output_audio_format": "pcm16",
                    "input_audio_transcription": { "model": "whisper-1" },
                    "turn_detection": null,
                    "temperature": 0.8,
                    "max_response_output_tokens": 4096
                }
            })
        );
    }

    #[test]
    fn handshake_lists_tools_and_choice() {
        let tools = ToolRegistry::new().register(FunctionTool::new(
            "get_current_time",
            "Current local time",
            ToolParameters::empty(),
            |_, _| async { Ok(json!("12:00")) },
        ));
        let config = RealtimeConfiguration {
            turn_detection: true,
            ..RealtimeConfiguration::default()
        };
        let value = serde_json::to_value(session_update(&config, &tools)).unwrap();

        assert_eq!(value["session"]["tool_choice"], "auto");
        assert_eq!(value["session"]["tools"][0]["name"], "get_current_time");
        assert_eq!(value["session"]["tools"][0]["type"], "function");
        assert_eq!(value["session"]["turn_detection"]["type"], "server_vad");
    }
}
