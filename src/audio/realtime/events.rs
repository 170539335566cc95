//! Realtime protocol messages.

use serde::Serialize;
use serde_json::Value;

use crate::audio::types::AudioFormat;
use crate::error::{ErrorDetails, VoiceError};
use crate::tools::ToolDefinition;

/// Inbound message from the realtime endpoint, keyed by its `type` field.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Error {
        details: Option<ErrorDetails>,
    },
    ItemCreated {
        item_id: Option<String>,
    },
    AudioDelta {
        delta: Option<String>,
    },
    ContentPartDone {
        transcript: Option<String>,
    },
    InputTranscriptionCompleted {
        transcript: Option<String>,
    },
    FunctionCallArgumentsDone {
        name: Option<String>,
        arguments: Option<String>,
        call_id: Option<String>,
    },
    AudioDone,
    ResponseStarted,
    ResponseEnded,
    Unknown {
        event_type: String,
    },
}

pub const TYPE_ERROR: &str = "error";
pub const TYPE_ITEM_CREATED: &str = "conversation.item.created";
pub const TYPE_AUDIO_DELTA: &str = "response.audio.delta";
pub const TYPE_CONTENT_PART_DONE: &str = "response.content_part.done";
pub const TYPE_INPUT_TRANSCRIPTION_COMPLETED: &str =
    "conversation.item.input_audio_transcription.completed";
pub const TYPE_FUNCTION_CALL_ARGUMENTS_DONE: &str = "response.function_call_arguments.done";
pub const TYPE_AUDIO_DONE: &str = "response.audio.done";

impl ServerEvent {
    /// Parse one text frame.
    pub fn parse(payload: &str) -> Result<Self, VoiceError> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|error| VoiceError::MalformedPayload(format!("not JSON: {error}")))?;
        Self::from_value(&value)
    }

    /// Decode an already parsed message. Unrecognized types become
    /// [`ServerEvent::Unknown`]; a missing `type` is malformed.
    pub fn from_value(payload: &Value) -> Result<Self, VoiceError> {
        let event_type = payload
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| VoiceError::MalformedPayload("message has no type".into()))?;

        let event = match event_type {
            TYPE_ERROR => Self::Error {
                details: payload
                    .get("error")
                    .and_then(|error| serde_json::from_value(error.clone()).ok()),
            },
            TYPE_ITEM_CREATED => Self::ItemCreated {
                item_id: string_at(payload, &["item", "id"]),
            },
            TYPE_AUDIO_DELTA => Self::AudioDelta {
                delta: string_field(payload, "delta"),
            },
            TYPE_CONTENT_PART_DONE => Self::ContentPartDone {
                transcript: string_at(payload, &["part", "transcript"]),
            },
            TYPE_INPUT_TRANSCRIPTION_COMPLETED => Self::InputTranscriptionCompleted {
                transcript: string_field(payload, "transcript"),
            },
            TYPE_FUNCTION_CALL_ARGUMENTS_DONE => Self::FunctionCallArgumentsDone {
                name: string_field(payload, "name"),
                arguments: string_field(payload, "arguments"),
                call_id: string_field(payload, "call_id"),
            },
            TYPE_AUDIO_DONE => Self::AudioDone,
            "start" => Self::ResponseStarted,
            "end" => Self::ResponseEnded,
            other => Self::Unknown {
                event_type: other.to_string(),
            },
        };
        Ok(event)
    }

    /// Wire name of this event.
    pub fn event_type(&self) -> &str {
        match self {
            Self::Error { .. } => TYPE_ERROR,
            Self::ItemCreated { .. } => TYPE_ITEM_CREATED,
            Self::AudioDelta { .. } => TYPE_AUDIO_DELTA,
            Self::ContentPartDone { .. } => TYPE_CONTENT_PART_DONE,
            Self::InputTranscriptionCompleted { .. } => TYPE_INPUT_TRANSCRIPTION_COMPLETED,
            Self::FunctionCallArgumentsDone { .. } => TYPE_FUNCTION_CALL_ARGUMENTS_DONE,
            Self::AudioDone => TYPE_AUDIO_DONE,
            Self::ResponseStarted => "start",
            Self::ResponseEnded => "end",
            Self::Unknown { event_type } => event_type,
        }
    }
}

fn string_field(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

fn string_at(value: &Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    current.as_str().map(ToString::to_string)
}

/// Outbound message to the realtime endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },
    #[serde(rename = "response.create")]
    ResponseCreate,
}

impl ClientEvent {
    pub fn to_json(&self) -> Result<String, VoiceError> {
        serde_json::to_string(self).map_err(VoiceError::from)
    }
}

/// Body of the `session.update` handshake.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionConfig {
    pub modalities: Vec<String>,
    pub instructions: String,
    pub voice: String,
    pub input_audio_format: AudioFormat,
    pub output_audio_format: AudioFormat,
    pub input_audio_transcription: TranscriptionConfig,
    /// Always present; `null` disables server-side turn detection.
    pub turn_detection: Option<TurnDetection>,
    pub temperature: f64,
    pub max_response_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptionConfig {
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
}

impl TurnDetection {
    pub fn server_vad() -> Self {
        Self {
            kind: "server_vad".into(),
        }
    }
}

/// Items this client adds to the remote conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationItem {
    FunctionCallOutput { call_id: String, output: String },
    Message {
        role: String,
        content: Vec<ContentPart>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    InputText { text: String },
    InputAudio { audio: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_function_call_completion() {
        let event = ServerEvent::parse(
            r#"{"type":"response.function_call_arguments.done","name":"get_weather","arguments":"{\"city\":\"Tokyo\"}","call_id":"call_9"}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ServerEvent::FunctionCallArgumentsDone {
                name: Some("get_weather".into()),
                arguments: Some(r#"{"city":"Tokyo"}"#.into()),
                call_id: Some("call_9".into()),
            }
        );
    }

    #[test]
    fn parses_nested_transcript_and_error_details() {
        let part = ServerEvent::from_value(&json!({
            "type": "response.content_part.done",
            "part": { "type": "audio", "transcript": "hello" }
        }))
        .unwrap();
        assert_eq!(
            part,
            ServerEvent::ContentPartDone {
                transcript: Some("hello".into())
            }
        );

        let error = ServerEvent::from_value(&json!({
            "type": "error",
            "error": { "type": "invalid_request_error", "message": "bad voice" }
        }))
        .unwrap();
        match error {
            ServerEvent::Error { details: Some(details) } => {
                assert_eq!(details.message.as_deref(), Some("bad voice"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unrecognized_type_is_kept_as_unknown() {
        let event = ServerEvent::parse(r#"{"type":"rate_limits.updated"}"#).unwrap();
        assert_eq!(event.event_type(), "rate_limits.updated");
    }

    #[test]
    fn non_json_or_untyped_frames_are_malformed() {
        assert!(matches!(
            ServerEvent::parse("garbage"),
            Err(VoiceError::MalformedPayload(_))
        ));
        assert!(matches!(
            ServerEvent::parse(r#"{"delta":"AAAA"}"#),
            Err(VoiceError::MalformedPayload(_))
        ));
    }

    #[test]
    fn tool_output_item_serializes_with_type_tags() {
        let event = ClientEvent::ConversationItemCreate {
            item: ConversationItem::FunctionCallOutput {
                call_id: "call_1".into(),
                output: r#"{"ok":true}"#.into(),
            },
        };
        let value: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "conversation.item.create",
                "item": { "type": "function_call_output", "call_id": "call_1", "output": "{\"ok\":true}" }
            })
        );
        assert_eq!(
            ClientEvent::ResponseCreate.to_json().unwrap(),
            r#"{"type":"response.create"}"#
        );
    }

    #[test]
    fn user_message_content_is_tagged() {
        let item = ConversationItem::Message {
            role: "user".into(),
            content: vec![ContentPart::InputText { text: "hi".into() }],
        };
        assert_eq!(
            serde_json::to_value(item).unwrap(),
            json!({
                "type": "message",
                "role": "user",
                "content": [{ "type": "input_text", "text": "hi" }]
            })
        );
    }
}
