//! Typed access to tool call arguments.

use crate::error::VoiceError;

/// Parsed arguments of one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Parse the raw JSON argument string sent by the realtime endpoint.
    ///
    /// An empty string is treated as an empty object.
    pub fn parse(raw: &str) -> Result<Self, VoiceError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::new(serde_json::json!({})));
        }
        serde_json::from_str(trimmed)
            .map(Self::new)
            .map_err(|e| VoiceError::InvalidArgument(format!("Tool arguments are not JSON: {e}")))
    }

    /// Get the raw JSON value.
    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, VoiceError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| missing("string", key))
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Get an integer argument.
    pub fn get_i64(&self, key: &str) -> Result<i64, VoiceError> {
        self.value
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| missing("integer", key))
    }

    /// Get a float argument.
    pub fn get_f64(&self, key: &str) -> Result<f64, VoiceError> {
        self.value
            .get(key)
            .and_then(|v| v.as_f64())
            .ok_or_else(|| missing("float", key))
    }

    /// Get a boolean argument.
    pub fn get_bool(&self, key: &str) -> Result<bool, VoiceError> {
        self.value
            .get(key)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| missing("boolean", key))
    }

    /// Deserialize the entire arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, VoiceError> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            VoiceError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}

fn missing(kind: &str, key: &str) -> VoiceError {
    VoiceError::InvalidArgument(format!("Missing {kind} argument: {key}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_treats_blank_input_as_empty_object() {
        let args = ToolArguments::parse("  ").unwrap();
        assert_eq!(args.raw(), &serde_json::json!({}));
    }

    #[test]
    fn parse_rejects_malformed_json() {
        let error = ToolArguments::parse("{\"latitude\": ").unwrap_err();
        assert!(matches!(error, VoiceError::InvalidArgument(message) if message.contains("not JSON")));
    }

    #[test]
    fn typed_getters_report_missing_keys() {
        let args = ToolArguments::parse(r#"{"location":"Tokyo","latitude":35.68}"#).unwrap();
        assert_eq!(args.get_str("location").unwrap(), "Tokyo");
        assert_eq!(args.get_f64("latitude").unwrap(), 35.68);
        assert!(args.get_bool("metric").is_err());
        assert_eq!(args.get_str_opt("timezone"), None);
    }
}
