//! Tool trait and closure-based tool wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use super::arguments::ToolArguments;
use super::types::{ToolDefinition, ToolParameters};
use crate::error::VoiceError;

/// Context of one remote tool call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallContext {
    /// Correlation id the result must be tagged with.
    pub call_id: String,
}

/// A function the realtime endpoint may call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &str;

    /// Human-readable description sent in the session handshake.
    fn description(&self) -> &str;

    /// JSON Schema parameters.
    fn parameters(&self) -> &ToolParameters;

    /// Execute the tool with parsed arguments.
    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolCallContext,
    ) -> Result<serde_json::Value, VoiceError>;

    /// Wire definition announced to the realtime endpoint.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(self.name(), self.description(), self.parameters())
    }
}

type ToolHandler = dyn Fn(
        ToolArguments,
        ToolCallContext,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, VoiceError>> + Send>>
    + Send
    + Sync;

/// Closure-based tool.
pub struct FunctionTool {
    name: String,
    description: String,
    parameters: ToolParameters,
    handler: Arc<ToolHandler>,
}

impl FunctionTool {
    /// Create a tool from an async closure.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments, ToolCallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, VoiceError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |args, ctx| Box::pin(handler(args, ctx))),
        }
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolCallContext,
    ) -> Result<serde_json::Value, VoiceError> {
        (self.handler)(args.clone(), ctx.clone()).await
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}
