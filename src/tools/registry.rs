//! Name-keyed registry of invocable tools.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::arguments::ToolArguments;
use super::tool::{Tool, ToolCallContext};
use super::types::ToolDefinition;
use super::validation::validate_arguments;
use crate::error::VoiceError;

/// Tools the realtime endpoint may call, built once before a session starts
/// and read-only afterwards.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any previous tool with the same name.
    pub fn register(mut self, tool: impl Tool + 'static) -> Self {
        self.insert(Arc::new(tool));
        self
    }

    /// Register a shared tool in place.
    pub fn insert(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "Replacing previously registered tool");
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Definitions in name order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    /// Look up, parse, validate, and run one call.
    pub async fn invoke(
        &self,
        name: &str,
        raw_arguments: &str,
        ctx: &ToolCallContext,
    ) -> Result<serde_json::Value, VoiceError> {
        let tool = self
            .get(name)
            .ok_or_else(|| VoiceError::UnknownTool(name.to_string()))?;
        let args = ToolArguments::parse(raw_arguments)?;
        validate_arguments(args.raw(), &tool.parameters().schema)?;
        tool.execute(&args, ctx).await
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{FunctionTool, ToolParameters};

    fn echo_registry() -> ToolRegistry {
        ToolRegistry::new().register(FunctionTool::new(
            "echo",
            "Echo the message back",
            ToolParameters::object().string("message", "Text", true).build(),
            |args, ctx| async move {
                Ok(serde_json::json!({
                    "message": args.get_str("message")?,
                    "call_id": ctx.call_id,
                }))
            },
        ))
    }

    #[tokio::test]
    async fn invoke_runs_registered_tool() {
        let registry = echo_registry();
        let ctx = ToolCallContext {
            call_id: "call_1".into(),
        };

        let result = registry
            .invoke("echo", r#"{"message":"hi"}"#, &ctx)
            .await
            .unwrap();

        assert_eq!(result, serde_json::json!({"message": "hi", "call_id": "call_1"}));
    }

    #[tokio::test]
    async fn invoke_rejects_unknown_tool() {
        let error = echo_registry()
            .invoke("missing", "{}", &ToolCallContext::default())
            .await
            .unwrap_err();
        assert!(matches!(error, VoiceError::UnknownTool(name) if name == "missing"));
    }

    #[tokio::test]
    async fn invoke_validates_before_running() {
        let error = echo_registry()
            .invoke("echo", "{}", &ToolCallContext::default())
            .await
            .unwrap_err();
        assert!(matches!(error, VoiceError::InvalidArgument(_)));
    }

    #[test]
    fn definitions_are_sorted_by_name() {
        let registry = echo_registry().register(FunctionTool::new(
            "alpha",
            "First",
            ToolParameters::empty(),
            |_, _| async { Ok(serde_json::Value::Null) },
        ));
        let names: Vec<_> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "echo"]);
    }
}
