//! Locally registered functions the realtime endpoint may invoke.

pub mod arguments;
pub mod registry;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use registry::ToolRegistry;
pub use tool::{FunctionTool, Tool, ToolCallContext};
pub use types::{ParameterBuilder, ToolDefinition, ToolParameters};
