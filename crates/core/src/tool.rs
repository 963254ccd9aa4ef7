//! The contract between the orchestrator and the callable tools of a profile.

use crate::error::ToolError;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Serialize, de::DeserializeOwned};

/// What the model is told about a tool: its name, purpose and parameter schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Builds a definition whose parameter schema is derived from `T`.
    pub fn for_arguments<T: JsonSchema>(name: &str, description: &str) -> Self {
        let schema = schemars::schema_for!(T);
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: serde_json::to_value(schema).unwrap_or_default(),
        }
    }
}

/// A model-callable capability.
///
/// Tools receive the raw argument string exactly as the model produced it and
/// return free-form text for the model. Malformed input is reported as
/// [`ToolError::InvalidArguments`], never by panicking.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn execute(&self, arguments: &str) -> Result<String, ToolError>;
}

/// Parses the model's raw argument string into a tool's argument type.
pub fn parse_arguments<T: DeserializeOwned>(raw: &str) -> Result<T, ToolError> {
    serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// The output item text sent to the model when a tool fails.
pub fn error_output(err: &ToolError) -> String {
    serde_json::json!({ "error": err.to_string() }).to_string()
}
