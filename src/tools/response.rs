use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Outcome class of a tool call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
    /// Call worked but found nothing useful
    Warning,
    /// Nothing to do, e.g. the corpus already existed
    Info,
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ToolStatus::Success => "success",
            ToolStatus::Error => "error",
            ToolStatus::Warning => "warning",
            ToolStatus::Info => "info",
        };
        write!(f, "{}", label)
    }
}

/// JSON object handed back to the model runtime
///
/// Tool-specific fields are flattened next to `status` and `message`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResponse {
    pub status: ToolStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ToolResponse {
    fn new(status: ToolStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            fields: Map::new(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(ToolStatus::Success, Some(message.into()))
    }

    /// Success without a message, for payload-only responses
    pub fn success_empty() -> Self {
        Self::new(ToolStatus::Success, None)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ToolStatus::Error, Some(message.into()))
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(ToolStatus::Warning, Some(message.into()))
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(ToolStatus::Info, Some(message.into()))
    }

    /// Attach a field; values that cannot be represented as JSON become null
    pub fn with<T: Serialize>(mut self, key: &str, value: T) -> Self {
        let value = serde_json::to_value(value).unwrap_or_else(|e| {
            warn!("Dropping unserializable field '{}': {}", key, e);
            Value::Null
        });
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == ToolStatus::Error
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
