/// Error types for the service client, tools and log analysis
pub mod error;

/// Configuration management
pub mod config;

/// Parsed log records
pub mod records;

/// Log parsing, aggregation and chart rendering
pub mod logs;

/// Retrieval service client and corpus naming helpers
pub mod rag;

/// Tool handlers and their session state
pub mod tools;

/// Agent definition and tool dispatch
pub mod agent;

// Re-export commonly used types
pub use agent::{Agent, ToolSpec};
pub use config::Config;
pub use error::{AnalysisError, ConfigError, ServiceError, ToolError};
pub use rag::{MockRagService, RagService, VertexRagService};
pub use tools::{ToolContext, ToolResponse, ToolStatus, Toolbox};
