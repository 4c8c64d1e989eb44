use thiserror::Error;

/// Errors that can occur when talking to the retrieval service
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Service returned error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Operation did not complete: {0}")]
    OperationIncomplete(String),

    #[error("Service not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::HttpError(err.to_string())
    }
}

/// Errors that can occur during log analysis
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("No log content provided.")]
    MissingContent,

    #[error("Log file is empty or has invalid format.")]
    InvalidFormat,

    #[error("Failed to render chart {chart}: {message}")]
    RenderError { chart: String, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors raised while decoding or dispatching a tool call
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for tool '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_error_messages() {
        assert_eq!(
            AnalysisError::MissingContent.to_string(),
            "No log content provided."
        );
        assert_eq!(
            AnalysisError::InvalidFormat.to_string(),
            "Log file is empty or has invalid format."
        );
    }

    #[test]
    fn test_api_error_includes_status() {
        let err = ServiceError::ApiError {
            status: 404,
            message: "corpus missing".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("404"));
        assert!(text.contains("corpus missing"));
    }
}
