/// Configuration loading and validation
#[allow(clippy::module_inception)]
pub mod config;

pub use config::{AgentConfig, AnalysisConfig, Config, RagConfig, ServiceConfig};
