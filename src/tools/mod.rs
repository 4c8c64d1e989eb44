//! Tool handlers exposed to the agent
//!
//! Every handler returns a `ToolResponse`; service and analysis errors are
//! reported as `status: "error"` instead of being propagated.

pub mod analysis;
pub mod context;
pub mod corpus;
pub mod files;
pub mod response;

pub use context::ToolContext;
pub use response::{ToolResponse, ToolStatus};

use crate::config::Config;
use crate::error::ServiceError;
use crate::rag::resource::corpus_resource_name;
use crate::rag::RagService;
use log::debug;
use std::sync::Arc;

/// Handlers bound to one retrieval service and configuration
#[derive(Clone)]
pub struct Toolbox {
    service: Arc<dyn RagService>,
    config: Config,
}

impl Toolbox {
    pub fn new(service: Arc<dyn RagService>, config: Config) -> Self {
        Self { service, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Find the resource name of an existing corpus
    ///
    /// Returns `Ok(None)` when no corpus matches. Matches are cached in the
    /// context, and the first corpus found becomes the current corpus if none
    /// is set yet.
    async fn locate_corpus(
        &self,
        ctx: &mut ToolContext,
        corpus_name: &str,
    ) -> Result<Option<String>, ServiceError> {
        if let Some(resource) = ctx.known(corpus_name) {
            return Ok(Some(resource.to_string()));
        }

        let corpora = self.service.list_corpora().await?;
        let resource = corpus_resource_name(corpus_name, &corpora, &self.config.service.parent());
        let found = corpora
            .iter()
            .find(|c| c.name == resource || c.display_name == corpus_name)
            .map(|c| c.name.clone());

        if let Some(resource) = &found {
            debug!("Corpus '{}' resolved to {}", corpus_name, resource);
            ctx.remember(corpus_name, resource);
            if ctx.current_corpus().is_none() {
                ctx.set_current_corpus(corpus_name);
            }
        }
        Ok(found)
    }
}

/// Pick the explicit corpus name, falling back to the session's current corpus
fn target_corpus(ctx: &ToolContext, corpus_name: &str) -> Result<String, ToolResponse> {
    let name = corpus_name.trim();
    if !name.is_empty() {
        return Ok(name.to_string());
    }
    ctx.current_corpus().map(str::to_string).ok_or_else(|| {
        ToolResponse::error(
            "No corpus specified and no current corpus is set. Please specify a corpus name.",
        )
    })
}

fn missing_corpus(corpus_name: &str) -> ToolResponse {
    ToolResponse::error(format!(
        "Corpus '{}' does not exist. Please create it first using the create_corpus tool.",
        corpus_name
    ))
    .with("corpus_name", corpus_name)
}
