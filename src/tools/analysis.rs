use super::{ToolContext, ToolResponse, Toolbox};
use crate::error::AnalysisError;
use crate::logs;
use log::{error, info};

impl Toolbox {
    /// Chart a pipe-delimited log and summarize its errors
    ///
    /// Content comes from `log_content`, or from the corpus file `filename`
    /// when no content is passed. Charts are written to the configured output
    /// directory.
    pub async fn analyze_logs(
        &self,
        ctx: &mut ToolContext,
        corpus_name: &str,
        log_content: Option<&str>,
        filename: Option<&str>,
    ) -> ToolResponse {
        let corpus_name = match corpus_name.trim() {
            "" => ctx.current_corpus().unwrap_or_default().to_string(),
            name => name.to_string(),
        };

        let content = match (log_content, filename) {
            (Some(content), _) => Some(content.to_string()),
            (None, Some(filename)) => {
                let fetched = self
                    .get_log_content_by_filename(ctx, filename, &corpus_name)
                    .await;
                if !fetched.is_success() {
                    return fetched;
                }
                fetched
                    .field("content")
                    .and_then(|c| c.as_str())
                    .map(str::to_string)
            }
            (None, None) => None,
        };

        let output_dir = self.config.analysis.output_dir.clone();
        let name = corpus_name.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            logs::analyze_logs(&name, content.as_deref(), &output_dir)
        })
        .await;

        match outcome {
            Ok(Ok(summary)) => {
                info!("Log analysis finished for '{}'", corpus_name);
                ToolResponse::success_empty()
                    .with("corpus_name", &corpus_name)
                    .with("summary", summary)
            }
            Ok(Err(e @ (AnalysisError::MissingContent | AnalysisError::InvalidFormat))) => {
                ToolResponse::error(e.to_string()).with("corpus_name", &corpus_name)
            }
            Ok(Err(e)) => {
                error!("Log analysis failed: {}", e);
                ToolResponse::error(format!("Exception occurred: {}", e))
                    .with("corpus_name", &corpus_name)
            }
            Err(e) => {
                error!("Log analysis task failed: {}", e);
                ToolResponse::error(format!("Exception occurred: {}", e))
                    .with("corpus_name", &corpus_name)
            }
        }
    }
}
