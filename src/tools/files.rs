//! Tools that read document content back out of a corpus

use super::{missing_corpus, target_corpus, ToolContext, ToolResponse, Toolbox};
use crate::error::ServiceError;
use crate::rag::resource::file_id;
use crate::rag::RagFile;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::path::Path;

/// One exported file
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExportedFile {
    pub file_id: String,
    pub display_name: String,
    pub content: String,
}

/// Match a file by full resource name, file id or display name
fn find_file<'a>(files: &'a [RagFile], filename: &str) -> Option<&'a RagFile> {
    files.iter().find(|f| {
        f.name == filename || file_id(&f.name) == filename || f.display_name == filename
    })
}

fn listing_failed(corpus_name: &str, e: ServiceError) -> ToolResponse {
    error!("Error listing files of '{}': {}", corpus_name, e);
    ToolResponse::error(e.to_string()).with("corpus_name", corpus_name)
}

impl Toolbox {
    /// Resolve the corpus and list its files, or build the error response
    async fn corpus_files(
        &self,
        ctx: &mut ToolContext,
        corpus_name: &str,
    ) -> Result<(String, Vec<RagFile>), ToolResponse> {
        let corpus_name = target_corpus(ctx, corpus_name)?;
        let resource = match self.locate_corpus(ctx, &corpus_name).await {
            Ok(Some(resource)) => resource,
            Ok(None) => return Err(missing_corpus(&corpus_name)),
            Err(e) => return Err(listing_failed(&corpus_name, e)),
        };

        match self.service.list_files(&resource).await {
            Ok(files) => Ok((resource, files)),
            Err(e) => Err(listing_failed(&corpus_name, e)),
        }
    }

    /// Return the text of one file in a corpus
    pub async fn get_log_content_by_filename(
        &self,
        ctx: &mut ToolContext,
        filename: &str,
        corpus_name: &str,
    ) -> ToolResponse {
        info!("Retrieving content of '{}'", filename);
        let (_, files) = match self.corpus_files(ctx, corpus_name).await {
            Ok(found) => found,
            Err(response) => return response,
        };
        debug!("Corpus holds {} files", files.len());

        let filename = filename.trim();
        let file = match find_file(&files, filename) {
            Some(file) => file,
            None => {
                return ToolResponse::error(format!("File '{}' not found in corpus.", filename))
                    .with("filename", filename)
            }
        };

        match self.service.read_file(file).await {
            Ok(content) => ToolResponse::success_empty()
                .with("filename", filename)
                .with("file_id", file_id(&file.name))
                .with("content", content),
            Err(e) => {
                error!("Failed to read {}: {}", file.name, e);
                ToolResponse::error(e.to_string()).with("filename", filename)
            }
        }
    }

    /// Write the content of every file in a corpus to a JSON array on disk
    pub async fn export_corpus_files(
        &self,
        ctx: &mut ToolContext,
        corpus_name: &str,
        output_path: &Path,
    ) -> ToolResponse {
        let (resource, files) = match self.corpus_files(ctx, corpus_name).await {
            Ok(found) => found,
            Err(response) => return response,
        };

        let mut exported = Vec::with_capacity(files.len());
        let mut failed_files = Vec::new();
        for file in &files {
            let id = file_id(&file.name);
            match self.service.read_file(file).await {
                Ok(content) => exported.push(ExportedFile {
                    file_id: id.to_string(),
                    display_name: file.display_name.clone(),
                    content,
                }),
                Err(e) => {
                    warn!("Failed to fetch file {}: {}", id, e);
                    failed_files.push(id.to_string());
                }
            }
        }

        let written = serde_json::to_string_pretty(&exported)
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(output_path, json).map_err(|e| e.to_string()));
        if let Err(e) = written {
            error!("Failed to write {}: {}", output_path.display(), e);
            return ToolResponse::error(format!(
                "Failed to write {}: {}",
                output_path.display(),
                e
            ))
            .with("corpus_name", &resource);
        }

        info!("Exported {} files from {}", exported.len(), resource);
        ToolResponse::success(format!(
            "Saved {} log files to {}",
            exported.len(),
            output_path.display()
        ))
        .with("corpus_name", &resource)
        .with("output_path", output_path)
        .with("files_saved", exported.len())
        .with("failed_files", failed_files)
    }
}
