//! Corpus management and retrieval tools

use super::{missing_corpus, target_corpus, ToolContext, ToolResponse, Toolbox};
use crate::rag::resource::{file_id, file_resource_name, normalize_source, sanitize_display_name, Source};
use crate::rag::{ImportRequest, RetrievalQuery};
use log::{error, info, warn};
use serde::Serialize;

/// One retrieved chunk as presented to the model
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryResult {
    pub source_uri: String,
    pub source_name: String,
    pub text: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CorpusSummary {
    pub resource_name: String,
    pub display_name: String,
    pub create_time: String,
    pub update_time: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FileDetail {
    pub file_id: String,
    pub display_name: String,
    pub source_uri: String,
    pub create_time: String,
    pub update_time: String,
}

impl Toolbox {
    /// Answer a question from a corpus
    pub async fn rag_query(
        &self,
        ctx: &mut ToolContext,
        corpus_name: &str,
        query: &str,
    ) -> ToolResponse {
        let corpus_name = match target_corpus(ctx, corpus_name) {
            Ok(name) => name,
            Err(response) => return response.with("query", query),
        };
        info!("Querying corpus '{}' with '{}'", corpus_name, query);

        let resource = match self.locate_corpus(ctx, &corpus_name).await {
            Ok(Some(resource)) => resource,
            Ok(None) => return missing_corpus(&corpus_name).with("query", query),
            Err(e) => {
                error!("Error querying corpus '{}': {}", corpus_name, e);
                return ToolResponse::error(format!("Error querying corpus: {}", e))
                    .with("query", query)
                    .with("corpus_name", &corpus_name);
            }
        };

        let request = RetrievalQuery {
            text: query.to_string(),
            top_k: self.config.rag.top_k,
            distance_threshold: self.config.rag.distance_threshold,
        };

        match self.service.retrieve_contexts(&resource, &request).await {
            Ok(contexts) => {
                let results: Vec<QueryResult> = contexts
                    .into_iter()
                    .map(|c| QueryResult {
                        source_uri: c.source_uri.unwrap_or_default(),
                        source_name: c.source_display_name.unwrap_or_default(),
                        text: c.text,
                        score: c.score.unwrap_or(0.0),
                    })
                    .collect();

                if results.is_empty() {
                    warn!("No results for query in corpus '{}'", corpus_name);
                    return ToolResponse::warning(format!(
                        "No results found in corpus '{}' for query: '{}'",
                        corpus_name, query
                    ))
                    .with("query", query)
                    .with("corpus_name", &corpus_name)
                    .with("results", Vec::<QueryResult>::new())
                    .with("results_count", 0);
                }

                info!("Query returned {} results", results.len());
                ToolResponse::success(format!("Successfully queried corpus '{}'", corpus_name))
                    .with("query", query)
                    .with("corpus_name", &corpus_name)
                    .with("results_count", results.len())
                    .with("results", results)
            }
            Err(e) => {
                error!("Error querying corpus '{}': {}", corpus_name, e);
                ToolResponse::error(format!("Error querying corpus: {}", e))
                    .with("query", query)
                    .with("corpus_name", &corpus_name)
            }
        }
    }

    /// List every corpus in the project
    pub async fn list_corpora(&self) -> ToolResponse {
        match self.service.list_corpora().await {
            Ok(corpora) => {
                let corpora: Vec<CorpusSummary> = corpora
                    .into_iter()
                    .map(|c| CorpusSummary {
                        resource_name: c.name,
                        display_name: c.display_name,
                        create_time: c.create_time.unwrap_or_default(),
                        update_time: c.update_time.unwrap_or_default(),
                    })
                    .collect();
                info!("Found {} corpora", corpora.len());
                ToolResponse::success(format!("Found {} available corpora", corpora.len()))
                    .with("corpora", corpora)
            }
            Err(e) => {
                error!("Error listing corpora: {}", e);
                ToolResponse::error(format!("Error listing corpora: {}", e))
                    .with("corpora", Vec::<CorpusSummary>::new())
            }
        }
    }

    /// Create a corpus unless one with that name already exists
    pub async fn create_corpus(&self, ctx: &mut ToolContext, corpus_name: &str) -> ToolResponse {
        let corpus_name = corpus_name.trim();
        if corpus_name.is_empty() {
            return ToolResponse::error("Please provide a name for the new corpus.")
                .with("corpus_created", false);
        }

        match self.locate_corpus(ctx, corpus_name).await {
            Ok(Some(_)) => {
                return ToolResponse::info(format!("Corpus '{}' already exists", corpus_name))
                    .with("corpus_name", corpus_name)
                    .with("corpus_created", false);
            }
            Ok(None) => {}
            Err(e) => {
                error!("Error creating corpus '{}': {}", corpus_name, e);
                return ToolResponse::error(format!("Error creating corpus: {}", e))
                    .with("corpus_name", corpus_name)
                    .with("corpus_created", false);
            }
        }

        let display_name = sanitize_display_name(corpus_name);
        match self
            .service
            .create_corpus(&display_name, &self.config.rag.embedding_model)
            .await
        {
            Ok(corpus) => {
                info!("Created corpus {}", corpus.name);
                ctx.remember(corpus_name, &corpus.name);
                ctx.remember(&corpus.name, &corpus.name);
                ctx.set_current_corpus(&corpus.name);
                ToolResponse::success(format!("Successfully created corpus '{}'", corpus_name))
                    .with("corpus_name", &corpus.name)
                    .with("display_name", &corpus.display_name)
                    .with("corpus_created", true)
            }
            Err(e) => {
                error!("Error creating corpus '{}': {}", corpus_name, e);
                ToolResponse::error(format!("Error creating corpus: {}", e))
                    .with("corpus_name", corpus_name)
                    .with("corpus_created", false)
            }
        }
    }

    /// Import Drive or Cloud Storage documents into a corpus
    pub async fn add_data(
        &self,
        ctx: &mut ToolContext,
        corpus_name: &str,
        paths: &[String],
    ) -> ToolResponse {
        if paths.is_empty() {
            return ToolResponse::error("Invalid paths: Please provide a list of URLs or GCS paths")
                .with("corpus_name", corpus_name)
                .with("paths", paths);
        }

        let corpus_name = match target_corpus(ctx, corpus_name) {
            Ok(name) => name,
            Err(response) => return response.with("paths", paths),
        };

        let resource = match self.locate_corpus(ctx, &corpus_name).await {
            Ok(Some(resource)) => resource,
            Ok(None) => return missing_corpus(&corpus_name).with("paths", paths),
            Err(e) => {
                error!("Error adding data to corpus '{}': {}", corpus_name, e);
                return ToolResponse::error(format!("Error adding data to corpus: {}", e))
                    .with("corpus_name", &corpus_name)
                    .with("paths", paths);
            }
        };

        let mut sources: Vec<Source> = Vec::new();
        let mut invalid_paths: Vec<String> = Vec::new();
        let mut conversions: Vec<String> = Vec::new();
        for path in paths {
            match normalize_source(path) {
                Some(source) => {
                    if source.uri() != path.trim() {
                        conversions.push(format!("{} → {}", path, source.uri()));
                    }
                    sources.push(source);
                }
                None => invalid_paths.push(format!("{} (Not a valid Drive URL or GCS path)", path)),
            }
        }

        if sources.is_empty() {
            return ToolResponse::error(
                "No valid paths provided. Please provide Google Drive URLs or GCS paths.",
            )
            .with("corpus_name", &corpus_name)
            .with("invalid_paths", invalid_paths);
        }

        let request = ImportRequest {
            sources,
            chunk_size: self.config.rag.chunk_size,
            chunk_overlap: self.config.rag.chunk_overlap,
            max_embedding_requests_per_min: self.config.rag.embedding_requests_per_min,
        };

        match self.service.import_files(&resource, &request).await {
            Ok(outcome) => {
                let files_added = outcome.imported;
                info!("Imported {} files into {}", files_added, resource);
                ctx.set_current_corpus(&corpus_name);

                let failed_sources = outcome.failed_sources();
                let imported: Vec<&str> = request
                    .sources
                    .iter()
                    .map(Source::uri)
                    .filter(|uri| !failed_sources.iter().any(|f| f.as_str() == *uri))
                    .collect();

                let response = if outcome.failures.is_empty() {
                    ToolResponse::success(format!(
                        "Successfully added {} file(s) to corpus '{}'",
                        files_added, corpus_name
                    ))
                } else {
                    warn!(
                        "{} source(s) failed to import into '{}'",
                        failed_sources.len(),
                        corpus_name
                    );
                    let errors: Vec<String> =
                        outcome.failures.iter().map(|f| f.error.to_string()).collect();
                    ToolResponse::warning(format!(
                        "Added {} file(s) to corpus '{}', but {} source(s) failed to import",
                        files_added,
                        corpus_name,
                        failed_sources.len()
                    ))
                    .with("failed_sources", &failed_sources)
                    .with("import_errors", errors)
                };

                response
                    .with("corpus_name", &corpus_name)
                    .with("files_added", files_added)
                    .with("paths", imported)
                    .with("invalid_paths", invalid_paths)
                    .with("conversions", conversions)
            }
            Err(e) => {
                error!("Error adding data to corpus '{}': {}", corpus_name, e);
                ToolResponse::error(format!("Error adding data to corpus: {}", e))
                    .with("corpus_name", &corpus_name)
                    .with("paths", paths)
            }
        }
    }

    /// Describe a corpus and the files it holds
    pub async fn get_corpus_info(&self, ctx: &mut ToolContext, corpus_name: &str) -> ToolResponse {
        let corpus_name = match target_corpus(ctx, corpus_name) {
            Ok(name) => name,
            Err(response) => return response,
        };

        let resource = match self.locate_corpus(ctx, &corpus_name).await {
            Ok(Some(resource)) => resource,
            Ok(None) => return missing_corpus(&corpus_name),
            Err(e) => {
                error!("Error getting corpus information for '{}': {}", corpus_name, e);
                return ToolResponse::error(format!("Error getting corpus information: {}", e))
                    .with("corpus_name", &corpus_name);
            }
        };

        let display_name = match self.service.list_corpora().await {
            Ok(corpora) => corpora
                .into_iter()
                .find(|c| c.name == resource)
                .map(|c| c.display_name)
                .unwrap_or_default(),
            Err(e) => {
                warn!("Could not fetch display name of {}: {}", resource, e);
                String::new()
            }
        };

        match self.service.list_files(&resource).await {
            Ok(files) => {
                let files: Vec<FileDetail> = files
                    .iter()
                    .map(|f| FileDetail {
                        file_id: file_id(&f.name).to_string(),
                        display_name: f.display_name.clone(),
                        source_uri: f.source_uri().unwrap_or_default(),
                        create_time: f.create_time.clone().unwrap_or_default(),
                        update_time: f.update_time.clone().unwrap_or_default(),
                    })
                    .collect();

                ToolResponse::success(format!(
                    "Successfully retrieved information for corpus '{}'",
                    corpus_name
                ))
                .with("corpus_name", &corpus_name)
                .with("corpus_display_name", display_name)
                .with("file_count", files.len())
                .with("files", files)
            }
            Err(e) => {
                error!("Error getting corpus information for '{}': {}", corpus_name, e);
                ToolResponse::error(format!("Error getting corpus information: {}", e))
                    .with("corpus_name", &corpus_name)
            }
        }
    }

    /// Remove one document from a corpus
    pub async fn delete_document(
        &self,
        ctx: &mut ToolContext,
        corpus_name: &str,
        document_id: &str,
    ) -> ToolResponse {
        let document_id = document_id.trim();
        if document_id.is_empty() {
            return ToolResponse::error("Please provide the ID of the document to delete.")
                .with("corpus_name", corpus_name);
        }

        let corpus_name = match target_corpus(ctx, corpus_name) {
            Ok(name) => name,
            Err(response) => return response.with("document_id", document_id),
        };

        let resource = match self.locate_corpus(ctx, &corpus_name).await {
            Ok(Some(resource)) => resource,
            Ok(None) => return missing_corpus(&corpus_name).with("document_id", document_id),
            Err(e) => {
                error!("Error deleting document '{}': {}", document_id, e);
                return ToolResponse::error(format!("Error deleting document: {}", e))
                    .with("corpus_name", &corpus_name)
                    .with("document_id", document_id);
            }
        };

        let file = file_resource_name(&resource, file_id(document_id));
        match self.service.delete_file(&file).await {
            Ok(()) => {
                info!("Deleted {}", file);
                ToolResponse::success(format!(
                    "Successfully deleted document '{}' from corpus '{}'",
                    document_id, corpus_name
                ))
                .with("corpus_name", &corpus_name)
                .with("document_id", document_id)
            }
            Err(e) => {
                error!("Error deleting document '{}': {}", document_id, e);
                ToolResponse::error(format!("Error deleting document: {}", e))
                    .with("corpus_name", &corpus_name)
                    .with("document_id", document_id)
            }
        }
    }

    /// Delete a corpus and all its files; requires explicit confirmation
    pub async fn delete_corpus(
        &self,
        ctx: &mut ToolContext,
        corpus_name: &str,
        confirm: bool,
    ) -> ToolResponse {
        let corpus_name = corpus_name.trim();

        let resource = match self.locate_corpus(ctx, corpus_name).await {
            Ok(Some(resource)) => resource,
            Ok(None) => return missing_corpus(corpus_name),
            Err(e) => {
                error!("Error deleting corpus '{}': {}", corpus_name, e);
                return ToolResponse::error(format!("Error deleting corpus: {}", e))
                    .with("corpus_name", corpus_name);
            }
        };

        if !confirm {
            return ToolResponse::error(
                "Deletion requires explicit confirmation. Set confirm=true to delete this corpus.",
            )
            .with("corpus_name", corpus_name);
        }

        match self.service.delete_corpus(&resource).await {
            Ok(()) => {
                info!("Deleted corpus {}", resource);
                ctx.forget(&resource);
                ToolResponse::success(format!("Successfully deleted corpus '{}'", corpus_name))
                    .with("corpus_name", corpus_name)
            }
            Err(e) => {
                error!("Error deleting corpus '{}': {}", corpus_name, e);
                ToolResponse::error(format!("Error deleting corpus: {}", e))
                    .with("corpus_name", corpus_name)
            }
        }
    }
}
