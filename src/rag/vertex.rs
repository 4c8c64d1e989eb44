use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::rag::resource::{parent_of, parse_gcs_uri, Source};
use crate::rag::service::{RagService, ServiceFuture};
use crate::rag::types::{
    Corpus, ImportOutcome, ImportRequest, RagFile, RetrievalQuery, RetrievedContext,
};
use log::{debug, info, warn};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const STORAGE_API: &str = "https://storage.googleapis.com/storage/v1";
const DRIVE_API: &str = "https://www.googleapis.com/drive/v3";
const PAGE_SIZE: &str = "100";
const GOOGLE_APPS_MIME: &str = "application/vnd.google-apps.";

/// REST client for the Vertex AI RAG Engine
///
/// Long-running operations (create, delete, import) are polled until the
/// service reports them done or the poll budget runs out.
pub struct VertexRagService {
    client: Client,
    base_url: String,
    parent: String,
    access_token: Option<String>,
    storage_url: String,
    drive_url: String,
    poll_interval: Duration,
    max_polls: u32,
}

/// Long-running operation envelope
#[derive(Debug, Deserialize)]
struct Operation {
    #[serde(default)]
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationStatus>,
    #[serde(default)]
    response: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

impl VertexRagService {
    /// Create a client for the configured project and location
    ///
    /// # Errors
    ///
    /// `ServiceError::HttpError` if the HTTP client cannot be built.
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            parent: config.parent(),
            access_token: config.access_token.clone(),
            storage_url: STORAGE_API.to_string(),
            drive_url: DRIVE_API.to_string(),
            poll_interval: Duration::from_secs(2),
            max_polls: 90,
        })
    }

    /// Change how long-running operations are awaited
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn configured_parent(&self) -> Result<&str, ServiceError> {
        if self.parent.starts_with("projects//") {
            return Err(ServiceError::NotConfigured(
                "no project id (set GOOGLE_CLOUD_PROJECT or service.project_id)".to_string(),
            ));
        }
        Ok(&self.parent)
    }

    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, ServiceError> {
        match &self.access_token {
            Some(token) => Ok(request.bearer_auth(token)),
            None => Err(ServiceError::NotConfigured(
                "no access token (set GOOGLE_ACCESS_TOKEN or service.access_token)".to_string(),
            )),
        }
    }

    /// Send a request and return the raw body of a successful response
    async fn send(&self, request: RequestBuilder) -> Result<Vec<u8>, ServiceError> {
        let response = self.authorize(request)?.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if status.is_success() {
            return Ok(body.to_vec());
        }

        let message = api_error_message(&String::from_utf8_lossy(&body));
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound(message));
        }
        Err(ServiceError::ApiError {
            status: status.as_u16(),
            message,
        })
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ServiceError> {
        let body = self.send(request).await?;
        let text = String::from_utf8_lossy(&body);
        let text: &str = if text.trim().is_empty() { "{}" } else { &text };
        serde_json::from_str(text)
            .map_err(|e| ServiceError::InvalidResponse(format!("{}: {}", e, text)))
    }

    async fn list_paged<T>(&self, url: &str, key: &str) -> Result<Vec<T>, ServiceError>
    where
        T: DeserializeOwned + Send,
    {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.get(url).query(&[("pageSize", PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: Value = self.execute(request).await?;
            if let Some(list) = page.get(key) {
                let batch: Vec<T> = serde_json::from_value(list.clone()).map_err(|e| {
                    ServiceError::InvalidResponse(format!("Failed to parse '{}': {}", key, e))
                })?;
                items.extend(batch);
            }

            match page.get("nextPageToken").and_then(Value::as_str) {
                Some(next) if !next.is_empty() => page_token = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(items)
    }

    /// Poll an operation until done and return its response payload
    async fn wait_for(&self, mut operation: Operation) -> Result<Option<Value>, ServiceError> {
        let mut polls = 0;
        while !operation.done {
            if polls >= self.max_polls {
                return Err(ServiceError::OperationIncomplete(operation.name));
            }
            tokio::time::sleep(self.poll_interval).await;
            debug!("Polling operation {}", operation.name);
            let url = self.url(&operation.name);
            operation = self.execute(self.client.get(url)).await?;
            polls += 1;
        }

        if let Some(status) = operation.error {
            return Err(ServiceError::ApiError {
                status: u16::try_from(status.code).unwrap_or_default(),
                message: status.message,
            });
        }
        Ok(operation.response)
    }

    async fn download(&self, request: RequestBuilder) -> Result<String, ServiceError> {
        let body = self.send(request.query(&[("alt", "media")])).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn import_batch(&self, url: &str, body: &Value) -> Result<u64, ServiceError> {
        let operation: Operation = self.execute(self.client.post(url).json(body)).await?;
        let response = match self.wait_for(operation).await? {
            Some(response) => response,
            None => return Ok(0),
        };
        let count = count_field(&response, "importedRagFilesCount");
        debug!(
            "Import finished: {} imported, {} failed, {} skipped",
            count,
            count_field(&response, "failedRagFilesCount"),
            count_field(&response, "skippedRagFilesCount")
        );
        Ok(count)
    }

    /// Read a Drive file, exporting Docs editor files as text
    async fn read_drive_file(&self, resource_id: &str) -> Result<String, ServiceError> {
        let url = format!("{}/files/{}", self.drive_url, urlencoding::encode(resource_id));
        let metadata: Value = self
            .execute(self.client.get(&url).query(&[("fields", "mimeType")]))
            .await?;
        let mime_type = metadata["mimeType"].as_str().unwrap_or_default();

        if !mime_type.starts_with(GOOGLE_APPS_MIME) {
            debug!("Downloading Drive file {}", resource_id);
            return self.download(self.client.get(url)).await;
        }

        let export = drive_export_mime(mime_type).ok_or_else(|| {
            ServiceError::InvalidResponse(format!(
                "Drive file {} is of type {} and cannot be read back as text",
                resource_id, mime_type
            ))
        })?;
        debug!("Exporting Drive file {} as {}", resource_id, export);
        let request = self
            .client
            .get(format!("{}/export", url))
            .query(&[("mimeType", export)]);
        let body = self.send(request).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

/// Pull `error.message` out of a Google API error body, falling back to the raw text
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Read an int64 counter that the API may encode as a string or a number
fn count_field(value: &Value, key: &str) -> u64 {
    match value.get(key) {
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}

fn embedding_endpoint(parent: &str, model: &str) -> String {
    if model.starts_with("projects/") {
        model.to_string()
    } else {
        format!("{}/{}", parent, model.trim_start_matches('/'))
    }
}

fn create_corpus_body(display_name: &str, endpoint: &str) -> Value {
    json!({
        "displayName": display_name,
        "vectorDbConfig": {
            "ragEmbeddingModelConfig": {
                "vertexPredictionEndpoint": { "endpoint": endpoint }
            }
        }
    })
}

/// Import body for one batch of sources of the same kind
fn import_body(request: &ImportRequest, batch: &[&Source]) -> Value {
    let transformation = json!({
        "ragFileChunkingConfig": {
            "fixedLengthChunking": {
                "chunkSize": request.chunk_size,
                "chunkOverlap": request.chunk_overlap
            }
        }
    });

    let gcs: Vec<&str> = batch
        .iter()
        .filter_map(|s| match s {
            Source::Gcs { uri } => Some(uri.as_str()),
            Source::Drive { .. } => None,
        })
        .collect();
    let drive: Vec<Value> = batch
        .iter()
        .filter_map(|s| match s {
            Source::Drive { id, .. } => Some(json!({
                "resourceId": id,
                "resourceType": "RESOURCE_TYPE_FILE"
            })),
            Source::Gcs { .. } => None,
        })
        .collect();

    let mut config = json!({
        "ragFileTransformationConfig": transformation,
        "maxEmbeddingRequestsPerMin": request.max_embedding_requests_per_min
    });
    if !gcs.is_empty() {
        config["gcsSource"] = json!({ "uris": gcs });
    }
    if !drive.is_empty() {
        config["googleDriveSource"] = json!({ "resourceIds": drive });
    }
    json!({ "importRagFilesConfig": config })
}

/// Export format for Google Docs editor files, which cannot be downloaded directly
fn drive_export_mime(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "application/vnd.google-apps.document" | "application/vnd.google-apps.presentation" => {
            Some("text/plain")
        }
        "application/vnd.google-apps.spreadsheet" => Some("text/csv"),
        _ => None,
    }
}

fn retrieve_body(corpus: &str, query: &RetrievalQuery) -> Value {
    json!({
        "vertexRagStore": {
            "ragResources": [{ "ragCorpus": corpus }]
        },
        "query": {
            "text": query.text,
            "ragRetrievalConfig": {
                "topK": query.top_k,
                "filter": { "vectorDistanceThreshold": query.distance_threshold }
            }
        }
    })
}

fn parse_contexts(response: &Value) -> Result<Vec<RetrievedContext>, ServiceError> {
    match response.get("contexts").and_then(|c| c.get("contexts")) {
        Some(list) => serde_json::from_value(list.clone())
            .map_err(|e| ServiceError::InvalidResponse(format!("Failed to parse contexts: {}", e))),
        None => Ok(Vec::new()),
    }
}

impl RagService for VertexRagService {
    fn list_corpora(&self) -> ServiceFuture<'_, Vec<Corpus>> {
        Box::pin(async move {
            let url = self.url(&format!("{}/ragCorpora", self.configured_parent()?));
            self.list_paged(&url, "ragCorpora").await
        })
    }

    fn create_corpus<'a>(
        &'a self,
        display_name: &'a str,
        embedding_model: &'a str,
    ) -> ServiceFuture<'a, Corpus> {
        Box::pin(async move {
            let parent = self.configured_parent()?;
            let body = create_corpus_body(display_name, &embedding_endpoint(parent, embedding_model));
            let url = self.url(&format!("{}/ragCorpora", parent));

            info!("Creating corpus '{}'", display_name);
            let operation: Operation = self.execute(self.client.post(url).json(&body)).await?;
            let response = self.wait_for(operation).await?.ok_or_else(|| {
                ServiceError::InvalidResponse("create operation returned no corpus".to_string())
            })?;

            serde_json::from_value(response)
                .map_err(|e| ServiceError::InvalidResponse(format!("Failed to parse corpus: {}", e)))
        })
    }

    fn delete_corpus<'a>(&'a self, corpus: &'a str) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            info!("Deleting corpus {}", corpus);
            let request = self.client.delete(self.url(corpus)).query(&[("force", "true")]);
            let operation: Operation = self.execute(request).await?;
            self.wait_for(operation).await?;
            Ok(())
        })
    }

    fn list_files<'a>(&'a self, corpus: &'a str) -> ServiceFuture<'a, Vec<RagFile>> {
        Box::pin(async move {
            let url = self.url(&format!("{}/ragFiles", corpus));
            self.list_paged(&url, "ragFiles").await
        })
    }

    fn delete_file<'a>(&'a self, file: &'a str) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            info!("Deleting file {}", file);
            let operation: Operation = self.execute(self.client.delete(self.url(file))).await?;
            self.wait_for(operation).await?;
            Ok(())
        })
    }

    fn import_files<'a>(
        &'a self,
        corpus: &'a str,
        request: &'a ImportRequest,
    ) -> ServiceFuture<'a, ImportOutcome> {
        Box::pin(async move {
            let url = self.url(&format!("{}/ragFiles:import", corpus));
            let batches = request.batches();
            let mut outcome = ImportOutcome::default();

            for batch in &batches {
                let body = import_body(request, batch);
                match self.import_batch(&url, &body).await {
                    Ok(count) => outcome.imported += count,
                    Err(e) => {
                        warn!("Import of {} source(s) failed: {}", batch.len(), e);
                        outcome.record_failure(batch, e);
                    }
                }
            }

            outcome.into_result(batches.len())
        })
    }

    fn retrieve_contexts<'a>(
        &'a self,
        corpus: &'a str,
        query: &'a RetrievalQuery,
    ) -> ServiceFuture<'a, Vec<RetrievedContext>> {
        Box::pin(async move {
            let parent = match parent_of(corpus) {
                Some(parent) => parent,
                None => self.configured_parent()?.to_string(),
            };
            let url = self.url(&format!("{}:retrieveContexts", parent));
            let body = retrieve_body(corpus, query);
            let response: Value = self.execute(self.client.post(url).json(&body)).await?;
            parse_contexts(&response)
        })
    }

    fn read_file<'a>(&'a self, file: &'a RagFile) -> ServiceFuture<'a, String> {
        Box::pin(async move {
            if let Some(uri) = file.gcs_source.as_ref().and_then(|s| s.uris.first()) {
                let (bucket, object) = parse_gcs_uri(uri).ok_or_else(|| {
                    ServiceError::InvalidResponse(format!("Malformed Cloud Storage URI: {}", uri))
                })?;
                let url = format!(
                    "{}/b/{}/o/{}",
                    self.storage_url,
                    urlencoding::encode(bucket),
                    urlencoding::encode(object)
                );
                debug!("Downloading {} from Cloud Storage", uri);
                return self.download(self.client.get(url)).await;
            }

            if let Some(id) = file
                .google_drive_source
                .as_ref()
                .and_then(|s| s.resource_ids.first())
            {
                return self.read_drive_file(&id.resource_id).await;
            }

            Err(ServiceError::NotFound(format!(
                "File '{}' has no downloadable source",
                file.name
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_config() -> ServiceConfig {
        ServiceConfig {
            project_id: "demo".to_string(),
            access_token: Some("token".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_service_urls() {
        let service = VertexRagService::new(&service_config()).unwrap();
        assert_eq!(
            service.url("projects/demo/locations/us-central1/ragCorpora"),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/demo/locations/us-central1/ragCorpora"
        );
        assert_eq!(
            service.configured_parent().unwrap(),
            "projects/demo/locations/us-central1"
        );
    }

    #[test]
    fn test_missing_project_is_reported() {
        let config = ServiceConfig::default();
        let service = VertexRagService::new(&config).unwrap();
        assert!(matches!(
            service.configured_parent(),
            Err(ServiceError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_network() {
        let config = ServiceConfig {
            project_id: "demo".to_string(),
            endpoint: Some("http://127.0.0.1:9".to_string()),
            ..Default::default()
        };
        let service = VertexRagService::new(&config).unwrap();
        let result = service.list_corpora().await;
        assert!(matches!(result, Err(ServiceError::NotConfigured(_))));
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error": {"code": 404, "message": "RagCorpus not found", "status": "NOT_FOUND"}}"#;
        assert_eq!(api_error_message(body), "RagCorpus not found");
        assert_eq!(api_error_message(" upstream timeout \n"), "upstream timeout");
    }

    #[test]
    fn test_count_field() {
        let value = json!({"importedRagFilesCount": "3", "failedRagFilesCount": 2});
        assert_eq!(count_field(&value, "importedRagFilesCount"), 3);
        assert_eq!(count_field(&value, "failedRagFilesCount"), 2);
        assert_eq!(count_field(&value, "skippedRagFilesCount"), 0);
    }

    #[test]
    fn test_embedding_endpoint() {
        let parent = "projects/demo/locations/us-central1";
        assert_eq!(
            embedding_endpoint(parent, "publishers/google/models/text-embedding-005"),
            "projects/demo/locations/us-central1/publishers/google/models/text-embedding-005"
        );
        assert_eq!(
            embedding_endpoint(parent, "projects/other/locations/x/endpoints/1"),
            "projects/other/locations/x/endpoints/1"
        );
    }

    #[test]
    fn test_create_corpus_body() {
        let body = create_corpus_body("logs", "projects/p/locations/l/publishers/google/models/m");
        assert_eq!(body["displayName"], "logs");
        assert_eq!(
            body["vectorDbConfig"]["ragEmbeddingModelConfig"]["vertexPredictionEndpoint"]["endpoint"],
            "projects/p/locations/l/publishers/google/models/m"
        );
    }

    fn import_bodies(request: &ImportRequest) -> Vec<Value> {
        request
            .batches()
            .iter()
            .map(|batch| import_body(request, batch))
            .collect()
    }

    #[test]
    fn test_drive_export_formats() {
        assert_eq!(
            drive_export_mime("application/vnd.google-apps.document"),
            Some("text/plain")
        );
        assert_eq!(
            drive_export_mime("application/vnd.google-apps.spreadsheet"),
            Some("text/csv")
        );
        assert_eq!(drive_export_mime("application/vnd.google-apps.drawing"), None);
        assert_eq!(drive_export_mime("text/plain"), None);
    }

    #[test]
    fn test_import_bodies_split_by_source_kind() {
        let request = ImportRequest {
            sources: vec![
                Source::Gcs {
                    uri: "gs://b/a.log".to_string(),
                },
                Source::Drive {
                    id: "abc".to_string(),
                    url: "https://drive.google.com/file/d/abc/view".to_string(),
                },
                Source::Gcs {
                    uri: "gs://b/c.log".to_string(),
                },
            ],
            chunk_size: 512,
            chunk_overlap: 100,
            max_embedding_requests_per_min: 1000,
        };

        let bodies = import_bodies(&request);
        assert_eq!(bodies.len(), 2);

        let gcs = &bodies[0]["importRagFilesConfig"];
        assert_eq!(gcs["gcsSource"]["uris"], json!(["gs://b/a.log", "gs://b/c.log"]));
        assert_eq!(
            gcs["ragFileTransformationConfig"]["ragFileChunkingConfig"]["fixedLengthChunking"]["chunkSize"],
            512
        );
        assert_eq!(gcs["maxEmbeddingRequestsPerMin"], 1000);

        let drive = &bodies[1]["importRagFilesConfig"];
        assert_eq!(drive["googleDriveSource"]["resourceIds"][0]["resourceId"], "abc");
        assert!(drive.get("gcsSource").is_none());
    }

    #[test]
    fn test_import_bodies_empty() {
        let request = ImportRequest {
            sources: Vec::new(),
            chunk_size: 512,
            chunk_overlap: 100,
            max_embedding_requests_per_min: 1000,
        };
        assert!(import_bodies(&request).is_empty());
    }

    #[test]
    fn test_retrieve_body() {
        let query = RetrievalQuery {
            text: "why did the job fail?".to_string(),
            top_k: 3,
            distance_threshold: 0.5,
        };
        let body = retrieve_body("projects/p/locations/l/ragCorpora/1", &query);
        assert_eq!(
            body["vertexRagStore"]["ragResources"][0]["ragCorpus"],
            "projects/p/locations/l/ragCorpora/1"
        );
        assert_eq!(body["query"]["text"], "why did the job fail?");
        assert_eq!(body["query"]["ragRetrievalConfig"]["topK"], 3);
        assert_eq!(
            body["query"]["ragRetrievalConfig"]["filter"]["vectorDistanceThreshold"],
            0.5
        );
    }

    #[test]
    fn test_parse_contexts() {
        let response = json!({
            "contexts": {
                "contexts": [
                    {"sourceUri": "gs://b/a.log", "sourceDisplayName": "a.log", "text": "line", "score": 0.12}
                ]
            }
        });
        let contexts = parse_contexts(&response).unwrap();
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].source_display_name.as_deref(), Some("a.log"));

        assert!(parse_contexts(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_operation_deserialization() {
        let operation: Operation = serde_json::from_value(json!({
            "name": "projects/p/locations/l/operations/1",
            "done": true,
            "error": {"code": 3, "message": "bad request"}
        }))
        .unwrap();
        assert!(operation.done);
        assert_eq!(operation.error.unwrap().code, 3);

        let pending: Operation = serde_json::from_value(json!({"name": "op"})).unwrap();
        assert!(!pending.done);
    }
}
