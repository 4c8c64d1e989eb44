//! Wire types of the managed retrieval service

use crate::error::ServiceError;
use crate::rag::resource::Source;
use serde::{Deserialize, Serialize};

/// A corpus as returned by the service
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Corpus {
    /// Full resource name, `projects/*/locations/*/ragCorpora/*`
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

/// Cloud Storage origin of an imported file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GcsSource {
    #[serde(default)]
    pub uris: Vec<String>,
}

/// Drive origin of an imported file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GoogleDriveSource {
    #[serde(default)]
    pub resource_ids: Vec<DriveResourceId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriveResourceId {
    pub resource_id: String,
    #[serde(default)]
    pub resource_type: String,
}

/// A document stored in a corpus
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RagFile {
    /// Full resource name, `<corpus>/ragFiles/<id>`
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcs_source: Option<GcsSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_drive_source: Option<GoogleDriveSource>,
}

impl RagFile {
    /// Where the file was imported from, if the service reported it
    pub fn source_uri(&self) -> Option<String> {
        if let Some(uri) = self.gcs_source.as_ref().and_then(|s| s.uris.first()) {
            return Some(uri.clone());
        }
        self.google_drive_source
            .as_ref()
            .and_then(|s| s.resource_ids.first())
            .map(|id| format!("https://drive.google.com/file/d/{}/view", id.resource_id))
    }
}

/// A chunk returned by a retrieval query
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedContext {
    #[serde(default)]
    pub source_uri: Option<String>,
    #[serde(default)]
    pub source_display_name: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub score: Option<f64>,
}

/// Parameters of a retrieval query
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalQuery {
    pub text: String,
    pub top_k: u32,
    pub distance_threshold: f64,
}

/// Parameters of a file import
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRequest {
    pub sources: Vec<Source>,
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    pub max_embedding_requests_per_min: u32,
}

impl ImportRequest {
    /// Sources grouped into one batch per kind, Cloud Storage first
    ///
    /// The service accepts a single source type per import call.
    pub fn batches(&self) -> Vec<Vec<&Source>> {
        let gcs: Vec<&Source> = self
            .sources
            .iter()
            .filter(|s| matches!(s, Source::Gcs { .. }))
            .collect();
        let drive: Vec<&Source> = self
            .sources
            .iter()
            .filter(|s| matches!(s, Source::Drive { .. }))
            .collect();
        [gcs, drive].into_iter().filter(|b| !b.is_empty()).collect()
    }
}

/// Sources of one import batch that the service rejected
#[derive(Debug, Clone)]
pub struct ImportFailure {
    pub sources: Vec<String>,
    pub error: ServiceError,
}

/// Files ingested by an import, plus any batches that failed after others succeeded
#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    pub imported: u64,
    pub failures: Vec<ImportFailure>,
}

impl ImportOutcome {
    pub fn record_failure(&mut self, batch: &[&Source], error: ServiceError) {
        self.failures.push(ImportFailure {
            sources: batch.iter().map(|s| s.uri().to_string()).collect(),
            error,
        });
    }

    /// Fail outright when every one of `batches` failed; otherwise keep the partial result
    pub fn into_result(mut self, batches: usize) -> Result<Self, ServiceError> {
        if batches > 0 && self.failures.len() == batches {
            return Err(self.failures.swap_remove(0).error);
        }
        Ok(self)
    }

    pub fn failed_sources(&self) -> Vec<String> {
        self.failures
            .iter()
            .flat_map(|f| f.sources.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corpus_deserialization() {
        let corpus: Corpus = serde_json::from_str(
            r#"{
                "name": "projects/p/locations/l/ragCorpora/1",
                "displayName": "logs",
                "createTime": "2024-01-01T00:00:00Z",
                "vectorDbConfig": {"ragManagedDb": {}}
            }"#,
        )
        .unwrap();
        assert_eq!(corpus.display_name, "logs");
        assert_eq!(corpus.create_time.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert!(corpus.update_time.is_none());
    }

    #[test]
    fn test_rag_file_source_uri() {
        let file: RagFile = serde_json::from_str(
            r#"{
                "name": "projects/p/locations/l/ragCorpora/1/ragFiles/9",
                "displayName": "app.log",
                "gcsSource": {"uris": ["gs://bucket/app.log"]}
            }"#,
        )
        .unwrap();
        assert_eq!(file.source_uri().as_deref(), Some("gs://bucket/app.log"));

        let drive: RagFile = serde_json::from_str(
            r#"{
                "name": "x/ragFiles/2",
                "googleDriveSource": {"resourceIds": [{"resourceId": "abc", "resourceType": "RESOURCE_TYPE_FILE"}]}
            }"#,
        )
        .unwrap();
        assert_eq!(
            drive.source_uri().as_deref(),
            Some("https://drive.google.com/file/d/abc/view")
        );

        assert!(RagFile::default().source_uri().is_none());
    }

    #[test]
    fn test_retrieved_context_defaults() {
        let context: RetrievedContext =
            serde_json::from_str(r#"{"text": "chunk", "score": 0.25}"#).unwrap();
        assert_eq!(context.text, "chunk");
        assert_eq!(context.score, Some(0.25));
        assert!(context.source_uri.is_none());
    }

    fn request(sources: Vec<Source>) -> ImportRequest {
        ImportRequest {
            sources,
            chunk_size: 512,
            chunk_overlap: 100,
            max_embedding_requests_per_min: 1000,
        }
    }

    fn drive(id: &str) -> Source {
        Source::Drive {
            id: id.to_string(),
            url: format!("https://drive.google.com/file/d/{}/view", id),
        }
    }

    fn gcs(uri: &str) -> Source {
        Source::Gcs {
            uri: uri.to_string(),
        }
    }

    #[test]
    fn test_batches_group_by_kind() {
        let req = request(vec![drive("a"), gcs("gs://b/x.log"), drive("c")]);
        let batches = req.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0], vec![&gcs("gs://b/x.log")]);
        assert_eq!(batches[1], vec![&drive("a"), &drive("c")]);

        assert_eq!(request(vec![drive("a")]).batches().len(), 1);
        assert!(request(Vec::new()).batches().is_empty());
    }

    #[test]
    fn test_partial_import_is_kept() {
        let sources = [drive("a")];
        let batch: Vec<&Source> = sources.iter().collect();

        let mut outcome = ImportOutcome {
            imported: 2,
            ..Default::default()
        };
        outcome.record_failure(&batch, ServiceError::HttpError("reset".to_string()));

        let outcome = outcome.into_result(2).unwrap();
        assert_eq!(outcome.imported, 2);
        assert_eq!(
            outcome.failed_sources(),
            vec!["https://drive.google.com/file/d/a/view".to_string()]
        );
    }

    #[test]
    fn test_import_fails_when_every_batch_fails() {
        let sources = [drive("a")];
        let batch: Vec<&Source> = sources.iter().collect();

        let mut outcome = ImportOutcome::default();
        outcome.record_failure(&batch, ServiceError::HttpError("reset".to_string()));
        assert!(matches!(
            outcome.into_result(1),
            Err(ServiceError::HttpError(_))
        ));

        assert!(ImportOutcome::default().into_result(0).is_ok());
    }
}
