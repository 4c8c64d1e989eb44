use crate::error::ServiceError;
use crate::rag::resource::{file_id, Source};
use crate::rag::service::{RagService, ServiceFuture};
use crate::rag::types::{
    Corpus, GcsSource, ImportOutcome, ImportRequest, RagFile, RetrievalQuery, RetrievedContext,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const MOCK_PARENT: &str = "projects/mock-project/locations/us-central1";

#[derive(Default)]
struct MockState {
    corpora: Vec<Corpus>,
    files: HashMap<String, Vec<RagFile>>,
    contents: HashMap<String, String>,
    contexts: HashMap<String, Vec<RetrievedContext>>,
    next_id: u64,
    failure: Option<ServiceError>,
    unreadable: Vec<String>,
    drive_import_failure: Option<ServiceError>,
    imports: Vec<ImportRequest>,
}

impl MockState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_failure(&self) -> Result<(), ServiceError> {
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn require_corpus(&self, corpus: &str) -> Result<(), ServiceError> {
        if self.corpora.iter().any(|c| c.name == corpus) {
            Ok(())
        } else {
            Err(ServiceError::NotFound(format!("RagCorpus {} not found", corpus)))
        }
    }
}

/// In-memory retrieval service for tests and offline development
///
/// Corpora and files live in a shared map. A configured failure makes every
/// call return that error, which is how tool error paths are exercised.
#[derive(Clone, Default)]
pub struct MockRagService {
    state: Arc<Mutex<MockState>>,
    call_count: Arc<Mutex<usize>>,
}

impl MockRagService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a corpus and return its resource name
    pub fn add_corpus(&self, display_name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        let name = format!("{}/ragCorpora/{}", MOCK_PARENT, id);
        state.corpora.push(Corpus {
            name: name.clone(),
            display_name: display_name.to_string(),
            description: None,
            create_time: Some("2024-01-01T00:00:00Z".to_string()),
            update_time: Some("2024-01-01T00:00:00Z".to_string()),
        });
        name
    }

    /// Add a file with readable content and return its resource name
    pub fn add_file(&self, corpus: &str, display_name: &str, content: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        let name = format!("{}/ragFiles/{}", corpus, id);
        state.files.entry(corpus.to_string()).or_default().push(RagFile {
            name: name.clone(),
            display_name: display_name.to_string(),
            gcs_source: Some(GcsSource {
                uris: vec![format!("gs://mock-bucket/{}", display_name)],
            }),
            ..Default::default()
        });
        state.contents.insert(name.clone(), content.to_string());
        name
    }

    /// Set the chunks returned for queries against a corpus
    pub fn set_contexts(&self, corpus: &str, contexts: Vec<RetrievedContext>) {
        let mut state = self.state.lock().unwrap();
        state.contexts.insert(corpus.to_string(), contexts);
    }

    /// Make every subsequent call fail with `error`
    pub fn fail_with(&self, error: ServiceError) {
        self.state.lock().unwrap().failure = Some(error);
    }

    /// Make every Drive import batch fail while Cloud Storage batches succeed
    pub fn fail_drive_imports(&self, error: ServiceError) {
        self.state.lock().unwrap().drive_import_failure = Some(error);
    }

    /// Make reading a specific file fail
    pub fn make_unreadable(&self, file: &str) {
        self.state.lock().unwrap().unreadable.push(file.to_string());
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    pub fn corpora(&self) -> Vec<Corpus> {
        self.state.lock().unwrap().corpora.clone()
    }

    pub fn files(&self, corpus: &str) -> Vec<RagFile> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(corpus)
            .cloned()
            .unwrap_or_default()
    }

    /// Import requests received so far
    pub fn imports(&self) -> Vec<ImportRequest> {
        self.state.lock().unwrap().imports.clone()
    }

    fn track(&self) {
        *self.call_count.lock().unwrap() += 1;
    }
}

impl RagService for MockRagService {
    fn list_corpora(&self) -> ServiceFuture<'_, Vec<Corpus>> {
        Box::pin(async move {
            self.track();
            let state = self.state.lock().unwrap();
            state.check_failure()?;
            Ok(state.corpora.clone())
        })
    }

    fn create_corpus<'a>(
        &'a self,
        display_name: &'a str,
        _embedding_model: &'a str,
    ) -> ServiceFuture<'a, Corpus> {
        Box::pin(async move {
            self.track();
            self.state.lock().unwrap().check_failure()?;
            let name = self.add_corpus(display_name);
            let state = self.state.lock().unwrap();
            state
                .corpora
                .iter()
                .find(|c| c.name == name)
                .cloned()
                .ok_or(ServiceError::NotFound(name))
        })
    }

    fn delete_corpus<'a>(&'a self, corpus: &'a str) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            self.track();
            let mut state = self.state.lock().unwrap();
            state.check_failure()?;
            state.require_corpus(corpus)?;
            state.corpora.retain(|c| c.name != corpus);
            if let Some(files) = state.files.remove(corpus) {
                for file in files {
                    state.contents.remove(&file.name);
                }
            }
            Ok(())
        })
    }

    fn list_files<'a>(&'a self, corpus: &'a str) -> ServiceFuture<'a, Vec<RagFile>> {
        Box::pin(async move {
            self.track();
            let state = self.state.lock().unwrap();
            state.check_failure()?;
            state.require_corpus(corpus)?;
            Ok(state.files.get(corpus).cloned().unwrap_or_default())
        })
    }

    fn delete_file<'a>(&'a self, file: &'a str) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            self.track();
            let mut state = self.state.lock().unwrap();
            state.check_failure()?;

            let mut found = false;
            for files in state.files.values_mut() {
                let before = files.len();
                files.retain(|f| f.name != file);
                found |= files.len() != before;
            }
            if !found {
                return Err(ServiceError::NotFound(format!("RagFile {} not found", file)));
            }
            state.contents.remove(file);
            Ok(())
        })
    }

    fn import_files<'a>(
        &'a self,
        corpus: &'a str,
        request: &'a ImportRequest,
    ) -> ServiceFuture<'a, ImportOutcome> {
        Box::pin(async move {
            self.track();
            let drive_failure = {
                let mut state = self.state.lock().unwrap();
                state.check_failure()?;
                state.require_corpus(corpus)?;
                state.imports.push(request.clone());
                state.drive_import_failure.clone()
            };

            let batches = request.batches();
            let mut outcome = ImportOutcome::default();
            for batch in &batches {
                let is_drive = matches!(batch.first(), Some(Source::Drive { .. }));
                if let (true, Some(error)) = (is_drive, &drive_failure) {
                    outcome.record_failure(batch, error.clone());
                    continue;
                }
                for source in batch {
                    let display_name = file_id(source.uri().trim_end_matches("/view")).to_string();
                    self.add_file(corpus, &display_name, "");
                }
                outcome.imported += batch.len() as u64;
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
            self.track();
            let state = self.state.lock().unwrap();
            state.check_failure()?;
            state.require_corpus(corpus)?;
            Ok(state
                .contexts
                .get(corpus)
                .map(|contexts| {
                    contexts
                        .iter()
                        .take(query.top_k as usize)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default())
        })
    }

    fn read_file<'a>(&'a self, file: &'a RagFile) -> ServiceFuture<'a, String> {
        Box::pin(async move {
            self.track();
            let state = self.state.lock().unwrap();
            state.check_failure()?;
            if state.unreadable.contains(&file.name) {
                return Err(ServiceError::ApiError {
                    status: 403,
                    message: format!("Access denied to {}", file.name),
                });
            }
            state
                .contents
                .get(&file.name)
                .cloned()
                .ok_or_else(|| ServiceError::NotFound(format!("No content for {}", file.name)))
        })
    }
}
