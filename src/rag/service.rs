use crate::error::ServiceError;
use crate::rag::types::{
    Corpus, ImportOutcome, ImportRequest, RagFile, RetrievalQuery, RetrievedContext,
};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by every service call
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ServiceError>> + Send + 'a>>;

/// Operations the tools need from the managed retrieval service
///
/// Every method takes full resource names; resolving user-facing names is the
/// caller's job.
pub trait RagService: Send + Sync {
    fn list_corpora(&self) -> ServiceFuture<'_, Vec<Corpus>>;

    fn create_corpus<'a>(
        &'a self,
        display_name: &'a str,
        embedding_model: &'a str,
    ) -> ServiceFuture<'a, Corpus>;

    fn delete_corpus<'a>(&'a self, corpus: &'a str) -> ServiceFuture<'a, ()>;

    fn list_files<'a>(&'a self, corpus: &'a str) -> ServiceFuture<'a, Vec<RagFile>>;

    fn delete_file<'a>(&'a self, file: &'a str) -> ServiceFuture<'a, ()>;

    /// Import documents, one call per source kind
    ///
    /// Errors only when every batch fails; batches that fail after another
    /// one succeeded are reported in the outcome.
    fn import_files<'a>(
        &'a self,
        corpus: &'a str,
        request: &'a ImportRequest,
    ) -> ServiceFuture<'a, ImportOutcome>;

    fn retrieve_contexts<'a>(
        &'a self,
        corpus: &'a str,
        query: &'a RetrievalQuery,
    ) -> ServiceFuture<'a, Vec<RetrievedContext>>;

    /// Download the raw text of a stored file from its original location
    fn read_file<'a>(&'a self, file: &'a RagFile) -> ServiceFuture<'a, String>;
}
