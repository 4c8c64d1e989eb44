/// Retrieval service abstraction and implementations
pub mod mock;
pub mod resource;
pub mod service;
pub mod types;
pub mod vertex;

pub use mock::MockRagService;
pub use service::{RagService, ServiceFuture};
pub use types::{
    Corpus, ImportFailure, ImportOutcome, ImportRequest, RagFile, RetrievalQuery, RetrievedContext,
};
pub use vertex::VertexRagService;
