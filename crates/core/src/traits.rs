use crate::error::{EmbedError, IndexError, SourceError};
use crate::models::IndexPoint;
use crate::source::SourceBatch;
use async_trait::async_trait;

/// Backing document store. Returns a finite batch; failures confined to
/// individual documents are reported inside the batch, not as an `Err`.
pub trait DocumentSource {
    /// The optional filter matches against the document `source` field.
    fn fetch_documents(&self, filter: Option<&str>) -> Result<SourceBatch, SourceError>;
}

/// Embedding model or service. Order- and arity-preserving: output `i`
/// embeds input `i`. A call is atomic per batch; partial success is never
/// assumed.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

/// Vector index service. Writing a point whose id already exists replaces
/// vector and payload atomically from the caller's view.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Creates the target collection with the given dimension if it does
    /// not already exist.
    async fn ensure_collection(&self, dimension: usize) -> Result<(), IndexError>;

    async fn upsert_points(&self, points: &[IndexPoint]) -> Result<(), IndexError>;
}
