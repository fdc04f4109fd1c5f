pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod encoding;
pub mod enrich;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod retry;
pub mod source;
pub mod stores;
pub mod traits;
pub mod writer;

pub use chunking::Chunker;
pub use config::{default_stopwords, PipelineConfig, DEFAULT_STOPWORDS};
pub use embeddings::{HashEmbedder, HttpEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use encoding::{TextEncoding, TiktokenEncoding};
pub use enrich::{clean_surface, normalize_unicode, Enricher};
pub use error::{
    ConfigError, EmbedError, IndexError, PipelineError, Result, SourceError,
};
pub use models::{
    Chunk, ChunkFailure, ChunkMetadata, ChunkRecord, Document, EmbeddedChunkRecord, IndexPoint,
    RunStage, RunSummary,
};
pub use pipeline::Pipeline;
pub use retry::RetryPolicy;
pub use source::{JsonlSource, SkippedDocument, SourceBatch};
pub use stores::QdrantIndex;
pub use traits::{DocumentSource, Embedder, VectorIndex};
pub use writer::{stable_chunk_id, IndexWriter, WriteReport};
