use thiserror::Error;

// Configuration problems are the only errors fatal to a whole run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({size})")]
    InvalidChunkBounds { size: usize, overlap: usize },

    #[error("required setting missing or zero: {0}")]
    MissingSetting(&'static str),

    #[error("unknown token encoding: {0}")]
    UnknownEncoding(String),

    #[error("embedding dimension mismatch: configured {configured}, produced {produced}")]
    DimensionMismatch { configured: usize, produced: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("document store path is not a directory: {0}")]
    NotADirectory(String),

    #[error("malformed document record: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding backend returned {status}: {details}")]
    Backend { status: u16, details: String },

    #[error("embedding count {received} does not match input count {sent}")]
    ArityMismatch { sent: usize, received: usize },

    #[error("embedding has {produced} dimensions, expected {expected}")]
    ShapeMismatch { expected: usize, produced: usize },
}

impl EmbedError {
    // A misconfigured model/index pairing; aborts instead of retrying.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, EmbedError::ShapeMismatch { .. })
    }
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("index backend returned {status}: {details}")]
    Backend { status: u16, details: String },

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("document source failed: {0}")]
    Source(#[from] SourceError),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
