use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, rename = "type")]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub document_id: String,
    pub sequence_index: u64,
    pub raw_text: String,
    pub token_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: String,
    pub sequence_index: u64,
    pub source: Option<String>,
    pub doc_type: Option<String>,
    pub title: Option<String>,
    pub location: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub language: Option<String>,
}

impl ChunkMetadata {
    pub fn from_document(document: &Document, sequence_index: u64) -> Self {
        Self {
            document_id: document.id.clone(),
            sequence_index,
            source: document.source.clone(),
            doc_type: document.doc_type.clone(),
            title: document.title.clone(),
            location: document.location.clone(),
            created_at: document.created_at,
            fetched_at: document.fetched_at,
            language: document.language.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub chunk: Chunk,
    pub normalized_text: String,
    pub keywords: Vec<String>,
    pub metadata: ChunkMetadata,
    // Retained so indexing counts stay auditable, never silently dropped.
    pub empty_after_normalization: bool,
}

#[derive(Debug, Clone)]
pub struct EmbeddedChunkRecord {
    pub record: ChunkRecord,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Loading,
    Chunking,
    Enriching,
    Embedding,
    Storing,
    Done,
    Failed,
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunStage::Loading => "loading",
            RunStage::Chunking => "chunking",
            RunStage::Enriching => "enriching",
            RunStage::Embedding => "embedding",
            RunStage::Storing => "storing",
            RunStage::Done => "done",
            RunStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkFailure {
    pub document_id: String,
    pub sequence_index: u64,
    pub stage: RunStage,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub documents_loaded: usize,
    pub documents_skipped: usize,
    pub chunks_total: usize,
    pub chunks_written: usize,
    pub chunks_failed: usize,
    pub failures: Vec<ChunkFailure>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.chunks_failed == 0
    }
}
