use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

// Filtered from keyword candidates only; normalized chunk text keeps its
// stopwords.
pub const DEFAULT_STOPWORDS: [&str; 48] = [
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "can", "did", "do", "does",
    "for", "from", "had", "has", "have", "he", "her", "his", "i", "if", "in", "is", "it", "its",
    "my", "no", "not", "of", "on", "or", "our", "she", "so", "that", "the", "their", "they",
    "this", "to", "was", "were", "will", "with", "you",
];

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub encoding_name: String,
    pub embedding_model_name: String,
    pub embedding_dimension: usize,
    pub keyword_top_n: usize,
    pub embedding_batch_size: usize,
    pub index_batch_size: usize,
    pub lowercase: bool,
    pub stopwords: HashSet<String>,
    pub dictionary_path: Option<PathBuf>,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 64,
            encoding_name: "cl100k_base".to_string(),
            embedding_model_name: "bge-small-en-v1.5".to_string(),
            embedding_dimension: 384,
            keyword_top_n: 10,
            embedding_batch_size: 32,
            index_batch_size: 64,
            lowercase: true,
            stopwords: default_stopwords(),
            dictionary_path: None,
            retry: RetryPolicy::default(),
        }
    }
}

pub fn default_stopwords() -> HashSet<String> {
    DEFAULT_STOPWORDS.iter().map(|w| w.to_string()).collect()
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::MissingSetting("chunk_size"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::InvalidChunkBounds {
                size: self.chunk_size,
                overlap: self.chunk_overlap,
            });
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigError::MissingSetting("embedding_dimension"));
        }
        if self.embedding_batch_size == 0 {
            return Err(ConfigError::MissingSetting("embedding_batch_size"));
        }
        if self.index_batch_size == 0 {
            return Err(ConfigError::MissingSetting("index_batch_size"));
        }
        if self.encoding_name.is_empty() {
            return Err(ConfigError::MissingSetting("encoding_name"));
        }
        Ok(())
    }

    // One word per line; no configured path disables correction.
    pub fn load_dictionary(&self) -> Result<HashSet<String>, ConfigError> {
        let Some(path) = &self.dictionary_path else {
            return Ok(HashSet::new());
        };
        let contents = fs::read_to_string(path)?;
        Ok(contents
            .lines()
            .map(|line| line.trim().to_lowercase())
            .filter(|line| !line.is_empty())
            .collect())
    }
}
