use crate::encoding::TextEncoding;
use crate::error::{ConfigError, Result};
use crate::models::{Chunk, Document};
use std::sync::Arc;
use tracing::debug;

// A window of chunk_size tokens advancing by chunk_size - chunk_overlap.
// The final window is truncated, never padded, never dropped while
// non-empty.
pub struct Chunker {
    encoding: Arc<dyn TextEncoding>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(
        encoding: Arc<dyn TextEncoding>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Self, ConfigError> {
        if chunk_size == 0 {
            return Err(ConfigError::MissingSetting("chunk_size"));
        }
        if chunk_overlap >= chunk_size {
            return Err(ConfigError::InvalidChunkBounds {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }
        Ok(Self {
            encoding,
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let tokens = self.encoding.encode(&document.content);
        if tokens.is_empty() {
            debug!(document_id = %document.id, "document has no tokens, skipping");
            return Vec::new();
        }

        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut sequence_index = 0u64;

        loop {
            let end = (start + self.chunk_size).min(tokens.len());
            let window = &tokens[start..end];
            let raw_text = self.encoding.decode(window);

            chunks.push(Chunk {
                document_id: document.id.clone(),
                sequence_index,
                raw_text,
                token_count: window.len(),
            });

            if end == tokens.len() {
                break;
            }
            start += step;
            sequence_index += 1;
        }

        debug!(
            document_id = %document.id,
            token_count = tokens.len(),
            chunk_count = chunks.len(),
            "chunked document"
        );
        chunks
    }
}
