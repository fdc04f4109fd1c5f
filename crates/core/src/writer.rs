use crate::models::{ChunkFailure, EmbeddedChunkRecord, IndexPoint, RunStage};
use crate::retry::RetryPolicy;
use crate::traits::VectorIndex;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

// Upsert key from (document_id, sequence_index) alone; the chunk text
// deliberately does not participate, so re-runs overwrite in place.
pub fn stable_chunk_id(document_id: &str, sequence_index: u64) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(sequence_index.to_le_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

pub fn record_payload(record: &EmbeddedChunkRecord) -> serde_json::Value {
    let meta = &record.record.metadata;
    json!({
        "document_id": meta.document_id,
        "sequence_index": meta.sequence_index,
        "chunk_text": record.record.normalized_text,
        "keywords": record.record.keywords,
        "empty_after_normalization": record.record.empty_after_normalization,
        "source": meta.source,
        "type": meta.doc_type,
        "title": meta.title,
        "location": meta.location,
        "created_at": meta.created_at,
        "fetched_at": meta.fetched_at,
        "language": meta.language,
    })
}

pub fn to_point(record: &EmbeddedChunkRecord) -> IndexPoint {
    IndexPoint {
        id: stable_chunk_id(
            &record.record.metadata.document_id,
            record.record.metadata.sequence_index,
        )
        .to_string(),
        vector: record.vector.clone(),
        payload: record_payload(record),
    }
}

#[derive(Debug, Default)]
pub struct WriteReport {
    pub written: usize,
    pub failures: Vec<ChunkFailure>,
}

// Whole batches first; a failed batch falls back to per-record writes
// with bounded backoff, so one bad record cannot sink its neighbors.
pub struct IndexWriter<'a, I: VectorIndex> {
    index: &'a I,
    batch_size: usize,
    retry: RetryPolicy,
}

impl<'a, I: VectorIndex> IndexWriter<'a, I> {
    pub fn new(index: &'a I, batch_size: usize, retry: RetryPolicy) -> Self {
        Self {
            index,
            batch_size: batch_size.max(1),
            retry,
        }
    }

    pub async fn write(&self, records: &[EmbeddedChunkRecord]) -> WriteReport {
        let mut report = WriteReport::default();

        for batch in records.chunks(self.batch_size) {
            let points: Vec<IndexPoint> = batch.iter().map(to_point).collect();

            match self.index.upsert_points(&points).await {
                Ok(()) => {
                    report.written += batch.len();
                    debug!(batch_len = batch.len(), "upserted batch");
                }
                Err(error) => {
                    warn!(%error, batch_len = batch.len(), "batch upsert failed, retrying per record");
                    self.write_individually(batch, &points, &mut report).await;
                }
            }
        }

        report
    }

    async fn write_individually(
        &self,
        batch: &[EmbeddedChunkRecord],
        points: &[IndexPoint],
        report: &mut WriteReport,
    ) {
        for (record, point) in batch.iter().zip(points) {
            let mut last_error = None;

            for attempt in 1..=self.retry.attempts() {
                match self.index.upsert_points(std::slice::from_ref(point)).await {
                    Ok(()) => {
                        last_error = None;
                        break;
                    }
                    Err(error) => {
                        last_error = Some(error);
                        if attempt < self.retry.attempts() {
                            tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
                        }
                    }
                }
            }

            match last_error {
                None => report.written += 1,
                Some(error) => {
                    warn!(
                        document_id = %record.record.metadata.document_id,
                        sequence_index = record.record.metadata.sequence_index,
                        %error,
                        "record upsert failed after retries"
                    );
                    report.failures.push(ChunkFailure {
                        document_id: record.record.metadata.document_id.clone(),
                        sequence_index: record.record.metadata.sequence_index,
                        stage: RunStage::Storing,
                        reason: error.to_string(),
                    });
                }
            }
        }
    }
}
