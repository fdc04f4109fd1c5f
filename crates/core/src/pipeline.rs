use crate::chunking::Chunker;
use crate::config::PipelineConfig;
use crate::encoding::{TextEncoding, TiktokenEncoding};
use crate::enrich::Enricher;
use crate::error::{ConfigError, PipelineError, Result};
use crate::models::{
    ChunkFailure, ChunkRecord, EmbeddedChunkRecord, RunStage, RunSummary,
};
use crate::traits::{DocumentSource, Embedder, VectorIndex};
use crate::writer::IndexWriter;
use std::sync::Arc;
use tracing::{error, info, warn};

// Each stage completes for the whole document set before the next begins.
// Only configuration errors abort a run.
pub struct Pipeline<S, E, I>
where
    S: DocumentSource,
    E: Embedder,
    I: VectorIndex,
{
    config: PipelineConfig,
    source: S,
    embedder: E,
    index: I,
    chunker: Chunker,
    enricher: Enricher,
}

impl<S, E, I> Pipeline<S, E, I>
where
    S: DocumentSource,
    E: Embedder + Send + Sync,
    I: VectorIndex + Send + Sync,
{
    pub fn new(
        config: PipelineConfig,
        source: S,
        embedder: E,
        index: I,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let encoding: Arc<dyn TextEncoding> =
            Arc::new(TiktokenEncoding::for_name(&config.encoding_name)?);
        Self::with_encoding(config, encoding, source, embedder, index)
    }

    pub fn with_encoding(
        config: PipelineConfig,
        encoding: Arc<dyn TextEncoding>,
        source: S,
        embedder: E,
        index: I,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if embedder.dimensions() != config.embedding_dimension {
            return Err(ConfigError::DimensionMismatch {
                configured: config.embedding_dimension,
                produced: embedder.dimensions(),
            });
        }

        let chunker = Chunker::new(encoding, config.chunk_size, config.chunk_overlap)?;
        let enricher = Enricher::new(&config)?;
        Ok(Self {
            config,
            source,
            embedder,
            index,
            chunker,
            enricher,
        })
    }

    pub async fn run(&self, filter: Option<&str>) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        info!(stage = %RunStage::Loading, "pipeline stage");
        let batch = self.source.fetch_documents(filter).map_err(|source_error| {
            error!(stage = %RunStage::Failed, %source_error, "document source failed");
            source_error
        })?;
        summary.documents_loaded = batch.documents.len();
        summary.documents_skipped = batch.skipped.len();
        for skipped in &batch.skipped {
            warn!(origin = %skipped.origin.display(), reason = %skipped.reason, "skipped document");
        }

        info!(stage = %RunStage::Chunking, documents = batch.documents.len(), "pipeline stage");
        let mut chunked = Vec::new();
        for (doc_index, document) in batch.documents.iter().enumerate() {
            for chunk in self.chunker.chunk(document) {
                chunked.push((doc_index, chunk));
            }
        }
        summary.chunks_total = chunked.len();

        info!(stage = %RunStage::Enriching, chunks = chunked.len(), "pipeline stage");
        let records: Vec<ChunkRecord> = chunked
            .into_iter()
            .map(|(doc_index, chunk)| {
                self.enricher.enrich(chunk, &batch.documents[doc_index])
            })
            .collect();

        info!(stage = %RunStage::Embedding, chunks = records.len(), "pipeline stage");
        let mut embedded = Vec::new();
        for record_batch in records.chunks(self.config.embedding_batch_size) {
            match self.embed_batch(record_batch).await? {
                Some(batch_records) => embedded.extend(batch_records),
                None => {
                    for record in record_batch {
                        summary.failures.push(ChunkFailure {
                            document_id: record.metadata.document_id.clone(),
                            sequence_index: record.metadata.sequence_index,
                            stage: RunStage::Embedding,
                            reason: "embedding batch failed after retries".to_string(),
                        });
                    }
                }
            }
        }

        info!(stage = %RunStage::Storing, chunks = embedded.len(), "pipeline stage");
        match self.index.ensure_collection(self.config.embedding_dimension).await {
            Ok(()) => {
                let writer = IndexWriter::new(
                    &self.index,
                    self.config.index_batch_size,
                    self.config.retry,
                );
                let report = writer.write(&embedded).await;
                summary.chunks_written = report.written;
                summary.failures.extend(report.failures);
            }
            Err(index_error) => {
                warn!(%index_error, "collection bootstrap failed, reporting all chunks");
                for record in &embedded {
                    summary.failures.push(ChunkFailure {
                        document_id: record.record.metadata.document_id.clone(),
                        sequence_index: record.record.metadata.sequence_index,
                        stage: RunStage::Storing,
                        reason: index_error.to_string(),
                    });
                }
            }
        }

        summary.chunks_failed = summary.failures.len();
        info!(
            stage = %RunStage::Done,
            documents_loaded = summary.documents_loaded,
            documents_skipped = summary.documents_skipped,
            chunks_total = summary.chunks_total,
            chunks_written = summary.chunks_written,
            chunks_failed = summary.chunks_failed,
            "pipeline run complete"
        );
        Ok(summary)
    }

    // Ok(None) means the batch failed after all retries.
    async fn embed_batch(
        &self,
        records: &[ChunkRecord],
    ) -> Result<Option<Vec<EmbeddedChunkRecord>>> {
        let texts: Vec<String> = records
            .iter()
            .map(|record| record.normalized_text.clone())
            .collect();

        let mut last_error = None;
        for attempt in 1..=self.config.retry.attempts() {
            match self.embedder.embed(&texts).await {
                Ok(vectors) => {
                    for vector in &vectors {
                        if vector.len() != self.config.embedding_dimension {
                            return Err(PipelineError::Config(ConfigError::DimensionMismatch {
                                configured: self.config.embedding_dimension,
                                produced: vector.len(),
                            }));
                        }
                    }
                    let embedded = records
                        .iter()
                        .cloned()
                        .zip(vectors)
                        .map(|(record, vector)| EmbeddedChunkRecord { record, vector })
                        .collect();
                    return Ok(Some(embedded));
                }
                Err(crate::error::EmbedError::ShapeMismatch { expected, produced }) => {
                    return Err(PipelineError::Config(ConfigError::DimensionMismatch {
                        configured: expected,
                        produced,
                    }));
                }
                Err(embed_error) => {
                    warn!(attempt, %embed_error, "embedding batch failed");
                    last_error = Some(embed_error);
                    if attempt < self.config.retry.attempts() {
                        tokio::time::sleep(self.config.retry.delay_for_attempt(attempt)).await;
                    }
                }
            }
        }

        if let Some(embed_error) = last_error {
            warn!(%embed_error, "embedding batch exhausted retries");
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashEmbedder;
    use crate::encoding::testing::WordEncoding;
    use crate::error::{EmbedError, IndexError, SourceError};
    use crate::models::{Document, IndexPoint};
    use crate::retry::RetryPolicy;
    use crate::source::SourceBatch;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FixedSource {
        documents: Vec<Document>,
    }

    impl DocumentSource for FixedSource {
        fn fetch_documents(&self, _filter: Option<&str>) -> Result<SourceBatch, SourceError> {
            Ok(SourceBatch {
                documents: self.documents.clone(),
                skipped: Vec::new(),
            })
        }
    }

    #[derive(Default)]
    struct MemoryIndex {
        points: Mutex<HashMap<String, serde_json::Value>>,
        upsert_calls: Mutex<usize>,
    }

    #[async_trait]
    impl VectorIndex for MemoryIndex {
        async fn ensure_collection(&self, _dimension: usize) -> Result<(), IndexError> {
            Ok(())
        }

        async fn upsert_points(&self, points: &[IndexPoint]) -> Result<(), IndexError> {
            *self.upsert_calls.lock().unwrap() += 1;
            let mut stored = self.points.lock().unwrap();
            for point in points {
                stored.insert(point.id.clone(), point.payload.clone());
            }
            Ok(())
        }
    }

    struct FailingIndex;

    #[async_trait]
    impl VectorIndex for FailingIndex {
        async fn ensure_collection(&self, _dimension: usize) -> Result<(), IndexError> {
            Ok(())
        }

        async fn upsert_points(&self, _points: &[IndexPoint]) -> Result<(), IndexError> {
            Err(IndexError::Backend {
                status: 500,
                details: "down".to_string(),
            })
        }
    }

    // Reports the configured dimension but emits shorter vectors.
    struct LyingEmbedder {
        claimed: usize,
        actual: usize,
    }

    #[async_trait]
    impl Embedder for LyingEmbedder {
        fn dimensions(&self) -> usize {
            self.claimed
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Ok(texts.iter().map(|_| vec![0.5; self.actual]).collect())
        }
    }

    struct DownEmbedder {
        dimensions: usize,
    }

    #[async_trait]
    impl Embedder for DownEmbedder {
        fn dimensions(&self) -> usize {
            self.dimensions
        }

        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Err(EmbedError::Backend {
                status: 503,
                details: "overloaded".to_string(),
            })
        }
    }

    fn document(id: &str, content: &str) -> Document {
        Document {
            id: id.to_string(),
            content: content.to_string(),
            source: Some("wiki".to_string()),
            doc_type: None,
            title: None,
            location: None,
            created_at: None,
            fetched_at: None,
            language: None,
        }
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            chunk_size: 3,
            chunk_overlap: 1,
            embedding_dimension: 8,
            embedding_batch_size: 2,
            index_batch_size: 2,
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay_ms: 1,
                max_delay_ms: 1,
            },
            ..Default::default()
        }
    }

    fn word_pipeline<E, I>(config: PipelineConfig, docs: Vec<Document>, embedder: E, index: I) -> Pipeline<FixedSource, E, I>
    where
        E: Embedder + Send + Sync,
        I: VectorIndex + Send + Sync,
    {
        Pipeline::with_encoding(
            config,
            Arc::new(WordEncoding::default()),
            FixedSource { documents: docs },
            embedder,
            index,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn full_run_writes_every_chunk() {
        let docs = vec![
            document("d1", "the quick brown fox jumps"),
            document("d2", "one two three"),
        ];
        let pipeline = word_pipeline(test_config(), docs, HashEmbedder::new(8), MemoryIndex::default());

        let summary = pipeline.run(None).await.unwrap();
        assert!(summary.is_success());
        assert_eq!(summary.documents_loaded, 2);
        assert_eq!(summary.chunks_total, 3);
        assert_eq!(summary.chunks_written, 3);
        assert_eq!(summary.chunks_failed, 0);
        assert_eq!(pipeline.index.points.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn non_ascii_documents_index_without_aborting() {
        // Single-token windows split the emoji's UTF-8 bytes across chunks.
        let config = PipelineConfig {
            chunk_size: 1,
            chunk_overlap: 0,
            embedding_dimension: 8,
            ..test_config()
        };
        let docs = vec![document("d1", "🦀🦀🦀"), document("d2", "plain ascii")];
        let pipeline = Pipeline::new(
            config,
            FixedSource { documents: docs },
            HashEmbedder::new(8),
            MemoryIndex::default(),
        )
        .unwrap();

        let summary = pipeline.run(None).await.unwrap();
        assert!(summary.is_success());
        assert!(summary.chunks_total > 4);
        assert_eq!(summary.chunks_written, summary.chunks_total);
    }

    #[tokio::test]
    async fn rerunning_overwrites_instead_of_duplicating() {
        let docs = vec![document("d1", "the quick brown fox jumps")];
        let pipeline = word_pipeline(test_config(), docs, HashEmbedder::new(8), MemoryIndex::default());

        pipeline.run(None).await.unwrap();
        let after_first = pipeline.index.points.lock().unwrap().len();
        pipeline.run(None).await.unwrap();
        let after_second = pipeline.index.points.lock().unwrap().len();

        assert_eq!(after_first, 2);
        assert_eq!(after_second, after_first);
    }

    #[tokio::test]
    async fn index_failures_are_reported_not_fatal() {
        let docs = vec![document("d1", "the quick brown fox jumps")];
        let pipeline = word_pipeline(test_config(), docs, HashEmbedder::new(8), FailingIndex);

        let summary = pipeline.run(None).await.unwrap();
        assert!(!summary.is_success());
        assert_eq!(summary.chunks_written, 0);
        assert_eq!(summary.chunks_failed, 2);
        for failure in &summary.failures {
            assert_eq!(failure.document_id, "d1");
            assert_eq!(failure.stage, RunStage::Storing);
        }
    }

    #[tokio::test]
    async fn embedding_outage_fails_chunks_without_aborting() {
        let docs = vec![document("d1", "the quick brown fox jumps")];
        let pipeline = word_pipeline(
            test_config(),
            docs,
            DownEmbedder { dimensions: 8 },
            MemoryIndex::default(),
        );

        let summary = pipeline.run(None).await.unwrap();
        assert_eq!(summary.chunks_failed, 2);
        assert!(summary
            .failures
            .iter()
            .all(|failure| failure.stage == RunStage::Embedding));
        assert_eq!(pipeline.index.points.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn dimension_mismatch_aborts_before_any_write() {
        let docs = vec![document("d1", "the quick brown fox jumps")];
        let pipeline = word_pipeline(
            test_config(),
            docs,
            LyingEmbedder {
                claimed: 8,
                actual: 5,
            },
            MemoryIndex::default(),
        );

        let result = pipeline.run(None).await;
        assert!(matches!(
            result,
            Err(PipelineError::Config(ConfigError::DimensionMismatch {
                configured: 8,
                produced: 5,
            }))
        ));
        assert_eq!(*pipeline.index.upsert_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn mismatched_embedder_is_rejected_at_construction() {
        let result = Pipeline::with_encoding(
            test_config(),
            Arc::new(WordEncoding::default()),
            FixedSource { documents: vec![] },
            HashEmbedder::new(16),
            MemoryIndex::default(),
        );
        assert!(matches!(
            result,
            Err(ConfigError::DimensionMismatch {
                configured: 8,
                produced: 16,
            })
        ));
    }

    #[tokio::test]
    async fn flagged_empty_chunks_are_still_indexed() {
        let docs = vec![document("d1", "\u{0001}\u{0002}")];
        let pipeline = word_pipeline(test_config(), docs, HashEmbedder::new(8), MemoryIndex::default());

        let summary = pipeline.run(None).await.unwrap();
        assert_eq!(summary.chunks_total, 1);
        assert_eq!(summary.chunks_written, 1);

        let stored = pipeline.index.points.lock().unwrap();
        let payload = stored.values().next().unwrap();
        assert_eq!(payload["empty_after_normalization"], true);
        assert_eq!(payload["chunk_text"], "");
    }

    #[tokio::test]
    async fn empty_documents_produce_no_chunks_and_succeed() {
        let docs = vec![document("d1", "")];
        let pipeline = word_pipeline(test_config(), docs, HashEmbedder::new(8), MemoryIndex::default());

        let summary = pipeline.run(None).await.unwrap();
        assert!(summary.is_success());
        assert_eq!(summary.chunks_total, 0);
        assert_eq!(summary.chunks_written, 0);
    }
}
