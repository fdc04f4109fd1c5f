use chrono::Utc;
use clap::{Parser, Subcommand};
use corpus_index_core::{
    DocumentSource, Embedder, HashEmbedder, HttpEmbedder, JsonlSource, Pipeline, PipelineConfig,
    QdrantIndex, RetryPolicy, RunSummary, VectorIndex,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "corpus-index", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Qdrant base URL
    #[arg(long, env = "VECTOR_DB_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, env = "VECTOR_DB_COLLECTION_NAME", default_value = "chunks")]
    collection: String,

    /// Embedding service URL
    #[arg(
        long,
        env = "EMBEDDER_URL",
        default_value = "http://localhost:8080/embeddings"
    )]
    embedding_url: String,

    /// Embedding model name
    #[arg(long, env = "EMBEDDER_MODEL_NAME", default_value = "bge-small-en-v1.5")]
    embedding_model: String,

    /// Embedding vector dimension; must match the target collection
    #[arg(long, env = "VECTOR_DB_EMBEDDING_SIZE", default_value = "384")]
    embedding_dimension: usize,

    /// Maximum tokens per chunk
    #[arg(long, env = "TOKENIZATION_CHUNK_SIZE", default_value = "512")]
    chunk_size: usize,

    /// Overlapping tokens between consecutive chunks
    #[arg(long, env = "TOKENIZATION_CHUNK_OVERLAP", default_value = "64")]
    chunk_overlap: usize,

    /// Token encoding name (cl100k_base, o200k_base, p50k_base, r50k_base)
    #[arg(long, env = "TOKENIZATION_ENCODING_NAME", default_value = "cl100k_base")]
    encoding_name: String,

    /// Keywords extracted per chunk
    #[arg(long, env = "KEYWORD_EXTRACTION_TOP_N", default_value = "10")]
    keyword_top_n: usize,

    /// Texts per embedding call
    #[arg(long, env = "EMBEDDING_BATCH_SIZE", default_value = "32")]
    embedding_batch_size: usize,

    /// Records per index upsert call
    #[arg(long, env = "INDEX_BATCH_SIZE", default_value = "64")]
    index_batch_size: usize,

    /// Keep original casing during normalization
    #[arg(long, default_value_t = false)]
    keep_case: bool,

    /// Word list enabling spelling correction, one word per line
    #[arg(long, env = "SPELLING_DICTIONARY")]
    dictionary: Option<std::path::PathBuf>,

    /// Retry attempts for embedding batches and index records
    #[arg(long, env = "RETRY_MAX_ATTEMPTS", default_value = "3")]
    retry_attempts: u32,

    /// Base retry backoff in milliseconds
    #[arg(long, env = "RETRY_BASE_DELAY_MS", default_value = "200")]
    retry_base_delay_ms: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, enrich, embed, and index a document collection end-to-end.
    Run {
        /// Directory of .jsonl document files, one JSON document per line.
        #[arg(long)]
        docs: String,

        /// Only index documents whose `source` field matches.
        #[arg(long)]
        source_filter: Option<String>,

        /// Use the deterministic local embedder instead of the HTTP
        /// embedding service.
        #[arg(long, default_value_t = false)]
        offline: bool,
    },
}

impl Cli {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            encoding_name: self.encoding_name.clone(),
            embedding_model_name: self.embedding_model.clone(),
            embedding_dimension: self.embedding_dimension,
            keyword_top_n: self.keyword_top_n,
            embedding_batch_size: self.embedding_batch_size,
            index_batch_size: self.index_batch_size,
            lowercase: !self.keep_case,
            dictionary_path: self.dictionary.clone(),
            retry: RetryPolicy {
                max_attempts: self.retry_attempts,
                base_delay_ms: self.retry_base_delay_ms,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "corpus-index boot"
    );

    match &cli.command {
        Command::Run {
            docs,
            source_filter,
            offline,
        } => {
            let config = cli.pipeline_config();
            let source = JsonlSource::new(docs);
            let index = QdrantIndex::new(&cli.qdrant_url, &cli.collection);

            let summary = if *offline {
                let embedder = HashEmbedder::new(cli.embedding_dimension);
                run_pipeline(config, source, embedder, index, source_filter.as_deref()).await?
            } else {
                let embedder = HttpEmbedder::new(
                    &cli.embedding_url,
                    &cli.embedding_model,
                    cli.embedding_dimension,
                );
                run_pipeline(config, source, embedder, index, source_filter.as_deref()).await?
            };

            println!(
                "documents processed: {} (skipped {})",
                summary.documents_loaded, summary.documents_skipped
            );
            println!(
                "chunks written: {} of {}",
                summary.chunks_written, summary.chunks_total
            );
            println!("chunks failed: {}", summary.chunks_failed);
            for failure in &summary.failures {
                println!(
                    "  failed: document_id={} sequence_index={} stage={} reason={}",
                    failure.document_id, failure.sequence_index, failure.stage, failure.reason
                );
            }

            if !summary.is_success() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn run_pipeline<S, E, I>(
    config: PipelineConfig,
    source: S,
    embedder: E,
    index: I,
    source_filter: Option<&str>,
) -> anyhow::Result<RunSummary>
where
    S: DocumentSource,
    E: Embedder + Send + Sync,
    I: VectorIndex + Send + Sync,
{
    let pipeline = Pipeline::new(config, source, embedder, index)
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;
    pipeline
        .run(source_filter)
        .await
        .map_err(|error| anyhow::anyhow!(error.to_string()))
}
