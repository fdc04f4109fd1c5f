use crate::error::SourceError;
use crate::models::Document;
use crate::traits::DocumentSource;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug)]
pub struct SkippedDocument {
    pub origin: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct SourceBatch {
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedDocument>,
}

// Files are visited in sorted order so fetches are reproducible.
pub struct JsonlSource {
    root: PathBuf,
}

impl JsonlSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DocumentSource for JsonlSource {
    fn fetch_documents(&self, filter: Option<&str>) -> Result<SourceBatch, SourceError> {
        if !self.root.is_dir() {
            return Err(SourceError::NotADirectory(
                self.root.to_string_lossy().to_string(),
            ));
        }

        let mut batch = SourceBatch::default();
        for path in discover_jsonl_files(&self.root) {
            match fs::read_to_string(&path) {
                Ok(contents) => read_lines(&path, &contents, filter, &mut batch),
                Err(error) => {
                    warn!(path = %path.display(), %error, "skipping unreadable file");
                    batch.skipped.push(SkippedDocument {
                        origin: path,
                        reason: error.to_string(),
                    });
                }
            }
        }

        debug!(
            documents = batch.documents.len(),
            skipped = batch.skipped.len(),
            "fetched documents"
        );
        Ok(batch)
    }
}

fn discover_jsonl_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|item| item.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let is_jsonl = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"));
        if is_jsonl {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort_unstable();
    files
}

fn read_lines(path: &Path, contents: &str, filter: Option<&str>, batch: &mut SourceBatch) {
    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Document>(line) {
            Ok(document) => {
                let matches = filter
                    .map(|wanted| document.source.as_deref() == Some(wanted))
                    .unwrap_or(true);
                if matches {
                    batch.documents.push(document);
                }
            }
            Err(error) => {
                warn!(
                    path = %path.display(),
                    line = line_no + 1,
                    %error,
                    "skipping malformed document record"
                );
                batch.skipped.push(SkippedDocument {
                    origin: path.to_path_buf(),
                    reason: format!("line {}: {}", line_no + 1, error),
                });
            }
        }
    }
}
