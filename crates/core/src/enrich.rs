use crate::config::PipelineConfig;
use crate::error::ConfigError;
use crate::models::{Chunk, ChunkMetadata, ChunkRecord, Document};
use std::collections::{HashMap, HashSet};
use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

// Every transform is total; a chunk is never dropped here, only flagged
// when normalization erased all content.
pub struct Enricher {
    lowercase: bool,
    keyword_top_n: usize,
    stopwords: HashSet<String>,
    dictionary: HashSet<String>,
}

impl Enricher {
    pub fn new(config: &PipelineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            lowercase: config.lowercase,
            keyword_top_n: config.keyword_top_n,
            stopwords: config.stopwords.clone(),
            dictionary: config.load_dictionary()?,
        })
    }

    pub fn enrich(&self, chunk: Chunk, document: &Document) -> ChunkRecord {
        let normalized = normalize_unicode(&chunk.raw_text);
        let cleaned = clean_surface(&normalized, self.lowercase);
        let normalized_text = self.correct_spelling(&cleaned);

        let keywords = self.extract_keywords(&self.keyword_candidates(&normalized_text));

        let empty_after_normalization =
            !chunk.raw_text.trim().is_empty() && normalized_text.is_empty();
        if empty_after_normalization {
            debug!(
                document_id = %chunk.document_id,
                sequence_index = chunk.sequence_index,
                "normalization erased all content, retaining flagged chunk"
            );
        }

        let metadata = ChunkMetadata::from_document(document, chunk.sequence_index);
        ChunkRecord {
            chunk,
            normalized_text,
            keywords,
            metadata,
            empty_after_normalization,
        }
    }

    // Edit distance one against the dictionary; empty dictionary is a no-op.
    fn correct_spelling(&self, text: &str) -> String {
        if self.dictionary.is_empty() {
            return text.to_string();
        }
        text.split_whitespace()
            .map(|word| {
                let lowered = word.to_lowercase();
                if !word.chars().all(|c| c.is_alphabetic())
                    || self.dictionary.contains(&lowered)
                {
                    return word.to_string();
                }
                match first_known_edit(&lowered, &self.dictionary) {
                    Some(corrected) => corrected,
                    None => word.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    // Stopwords leave the candidate pool, not the normalized text itself.
    fn keyword_candidates(&self, normalized_text: &str) -> Vec<String> {
        normalized_text
            .split_whitespace()
            .filter_map(|token| {
                let stripped: String = token
                    .chars()
                    .filter(|c| c.is_ascii_alphabetic())
                    .collect::<String>()
                    .to_lowercase();
                if stripped.is_empty() || self.stopwords.contains(&stripped) {
                    None
                } else {
                    Some(stripped)
                }
            })
            .collect()
    }

    // Frequency rank, ties broken by first occurrence.
    fn extract_keywords(&self, candidates: &[String]) -> Vec<String> {
        let mut stats: HashMap<&str, (usize, usize)> = HashMap::new();
        for (position, term) in candidates.iter().enumerate() {
            let entry = stats.entry(term).or_insert((0, position));
            entry.0 += 1;
        }

        let mut ranked: Vec<(&str, usize, usize)> = stats
            .into_iter()
            .map(|(term, (count, first))| (term, count, first))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

        ranked
            .into_iter()
            .take(self.keyword_top_n)
            .map(|(term, _, _)| term.to_string())
            .collect()
    }
}

// NFKD, drop combining marks, recompose.
pub fn normalize_unicode(text: &str) -> String {
    text.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .nfc()
        .collect()
}

pub fn clean_surface(text: &str, lowercase: bool) -> String {
    let without_controls: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let collapsed = without_controls
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if lowercase {
        collapsed.to_lowercase()
    } else {
        collapsed
    }
}

// Edits scan in a fixed order so the chosen correction is reproducible.
fn first_known_edit(word: &str, dictionary: &HashSet<String>) -> Option<String> {
    const ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";
    let chars: Vec<char> = word.chars().collect();

    for i in 0..chars.len() {
        let mut deleted = chars.clone();
        deleted.remove(i);
        let candidate: String = deleted.into_iter().collect();
        if dictionary.contains(&candidate) {
            return Some(candidate);
        }
    }

    for i in 0..chars.len().saturating_sub(1) {
        let mut swapped = chars.clone();
        swapped.swap(i, i + 1);
        let candidate: String = swapped.into_iter().collect();
        if dictionary.contains(&candidate) {
            return Some(candidate);
        }
    }

    for i in 0..chars.len() {
        for letter in ALPHABET.chars() {
            let mut replaced = chars.clone();
            replaced[i] = letter;
            let candidate: String = replaced.into_iter().collect();
            if candidate != word && dictionary.contains(&candidate) {
                return Some(candidate);
            }
        }
    }

    for i in 0..=chars.len() {
        for letter in ALPHABET.chars() {
            let mut inserted = chars.clone();
            inserted.insert(i, letter);
            let candidate: String = inserted.into_iter().collect();
            if dictionary.contains(&candidate) {
                return Some(candidate);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    fn document() -> Document {
        Document {
            id: "d1".to_string(),
            content: String::new(),
            source: Some("wiki".to_string()),
            doc_type: Some("article".to_string()),
            title: Some("Foxes".to_string()),
            location: None,
            created_at: None,
            fetched_at: None,
            language: Some("en".to_string()),
        }
    }

    fn chunk(text: &str) -> Chunk {
        Chunk {
            document_id: "d1".to_string(),
            sequence_index: 0,
            raw_text: text.to_string(),
            token_count: text.split_whitespace().count(),
        }
    }

    fn enricher(config: &PipelineConfig) -> Enricher {
        Enricher::new(config).unwrap()
    }

    #[test]
    fn normalized_text_keeps_stopwords_but_keywords_drop_them() {
        let config = PipelineConfig::default();
        let record = enricher(&config).enrich(chunk("the quick brown"), &document());

        assert_eq!(record.normalized_text, "the quick brown");
        assert_eq!(record.keywords, vec!["quick", "brown"]);
        assert!(!record.empty_after_normalization);
    }

    #[test]
    fn visually_identical_strings_normalize_equal() {
        let composed = "caf\u{e9}";
        let decomposed = "cafe\u{301}";
        assert_eq!(normalize_unicode(composed), normalize_unicode(decomposed));
    }

    #[test]
    fn control_characters_are_stripped_and_whitespace_collapsed() {
        let cleaned = clean_surface("A\u{0000}  lot\n\nof\t spacing", true);
        assert_eq!(cleaned, "a lot of spacing");
    }

    #[test]
    fn keywords_rank_by_frequency_then_first_occurrence() {
        let config = PipelineConfig {
            keyword_top_n: 3,
            ..Default::default()
        };
        let record = enricher(&config).enrich(
            chunk("pump valve pump seal valve pump gasket seal bolt"),
            &document(),
        );
        assert_eq!(record.keywords, vec!["pump", "valve", "seal"]);
    }

    #[test]
    fn keyword_list_is_bounded_and_deduplicated() {
        let config = PipelineConfig {
            keyword_top_n: 2,
            ..Default::default()
        };
        let record = enricher(&config).enrich(chunk("alpha alpha beta gamma"), &document());
        assert_eq!(record.keywords.len(), 2);
        assert_eq!(record.keywords, vec!["alpha", "beta"]);
    }

    #[test]
    fn punctuation_is_stripped_from_keywords_only() {
        let config = PipelineConfig::default();
        let record = enricher(&config).enrich(chunk("valve, seal."), &document());
        assert_eq!(record.normalized_text, "valve, seal.");
        assert_eq!(record.keywords, vec!["valve", "seal"]);
    }

    #[test]
    fn pure_stopword_chunk_is_retained_with_flag() {
        let config = PipelineConfig::default();
        let record = enricher(&config).enrich(chunk("\u{0001}\u{0002}"), &document());
        assert!(record.empty_after_normalization);
        assert!(record.normalized_text.is_empty());
        assert!(record.keywords.is_empty());
    }

    #[test]
    fn empty_chunk_is_not_flagged() {
        let config = PipelineConfig::default();
        let record = enricher(&config).enrich(chunk("   "), &document());
        assert!(!record.empty_after_normalization);
    }

    #[test]
    fn spelling_correction_fixes_distance_one_typos() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("dict.txt");
        std::fs::write(&path, "hydraulic\npressure\n")?;

        let config = PipelineConfig {
            dictionary_path: Some(path),
            ..Default::default()
        };
        let record = enricher(&config).enrich(chunk("hydralic pressure"), &document());
        assert_eq!(record.normalized_text, "hydraulic pressure");
        Ok(())
    }

    #[test]
    fn unknown_tokens_pass_through_uncorrected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("dict.txt");
        std::fs::write(&path, "pressure\n")?;

        let config = PipelineConfig {
            dictionary_path: Some(path),
            lowercase: false,
            ..Default::default()
        };
        // Proper noun and code identifier: both far from any dictionary
        // word, both contain non-alphabetic characters or no close match.
        let record = enricher(&config).enrich(chunk("Qdrant upsert_points()"), &document());
        assert_eq!(record.normalized_text, "Qdrant upsert_points()");
        Ok(())
    }

    #[test]
    fn enrichment_is_deterministic() {
        let config = PipelineConfig::default();
        let e = enricher(&config);
        let first = e.enrich(chunk("pressure valve seal pressure"), &document());
        let second = e.enrich(chunk("pressure valve seal pressure"), &document());
        assert_eq!(first.normalized_text, second.normalized_text);
        assert_eq!(first.keywords, second.keywords);
    }

    #[test]
    fn metadata_copies_parent_document_fields() {
        let config = PipelineConfig::default();
        let record = enricher(&config).enrich(chunk("some text"), &document());
        assert_eq!(record.metadata.document_id, "d1");
        assert_eq!(record.metadata.sequence_index, 0);
        assert_eq!(record.metadata.source.as_deref(), Some("wiki"));
        assert_eq!(record.metadata.title.as_deref(), Some("Foxes"));
        assert_eq!(record.metadata.language.as_deref(), Some("en"));
    }
}
