use crate::error::ConfigError;
use tiktoken_rs::CoreBPE;

/// Pluggable tokenizer used for chunk-size accounting. Round-trips must be
/// lossless for ASCII and best-effort for other scripts: a window boundary
/// may split a multi-byte character across tokens, so `decode` is lossy and
/// substitutes U+FFFD for fragments it cannot reassemble.
pub trait TextEncoding: Send + Sync {
    fn encode(&self, text: &str) -> Vec<u32>;
    fn decode(&self, tokens: &[u32]) -> String;
}

pub struct TiktokenEncoding {
    bpe: CoreBPE,
}

impl TiktokenEncoding {
    pub fn for_name(name: &str) -> Result<Self, ConfigError> {
        let bpe = match name {
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            "o200k_base" => tiktoken_rs::o200k_base(),
            "p50k_base" => tiktoken_rs::p50k_base(),
            "r50k_base" => tiktoken_rs::r50k_base(),
            other => return Err(ConfigError::UnknownEncoding(other.to_string())),
        }
        .map_err(|error| ConfigError::UnknownEncoding(format!("{name}: {error}")))?;
        Ok(Self { bpe })
    }
}

impl TextEncoding for TiktokenEncoding {
    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe.encode_ordinary(text)
    }

    fn decode(&self, tokens: &[u32]) -> String {
        if let Ok(text) = self.bpe.decode(tokens.to_vec()) {
            return text;
        }
        // An edge token holding a partial UTF-8 sequence fails the whole
        // slice; decode per token and replace the unrecoverable ones.
        tokens
            .iter()
            .map(|&token| {
                self.bpe
                    .decode(vec![token])
                    .unwrap_or_else(|_| "\u{FFFD}".to_string())
            })
            .collect()
    }
}
