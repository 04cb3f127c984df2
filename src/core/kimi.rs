//! Kimi K2 vocabulary support.
//!
//! The Kimi tokenizer is a tiktoken-style byte-level BPE over a published
//! rank table (`tiktoken.model`) plus a block of 256 reserved special tokens
//! sitting immediately after the base vocabulary. Special-token names come
//! from the `added_tokens_decoder` section of `tokenizer_config.json`; slots
//! without a published name get a deterministic placeholder so the reserved
//! range is always fully named.

use rustc_hash::FxHashMap;
use serde::Deserialize;

use super::tokenizer::{Tokenizer, TokenizerError};
use super::vocab::{load_tiktoken_bpe_file, VocabError};

/// Hugging Face repository the Kimi vocabulary artifacts are published under.
pub const KIMI_REPO_ID: &str = "moonshotai/Kimi-K2-Thinking";

/// Pinned revision of [`KIMI_REPO_ID`] this crate's tokenization is verified
/// against.
pub const KIMI_REVISION: &str = "612681931a8c906ddb349f8ad0f582cb552189cd";

/// Number of reserved special-token slots following the base vocabulary.
pub const NUM_RESERVED_SPECIAL_TOKENS: u32 = 256;

/// Segmentation pattern for the Kimi vocabulary, from `tokenization_kimi.py`
/// in the Kimi repo.
///
/// Ordered alternatives, first match wins at each scan position:
/// Han runs; uppercase-led word shapes; lowercase-core word shapes (both with
/// optional English contraction suffix); runs of one to three digits; symbol
/// runs with an optional leading space, absorbing trailing line breaks;
/// whitespace containing a line break; trailing whitespace; residual
/// whitespace.
pub const KIMI_PATTERN: &str = r"[\p{Han}]+|[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}&&[^\p{Han}]]*[\p{Ll}\p{Lm}\p{Lo}\p{M}&&[^\p{Han}]]+(?i:'s|'t|'re|'ve|'m|'ll|'d)?|[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}&&[^\p{Han}]]+[\p{Ll}\p{Lm}\p{Lo}\p{M}&&[^\p{Han}]]*(?i:'s|'t|'re|'ve|'m|'ll|'d)?|\p{N}{1,3}| ?[^\s\p{L}\p{N}]+[\r\n]*|\s*[\r\n]+|\s+(?!\S)|\s+";

/// Placeholder name for a reserved special-token slot with no published name.
pub fn reserved_token_name(id: u32) -> String {
    format!("<|reserved_token_{id}|>")
}

/// `tokenizer_config.json`, reduced to the one section we read. All other
/// fields are ignored.
#[derive(Deserialize)]
struct TokenizerConfig {
    #[serde(default)]
    added_tokens_decoder: serde_json::Map<String, serde_json::Value>,
}

/// Build the special-token table for a base vocabulary of `num_base_tokens`
/// entries from raw `tokenizer_config.json` text.
///
/// Every id in `[num_base_tokens, num_base_tokens + 256)` ends up named:
/// either with the `content` string the metadata publishes for that exact id,
/// or with [`reserved_token_name`]. Metadata entries whose key is not a
/// non-negative integer, or whose value has no string `content` field, are
/// skipped. Unreadable JSON fails the load.
pub fn build_special_tokens(
    metadata: &str,
    num_base_tokens: u32,
) -> Result<FxHashMap<String, u32>, VocabError> {
    let config: TokenizerConfig = serde_json::from_str(metadata)?;

    let mut named: FxHashMap<u32, String> = FxHashMap::default();
    for (key, attrs) in &config.added_tokens_decoder {
        let Ok(id) = key.parse::<u32>() else {
            log::debug!("skipping added token with non-integer key {key:?}");
            continue;
        };
        match attrs.get("content").and_then(|c| c.as_str()) {
            Some(content) => {
                named.insert(id, content.to_string());
            }
            None => log::debug!("skipping added token {id} without string content"),
        }
    }

    let mut special_tokens = FxHashMap::default();
    for id in num_base_tokens..num_base_tokens + NUM_RESERVED_SPECIAL_TOKENS {
        let name = named.remove(&id).unwrap_or_else(|| reserved_token_name(id));
        special_tokens.insert(name, id);
    }

    Ok(special_tokens)
}

/// Build a Kimi tokenizer from local copies of the vocabulary artifacts:
/// the `tiktoken.model` rank table and `tokenizer_config.json`.
///
/// Fetching and caching the artifacts is the caller's concern; this only
/// reads the files it is given.
pub fn from_kimi_files(model_path: &str, config_path: &str) -> Result<Tokenizer, TokenizerError> {
    let encoder = load_tiktoken_bpe_file(model_path)?;
    let metadata = std::fs::read_to_string(config_path).map_err(VocabError::from)?;
    let special_tokens = build_special_tokens(&metadata, encoder.len() as u32)?;

    log::info!(
        "loaded Kimi vocabulary: {} base tokens, {} special tokens",
        encoder.len(),
        special_tokens.len()
    );

    Tokenizer::new(encoder, special_tokens, KIMI_PATTERN)
}
