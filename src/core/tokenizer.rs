//! Main tokenizer interface.
//!
//! [`Tokenizer`] owns the immutable lookup tables (rank table and
//! special-token table), the compiled segmentation pattern, an Aho-Corasick
//! automaton over the special-token names, and an LRU cache of encoded
//! chunks. Encoding and decoding are pure functions over that shared state:
//! independent texts can be processed concurrently with no coordination
//! beyond the cache mutex, which only ever holds derived data.
//!
//! # Special tokens
//!
//! Callers pick one of three behaviors for special-token names appearing in
//! input text via [`SpecialTokenPolicy`]: reject the text, splice in the
//! reserved ids, or tokenize the names as ordinary text. [`Tokenizer::encode`]
//! is the plain-text path; [`Tokenizer::encode_with_special`] is the splicing
//! path.
//!
//! # Decoding
//!
//! [`Tokenizer::decode`] is strict: an id outside the vocabulary fails with
//! [`TokenizerError::UnknownTokenId`] and byte sequences that are not valid
//! UTF-8 fail with [`TokenizerError::InvalidUtf8`]. [`Tokenizer::decode_lossy`]
//! is the explicit lenient mode: invalid UTF-8 becomes U+FFFD, but unknown
//! ids are still rejected.

use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Mutex;

use aho_corasick::{AhoCorasick, MatchKind};
use lru::LruCache;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHasher};
use thiserror::Error;

use super::bpe::byte_pair_encode;
use super::segment::Segmenter;
use super::vocab::{build_decoder, load_tiktoken_bpe, load_tiktoken_bpe_file, VocabError};

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Regex compilation error: {0}")]
    RegexError(#[from] fancy_regex::Error),
    #[error("Vocabulary error: {0}")]
    VocabError(#[from] VocabError),
    #[error("Aho-Corasick build error: {0}")]
    AhoCorasickError(#[from] aho_corasick::BuildError),
    #[error("segmentation rules left input uncovered at byte {byte_offset}")]
    UnsegmentableInput { byte_offset: usize },
    #[error("merge produced a piece missing from the rank table: {piece:?}")]
    VocabularyInconsistency { piece: Vec<u8> },
    #[error("special token {token:?} is not allowed in this input")]
    DisallowedSpecialToken { token: String },
    #[error("Invalid token ID: {0}")]
    UnknownTokenId(u32),
    #[error("Decoding error: invalid UTF-8")]
    InvalidUtf8,
}

/// What to do with special-token names appearing literally in input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialTokenPolicy {
    /// Reject the text with [`TokenizerError::DisallowedSpecialToken`].
    Forbid,
    /// Recognize the names and splice in their reserved ids.
    Allow,
    /// Tokenize the names as ordinary text.
    PlainText,
}

/// Default cache size for encoded chunks
const DEFAULT_CACHE_SIZE: usize = 4096;

/// BPE tokenizer over an immutable rank table and special-token table.
pub struct Tokenizer {
    encoder: FxHashMap<Vec<u8>, u32>,
    decoder: FxHashMap<u32, Vec<u8>>,
    special_tokens: FxHashMap<String, u32>,
    special_tokens_decoder: FxHashMap<u32, String>,
    special_token_strings: Vec<String>,
    segmenter: Segmenter,
    special_matcher: Option<AhoCorasick>,
    chunk_cache: Mutex<LruCache<u64, Vec<u32>>>,
    cache_size: usize,
}

impl Tokenizer {
    /// Create a new tokenizer from an encoder map, special tokens, and a
    /// segmentation pattern.
    ///
    /// # Arguments
    /// * `encoder` - Map of byte sequences to token ids (the rank table)
    /// * `special_tokens` - Map of special token strings to reserved ids
    /// * `pattern` - Segmentation pattern, e.g. [`crate::KIMI_PATTERN`]
    pub fn new(
        encoder: FxHashMap<Vec<u8>, u32>,
        special_tokens: FxHashMap<String, u32>,
        pattern: &str,
    ) -> Result<Self, TokenizerError> {
        Self::with_cache_size(encoder, special_tokens, pattern, DEFAULT_CACHE_SIZE)
    }

    /// Create a new tokenizer with a custom chunk-cache size.
    pub fn with_cache_size(
        encoder: FxHashMap<Vec<u8>, u32>,
        special_tokens: FxHashMap<String, u32>,
        pattern: &str,
        cache_size: usize,
    ) -> Result<Self, TokenizerError> {
        let decoder = build_decoder(&encoder);
        let special_tokens_decoder: FxHashMap<u32, String> = special_tokens
            .iter()
            .map(|(k, v)| (*v, k.clone()))
            .collect();

        let segmenter = Segmenter::new(pattern)?;

        // Leftmost-longest keeps overlapping special names unambiguous.
        let special_token_strings: Vec<String> = special_tokens.keys().cloned().collect();
        let special_matcher = if special_token_strings.is_empty() {
            None
        } else {
            Some(
                AhoCorasick::builder()
                    .match_kind(MatchKind::LeftmostLongest)
                    .build(&special_token_strings)?,
            )
        };

        let cache_size_nz = NonZeroUsize::new(cache_size.max(1)).unwrap();
        let chunk_cache = Mutex::new(LruCache::new(cache_size_nz));

        Ok(Self {
            encoder,
            decoder,
            special_tokens,
            special_tokens_decoder,
            special_token_strings,
            segmenter,
            special_matcher,
            chunk_cache,
            cache_size,
        })
    }

    /// Create a tokenizer from a tiktoken rank-table file.
    pub fn from_file(
        vocab_path: &str,
        pattern: &str,
        special_tokens: FxHashMap<String, u32>,
    ) -> Result<Self, TokenizerError> {
        let encoder = load_tiktoken_bpe_file(vocab_path)?;
        Self::new(encoder, special_tokens, pattern)
    }

    /// Create a tokenizer from raw rank-table bytes.
    pub fn from_bytes(
        vocab_data: &[u8],
        pattern: &str,
        special_tokens: FxHashMap<String, u32>,
    ) -> Result<Self, TokenizerError> {
        let encoder = load_tiktoken_bpe(vocab_data)?;
        Self::new(encoder, special_tokens, pattern)
    }

    /// Compute a fast hash for a byte slice to use as an LRU cache key.
    #[inline]
    fn hash_slice(slice: &[u8]) -> u64 {
        let mut hasher = FxHasher::default();
        slice.hash(&mut hasher);
        hasher.finish()
    }

    /// Encode a single chunk's bytes with LRU caching.
    fn encode_chunk(&self, chunk: &[u8]) -> Result<Vec<u32>, TokenizerError> {
        // Fast path: the entire chunk is a known token.
        if let Some(&rank) = self.encoder.get(chunk) {
            return Ok(vec![rank]);
        }

        let hash = Self::hash_slice(chunk);
        if let Ok(mut cache) = self.chunk_cache.lock() {
            if let Some(cached) = cache.get(&hash) {
                return Ok(cached.clone());
            }
        }

        let result = byte_pair_encode(chunk, &self.encoder)?;

        if let Ok(mut cache) = self.chunk_cache.lock() {
            cache.put(hash, result.clone());
        }

        Ok(result)
    }

    /// Encode text to token ids, treating special-token names as ordinary
    /// text (the [`SpecialTokenPolicy::PlainText`] path).
    pub fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerError> {
        let mut ids = Vec::with_capacity(text.len() / 3);
        for chunk in self.segmenter.segments(text) {
            ids.extend(self.encode_chunk(chunk?.as_bytes())?);
        }
        Ok(ids)
    }

    /// Encode text to token ids, splicing in reserved ids wherever a
    /// special-token name occurs (the [`SpecialTokenPolicy::Allow`] path).
    ///
    /// Text between and around the matches is segmented and merged normally.
    pub fn encode_with_special(&self, text: &str) -> Result<Vec<u32>, TokenizerError> {
        let Some(ref special_matcher) = self.special_matcher else {
            return self.encode(text);
        };

        let mut ids = Vec::with_capacity(text.len() / 3);
        let mut last_end = 0;

        for m in special_matcher.find_iter(text.as_bytes()) {
            if m.start() > last_end {
                ids.extend(self.encode(&text[last_end..m.start()])?);
            }

            let token = &self.special_token_strings[m.pattern().as_usize()];
            if let Some(&id) = self.special_tokens.get(token) {
                ids.push(id);
            }

            last_end = m.end();
        }

        if last_end < text.len() {
            ids.extend(self.encode(&text[last_end..])?);
        }

        Ok(ids)
    }

    /// Encode text under the given special-token policy.
    ///
    /// [`SpecialTokenPolicy::Forbid`] scans the text first and rejects it
    /// before any encoding work if a special-token name occurs anywhere.
    pub fn encode_with_policy(
        &self,
        text: &str,
        policy: SpecialTokenPolicy,
    ) -> Result<Vec<u32>, TokenizerError> {
        match policy {
            SpecialTokenPolicy::Allow => self.encode_with_special(text),
            SpecialTokenPolicy::PlainText => self.encode(text),
            SpecialTokenPolicy::Forbid => {
                if let Some(m) = self
                    .special_matcher
                    .as_ref()
                    .and_then(|ac| ac.find(text.as_bytes()))
                {
                    return Err(TokenizerError::DisallowedSpecialToken {
                        token: self.special_token_strings[m.pattern().as_usize()].clone(),
                    });
                }
                self.encode(text)
            }
        }
    }

    /// Batch encode multiple texts in parallel.
    ///
    /// Results are paired with inputs by position; one text's failure leaves
    /// the other texts' results intact.
    pub fn encode_batch(&self, texts: &[String]) -> Vec<Result<Vec<u32>, TokenizerError>> {
        texts.par_iter().map(|text| self.encode(text)).collect()
    }

    /// Batch encode multiple texts in parallel under the given policy.
    pub fn encode_batch_with_policy(
        &self,
        texts: &[String],
        policy: SpecialTokenPolicy,
    ) -> Vec<Result<Vec<u32>, TokenizerError>> {
        texts
            .par_iter()
            .map(|text| self.encode_with_policy(text, policy))
            .collect()
    }

    /// Decode token ids back to bytes.
    ///
    /// Ids resolve through the rank table first, then the special-token
    /// table; anything else is rejected.
    pub fn decode_bytes(&self, tokens: &[u32]) -> Result<Vec<u8>, TokenizerError> {
        let mut bytes = Vec::with_capacity(tokens.len() * 4);

        for &token in tokens {
            if let Some(piece) = self.decoder.get(&token) {
                bytes.extend_from_slice(piece);
            } else if let Some(special) = self.special_tokens_decoder.get(&token) {
                bytes.extend_from_slice(special.as_bytes());
            } else {
                return Err(TokenizerError::UnknownTokenId(token));
            }
        }

        Ok(bytes)
    }

    /// Decode token ids to a string, rejecting invalid UTF-8.
    pub fn decode(&self, tokens: &[u32]) -> Result<String, TokenizerError> {
        String::from_utf8(self.decode_bytes(tokens)?).map_err(|_| TokenizerError::InvalidUtf8)
    }

    /// Decode token ids to a string, replacing invalid UTF-8 sequences with
    /// U+FFFD. Unknown ids are still rejected.
    pub fn decode_lossy(&self, tokens: &[u32]) -> Result<String, TokenizerError> {
        Ok(String::from_utf8_lossy(&self.decode_bytes(tokens)?).into_owned())
    }

    /// Batch decode multiple token lists in parallel.
    pub fn decode_batch(&self, token_lists: &[Vec<u32>]) -> Vec<Result<String, TokenizerError>> {
        token_lists
            .par_iter()
            .map(|tokens| self.decode(tokens))
            .collect()
    }

    /// Get the vocabulary size (total number of token ids, including special
    /// tokens). This returns max token id + 1, the full id range.
    pub fn vocab_size(&self) -> usize {
        let max_decoder_id = self.decoder.keys().max().copied().unwrap_or(0);
        let max_special_id = self.special_tokens.values().max().copied().unwrap_or(0);
        (max_decoder_id.max(max_special_id) + 1) as usize
    }

    /// Get the encoder map (token bytes -> id).
    pub fn encoder(&self) -> &FxHashMap<Vec<u8>, u32> {
        &self.encoder
    }

    /// Get the decoder map (token id -> bytes).
    pub fn decoder(&self) -> &FxHashMap<u32, Vec<u8>> {
        &self.decoder
    }

    /// Get the special tokens map.
    pub fn special_tokens(&self) -> &FxHashMap<String, u32> {
        &self.special_tokens
    }

    /// Get the special tokens decoder map.
    pub fn special_tokens_decoder(&self) -> &FxHashMap<u32, String> {
        &self.special_tokens_decoder
    }

    /// The segmentation pattern this tokenizer was built with.
    pub fn pattern(&self) -> &str {
        self.segmenter.pattern()
    }

    /// Clear the chunk cache.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.chunk_cache.lock() {
            cache.clear();
        }
    }

    /// Get the current number of cached chunks.
    pub fn cache_len(&self) -> usize {
        self.chunk_cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl Clone for Tokenizer {
    fn clone(&self) -> Self {
        // The pattern and the name list compiled once already; recompiling
        // them cannot fail.
        let segmenter = Segmenter::new(self.segmenter.pattern()).unwrap();
        let special_matcher = if self.special_token_strings.is_empty() {
            None
        } else {
            Some(
                AhoCorasick::builder()
                    .match_kind(MatchKind::LeftmostLongest)
                    .build(&self.special_token_strings)
                    .unwrap(),
            )
        };

        // Caches are not shared between clones.
        let cache_size_nz = NonZeroUsize::new(self.cache_size.max(1)).unwrap();
        let chunk_cache = Mutex::new(LruCache::new(cache_size_nz));

        Self {
            encoder: self.encoder.clone(),
            decoder: self.decoder.clone(),
            special_tokens: self.special_tokens.clone(),
            special_tokens_decoder: self.special_tokens_decoder.clone(),
            special_token_strings: self.special_token_strings.clone(),
            segmenter,
            special_matcher,
            chunk_cache,
            cache_size: self.cache_size,
        }
    }
}
