//! Kimitok - BPE tokenizer for the Kimi K2 model family
//!
//! A tiktoken-compatible tokenizer featuring:
//! - The Kimi segmentation pattern (Han runs, cased word shapes, capped digit runs)
//! - Exact byte-pair merge order, bit-identical to the reference tokenization
//! - 256 reserved special tokens overlaid from tokenizer metadata
//! - Rayon parallelism for multi-core batch encoding
//! - FxHashMap for fast lookups
//! - Aho-Corasick for fast special token matching
//! - LRU cache for frequently encoded chunks

pub mod core;
pub mod service;

pub use crate::core::{
    build_decoder, build_special_tokens, byte_pair_encode, from_kimi_files, load_tiktoken_bpe,
    load_tiktoken_bpe_file, reserved_token_name, Segmenter, SpecialTokenPolicy, Tokenizer,
    TokenizerError, VocabError, KIMI_PATTERN, KIMI_REPO_ID, KIMI_REVISION,
    NUM_RESERVED_SPECIAL_TOKENS,
};
