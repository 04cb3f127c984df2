//! Core tokenization engine for kimitok.
//!
//! This module contains the BPE tokenizer implementation with:
//! - Vocabulary loading from the tiktoken rank-table format
//! - Unicode-aware text segmentation via the Kimi pattern
//! - Byte-pair merging with exact reference merge order
//! - Main tokenizer interface with LRU caching and Rayon parallelism
//!
//! # Architecture
//!
//! The core is organized into five components:
//!
//! - [`Tokenizer`]: Main tokenizer struct with encoding/decoding API, LRU cache,
//!   and Aho-Corasick special token matching
//! - [`Segmenter`]: splits raw text into pre-token chunks with the Kimi pattern
//! - [`byte_pair_encode`]: low-level byte-pair merge over one chunk's bytes
//! - [`load_tiktoken_bpe`]: rank-table loading in tiktoken format
//! - [`build_special_tokens`]: Kimi reserved special-token table builder

mod bpe;
mod kimi;
mod segment;
mod tokenizer;
mod vocab;

pub use bpe::byte_pair_encode;
pub use kimi::{
    build_special_tokens, from_kimi_files, reserved_token_name, KIMI_PATTERN, KIMI_REPO_ID,
    KIMI_REVISION, NUM_RESERVED_SPECIAL_TOKENS,
};
pub use segment::{Segmenter, Segments};
pub use tokenizer::{SpecialTokenPolicy, Tokenizer, TokenizerError};
pub use vocab::{build_decoder, load_tiktoken_bpe, load_tiktoken_bpe_file, VocabError};
