//! Tokenize request/response boundary records.
//!
//! The crate's external boundary is a batch tokenize call: a list of
//! independent texts plus one policy flag in, one record per text out. The
//! response echoes the vocabulary identity so callers can verify which
//! rank table produced the ids.
//!
//! Per-text failures are captured in that text's record rather than aborting
//! the batch; sibling results are never lost. A request whose `texts` holds
//! anything but strings fails deserialization outright.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::{SpecialTokenPolicy, Tokenizer, KIMI_REPO_ID, KIMI_REVISION};

fn default_allow_special_tokens() -> bool {
    true
}

/// A batch tokenize request.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenizeRequest {
    /// Independent input texts, tokenized in order.
    pub texts: Vec<String>,
    /// When true, special-token names in the input are encoded as their
    /// reserved ids; when false, they make the affected text fail. Defaults
    /// to true.
    #[serde(default = "default_allow_special_tokens")]
    pub allow_special_tokens: bool,
}

/// One per-text result: the input echoed back, its token ids, and the text
/// re-derived from those ids (for round-trip verification; lossy decode, so
/// undecodable byte boundaries become U+FFFD rather than failing).
#[derive(Debug, Clone, Serialize)]
pub struct TextRecord {
    pub text: String,
    pub ids: Vec<u32>,
    pub decoded: String,
    /// Set when this text failed; `ids` and `decoded` are empty then.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A batch tokenize response.
#[derive(Debug, Clone, Serialize)]
pub struct TokenizeResponse {
    pub repo_id: String,
    pub revision: String,
    pub allow_special_tokens: bool,
    pub results: Vec<TextRecord>,
}

/// Run a tokenize request against a tokenizer.
///
/// `allow_special_tokens: true` maps to [`SpecialTokenPolicy::Allow`],
/// `false` to [`SpecialTokenPolicy::Forbid`]. Callers that want disallowed
/// names tokenized as plain text instead use [`run_with_policy`] with
/// [`SpecialTokenPolicy::PlainText`].
pub fn run(tokenizer: &Tokenizer, request: &TokenizeRequest) -> TokenizeResponse {
    let policy = if request.allow_special_tokens {
        SpecialTokenPolicy::Allow
    } else {
        SpecialTokenPolicy::Forbid
    };
    run_with_policy(tokenizer, request, policy)
}

/// Run a tokenize request under an explicit special-token policy.
pub fn run_with_policy(
    tokenizer: &Tokenizer,
    request: &TokenizeRequest,
    policy: SpecialTokenPolicy,
) -> TokenizeResponse {
    let results = request
        .texts
        .par_iter()
        .map(|text| tokenize_one(tokenizer, text, policy))
        .collect();

    TokenizeResponse {
        repo_id: KIMI_REPO_ID.to_string(),
        revision: KIMI_REVISION.to_string(),
        allow_special_tokens: request.allow_special_tokens,
        results,
    }
}

fn tokenize_one(tokenizer: &Tokenizer, text: &str, policy: SpecialTokenPolicy) -> TextRecord {
    let outcome = tokenizer
        .encode_with_policy(text, policy)
        .and_then(|ids| tokenizer.decode_lossy(&ids).map(|decoded| (ids, decoded)));

    match outcome {
        Ok((ids, decoded)) => TextRecord {
            text: text.to_string(),
            ids,
            decoded,
            error: None,
        },
        Err(e) => TextRecord {
            text: text.to_string(),
            ids: Vec::new(),
            decoded: String::new(),
            error: Some(e.to_string()),
        },
    }
}
