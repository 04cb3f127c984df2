//! Byte-pair merge.
//!
//! Turns one chunk's bytes into a sequence of vocabulary ranks by repeatedly
//! merging the lowest-rank adjacent pair (leftmost wins ties) until no
//! adjacent pair's concatenation exists in the rank table. The span-based
//! implementation caches the rank of merging each span with its successor and
//! only recomputes the two ranks a merge invalidates, but performs exactly
//! the same merges in exactly the same order as a naive rescan.

use rustc_hash::FxHashMap;

use super::tokenizer::TokenizerError;

/// Rank of a span's merge with its successor; offset indexes into the piece.
struct Span {
    offset: usize,
    rank: u32,
}

fn pair_rank(ranks: &FxHashMap<Vec<u8>, u32>, pair: &[u8]) -> u32 {
    ranks.get(pair).copied().unwrap_or(u32::MAX)
}

fn lookup(ranks: &FxHashMap<Vec<u8>, u32>, piece: &[u8]) -> Result<u32, TokenizerError> {
    ranks
        .get(piece)
        .copied()
        .ok_or_else(|| TokenizerError::VocabularyInconsistency {
            piece: piece.to_vec(),
        })
}

/// Encode one chunk's bytes into ranks via byte-pair merging.
///
/// The concatenation of the returned ranks' byte sequences equals `piece`
/// exactly. A final piece absent from the rank table means the table does
/// not match the merge rules that produced it (a corrupted or mismatched
/// vocabulary) and fails with [`TokenizerError::VocabularyInconsistency`].
pub fn byte_pair_encode(
    piece: &[u8],
    ranks: &FxHashMap<Vec<u8>, u32>,
) -> Result<Vec<u32>, TokenizerError> {
    if piece.is_empty() {
        return Ok(Vec::new());
    }
    if piece.len() == 1 {
        return Ok(vec![lookup(ranks, piece)?]);
    }

    // One span per byte, plus two end markers so rank recomputation can
    // always look one span past the merge site.
    let mut spans: Vec<Span> = Vec::with_capacity(piece.len() + 1);
    let mut min_idx = usize::MAX;
    let mut min_rank = u32::MAX;
    for i in 0..piece.len() - 1 {
        let rank = pair_rank(ranks, &piece[i..i + 2]);
        if rank < min_rank {
            min_idx = i;
            min_rank = rank;
        }
        spans.push(Span { offset: i, rank });
    }
    spans.push(Span {
        offset: piece.len() - 1,
        rank: u32::MAX,
    });
    spans.push(Span {
        offset: piece.len(),
        rank: u32::MAX,
    });

    // `spans[i].rank` is the rank of merging span i with span i + 1. The +3
    // below is because span i + 1 has not been removed yet when we recompute.
    let merged_rank = |spans: &[Span], i: usize| -> u32 {
        if i + 3 < spans.len() {
            pair_rank(ranks, &piece[spans[i].offset..spans[i + 3].offset])
        } else {
            u32::MAX
        }
    };

    while min_rank != u32::MAX {
        let i = min_idx;
        if i > 0 {
            let rank = merged_rank(&spans, i - 1);
            spans[i - 1].rank = rank;
        }
        let rank = merged_rank(&spans, i);
        spans[i].rank = rank;
        spans.remove(i + 1);

        min_idx = usize::MAX;
        min_rank = u32::MAX;
        for (j, span) in spans[..spans.len() - 1].iter().enumerate() {
            if span.rank < min_rank {
                min_idx = j;
                min_rank = span.rank;
            }
        }
    }

    let mut tokens = Vec::with_capacity(spans.len() - 1);
    for pair in spans.windows(2) {
        tokens.push(lookup(ranks, &piece[pair[0].offset..pair[1].offset])?);
    }
    Ok(tokens)
}
