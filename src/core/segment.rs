//! Text segmentation for BPE pre-tokenization.
//!
//! Splits raw text into non-overlapping chunks with an ordered-alternation
//! pattern (first match wins at each scan position). Chunks partition the
//! text exactly; the byte-pair merger then runs inside each chunk.

use fancy_regex::Regex;

use super::tokenizer::TokenizerError;

/// Compiled segmentation pattern.
///
/// Segmentation happens through [`Segmenter::segments`], which yields chunks
/// lazily and verifies as it goes that the pattern leaves no gap in the
/// input. The rule set is expected to cover every possible input; a gap is a
/// rule-set bug surfaced as [`TokenizerError::UnsegmentableInput`] rather
/// than silently dropped text.
pub struct Segmenter {
    regex: Regex,
    pattern: String,
}

impl Segmenter {
    /// Compile a segmentation pattern.
    pub fn new(pattern: &str) -> Result<Self, fancy_regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            pattern: pattern.to_string(),
        })
    }

    /// The source pattern this segmenter was compiled from.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Lazily segment `text` into chunks.
    ///
    /// The iterator is finite and restartable: calling `segments` again
    /// produces a fresh pass over the same text.
    pub fn segments<'r, 't>(&'r self, text: &'t str) -> Segments<'r, 't> {
        Segments {
            text,
            pos: 0,
            done: false,
            matches: self.regex.find_iter(text),
        }
    }
}

/// Iterator over the chunks of one text. See [`Segmenter::segments`].
pub struct Segments<'r, 't> {
    text: &'t str,
    pos: usize,
    done: bool,
    matches: fancy_regex::Matches<'r, 't>,
}

impl<'r, 't> Iterator for Segments<'r, 't> {
    type Item = Result<&'t str, TokenizerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.matches.next() {
            Some(Ok(m)) => {
                if m.start() != self.pos {
                    self.done = true;
                    return Some(Err(TokenizerError::UnsegmentableInput {
                        byte_offset: self.pos,
                    }));
                }
                self.pos = m.end();
                Some(Ok(m.as_str()))
            }
            Some(Err(e)) => {
                self.done = true;
                Some(Err(e.into()))
            }
            None => {
                self.done = true;
                if self.pos < self.text.len() {
                    Some(Err(TokenizerError::UnsegmentableInput {
                        byte_offset: self.pos,
                    }))
                } else {
                    None
                }
            }
        }
    }
}
