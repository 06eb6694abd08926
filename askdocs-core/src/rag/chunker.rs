//! Text chunking for ingestion.
//!
//! Splits document text into overlapping fixed-size windows so that no
//! information falls into a gap between chunks. Windows prefer to end on
//! whitespace: when a whitespace character occurs shortly after the nominal
//! cut, the window is extended to it to avoid splitting words.

use thiserror::Error;

/// How far past the nominal cut the chunker looks for whitespace.
const BOUNDARY_LOOKAHEAD: usize = 50;

/// Errors that can occur configuring the chunker.
#[derive(Debug, Error)]
pub enum ChunkerError {
    /// The window cannot advance: overlap must be strictly smaller than the
    /// chunk size, and the chunk size nonzero.
    #[error("invalid chunk window: size {chunk_size}, overlap {overlap}")]
    InvalidWindow { chunk_size: usize, overlap: usize },
}

/// Splits text into overlapping character windows.
///
/// Successive chunks share `overlap` characters. Chunks are trimmed, and
/// trimmed chunks shorter than the minimum length are dropped; fragments
/// that short carry no retrievable signal.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
    min_len: usize,
}

impl Chunker {
    /// Creates a chunker, failing fast on a window that could never
    /// terminate.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkerError> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(ChunkerError::InvalidWindow {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
            min_len: 10,
        })
    }

    /// Overrides the minimum trimmed chunk length.
    pub fn with_min_len(mut self, min_len: usize) -> Self {
        self.min_len = min_len;
        self
    }

    /// Returns a lazy iterator over the chunks of `text`.
    ///
    /// The iterator borrows the input and holds no other state, so splitting
    /// the same text twice yields the same sequence.
    pub fn split<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            text,
            start: 0,
            chunk_size: self.chunk_size,
            step: self.chunk_size - self.overlap,
            min_len: self.min_len,
        }
    }
}

/// Lazy chunk iterator returned by [`Chunker::split`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    start: usize,
    chunk_size: usize,
    step: usize,
    min_len: usize,
}

impl Iterator for Chunks<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if self.start >= self.text.len() {
                return None;
            }

            let rest = &self.text[self.start..];

            // Nominal window end, then whitespace extension.
            let mut end = byte_offset_of_char(rest, self.chunk_size);
            if end < rest.len() {
                for (i, (offset, ch)) in rest[end..].char_indices().enumerate() {
                    if i >= BOUNDARY_LOOKAHEAD {
                        break;
                    }
                    if ch.is_whitespace() {
                        end += offset;
                        break;
                    }
                }
            }

            let chunk = rest[..end].trim();

            // The window advances by size - overlap regardless of any
            // boundary extension.
            self.start += byte_offset_of_char(rest, self.step);

            if chunk.chars().count() >= self.min_len {
                return Some(chunk.to_string());
            }
        }
    }
}

/// Byte offset of the `n`-th character of `s`, or `s.len()` when the string
/// is shorter. Keeps every slice on a char boundary.
fn byte_offset_of_char(s: &str, n: usize) -> usize {
    s.char_indices()
        .nth(n)
        .map(|(offset, _)| offset)
        .unwrap_or(s.len())
}
