//! Streamed answer generation.
//!
//! Drives a provider chat stream and turns it into the engine's event
//! sequence: chunk events in arrival order, then exactly one terminal
//! metadata or error event. The model is instructed to end its reply with a
//! `FOLLOWUP:` line; that trailer is kept out of the chunk stream and parsed
//! into the metadata event instead.

use super::prompt::FOLLOWUP_MARKER;
use super::{EventSender, StreamEvent};
use crate::provider::{ChatRequest, Provider, ProviderError};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Errors that can occur during answer generation.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Streams completions and extracts the follow-up trailer.
pub struct GenerationEngine {
    provider: Arc<dyn Provider>,
}

impl GenerationEngine {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    /// Runs one streamed completion.
    ///
    /// Emits `Chunk` events as text arrives, then one terminal event:
    /// `Metadata` on success (carrying the final answer, the given sources
    /// and any parsed follow-ups) or `Error` on provider failure. Chunks
    /// already emitted before a failure are not retracted.
    ///
    /// When `cancel` fires the provider future is dropped, which closes the
    /// underlying connection, and no further events are sent.
    pub async fn generate_stream(
        &self,
        request: ChatRequest,
        sources: Vec<String>,
        cancel: CancellationToken,
        events: &EventSender,
    ) {
        let mut answer = AnswerStream::new();

        let result = {
            let answer = &mut answer;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = self.provider.chat(
                    request,
                    Box::new(|fragment| {
                        if let Some(piece) = answer.push(fragment) {
                            let _ = events.send(StreamEvent::chunk(piece));
                        }
                    }),
                ) => Some(result),
            }
        };

        match result {
            None => {
                debug!("Generation cancelled, stream dropped");
            }
            Some(Err(e)) => {
                let e = GenerationError::Provider(e);
                let _ = events.send(StreamEvent::error(e.to_string()));
            }
            Some(Ok(())) => {
                let (text, followups, tail) = answer.finish();
                if let Some(piece) = tail {
                    let _ = events.send(StreamEvent::chunk(piece));
                }
                let _ = events.send(StreamEvent::metadata(text, sources, followups));
            }
        }
    }
}

/// Incremental view of a streaming completion.
///
/// Forwards arriving text while withholding anything the final answer will
/// not contain: leading whitespace, a trailing run of whitespace, and any
/// suffix that could still grow into the `FOLLOWUP:` marker. The forwarded
/// pieces therefore concatenate to exactly the final answer text.
struct AnswerStream {
    full: String,
    /// Byte offset into `full`: everything before is forwarded or skipped.
    emitted: usize,
    lead_done: bool,
    marker_at: Option<usize>,
}

impl AnswerStream {
    fn new() -> Self {
        Self {
            full: String::new(),
            emitted: 0,
            lead_done: false,
            marker_at: None,
        }
    }

    /// Accepts one fragment, returning the text now safe to forward.
    fn push(&mut self, fragment: &str) -> Option<String> {
        self.full.push_str(fragment);

        if self.marker_at.is_some() {
            // Trailer territory: accumulate for parsing, forward nothing.
            return None;
        }

        if let Some(idx) = self.full.find(FOLLOWUP_MARKER) {
            self.marker_at = Some(idx);
            let end = trimmed_end(&self.full[..idx]);
            return self.take_until(end);
        }

        let held = marker_prefix_len(&self.full);
        let end = trimmed_end(&self.full[..self.full.len() - held]);
        self.take_until(end)
    }

    /// Final answer, parsed follow-ups, and any last unforwarded piece.
    fn finish(mut self) -> (String, Vec<String>, Option<String>) {
        match self.marker_at {
            Some(idx) => {
                let answer = self.full[..idx].trim().to_string();
                let followups = parse_followups(&self.full[idx + FOLLOWUP_MARKER.len()..]);
                (answer, followups, None)
            }
            None => {
                let end = trimmed_end(&self.full);
                let tail = self.take_until(end);
                let answer = self.full.trim().to_string();
                (answer, Vec::new(), tail)
            }
        }
    }

    fn take_until(&mut self, end: usize) -> Option<String> {
        if !self.lead_done {
            while self.emitted < end {
                let ch = self.full[self.emitted..].chars().next()?;
                if !ch.is_whitespace() {
                    self.lead_done = true;
                    break;
                }
                self.emitted += ch.len_utf8();
            }
            if !self.lead_done {
                return None;
            }
        }

        if end > self.emitted {
            let piece = self.full[self.emitted..end].to_string();
            self.emitted = end;
            Some(piece)
        } else {
            None
        }
    }
}

/// Byte length of `s` without trailing whitespace.
fn trimmed_end(s: &str) -> usize {
    s.trim_end().len()
}

/// Length of the longest suffix of `s` that is a proper prefix of the
/// follow-up marker. That suffix may still complete into the marker, so it
/// cannot be forwarded yet.
fn marker_prefix_len(s: &str) -> usize {
    let marker = FOLLOWUP_MARKER.as_bytes();
    let bytes = s.as_bytes();
    let max = (marker.len() - 1).min(bytes.len());
    for len in (1..=max).rev() {
        if bytes[bytes.len() - len..] == marker[..len] {
            return len;
        }
    }
    0
}

/// Parses the trailer after the marker: pipe-separated questions on the
/// first non-empty line, tolerating the bracketed/quoted list format some
/// models produce.
fn parse_followups(trailer: &str) -> Vec<String> {
    let line = trailer
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");

    let line = line
        .strip_prefix('[')
        .and_then(|l| l.strip_suffix(']'))
        .unwrap_or(line);

    line.split('|')
        .map(|q| q.trim().trim_matches('"').trim())
        .filter(|q| !q.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(fragments: &[&str]) -> (Vec<String>, String, Vec<String>) {
        let mut stream = AnswerStream::new();
        let mut pieces = Vec::new();
        for f in fragments {
            if let Some(p) = stream.push(f) {
                pieces.push(p);
            }
        }
        let (answer, followups, tail) = stream.finish();
        if let Some(t) = tail {
            pieces.push(t);
        }
        (pieces, answer, followups)
    }

    #[test]
    fn test_plain_stream_forwards_everything() {
        let (pieces, answer, followups) = run(&["Hel", "lo", " world"]);
        assert_eq!(pieces.concat(), "Hello world");
        assert_eq!(answer, "Hello world");
        assert!(followups.is_empty());
    }

    #[test]
    fn test_marker_trailer_not_forwarded() {
        let (pieces, answer, followups) =
            run(&["Hel", "lo", "\n\nFOLLOWUP: What next?|And then?"]);
        assert_eq!(pieces.concat(), "Hello");
        assert_eq!(answer, "Hello");
        assert_eq!(followups, vec!["What next?", "And then?"]);
    }

    #[test]
    fn test_marker_split_across_fragments() {
        let (pieces, answer, followups) = run(&["Answer text ", "FOLL", "OWUP:", " A?|B?"]);
        assert_eq!(pieces.concat(), "Answer text");
        assert_eq!(answer, "Answer text");
        assert_eq!(followups, vec!["A?", "B?"]);
    }

    #[test]
    fn test_false_marker_prefix_is_released() {
        let (pieces, answer, _) = run(&["The FOLL", "Y of war"]);
        assert_eq!(pieces.concat(), "The FOLLY of war");
        assert_eq!(answer, "The FOLLY of war");
    }

    #[test]
    fn test_surrounding_whitespace_trimmed() {
        let (pieces, answer, _) = run(&["  \n", "Hello", " there", "  \n "]);
        assert_eq!(pieces.concat(), "Hello there");
        assert_eq!(answer, "Hello there");
    }

    #[test]
    fn test_chunks_concatenate_to_answer_char_by_char() {
        let text = "A short answer. \n\nFOLLOWUP: One?|Two?|Three?";
        let fragments: Vec<String> = text.chars().map(String::from).collect();
        let refs: Vec<&str> = fragments.iter().map(String::as_str).collect();
        let (pieces, answer, followups) = run(&refs);
        assert_eq!(pieces.concat(), answer);
        assert_eq!(answer, "A short answer.");
        assert_eq!(followups, vec!["One?", "Two?", "Three?"]);
    }

    #[test]
    fn test_marker_only_stream_yields_empty_answer() {
        let (pieces, answer, followups) = run(&["FOLLOWUP: Q?"]);
        assert!(pieces.is_empty());
        assert_eq!(answer, "");
        assert_eq!(followups, vec!["Q?"]);
    }

    #[test]
    fn test_parse_followups_pipe_format() {
        assert_eq!(
            parse_followups(" What next?|And then? "),
            vec!["What next?", "And then?"]
        );
    }

    #[test]
    fn test_parse_followups_bracketed_quoted() {
        assert_eq!(
            parse_followups(r#" ["First?"|"Second?"] "#),
            vec!["First?", "Second?"]
        );
    }

    #[test]
    fn test_parse_followups_drops_empties() {
        assert_eq!(parse_followups("A?||  |B?"), vec!["A?", "B?"]);
        assert!(parse_followups("   ").is_empty());
    }

    #[test]
    fn test_parse_followups_first_line_only() {
        assert_eq!(
            parse_followups(" A?|B?\nstray trailing prose"),
            vec!["A?", "B?"]
        );
    }
}
