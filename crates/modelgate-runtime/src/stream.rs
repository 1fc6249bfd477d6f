//! Incremental assembly of streamed generation responses
//!
//! The raw body is split on a configurable delimiter, each line is decoded
//! as an SSE-style `data:` payload, and choices are turned into
//! [`LlmResultChunk`]s. A non-JSON line ends the stream.

use std::collections::VecDeque;
use std::pin::Pin;

use futures_util::{Stream, StreamExt, stream};
use serde_json::Value;

use crate::convert::response::{extract_tool_calls, parse_usage};
use crate::error::LlmError;
use crate::tokenizer::TokenEstimator;
use crate::types::{AssistantMessage, LlmResultChunk, LlmResultStream, Usage};

/// Finish reason of the synthetic chunk emitted on a non-JSON line
pub const NON_JSON_FINISH_REASON: &str = "Non-JSON encountered.";

/// Delimiter used when none is configured
pub const DEFAULT_DELIMITER: &str = "\n\n";

/// Result of feeding one line to the assembler
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// Nothing to emit
    Skip,
    /// Intermediate chunk
    Chunk(LlmResultChunk),
    /// Final chunk; no further lines are read
    Finished(LlmResultChunk),
}

/// Per-invocation stream state
pub struct StreamAssembler {
    model: String,
    prompt_text: String,
    estimator: TokenEstimator<'static>,
    full_text: String,
    next_index: u32,
    done: bool,
}

impl StreamAssembler {
    /// `prompt_text` is the text usage is estimated against when the
    /// provider does not report it
    pub fn new(model: impl Into<String>, prompt_text: impl Into<String>, estimator: TokenEstimator<'static>) -> Self {
        Self {
            model: model.into(),
            prompt_text: prompt_text.into(),
            estimator,
            full_text: String::new(),
            next_index: 0,
            done: false,
        }
    }

    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Text accumulated so far
    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    pub fn accept_line(&mut self, line: &str) -> LineOutcome {
        if self.done {
            return LineOutcome::Skip;
        }

        let line = line.trim();
        if line.is_empty() || line.starts_with(':') {
            return LineOutcome::Skip;
        }
        let payload = line.strip_prefix("data:").map_or(line, str::trim_start);

        let Ok(json) = serde_json::from_str::<Value>(payload) else {
            tracing::debug!(model = %self.model, "stream ended on non-JSON line");
            return self.finish(AssistantMessage::default(), NON_JSON_FINISH_REASON.to_owned(), None);
        };

        let Some(choice) = json
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
        else {
            return LineOutcome::Skip;
        };

        let finish_reason = choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .map(str::to_owned);

        let message = if let Some(delta) = choice.get("delta") {
            let content = delta.get("content").and_then(Value::as_str).unwrap_or_default();
            let raw_calls = delta
                .get("tool_calls")
                .filter(|calls| calls.as_array().is_some_and(|a| !a.is_empty()));
            if content.is_empty() && raw_calls.is_none() && finish_reason.is_none() {
                return LineOutcome::Skip;
            }
            AssistantMessage {
                content: content.to_owned(),
                tool_calls: extract_tool_calls(raw_calls),
            }
        } else if let Some(text) = choice.get("text") {
            let text = text.as_str().unwrap_or_default();
            if text.is_empty() && finish_reason.is_none() {
                return LineOutcome::Skip;
            }
            AssistantMessage::text(text)
        } else {
            return LineOutcome::Skip;
        };

        self.full_text.push_str(&message.content);

        match finish_reason {
            Some(reason) => self.finish(message, reason, parse_usage(json.get("usage"))),
            None => LineOutcome::Chunk(self.chunk(message, None, None)),
        }
    }

    fn finish(&mut self, message: AssistantMessage, reason: String, reported: Option<Usage>) -> LineOutcome {
        self.done = true;
        let usage = reported.unwrap_or_else(|| {
            Usage::from_counts(
                self.estimator.count(&self.prompt_text),
                self.estimator.count(&self.full_text),
            )
        });
        LineOutcome::Finished(self.chunk(message, Some(reason), Some(usage)))
    }

    fn chunk(&mut self, message: AssistantMessage, finish_reason: Option<String>, usage: Option<Usage>) -> LlmResultChunk {
        let index = self.next_index;
        self.next_index += 1;
        LlmResultChunk {
            model: self.model.clone(),
            index,
            message,
            finish_reason,
            usage,
        }
    }
}

/// Byte-level splitter yielding delimiter-separated lines
#[derive(Debug)]
pub struct LineSplitter {
    delimiter: Vec<u8>,
    buffer: Vec<u8>,
}

impl LineSplitter {
    pub fn new(delimiter: &str) -> Self {
        let delimiter = if delimiter.is_empty() { DEFAULT_DELIMITER } else { delimiter };
        Self {
            delimiter: delimiter.as_bytes().to_vec(),
            buffer: Vec::new(),
        }
    }

    /// Append bytes and return every completed line
    ///
    /// Only the new bytes, plus a delimiter-sized overlap with the old tail,
    /// are searched.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut from = self.buffer.len().saturating_sub(self.delimiter.len() - 1);
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(offset) = self.find_delimiter(from) {
            let pos = from + offset;
            let line: Vec<u8> = self.buffer.drain(..pos + self.delimiter.len()).take(pos).collect();
            lines.push(String::from_utf8_lossy(&line).into_owned());
            from = 0;
        }
        lines
    }

    fn find_delimiter(&self, from: usize) -> Option<usize> {
        self.buffer
            .get(from..)?
            .windows(self.delimiter.len())
            .position(|window| window == self.delimiter.as_slice())
    }

    /// Trailing bytes not followed by a delimiter
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Decode a delimiter written with backslash escapes (`\n`, `\r\n`, `\x1e`, ...)
///
/// Unknown escapes are kept verbatim. An empty result falls back to
/// [`DEFAULT_DELIMITER`].
pub fn decode_delimiter(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('x') => push_hex_escape(&mut out, &mut chars, 2, 'x'),
            Some('u') => push_hex_escape(&mut out, &mut chars, 4, 'u'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    if out.is_empty() { DEFAULT_DELIMITER.to_owned() } else { out }
}

fn push_hex_escape(out: &mut String, chars: &mut std::iter::Peekable<std::str::Chars<'_>>, width: usize, tag: char) {
    let mut digits = String::with_capacity(width);
    while digits.len() < width {
        match chars.peek() {
            Some(c) if c.is_ascii_hexdigit() => {
                digits.push(*c);
                chars.next();
            }
            _ => break,
        }
    }

    match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
        Some(decoded) if digits.len() == width => out.push(decoded),
        _ => {
            out.push('\\');
            out.push(tag);
            out.push_str(&digits);
        }
    }
}

struct AssembleState<S, F> {
    body: Option<Pin<Box<S>>>,
    splitter: LineSplitter,
    assembler: StreamAssembler,
    pending: VecDeque<String>,
    on_error: F,
}

/// Drive an assembler over a streaming byte body
///
/// The body is read only as the consumer polls. It is dropped, closing the
/// connection, as soon as a final chunk is produced, a read fails, or the
/// returned stream itself is dropped.
pub fn assemble_stream<S, B, E, F>(body: S, delimiter: &str, assembler: StreamAssembler, on_error: F) -> LlmResultStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Send + 'static,
    F: Fn(E) -> LlmError + Send + 'static,
{
    let state = AssembleState {
        body: Some(Box::pin(body)),
        splitter: LineSplitter::new(delimiter),
        assembler,
        pending: VecDeque::new(),
        on_error,
    };

    let chunks = stream::unfold(state, |mut state| async move {
        loop {
            while let Some(line) = state.pending.pop_front() {
                match state.assembler.accept_line(&line) {
                    LineOutcome::Skip => {}
                    LineOutcome::Chunk(chunk) => return Some((Ok(chunk), state)),
                    LineOutcome::Finished(chunk) => {
                        state.body = None;
                        state.pending.clear();
                        return Some((Ok(chunk), state));
                    }
                }
            }

            let next = match state.body.as_mut() {
                Some(body) => body.next().await,
                None => return None,
            };
            match next {
                Some(Ok(bytes)) => {
                    let lines = state.splitter.push(bytes.as_ref());
                    state.pending.extend(lines);
                }
                Some(Err(e)) => {
                    state.body = None;
                    let error = (state.on_error)(e);
                    tracing::error!(error = %error, "stream read failed");
                    return Some((Err(error), state));
                }
                None => {
                    state.body = None;
                    state.pending.extend(state.splitter.finish());
                    if state.pending.is_empty() {
                        return None;
                    }
                }
            }
        }
    });

    Box::pin(chunks)
}
