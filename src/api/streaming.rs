//! Incremental decoder for the tutorial stream.
//!
//! Network reads do not line up with record boundaries, so bytes are buffered
//! until a complete JSON value can be parsed. Three framings are accepted:
//!   - newline-delimited JSON: `{...}\n{...}\n`
//!   - SSE events:             `data: {...}\n\n` (multi-line `data:` joined with `\n`)
//!   - bare concatenation:     `{...}{...}`
//!
//! A line that starts with `{` or `[` is bare JSON and is parsed as it
//! arrives, without waiting for its newline. Anything that does not parse
//! is skipped up to the next `{`, so one broken unit never holds back the
//! units after it. Records that parse but match neither chunk shape are
//! dropped.

use super::types::TutorialChunk;
use serde_json::Value;

/// Stateful decoder. Feed it reads with `push`, then call `finish` once the
/// transport has closed to flush a trailing unit that had no newline.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    buffer: Vec<u8>,
    /// `data:` payload of the SSE event being received, lines joined by `\n`.
    event: Vec<u8>,
    /// The current line is bare JSON and its head has already been scanned.
    bare: bool,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes received but not yet turned into chunks.
    pub fn pending_len(&self) -> usize {
        self.buffer.len() + self.event.len()
    }

    /// Append a network read and return every chunk it completed.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<TutorialChunk> {
        self.buffer.extend_from_slice(bytes);

        let mut values = Vec::new();

        // Complete lines first.
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.end_line(&line, &mut values);
        }

        // The unterminated tail of a bare JSON line may already hold whole
        // objects. Take those; keep the rest for the next read.
        if !self.bare {
            let head = self.buffer.iter().copied().find(|b| !b.is_ascii_whitespace());
            if matches!(head, Some(b'{' | b'[')) {
                self.flush_event(&mut values);
                self.bare = true;
            }
        }
        if self.bare {
            let scan = scan_units(&self.buffer, false);
            values.extend(scan.values);
            self.buffer.drain(..scan.consumed);
        }

        to_chunks(values)
    }

    /// Flush whatever is left once the transport has closed cleanly.
    pub fn finish(&mut self) -> Vec<TutorialChunk> {
        let rest = std::mem::take(&mut self.buffer);
        let mut values = Vec::new();
        self.end_line(&rest, &mut values);
        self.flush_event(&mut values);
        to_chunks(values)
    }

    fn end_line(&mut self, line: &[u8], out: &mut Vec<Value>) {
        if std::mem::take(&mut self.bare) {
            out.extend(scan_units(line, true).values);
            return;
        }
        match classify_line(trim_ascii(line)) {
            Line::Blank => self.flush_event(out),
            Line::Ignored => {}
            Line::Data(payload) => {
                if !self.event.is_empty() {
                    self.event.push(b'\n');
                }
                self.event.extend_from_slice(payload);
                // Emit what is already complete instead of waiting for the
                // blank line; servers do not always send one.
                let scan = scan_units(&self.event, false);
                out.extend(scan.values);
                self.event.drain(..scan.consumed);
            }
            Line::Json(payload) => {
                self.flush_event(out);
                out.extend(scan_units(payload, true).values);
            }
        }
    }

    /// End of an SSE event: parse what its `data:` lines left behind.
    fn flush_event(&mut self, out: &mut Vec<Value>) {
        if self.event.is_empty() {
            return;
        }
        let event = std::mem::take(&mut self.event);
        out.extend(scan_units(&event, true).values);
    }
}

/// Decode a whole payload in one go.
pub fn decode_all(payload: &[u8]) -> Vec<TutorialChunk> {
    let mut decoder = ChunkDecoder::new();
    let mut chunks = decoder.push(payload);
    chunks.extend(decoder.finish());
    chunks
}

fn to_chunks(values: Vec<Value>) -> Vec<TutorialChunk> {
    values
        .iter()
        .filter_map(|value| {
            let chunk = TutorialChunk::from_record(value);
            if chunk.is_none() {
                log::debug!("[STREAM] Dropping unrecognized unit: {}", super::preview(&value.to_string()));
            }
            chunk
        })
        .collect()
}

enum Line<'a> {
    /// SSE event boundary.
    Blank,
    /// Comments, `event:`/`id:`/`retry:` fields, `[DONE]`.
    Ignored,
    Data(&'a [u8]),
    Json(&'a [u8]),
}

fn classify_line(line: &[u8]) -> Line<'_> {
    const IGNORED_FIELDS: [&[u8]; 3] = [b"event:", b"id:", b"retry:"];

    if line.is_empty() {
        return Line::Blank;
    }
    if line.starts_with(b":") || IGNORED_FIELDS.iter().any(|field| line.starts_with(field)) {
        return Line::Ignored;
    }
    match line.strip_prefix(b"data:") {
        Some(rest) => {
            let payload = trim_ascii(rest);
            if payload.is_empty() || payload == b"[DONE]" {
                Line::Ignored
            } else {
                Line::Data(payload)
            }
        }
        None => Line::Json(line),
    }
}

struct Scan {
    values: Vec<Value>,
    /// Bytes settled: parsed into `values` or skipped.
    consumed: usize,
}

/// Pull every complete JSON value off `bytes`, skipping what cannot parse.
///
/// With `complete` unset, an unfinished value (or a broken one whose end
/// cannot be located yet) stops the scan so later bytes can finish it. With
/// `complete` set no more bytes will follow and the remainder is dropped.
fn scan_units(bytes: &[u8], complete: bool) -> Scan {
    let mut values = Vec::new();
    let mut pos = 0;
    loop {
        pos += bytes[pos..]
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
        if pos == bytes.len() {
            break;
        }

        let rest = &bytes[pos..];
        let skip = if matches!(rest[0], b'{' | b'[') {
            let mut iter = serde_json::Deserializer::from_slice(rest).into_iter::<Value>();
            match iter.next() {
                Some(Ok(value)) => {
                    values.push(value);
                    pos += iter.byte_offset();
                    continue;
                }
                Some(Err(e)) if e.is_eof() => None,
                _ => next_unit_start(rest),
            }
        } else {
            rest.iter().position(|b| *b == b'{')
        };

        match skip {
            Some(len) => {
                log::debug!(
                    "[STREAM] Skipping malformed unit: {}",
                    super::preview(&String::from_utf8_lossy(&rest[..len]))
                );
                pos += len;
            }
            None if complete => {
                log::debug!(
                    "[STREAM] Dropping incomplete unit: {}",
                    super::preview(&String::from_utf8_lossy(rest))
                );
                pos = bytes.len();
                break;
            }
            None => break,
        }
    }
    Scan {
        values,
        consumed: pos,
    }
}

/// Offset of the first `{` after the opening bracket of `unit` that sits
/// outside a string literal.
fn next_unit_start(unit: &[u8]) -> Option<usize> {
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in unit.iter().enumerate().skip(1) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
        } else if b == b'"' {
            in_string = true;
        } else if b == b'{' {
            return Some(i);
        }
    }
    None
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |p| p + 1);
    &bytes[start..end]
}
