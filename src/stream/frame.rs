//! Incremental frame extraction from an event-stream byte feed.
//!
//! The service writes newline-delimited, prefix-tagged text frames. Chunks
//! arrive at arbitrary byte boundaries, so the parser buffers a trailing
//! partial line between pushes. Feeding the same bytes in any split yields
//! the same ordered frame sequence.

/// One classified line from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Payload following the `data: ` prefix, handed to the decoder.
    Data(String),
    /// `event: <tag>` announcement; carries no payload and is discarded.
    EventTag(String),
    /// `: keep-alive` comment; liveness signal only.
    KeepAlive,
    /// Any other non-empty line; discarded with a diagnostic.
    Unrecognized(String),
}

const DATA_PREFIX: &str = "data: ";
const EVENT_PREFIX: &str = "event: ";
const KEEP_ALIVE: &str = ": keep-alive";

/// Accumulates raw bytes and yields complete, classified lines.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: Vec<u8>,
}

impl FrameParser {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Append a chunk and drain every complete line from the buffer.
    ///
    /// Blank lines are dropped here; everything else is returned in input
    /// order, including unrecognized lines so the caller can log them.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(chunk);

        let Some(last_newline) = self.buffer.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };
        let complete: Vec<u8> = self.buffer.drain(..=last_newline).collect();

        complete
            .split(|&b| b == b'\n')
            .filter_map(|raw| classify_line(&String::from_utf8_lossy(raw)))
            .collect()
    }

    /// Bytes of the trailing partial line still waiting for a newline.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Classify one line; `None` means blank (ignored).
pub(crate) fn classify_line(line: &str) -> Option<Frame> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.is_empty() {
        return None;
    }
    if let Some(payload) = line.strip_prefix(DATA_PREFIX) {
        return Some(Frame::Data(payload.to_string()));
    }
    if let Some(tag) = line.strip_prefix(EVENT_PREFIX) {
        return Some(Frame::EventTag(tag.to_string()));
    }
    if line == KEEP_ALIVE {
        return Some(Frame::KeepAlive);
    }
    Some(Frame::Unrecognized(line.to_string()))
}
