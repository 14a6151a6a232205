// src/io/serial/framer.rs
//
// Delimiter-based line framing for the serial byte stream.
// Splits on LF and drops a trailing CR. A runaway line is cut at the maximum
// length and the rest of it is discarded up to the next LF, so the tail of a
// broken frame is never handed out as a line of its own.

/// Line terminator
const LF: u8 = 0x0A;
const CR: u8 = 0x0D;

/// Default max line length before a forced split. A valid packet is at most
/// four signed 64-bit integers and three separators.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 96;

/// A line extracted from the serial stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedLine {
    /// Line bytes without terminators
    pub bytes: Vec<u8>,
    /// True when the line came from `flush()` or a forced split, i.e. no
    /// terminator was seen. Such a line is a fragment, not a packet.
    pub incomplete: bool,
}

impl FramedLine {
    /// Line as text. Invalid UTF-8 (line noise) is replaced rather than
    /// rejected; the decoder rejects the line later.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Stateful line framer for streaming data
pub struct LineFramer {
    buffer: Vec<u8>,
    max_length: usize,
    /// Dropping bytes until the next LF after a cut-off line
    discarding: bool,
}

impl LineFramer {
    pub fn new(max_length: usize) -> Self {
        LineFramer {
            buffer: Vec::with_capacity(max_length.min(256)),
            max_length: max_length.max(1),
            discarding: false,
        }
    }

    /// Feed raw bytes into the framer.
    /// Returns any complete lines that were parsed.
    pub fn feed(&mut self, data: &[u8]) -> Vec<FramedLine> {
        let mut lines = Vec::new();

        for &byte in data {
            if self.discarding {
                if byte == LF {
                    self.discarding = false;
                }
                continue;
            }

            if byte == LF {
                let mut line: Vec<u8> = self.buffer.drain(..).collect();
                if line.last() == Some(&CR) {
                    line.pop();
                }
                if !line.is_empty() {
                    lines.push(FramedLine {
                        bytes: line,
                        incomplete: false,
                    });
                }
                continue;
            }

            self.buffer.push(byte);

            // Cut on max length, then resync on the next LF
            if self.buffer.len() >= self.max_length {
                lines.push(FramedLine {
                    bytes: self.buffer.drain(..).collect(),
                    incomplete: true,
                });
                self.discarding = true;
            }
        }

        lines
    }

    /// Flush any remaining buffered bytes as an incomplete line.
    /// The rest of that line is discarded when it arrives.
    pub fn flush(&mut self) -> Option<FramedLine> {
        if self.buffer.is_empty() {
            return None;
        }
        self.discarding = true;
        let mut line: Vec<u8> = self.buffer.drain(..).collect();
        if line.last() == Some(&CR) {
            line.pop();
        }
        Some(FramedLine {
            bytes: line,
            incomplete: true,
        })
    }

    /// Number of bytes waiting for a terminator
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        LineFramer::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

// =============================================================================
// Tests
// =============================================================================
