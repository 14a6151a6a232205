// src/io/source.rs
//
// Line source abstraction consumed by the publisher loop, plus the
// non-serial implementations (capture replay and in-process channel).

use std::io::BufRead;
use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use super::error::IoError;

/// A blocking, line-oriented byte stream.
///
/// `read_line` returns one line with trailing terminators removed, or an empty
/// (or short) string if no complete line arrived within `timeout`. A timeout
/// is not an error. Recoverable faults are `IoError::Read`; anything else
/// means the source is finished.
pub trait LineSource: Send {
    fn read_line(&mut self, timeout: Duration) -> Result<String, IoError>;

    /// Short identifier used in log messages
    fn describe(&self) -> String;
}

/// Strip trailing `\n` / `\r\n` (and any stray `\r`) from a line
pub fn strip_terminators(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

// ============================================================================
// Replay Source
// ============================================================================

/// Replays lines from a capture file (or any `BufRead`).
///
/// End of input is reported as a transport fault so the publisher stops
/// cleanly once the capture is exhausted. The timeout is ignored; reads from
/// a file never block for long.
pub struct ReplaySource<R> {
    name: String,
    reader: R,
    buf: String,
}

impl<R: BufRead + Send> ReplaySource<R> {
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            reader,
            buf: String::with_capacity(64),
        }
    }
}

impl ReplaySource<std::io::BufReader<std::fs::File>> {
    /// Open a capture file for replay
    pub fn open(path: &std::path::Path) -> Result<Self, IoError> {
        let file = std::fs::File::open(path).map_err(|e| {
            IoError::configuration(format!("Failed to open replay file {}: {}", path.display(), e))
        })?;
        Ok(Self::new(
            format!("replay({})", path.display()),
            std::io::BufReader::new(file),
        ))
    }
}

impl ReplaySource<std::io::BufReader<std::io::Stdin>> {
    /// Replay lines piped to standard input
    pub fn stdin() -> Self {
        Self::new("replay(stdin)", std::io::BufReader::new(std::io::stdin()))
    }
}

impl<R: BufRead + Send> LineSource for ReplaySource<R> {
    fn read_line(&mut self, _timeout: Duration) -> Result<String, IoError> {
        self.buf.clear();
        match self.reader.read_line(&mut self.buf) {
            Ok(0) => Err(IoError::transport_fault(&self.name, "end of replay")),
            Ok(_) => Ok(strip_terminators(&self.buf).to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                // Non-UTF-8 noise: drop the line, keep going
                Err(IoError::read(&self.name, e.to_string()))
            }
            Err(e) => Err(IoError::transport_fault(&self.name, e.to_string())),
        }
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

// ============================================================================
// Channel Source
// ============================================================================

/// Sender half for a `ChannelSource`
pub type LineSender = std_mpsc::Sender<String>;

/// Line source fed from another thread through a channel.
///
/// Each sent string is one line. A timeout yields an empty line; dropping
/// every sender is reported as a transport fault.
pub struct ChannelSource {
    name: String,
    rx: std_mpsc::Receiver<String>,
}

impl ChannelSource {
    pub fn new(name: impl Into<String>) -> (LineSender, Self) {
        let (tx, rx) = std_mpsc::channel();
        (
            tx,
            Self {
                name: name.into(),
                rx,
            },
        )
    }
}

impl LineSource for ChannelSource {
    fn read_line(&mut self, timeout: Duration) -> Result<String, IoError> {
        match self.rx.recv_timeout(timeout) {
            Ok(line) => Ok(strip_terminators(&line).to_string()),
            Err(std_mpsc::RecvTimeoutError::Timeout) => Ok(String::new()),
            Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                Err(IoError::transport_fault(&self.name, "sender disconnected"))
            }
        }
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

// ============================================================================
// Tests
// ============================================================================
