// src/io/error.rs
//
// Error types for packet decoding, line sources and the publisher lifecycle.

/// Why a line was rejected by the packet decoder
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    /// No usable field separator (missing, or the first field is empty)
    #[error("malformed frame: {0}")]
    MalformedFrame(&'static str),

    /// Wrong field count or a field that is not an integer
    #[error("parse failure: {0}")]
    ParseFailure(String),
}

/// Errors from line sources and the publisher lifecycle
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IoError {
    /// `start()` was called before a line source was attached
    #[error("publisher has no line source attached")]
    NotConfigured,

    /// Lifecycle call made from a state that does not allow it
    #[error("cannot {action} while publisher is {state}")]
    InvalidState { action: &'static str, state: String },

    /// Recoverable read failure; the caller may retry
    #[error("{device}: read error: {message}")]
    Read { device: String, message: String },

    /// The transport is gone (disconnect, end of stream); retrying will not help
    #[error("{device}: transport fault: {message}")]
    TransportFault { device: String, message: String },

    /// Bad settings or a device that could not be opened
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl IoError {
    pub fn read(device: impl Into<String>, message: impl Into<String>) -> Self {
        IoError::Read {
            device: device.into(),
            message: message.into(),
        }
    }

    pub fn transport_fault(device: impl Into<String>, message: impl Into<String>) -> Self {
        IoError::TransportFault {
            device: device.into(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        IoError::Configuration(message.into())
    }

    pub fn invalid_state(action: &'static str, state: impl std::fmt::Display) -> Self {
        IoError::InvalidState {
            action,
            state: state.to_string(),
        }
    }

    /// Whether the read loop must give up after this error
    pub fn is_permanent(&self) -> bool {
        !matches!(self, IoError::Read { .. })
    }
}
