// src/io/serial/mod.rs
//
// Serial port line source.
//
// Features:
// - Line framing with resync on LF and forced split of runaway lines
// - Bounded-timeout line reads for the publisher loop
// - Port enumeration

pub mod framer;
pub mod reader;
pub(crate) mod utils;

pub use framer::{FramedLine, LineFramer, DEFAULT_MAX_LINE_LENGTH};
pub use reader::{list_serial_ports, SerialConfig, SerialLineSource, SerialPortInfo, StreamLineSource};
pub use utils::Parity;
