// src/io/serial/reader.rs
//
// Serial port line source. Reads bytes from the port, frames them into lines
// and hands one line per call to the publisher loop.

use serde::Serialize;
use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use super::framer::{FramedLine, LineFramer, DEFAULT_MAX_LINE_LENGTH};
use super::utils::{self, Parity};
use crate::io::error::IoError;
use crate::io::source::LineSource;

// ============================================================================
// Types and Configuration
// ============================================================================

/// Per-read timeout on the port itself. Kept short so `read_line` can honour
/// its own deadline closely.
const PORT_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Serial port configuration
#[derive(Clone, Debug)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
    /// Lines longer than this are force-split and will fail to decode
    pub max_line_length: usize,
}

impl SerialConfig {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

/// Information about an available serial port
#[derive(Clone, Debug, Serialize)]
pub struct SerialPortInfo {
    pub port_name: String,
    pub port_type: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

// ============================================================================
// Stream Line Source
// ============================================================================

/// Line source over any byte stream with a short read timeout.
///
/// Complete lines are queued and returned one per call. Fragments (lines cut
/// at the maximum length, or still unterminated when the deadline passes) are
/// dropped along with the rest of their line, and the call returns an empty
/// string if nothing complete arrived in time.
pub struct StreamLineSource<P> {
    name: String,
    port: P,
    framer: LineFramer,
    pending: VecDeque<FramedLine>,
    buf: [u8; 256],
}

/// Line source over an open serial port
pub type SerialLineSource = StreamLineSource<Box<dyn serialport::SerialPort>>;

impl<P: Read + Send> StreamLineSource<P> {
    pub fn from_port(name: impl Into<String>, port: P, max_line_length: usize) -> Self {
        Self {
            name: name.into(),
            port,
            framer: LineFramer::new(max_line_length),
            pending: VecDeque::new(),
            buf: [0u8; 256],
        }
    }
}

impl<P> StreamLineSource<P> {
    fn drop_fragment(&self, line: &FramedLine) {
        tdebug!(
            "[serial] {}: dropped unterminated fragment ({} bytes)",
            self.name,
            line.bytes.len()
        );
    }
}

impl SerialLineSource {
    /// Open the serial port described by `config`
    pub fn open(config: &SerialConfig) -> Result<Self, IoError> {
        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(utils::to_serialport_data_bits(config.data_bits))
            .stop_bits(utils::to_serialport_stop_bits(config.stop_bits))
            .parity(utils::to_serialport_parity(config.parity))
            .timeout(PORT_READ_TIMEOUT)
            .open()
            .map_err(|e| IoError::configuration(format!("Failed to open {}: {}", config.port, e)))?;

        tlog!(
            "[serial] Opened {} at {} baud ({}-{}-{})",
            config.port,
            config.baud_rate,
            config.data_bits,
            config.parity.letter(),
            config.stop_bits
        );

        Ok(Self::from_port(
            format!("serial({})", config.port),
            port,
            config.max_line_length,
        ))
    }
}

/// Classify a port read error.
/// `None` means "no data yet"; otherwise the error to report.
fn classify_read_error(device: &str, e: &std::io::Error) -> Option<IoError> {
    match e.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted => None,
        ErrorKind::BrokenPipe
        | ErrorKind::NotConnected
        | ErrorKind::UnexpectedEof
        | ErrorKind::NotFound
        | ErrorKind::PermissionDenied => Some(IoError::transport_fault(device, e.to_string())),
        _ => Some(IoError::read(device, e.to_string())),
    }
}

impl<P: Read + Send> LineSource for StreamLineSource<P> {
    fn read_line(&mut self, timeout: Duration) -> Result<String, IoError> {
        let deadline = Instant::now() + timeout;

        loop {
            while let Some(line) = self.pending.pop_front() {
                if line.incomplete {
                    self.drop_fragment(&line);
                    continue;
                }
                return Ok(line.to_text());
            }

            if Instant::now() >= deadline {
                if let Some(line) = self.framer.flush() {
                    self.drop_fragment(&line);
                }
                return Ok(String::new());
            }

            match self.port.read(&mut self.buf) {
                Ok(0) => {
                    // EOF - port closed/disconnected
                    return Err(IoError::transport_fault(&self.name, "port disconnected"));
                }
                Ok(n) => {
                    let lines = self.framer.feed(&self.buf[..n]);
                    self.pending.extend(lines);
                }
                Err(ref e) => {
                    if let Some(err) = classify_read_error(&self.name, e) {
                        // Drop the partial line; it cannot be trusted after a fault
                        self.framer.flush();
                        return Err(err);
                    }
                }
            }
        }
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

// ============================================================================
// Port Enumeration
// ============================================================================

/// List available serial ports
///
/// On macOS, filters out /dev/tty.* devices and only shows /dev/cu.* devices.
/// The tty devices block on open waiting for carrier detect.
pub fn list_serial_ports() -> Result<Vec<SerialPortInfo>, IoError> {
    let ports = serialport::available_ports()
        .map_err(|e| IoError::configuration(format!("Failed to enumerate ports: {}", e)))?;

    Ok(ports
        .into_iter()
        .filter(|_p| {
            #[cfg(target_os = "macos")]
            {
                !_p.port_name.starts_with("/dev/tty.")
            }
            #[cfg(not(target_os = "macos"))]
            {
                true
            }
        })
        .map(|p| {
            let (port_type, manufacturer, product, serial_number, vid, pid) = match p.port_type {
                serialport::SerialPortType::UsbPort(info) => (
                    "USB".to_string(),
                    info.manufacturer,
                    info.product,
                    info.serial_number,
                    Some(info.vid),
                    Some(info.pid),
                ),
                serialport::SerialPortType::BluetoothPort => {
                    ("Bluetooth".to_string(), None, None, None, None, None)
                }
                serialport::SerialPortType::PciPort => {
                    ("PCI".to_string(), None, None, None, None, None)
                }
                serialport::SerialPortType::Unknown => {
                    ("Unknown".to_string(), None, None, None, None, None)
                }
            };
            SerialPortInfo {
                port_name: p.port_name,
                port_type,
                manufacturer,
                product,
                serial_number,
                vid,
                pid,
            }
        })
        .collect())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Port stand-in that replays scripted reads, then times out forever
    struct ScriptedPort {
        steps: VecDeque<std::io::Result<Vec<u8>>>,
    }

    impl ScriptedPort {
        fn new(steps: Vec<std::io::Result<Vec<u8>>>) -> Self {
            Self {
                steps: steps.into(),
            }
        }
    }

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.steps.pop_front() {
                Some(Ok(bytes)) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None => {
                    std::thread::sleep(Duration::from_millis(1));
                    Err(std::io::Error::new(ErrorKind::TimedOut, "timed out"))
                }
            }
        }
    }

    fn timeout() -> std::io::Result<Vec<u8>> {
        Err(std::io::Error::new(ErrorKind::TimedOut, "timed out"))
    }

    fn source(steps: Vec<std::io::Result<Vec<u8>>>) -> StreamLineSource<ScriptedPort> {
        StreamLineSource::from_port("serial(test)", ScriptedPort::new(steps), DEFAULT_MAX_LINE_LENGTH)
    }

    const TIMEOUT: Duration = Duration::from_millis(30);

    #[test]
    fn test_reads_lines_across_chunks() {
        let mut src = source(vec![
            Ok(b"512,5".to_vec()),
            timeout(),
            Ok(b"12,1,0\r\n10,20,1,5\r\n".to_vec()),
        ]);
        assert_eq!(src.read_line(TIMEOUT).unwrap(), "512,512,1,0");
        assert_eq!(src.read_line(TIMEOUT).unwrap(), "10,20,1,5");
    }

    #[test]
    fn test_timeout_with_no_data_is_empty() {
        let mut src = source(vec![]);
        assert_eq!(src.read_line(TIMEOUT).unwrap(), "");
    }

    #[test]
    fn test_timeout_drops_partial_line_and_its_remainder() {
        let mut src = source(vec![Ok(b"512,51".to_vec())]);
        assert_eq!(src.read_line(TIMEOUT).unwrap(), "");

        // The late remainder would decode as "2,1,0"-style garbage; skip it
        src.port.steps.push_back(Ok(b"2,1,0\r\n3,4,0,9\n".to_vec()));
        assert_eq!(src.read_line(TIMEOUT).unwrap(), "3,4,0,9");
    }

    #[test]
    fn test_runaway_line_does_not_produce_a_record() {
        let mut stream = vec![b'x'; DEFAULT_MAX_LINE_LENGTH - 2];
        stream.extend_from_slice(b"512,512,1,0\r\n");
        let mut src = StreamLineSource::from_port(
            "serial(test)",
            std::io::Cursor::new(stream),
            DEFAULT_MAX_LINE_LENGTH,
        );

        // Every byte is consumed in one read; the next read hits EOF
        let err = src.read_line(TIMEOUT).unwrap_err();
        assert!(matches!(err, IoError::TransportFault { .. }));

        let mut stream = vec![b'x'; DEFAULT_MAX_LINE_LENGTH - 2];
        stream.extend_from_slice(b"512,512,1,0\r\n10,20,1,5\r\n");
        let mut src = source(vec![Ok(stream)]);
        let line = src.read_line(TIMEOUT).unwrap();
        assert_eq!(line, "10,20,1,5");
        assert_eq!(
            crate::io::decode_packet(&line).unwrap(),
            crate::io::Record::new(10, 20, 1, 5)
        );
    }

    #[test]
    fn test_eof_is_transport_fault() {
        let mut src = source(vec![Ok(Vec::new())]);
        let err = src.read_line(TIMEOUT).unwrap_err();
        assert!(matches!(err, IoError::TransportFault { .. }));
    }

    #[test]
    fn test_broken_pipe_is_transport_fault() {
        let mut src = source(vec![Err(std::io::Error::new(ErrorKind::BrokenPipe, "unplugged"))]);
        let err = src.read_line(TIMEOUT).unwrap_err();
        assert!(err.is_permanent());
        assert!(err.to_string().contains("serial(test)"));
    }

    #[test]
    fn test_other_errors_are_transient() {
        let mut src = source(vec![
            Err(std::io::Error::new(ErrorKind::InvalidData, "framing error")),
            Ok(b"1,2,1,0\n".to_vec()),
        ]);
        let err = src.read_line(TIMEOUT).unwrap_err();
        assert!(matches!(err, IoError::Read { .. }));
        assert_eq!(src.read_line(TIMEOUT).unwrap(), "1,2,1,0");
    }

    #[test]
    fn test_classify_read_error() {
        let timed_out = std::io::Error::new(ErrorKind::TimedOut, "t");
        assert!(classify_read_error("dev", &timed_out).is_none());
        let would_block = std::io::Error::new(ErrorKind::WouldBlock, "w");
        assert!(classify_read_error("dev", &would_block).is_none());
        let gone = std::io::Error::new(ErrorKind::NotFound, "gone");
        assert!(classify_read_error("dev", &gone).unwrap().is_permanent());
    }

    #[test]
    fn test_serial_config_defaults() {
        let config = SerialConfig::new("/dev/ttyUSB0", 14400);
        assert_eq!(config.data_bits, 8);
        assert_eq!(config.stop_bits, 1);
        assert_eq!(config.parity, Parity::None);
        assert_eq!(config.max_line_length, DEFAULT_MAX_LINE_LENGTH);
    }
}
