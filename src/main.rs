// src/main.rs
//
// stickbridge command-line entry point.
//
// Usage:
//   stickbridge --port /dev/ttyUSB0
//   stickbridge --replay capture.txt --bind 0.0.0.0:8080 --static-dir web
//   cat capture.txt | stickbridge --replay -
//   stickbridge --list-ports [--json]

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use stickbridge_lib::io::serial::{list_serial_ports, Parity};
use stickbridge_lib::io::IoError;
use stickbridge_lib::settings::{load_settings, AppSettings};
use stickbridge_lib::{logging, tlog};

#[derive(Parser, Debug)]
#[command(name = "stickbridge")]
#[command(about = "Serve the latest joystick packet from a serial port over HTTP", long_about = None)]
struct Args {
    /// Settings file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial port device path
    #[arg(short, long)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Serial parity: none, odd or even
    #[arg(long)]
    parity: Option<Parity>,

    /// Publisher update rate in Hz
    #[arg(long)]
    hz: Option<u32>,

    /// Per-read timeout in milliseconds
    #[arg(long)]
    read_timeout_ms: Option<u64>,

    /// HTTP listen address, e.g. 127.0.0.1:8080
    #[arg(long)]
    bind: Option<String>,

    /// Directory of static files to serve alongside the packet endpoint
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Replay packets from a capture file (`-` for stdin) instead of opening a port
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Also write logs to a timestamped file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log every packet
    #[arg(short, long)]
    verbose: bool,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// With --list-ports, print the port list as JSON
    #[arg(long, requires = "list_ports")]
    json: bool,
}

impl Args {
    /// Apply command-line overrides on top of file settings
    fn apply(&self, settings: &mut AppSettings) {
        if let Some(port) = &self.port {
            settings.serial.port = port.clone();
        }
        if let Some(baud) = self.baud {
            settings.serial.baud_rate = baud;
        }
        if let Some(parity) = self.parity {
            settings.serial.parity = parity;
        }
        if let Some(hz) = self.hz {
            settings.publisher.update_hz = hz;
        }
        if let Some(ms) = self.read_timeout_ms {
            settings.publisher.read_timeout_ms = ms;
        }
        if let Some(bind) = &self.bind {
            settings.http.bind = bind.clone();
        }
        if let Some(dir) = &self.static_dir {
            settings.http.static_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.log_dir {
            settings.log_dir = Some(dir.clone());
        }
        if self.verbose {
            settings.verbose = true;
        }
    }
}

fn print_ports(json: bool) -> Result<(), IoError> {
    let ports = list_serial_ports()?;
    if json {
        let text = serde_json::to_string_pretty(&ports)
            .map_err(|e| IoError::configuration(format!("Failed to serialise port list: {}", e)))?;
        println!("{}", text);
        return Ok(());
    }
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for p in ports {
        let usb = match (p.vid, p.pid) {
            (Some(vid), Some(pid)) => format!(" [{:04x}:{:04x}]", vid, pid),
            _ => String::new(),
        };
        let product = p.product.map(|s| format!(" {}", s)).unwrap_or_default();
        println!("{}  {}{}{}", p.port_name, p.port_type, usb, product);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tlog!("[main] Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tlog!("[main] Shutting down");
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.list_ports {
        return match print_ports(args.json) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        };
    }

    let mut settings = match load_settings(args.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    args.apply(&mut settings);

    logging::set_debug(settings.verbose);
    if let Some(dir) = &settings.log_dir {
        if let Err(e) = logging::init_file_logging(dir) {
            eprintln!("{}", e);
        }
    }

    let result = stickbridge_lib::run(&settings, args.replay.as_deref(), shutdown_signal()).await;
    logging::stop_file_logging();

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_settings() {
        let args = Args::try_parse_from([
            "stickbridge",
            "--port",
            "/dev/ttyACM0",
            "--parity",
            "odd",
            "--hz",
            "50",
            "--bind",
            "0.0.0.0:9000",
            "-v",
        ])
        .unwrap();

        let mut settings = AppSettings::default();
        settings.serial.baud_rate = 9600;
        args.apply(&mut settings);

        assert_eq!(settings.serial.port, "/dev/ttyACM0");
        assert_eq!(settings.serial.parity, Parity::Odd);
        assert_eq!(settings.serial.baud_rate, 9600);
        assert_eq!(settings.publisher.update_hz, 50);
        assert_eq!(settings.http.bind, "0.0.0.0:9000");
        assert!(settings.verbose);
    }

    #[test]
    fn test_json_requires_list_ports() {
        assert!(Args::try_parse_from(["stickbridge", "--json"]).is_err());
        assert!(Args::try_parse_from(["stickbridge", "--list-ports", "--json"]).is_ok());
    }
}
