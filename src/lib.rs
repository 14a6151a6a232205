// src/lib.rs
//
// stickbridge: reads joystick packets from a serial port and serves the most
// recent one over HTTP.

#[macro_use]
pub mod logging;
pub mod io;
pub mod server;
pub mod settings;

use std::future::Future;
use std::path::Path;

use io::serial::SerialLineSource;
use io::{IoError, LineSource, Publisher, PublisherStats, ReplaySource};
use settings::AppSettings;

pub use io::{LatestRecord, Record};

/// Replay path that selects standard input
pub const STDIN_REPLAY: &str = "-";

/// Open the configured line source: a capture file (or stdin for `-`) when
/// `replay` is given, otherwise the serial port from `settings`.
pub fn open_source(
    settings: &AppSettings,
    replay: Option<&Path>,
) -> Result<Box<dyn LineSource>, IoError> {
    match replay {
        Some(path) if path == Path::new(STDIN_REPLAY) => {
            tlog!("[bridge] Replaying packets from stdin");
            Ok(Box::new(ReplaySource::stdin()))
        }
        Some(path) => {
            tlog!("[bridge] Replaying packets from {}", path.display());
            Ok(Box::new(ReplaySource::open(path)?))
        }
        None => Ok(Box::new(SerialLineSource::open(&settings.serial_config())?)),
    }
}

/// Run the bridge until `shutdown` resolves.
///
/// Binds the HTTP listener, starts the publisher over the configured source
/// and serves the latest record. The publisher is stopped before returning.
pub async fn run<F>(
    settings: &AppSettings,
    replay: Option<&Path>,
    shutdown: F,
) -> Result<PublisherStats, IoError>
where
    F: Future<Output = ()> + Send + 'static,
{
    settings.validate(replay.is_some())?;

    let addr = settings.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| IoError::configuration(format!("Failed to bind {}: {}", addr, e)))?;

    let mut publisher = Publisher::new(settings.publisher_config());
    publisher.attach(open_source(settings, replay)?)?;
    publisher.start()?;

    let served = server::serve(
        listener,
        publisher.handle(),
        settings.http.static_dir.clone(),
        shutdown,
    )
    .await;

    let stats = shutdown_publisher(publisher).await?;
    tlog!(
        "[bridge] Stopped: {} published, {} rejected, {} read errors",
        stats.published,
        stats.rejected,
        stats.read_errors
    );

    served.map_err(|e| IoError::transport_fault("http", e.to_string()))?;
    Ok(stats)
}

/// Stop the publisher on the blocking pool. The join waits for the loop to
/// finish its current read, which can take a full read timeout.
async fn shutdown_publisher(mut publisher: Publisher) -> Result<PublisherStats, IoError> {
    tokio::task::spawn_blocking(move || {
        if let Err(e) = publisher.stop() {
            tlog!("[bridge] {}", e);
        }
        publisher.stats()
    })
    .await
    .map_err(|e| IoError::transport_fault("publisher", e.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
