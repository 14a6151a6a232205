// src/io/publisher.rs
//
// Polling publisher: owns the read-decode-publish loop on a dedicated thread
// and the latest-record cell that any number of consumers read from.
//
// Lifecycle:
//   Unconfigured --attach--> Configured --start--> Running --stop--> Stopped
//                                                   Running --fault--> Faulted
// Stopped and Faulted are terminal; create a new Publisher to resume.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::decoder::decode_packet;
use super::error::IoError;
use super::record::Record;
use super::source::LineSource;

// ============================================================================
// Types and Configuration
// ============================================================================

/// Default polling rate
pub const DEFAULT_UPDATE_HZ: u32 = 100;

/// Default bound on a single line read
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Publisher loop configuration
#[derive(Clone, Debug, PartialEq)]
pub struct PublisherConfig {
    /// Target polling rate; the loop sleeps `1 / update_hz` after each publish
    pub update_hz: u32,
    /// Bound passed to `LineSource::read_line`
    pub read_timeout: Duration,
}

impl PublisherConfig {
    /// Pause after a successful publish
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.update_hz.max(1)))
    }

    /// Pause after a rejected or empty read
    pub fn backoff_interval(&self) -> Duration {
        self.update_interval() / 2
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            update_hz: DEFAULT_UPDATE_HZ,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Publisher lifecycle state
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublisherState {
    Unconfigured,
    Configured,
    Running,
    Stopped,
    /// The source reported a permanent fault; the last good record is still served
    Faulted(String),
}

impl fmt::Display for PublisherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublisherState::Unconfigured => write!(f, "unconfigured"),
            PublisherState::Configured => write!(f, "configured"),
            PublisherState::Running => write!(f, "running"),
            PublisherState::Stopped => write!(f, "stopped"),
            PublisherState::Faulted(reason) => write!(f, "faulted ({})", reason),
        }
    }
}

/// Snapshot of the loop counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublisherStats {
    /// Records written to the cell
    pub published: u64,
    /// Lines the decoder rejected
    pub rejected: u64,
    /// Reads that timed out with no data at all
    pub empty_reads: u64,
    /// Transient read errors from the source
    pub read_errors: u64,
}

#[derive(Default)]
struct StatsCounters {
    published: AtomicU64,
    rejected: AtomicU64,
    empty_reads: AtomicU64,
    read_errors: AtomicU64,
}

impl StatsCounters {
    fn snapshot(&self) -> PublisherStats {
        PublisherStats {
            published: self.published.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            empty_reads: self.empty_reads.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Latest-Record Cell
// ============================================================================

/// Shared handle to the most recently published record.
///
/// Cloning is cheap; all clones see the same cell. The record is replaced as
/// a whole under the lock, so a reader never sees fields from two different
/// packets.
#[derive(Clone, Debug)]
pub struct LatestRecord {
    inner: Arc<Mutex<Record>>,
}

impl LatestRecord {
    pub fn new() -> Self {
        Self::with_initial(Record::SENTINEL)
    }

    pub fn with_initial(record: Record) -> Self {
        Self {
            inner: Arc::new(Mutex::new(record)),
        }
    }

    /// Copy of the current record. Never fails.
    pub fn get(&self) -> Record {
        *self.lock()
    }

    pub(crate) fn publish(&self, record: Record) {
        *self.lock() = record;
    }

    // A poisoned lock still holds a whole record (it is plain `Copy` data),
    // so recover it instead of failing readers.
    fn lock(&self) -> MutexGuard<'_, Record> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for LatestRecord {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Publisher
// ============================================================================

/// Reads lines from a `LineSource` on a background thread and publishes each
/// successfully decoded packet to a `LatestRecord`.
pub struct Publisher {
    config: PublisherConfig,
    latest: LatestRecord,
    state: Arc<Mutex<PublisherState>>,
    source: Option<Box<dyn LineSource>>,
    cancel_flag: Arc<AtomicBool>,
    stats: Arc<StatsCounters>,
    task_handle: Option<JoinHandle<()>>,
}

impl Publisher {
    pub fn new(config: PublisherConfig) -> Self {
        Self {
            config,
            latest: LatestRecord::new(),
            state: Arc::new(Mutex::new(PublisherState::Unconfigured)),
            source: None,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(StatsCounters::default()),
            task_handle: None,
        }
    }

    /// Attach the line source to poll. Replaces a previously attached source
    /// if the publisher has not started yet.
    pub fn attach(&mut self, source: Box<dyn LineSource>) -> Result<(), IoError> {
        let mut state = lock_state(&self.state);
        match *state {
            PublisherState::Unconfigured | PublisherState::Configured => {
                self.source = Some(source);
                *state = PublisherState::Configured;
                Ok(())
            }
            ref other => Err(IoError::invalid_state("attach a source", other)),
        }
    }

    /// Start the polling loop on a dedicated thread
    pub fn start(&mut self) -> Result<(), IoError> {
        {
            let mut state = lock_state(&self.state);
            match *state {
                PublisherState::Configured => {}
                PublisherState::Unconfigured => return Err(IoError::NotConfigured),
                ref other => return Err(IoError::invalid_state("start", other)),
            }
            // Set before spawning so a fault from the loop is never overwritten
            *state = PublisherState::Running;
        }

        let source = match self.source.take() {
            Some(source) => source,
            None => {
                *lock_state(&self.state) = PublisherState::Unconfigured;
                return Err(IoError::NotConfigured);
            }
        };

        self.cancel_flag.store(false, Ordering::Relaxed);

        let config = self.config.clone();
        let latest = self.latest.clone();
        let state = self.state.clone();
        let cancel_flag = self.cancel_flag.clone();
        let stats = self.stats.clone();

        let handle = thread::Builder::new()
            .name("stickbridge-publisher".to_string())
            .spawn(move || run_publisher_loop(source, config, latest, state, cancel_flag, stats))
            .map_err(|e| {
                *lock_state(&self.state) = PublisherState::Faulted(e.to_string());
                IoError::configuration(format!("Failed to spawn publisher thread: {}", e))
            })?;

        self.task_handle = Some(handle);
        Ok(())
    }

    /// Signal the loop to exit and wait for it.
    ///
    /// The loop finishes its current iteration first, so this can take up to
    /// one read timeout plus one update interval. No record is published after
    /// this returns.
    pub fn stop(&mut self) -> Result<(), IoError> {
        let current = self.state();
        if !matches!(current, PublisherState::Running | PublisherState::Faulted(_)) {
            return Err(IoError::invalid_state("stop", current));
        }

        self.cancel_flag.store(true, Ordering::Relaxed);
        self.join_loop();

        let mut state = lock_state(&self.state);
        if *state == PublisherState::Running {
            *state = PublisherState::Stopped;
        }
        Ok(())
    }

    /// Copy of the latest published record (the sentinel before any packet)
    pub fn latest(&self) -> Record {
        self.latest.get()
    }

    /// Consumer handle sharing this publisher's cell
    pub fn handle(&self) -> LatestRecord {
        self.latest.clone()
    }

    pub fn state(&self) -> PublisherState {
        lock_state(&self.state).clone()
    }

    pub fn stats(&self) -> PublisherStats {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    fn join_loop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            if handle.join().is_err() {
                tlog!("[publisher] Loop thread panicked");
                *lock_state(&self.state) = PublisherState::Faulted("loop panicked".to_string());
            }
        }
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
        self.join_loop();
    }
}

fn lock_state(state: &Mutex<PublisherState>) -> MutexGuard<'_, PublisherState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

// ============================================================================
// Polling Loop
// ============================================================================

fn run_publisher_loop(
    mut source: Box<dyn LineSource>,
    config: PublisherConfig,
    latest: LatestRecord,
    state: Arc<Mutex<PublisherState>>,
    cancel_flag: Arc<AtomicBool>,
    stats: Arc<StatsCounters>,
) {
    let device = source.describe();
    let update_interval = config.update_interval();
    let backoff_interval = config.backoff_interval();

    tlog!(
        "[publisher] Polling {} at {} Hz (read timeout {:?})",
        device,
        config.update_hz,
        config.read_timeout
    );

    let reason = loop {
        if cancel_flag.load(Ordering::Relaxed) {
            break "stopped";
        }

        match source.read_line(config.read_timeout) {
            Ok(line) if line.is_empty() => {
                stats.empty_reads.fetch_add(1, Ordering::Relaxed);
                tdebug!("[publisher] No data from {}", device);
                thread::sleep(backoff_interval);
            }
            Ok(line) => match decode_packet(&line) {
                Ok(record) => {
                    latest.publish(record);
                    stats.published.fetch_add(1, Ordering::Relaxed);
                    tdebug!(
                        "[publisher] Found good packet: {:4} {:4} {:1} {:3}",
                        record.h,
                        record.v,
                        record.c,
                        record.r
                    );
                    thread::sleep(update_interval);
                }
                Err(e) => {
                    stats.rejected.fetch_add(1, Ordering::Relaxed);
                    tdebug!("[publisher] Bad packet {:?}: {}", line, e);
                    thread::sleep(backoff_interval);
                }
            },
            Err(e) if !e.is_permanent() => {
                stats.read_errors.fetch_add(1, Ordering::Relaxed);
                tlog!("[publisher] {}, retrying", e);
                thread::sleep(backoff_interval);
            }
            Err(e) => {
                tlog!("[publisher] {}, giving up", e);
                *lock_state(&state) = PublisherState::Faulted(e.to_string());
                break "fault";
            }
        }
    };

    let s = stats.snapshot();
    tlog!(
        "[publisher] Loop exited ({}): {} published, {} rejected, {} empty, {} read errors; last {}",
        reason,
        s.published,
        s.rejected,
        s.empty_reads,
        s.read_errors,
        latest.get()
    );
}

// ============================================================================
// Tests
// ============================================================================
