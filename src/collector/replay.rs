//! Replay collector: plays back a JSON Lines touch script.
//!
//! Stands in for the host UI layer during development and lab dry runs. Each
//! line is one event:
//!
//! ```text
//! {"offset_ms": 0,  "id": 7, "kind": "down", "x": 0.2,  "y": 0.3}
//! {"offset_ms": 15, "id": 7, "kind": "move", "x": 0.25, "y": 0.3}
//! {"offset_ms": 90, "id": 7, "kind": "up"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use crate::collector::types::{Position, TouchEvent, TouchId, TouchKind};
use crate::collector::CollectorError;
use chrono::{Duration as ChronoDuration, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Offsets past this are rejected as malformed.
pub const MAX_OFFSET_MS: u64 = 365 * 24 * 3_600_000;

/// How often the replay worker rechecks its running flag while input is idle.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One line of a replay script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecord {
    /// Milliseconds since the start of the replay
    pub offset_ms: u64,
    pub id: TouchId,
    pub kind: TouchKind,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub double_tap: bool,
    /// Falls back to the collector's default device when absent
    #[serde(default)]
    pub device: Option<String>,
}

/// Where the script is read from.
#[derive(Debug, Clone)]
pub enum ReplaySource {
    File(PathBuf),
    Stdin,
}

impl ReplaySource {
    /// `-` selects stdin, anything else is a file path.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            ReplaySource::Stdin
        } else {
            ReplaySource::File(PathBuf::from(arg))
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub source: ReplaySource,
    /// Device tag for records that do not carry one
    pub default_device: String,
    /// Sleep until each record's offset instead of emitting as fast as possible
    pub realtime: bool,
}

/// Parse a single script line. `Ok(None)` for blank lines and comments.
pub fn parse_line(line: &str) -> Result<Option<ReplayRecord>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let record: ReplayRecord = serde_json::from_str(trimmed).map_err(|e| e.to_string())?;
    if record.offset_ms > MAX_OFFSET_MS {
        return Err(format!(
            "offset_ms {} exceeds the maximum of {MAX_OFFSET_MS}",
            record.offset_ms
        ));
    }
    Ok(Some(record))
}

/// Strictly load a whole script, failing on the first malformed line.
pub fn load_script(path: &Path) -> Result<Vec<ReplayRecord>, CollectorError> {
    let file = std::fs::File::open(path).map_err(|e| CollectorError::Io(e.to_string()))?;
    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| CollectorError::Io(e.to_string()))?;
        match parse_line(&line) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(message) => {
                return Err(CollectorError::Parse {
                    line: index + 1,
                    message,
                })
            }
        }
    }
    Ok(records)
}

/// Collector that emits the events of a replay script on a background thread.
pub struct ReplayCollector {
    config: ReplayConfig,
    receiver: Receiver<TouchEvent>,
    sender: Option<Sender<TouchEvent>>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ReplayCollector {
    pub fn new(config: ReplayConfig) -> Self {
        let (sender, receiver) = bounded(10_000);
        Self {
            config,
            receiver,
            sender: Some(sender),
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Start replaying. The receiver disconnects once the script is exhausted.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        let reader = open_source(&self.config.source)?;
        // The sender moves into the worker so the channel closes with it.
        let sender = self.sender.take().ok_or(CollectorError::AlreadyRunning)?;

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let config = self.config.clone();

        let lines = spawn_line_reader(reader);
        let handle = thread::spawn(move || {
            let emitted = run_replay(lines, sender, running.clone(), &config);
            info!(events = emitted, "Replay finished");
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop replaying. Returns promptly even when the input is open but idle;
    /// a reader blocked in `read` exits on its next line or end of input.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for touch events.
    pub fn receiver(&self) -> &Receiver<TouchEvent> {
        &self.receiver
    }
}

impl Drop for ReplayCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_source(source: &ReplaySource) -> Result<Box<dyn BufRead + Send>, CollectorError> {
    match source {
        ReplaySource::File(path) => {
            let file =
                std::fs::File::open(path).map_err(|e| CollectorError::Io(format!("{path:?}: {e}")))?;
            Ok(Box::new(BufReader::new(file)))
        }
        ReplaySource::Stdin => Ok(Box::new(BufReader::new(std::io::stdin()))),
    }
}

/// Read lines on a detached thread. Blocking reads never hold up the worker.
fn spawn_line_reader(reader: Box<dyn BufRead + Send>) -> Receiver<io::Result<String>> {
    let (sender, receiver) = bounded(256);
    thread::spawn(move || {
        for line in reader.lines() {
            if sender.send(line).is_err() {
                break;
            }
        }
    });
    receiver
}

/// Feed every record to `sender`. Returns the number of events emitted.
fn run_replay(
    lines: Receiver<io::Result<String>>,
    sender: Sender<TouchEvent>,
    running: Arc<AtomicBool>,
    config: &ReplayConfig,
) -> usize {
    let started_at = Instant::now();
    let started_utc = Utc::now();
    let mut emitted = 0;
    let mut line_number = 0;

    while running.load(Ordering::SeqCst) {
        let line = match lines.recv_timeout(POLL_INTERVAL) {
            Ok(Ok(line)) => line,
            Ok(Err(e)) => {
                warn!("Replay read failed: {e}");
                break;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        line_number += 1;

        let record = match parse_line(&line) {
            Ok(Some(record)) => record,
            Ok(None) => continue,
            Err(e) => {
                warn!(line = line_number, "Skipping malformed replay line: {e}");
                continue;
            }
        };

        if config.realtime
            && !sleep_until(
                started_at + Duration::from_millis(record.offset_ms),
                &running,
            )
        {
            break;
        }

        let event = to_event(&record, started_utc, &config.default_device);
        debug!(id = event.id, kind = ?event.kind, "Replaying event");
        if sender.send(event).is_err() {
            break;
        }
        emitted += 1;
    }

    emitted
}

/// Sleep in short slices so `stop()` is honoured. Returns false if stopped.
fn sleep_until(deadline: Instant, running: &AtomicBool) -> bool {
    loop {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(Duration::from_millis(20)));
    }
}

fn to_event(
    record: &ReplayRecord,
    started_utc: chrono::DateTime<Utc>,
    default_device: &str,
) -> TouchEvent {
    let offset = ChronoDuration::milliseconds(record.offset_ms.min(MAX_OFFSET_MS) as i64);
    let timestamp = started_utc + offset;
    let device = record.device.as_deref().unwrap_or(default_device);
    TouchEvent::at(
        timestamp,
        record.id,
        record.kind,
        Position::new(record.x, record.y),
        device,
    )
    .with_double_tap(record.double_tap)
}
