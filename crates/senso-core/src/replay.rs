//! Timed replay of recorded sensor frames.
//!
//! A recording is a newline separated list of entries, each either
//! `delay,base64payload` or a bare `base64payload` (20 ms delay). Frames are
//! emitted in order, each after its own delay divided by the playback speed.
//!
//! [`Replay::next_frame`] is cancel safe: the pending deadline lives in the
//! replay, so it can sit in a `tokio::select!` beside socket reads without
//! losing or restarting its schedule.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

/// Delay of entries that do not declare one.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(20);

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Failed to read recording {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Line {line}: invalid delay {value:?}")]
    InvalidDelay { line: usize, value: String },
    #[error("Line {line}: invalid base64 payload: {source}")]
    InvalidPayload {
        line: usize,
        source: base64::DecodeError,
    },
}

/// One recorded frame and the delay before it is emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub delay: Duration,
    pub payload: Vec<u8>,
}

impl Record {
    pub fn new(delay: Duration, payload: Vec<u8>) -> Self {
        Self { delay, payload }
    }
}

/// An in-memory recording.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recording {
    records: Vec<Record>,
}

impl Recording {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Blank lines are skipped.
    pub fn parse(text: &str) -> Result<Self, ReplayError> {
        let mut records = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let (delay, payload) = match line.split_once(',') {
                Some((delay, payload)) => {
                    let ms: u64 =
                        delay
                            .trim()
                            .parse()
                            .map_err(|_| ReplayError::InvalidDelay {
                                line: idx + 1,
                                value: delay.to_string(),
                            })?;
                    (Duration::from_millis(ms), payload.trim())
                }
                None => (DEFAULT_DELAY, line),
            };
            let payload = STANDARD
                .decode(payload)
                .map_err(|source| ReplayError::InvalidPayload {
                    line: idx + 1,
                    source,
                })?;
            records.push(Record::new(delay, payload));
        }
        Ok(Self { records })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let recording = Self::parse(&text)?;
        info!(path = %path.display(), records = recording.len(), "Loaded recording");
        Ok(recording)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Playback settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayOptions {
    /// Restart from the first record after the last one.
    pub looping: bool,
    /// Delay divisor; 2.0 plays twice as fast.
    pub speed: f64,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            looping: true,
            speed: 1.0,
        }
    }
}

/// Upper bound of a scaled delay, so tiny speeds cannot overflow a deadline.
pub const MAX_SCALED_DELAY: Duration = Duration::from_secs(86400 * 365 * 30);

impl ReplayOptions {
    /// Non-positive or non-finite speeds play at normal speed. The result
    /// saturates at [`MAX_SCALED_DELAY`].
    pub fn scale(&self, delay: Duration) -> Duration {
        if self.speed.is_finite() && self.speed > 0.0 {
            Duration::try_from_secs_f64(delay.as_secs_f64() / self.speed)
                .unwrap_or(MAX_SCALED_DELAY)
                .min(MAX_SCALED_DELAY)
        } else {
            delay
        }
    }
}

/// Pause/resume handle for a [`Replay`].
#[derive(Debug, Clone)]
pub struct ReplayControl {
    paused: Arc<watch::Sender<bool>>,
}

impl ReplayControl {
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }
}

/// An active playback of a recording.
pub struct Replay {
    recording: Arc<Recording>,
    options: ReplayOptions,
    position: usize,
    /// Emission time of the record at `position`, once scheduled.
    deadline: Option<Instant>,
    paused: watch::Receiver<bool>,
    control: ReplayControl,
    finished: bool,
}

impl Replay {
    pub fn new(recording: Arc<Recording>, options: ReplayOptions) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            recording,
            options,
            position: 0,
            deadline: None,
            paused: rx,
            control: ReplayControl {
                paused: Arc::new(tx),
            },
            finished: false,
        }
    }

    pub fn control(&self) -> ReplayControl {
        self.control.clone()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Waits for and returns the next frame, or `None` once a non-looping
    /// playback has emitted every record.
    pub async fn next_frame(&mut self) -> Option<Vec<u8>> {
        let recording = Arc::clone(&self.recording);
        loop {
            if self.finished {
                return None;
            }

            if *self.paused.borrow_and_update() {
                // The pending record is rescheduled from the resume time.
                self.deadline = None;
                // The sender lives in `self.control`, so this cannot fail.
                let _ = self.paused.wait_for(|paused| !*paused).await;
                continue;
            }

            let Some(record) = recording.records().get(self.position) else {
                if self.options.looping && !recording.is_empty() {
                    debug!("Recording ended, looping");
                    self.position = 0;
                    continue;
                }
                debug!(frames = self.position, "Recording ended");
                self.finished = true;
                return None;
            };

            let delay = self.options.scale(record.delay);
            let deadline = *self.deadline.get_or_insert_with(|| Instant::now() + delay);

            tokio::select! {
                _ = sleep_until(deadline) => {
                    self.deadline = None;
                    self.position += 1;
                    return Some(record.payload.clone());
                }
                _ = self.paused.changed() => continue,
            }
        }
    }
}
