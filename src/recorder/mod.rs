//! Recording session lifecycle.
//!
//! The [`Recorder`] owns the single external encoder process: it generates
//! a unique output path, launches the encoder through an
//! [`EncoderLauncher`], and tears the process down with a graceful stop
//! that escalates to a forced kill after a bounded grace period. At most
//! one session exists at a time; the monitor's state machine guarantees
//! `start` is never called while a session is active.

use crate::config::{Config, EncoderSettings};
use chrono::{DateTime, Datelike, Local, Utc};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub mod rpicam;

/// How long a stopped encoder gets to finalize its output container
/// before it is killed.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(10);

/// Granularity of the exit-wait loop.
const EXIT_POLL: Duration = Duration::from_millis(100);

/// A handle to a running encoder process.
pub trait EncoderHandle {
    /// Request graceful termination so the output file is finalized.
    fn request_stop(&mut self) -> std::io::Result<()>;

    /// Terminate the process immediately.
    fn force_stop(&mut self) -> std::io::Result<()>;

    /// Non-blocking liveness check.
    fn is_alive(&mut self) -> bool;
}

/// Spawns encoder processes.
pub trait EncoderLauncher {
    type Handle: EncoderHandle;

    /// Launch the encoder writing to `output`.
    fn spawn(&self, settings: &EncoderSettings, output: &Path)
        -> Result<Self::Handle, SpawnError>;
}

/// Reasons an encoder process could not be started.
#[derive(Debug)]
pub enum SpawnError {
    /// The encoder binary is not installed or not on PATH.
    BinaryMissing(String),
    /// The process spawned but exited before recording began.
    DiedEarly(String),
    /// Any other launch failure (device busy, unwritable directory, ...).
    Io(String),
}

impl std::fmt::Display for SpawnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpawnError::BinaryMissing(e) => write!(f, "encoder binary missing: {e}"),
            SpawnError::DiedEarly(e) => write!(f, "encoder exited during startup: {e}"),
            SpawnError::Io(e) => write!(f, "failed to launch encoder: {e}"),
        }
    }
}

impl std::error::Error for SpawnError {}

/// Identity of a recording session, for logging.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Short unique id used in log lines
    pub id: String,
    /// When the session started
    pub started_at: DateTime<Utc>,
    /// File the encoder is writing
    pub output_path: PathBuf,
}

struct RecordingSession<H> {
    info: SessionInfo,
    handle: H,
    last_known_alive: bool,
}

/// How a stop request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No session was active; nothing happened.
    NotRecording,
    /// The encoder exited within the grace period.
    Clean,
    /// The encoder ignored the graceful stop and was killed.
    Forced,
}

/// Owns the lifecycle of exactly one encoder process at a time.
pub struct Recorder<L: EncoderLauncher> {
    launcher: L,
    capture_dir: PathBuf,
    settings: EncoderSettings,
    unit_id: String,
    dated_layout: bool,
    stop_grace: Duration,
    session: Option<RecordingSession<L::Handle>>,
}

impl<L: EncoderLauncher> Recorder<L> {
    /// Create a recorder from the loaded configuration.
    pub fn new(launcher: L, config: &Config) -> Self {
        Self {
            launcher,
            capture_dir: config.capture_dir.clone(),
            settings: config.encoder_settings(),
            unit_id: config.effective_unit_id(),
            dated_layout: config.dated_layout,
            stop_grace: DEFAULT_STOP_GRACE,
            session: None,
        }
    }

    /// Override the stop grace period (tests use a zero grace).
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Start a new recording session.
    ///
    /// On failure no session exists and the next presence detection retries
    /// naturally.
    pub fn start(&mut self) -> Result<SessionInfo, SpawnError> {
        let output_path = self.unique_output_path(Local::now());
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SpawnError::Io(e.to_string()))?;
        }

        let handle = self.launcher.spawn(&self.settings, &output_path)?;

        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(8);
        let info = SessionInfo {
            id,
            started_at: Utc::now(),
            output_path,
        };
        info!(
            session = %info.id,
            path = %info.output_path.display(),
            "recording started"
        );
        self.session = Some(RecordingSession {
            info: info.clone(),
            handle,
            last_known_alive: true,
        });
        Ok(info)
    }

    /// Stop the active session, if any.
    ///
    /// Sends a graceful stop so the container is finalized, waits up to the
    /// grace period, then escalates to a forced kill. Idempotent: with no
    /// active session this is a no-op.
    pub fn stop(&mut self) -> StopOutcome {
        let Some(mut session) = self.session.take() else {
            return StopOutcome::NotRecording;
        };

        let outcome = if !session.handle.is_alive() {
            // Already exited on its own; nothing left to stop.
            StopOutcome::Clean
        } else {
            if let Err(e) = session.handle.request_stop() {
                warn!(session = %session.info.id, "graceful stop request failed: {e}");
            }
            if wait_for_exit(&mut session.handle, self.stop_grace) {
                StopOutcome::Clean
            } else {
                warn!(
                    session = %session.info.id,
                    "encoder ignored graceful stop, forcing termination"
                );
                if let Err(e) = session.handle.force_stop() {
                    warn!(session = %session.info.id, "forced stop failed: {e}");
                }
                wait_for_exit(&mut session.handle, EXIT_POLL);
                StopOutcome::Forced
            }
        };

        match std::fs::metadata(&session.info.output_path) {
            Ok(meta) => info!(
                session = %session.info.id,
                path = %session.info.output_path.display(),
                bytes = meta.len(),
                "recording saved"
            ),
            Err(_) => warn!(
                session = %session.info.id,
                path = %session.info.output_path.display(),
                "recording file not found after stop"
            ),
        }
        outcome
    }

    /// Non-blocking liveness check of the active session's encoder.
    ///
    /// Returns false when no session is active.
    pub fn is_alive(&mut self) -> bool {
        match self.session.as_mut() {
            Some(session) => {
                session.last_known_alive = session.handle.is_alive();
                session.last_known_alive
            }
            None => false,
        }
    }

    /// Drop a session whose encoder died on its own.
    ///
    /// Best-effort kills whatever is left and returns the session identity
    /// so the caller can log the abnormal end.
    pub fn discard(&mut self) -> Option<SessionInfo> {
        let mut session = self.session.take()?;
        if session.handle.is_alive() {
            let _ = session.handle.force_stop();
        }
        Some(session.info)
    }

    /// Last liveness observation of the active session, if any.
    pub fn last_known_alive(&self) -> Option<bool> {
        self.session.as_ref().map(|s| s.last_known_alive)
    }

    /// Identity of the active session, if any.
    pub fn session(&self) -> Option<&SessionInfo> {
        self.session.as_ref().map(|s| &s.info)
    }

    /// Whether a session is currently active.
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Build the output path for a session starting at `ts`, disambiguating
    /// same-second collisions with a deterministic counter suffix.
    fn unique_output_path(&self, ts: DateTime<Local>) -> PathBuf {
        let candidate = self.output_path_for(ts);
        if !candidate.exists() {
            return candidate;
        }
        let stem = candidate
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = candidate.parent().unwrap_or(Path::new(".")).to_path_buf();
        for n in 1.. {
            let next = dir.join(format!("{stem}_{n}.mp4"));
            if !next.exists() {
                return next;
            }
        }
        unreachable!()
    }

    /// The collision-free naming scheme: flat `rec_YYYYMMDD_HHMMSS.mp4`, or
    /// `YYYY/MM/DD/MMDDYYYY_<unit>_HHMMSS.mp4` for dated multi-unit layouts.
    fn output_path_for(&self, ts: DateTime<Local>) -> PathBuf {
        if self.dated_layout {
            self.capture_dir
                .join(format!("{:04}", ts.year()))
                .join(format!("{:02}", ts.month()))
                .join(format!("{:02}", ts.day()))
                .join(format!(
                    "{}_{}_{}.mp4",
                    ts.format("%m%d%Y"),
                    self.unit_id,
                    ts.format("%H%M%S")
                ))
        } else {
            self.capture_dir
                .join(format!("rec_{}.mp4", ts.format("%Y%m%d_%H%M%S")))
        }
    }
}

/// Wait for the handle's process to exit, polling its liveness.
fn wait_for_exit<H: EncoderHandle>(handle: &mut H, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if !handle.is_alive() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(EXIT_POLL.min(timeout));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted encoder handle for exercising the stop path.
    struct FakeHandle {
        alive: Arc<AtomicBool>,
        dies_on_request: bool,
    }

    impl EncoderHandle for FakeHandle {
        fn request_stop(&mut self) -> std::io::Result<()> {
            if self.dies_on_request {
                self.alive.store(false, Ordering::SeqCst);
            }
            Ok(())
        }

        fn force_stop(&mut self) -> std::io::Result<()> {
            self.alive.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn is_alive(&mut self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }
    }

    struct FakeLauncher {
        spawns: Arc<AtomicUsize>,
        dies_on_request: bool,
    }

    impl FakeLauncher {
        fn new() -> Self {
            Self {
                spawns: Arc::new(AtomicUsize::new(0)),
                dies_on_request: true,
            }
        }
    }

    impl EncoderLauncher for FakeLauncher {
        type Handle = FakeHandle;

        fn spawn(
            &self,
            _settings: &EncoderSettings,
            _output: &Path,
        ) -> Result<FakeHandle, SpawnError> {
            self.spawns.fetch_add(1, Ordering::SeqCst);
            Ok(FakeHandle {
                alive: Arc::new(AtomicBool::new(true)),
                dies_on_request: self.dies_on_request,
            })
        }
    }

    fn test_recorder(capture_dir: PathBuf, dated: bool) -> Recorder<FakeLauncher> {
        let mut config = Config::example();
        config.capture_dir = capture_dir;
        config.dated_layout = dated;
        config.unit_id = Some("unit7".to_string());
        Recorder::new(FakeLauncher::new(), &config).with_stop_grace(Duration::ZERO)
    }

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("capture-monitor-test").join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn ts() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap()
    }

    #[test]
    fn test_flat_output_path() {
        let recorder = test_recorder(PathBuf::from("/tmp/cap"), false);
        assert_eq!(
            recorder.output_path_for(ts()),
            PathBuf::from("/tmp/cap/rec_20250314_150926.mp4")
        );
    }

    #[test]
    fn test_dated_output_path() {
        let recorder = test_recorder(PathBuf::from("/tmp/cap"), true);
        assert_eq!(
            recorder.output_path_for(ts()),
            PathBuf::from("/tmp/cap/2025/03/14/03142025_unit7_150926.mp4")
        );
    }

    #[test]
    fn test_same_second_collision_gets_counter_suffix() {
        let dir = test_dir("collision");
        let recorder = test_recorder(dir.clone(), false);

        let first = recorder.unique_output_path(ts());
        assert_eq!(first, dir.join("rec_20250314_150926.mp4"));
        std::fs::write(&first, b"").unwrap();

        let second = recorder.unique_output_path(ts());
        assert_eq!(second, dir.join("rec_20250314_150926_1.mp4"));
        std::fs::write(&second, b"").unwrap();

        let third = recorder.unique_output_path(ts());
        assert_eq!(third, dir.join("rec_20250314_150926_2.mp4"));
    }

    #[test]
    fn test_stop_without_session_is_a_noop() {
        let mut recorder = test_recorder(test_dir("noop-stop"), false);
        assert_eq!(recorder.stop(), StopOutcome::NotRecording);
        assert_eq!(recorder.stop(), StopOutcome::NotRecording);
    }

    #[test]
    fn test_graceful_stop_is_clean() {
        let mut recorder = test_recorder(test_dir("clean-stop"), false);
        recorder.start().unwrap();
        assert!(recorder.is_active());
        assert!(recorder.is_alive());

        assert_eq!(recorder.stop(), StopOutcome::Clean);
        assert!(!recorder.is_active());
        assert!(!recorder.is_alive());
    }

    #[test]
    fn test_ignored_stop_escalates_to_forced() {
        let dir = test_dir("forced-stop");
        let mut config = Config::example();
        config.capture_dir = dir;
        let launcher = FakeLauncher {
            spawns: Arc::new(AtomicUsize::new(0)),
            dies_on_request: false,
        };
        let mut recorder =
            Recorder::new(launcher, &config).with_stop_grace(Duration::ZERO);

        recorder.start().unwrap();
        assert_eq!(recorder.stop(), StopOutcome::Forced);
        assert!(!recorder.is_active());
    }

    #[test]
    fn test_discard_returns_session_identity() {
        let mut recorder = test_recorder(test_dir("discard"), false);
        let info = recorder.start().unwrap();

        let discarded = recorder.discard().unwrap();
        assert_eq!(discarded.id, info.id);
        assert!(!recorder.is_active());
        assert!(recorder.discard().is_none());
    }
}
