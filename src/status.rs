//! Status notification sinks.
//!
//! Sinks receive state-change notifications for an external indicator (an
//! LED daemon, a log line). Notifications are fire-and-forget: a sink
//! failure never affects the state machine.

use crate::monitor::MonitorState;
use std::path::PathBuf;
use tracing::{info, warn};

/// Receives monitor state changes.
pub trait StatusSink {
    /// Called once per state change and once at shutdown, best-effort.
    fn notify(&mut self, state: MonitorState);
}

impl StatusSink for Box<dyn StatusSink> {
    fn notify(&mut self, state: MonitorState) {
        (**self).notify(state)
    }
}

/// Sink that records state changes in the log.
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn notify(&mut self, state: MonitorState) {
        info!(state = %state, "monitor state changed");
    }
}

/// Sink that writes the state name to a file an indicator daemon can watch.
pub struct FileStatusSink {
    path: PathBuf,
}

impl FileStatusSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl StatusSink for FileStatusSink {
    fn notify(&mut self, state: MonitorState) {
        if let Err(e) = std::fs::write(&self.path, state.to_string()) {
            warn!(path = %self.path.display(), "status indicator write failed: {e}");
        }
    }
}

/// Sink that discards notifications.
pub struct NullStatusSink;

impl StatusSink for NullStatusSink {
    fn notify(&mut self, _state: MonitorState) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_sink_writes_state_name() {
        let path = std::env::temp_dir().join("capture-monitor-status-test");
        let mut sink = FileStatusSink::new(path.clone());

        sink.notify(MonitorState::Recording);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "recording");

        sink.notify(MonitorState::Idle);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "idle");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_file_sink_failure_is_silent() {
        let mut sink = FileStatusSink::new(PathBuf::from("/nonexistent/dir/status"));
        // Must not panic.
        sink.notify(MonitorState::Recording);
    }
}
