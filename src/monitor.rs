//! The presence-to-recording control loop.
//!
//! A single-threaded loop polls the thermal sensor on a fixed cadence,
//! debounces the presence signal through a three-state machine, and drives
//! the recorder. The absence countdown is not a timer: it is a deadline
//! compared against the wall clock on each tick, so cancelling it when
//! presence returns is just clearing a field. One presence episode,
//! including gaps shorter than the stop delay, produces exactly one
//! recording.

use crate::config::Config;
use crate::detector::{PresenceDetector, PresenceSignal};
use crate::recorder::{EncoderLauncher, Recorder, StopOutcome};
use crate::sensor::ThermalSensor;
use crate::status::StatusSink;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Monitor states.
///
/// A recording session exists iff the state is not [`MonitorState::Idle`];
/// the stop deadline is set iff the state is
/// [`MonitorState::WaitingToStop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// No session; waiting for presence.
    Idle,
    /// Presence seen; encoder running.
    Recording,
    /// Presence lost; encoder still running, counting down to stop.
    WaitingToStop,
}

impl std::fmt::Display for MonitorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MonitorState::Idle => "idle",
            MonitorState::Recording => "recording",
            MonitorState::WaitingToStop => "waiting_to_stop",
        };
        f.write_str(name)
    }
}

/// The finite-state controller coupling sensor, detector, and recorder.
pub struct Monitor<S, L, K>
where
    S: ThermalSensor,
    L: EncoderLauncher,
    K: StatusSink,
{
    sensor: S,
    detector: PresenceDetector,
    recorder: Recorder<L>,
    status: K,
    state: MonitorState,
    stop_deadline: Option<DateTime<Utc>>,
    stop_delay: ChronoDuration,
    poll_interval: Duration,
}

impl<S, L, K> Monitor<S, L, K>
where
    S: ThermalSensor,
    L: EncoderLauncher,
    K: StatusSink,
{
    /// Build a monitor from the loaded configuration and its collaborators.
    pub fn new(config: &Config, sensor: S, launcher: L, status: K) -> Self {
        Self {
            sensor,
            detector: PresenceDetector::new(
                config.temperature_threshold,
                config.presence_pixels_required,
            ),
            recorder: Recorder::new(launcher, config),
            status,
            state: MonitorState::Idle,
            stop_deadline: None,
            stop_delay: ChronoDuration::milliseconds(
                (config.stop_delay_seconds * 1000.0).round() as i64,
            ),
            poll_interval: Duration::from_secs_f64(config.poll_interval_seconds),
        }
    }

    /// Current state.
    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// The stop deadline, set only in `WaitingToStop`.
    pub fn stop_deadline(&self) -> Option<DateTime<Utc>> {
        self.stop_deadline
    }

    /// The recorder, for inspecting the active session.
    pub fn recorder(&self) -> &Recorder<L> {
        &self.recorder
    }

    /// Mutable access to the sensor (used to script readings in tests).
    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    /// Run the poll loop until a shutdown message (or a dropped sender)
    /// arrives, then stop any active session and notify the final state.
    pub fn run(&mut self, shutdown: &Receiver<()>) {
        info!(
            poll_interval_s = self.poll_interval.as_secs_f64(),
            stop_delay_s = self.stop_delay.num_milliseconds() as f64 / 1000.0,
            "monitor started"
        );
        self.status.notify(self.state);

        loop {
            self.tick(Utc::now());
            match shutdown.recv_timeout(self.poll_interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        info!("shutdown requested");
        self.shutdown();
        info!("monitor stopped");
    }

    /// One iteration of the control loop: read, evaluate, transition.
    ///
    /// `now` is the wall-clock time sampled at tick start; every deadline
    /// comparison in this tick uses it.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        let signal = match self.sensor.read_frame() {
            Ok(frame) => self.detector.evaluate(&frame),
            Err(e) => {
                // Transient sensor faults must not kill the loop.
                warn!("sensor read failed, treating tick as absence: {e}");
                PresenceSignal::absent()
            }
        };

        // An encoder that died on its own while a session is supposed to be
        // running is an abnormal session end.
        if self.state != MonitorState::Idle && !self.recorder.is_alive() {
            if let Some(session) = self.recorder.discard() {
                error!(
                    session = %session.id,
                    path = %session.output_path.display(),
                    "encoder exited unexpectedly; session incomplete"
                );
            }
            self.stop_deadline = None;
            self.set_state(MonitorState::Idle);
            return;
        }

        match self.state {
            MonitorState::Idle => {
                if signal.present {
                    debug!(
                        hot_pixels = signal.hot_pixels,
                        max_temp = signal.max_temp,
                        "presence detected"
                    );
                    match self.recorder.start() {
                        Ok(_) => self.set_state(MonitorState::Recording),
                        // Stay idle; the next presence tick retries.
                        Err(e) => warn!("could not start recording: {e}"),
                    }
                }
            }
            MonitorState::Recording => {
                if !signal.present {
                    self.stop_deadline = Some(now + self.stop_delay);
                    info!(
                        delay_s = self.stop_delay.num_milliseconds() as f64 / 1000.0,
                        "presence lost, countdown started"
                    );
                    self.set_state(MonitorState::WaitingToStop);
                }
            }
            MonitorState::WaitingToStop => {
                if signal.present {
                    // Same session continues uninterrupted.
                    self.stop_deadline = None;
                    info!("presence returned, countdown canceled");
                    self.set_state(MonitorState::Recording);
                } else if self.stop_deadline.map_or(true, |d| now >= d) {
                    info!("countdown complete, stopping recording");
                    if self.recorder.stop() == StopOutcome::Forced {
                        warn!("stop required forced termination");
                    }
                    self.stop_deadline = None;
                    self.set_state(MonitorState::Idle);
                }
            }
        }
    }

    /// Stop any active session and settle into `Idle`.
    ///
    /// A forced kill here means the file may be truncated; that is logged
    /// as an abnormal termination, not a clean stop.
    pub fn shutdown(&mut self) {
        if self.recorder.is_active() {
            info!("stopping active recording before exit");
            if self.recorder.stop() == StopOutcome::Forced {
                warn!("recording terminated forcibly during shutdown");
            }
        }
        self.stop_deadline = None;
        self.state = MonitorState::Idle;
        self.status.notify(self.state);
    }

    fn set_state(&mut self, next: MonitorState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "state transition");
            self.state = next;
            self.status.notify(next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display_names() {
        assert_eq!(MonitorState::Idle.to_string(), "idle");
        assert_eq!(MonitorState::Recording.to_string(), "recording");
        assert_eq!(MonitorState::WaitingToStop.to_string(), "waiting_to_stop");
    }
}
