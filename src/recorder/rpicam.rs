//! `rpicam-vid` launcher and Unix process handle.
//!
//! The encoder runs as an ordinary child process recording indefinitely
//! (`-t 0`) until it is told to stop. Graceful stop is SIGINT, which lets
//! rpicam-vid finalize the MP4 container; escalation is SIGKILL.

use crate::config::EncoderSettings;
use crate::recorder::{EncoderHandle, EncoderLauncher, SpawnError};
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};

/// Name of the encoder binary.
pub const ENCODER_BINARY: &str = "rpicam-vid";

/// How long the encoder gets to settle before we check it is still up.
const SPAWN_SETTLE: Duration = Duration::from_millis(500);

/// Launches `rpicam-vid` with the configured A/V parameters.
pub struct RpicamLauncher;

impl EncoderLauncher for RpicamLauncher {
    type Handle = RpicamProcess;

    fn spawn(
        &self,
        settings: &EncoderSettings,
        output: &Path,
    ) -> Result<RpicamProcess, SpawnError> {
        let args = build_args(settings, output);
        debug!("spawning: {ENCODER_BINARY} {}", args.join(" "));

        let child = Command::new(ENCODER_BINARY)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    SpawnError::BinaryMissing(format!("{ENCODER_BINARY} not on PATH"))
                } else {
                    SpawnError::Io(e.to_string())
                }
            })?;

        let mut process = RpicamProcess { child };

        // Camera/audio device errors surface as an immediate exit.
        std::thread::sleep(SPAWN_SETTLE);
        if let Ok(Some(status)) = process.child.try_wait() {
            return Err(SpawnError::DiedEarly(format!(
                "exit status {status} during startup"
            )));
        }
        Ok(process)
    }
}

/// Command line matching the encoder's A/V recording invocation.
fn build_args(settings: &EncoderSettings, output: &Path) -> Vec<String> {
    vec![
        "-t".into(),
        "0".into(),
        "--width".into(),
        settings.width.to_string(),
        "--height".into(),
        settings.height.to_string(),
        "--framerate".into(),
        settings.framerate.to_string(),
        "--codec".into(),
        settings.codec.as_arg().into(),
        "--autofocus-mode".into(),
        settings.autofocus_mode.clone(),
        "--audio-codec".into(),
        "aac".into(),
        "--audio-device".into(),
        settings.audio_device.clone(),
        "--audio-samplerate".into(),
        settings.audio_samplerate.to_string(),
        "--audio-channels".into(),
        settings.audio_channels.to_string(),
        "-o".into(),
        output.to_string_lossy().into_owned(),
        "--nopreview".into(),
    ]
}

/// A running `rpicam-vid` child process.
pub struct RpicamProcess {
    child: Child,
}

impl EncoderHandle for RpicamProcess {
    fn request_stop(&mut self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            let rc = unsafe { libc::kill(self.child.id() as libc::pid_t, libc::SIGINT) };
            if rc == 0 {
                Ok(())
            } else {
                Err(std::io::Error::last_os_error())
            }
        }
        // No interrupt signal off Unix; the container may not be finalized.
        #[cfg(not(unix))]
        self.child.kill()
    }

    fn force_stop(&mut self) -> std::io::Result<()> {
        self.child.kill()
    }

    fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(_)) => false,
            Err(e) => {
                warn!("could not poll encoder process: {e}");
                false
            }
        }
    }
}

impl Drop for RpicamProcess {
    fn drop(&mut self) {
        // Never leave an orphaned encoder behind.
        if self.is_alive() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Probe the encoder binary, returning its version string.
///
/// Used by the preflight check before the monitor starts.
pub fn encoder_version() -> std::io::Result<String> {
    let output = Command::new(ENCODER_BINARY).arg("--version").output()?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::path::PathBuf;

    #[test]
    fn test_command_line_carries_all_av_parameters() {
        let settings = Config::example().encoder_settings();
        let args = build_args(&settings, &PathBuf::from("/tmp/cap/rec.mp4"));

        let expect = [
            "-t",
            "0",
            "--width",
            "1920",
            "--height",
            "1080",
            "--framerate",
            "30",
            "--codec",
            "h264",
            "--autofocus-mode",
            "auto",
            "--audio-codec",
            "aac",
            "--audio-device",
            "plughw:1,0",
            "--audio-samplerate",
            "48000",
            "--audio-channels",
            "1",
            "-o",
            "/tmp/cap/rec.mp4",
            "--nopreview",
        ];
        assert_eq!(args, expect);
    }
}
