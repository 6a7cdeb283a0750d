//! Configuration for the capture monitor.
//!
//! The configuration is an immutable snapshot loaded once at startup and
//! passed by reference into the monitor's constructor. Missing or invalid
//! fields are a fatal startup error; the poll loop never runs with a bad
//! configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the capture monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory recordings are written to
    pub capture_dir: PathBuf,

    /// Minimum cell temperature (degC) considered a human heat signature
    pub temperature_threshold: f64,

    /// Number of hot cells required to signal presence
    pub presence_pixels_required: usize,

    /// Seconds of continuous absence before a recording stops
    pub stop_delay_seconds: f64,

    /// Seconds between sensor polls
    pub poll_interval_seconds: f64,

    /// Video frame size, e.g. "1920x1080"
    pub video_resolution: Resolution,

    /// Video frames per second
    pub video_framerate: u32,

    /// Video codec passed to the encoder
    pub video_codec: VideoCodec,

    /// Audio sample rate in Hz
    pub audio_samplerate: u32,

    /// Audio channel count
    pub audio_channels: u32,

    /// ALSA device the encoder captures audio from
    pub audio_device: String,

    /// Autofocus mode passed to the encoder
    #[serde(default = "default_autofocus_mode")]
    pub autofocus_mode: String,

    /// I2C character device the thermal sensor sits on
    #[serde(default = "default_i2c_bus")]
    pub i2c_bus: String,

    /// Unit identifier used in multi-unit filenames; defaults to hostname
    #[serde(default)]
    pub unit_id: Option<String>,

    /// Use the dated YYYY/MM/DD directory layout for recordings
    #[serde(default)]
    pub dated_layout: bool,

    /// File the current state name is written to for an external indicator
    #[serde(default)]
    pub status_file: Option<PathBuf>,
}

fn default_autofocus_mode() -> String {
    "auto".to_string()
}

fn default_i2c_bus() -> String {
    "/dev/i2c-1".to_string()
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the numeric invariants the control loop relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.presence_pixels_required < 1 {
            return Err(ConfigError::Invalid(
                "presence_pixels_required must be at least 1".into(),
            ));
        }
        if self.stop_delay_seconds < 0.0 {
            return Err(ConfigError::Invalid(
                "stop_delay_seconds must not be negative".into(),
            ));
        }
        if self.poll_interval_seconds <= 0.0 || self.poll_interval_seconds.is_nan() {
            return Err(ConfigError::Invalid(
                "poll_interval_seconds must be positive".into(),
            ));
        }
        if self.video_framerate == 0 {
            return Err(ConfigError::Invalid("video_framerate must be nonzero".into()));
        }
        if self.audio_samplerate == 0 {
            return Err(ConfigError::Invalid("audio_samplerate must be nonzero".into()));
        }
        if self.audio_channels == 0 {
            return Err(ConfigError::Invalid("audio_channels must be nonzero".into()));
        }
        Ok(())
    }

    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("capture-monitor")
            .join("config.json")
    }

    /// The encoder parameters carried by this configuration.
    pub fn encoder_settings(&self) -> EncoderSettings {
        EncoderSettings {
            width: self.video_resolution.width,
            height: self.video_resolution.height,
            framerate: self.video_framerate,
            codec: self.video_codec,
            autofocus_mode: self.autofocus_mode.clone(),
            audio_samplerate: self.audio_samplerate,
            audio_channels: self.audio_channels,
            audio_device: self.audio_device.clone(),
        }
    }

    /// The unit identifier, falling back to the hostname.
    pub fn effective_unit_id(&self) -> String {
        self.unit_id.clone().unwrap_or_else(|| {
            hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unit".to_string())
        })
    }

    /// A complete example configuration, suitable as a starting template.
    pub fn example() -> Self {
        let capture_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("captures");
        Self {
            capture_dir,
            temperature_threshold: 28.0,
            presence_pixels_required: 3,
            stop_delay_seconds: 60.0,
            poll_interval_seconds: 0.5,
            video_resolution: Resolution {
                width: 1920,
                height: 1080,
            },
            video_framerate: 30,
            video_codec: VideoCodec::H264,
            audio_samplerate: 48_000,
            audio_channels: 1,
            audio_device: "plughw:1,0".to_string(),
            autofocus_mode: default_autofocus_mode(),
            i2c_bus: default_i2c_bus(),
            unit_id: None,
            dated_layout: false,
            status_file: None,
        }
    }
}

/// A video frame size, written as "WxH" in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl std::str::FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once('x')
            .ok_or_else(|| format!("expected WxH, got {s:?}"))?;
        let width: u32 = w.parse().map_err(|_| format!("bad width in {s:?}"))?;
        let height: u32 = h.parse().map_err(|_| format!("bad height in {s:?}"))?;
        if width == 0 || height == 0 {
            return Err(format!("resolution sides must be nonzero, got {s:?}"));
        }
        Ok(Self { width, height })
    }
}

impl Serialize for Resolution {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Resolution {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Supported video codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    H265,
}

impl VideoCodec {
    /// The codec name as the encoder expects it on the command line.
    pub fn as_arg(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "h264",
            VideoCodec::H265 => "h265",
        }
    }
}

/// Encoder parameters handed to the recording process controller.
#[derive(Debug, Clone)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    pub codec: VideoCodec,
    pub autofocus_mode: String,
    pub audio_samplerate: u32,
    pub audio_channels: u32,
    pub audio_device: String,
}

/// Configuration errors. All of these are fatal at startup.
#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {e}"),
            ConfigError::Parse(e) => write!(f, "Parse error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_json() -> String {
        serde_json::to_string(&Config::example()).unwrap()
    }

    #[test]
    fn test_example_round_trips_and_validates() {
        let config: Config = serde_json::from_str(&example_json()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.temperature_threshold, 28.0);
        assert_eq!(config.presence_pixels_required, 3);
        assert_eq!(config.video_codec, VideoCodec::H264);
    }

    #[test]
    fn test_missing_field_is_a_parse_error() {
        let mut value: serde_json::Value = serde_json::from_str(&example_json()).unwrap();
        value.as_object_mut().unwrap().remove("audio_device");
        let result: Result<Config, _> = serde_json::from_value(value);
        assert!(result.is_err());
    }

    #[test]
    fn test_resolution_parsing() {
        let res: Resolution = "1920x1080".parse().unwrap();
        assert_eq!(res.width, 1920);
        assert_eq!(res.height, 1080);
        assert_eq!(res.to_string(), "1920x1080");

        assert!("1920".parse::<Resolution>().is_err());
        assert!("0x1080".parse::<Resolution>().is_err());
        assert!("widexhigh".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_codec_names() {
        assert_eq!(VideoCodec::H264.as_arg(), "h264");
        assert_eq!(VideoCodec::H265.as_arg(), "h265");
        let codec: VideoCodec = serde_json::from_str("\"h265\"").unwrap();
        assert_eq!(codec, VideoCodec::H265);
    }

    #[test]
    fn test_invariants_rejected() {
        let mut config = Config::example();
        config.presence_pixels_required = 0;
        assert!(config.validate().is_err());

        let mut config = Config::example();
        config.stop_delay_seconds = -1.0;
        assert!(config.validate().is_err());

        let mut config = Config::example();
        config.poll_interval_seconds = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_stop_delay_is_allowed() {
        let mut config = Config::example();
        config.stop_delay_seconds = 0.0;
        config.validate().unwrap();
    }
}
