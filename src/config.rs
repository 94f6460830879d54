//! Configuration management with environment variable support.
//!
//! This module provides centralized configuration for the capture harness, supporting:
//! - Environment variables for all configurable values
//! - Defaults matching the reference recording setup (x11grab, 1366x768 @ 25 fps)
//! - A cached global read once per process
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `CAPTURE_HARNESS_RECORDER` | Screen recorder binary | `/usr/bin/ffmpeg` |
//! | `CAPTURE_HARNESS_OUTPUT_DIR` | Directory for recordings | `/tmp/capture-harness` |
//! | `CAPTURE_HARNESS_DISPLAY` | X display to capture | `$DISPLAY` or `:0.0` |
//! | `CAPTURE_HARNESS_VIDEO_SIZE` | Capture size preset or `WxH` | `wxga` |
//! | `CAPTURE_HARNESS_FRAMERATE` | Capture frame rate | `25` |
//! | `CAPTURE_HARNESS_RECORDING` | `required`, `best-effort` or `off` | `required` |
//! | `CAPTURE_HARNESS_ACTIVATION_TIMEOUT` | Seconds to wait for a trigger to fire | `5` |
//! | `CAPTURE_HARNESS_KEEP` | Keep recordings of passing runs | `false` |
//!
//! # Example
//!
//! ```bash
//! # Record a second monitor at full HD and keep every video
//! export CAPTURE_HARNESS_DISPLAY=":0.0+1366,0"
//! export CAPTURE_HARNESS_VIDEO_SIZE="fhd"
//! export CAPTURE_HARNESS_KEEP=1
//! ```

use once_cell::sync::OnceCell;
use std::env;

use crate::harness::RecordingMode;

// ============================================================================
// Default Values
// ============================================================================

/// Default screen recorder binary
pub const DEFAULT_RECORDER: &str = "/usr/bin/ffmpeg";

/// Default directory for recordings
pub const DEFAULT_OUTPUT_DIR: &str = "/tmp/capture-harness";

/// Default X display when `DISPLAY` is unset
pub const DEFAULT_DISPLAY: &str = ":0.0";

/// Default capture size preset
pub const DEFAULT_VIDEO_SIZE: &str = "wxga";

/// Default capture width (pixels)
pub const DEFAULT_VIDEO_WIDTH: u32 = 1366;

/// Default capture height (pixels)
pub const DEFAULT_VIDEO_HEIGHT: u32 = 768;

/// Default capture frame rate
pub const DEFAULT_FRAMERATE: u32 = 25;

/// Default activation timeout (seconds)
pub const DEFAULT_ACTIVATION_TIMEOUT: u64 = 5;

// ============================================================================
// Environment Variable Names
// ============================================================================

pub const ENV_RECORDER: &str = "CAPTURE_HARNESS_RECORDER";
pub const ENV_OUTPUT_DIR: &str = "CAPTURE_HARNESS_OUTPUT_DIR";
pub const ENV_DISPLAY: &str = "CAPTURE_HARNESS_DISPLAY";
pub const ENV_VIDEO_SIZE: &str = "CAPTURE_HARNESS_VIDEO_SIZE";
pub const ENV_FRAMERATE: &str = "CAPTURE_HARNESS_FRAMERATE";
pub const ENV_RECORDING: &str = "CAPTURE_HARNESS_RECORDING";
pub const ENV_ACTIVATION_TIMEOUT: &str = "CAPTURE_HARNESS_ACTIVATION_TIMEOUT";
pub const ENV_KEEP: &str = "CAPTURE_HARNESS_KEEP";

/// Standard X11 display variable, used when no override is given
pub const ENV_X_DISPLAY: &str = "DISPLAY";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceCell<Config> = OnceCell::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for the capture harness
#[derive(Debug, Clone)]
pub struct Config {
    /// Screen recorder settings
    pub recorder: RecorderSettings,
    /// Recording storage and retention
    pub recording: RecordingSettings,
    /// Harness wait limits
    pub harness: HarnessSettings,
}

/// Screen recorder settings
#[derive(Debug, Clone)]
pub struct RecorderSettings {
    /// Recorder binary path
    pub program: String,
    /// X display to capture
    pub display: String,
    /// Capture size preset or `WxH`
    pub video_size: String,
    pub video_width: u32,
    pub video_height: u32,
    /// Frames per second
    pub framerate: u32,
}

/// Recording storage and retention settings
#[derive(Debug, Clone)]
pub struct RecordingSettings {
    /// Directory where recordings are written
    pub output_dir: String,
    /// Policy for recorder start failures
    pub mode: RecordingMode,
    /// Keep recordings of passing runs
    pub keep: bool,
}

#[derive(Debug, Clone)]
pub struct HarnessSettings {
    /// Seconds to wait for a trigger's activation notification
    pub activation_timeout: u64,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            recorder: RecorderSettings::from_env(),
            recording: RecordingSettings::from_env(),
            harness: HarnessSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            recorder: RecorderSettings::defaults(),
            recording: RecordingSettings::defaults(),
            harness: HarnessSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RecorderSettings {
    pub fn from_env() -> Self {
        let video_size =
            env::var(ENV_VIDEO_SIZE).unwrap_or_else(|_| DEFAULT_VIDEO_SIZE.to_string());

        let (width, height) =
            parse_video_size(&video_size).unwrap_or((DEFAULT_VIDEO_WIDTH, DEFAULT_VIDEO_HEIGHT));

        Self {
            program: env::var(ENV_RECORDER).unwrap_or_else(|_| DEFAULT_RECORDER.to_string()),
            display: env::var(ENV_DISPLAY)
                .or_else(|_| env::var(ENV_X_DISPLAY))
                .unwrap_or_else(|_| DEFAULT_DISPLAY.to_string()),
            video_size,
            video_width: width,
            video_height: height,
            framerate: env::var(ENV_FRAMERATE)
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|fps| *fps > 0)
                .unwrap_or(DEFAULT_FRAMERATE),
        }
    }

    pub fn defaults() -> Self {
        Self {
            program: DEFAULT_RECORDER.to_string(),
            display: DEFAULT_DISPLAY.to_string(),
            video_size: DEFAULT_VIDEO_SIZE.to_string(),
            video_width: DEFAULT_VIDEO_WIDTH,
            video_height: DEFAULT_VIDEO_HEIGHT,
            framerate: DEFAULT_FRAMERATE,
        }
    }
}

impl RecordingSettings {
    pub fn from_env() -> Self {
        Self {
            output_dir: env::var(ENV_OUTPUT_DIR).unwrap_or_else(|_| DEFAULT_OUTPUT_DIR.to_string()),
            mode: env::var(ENV_RECORDING)
                .ok()
                .and_then(|s| RecordingMode::from_str(&s))
                .unwrap_or_default(),
            keep: env::var(ENV_KEEP).map(|s| parse_flag(&s)).unwrap_or(false),
        }
    }

    pub fn defaults() -> Self {
        Self {
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            mode: RecordingMode::default(),
            keep: false,
        }
    }
}

impl HarnessSettings {
    pub fn from_env() -> Self {
        Self {
            activation_timeout: env::var(ENV_ACTIVATION_TIMEOUT)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_ACTIVATION_TIMEOUT),
        }
    }

    pub fn defaults() -> Self {
        Self {
            activation_timeout: DEFAULT_ACTIVATION_TIMEOUT,
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Parse a capture size string into (width, height)
/// Supports: "hd" (1280x720), "wxga" (1366x768), "fhd" (1920x1080), "qhd" (2560x1440), or "WxH"
pub fn parse_video_size(size: &str) -> Option<(u32, u32)> {
    match size.to_lowercase().as_str() {
        "hd" | "720p" => Some((1280, 720)),
        "wxga" => Some((1366, 768)),
        "fhd" | "1080p" => Some((1920, 1080)),
        "qhd" | "1440p" => Some((2560, 1440)),
        custom => {
            let (w, h) = custom.split_once('x')?;
            let w: u32 = w.parse().ok()?;
            let h: u32 = h.parse().ok()?;
            if w == 0 || h == 0 {
                return None;
            }
            Some((w, h))
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Get the recordings directory (convenience function)
pub fn output_dir() -> String {
    get().recording.output_dir.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_size_presets() {
        assert_eq!(parse_video_size("hd"), Some((1280, 720)));
        assert_eq!(parse_video_size("wxga"), Some((1366, 768)));
        assert_eq!(parse_video_size("FHD"), Some((1920, 1080)));
        assert_eq!(parse_video_size("qhd"), Some((2560, 1440)));
    }

    #[test]
    fn test_parse_video_size_custom() {
        assert_eq!(parse_video_size("1366x768"), Some((1366, 768)));
        assert_eq!(parse_video_size("800x600"), Some((800, 600)));
    }

    #[test]
    fn test_parse_video_size_invalid() {
        assert_eq!(parse_video_size("invalid"), None);
        assert_eq!(parse_video_size("1366"), None);
        assert_eq!(parse_video_size("0x768"), None);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag("TRUE"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("nope"));
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::defaults();
        assert_eq!(config.recorder.program, DEFAULT_RECORDER);
        assert_eq!(config.recorder.framerate, DEFAULT_FRAMERATE);
        assert_eq!(
            (config.recorder.video_width, config.recorder.video_height),
            (1366, 768)
        );
        assert_eq!(config.recording.output_dir, DEFAULT_OUTPUT_DIR);
        assert_eq!(config.recording.mode, RecordingMode::Required);
        assert!(!config.recording.keep);
    }
}
