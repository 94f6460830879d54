//! Screen recorder subprocess.
//!
//! Wraps an external capture tool (ffmpeg's `x11grab` by default) that writes
//! one video file for the lifetime of a run. Stopping sends SIGINT first so
//! the container is finalized, then falls back to a hard kill.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config;
use crate::harness::{HarnessError, HarnessResult};

/// Placeholder replaced by the output path in recorder arguments
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Upper bound for reaping a killed recorder on drop
const DROP_REAP_TIMEOUT: Duration = Duration::from_secs(2);

/// Capture area in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSize {
    pub width: u32,
    pub height: u32,
}

impl CaptureSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Parse from string (e.g., "1366x768", "fhd")
    pub fn from_str(s: &str) -> Option<Self> {
        config::parse_video_size(s).map(|(width, height)| Self { width, height })
    }

    /// ffmpeg `-video_size` value
    pub fn to_arg(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

impl Default for CaptureSize {
    fn default() -> Self {
        Self::new(config::DEFAULT_VIDEO_WIDTH, config::DEFAULT_VIDEO_HEIGHT)
    }
}

/// Command line of the screen recorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderConfig {
    /// Recorder binary
    pub program: String,

    /// Arguments; `{output}` is replaced by the recording path
    pub args: Vec<String>,

    /// Maximum time to wait for the recorder to create its output file.
    /// The recorder exiting inside this window is a start failure.
    pub startup_grace: Duration,
}

impl RecorderConfig {
    /// ffmpeg grabbing an X11 display into an H.264 file
    pub fn ffmpeg(
        program: impl Into<String>,
        display: &str,
        size: CaptureSize,
        framerate: u32,
    ) -> Self {
        let args = vec![
            "-f".to_string(),
            "x11grab".to_string(),
            "-video_size".to_string(),
            size.to_arg(),
            "-framerate".to_string(),
            framerate.to_string(),
            "-i".to_string(),
            display.to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "ultrafast".to_string(),
            "-crf".to_string(),
            "18".to_string(),
            OUTPUT_PLACEHOLDER.to_string(),
        ];

        Self {
            program: program.into(),
            args,
            startup_grace: Duration::from_millis(500),
        }
    }

    /// Any program with an argument template containing `{output}`
    pub fn custom(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            startup_grace: Duration::from_millis(500),
        }
    }

    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    /// Arguments with the output placeholder substituted
    pub fn resolve_args(&self, output: &Path) -> Vec<String> {
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace(OUTPUT_PLACEHOLDER, &output))
            .collect()
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        let cfg = &config::get().recorder;
        Self::ffmpeg(
            cfg.program.clone(),
            &cfg.display,
            CaptureSize::new(cfg.video_width, cfg.video_height),
            cfg.framerate,
        )
    }
}

/// A running recorder process writing to `output`
#[derive(Debug)]
pub struct ScreenRecorder {
    child: Child,
    program: String,
    output: PathBuf,
}

impl ScreenRecorder {
    /// Spawn the recorder and wait until it has created its output file,
    /// the startup grace expires, or it exits (an error).
    pub fn start(config: &RecorderConfig, output: &Path) -> HarnessResult<Self> {
        let args = config.resolve_args(output);
        debug!(program = %config.program, ?args, "spawning recorder");

        let child = Command::new(&config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| HarnessError::RecordingStart {
                program: config.program.clone(),
                source,
            })?;

        let mut recorder = Self {
            child,
            program: config.program.clone(),
            output: output.to_path_buf(),
        };
        recorder.await_startup(config.startup_grace)?;

        info!(pid = recorder.pid(), output = %output.display(), "recording started");
        Ok(recorder)
    }

    fn await_startup(&mut self, grace: Duration) -> HarnessResult<()> {
        let start = Instant::now();
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Err(HarnessError::RecordingExited {
                    program: self.program.clone(),
                    status: status.to_string(),
                });
            }
            if self.output.exists() {
                // It must outlive its first frame
                thread::sleep(POLL_INTERVAL);
                if let Some(status) = self.child.try_wait()? {
                    return Err(HarnessError::RecordingExited {
                        program: self.program.clone(),
                        status: status.to_string(),
                    });
                }
                return Ok(());
            }
            if start.elapsed() >= grace {
                debug!(output = %self.output.display(), "recorder has not created its output yet");
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Whether the process is still alive
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Stop the recorder and wait for it to exit.
    ///
    /// Sends SIGINT and waits up to `timeout`; a recorder still alive after
    /// that is killed. Returns the exit status once the process is gone.
    pub fn stop(mut self, timeout: Duration) -> HarnessResult<ExitStatus> {
        if let Some(status) = self.child.try_wait()? {
            warn!(%status, "recorder exited before it was stopped");
            return Ok(status);
        }

        if let Err(err) = self.interrupt() {
            warn!("failed to interrupt recorder: {}", err);
        } else if let Some(status) = self.wait_timeout(timeout)? {
            info!(%status, "recording stopped");
            return Ok(status);
        }

        warn!(pid = self.pid(), "recorder did not exit after {:?}, killing", timeout);
        self.child.kill().map_err(|e| HarnessError::RecordingStop {
            details: format!("kill failed: {}", e),
        })?;
        let status = self.child.wait().map_err(|e| HarnessError::RecordingStop {
            details: format!("wait after kill failed: {}", e),
        })?;
        Ok(status)
    }

    #[cfg(unix)]
    fn interrupt(&self) -> HarnessResult<()> {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        kill(Pid::from_raw(self.child.id() as i32), Signal::SIGINT).map_err(|e| {
            HarnessError::RecordingStop {
                details: format!("SIGINT failed: {}", e),
            }
        })
    }

    #[cfg(not(unix))]
    fn interrupt(&self) -> HarnessResult<()> {
        Err(HarnessError::RecordingStop {
            details: "graceful stop is not supported on this platform".to_string(),
        })
    }

    fn wait_timeout(&mut self, timeout: Duration) -> HarnessResult<Option<ExitStatus>> {
        let start = Instant::now();
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Ok(Some(status));
            }
            if start.elapsed() >= timeout {
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Drop for ScreenRecorder {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            match self.child.kill() {
                Ok(()) => {
                    if let Ok(None) = self.wait_timeout(DROP_REAP_TIMEOUT) {
                        warn!(pid = self.pid(), "recorder still running after kill");
                    }
                }
                Err(err) => warn!(pid = self.pid(), "failed to kill recorder: {}", err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_arguments() {
        let config = RecorderConfig::ffmpeg("/usr/bin/ffmpeg", ":0.0", CaptureSize::new(1366, 768), 25);
        let args = config.resolve_args(Path::new("/tmp/run.mov"));
        assert_eq!(
            args,
            vec![
                "-f", "x11grab", "-video_size", "1366x768", "-framerate", "25", "-i", ":0.0",
                "-c:v", "libx264", "-preset", "ultrafast", "-crf", "18", "/tmp/run.mov",
            ]
        );
    }

    #[test]
    fn test_placeholder_inside_argument() {
        let config = RecorderConfig::custom("sh", vec!["-c".into(), "touch '{output}'".into()]);
        let args = config.resolve_args(Path::new("/tmp/a b.mov"));
        assert_eq!(args[1], "touch '/tmp/a b.mov'");
    }

    #[test]
    fn test_capture_size_from_str() {
        assert_eq!(CaptureSize::from_str("1280x720"), Some(CaptureSize::new(1280, 720)));
        assert_eq!(CaptureSize::from_str("wxga").map(|s| s.to_arg()), Some("1366x768".to_string()));
        assert_eq!(CaptureSize::from_str("wide"), None);
    }

    #[test]
    fn test_missing_program_is_start_failure() {
        let config = RecorderConfig::custom("/nonexistent/recorder", vec![OUTPUT_PLACEHOLDER.into()]);
        let err = ScreenRecorder::start(&config, Path::new("/tmp/never.mov")).unwrap_err();
        assert!(matches!(err, HarnessError::RecordingStart { .. }), "got {:?}", err);
    }

    #[cfg(unix)]
    #[test]
    fn test_early_exit_is_start_failure() {
        let config = RecorderConfig::custom("sh", vec!["-c".into(), "exit 3".into()])
            .startup_grace(Duration::from_secs(2));
        let err = ScreenRecorder::start(&config, Path::new("/tmp/never-written.mov")).unwrap_err();
        assert!(matches!(err, HarnessError::RecordingExited { .. }), "got {:?}", err);
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_after_first_frame_is_start_failure() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("short.mov");
        let config = RecorderConfig::custom(
            "sh",
            vec![
                "-c".into(),
                "printf frame > \"$1\"; exit 1".into(),
                "sh".into(),
                OUTPUT_PLACEHOLDER.into(),
            ],
        )
        .startup_grace(Duration::from_secs(2));

        let err = ScreenRecorder::start(&config, &output).unwrap_err();
        assert!(matches!(err, HarnessError::RecordingExited { .. }), "got {:?}", err);
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_interrupts_running_recorder() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("capture.mov");
        let config = RecorderConfig::custom(
            "sh",
            vec![
                "-c".into(),
                "printf frame > \"$1\"; exec sleep 30".into(),
                "sh".into(),
                OUTPUT_PLACEHOLDER.into(),
            ],
        )
        .startup_grace(Duration::from_secs(2));

        let mut recorder = ScreenRecorder::start(&config, &output).unwrap();
        assert!(recorder.is_running());
        assert_eq!(recorder.output(), output.as_path());
        assert!(output.exists());

        let started = Instant::now();
        recorder.stop(Duration::from_secs(5)).unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn test_drop_kills_running_recorder() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("dropped.mov");
        let config = RecorderConfig::custom(
            "sh",
            vec!["-c".into(), "exec sleep 30".into()],
        )
        .startup_grace(Duration::from_millis(100));

        let recorder = ScreenRecorder::start(&config, &output).unwrap();
        let pid = nix::unistd::Pid::from_raw(recorder.pid() as i32);

        let started = Instant::now();
        drop(recorder);
        assert!(started.elapsed() < DROP_REAP_TIMEOUT);
        // Reaped: the pid no longer refers to our child
        assert!(nix::sys::signal::kill(pid, None).is_err());
    }
}
