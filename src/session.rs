//! Recording sessions: one screen recording per harness run.
//!
//! Provides:
//! - Unique, timestamp-derived recording paths
//! - Ownership of the recorder process for the length of a run
//! - Retention: delete the video when the run passed, keep it (with a JSON
//!   manifest next to it) when it failed
//! - Listing and age-based cleanup of kept recordings

use chrono::{DateTime, Local, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use tracing::{debug, error, info, warn};

use crate::harness::{HarnessConfig, HarnessError, HarnessResult, RecordingMode};
use crate::recorder::ScreenRecorder;

/// File extension of recordings
pub const RECORDING_EXTENSION: &str = "mov";

/// File extension of failure manifests written next to kept recordings
pub const MANIFEST_EXTENSION: &str = "json";

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Lifecycle state of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    /// Recorder process running
    Running,
    /// Recorder stopped; the file is final
    Stopped,
    /// No recorder for this run (mode off, or best-effort start failure)
    Disabled,
}

/// The recorder bound to one run plus the file it writes
#[derive(Debug)]
pub struct RecordingSession {
    /// Name of the run, used in the manifest
    name: String,
    path: PathBuf,
    recorder: Option<ScreenRecorder>,
    state: RecordingState,
    stop_timeout: Duration,
    started: DateTime<Utc>,
}

impl RecordingSession {
    /// Derive the output path and start recording according to `config.recording`.
    ///
    /// With `RecordingMode::Required` a recorder that cannot start is an error
    /// and nothing else should run; with `BestEffort` the session is disabled.
    pub fn start(name: &str, config: &HarnessConfig) -> HarnessResult<Self> {
        let mut session = Self {
            name: name.to_string(),
            path: config.output_dir.join(format!("{}.{}", sanitize_name(name), RECORDING_EXTENSION)),
            recorder: None,
            state: RecordingState::Disabled,
            stop_timeout: config.timeouts.recorder_stop,
            started: Utc::now(),
        };

        if config.recording == RecordingMode::Off {
            info!(test = name, "recording off");
            return Ok(session);
        }

        let mut claimed = false;
        let started = fs::create_dir_all(&config.output_dir)
            .map_err(|source| HarnessError::FileHandling {
                path: config.output_dir.clone(),
                source,
            })
            .and_then(|_| {
                session.path = unique_recording_path(&config.output_dir, name);
                claimed = true;
                ScreenRecorder::start(&config.recorder, &session.path)
            });

        match started {
            Ok(recorder) => {
                session.recorder = Some(recorder);
                session.state = RecordingState::Running;
                Ok(session)
            }
            Err(err) => {
                // A recorder that died during startup may have left a partial file
                if claimed {
                    discard_partial(&session.path);
                }
                if config.recording == RecordingMode::BestEffort {
                    warn!(test = name, "recording disabled: {}", err);
                    Ok(session)
                } else {
                    error!(test = name, "failed to start recording: {}", err);
                    Err(err)
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Running
    }

    /// Stop the recorder and wait for it to exit. Errors are logged, never
    /// returned.
    pub fn stop(&mut self) {
        if let Some(recorder) = self.recorder.take() {
            if let Err(err) = recorder.stop(self.stop_timeout) {
                warn!("Failed to stop recording: {}", err);
            }
            self.state = RecordingState::Stopped;
        }
    }

    /// Stop recording, then apply retention: a passing run (`failure` is
    /// `None`) deletes its video unless `keep` is set; a failing run keeps it
    /// and writes a manifest. Returns the path of a video left on disk.
    pub fn finish(mut self, failure: Option<&HarnessError>, keep: bool) -> Option<PathBuf> {
        self.stop();
        if self.state == RecordingState::Disabled {
            return None;
        }

        match fs::metadata(&self.path) {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "recorder produced no file");
                return None;
            }
            Err(source) => {
                let err = HarnessError::FileHandling {
                    path: self.path.clone(),
                    source,
                };
                warn!("Failed to handle video file: {}", err);
                return None;
            }
        }

        match failure {
            None if !keep => match fs::remove_file(&self.path) {
                Ok(()) => {
                    info!(path = %self.path.display(), "test passed, recording deleted");
                    None
                }
                Err(source) => {
                    let err = HarnessError::FileHandling {
                        path: self.path.clone(),
                        source,
                    };
                    warn!("Failed to handle video file: {}", err);
                    Some(self.path.clone())
                }
            },
            None => {
                info!(path = %self.path.display(), "recording kept");
                Some(self.path.clone())
            }
            Some(failure) => {
                if let Err(err) = self.write_manifest(failure) {
                    warn!("Failed to write recording manifest: {}", err);
                }
                info!("Test failed. Video saved at: {}", self.path.display());
                Some(self.path.clone())
            }
        }
    }

    /// Path of the manifest written next to a kept recording
    pub fn manifest_path(&self) -> PathBuf {
        self.path.with_extension(MANIFEST_EXTENSION)
    }

    fn write_manifest(&self, failure: &HarnessError) -> HarnessResult<()> {
        let manifest = serde_json::json!({
            "test": self.name,
            "error": failure.to_string(),
            "recording": self.path,
            "started": self.started.to_rfc3339(),
            "finished": Utc::now().to_rfc3339(),
            "host": host_name(),
        });
        fs::write(self.manifest_path(), serde_json::to_string_pretty(&manifest)?)?;
        Ok(())
    }
}

/// A fresh recording path in `dir`:
/// `<name>_<YYYYmmdd_HHMMSS>_<millis>_<pid>_<seq>.mov`.
///
/// Millisecond resolution, the process id and an in-process sequence keep
/// names apart across rapid runs and concurrent processes; an existing file
/// is skipped.
pub fn unique_recording_path(dir: &Path, name: &str) -> PathBuf {
    let now = Local::now();
    let stem = format!(
        "{}_{}_{:03}_{}",
        sanitize_name(name),
        now.format("%Y%m%d_%H%M%S"),
        now.timestamp_subsec_millis(),
        std::process::id()
    );
    loop {
        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let path = dir.join(format!("{}_{}.{}", stem, seq, RECORDING_EXTENSION));
        if !path.exists() {
            return path;
        }
    }
}

fn discard_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed partial recording"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(source) => {
            let err = HarnessError::FileHandling {
                path: path.to_path_buf(),
                source,
            };
            warn!("Failed to handle video file: {}", err);
        }
    }
}

/// Host name for reports, `unknown` when it cannot be read
pub fn host_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Sanitize a name for use in filenames
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}

fn is_recording(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .map(|e| e == RECORDING_EXTENSION)
            .unwrap_or(false)
}

/// List kept recordings in `dir`, sorted by name
pub fn list_recordings(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut recordings = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if is_recording(&path) {
            recordings.push(path);
        }
    }
    recordings.sort();
    Ok(recordings)
}

/// Delete recordings (and their manifests) older than `max_age`.
/// Returns the number of recordings removed.
pub fn cleanup_old_recordings(dir: &Path, max_age: Duration) -> std::io::Result<usize> {
    let now = SystemTime::now();
    let mut cleaned = 0;

    for path in list_recordings(dir)? {
        let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => continue,
        };
        let age = match now.duration_since(modified) {
            Ok(age) => age,
            Err(_) => continue,
        };
        if age > max_age && fs::remove_file(&path).is_ok() {
            let _ = fs::remove_file(path.with_extension(MANIFEST_EXTENSION));
            cleaned += 1;
        }
    }

    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_unique_paths_in_rapid_succession() {
        let dir = tempfile::tempdir().unwrap();
        let paths: HashSet<PathBuf> = (0..100)
            .map(|_| unique_recording_path(dir.path(), "CalculatorTest"))
            .collect();
        assert_eq!(paths.len(), 100);
    }

    #[test]
    fn test_recording_path_format() {
        let path = unique_recording_path(Path::new("/videos"), "Calculator Test");
        let file = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(path.starts_with("/videos"));
        assert!(file.starts_with("Calculator_Test_"));
        assert!(file.ends_with(".mov"));
    }

    #[test]
    fn test_existing_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let first = unique_recording_path(dir.path(), "t");
        fs::write(&first, b"x").unwrap();
        let second = unique_recording_path(dir.path(), "t");
        assert_ne!(first, second);
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("hello world"), "hello_world");
        assert_eq!(sanitize_name("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_name("CalculatorTest"), "CalculatorTest");
    }

    #[test]
    fn test_list_and_cleanup_recordings() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.mov"), b"x").unwrap();
        fs::write(dir.path().join("a.mov"), b"x").unwrap();
        fs::write(dir.path().join("a.json"), b"{}").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let listed = list_recordings(dir.path()).unwrap();
        assert_eq!(listed, vec![dir.path().join("a.mov"), dir.path().join("b.mov")]);

        assert_eq!(cleanup_old_recordings(dir.path(), Duration::from_secs(3600)).unwrap(), 0);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cleanup_old_recordings(dir.path(), Duration::ZERO).unwrap(), 2);
        assert!(!dir.path().join("a.json").exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    fn session_config(dir: &Path, recorder: crate::recorder::RecorderConfig) -> HarnessConfig {
        HarnessConfig {
            output_dir: dir.to_path_buf(),
            recorder,
            recording: RecordingMode::Required,
            ..HarnessConfig::default()
        }
    }

    #[cfg(unix)]
    fn shell_recorder(script: &str) -> crate::recorder::RecorderConfig {
        crate::recorder::RecorderConfig::custom(
            "sh",
            vec![
                "-c".into(),
                script.into(),
                "sh".into(),
                crate::recorder::OUTPUT_PLACEHOLDER.into(),
            ],
        )
        .startup_grace(Duration::from_secs(2))
    }

    #[cfg(unix)]
    #[test]
    fn test_session_lifecycle_on_pass() {
        let dir = tempfile::tempdir().unwrap();
        let config = session_config(dir.path(), shell_recorder("printf frame > \"$1\"; exec sleep 30"));

        let session = RecordingSession::start("CalculatorTest", &config).unwrap();
        assert!(session.is_recording());
        assert_eq!(session.state(), RecordingState::Running);
        assert!(session.path().starts_with(dir.path()));
        let path = session.path().to_path_buf();
        assert!(path.exists());

        assert_eq!(session.finish(None, false), None);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_start_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = session_config(dir.path(), shell_recorder("printf frame > \"$1\"; exit 1"));

        let err = RecordingSession::start("CalculatorTest", &config).unwrap_err();
        assert!(matches!(err, HarnessError::RecordingExited { .. }), "got {:?}", err);
        assert!(list_recordings(dir.path()).unwrap().is_empty());

        config.recording = RecordingMode::BestEffort;
        let session = RecordingSession::start("CalculatorTest", &config).unwrap();
        assert_eq!(session.state(), RecordingState::Disabled);
        assert!(!session.is_recording());
        assert!(list_recordings(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_recording_off_is_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig {
            recording: RecordingMode::Off,
            ..session_config(dir.path(), crate::recorder::RecorderConfig::default())
        };
        let session = RecordingSession::start("CalculatorTest", &config).unwrap();
        assert_eq!(session.state(), RecordingState::Disabled);
        assert_eq!(session.finish(Some(&HarnessError::WindowClosed), false), None);
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        assert!(list_recordings(Path::new("/nonexistent/capture-harness")).unwrap().is_empty());
    }
}
