use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::config;
use crate::recorder::RecorderConfig;
use crate::ui::WidgetKind;

/// Text typed into one input field before the trigger is activated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInput {
    /// Identifier of the text box
    pub widget: String,

    /// Literal text to place in the field
    pub text: String,
}

impl FieldInput {
    pub fn new(widget: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            widget: widget.into(),
            text: text.into(),
        }
    }
}

/// One interaction against a running application: fill inputs, activate a
/// trigger, compare an output label with an expected value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Name used for the recording file and reports
    pub name: String,

    /// Input fields, resolved and filled in order
    pub inputs: Vec<FieldInput>,

    /// Identifier of the button to activate
    pub trigger: String,

    /// Identifier of the label holding the result
    pub output: String,

    /// Text the output label must show after activation
    pub expected: String,
}

impl Scenario {
    /// The calculator addition check: `first + second` must display `expected`.
    pub fn calculator_addition(
        first: impl Into<String>,
        second: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self {
            name: "CalculatorTest".to_string(),
            inputs: vec![
                FieldInput::new("FirstNumberTextBox", first),
                FieldInput::new("SecondNumberTextBox", second),
            ],
            trigger: "AddCommand".to_string(),
            output: "ResultTextBlock".to_string(),
            expected: expected.into(),
        }
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::calculator_addition("6", "3", "9")
    }
}

/// What to do when the screen recorder cannot be started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordingMode {
    /// A recorder start failure aborts the run before the app is launched
    #[default]
    Required,
    /// A recorder start failure is logged and the run continues unrecorded
    BestEffort,
    /// Never start a recorder
    Off,
}

impl RecordingMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "required" | "on" | "true" => Some(RecordingMode::Required),
            "best-effort" | "besteffort" | "optional" => Some(RecordingMode::BestEffort),
            "off" | "none" | "false" => Some(RecordingMode::Off),
            _ => None,
        }
    }
}

/// Upper bounds for every blocking wait in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Window built and UI queue idle after launch
    pub launch: Duration,
    /// Completion signal after the trigger is raised
    pub activation: Duration,
    /// UI queue drained after activation
    pub idle: Duration,
    /// Single `invoke` round trip onto the UI thread
    pub dispatch: Duration,
    /// Window close and UI thread exit
    pub shutdown: Duration,
    /// Recorder exit after the stop signal
    pub recorder_stop: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            launch: Duration::from_secs(5),
            activation: Duration::from_secs(config::get().harness.activation_timeout),
            idle: Duration::from_secs(2),
            dispatch: Duration::from_secs(5),
            shutdown: Duration::from_secs(5),
            recorder_stop: Duration::from_secs(5),
        }
    }
}

/// Configuration for the harness execution
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Directory where recordings are written
    pub output_dir: PathBuf,

    /// Recorder command line
    pub recorder: RecorderConfig,

    /// Policy for recorder start failures
    pub recording: RecordingMode,

    /// Keep the recording even when the test passes
    pub keep_recordings: bool,

    pub timeouts: Timeouts,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let cfg = config::get();
        Self {
            output_dir: PathBuf::from(&cfg.recording.output_dir),
            recorder: RecorderConfig::default(),
            recording: cfg.recording.mode,
            keep_recordings: cfg.recording.keep,
            timeouts: Timeouts::default(),
        }
    }
}

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Error types for harness operations
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A required widget identifier resolved to nothing
    #[error("{name} {noun} not found.", noun = .kind.noun())]
    WidgetNotFound { name: String, kind: WidgetKind },

    #[error("{name} is a {found:?}, expected a {expected:?}")]
    WidgetKindMismatch {
        name: String,
        expected: WidgetKind,
        found: WidgetKind,
    },

    #[error("{widget} shows {actual:?}, expected {expected:?}")]
    AssertionMismatch {
        widget: String,
        expected: String,
        actual: String,
    },

    #[error("failed to start recorder '{program}': {source}")]
    RecordingStart {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("recorder '{program}' exited during startup ({status})")]
    RecordingExited { program: String, status: String },

    #[error("failed to stop recorder: {details}")]
    RecordingStop { details: String },

    #[error("failed to handle recording {path}: {source}")]
    FileHandling {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {after:?} waiting for {operation}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("application window is closed")]
    WindowClosed,

    #[error("UI thread is no longer running")]
    UiThreadGone,

    #[error("UI job panicked: {0}")]
    UiJobPanicked(String),

    #[error("failed to launch application: {0}")]
    Launch(String),

    #[error("{0}")]
    Failed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A failed run: the error that ended it plus the recording kept for inspection
#[derive(Debug, Error)]
#[error("{error}")]
pub struct TestFailure {
    #[source]
    pub error: HarnessError,

    /// Recording retained on disk, if one was made
    pub recording: Option<PathBuf>,
}

impl TestFailure {
    pub fn new(error: HarnessError) -> Self {
        Self {
            error,
            recording: None,
        }
    }
}

impl From<HarnessError> for TestFailure {
    fn from(error: HarnessError) -> Self {
        TestFailure::new(error)
    }
}
