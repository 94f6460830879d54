//! Capture Harness - UI automation tests with screen recording.
//!
//! This crate provides:
//! - A single-threaded UI context that owns the window and its widgets
//! - Launching and closing an application as a per-run resource
//! - Screen recording of each run through an external recorder (ffmpeg)
//! - Retention of recordings: deleted on pass, kept with a manifest on failure
//! - A small suite runner with text or JSON reports
//!
//! # Example
//!
//! ```rust,no_run
//! use capture_harness::{CalculatorApp, HarnessConfig, Scenario, run_scenario};
//!
//! let config = HarnessConfig::default();
//! match run_scenario(CalculatorApp::new(), &Scenario::default(), &config) {
//!     Ok(outcome) => println!("result: {}", outcome.actual),
//!     Err(failure) => eprintln!("{} (recording: {:?})", failure, failure.recording),
//! }
//! ```

pub mod config;
pub mod demo;
pub mod harness;
pub mod logging;
pub mod recorder;
pub mod runner;
pub mod session;
pub mod ui;

// Re-export harness types
pub use harness::{
    FieldInput, HarnessConfig, HarnessError, HarnessResult, RecordingMode, RunOutcome, Scenario,
    TestFailure, Timeouts, run_scenario,
};

// Re-export runner types
pub use runner::{CalculatorTest, PlaceholderTest, Suite, SuiteReport, TestCase, TestReport, TestStatus};

// Re-export recording
pub use recorder::{CaptureSize, RecorderConfig, ScreenRecorder};
pub use session::{RecordingSession, RecordingState, cleanup_old_recordings, list_recordings};

// Re-export the UI context and the demo app
pub use demo::{CalculatorApp, CalculatorViewModel};
pub use ui::{AppLifetime, Application, UiContext, UiDispatcher, WidgetHandle, WidgetKind, Window};
