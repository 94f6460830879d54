pub mod scenario;
pub mod types;

pub use scenario::{RunOutcome, run_scenario};
pub use types::{
    FieldInput, HarnessConfig, HarnessError, HarnessResult, RecordingMode, Scenario, TestFailure,
    Timeouts,
};
