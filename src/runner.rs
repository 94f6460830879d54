//! Test cases and the suite that runs them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::Instant;

use tracing::{error, info};

use crate::demo::CalculatorApp;
use crate::harness::{HarnessConfig, HarnessError, Scenario, TestFailure, run_scenario};
use crate::session::host_name;
use crate::ui::dispatcher::panic_message;

/// Message of the placeholder test
pub const PLACEHOLDER_MESSAGE: &str = "This is a fake test that fails.";

/// One runnable test
pub trait TestCase {
    fn name(&self) -> &str;

    /// Run the test. On success, returns a recording left on disk, if any.
    fn run(&self) -> Result<Option<PathBuf>, TestFailure>;
}

/// Drives the calculator: fill both operands, press add, check the result.
#[derive(Debug, Clone)]
pub struct CalculatorTest {
    scenario: Scenario,
    config: HarnessConfig,
}

impl CalculatorTest {
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            scenario: Scenario::default(),
            config,
        }
    }

    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenario = scenario;
        self
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }
}

impl TestCase for CalculatorTest {
    fn name(&self) -> &str {
        &self.scenario.name
    }

    fn run(&self) -> Result<Option<PathBuf>, TestFailure> {
        run_scenario(CalculatorApp::new(), &self.scenario, &self.config).map(|outcome| outcome.recording)
    }
}

/// Always fails. Keeps the failure path of the pipeline visible.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderTest;

impl TestCase for PlaceholderTest {
    fn name(&self) -> &str {
        "FakeTest_Fail"
    }

    fn run(&self) -> Result<Option<PathBuf>, TestFailure> {
        Err(HarnessError::Failed(PLACEHOLDER_MESSAGE.to_string()).into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
}

/// Result of a single test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    pub name: String,

    pub status: TestStatus,

    /// Failure message (None when passed)
    pub message: Option<String>,

    /// Recording left on disk
    pub recording: Option<PathBuf>,

    pub duration_ms: u64,
}

impl TestReport {
    pub fn passed(&self) -> bool {
        self.status == TestStatus::Passed
    }
}

/// Result of a complete suite run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub host: String,

    pub started: DateTime<Utc>,

    pub results: Vec<TestReport>,
}

impl SuiteReport {
    /// True when every test passed
    pub fn success(&self) -> bool {
        self.results.iter().all(TestReport::passed)
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.len() - self.passed_count()
    }

    pub fn get(&self, name: &str) -> Option<&TestReport> {
        self.results.iter().find(|r| r.name == name)
    }
}

/// An ordered list of independent test cases
#[derive(Default)]
pub struct Suite {
    cases: Vec<Box<dyn TestCase>>,
    only: Option<String>,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bundled suite: `CalculatorTest` then `FakeTest_Fail`
    pub fn standard(config: HarnessConfig) -> Self {
        Self::new()
            .with_case(CalculatorTest::new(config))
            .with_case(PlaceholderTest)
    }

    pub fn with_case(mut self, case: impl TestCase + 'static) -> Self {
        self.cases.push(Box::new(case));
        self
    }

    /// Run only the test with this name
    pub fn only(mut self, name: impl Into<String>) -> Self {
        self.only = Some(name.into());
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.cases.iter().map(|c| c.name()).collect()
    }

    /// Run every selected case. A panic in one case is reported as its
    /// failure and the next case still runs.
    pub fn run(&self) -> SuiteReport {
        let started = Utc::now();
        let results = self
            .cases
            .iter()
            .filter(|case| self.only.as_deref().is_none_or(|name| case.name() == name))
            .map(|case| run_case(case.as_ref()))
            .collect();

        SuiteReport {
            host: host_name(),
            started,
            results,
        }
    }
}

fn run_case(case: &dyn TestCase) -> TestReport {
    let name = case.name().to_string();
    info!(test = %name, "running");
    let started = Instant::now();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| case.run())).unwrap_or_else(|payload| {
        Err(HarnessError::Failed(format!("test panicked: {}", panic_message(payload))).into())
    });
    let duration_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(recording) => {
            info!(test = %name, "passed in {}ms", duration_ms);
            TestReport {
                name,
                status: TestStatus::Passed,
                message: None,
                recording,
                duration_ms,
            }
        }
        Err(failure) => {
            error!(test = %name, "failed: {}", failure);
            TestReport {
                name,
                status: TestStatus::Failed,
                message: Some(failure.error.to_string()),
                recording: failure.recording,
                duration_ms,
            }
        }
    }
}
