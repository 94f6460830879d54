use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::harness::types::{
    HarnessConfig, HarnessError, HarnessResult, Scenario, TestFailure, Timeouts,
};
use crate::session::RecordingSession;
use crate::ui::{AppLifetime, Application, UiContext, WidgetHandle, WidgetKind};

/// A passing run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub scenario: String,

    /// Text the output label showed
    pub actual: String,

    /// Recording left on disk (only with `keep_recordings`)
    pub recording: Option<PathBuf>,
}

/// Runs one scenario against a freshly launched `app`, recording the screen.
///
/// Order: start recorder, launch, interact, then teardown (stop recorder,
/// keep or delete the video, close the app). Teardown always runs exactly
/// once; an interaction error is returned only after it completes.
pub fn run_scenario<A: Application>(
    app: A,
    scenario: &Scenario,
    config: &HarnessConfig,
) -> Result<RunOutcome, TestFailure> {
    let started = Instant::now();
    info!(scenario = %scenario.name, "starting run");

    let session = RecordingSession::start(&scenario.name, config)?;

    let (lifetime, result) = match AppLifetime::launch(app, config.timeouts.launch) {
        Ok(lifetime) => {
            let result = interact(&lifetime, scenario, &config.timeouts);
            (Some(lifetime), result)
        }
        Err(err) => (None, Err(err)),
    };

    if let Err(err) = &result {
        error!(scenario = %scenario.name, "Test failed: {}", err);
    }

    let recording = session.finish(result.as_ref().err(), config.keep_recordings);

    if let Some(mut lifetime) = lifetime {
        if let Err(err) = lifetime.close(config.timeouts.shutdown) {
            warn!("failed to close application: {}", err);
        }
    }

    debug!(scenario = %scenario.name, "run finished after {:?}", started.elapsed());

    match result {
        Ok(actual) => Ok(RunOutcome {
            scenario: scenario.name.clone(),
            actual,
            recording,
        }),
        Err(error) => Err(TestFailure { error, recording }),
    }
}

/// Drive the widgets and check the output. Returns the output text.
fn interact(lifetime: &AppLifetime, scenario: &Scenario, timeouts: &Timeouts) -> HarnessResult<String> {
    let dispatcher = lifetime.dispatcher();

    info!("Starting UI interactions...");
    let job = scenario.clone();
    let (completion, output) = dispatcher.invoke(timeouts.dispatch, move |ctx| drive(ctx, &job))??;

    wait_for_activation(&completion, timeouts)?;
    dispatcher.wait_for_idle(timeouts.idle)?;

    info!("Checking result...");
    let actual = dispatcher.invoke(timeouts.dispatch, move |ctx| ctx.window().text(&output))??;

    if actual != scenario.expected {
        return Err(HarnessError::AssertionMismatch {
            widget: scenario.output.clone(),
            expected: scenario.expected.clone(),
            actual,
        });
    }
    Ok(actual)
}

/// Runs on the UI thread: look up every widget, then fail on the first
/// missing one (inputs, trigger, output) before touching any of them.
/// Returns the completion signal and the output handle.
fn drive(ctx: &mut UiContext, scenario: &Scenario) -> HarnessResult<(Receiver<()>, WidgetHandle)> {
    let window = ctx.window();
    let inputs: Vec<_> = scenario
        .inputs
        .iter()
        .map(|input| window.find(&input.widget, WidgetKind::TextBox))
        .collect();
    let trigger = window.find(&scenario.trigger, WidgetKind::Button);
    let output = window.find(&scenario.output, WidgetKind::TextBlock);

    let missing = inputs
        .iter()
        .chain([&trigger, &output])
        .filter(|found| found.is_err())
        .count();
    debug!(resolved = inputs.len() + 2 - missing, missing, "widgets looked up");

    let inputs = inputs.into_iter().collect::<HarnessResult<Vec<_>>>()?;
    let trigger = trigger?;
    let output = output?;

    info!("Interacting with UI elements...");
    for (handle, input) in inputs.iter().zip(&scenario.inputs) {
        ctx.window_mut().set_text(handle, input.text.clone())?;
    }

    let (tx, rx) = bounded(1);
    ctx.window_mut().on_activated_once(&trigger, move |_| {
        let _ = tx.try_send(());
    })?;
    ctx.raise_activated(&trigger)?;

    Ok((rx, output))
}

fn wait_for_activation(completion: &Receiver<()>, timeouts: &Timeouts) -> HarnessResult<()> {
    match completion.recv_timeout(timeouts.activation) {
        Ok(()) => Ok(()),
        Err(RecvTimeoutError::Timeout) => Err(HarnessError::Timeout {
            operation: "activation notification",
            after: timeouts.activation,
        }),
        Err(RecvTimeoutError::Disconnected) => Err(HarnessError::Failed(
            "activation handler was dropped before it fired".to_string(),
        )),
    }
}
