use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use capture_harness::config;
use capture_harness::harness::{HarnessConfig, RecordingMode, Scenario};
use capture_harness::runner::{CalculatorTest, PlaceholderTest, Suite, SuiteReport};
use capture_harness::session::{cleanup_old_recordings, list_recordings};
use capture_harness::logging;

/// Capture Harness - UI automation tests with screen recording
#[derive(Parser, Debug)]
#[command(
    name = "capture-harness",
    about = "Drive the calculator UI, record the screen, keep recordings of failed runs",
    after_help = "ENVIRONMENT VARIABLES:\n\
        CAPTURE_HARNESS_RECORDER            Screen recorder binary (default: /usr/bin/ffmpeg)\n\
        CAPTURE_HARNESS_OUTPUT_DIR          Directory for recordings\n\
        CAPTURE_HARNESS_DISPLAY             X display to capture\n\
        CAPTURE_HARNESS_VIDEO_SIZE          Capture size: hd, wxga, fhd, qhd, or WxH\n\
        CAPTURE_HARNESS_FRAMERATE           Frames per second\n\
        CAPTURE_HARNESS_RECORDING           required, best-effort, or off\n\
        CAPTURE_HARNESS_ACTIVATION_TIMEOUT  Seconds to wait for the add command\n\
        CAPTURE_HARNESS_KEEP                Keep recordings of passing runs\n\
        RUST_LOG                            Log filter (default: info)"
)]
struct Args {
    /// Log at debug level (ignored when RUST_LOG is set)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the test suite
    Run {
        /// Output results as JSON
        #[arg(long)]
        json: bool,

        /// Directory for recordings (default: CAPTURE_HARNESS_OUTPUT_DIR)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Keep recordings of passing runs too
        #[arg(long, short = 'k')]
        keep: bool,

        /// Screen recorder binary
        #[arg(long)]
        recorder: Option<String>,

        /// What to do when the recorder cannot start: required, best-effort, or off
        #[arg(long)]
        recording: Option<String>,

        /// Run only the test with this name
        #[arg(long)]
        only: Option<String>,

        /// First operand
        #[arg(long, default_value = "6")]
        first: String,

        /// Second operand
        #[arg(long, default_value = "3")]
        second: String,

        /// Expected result text
        #[arg(long, default_value = "9")]
        expected: String,
    },

    /// List kept recordings
    List {
        /// Directory to list (default: CAPTURE_HARNESS_OUTPUT_DIR)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Delete recordings older than the given age
    Clean {
        /// Directory to clean (default: CAPTURE_HARNESS_OUTPUT_DIR)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Maximum age in hours
        #[arg(long, default_value = "24")]
        max_age_hours: u64,
    },
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    let args = Args::parse();
    logging::init(args.verbose);

    match args.command {
        Some(Commands::Run {
            json,
            output_dir,
            keep,
            recorder,
            recording,
            only,
            first,
            second,
            expected,
        }) => {
            let mut config = HarnessConfig::default();
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if let Some(program) = recorder {
                config.recorder = config.recorder.program(program);
            }
            if let Some(mode) = recording {
                config.recording = RecordingMode::from_str(&mode).ok_or_else(|| {
                    format!("Invalid recording mode '{}'. Use: required, best-effort, or off", mode)
                })?;
            }
            config.keep_recordings |= keep;

            let scenario = Scenario::calculator_addition(first, second, expected);
            let mut suite = Suite::new()
                .with_case(CalculatorTest::new(config).with_scenario(scenario))
                .with_case(PlaceholderTest);
            if let Some(name) = only {
                if !suite.names().contains(&name.as_str()) {
                    return Err(format!("Unknown test '{}'. Available: {}", name, suite.names().join(", ")).into());
                }
                suite = suite.only(name);
            }

            let report = suite.run();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }

            return Ok(if report.success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        }

        Some(Commands::List { output_dir }) => {
            let dir = output_dir.unwrap_or_else(|| PathBuf::from(config::output_dir()));
            let recordings = list_recordings(&dir)?;
            if recordings.is_empty() {
                println!("No recordings in {}", dir.display());
            }
            for path in recordings {
                println!("{}", path.display());
            }
        }

        Some(Commands::Clean {
            output_dir,
            max_age_hours,
        }) => {
            let dir = output_dir.unwrap_or_else(|| PathBuf::from(config::output_dir()));
            let removed = cleanup_old_recordings(&dir, max_age(max_age_hours))?;
            println!("Removed {} recording(s) from {}", removed, dir.display());
        }

        None => {
            println!("Capture Harness - UI automation tests with screen recording");
            println!();
            println!("Usage: capture-harness <COMMAND>");
            println!();
            println!("Commands:");
            println!("  run    Run the test suite, recording each run");
            println!("  list   List kept recordings");
            println!("  clean  Delete old recordings");
            println!();
            println!("Run with --help for more information.");
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Age limit for `clean`; absurd hour counts clamp instead of overflowing
fn max_age(hours: u64) -> Duration {
    Duration::from_secs(hours.saturating_mul(3600))
}

fn print_report(report: &SuiteReport) {
    for result in &report.results {
        if result.passed() {
            println!("PASS  {} ({}ms)", result.name, result.duration_ms);
        } else {
            println!("FAIL  {} ({}ms)", result.name, result.duration_ms);
            if let Some(message) = &result.message {
                println!("      {}", message);
            }
        }
        if let Some(path) = &result.recording {
            println!("      Recording: {}", path.display());
        }
    }
    println!();
    println!(
        "{} passed, {} failed on {}",
        report.passed_count(),
        report.failed_count(),
        report.host
    );
}
