//! Correcaminos CLI - Command-line interface for the step tracker
//!
//! Commands:
//! - walk: Take manual steps and print the resulting progress
//! - run: Feed pedometer readings from NDJSON input (streaming mode)
//! - goal: Validate a daily step goal the way the goal editor does
//! - info: Open the information page about daily step targets
//! - doctor: Diagnose configuration and environment
//! - config: Print the default configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use correcaminos::goals::GoalEditor;
use correcaminos::link::{open_info_link, SystemBrowser};
use correcaminos::{
    HistoryLog, NdjsonSource, ProgressSnapshot, TrackerConfig, TrackerController, TrackerError,
    TrackerEvent, PRODUCER_NAME, TRACKER_VERSION,
};

/// Correcaminos - On-device step tracking core
#[derive(Parser)]
#[command(name = "correcaminos")]
#[command(author = "Synheart AI Inc")]
#[command(version = TRACKER_VERSION)]
#[command(about = "Count steps, calories and points toward a daily goal", long_about = None)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG also applies
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take manual steps and print the resulting progress
    Walk {
        /// Number of steps to take
        #[arg(short, long)]
        steps: u64,

        /// Daily step goal (overrides config)
        #[arg(long)]
        goal: Option<i64>,

        /// Also print the milestone history
        #[arg(long)]
        history: bool,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Feed pedometer readings from NDJSON input (streaming mode)
    Run {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Daily step goal (overrides config)
        #[arg(long)]
        goal: Option<i64>,

        /// Print every tracker event as NDJSON while running
        #[arg(long)]
        events: bool,

        /// Output format for the final snapshot
        #[arg(long, default_value = "json")]
        format: OutputFormat,
    },

    /// Validate a daily step goal
    Goal {
        /// Goal value as typed by the user
        #[arg(long)]
        steps: String,
    },

    /// Open the information page about daily step targets
    Info {
        /// Print the URL instead of opening it
        #[arg(long)]
        print: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default configuration as JSON
    Config,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable summary
    Text,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn setup_logging(level: &str) {
    let directive = match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => level.to_lowercase(),
        other => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to warn", other);
            "warn".to_string()
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .init();
}

async fn run(cli: Cli) -> Result<(), CorrecaminosCliError> {
    match cli.command {
        Commands::Walk {
            steps,
            goal,
            history,
            format,
        } => {
            let config = load_config(cli.config.as_deref(), goal)?;
            cmd_walk(&config, steps, history, format).await
        }

        Commands::Run {
            input,
            goal,
            events,
            format,
        } => {
            let config = load_config(cli.config.as_deref(), goal)?;
            cmd_run(&config, &input, events, format).await
        }

        Commands::Goal { steps } => cmd_goal(&steps),

        Commands::Info { print } => {
            let config = load_config(cli.config.as_deref(), None)?;
            cmd_info(&config, print)
        }

        Commands::Doctor { json } => cmd_doctor(cli.config.as_deref(), json),

        Commands::Config => {
            println!("{}", TrackerConfig::default().to_json_pretty()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>, goal: Option<i64>) -> Result<TrackerConfig, CorrecaminosCliError> {
    let mut config = match path {
        Some(path) => TrackerConfig::from_file(path)?,
        None => TrackerConfig::default(),
    };
    if let Some(goal) = goal {
        config.goals.daily_step_goal = GoalEditor::validate_step_goal(goal)?;
    }
    debug!(?config, "load_config");
    Ok(config)
}

async fn cmd_walk(
    config: &TrackerConfig,
    steps: u64,
    history: bool,
    format: OutputFormat,
) -> Result<(), CorrecaminosCliError> {
    let handle = TrackerController::spawn(config);

    for _ in 0..steps {
        handle.take_step().await?;
    }

    // Let a scheduled gauge reset fire before reporting
    let snapshot = handle.snapshot().await?;
    if snapshot.reset_pending {
        tokio::time::sleep(config.reset_delay() + Duration::from_millis(50)).await;
    }

    let snapshot = handle.shutdown().await?;
    print_snapshot(&snapshot, &format, history)
}

async fn cmd_run(
    config: &TrackerConfig,
    input: &Path,
    print_events: bool,
    format: OutputFormat,
) -> Result<(), CorrecaminosCliError> {
    let handle = TrackerController::spawn(config);

    let printer = print_events.then(|| {
        let mut events = handle.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Ok(line) = serde_json::to_string(&event) {
                            println!("{}", line);
                        }
                        if matches!(event, TrackerEvent::Stopped { .. }) {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "event printer lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    });

    let source_task = if input.to_string_lossy() == "-" {
        let source = NdjsonSource::new(BufReader::new(tokio::io::stdin()), "stdin");
        handle.start_counting(Box::new(source))
    } else {
        let file = tokio::fs::File::open(input).await?;
        let source = NdjsonSource::new(BufReader::new(file), input.display().to_string());
        handle.start_counting(Box::new(source))
    };

    if let Some(task) = source_task {
        task.await.map_err(|e| CorrecaminosCliError::Task(e.to_string()))?;
    }

    let snapshot = handle.snapshot().await?;
    if snapshot.reset_pending {
        tokio::time::sleep(config.reset_delay() + Duration::from_millis(50)).await;
    }

    let snapshot = handle.shutdown().await?;
    if let Some(printer) = printer {
        let _ = printer.await;
    }
    print_snapshot(&snapshot, &format, false)
}

fn cmd_goal(value: &str) -> Result<(), CorrecaminosCliError> {
    let goal = GoalEditor::parse_step_goal(value)?;
    println!("Daily step goal: {}", goal);
    Ok(())
}

fn cmd_info(config: &TrackerConfig, print: bool) -> Result<(), CorrecaminosCliError> {
    if print {
        println!("{}", config.info_url);
        return Ok(());
    }
    open_info_link(&SystemBrowser, &config.info_url)?;
    Ok(())
}

fn cmd_doctor(config_path: Option<&Path>, json: bool) -> Result<(), CorrecaminosCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Correcaminos version {}", TRACKER_VERSION),
    });

    match config_path {
        Some(path) if !path.exists() => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: format!("Config file {} does not exist", path.display()),
        }),
        Some(path) => match TrackerConfig::from_file(path) {
            Ok(config) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Config valid (goal {} steps, reset after {} ms, {} thresholds)",
                    config.goals.daily_step_goal,
                    config.reset_delay_ms,
                    config.threshold_rule.as_str()
                ),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Invalid config: {}", e),
            }),
        },
        None => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "No config file, using defaults".to_string(),
        }),
    }

    // Check stdin is available (for streaming mode)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Warning,
            message: "stdin is a TTY (run needs piped readings or --input)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: TRACKER_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Correcaminos Doctor Report");
        println!("==========================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(CorrecaminosCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn print_snapshot(
    snapshot: &ProgressSnapshot,
    format: &OutputFormat,
    with_history: bool,
) -> Result<(), CorrecaminosCliError> {
    let mut stdout = io::stdout();
    match format {
        OutputFormat::Json => {
            writeln!(stdout, "{}", serde_json::to_string(snapshot)?)?;
        }
        OutputFormat::JsonPretty => {
            writeln!(stdout, "{}", serde_json::to_string_pretty(snapshot)?)?;
        }
        OutputFormat::Text => {
            writeln!(stdout, "PASOS   {}", snapshot.step_count)?;
            writeln!(stdout, "Kcal    {:.2}", snapshot.calorie_count)?;
            writeln!(stdout, "META    {}", snapshot.daily_step_goal)?;
            writeln!(stdout, "PUNTOS  {}", snapshot.user_points)?;
            writeln!(stdout, "Progress {}%", snapshot.gauge.percent)?;
        }
    }

    if with_history {
        match format {
            OutputFormat::Text => {
                writeln!(stdout)?;
                write!(
                    stdout,
                    "{}",
                    HistoryLog::render_text(&snapshot.step_history, snapshot.user_points)
                )?;
            }
            _ => {
                let entries = HistoryLog::entries(&snapshot.step_history);
                writeln!(stdout, "{}", serde_json::to_string(&entries)?)?;
            }
        }
    }

    stdout.flush()?;
    Ok(())
}

// Error types

#[derive(Debug)]
enum CorrecaminosCliError {
    Io(io::Error),
    Tracker(TrackerError),
    Json(serde_json::Error),
    Task(String),
    DoctorFailed,
}

impl From<io::Error> for CorrecaminosCliError {
    fn from(e: io::Error) -> Self {
        CorrecaminosCliError::Io(e)
    }
}

impl From<TrackerError> for CorrecaminosCliError {
    fn from(e: TrackerError) -> Self {
        CorrecaminosCliError::Tracker(e)
    }
}

impl From<serde_json::Error> for CorrecaminosCliError {
    fn from(e: serde_json::Error) -> Self {
        CorrecaminosCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CorrecaminosCliError> for CliError {
    fn from(e: CorrecaminosCliError) -> Self {
        match e {
            CorrecaminosCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CorrecaminosCliError::Tracker(e) => {
                let (code, hint) = match &e {
                    TrackerError::InvalidGoal(_) | TrackerError::InvalidGoalInput(_) => (
                        "INVALID_GOAL",
                        "Goals must be positive whole numbers of steps",
                    ),
                    TrackerError::ConfigError(_) | TrackerError::JsonError(_) => (
                        "CONFIG_ERROR",
                        "Run 'correcaminos config' to see a valid configuration",
                    ),
                    TrackerError::LinkError(_) => (
                        "LINK_ERROR",
                        "Use 'correcaminos info --print' to show the URL instead",
                    ),
                    _ => ("TRACKER_ERROR", "Re-run with --log-level debug for details"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            CorrecaminosCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            CorrecaminosCliError::Task(msg) => CliError {
                code: "SOURCE_FAILED".to_string(),
                message: msg,
                hint: Some("The step source task stopped unexpectedly".to_string()),
            },
            CorrecaminosCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
