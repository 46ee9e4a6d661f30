//! Behavior CLI - Command-line interface for Synheart Behavior
//!
//! Commands:
//! - replay: Run recorded events through a session and print its summary
//! - validate: Validate recorded events
//! - doctor: Diagnose configuration and environment
//! - schema: Print event and summary schemas

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use synheart_behavior::{
    BehaviorConfig, BehaviorEngine, BehaviorError, BehaviorEvent, HostInfo, ManualClock,
    SequentialSessionIds, PRODUCER_NAME, VERSION,
};

/// Behavior - On-device behavioral session engine
#[derive(Parser)]
#[command(name = "behavior")]
#[command(author = "Synheart AI Inc")]
#[command(version = VERSION)]
#[command(about = "Replay smartphone interaction events into session summaries", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded events as one session and print the summary
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Engine configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Host operating system recorded in the summary
        #[arg(long, default_value = "unknown")]
        os: String,

        /// Host application id
        #[arg(long)]
        app_id: Option<String>,

        /// Pretty-print the summary
        #[arg(long)]
        pretty: bool,
    },

    /// Validate recorded events
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Engine configuration file to check
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one event per line)
    Ndjson,
    /// JSON array of events
    Json,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Behavior event
    Input,
    /// Session summary
    Output,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), BehaviorCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            input_format,
            config,
            os,
            app_id,
            pretty,
        } => cmd_replay(
            &input,
            &output,
            input_format,
            config.as_deref(),
            HostInfo {
                os: Some(os),
                app_id,
                app_name: None,
            },
            pretty,
        ),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn read_input(input: &Path) -> Result<String, BehaviorCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

/// Raw JSON records, one per event, with their position in the input
fn split_records(data: &str, format: &InputFormat) -> Result<Vec<(usize, String)>, BehaviorCliError> {
    match format {
        InputFormat::Ndjson => Ok(data
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| (i, line.trim().to_string()))
            .collect()),
        InputFormat::Json => {
            let values: Vec<serde_json::Value> = serde_json::from_str(data)?;
            Ok(values
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i, v.to_string()))
                .collect())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<BehaviorConfig, BehaviorCliError> {
    match path {
        Some(path) => Ok(BehaviorConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(BehaviorConfig::default()),
    }
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    config: Option<&Path>,
    host: HostInfo,
    pretty: bool,
) -> Result<(), BehaviorCliError> {
    let config = load_config(config)?;
    let records = split_records(&read_input(input)?, &input_format)?;

    let mut events: Vec<BehaviorEvent> = Vec::with_capacity(records.len());
    for (index, record) in &records {
        let event = serde_json::from_str(record).map_err(|e| {
            BehaviorCliError::ParseError(format!("Failed to parse event at index {}: {}", index, e))
        })?;
        events.push(event);
    }

    let Some(first) = events.first() else {
        return Err(BehaviorCliError::NoEvents);
    };

    // The session opens at the first recorded event and closes at the last
    let clock = Arc::new(ManualClock::new(first.timestamp));
    let engine = BehaviorEngine::configure(config)?
        .with_clock(clock.clone())
        .with_id_generator(Arc::new(SequentialSessionIds::new("replay")));
    engine.initialize()?;
    engine.set_host_info(host);

    let handle = engine.start_session()?;
    for event in events {
        clock.set(event.timestamp);
        engine.ingest(event);
    }
    let summary = engine.end_session(&handle.session_id)?;

    let diagnostics = engine.diagnostics();
    info!(
        accepted = diagnostics.accepted_events,
        malformed = diagnostics.malformed_events,
        filtered = diagnostics.filtered_events,
        "replay finished"
    );

    let output_data = if pretty {
        serde_json::to_string_pretty(&summary)?
    } else {
        summary.to_json()?
    };

    if output.to_string_lossy() == "-" {
        println!("{}", output_data);
    } else {
        fs::write(output, output_data + "\n")?;
    }

    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), BehaviorCliError> {
    let records = split_records(&read_input(input)?, &input_format)?;

    let mut errors: Vec<ValidationErrorDetail> = Vec::new();
    // Replay opens the session at the first record; later records may arrive out of order
    // but never before that start
    let mut start_ms: Option<u64> = None;

    for (index, record) in &records {
        let result = serde_json::from_str::<BehaviorEvent>(record)
            .map_err(|e| e.to_string())
            .and_then(|event| {
                event.validate().map_err(|e| e.to_string())?;
                let ms = event.timestamp.monotonic_ms;
                let start = *start_ms.get_or_insert(ms);
                if ms < start {
                    return Err(format!("timestamp {}ms precedes session start {}ms", ms, start));
                }
                Ok(event)
            });

        if let Err(error) = result {
            errors.push(ValidationErrorDetail {
                index: *index,
                error,
            });
        }
    }

    let report = ValidationReport {
        total_events: records.len(),
        valid_events: records.len() - errors.len(),
        invalid_events: errors.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total events:   {}", report.total_events);
        println!("Valid events:   {}", report.valid_events);
        println!("Invalid events: {}", report.invalid_events);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - index {}: {}", err.index, err.error);
            }
        }
    }

    if report.invalid_events > 0 {
        Err(BehaviorCliError::ValidationFailed(report.invalid_events))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), BehaviorCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Behavior engine version {}", VERSION),
    });

    match config {
        Some(path) if !path.exists() => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: "Config file does not exist".to_string(),
        }),
        Some(path) => match load_config(Some(path)) {
            Ok(config) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Config valid (input: {}, attention: {}, motion-lite: {}, idle threshold: {}ms)",
                    config.enable_input_signals,
                    config.enable_attention_signals,
                    config.enable_motion_lite,
                    config.thresholds.idle_threshold_ms
                ),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: CliError::from(e).message,
            }),
        },
        None => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using default configuration".to_string(),
        }),
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (replay from stdin ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Behavior Doctor Report");
        println!("======================");
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(BehaviorCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), BehaviorCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", input_json_schema());
            } else {
                println!("Input: behavior event");
                println!();
                println!("- event_type: scroll, tap, swipe, typing, notification, call, app_switch, clipboard");
                println!("- timestamp: {{ monotonic_ms, wall_clock (RFC 3339) }}");
                println!("- metrics: ordered map of numbers or strings, for example");
                println!("  - scroll: velocity, distance, direction (up/down/left/right)");
                println!("  - typing: key, is_correction");
                println!("  - notification, call: action (ignored/opened/answered/dismissed/missed)");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", output_json_schema());
            } else {
                println!("Output: session summary");
                println!();
                println!("- session_id, start_at, end_at, duration_ms, micro_session");
                println!("- os, app_id, app_name, session_spacing_ms, motion_state");
                println!("- behavioral_metrics: {{ interaction_intensity, task_switch_rate, idle_time_ratio, burstiness, ... }}");
                println!("- typing_session_summary: {{ typing_session_count, average_typing_speed, correction_rate, ... }}");
                println!("- notification_summary: {{ notification_count, notification_ignore_rate, call_count, ... }}");
                println!("- system_state, device_context");
                println!("- activity_summary: {{ total_events, app_switch_count, events_by_type }}");
            }
        }
    }

    Ok(())
}

fn input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://synheart.ai/schemas/behavior.event.v1.json",
        "title": "behavior.event.v1",
        "type": "object",
        "required": ["event_type", "timestamp"],
        "properties": {
            "event_type": {
                "type": "string",
                "enum": ["scroll", "tap", "swipe", "typing", "notification", "call", "app_switch", "clipboard"]
            },
            "timestamp": {
                "type": "object",
                "required": ["monotonic_ms", "wall_clock"],
                "properties": {
                    "monotonic_ms": { "type": "integer", "minimum": 0 },
                    "wall_clock": { "type": "string", "format": "date-time" }
                }
            },
            "metrics": {
                "type": "object",
                "additionalProperties": { "type": ["number", "string", "boolean"] }
            }
        }
    })
    .to_string()
}

fn output_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://synheart.ai/schemas/behavior.session_summary.v1.json",
        "title": "behavior.session_summary.v1",
        "type": "object",
        "required": [
            "session_id", "start_at", "end_at", "duration_ms", "os",
            "behavioral_metrics", "notification_summary", "system_state",
            "device_context", "activity_summary"
        ],
        "properties": {
            "session_id": { "type": "string" },
            "start_at": { "type": "string", "format": "date-time" },
            "end_at": { "type": "string", "format": "date-time" },
            "duration_ms": { "type": "integer" },
            "micro_session": { "type": "boolean" },
            "os": { "type": "string" },
            "session_spacing_ms": { "type": "integer" },
            "motion_state": { "type": ["object", "null"] },
            "behavioral_metrics": { "type": "object" },
            "typing_session_summary": { "type": ["object", "null"] },
            "notification_summary": { "type": "object" },
            "system_state": { "type": "object" },
            "device_context": { "type": "object" },
            "activity_summary": { "type": "object" }
        }
    })
    .to_string()
}

#[derive(Debug)]
enum BehaviorCliError {
    Io(io::Error),
    Engine(BehaviorError),
    Json(serde_json::Error),
    NoEvents,
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for BehaviorCliError {
    fn from(e: io::Error) -> Self {
        BehaviorCliError::Io(e)
    }
}

impl From<BehaviorError> for BehaviorCliError {
    fn from(e: BehaviorError) -> Self {
        BehaviorCliError::Engine(e)
    }
}

impl From<serde_json::Error> for BehaviorCliError {
    fn from(e: serde_json::Error) -> Self {
        BehaviorCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<BehaviorCliError> for CliError {
    fn from(e: BehaviorCliError) -> Self {
        match e {
            BehaviorCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            BehaviorCliError::Engine(e) => {
                let hint = match e {
                    BehaviorError::Configuration(_) => Some("Run 'behavior doctor --config <file>'"),
                    BehaviorError::IncompleteContext(_) => Some("Pass --os"),
                    _ => None,
                };
                CliError {
                    code: e.code().to_string(),
                    message: e.to_string(),
                    hint: hint.map(str::to_string),
                }
            }
            BehaviorCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            BehaviorCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            BehaviorCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} events failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            BehaviorCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            BehaviorCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'behavior validate' for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_events: usize,
    valid_events: usize,
    invalid_events: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    error: String,
}

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
