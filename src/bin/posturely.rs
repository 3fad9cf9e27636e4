//! Posturely CLI - Command-line interface for Posturely Core
//!
//! Commands:
//! - score: Score recorded frames against thresholds (batch mode)
//! - run: Drive a live tracking session from stdin (streaming mode)
//! - validate: Validate pose frame schema
//! - doctor: Diagnose engine health and configuration
//! - schema: Print schema information

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, TimeZone, Utc};

use posturely_core::calibration::CalibrationThresholds;
use posturely_core::report::{ReportEncoder, ReportSession};
use posturely_core::schema::{FrameAdapter, PoseFrame, SCHEMA_VERSION};
use posturely_core::types::{PostureSample, TrackingSource};
use posturely_core::{
    calculate_score, MetricsExtractor, TrackingSession, ENGINE_VERSION, PRODUCER_NAME,
    REPORT_VERSION,
};

/// Posturely - On-device posture scoring engine
#[derive(Parser)]
#[command(name = "posturely")]
#[command(author = "Posturely")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Score pose landmark frames into posture scores", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score recorded frames against thresholds (batch mode)
    Score {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Load calibration thresholds from file
        #[arg(long)]
        thresholds: Option<PathBuf>,

        /// Calibrate from the first full frame instead of using defaults
        #[arg(long)]
        calibrate: bool,

        /// Save derived thresholds to file after scoring
        #[arg(long)]
        save_thresholds: Option<PathBuf>,
    },

    /// Drive a live tracking session from stdin (streaming mode)
    Run {
        /// Tracking source for the session
        #[arg(long, default_value = "laptop")]
        source: SourceArg,

        /// Smoothed score below which the alert timer runs
        #[arg(long, default_value = "80")]
        low_score_threshold: i32,

        /// Calibrate from the first full frame
        #[arg(long, default_value = "true")]
        auto_calibrate: bool,

        /// Write the final session report to a file instead of stdout
        #[arg(long)]
        report: Option<PathBuf>,

        /// Flush output after each record
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Validate pose frame schema
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

    /// Diagnose engine health and configuration
    Doctor {
        /// Check thresholds file
        #[arg(long)]
        thresholds: Option<PathBuf>,

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
    /// Newline-delimited JSON (one frame per line)
    Ndjson,
    /// JSON array of frames
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    Phone,
    Laptop,
    Earbuds,
}

impl From<SourceArg> for TrackingSource {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Phone => TrackingSource::Phone,
            SourceArg::Laptop => TrackingSource::Laptop,
            SourceArg::Earbuds => TrackingSource::Earbuds,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (pose.frame.v1)
    Input,
    /// Output schema (posture.session.v1)
    Output,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
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

fn run(cli: Cli) -> Result<(), PosturelyCliError> {
    match cli.command {
        Commands::Score {
            input,
            output,
            input_format,
            output_format,
            thresholds,
            calibrate,
            save_thresholds,
        } => cmd_score(
            &input,
            &output,
            input_format,
            output_format,
            thresholds.as_deref(),
            calibrate,
            save_thresholds.as_deref(),
        ),

        Commands::Run {
            source,
            low_score_threshold,
            auto_calibrate,
            report,
            flush,
        } => cmd_run(
            source.into(),
            low_score_threshold,
            auto_calibrate,
            report.as_deref(),
            flush,
        ),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor { thresholds, json } => cmd_doctor(thresholds.as_deref(), json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

/// Per-frame output record for batch scoring
#[derive(serde::Serialize)]
struct FrameScore {
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frame_id: Option<String>,
    score: i32,
    flags: Vec<posturely_core::MetricFlag>,
    metrics: posturely_core::PoseMetrics,
}

fn cmd_score(
    input: &PathBuf,
    output: &PathBuf,
    input_format: InputFormat,
    output_format: OutputFormat,
    thresholds_path: Option<&std::path::Path>,
    calibrate: bool,
    save_thresholds: Option<&std::path::Path>,
) -> Result<(), PosturelyCliError> {
    let input_data = read_input(input)?;
    let frames = parse_frames(&input_data, &input_format)?;

    if frames.is_empty() {
        return Err(PosturelyCliError::NoFrames);
    }

    for frame in &frames {
        frame.validate()?;
    }

    // Thresholds: explicit file wins, otherwise optionally derive from the
    // first full frame, otherwise defaults
    let mut thresholds: Option<CalibrationThresholds> = match thresholds_path {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            Some(CalibrationThresholds::from_json(&json)?)
        }
        None => None,
    };

    if thresholds.is_none() && calibrate {
        if let Some(frame) = frames.iter().find(|f| !f.landmarks.is_empty()) {
            let baseline = MetricsExtractor::extract(&frame.landmarks);
            thresholds = Some(CalibrationThresholds::from_baseline(&baseline));
        }
    }

    let mut records: Vec<FrameScore> = Vec::with_capacity(frames.len());
    for frame in &frames {
        let metrics = MetricsExtractor::extract(&frame.landmarks);
        let result = calculate_score(&metrics, thresholds.as_ref());
        records.push(FrameScore {
            timestamp: frame.timestamp,
            frame_id: frame.frame_id.clone(),
            score: result.score,
            flags: result.flags,
            metrics,
        });
    }

    if let Some(path) = save_thresholds {
        if let Some(t) = &thresholds {
            fs::write(path, t.to_json()?)?;
        }
    }

    let output_data = format_output(&records, &output_format)?;
    write_output(output, &output_data)?;

    Ok(())
}

fn cmd_run(
    source: TrackingSource,
    low_score_threshold: i32,
    auto_calibrate: bool,
    report_path: Option<&std::path::Path>,
    flush: bool,
) -> Result<(), PosturelyCliError> {
    let mut session = TrackingSession::with_threshold(source, low_score_threshold);
    let started_at = Utc::now();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut samples: Vec<PostureSample> = Vec::new();
    let mut last_second: Option<i64> = None;
    let mut last_timestamp = started_at;

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let frame: PoseFrame = serde_json::from_str(trimmed)
            .map_err(|e| PosturelyCliError::ParseError(format!("Failed to parse frame: {e}")))?;
        frame.validate()?;
        last_timestamp = frame.timestamp;

        if auto_calibrate && !session.is_calibrated() && !frame.landmarks.is_empty() {
            session.try_calibrate(&frame.landmarks);
        }

        let update = session.tick(&frame.landmarks);
        writeln!(
            stdout,
            "{}",
            serde_json::to_string(&serde_json::json!({"type": "tick", "update": update}))?
        )?;

        // Advance the one-second timer from frame timestamps
        let frame_second = frame.timestamp.timestamp();
        match last_second {
            None => last_second = Some(frame_second),
            Some(prev) => {
                for step in 1..=catchup_seconds(prev, frame_second) {
                    let at = Utc
                        .timestamp_opt(prev + step, 0)
                        .single()
                        .unwrap_or(frame.timestamp);
                    if let Some(sample) = session.second_tick(at) {
                        writeln!(
                            stdout,
                            "{}",
                            serde_json::to_string(
                                &serde_json::json!({"type": "sample", "sample": sample})
                            )?
                        )?;
                        samples.push(sample);
                    }
                }
                last_second = Some(frame_second.max(prev));
            }
        }

        if flush {
            stdout.flush()?;
        }
    }

    // Snapshot session metadata before stop() zeroes it
    let session_id = session.session_id();
    let calibrated = session.is_calibrated();
    let active_seconds = session.active_seconds();

    if let Some(sample) = session.stop(last_timestamp) {
        samples.push(sample);
    }

    let report = ReportEncoder::new().encode(
        ReportSession {
            session_id,
            tracking_source: source,
            started_at,
            ended_at: last_timestamp,
            calibrated,
            active_seconds,
        },
        samples,
    );

    let report_json = serde_json::to_string_pretty(&report)?;
    match report_path {
        Some(path) => fs::write(path, report_json)?,
        None => {
            writeln!(stdout, "{}", serde_json::to_string(&report)?)?;
            stdout.flush()?;
        }
    }

    Ok(())
}

fn cmd_validate(
    input: &PathBuf,
    input_format: InputFormat,
    json: bool,
) -> Result<(), PosturelyCliError> {
    let input_data = read_input(input)?;
    let frames = parse_frames(&input_data, &input_format)?;

    let failures = FrameAdapter::validate_frames(&frames);

    let report = ValidationReport {
        total_frames: frames.len(),
        valid_frames: frames.len() - failures.len(),
        invalid_frames: failures.len(),
        errors: failures
            .iter()
            .map(|f| ValidationErrorDetail {
                index: f.index,
                frame_id: f.frame_id.clone(),
                error: f.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total frames:   {}", report.total_frames);
        println!("Valid frames:   {}", report.valid_frames);
        println!("Invalid frames: {}", report.invalid_frames);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Frame {} (index {}): {}",
                    err.frame_id.as_deref().unwrap_or("unknown"),
                    err.index,
                    err.error
                );
            }
        }
    }

    if report.invalid_frames > 0 {
        Err(PosturelyCliError::ValidationFailed(report.invalid_frames))
    } else {
        Ok(())
    }
}

fn cmd_doctor(thresholds: Option<&std::path::Path>, json: bool) -> Result<(), PosturelyCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Posturely Core version {}", ENGINE_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}", SCHEMA_VERSION),
    });

    if let Some(thresholds_path) = thresholds {
        if thresholds_path.exists() {
            match fs::read_to_string(thresholds_path) {
                Ok(content) => match CalibrationThresholds::from_json(&content) {
                    Ok(t) => {
                        checks.push(DoctorCheck {
                            name: "thresholds".to_string(),
                            status: CheckStatus::Ok,
                            message: format!(
                                "Thresholds file valid (torso tilt limit {:.1} degrees)",
                                t.torso_tilt
                            ),
                        });
                    }
                    Err(e) => {
                        checks.push(DoctorCheck {
                            name: "thresholds".to_string(),
                            status: CheckStatus::Error,
                            message: format!("Invalid thresholds JSON: {}", e),
                        });
                    }
                },
                Err(e) => {
                    checks.push(DoctorCheck {
                        name: "thresholds".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Cannot read thresholds file: {}", e),
                    });
                }
            }
        } else {
            checks.push(DoctorCheck {
                name: "thresholds".to_string(),
                status: CheckStatus::Warning,
                message: "Thresholds file does not exist".to_string(),
            });
        }
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
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Posturely Doctor Report");
        println!("=======================");
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
        Err(PosturelyCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), PosturelyCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input Schema: {}", SCHEMA_VERSION);
                println!();
                println!("One pose.frame.v1 record per detector frame:");
                println!();
                println!("- schema_version: \"pose.frame.v1\"");
                println!("- frame_id: Optional unique identifier");
                println!("- timestamp: Capture time (UTC, RFC 3339)");
                println!("- source: {{ tracking_source, device_model, device_id }}");
                println!("  - tracking_source: phone | laptop | earbuds");
                println!("- landmarks: Empty (no detection) or all 33 detector points");
                println!("  - Each point: {{ x, y, z?, visibility?, presence? }}");
                println!("  - x and y are normalized image coordinates");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output Schema: {}", REPORT_VERSION);
                println!();
                println!("A posture.session.v1 report contains:");
                println!();
                println!("- report_version: Schema version");
                println!("- producer: {{ name, version, instance_id }}");
                println!("- session: {{ session_id, tracking_source, started_at, ended_at,");
                println!("             calibrated, active_seconds }}");
                println!("- samples: Per-minute records, each with:");
                println!("  - date, time, average_score, samples_count, timestamp_ms");
                println!("- summary: {{ average_score, min_score, max_score, minutes_recorded }}");
            }
        }
    }

    Ok(())
}

// Helper functions

/// Upper bound on timer catch-up between consecutive frames. One minute is
/// enough to flush the pending sample; anything larger means a corrupt or
/// far-future timestamp, which must not spin the loop.
const MAX_CATCHUP_SECONDS: i64 = 60;

/// Seconds to advance the session timer when a frame at `frame_second`
/// follows one at `prev_second`. Backwards jumps advance nothing.
fn catchup_seconds(prev_second: i64, frame_second: i64) -> i64 {
    (frame_second - prev_second).clamp(0, MAX_CATCHUP_SECONDS)
}

fn read_input(input: &PathBuf) -> Result<String, PosturelyCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &PathBuf, data: &str) -> Result<(), PosturelyCliError> {
    if output.to_string_lossy() == "-" {
        print!("{}", data);
        Ok(())
    } else {
        Ok(fs::write(output, data)?)
    }
}

fn parse_frames(data: &str, format: &InputFormat) -> Result<Vec<PoseFrame>, PosturelyCliError> {
    let frames = match format {
        InputFormat::Ndjson => FrameAdapter::parse_ndjson(data)?,
        InputFormat::Json => FrameAdapter::parse_array(data)?,
    };
    Ok(frames)
}

fn format_output(records: &[FrameScore], format: &OutputFormat) -> Result<String, PosturelyCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for record in records {
                lines.push(serde_json::to_string(record)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(records)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(records)?),
    }
}

fn get_input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://posturely.app/schemas/pose.frame.v1.json",
        "title": "pose.frame.v1",
        "description": "Posturely pose landmark frame schema",
        "type": "object",
        "required": ["schema_version", "timestamp", "source"],
        "properties": {
            "schema_version": {
                "type": "string",
                "const": "pose.frame.v1"
            },
            "frame_id": { "type": "string" },
            "timestamp": { "type": "string", "format": "date-time" },
            "source": {
                "type": "object",
                "required": ["tracking_source"],
                "properties": {
                    "tracking_source": {
                        "type": "string",
                        "enum": ["phone", "laptop", "earbuds"]
                    },
                    "device_model": { "type": "string" },
                    "device_id": { "type": "string" }
                }
            },
            "landmarks": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["x", "y"],
                    "properties": {
                        "x": { "type": "number" },
                        "y": { "type": "number" },
                        "z": { "type": "number" },
                        "visibility": { "type": "number" },
                        "presence": { "type": "number" }
                    }
                }
            }
        }
    })
    .to_string()
}

fn get_output_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://posturely.app/schemas/posture.session.v1.json",
        "title": "posture.session.v1",
        "description": "Posturely session report schema",
        "type": "object",
        "required": ["report_version", "producer", "session", "samples"],
        "properties": {
            "report_version": { "type": "string" },
            "producer": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "version": { "type": "string" },
                    "instance_id": { "type": "string" }
                }
            },
            "session": {
                "type": "object",
                "properties": {
                    "session_id": { "type": "string", "format": "uuid" },
                    "tracking_source": { "type": "string" },
                    "started_at": { "type": "string", "format": "date-time" },
                    "ended_at": { "type": "string", "format": "date-time" },
                    "calibrated": { "type": "boolean" },
                    "active_seconds": { "type": "integer" }
                }
            },
            "samples": {
                "type": "array",
                "items": { "type": "object" }
            },
            "summary": {
                "type": "object",
                "properties": {
                    "average_score": { "type": "integer" },
                    "min_score": { "type": "integer" },
                    "max_score": { "type": "integer" },
                    "minutes_recorded": { "type": "integer" }
                }
            }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum PosturelyCliError {
    Io(io::Error),
    Engine(posturely_core::EngineError),
    Json(serde_json::Error),
    Validation(posturely_core::schema::ValidationError),
    NoFrames,
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for PosturelyCliError {
    fn from(e: io::Error) -> Self {
        PosturelyCliError::Io(e)
    }
}

impl From<posturely_core::EngineError> for PosturelyCliError {
    fn from(e: posturely_core::EngineError) -> Self {
        PosturelyCliError::Engine(e)
    }
}

impl From<serde_json::Error> for PosturelyCliError {
    fn from(e: serde_json::Error) -> Self {
        PosturelyCliError::Json(e)
    }
}

impl From<posturely_core::schema::ValidationError> for PosturelyCliError {
    fn from(e: posturely_core::schema::ValidationError) -> Self {
        PosturelyCliError::Validation(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PosturelyCliError> for CliError {
    fn from(e: PosturelyCliError) -> Self {
        match e {
            PosturelyCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PosturelyCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure input matches pose.frame.v1 schema".to_string()),
            },
            PosturelyCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PosturelyCliError::Validation(e) => CliError {
                code: "VALIDATION_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'posturely validate' for details".to_string()),
            },
            PosturelyCliError::NoFrames => CliError {
                code: "NO_FRAMES".to_string(),
                message: "No frames found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            PosturelyCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} frames failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            PosturelyCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            PosturelyCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_frames: usize,
    valid_frames: usize,
    invalid_frames: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    frame_id: Option<String>,
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
