//! `proofsheet` — reconcile order exports into per-student decisions.
//!
//! Thin driver around `proofsheet-engine`: reads the job config and input
//! CSV, runs the engine, writes the decision stream and the append-only
//! error report. Stdout carries machine output; human summaries go to
//! stderr.

mod exit_codes;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use proofsheet_engine::classify::classify;
use proofsheet_engine::columns::ResolvedColumns;
use proofsheet_engine::engine::{load_csv_rows, run};
use proofsheet_engine::error::EngineError;
use proofsheet_engine::report::{driver_records, ErrorReport};
use proofsheet_engine::JobConfig;

use exit_codes::{
    EXIT_ERROR, EXIT_INVALID_CONFIG, EXIT_IO, EXIT_MISSING_COLUMN, EXIT_NO_DECISIONS,
    EXIT_SUCCESS,
};

#[derive(Parser)]
#[command(name = "proofsheet")]
#[command(about = "Reconcile order exports into one decision per student")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a job: load the export, reconcile, write both output streams
    #[command(after_help = "\
Examples:
  proofsheet run yearbook.toml
  proofsheet run yearbook.toml --json
  proofsheet run packages.toml --input orders.csv --output decisions.json
  proofsheet run yearbook.toml --report session-errors.csv")]
    Run {
        /// Path to the job .toml config
        config: PathBuf,

        /// Input CSV (overrides [input] file in the config)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Print the full run result as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Write driver-record JSON to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Append rejected rows to this CSV report
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Check the config and input columns without processing any rows
    #[command(after_help = "\
Examples:
  proofsheet validate yearbook.toml
  proofsheet validate packages.toml --input orders.csv")]
    Validate {
        /// Path to the job .toml config
        config: PathBuf,

        /// Input CSV (overrides [input] file in the config)
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Classify product descriptions against the rule table
    #[command(after_help = "\
Examples:
  proofsheet classify \"Economy Package\" \"Touch Up Photos\"")]
    Classify {
        /// Product descriptions to classify
        #[arg(required = true)]
        text: Vec<String>,
    },
}

#[derive(Debug)]
struct CliError {
    code: u8,
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(code: u8, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), hint: None }
    }

    fn with_hint(code: u8, message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self { code, message: message.into(), hint: Some(hint.into()) }
    }
}

fn engine_err(err: EngineError) -> CliError {
    let code = match err {
        EngineError::ConfigParse(_) | EngineError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        EngineError::MissingColumn { .. } => EXIT_MISSING_COLUMN,
        EngineError::Csv(_) => EXIT_IO,
    };
    CliError::new(code, err.to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Run { config, input, json, output, report } => {
            cmd_run(config, input, json, output, report)
        }
        Commands::Validate { config, input } => cmd_validate(config, input),
        Commands::Classify { text } => cmd_classify(&text),
    };

    match outcome {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {hint}");
            }
            ExitCode::from(err.code)
        }
    }
}

fn read_config(path: &Path) -> Result<JobConfig, CliError> {
    let text = fs::read_to_string(path)
        .map_err(|e| CliError::new(EXIT_IO, format!("cannot read config: {e}")))?;
    JobConfig::from_toml(&text).map_err(engine_err)
}

/// `--input` wins; otherwise `[input] file` resolved against the config
/// file's directory.
fn input_path(
    config_path: &Path,
    config: &JobConfig,
    flag: Option<PathBuf>,
) -> Option<PathBuf> {
    if flag.is_some() {
        return flag;
    }
    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    config.input.file.as_ref().map(|file| base.join(file))
}

fn cmd_run(
    config_path: PathBuf,
    input: Option<PathBuf>,
    json: bool,
    output: Option<PathBuf>,
    report: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    let csv_path = input_path(&config_path, &config, input).ok_or_else(|| {
        CliError::with_hint(
            EXIT_IO,
            "no input file configured",
            "pass --input or set [input] file in the config",
        )
    })?;
    let csv_data = fs::read_to_string(&csv_path)
        .map_err(|e| CliError::new(EXIT_IO, format!("cannot read {}: {e}", csv_path.display())))?;

    let loaded = load_csv_rows(&csv_data, &config).map_err(engine_err)?;
    let result = run(&config, &loaded);

    // Decision stream for the automation driver
    let output_path = output.or_else(|| config.output.json.as_ref().map(PathBuf::from));
    if let Some(path) = output_path {
        let records = driver_records(&result);
        let json_text = serde_json::to_string_pretty(&records)
            .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        fs::write(&path, json_text)
            .map_err(|e| CliError::new(EXIT_IO, format!("cannot write {}: {e}", path.display())))?;
        eprintln!("wrote {}", path.display());
    }

    if json {
        let json_text = serde_json::to_string_pretty(&result)
            .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        println!("{json_text}");
    }

    // Error report, appended so earlier sessions keep their rows
    let report_path = report.or_else(|| config.output.report.as_ref().map(PathBuf::from));
    if let Some(path) = report_path {
        let error_report = ErrorReport::new(&loaded.headers, &result.rejected);
        if !error_report.is_empty() {
            append_report(&path, &error_report)?;
            eprintln!(
                "appended {} row(s) to {}",
                error_report.rows.len(),
                path.display()
            );
        }
    }

    let s = &result.summary;
    eprintln!(
        "{} run: {} person(s) — {} accepted, {} rejected row(s), {} ignored",
        result.meta.mode, s.persons, s.accepted, s.rejected_rows, s.ignored_rows,
    );
    for (reason, count) in &s.reasons {
        eprintln!("  {reason}: {count}");
    }

    if s.accepted == 0 {
        return Err(CliError::new(EXIT_NO_DECISIONS, "no decisions produced"));
    }
    Ok(())
}

/// Append to an existing report without rewriting it; the header is only
/// written when the file is new or empty.
fn append_report(path: &Path, report: &ErrorReport) -> Result<(), CliError> {
    let fresh = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let text = report.render_csv(fresh).map_err(engine_err)?;
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| CliError::new(EXIT_IO, format!("cannot open {}: {e}", path.display())))?;
    file.write_all(text.as_bytes())
        .map_err(|e| CliError::new(EXIT_IO, format!("cannot write {}: {e}", path.display())))?;
    Ok(())
}

fn cmd_validate(config_path: PathBuf, input: Option<PathBuf>) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    eprintln!("config ok: {} ({} mode)", config.name, config.mode);

    let Some(csv_path) = input_path(&config_path, &config, input) else {
        eprintln!("no input file; column check skipped");
        return Ok(());
    };

    let mut reader = csv::Reader::from_path(&csv_path)
        .map_err(|e| CliError::new(EXIT_IO, format!("cannot read {}: {e}", csv_path.display())))?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CliError::new(EXIT_IO, e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let columns = ResolvedColumns::resolve(&headers, &config).map_err(engine_err)?;

    println!("person key   -> {}", columns.person_key);
    println!("payload      -> {}", columns.payload);
    let optional = |value: &Option<String>| value.clone().unwrap_or_else(|| "(none)".into());
    println!("timestamp    -> {}", optional(&columns.timestamp));
    println!("secondary    -> {}", optional(&columns.secondary));
    println!("quantity     -> {}", optional(&columns.quantity));
    println!("display name -> {}", optional(&columns.display_name));

    eprintln!("input ok: {}", csv_path.display());
    Ok(())
}

fn cmd_classify(text: &[String]) -> Result<(), CliError> {
    println!("{:<55} | {:<8} | {}", "INPUT", "CODE", "CATEGORY");
    println!("{}", "-".repeat(80));
    for t in text {
        let c = classify(t);
        println!("{:<55} | {:<8} | {}", t, c.code.unwrap_or("-"), c.category);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proofsheet_engine::model::{RawRow, RejectReason, RejectedEntry};
    use std::collections::BTreeMap;

    fn sample_report() -> ErrorReport {
        let mut raw_fields = BTreeMap::new();
        raw_fields.insert("Student ID".to_string(), "1001".to_string());
        let entry = RejectedEntry::new(
            RawRow {
                row: 1,
                person_key: "1001".into(),
                display_name: String::new(),
                payload: None,
                timestamp_raw: None,
                secondary: None,
                quantity: 1,
                raw_fields,
            },
            RejectReason::DuplicateLineItem,
        );
        ErrorReport::new(&["Student ID".to_string()], &[entry])
    }

    #[test]
    fn append_report_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session-errors.csv");
        let report = sample_report();

        append_report(&path, &report).unwrap();
        append_report(&path, &report).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let header_lines = text.lines().filter(|l| l.starts_with("Student ID")).count();
        assert_eq!(header_lines, 1);
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn engine_errors_map_to_registry_codes() {
        let err = engine_err(EngineError::ConfigParse("bad".into()));
        assert_eq!(err.code, EXIT_INVALID_CONFIG);
        let err = engine_err(EngineError::MissingColumn {
            field: "person key",
            candidates: vec!["student id".into()],
        });
        assert_eq!(err.code, EXIT_MISSING_COLUMN);
        let err = engine_err(EngineError::Csv("truncated".into()));
        assert_eq!(err.code, EXIT_IO);
    }

    #[test]
    fn input_flag_overrides_config_file() {
        let config = JobConfig::from_toml(
            "name = \"T\"\nmode = \"selection\"\n[input]\nfile = \"orders.csv\"",
        )
        .unwrap();
        let path = input_path(Path::new("jobs/yearbook.toml"), &config, None).unwrap();
        assert_eq!(path, Path::new("jobs/orders.csv"));

        let flagged = input_path(
            Path::new("jobs/yearbook.toml"),
            &config,
            Some(PathBuf::from("elsewhere.csv")),
        )
        .unwrap();
        assert_eq!(flagged, Path::new("elsewhere.csv"));
    }
}
