mod dataset;
mod logging;
mod settings;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use specmint_core::{Error as CoreError, parse_schema, rules_json_schema};
use specmint_generate::{
    ArraySeeding, GenerateOptions, GenerationEngine, GenerationError, Manifest, OutputFormat,
    dataset_file_name, default_epoch, write_manifest, write_records,
};

use dataset::{DatasetValidator, detect_domain};
use logging::{LoggingError, init_logging};
use settings::{LogFormat, Settings, SettingsError, load_settings};

#[derive(Debug, Error)]
enum CliError {
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),
    #[error("schema error: {0}")]
    Schema(#[from] CoreError),
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{invalid} of {records} records failed validation")]
    DatasetInvalid { invalid: u64, records: u64 },
}

#[derive(Parser, Debug)]
#[command(name = "specmint", version, about = "Deterministic synthetic data from JSON Schema")]
struct Cli {
    /// Settings file (defaults to ./specmint.toml when present).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Log filter directives, e.g. `info` or `specmint_generate=debug`.
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,
    /// Also append JSON logs to this file.
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a dataset from a schema.
    Generate(GenerateArgs),
    /// Check an existing dataset against a schema and its rules.
    Validate(ValidateArgs),
    /// Print the JSON Schema of `x-cross-field-rules` entries.
    RulesSchema(RulesSchemaArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// JSON Schema file.
    #[arg(long, short = 's')]
    schema: PathBuf,
    #[arg(long, short = 'c')]
    count: Option<u64>,
    #[arg(long, allow_negative_numbers = true)]
    seed: Option<i64>,
    #[arg(long)]
    workers: Option<usize>,
    /// Output directory.
    #[arg(long, short = 'o')]
    out: Option<PathBuf>,
    /// `jsonl` or `json`.
    #[arg(long)]
    format: Option<OutputFormat>,
    /// Built-in rule set: healthcare, fintech or ecommerce.
    #[arg(long)]
    domain: Option<String>,
    /// `now` or an RFC 3339 instant that date windows end at.
    #[arg(long)]
    epoch: Option<String>,
    /// `per-record` or `stable`.
    #[arg(long)]
    array_seeding: Option<ArraySeeding>,
    /// Stop claiming new records after this many seconds.
    #[arg(long)]
    timeout_secs: Option<f64>,
    /// Skip writing manifest.json.
    #[arg(long, default_value_t = false)]
    no_manifest: bool,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Dataset file (JSON Lines, or a JSON array for `.json`).
    #[arg(long, short = 'd')]
    dataset: PathBuf,
    /// JSON Schema file.
    #[arg(long, short = 's')]
    schema: PathBuf,
    #[arg(long)]
    domain: Option<String>,
    /// Print every issue, not just the summary.
    #[arg(long, short = 'v', default_value_t = false)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct RulesSchemaArgs {
    /// Write to a file instead of stdout.
    #[arg(long, short = 'o')]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        settings.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        settings.logging.format = format;
    }
    if let Some(file) = cli.log_file {
        settings.logging.file = Some(file);
    }
    init_logging(&settings.logging)?;

    match cli.command {
        Command::Generate(args) => run_generate(args, settings).await,
        Command::Validate(args) => run_validate(args),
        Command::RulesSchema(args) => run_rules_schema(args),
    }
}

async fn run_generate(args: GenerateArgs, mut settings: Settings) -> Result<(), CliError> {
    apply_generate_args(&args, &mut settings);
    settings.validate()?;

    let raw = read_json(&args.schema)?;
    let schema = Arc::new(parse_schema(&raw)?);
    let generation = &settings.generation;
    let domain = generation
        .domain
        .clone()
        .or_else(|| detect_domain(&args.schema));
    let epoch = parse_epoch(generation.epoch.as_deref())?;

    let options = GenerateOptions {
        seed: generation.seed,
        count: generation.count,
        workers: generation.workers,
        epoch,
        array_seeding: generation.array_seeding,
        domain: domain.clone(),
        revalidate_after_patch: generation.revalidate_after_patch,
        timeout: generation.timeout()?,
    };

    let timer = Instant::now();
    let engine = GenerationEngine::new(options);
    let canceller = engine.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing records in flight");
            canceller.cancel();
        }
    });
    let result = engine.generate(schema).await;
    interrupt.abort();
    let result = result?;

    let out_dir = &settings.output.directory;
    std::fs::create_dir_all(out_dir)?;
    let format = settings.output.format;
    let dataset_file = dataset_file_name(format);
    let dataset_path = out_dir.join(&dataset_file);
    let bytes = write_records(&dataset_path, format, &result.records)?;
    info!(path = %dataset_path.display(), bytes, records = result.records.len(), "dataset written");

    if settings.output.manifest {
        let manifest = Manifest {
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
            schema_path: Some(args.schema.display().to_string()),
            record_count: result.records.len() as u64,
            seed: generation.seed,
            epoch,
            array_seeding: generation.array_seeding,
            domain,
            dataset_file,
            dataset_bytes: bytes,
            report: result.report.clone(),
        };
        write_manifest(out_dir, &manifest)?;
    }

    let report = &result.report;
    println!(
        "Generated {} records in {} ms ({} patched, {} still invalid, {} failed)",
        report.records_generated,
        timer.elapsed().as_millis(),
        report.patched,
        report.still_invalid,
        report.records_failed
    );
    println!("Output: {}", dataset_path.display());
    if report.timed_out {
        println!("Timed out after {} of {} records", report.records_generated, report.records_requested);
    }
    Ok(())
}

fn apply_generate_args(args: &GenerateArgs, settings: &mut Settings) {
    let generation = &mut settings.generation;
    if let Some(count) = args.count {
        generation.count = count;
    }
    if let Some(seed) = args.seed {
        generation.seed = seed;
    }
    if let Some(workers) = args.workers {
        generation.workers = workers;
    }
    if let Some(domain) = &args.domain {
        generation.domain = Some(domain.clone());
    }
    if let Some(epoch) = &args.epoch {
        generation.epoch = Some(epoch.clone());
    }
    if let Some(array_seeding) = args.array_seeding {
        generation.array_seeding = array_seeding;
    }
    if let Some(timeout) = args.timeout_secs {
        generation.timeout_secs = Some(timeout);
    }
    if let Some(out) = &args.out {
        settings.output.directory = out.clone();
    }
    if let Some(format) = args.format {
        settings.output.format = format;
    }
    if args.no_manifest {
        settings.output.manifest = false;
    }
}

fn parse_epoch(value: Option<&str>) -> Result<DateTime<Utc>, CliError> {
    match value {
        None => Ok(default_epoch()),
        Some(value) if value.eq_ignore_ascii_case("now") => Ok(Utc::now()),
        Some(value) => DateTime::parse_from_rfc3339(value)
            .map(|instant| instant.with_timezone(&Utc))
            .map_err(|err| CliError::InvalidArgument(format!("epoch '{value}': {err}"))),
    }
}

fn run_validate(args: ValidateArgs) -> Result<(), CliError> {
    let raw = read_json(&args.schema)?;
    let domain = args.domain.clone().or_else(|| detect_domain(&args.schema));
    info!(
        dataset = %args.dataset.display(),
        schema = %args.schema.display(),
        domain = domain.as_deref().unwrap_or("-"),
        "validating dataset"
    );

    let validator = DatasetValidator::new(&raw, domain)?;
    let report = validator.check_file(&args.dataset)?;

    if args.verbose {
        for issue in &report.issues {
            println!("record {} [{}] {}", issue.record, issue.severity.as_str(), issue.message);
        }
    }
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.invalid_records > 0 {
        return Err(CliError::DatasetInvalid {
            invalid: report.invalid_records,
            records: report.records,
        });
    }
    Ok(())
}

fn run_rules_schema(args: RulesSchemaArgs) -> Result<(), CliError> {
    let encoded = serde_json::to_string_pretty(&rules_json_schema())?;
    match args.out {
        Some(path) => std::fs::write(path, format!("{encoded}\n"))?,
        None => println!("{encoded}"),
    }
    Ok(())
}

fn read_json(path: &Path) -> Result<Value, CliError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
