//! ta-core: developer CLI for the telemetry rollup engine.
//!
//! - `check`: load and validate a schema document
//! - `merge`: merge a JSON batch of records
//! - `show`: print the directives of one type
//!
//! Command payloads go to stdout as JSON; logs go to stderr.

use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use ta_common::{format_error_human, Record, StructuredError};
use ta_core::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use ta_core::{ExitCode, MergeConfig, MergeOutcome, SchemaSource, TreeMerger};
use ta_schema::SchemaRegistry;
use tracing::{debug, info};

/// Telemetry rollup engine tooling
#[derive(Parser)]
#[command(name = "ta-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

#[derive(Args, Debug)]
struct GlobalOpts {
    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format on stderr (human, json)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Emit errors as JSON on stderr
    #[arg(long, global = true)]
    json_errors: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a schema document
    Check(SchemaArgs),

    /// Merge a batch (or a list of batches) of records
    Merge(MergeArgs),

    /// Print the directives of one type
    Show(ShowArgs),
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Schema document (JSON, TOML or YAML); defaults to $TA_SCHEMA, then the built-in table
    #[arg(long)]
    schema: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct MergeArgs {
    /// JSON array of records, or an array of such arrays; `-` reads stdin
    #[arg(long, short)]
    input: PathBuf,

    /// Merge configuration (JSON or TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pretty-print the output
    #[arg(long)]
    pretty: bool,

    #[command(flatten)]
    schema: SchemaArgs,
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Message type name
    #[arg(long = "type", short)]
    type_name: String,

    #[command(flatten)]
    schema: SchemaArgs,
}

/// Either one batch or several independent ones.
enum BatchInput {
    One(Vec<Record>),
    Many(Vec<Vec<Record>>),
}

impl BatchInput {
    /// An array whose first element is itself an array is a list of batches.
    ///
    /// The shape is read from a `serde_json::Value` first and the text is then
    /// decoded straight into records, so integer map keys keep working.
    fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let shape: serde_json::Value = serde_json::from_str(text)?;
        let nested = shape
            .as_array()
            .and_then(|items| items.first())
            .is_some_and(serde_json::Value::is_array);
        if nested {
            Ok(BatchInput::Many(serde_json::from_str(text)?))
        } else {
            Ok(BatchInput::One(serde_json::from_str(text)?))
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env(cli.global.log_level, cli.global.log_format);
    init_logging(&log_config);

    let result = match &cli.command {
        Commands::Check(args) => run_check(args),
        Commands::Merge(args) => run_merge(args),
        Commands::Show(args) => run_show(args),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(err) => {
            report_error(&err, cli.global.json_errors);
            ExitCode::for_error(&err)
        }
    };
    std::process::exit(exit_code.as_i32());
}

fn report_error(err: &ta_common::Error, json: bool) {
    if json {
        eprintln!("{}", StructuredError::from(err).to_json());
    } else {
        eprintln!("{}", format_error_human(err, std::io::stderr().is_terminal()));
    }
}

fn load_registry(args: &SchemaArgs) -> Result<(SchemaRegistry, SchemaSource), ta_common::Error> {
    let source = SchemaSource::resolve(args.schema.as_deref());
    debug!(source = %source, "resolving schema");
    let registry = match source.path() {
        Some(path) => SchemaRegistry::load(path)?,
        None => SchemaRegistry::builtin()?,
    };
    Ok((registry, source))
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<(), ta_common::Error> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

fn run_check(args: &SchemaArgs) -> Result<ExitCode, ta_common::Error> {
    let (registry, source) = load_registry(args)?;
    let payload = serde_json::json!({
        "status": "ok",
        "source": source.to_string(),
        "schema_version": registry.version(),
        "types": registry.type_names().count(),
        "skipped": registry.skipped_types().count(),
        "diagnostics": registry.diagnostics(),
    });
    print_json(&payload, true)?;
    Ok(ExitCode::Clean)
}

fn read_input(path: &Path) -> Result<String, ta_common::Error> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        Ok(std::fs::read_to_string(path)?)
    }
}

fn run_merge(args: &MergeArgs) -> Result<ExitCode, ta_common::Error> {
    let (registry, _) = load_registry(&args.schema)?;
    let config = match &args.config {
        Some(path) => MergeConfig::from_file(path)?,
        None => MergeConfig::default(),
    };
    let merger = TreeMerger::new(&registry, config)?;

    let input = BatchInput::parse(&read_input(&args.input)?)?;
    match input {
        BatchInput::One(batch) => {
            let outcome = merger.merge(&batch)?;
            info!(
                type_name = %outcome.record.type_name,
                records = outcome.report.records_in,
                violations = outcome.report.violations.len(),
                "merged batch"
            );
            print_json(&outcome, args.pretty)?;
            Ok(exit_for(std::slice::from_ref(&outcome)))
        }
        BatchInput::Many(batches) => {
            let outcomes = merger
                .merge_many(&batches)
                .into_iter()
                .collect::<Result<Vec<MergeOutcome>, _>>()?;
            info!(batches = outcomes.len(), "merged batches");
            print_json(&outcomes, args.pretty)?;
            Ok(exit_for(&outcomes))
        }
    }
}

fn exit_for(outcomes: &[MergeOutcome]) -> ExitCode {
    if outcomes.iter().all(|o| o.report.violations.is_empty() && o.report.issues.is_empty()) {
        ExitCode::Clean
    } else {
        ExitCode::MergedWithFindings
    }
}

fn run_show(args: &ShowArgs) -> Result<ExitCode, ta_common::Error> {
    let (registry, _) = load_registry(&args.schema)?;
    let name = args.type_name.as_str();

    let payload = if registry.is_skipped(name) {
        serde_json::json!({ "type": name, "skipped": true })
    } else if let Some(schema) = registry.lookup(name) {
        let fields: serde_json::Map<String, serde_json::Value> = schema
            .fields()
            .map(|(id, set)| (id.to_string(), serde_json::Value::String(set.to_string())))
            .collect();
        serde_json::json!({
            "type": name,
            "skipped": false,
            "fields": fields,
            "primary_key": schema.primary_key_fields(),
            "targets": schema.target_fields().collect::<Vec<_>>(),
        })
    } else {
        serde_json::json!({ "type": name, "skipped": false, "fields": {}, "listed": false })
    };
    print_json(&payload, true)?;
    Ok(ExitCode::Clean)
}
