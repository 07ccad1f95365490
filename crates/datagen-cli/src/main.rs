mod registry;
mod settings;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use datagen_generate::{
    DEFAULT_SEED, DataGeneratorService, EngineState, ExportConfiguration, GenerateOptions,
    GenerationError,
};
use datagen_plan::{PlanError, ValidationIssue, compile_plan, load_plan, plan_json_schema};
use registry::{init_logging, write_report};
use settings::{CliSettings, SettingsError, load_settings};
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
    #[error("generation task error: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "datagen", version, about = "Synthetic tabular data generator")]
struct Cli {
    /// Settings file (defaults to ./datagen.toml when present).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Append JSON log lines to this file.
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate instances from a feature plan into a CSV file.
    Generate(GenerateArgs),
    /// Check a feature plan and report issues.
    Validate(ValidateArgs),
    /// Print the JSON Schema of feature plans.
    Schema(SchemaArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Feature plan (JSON).
    #[arg(long, value_name = "PATH")]
    plan: PathBuf,
    /// Number of instances to generate.
    #[arg(long, short = 'n')]
    instances: u64,
    /// Output CSV path.
    #[arg(long, value_name = "PATH")]
    out: PathBuf,
    /// Seed; overrides the settings file and the plan.
    #[arg(long)]
    seed: Option<u64>,
    /// Write a header line with the feature names.
    #[arg(long, value_name = "BOOL")]
    feature_names: Option<bool>,
    /// Prefix each line with the instance id.
    #[arg(long, value_name = "BOOL")]
    instance_ids: Option<bool>,
    /// Write the run report as JSON.
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Feature plan (JSON).
    #[arg(value_name = "PATH")]
    plan: PathBuf,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Write the schema here instead of stdout.
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;
    let log_file = cli.log_file.clone().or_else(|| settings.log_file.clone());
    init_logging(log_file.as_deref())?;

    match cli.command {
        Command::Generate(args) => run_generate(args, &settings).await,
        Command::Validate(args) => run_validate(args),
        Command::Schema(args) => run_schema(args),
    }
}

async fn run_generate(args: GenerateArgs, settings: &CliSettings) -> Result<(), CliError> {
    let validated = load_plan(&args.plan)?;
    log_warnings(&validated.warnings);
    let compiled = compile_plan(&validated.plan)?;

    let seed = args
        .seed
        .or(settings.seed)
        .or(compiled.seed)
        .unwrap_or(DEFAULT_SEED);
    let config = ExportConfiguration {
        path: args.out.clone(),
        export_feature_names: args
            .feature_names
            .unwrap_or(settings.export_feature_names),
        export_instance_ids: args.instance_ids.unwrap_or(settings.export_instance_ids),
    };

    tracing::info!(
        event = "plan_loaded",
        plan = %args.plan.display(),
        features = compiled.definitions.len(),
        seed
    );

    let service = DataGeneratorService::from_plan(&compiled, GenerateOptions { seed });
    let handle = service.generate_data(args.instances, &config)?;
    let cancellation = handle.cancellation_flag();
    let mut worker = tokio::task::spawn_blocking(move || handle.join());

    let outcome = tokio::select! {
        result = &mut worker => result?,
        Ok(()) = tokio::signal::ctrl_c() => {
            tracing::warn!(event = "interrupt", "stopping at the next instance boundary");
            cancellation.cancel();
            worker.await?
        }
    };

    let report = match outcome {
        Ok(report) => report,
        Err(GenerationError::Failed { report, source }) => {
            if let Some(path) = &args.report {
                write_report(path, &report)?;
                tracing::info!(event = "report_written", path = %path.display());
            }
            return Err(GenerationError::Failed { report, source }.into());
        }
        Err(err) => return Err(err.into()),
    };

    if let Some(path) = &args.report {
        write_report(path, &report)?;
        tracing::info!(event = "report_written", path = %path.display());
    }

    println!(
        "state={} instances={} out={}",
        report.state,
        report.instances_exported,
        config.path.display()
    );
    if report.state == EngineState::Cancelled {
        tracing::warn!(
            event = "run_finished",
            status = "cancelled",
            instances = report.instances_exported
        );
    }
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<(), CliError> {
    match load_plan(&args.plan) {
        Ok(validated) => {
            for issue in &validated.warnings {
                println!("warning {issue}");
            }
            println!(
                "plan is valid: {} feature(s), {} warning(s)",
                validated.plan.features.len(),
                validated.warnings.len()
            );
            Ok(())
        }
        Err(PlanError::Invalid(report)) => {
            for issue in &report.errors {
                println!("error {issue}");
            }
            for issue in &report.warnings {
                println!("warning {issue}");
            }
            Err(PlanError::Invalid(report).into())
        }
        Err(err) => Err(err.into()),
    }
}

fn run_schema(args: SchemaArgs) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(&plan_json_schema())?;
    match args.out {
        Some(path) => std::fs::write(path, format!("{json}\n"))?,
        None => println!("{json}"),
    }
    Ok(())
}

fn log_warnings(warnings: &[ValidationIssue]) {
    for issue in warnings {
        tracing::warn!(
            event = "plan_warning",
            code = %issue.code,
            path = %issue.path,
            message = %issue.message
        );
    }
}
