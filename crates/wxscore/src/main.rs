use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wxscore_core::artifact::ModelSpec;
use wxscore_core::scorer::IncompleteRowPolicy;
use wxscore_core::{load_artifact, run_batch, PipelineConfig, RunSummary};
use wxscore_parser::{FieldParsing, FilenamePolicy};

#[derive(Parser, Debug)]
#[command(author, version, about = "Batch weather observation scoring", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score every observation file in the input folder and write predictions
    Run(RunArgs),
    /// Load the classifier artifact and print what it expects
    InspectModel(ModelArgs),
}

#[derive(Args, Debug, Default)]
struct ModelArgs {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory holding the model artifact (and receiving predictions)
    #[arg(long)]
    model_folder: Option<PathBuf>,
    /// Artifact file name inside the model folder
    #[arg(long)]
    model_filename: Option<String>,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    #[command(flatten)]
    model: ModelArgs,
    /// Directory of <YYYYMMDDHHMMSS>.csv observation files
    #[arg(long)]
    input_folder: Option<PathBuf>,
    /// Prediction file name inside the model folder
    #[arg(long)]
    output_filename: Option<String>,
    /// Warn about and skip files whose names are not timestamps
    #[arg(long)]
    skip_malformed_filenames: bool,
    /// Match MapRecord fields by key instead of position
    #[arg(long)]
    key_aware: bool,
    /// Abort when a row is missing a feature instead of leaving it unscored
    #[arg(long)]
    fail_on_incomplete: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::InspectModel(args) => handle_inspect_model(args),
    }
}

/// File, then `WXSCORE_*` environment, then flags.
fn base_config(
    args: &ModelArgs,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {path:?}"))?,
        None => PipelineConfig::default(),
    };
    config.apply_env(lookup);

    if let Some(folder) = &args.model_folder {
        config.model_folder = folder.clone();
    }
    if let Some(name) = &args.model_filename {
        config.model_filename = name.clone();
    }
    Ok(config)
}

fn run_config(args: &RunArgs, lookup: impl Fn(&str) -> Option<String>) -> Result<PipelineConfig> {
    let mut config = base_config(&args.model, lookup)?;

    if let Some(folder) = &args.input_folder {
        config.input_folder = folder.clone();
    }
    if let Some(name) = &args.output_filename {
        config.output_filename = name.clone();
    }
    if args.skip_malformed_filenames {
        config.filename_policy = FilenamePolicy::Skip;
    }
    if args.key_aware {
        config.field_parsing = FieldParsing::KeyAware;
    }
    if args.fail_on_incomplete {
        config.incomplete_rows = IncompleteRowPolicy::Fail;
    }
    Ok(config)
}

fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn handle_run(args: RunArgs) -> Result<()> {
    dotenvy::dotenv().ok();

    let config = run_config(&args, env_lookup)?;
    info!(
        input_folder = %config.input_folder.display(),
        model = %config.model_path().display(),
        "Starting batch"
    );

    let summary = run_batch(&config)?;
    println!("{}", summary_table(&summary));
    Ok(())
}

fn handle_inspect_model(args: ModelArgs) -> Result<()> {
    dotenvy::dotenv().ok();

    let config = base_config(&args, env_lookup)?;
    let artifact = load_artifact(&config.model_path())?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    match &artifact.model {
        ModelSpec::LogisticRegression(model) => {
            let mut header = vec!["feature".to_string()];
            if model.coef.len() == 1 {
                // Binary models carry one weight row, for the positive class.
                let positive = model.classes.last().map(ToString::to_string);
                header.push(format!("coef ({})", positive.unwrap_or_default()));
            } else {
                header.extend(model.classes.iter().map(|class| format!("coef ({class})")));
            }
            table.set_header(header);

            for (idx, column) in artifact.feature_columns.iter().enumerate() {
                let mut row = vec![column.clone()];
                row.extend(model.coef.iter().map(|weights| format!("{:.6}", weights[idx])));
                table.add_row(row);
            }
            let mut intercept = vec!["(intercept)".to_string()];
            intercept.extend(model.intercept.iter().map(|value| format!("{value:.6}")));
            table.add_row(intercept);
        }
    }

    let classes: Vec<String> = artifact.classes().iter().map(ToString::to_string).collect();
    println!("model: {}", artifact.model.kind());
    println!("classes: {}", classes.join(", "));
    println!("{table}");
    Ok(())
}

fn summary_table(summary: &RunSummary) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["metric", "value"]);
    table.add_row(vec!["files read".to_string(), summary.files_read.to_string()]);
    table.add_row(vec!["files skipped".to_string(), summary.files_skipped.to_string()]);
    table.add_row(vec!["rows".to_string(), summary.rows.to_string()]);
    table.add_row(vec![
        "extraction issues".to_string(),
        summary.extraction_issues.to_string(),
    ]);
    table.add_row(vec!["unscored rows".to_string(), summary.unscored_rows.to_string()]);
    for (class, count) in &summary.class_counts {
        table.add_row(vec![format!("predicted {class}"), count.to_string()]);
    }
    table.add_row(vec![
        "output".to_string(),
        summary.output_path.display().to_string(),
    ]);
    table
}
