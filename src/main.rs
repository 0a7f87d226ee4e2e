use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod bootstrap;
mod config;
mod error;
mod factor;
mod models;
mod pipeline;
mod report;
mod scenario;
mod stats;
mod table;
#[cfg(test)]
mod testutil;
mod writer;

use config::GoldConfig;
use models::ObservationTable;
use pipeline::GoldPipeline;
use writer::{GoldWriter, RunContext, StageManifest};

#[derive(Parser)]
#[command(name = "traffic-gold")]
#[command(about = "Gold-layer analytics for the traffic and weather data lake")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StageArgs {
    /// Cleaned, merged observation table (CSV)
    #[arg(long)]
    input: PathBuf,
    /// JSON configuration; built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory holding the Gold tables
    #[arg(long, default_value = "gold")]
    gold_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration
    InitConfig {
        #[arg(long, default_value = "gold.json")]
        out: PathBuf,
    },
    /// Run all three Gold stages concurrently
    Run {
        #[command(flatten)]
        stage: StageArgs,
        #[arg(long = "scenario")]
        scenarios: Vec<String>,
        #[arg(long = "variable")]
        variables: Vec<String>,
    },
    /// Extract latent factors
    Factors {
        #[command(flatten)]
        stage: StageArgs,
    },
    /// Simulate weather scenarios
    Simulate {
        #[command(flatten)]
        stage: StageArgs,
        #[arg(long = "scenario")]
        scenarios: Vec<String>,
    },
    /// Bootstrap confidence intervals
    Bootstrap {
        #[command(flatten)]
        stage: StageArgs,
        #[arg(long = "variable")]
        variables: Vec<String>,
    },
    /// Generate a markdown report from committed Gold tables
    Report {
        #[command(flatten)]
        stage: StageArgs,
        #[arg(long, default_value = "gold_report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitConfig { out } => {
            let json = serde_json::to_string_pretty(&GoldConfig::default())?;
            std::fs::write(&out, json)?;
            println!("Default configuration written to {}.", out.display());
        }
        Commands::Run {
            stage,
            scenarios,
            variables,
        } => {
            let (pipeline, config) = open_pipeline(&stage)?;
            let scenarios = config.select_scenarios(&scenarios)?;
            let variables = config.select_variables(&variables);
            let outcomes = pipeline.run_all(scenarios, variables).await;

            let mut failed = 0;
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(manifest) => print_manifest(manifest),
                    Err(err) => {
                        failed += 1;
                        println!("- {} failed: {err}", outcome.stage);
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{failed} of {} gold stages failed", outcomes.len());
            }
            println!("Gold tables ready in {}.", pipeline.gold_dir().display());
        }
        Commands::Factors { stage } => {
            let (pipeline, _) = open_pipeline(&stage)?;
            let manifest = tokio::task::spawn_blocking(move || pipeline.factors()).await??;
            print_manifest(&manifest);
        }
        Commands::Simulate { stage, scenarios } => {
            let (pipeline, config) = open_pipeline(&stage)?;
            let scenarios = config.select_scenarios(&scenarios)?;
            let manifest =
                tokio::task::spawn_blocking(move || pipeline.scenarios(&scenarios)).await??;
            print_manifest(&manifest);
        }
        Commands::Bootstrap { stage, variables } => {
            let (pipeline, config) = open_pipeline(&stage)?;
            let variables = config.select_variables(&variables);
            let manifest =
                tokio::task::spawn_blocking(move || pipeline.bootstrap(&variables)).await??;
            print_manifest(&manifest);
        }
        Commands::Report { stage, out } => {
            let config = load_config(stage.config.as_deref())?;
            let table = load_table(&stage.input)?;
            let context = RunContext::new(&stage.input, &config)?;
            let writer = GoldWriter::new(&stage.gold_dir)?;
            let artifacts = report::load_artifacts(&writer, &context.input_fingerprint, &config)
                .context("gold artifacts are not up to date; rerun the gold stages first")?;
            let report = report::build_report(
                &stage.input.display().to_string(),
                &table.weather_summary(&config.traffic_metric),
                &artifacts,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<GoldConfig> {
    match path {
        Some(path) => GoldConfig::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display())),
        None => Ok(GoldConfig::default()),
    }
}

fn load_table(path: &Path) -> anyhow::Result<ObservationTable> {
    let table = ObservationTable::from_path(path)
        .with_context(|| format!("failed to load observations from {}", path.display()))?;
    tracing::info!(
        rows = table.len(),
        variables = ?table.numeric_names(),
        "observation table loaded"
    );
    Ok(table)
}

fn open_pipeline(args: &StageArgs) -> anyhow::Result<(GoldPipeline, GoldConfig)> {
    let config = load_config(args.config.as_deref())?;
    let table = load_table(&args.input)?;
    let context = RunContext::new(&args.input, &config)?;
    let writer = GoldWriter::new(&args.gold_dir)
        .with_context(|| format!("cannot prepare gold directory {}", args.gold_dir.display()))?;
    Ok((GoldPipeline::new(table, config.clone(), writer, context), config))
}

fn print_manifest(manifest: &StageManifest) {
    let files: Vec<&str> = manifest
        .artifacts
        .iter()
        .map(|artifact| artifact.file.as_str())
        .collect();
    println!(
        "- {} committed {} rows to {} (run {})",
        manifest.stage,
        manifest.rows,
        files.join(", "),
        manifest.run_id
    );
}
