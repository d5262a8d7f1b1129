// file: src/main.rs
// description: commandline application entry point for single and batch propagation
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use clap::{ArgAction, CommandFactory, Parser};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};
use wavefront_prop::utils::logging::{format_error, format_info, format_success};
use wavefront_prop::{
    BatchCoordinator, BatchNaming, BeamlineBuilder, Config, ContainerEngine, ItemStatus,
    Propagator, Validator, config::default_worker_count,
};

#[derive(Parser)]
#[command(name = "wavefront_prop")]
#[command(author = "cipher")]
#[command(version = "0.1.0")]
#[command(about = "Propagate X-ray wavefront records through a beamline", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    /// Single record to propagate
    #[arg(long, value_name = "FILE", requires = "output_file")]
    input_file: Option<PathBuf>,

    #[arg(long, value_name = "FILE", requires = "input_file")]
    output_file: Option<PathBuf>,

    /// Directory scanned for records carrying the input prefix
    #[arg(long, value_name = "DIR", requires = "output_directory")]
    input_directory: Option<PathBuf>,

    #[arg(long, value_name = "DIR", requires = "input_directory")]
    output_directory: Option<PathBuf>,

    /// Number of parallel workers in batch mode
    #[arg(short = 'n', long, value_name = "NUM", env = "WAVEFRONT_PROP_CPUS")]
    cpu_number: Option<usize>,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[arg(long, action = ArgAction::SetTrue)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    wavefront_prop::utils::logging::init_logger(cli.color, cli.verbose);

    info!("Wavefront batch propagation");
    info!("Loading configuration from: {}", cli.config.display());

    let config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        Config::default_config()
    };

    match (
        &cli.input_directory,
        &cli.output_directory,
        &cli.input_file,
        &cli.output_file,
    ) {
        (Some(input_dir), Some(output_dir), _, _) => {
            cmd_batch(&config, &cli, input_dir, output_dir).await
        }
        (_, _, Some(input), Some(output)) => cmd_single(&config, input, output).await,
        _ => Cli::command()
            .error(
                clap::error::ErrorKind::MissingRequiredArgument,
                "either --input-file/--output-file or --input-directory/--output-directory is required",
            )
            .exit(),
    }
}

async fn cmd_single(config: &Config, input: &Path, output: &Path) -> Result<()> {
    Validator::validate_input_file(input)?;

    let propagator = Propagator::from_config(ContainerEngine::new(), config)
        .context("Failed to build beamline")?;
    info!("Beamline:\n{}", propagator.beamline());

    let start = Instant::now();
    let (input_path, output_path) = (input.to_path_buf(), output.to_path_buf());
    tokio::task::spawn_blocking(move || propagator.propagate(&input_path, &output_path))
        .await
        .context("Propagation task failed")?
        .with_context(|| format!("Failed to propagate {}", input.display()))?;

    println!(
        "{}",
        format_success(&format!(
            "Propagated {} -> {} in {:.2}s",
            input.display(),
            output.display(),
            start.elapsed().as_secs_f64()
        ))
    );

    Ok(())
}

async fn cmd_batch(config: &Config, cli: &Cli, input_dir: &Path, output_dir: &Path) -> Result<()> {
    let workers = cli
        .cpu_number
        .or(config.batch.workers)
        .unwrap_or_else(default_worker_count);

    let beamline = BeamlineBuilder::new(config.beamline.clone())
        .build()
        .context("Failed to build beamline")?;
    info!("Beamline:\n{}", beamline);

    let worker_config = config.clone();
    let coordinator = BatchCoordinator::new(
        move || Propagator::from_config(ContainerEngine::new(), &worker_config),
        BatchNaming::from_config(&config.batch),
        workers,
    )?
    .with_progress(config.batch.show_progress && !cli.no_progress);

    let report = coordinator
        .run(input_dir, output_dir)
        .await
        .context("Batch propagation failed")?;

    println!(
        "{}",
        format_info(&format!(
            "Discovered {} files, propagated {} with {} workers in {:.2}s",
            report.discovered,
            report.stats.files_processed,
            coordinator.workers(),
            report.stats.duration_secs
        ))
    );

    for outcome in report.failures() {
        if let ItemStatus::Failed { kind, message } = &outcome.status {
            println!(
                "{}",
                format_error(&format!(
                    "{} ({} error): {}",
                    outcome.input.display(),
                    kind,
                    message
                ))
            );
        }
    }

    if report.stats.files_failed == 0 {
        println!("{}", format_success("Batch complete"));
    }

    Ok(())
}
