//! partsql - Main entry point
//!
//! Loads the configuration, builds the template registry, and hands the run
//! to the dispatcher on a single-threaded tokio runtime.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use partsql::cli::{Cli, Commands};
use partsql::{
    ConfigShardResolver, ConsoleReporter, Dispatcher, JobRunner, PartSqlConfig, PartSqlError,
    PgConnector, RunRequest, RunSummary, StdinConfirm, TemplateRegistry,
};

/// Initialize the logger with appropriate settings
fn init_logger() {
    // RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Main application entry point
fn main() -> Result<()> {
    init_logger();

    let cli = Cli::parse_args();
    debug!("CLI arguments parsed");

    let config = PartSqlConfig::load_from_file(&cli.config)?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {:?}", cli.config))?;
    let registry = config.build_registry()?;

    match cli.command {
        Commands::List => {
            for template in registry.iter() {
                println!("{}\t{}", template.name(), template.run_mode());
            }
        }
        Commands::Run {
            name,
            dbname,
            chunk_size,
        } => {
            let request = RunRequest {
                name,
                dbname,
                chunk_size,
            };
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            let code = runtime.block_on(run_template(&config, &registry, &request, cli.dry_run))?;
            if code != 0 {
                std::process::exit(code);
            }
        }
    }

    Ok(())
}

/// Run one template and return the process exit code.
async fn run_template(
    config: &PartSqlConfig,
    registry: &TemplateRegistry,
    request: &RunRequest,
    dry_run: bool,
) -> Result<i32> {
    let resolver = ConfigShardResolver::new(config);
    let confirm = StdinConfirm;
    let runner = JobRunner::new(
        Arc::new(PgConnector::from_config(config)),
        Arc::new(ConsoleReporter),
    );
    let dispatcher = Dispatcher::new(registry, &resolver, &confirm, runner);

    if dry_run {
        let plan = dispatcher.plan(request)?;
        println!("-- template: {} ({})", plan.template, plan.run_mode);
        let targets: Vec<_> = plan.shards.iter().map(|s| s.alias()).collect();
        println!("-- databases: {}", targets.join(", "));
        if plan.requires_confirmation() {
            println!("-- would ask for confirmation before running in parallel");
        }
        println!("{}", plan.statement.as_str().trim());
        return Ok(0);
    }

    let summary = match dispatcher.run(request).await {
        Ok(report) => report.summary(&request.name),
        Err(PartSqlError::UserDeclined { shards }) => {
            info!(shards, "aborted by operator");
            RunSummary::declined()
        }
        Err(err) => return Err(err.into()),
    };

    if summary.success {
        info!(template = %request.name, "completed");
        println!("{}", summary.line);
    } else {
        error!(template = %request.name, "run did not complete");
        eprintln!("{}", summary.line);
    }
    Ok(summary.exit_code())
}
