mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dtx_client::{ClientConfig, TransactionClient, TransportKind};
use tracing_subscriber::EnvFilter;

use commands::{system, transaction, workflow};

/// DTX command line interface
///
/// Runs Saga and TCC workflows against a transaction coordinator and
/// inspects the transactions it holds.
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Client configuration file (TOML)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Coordinator address; repeat to rotate across several coordinators
    #[clap(long = "endpoint", global = true)]
    endpoints: Vec<String>,

    /// Talk to the coordinator over gRPC instead of HTTP
    #[clap(long, global = true)]
    grpc: bool,

    /// Log filter, e.g. `info` or `dtx_client=debug`; overrides RUST_LOG
    #[clap(long, global = true)]
    log_level: Option<String>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check coordinator health
    Health,

    /// Print the coordinator's metrics
    Metrics,

    /// Show one transaction
    Get(transaction::GetArgs),

    /// List transactions
    List(transaction::ListArgs),

    /// Check a workflow file without contacting the coordinator
    Validate(workflow::ValidateArgs),

    /// Run a workflow file
    Run(workflow::RunArgs),
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    // Logs go to stderr so command output stays machine-readable.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn load_client(cli: &Cli) -> Result<TransactionClient> {
    let mut config = ClientConfig::load(cli.config.as_deref())
        .await
        .context("failed to load client configuration")?;
    apply_overrides(&mut config, cli);

    TransactionClient::new(config).context("failed to create transaction client")
}

fn apply_overrides(config: &mut ClientConfig, cli: &Cli) {
    if cli.grpc {
        config.transport = TransportKind::Grpc;
    }
    if !cli.endpoints.is_empty() {
        match config.transport {
            TransportKind::Http => config.http_endpoints = cli.endpoints.clone(),
            TransportKind::Grpc => config.grpc_endpoints = cli.endpoints.clone(),
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.log_level.as_deref());

    match &cli.command {
        Commands::Validate(args) => workflow::execute_validate(args),
        Commands::Health => system::execute_health(&load_client(&cli).await?).await,
        Commands::Metrics => system::execute_metrics(&load_client(&cli).await?).await,
        Commands::Get(args) => transaction::execute_get(&load_client(&cli).await?, args).await,
        Commands::List(args) => transaction::execute_list(&load_client(&cli).await?, args).await,
        Commands::Run(args) => workflow::execute_run(load_client(&cli).await?, args).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
