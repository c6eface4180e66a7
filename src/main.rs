use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fetchq::config::Config;
use fetchq::coordinator::{console, CoordinatorServer};
use fetchq::worker::{FetchExtract, PageFetcher, WorkerPool};

#[derive(Parser)]
#[command(
    name = "fetchq",
    version,
    about = "Distributed URL-fetch task queue with a coordinator and pull-based workers",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the config file
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the coordinator process
    Coordinator {
        /// Bind address, e.g. 127.0.0.1:5000; overrides the config file
        #[arg(short, long)]
        bind: Option<String>,

        /// URL to enqueue at startup (repeatable)
        #[arg(long = "seed-url")]
        seed_urls: Vec<String>,

        /// Priority for seeded URLs
        #[arg(long, default_value = "5")]
        seed_priority: i32,

        /// Disable the stdin command console
        #[arg(long, default_value = "false")]
        no_console: bool,
    },

    /// Run a pool of worker agents
    Worker {
        /// Coordinator address, e.g. 127.0.0.1:5000; overrides the config file
        #[arg(long)]
        coordinator: Option<String>,

        /// Number of agents in the pool; overrides the config file
        #[arg(short, long)]
        pool_size: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref());
    setup_tracing(&config, cli.log_format.as_deref(), cli.verbose)?;

    tracing::info!("fetchq starting");

    match cli.command {
        Commands::Coordinator {
            bind,
            seed_urls,
            seed_priority,
            no_console,
        } => {
            tracing::info!(
                bind = ?bind,
                seed_urls = seed_urls.len(),
                "starting coordinator command"
            );
            coordinator(config, bind, seed_urls, seed_priority, no_console).await?;
        }

        Commands::Worker {
            coordinator,
            pool_size,
        } => {
            tracing::info!(
                coordinator = ?coordinator,
                pool_size = ?pool_size,
                "starting worker command"
            );
            worker(config, coordinator, pool_size).await?;
        }
    }

    tracing::info!("fetchq exiting");
    Ok(())
}

fn setup_tracing(config: &Config, format_override: Option<&str>, verbose: bool) -> Result<()> {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let env_filter = tracing_subscriber::EnvFilter::try_new(format!("fetchq={level},warn"))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("fetchq=info,warn"));

    let format = format_override.unwrap_or(config.logging.format.as_str());
    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

async fn coordinator(
    config: Config,
    bind: Option<String>,
    seed_urls: Vec<String>,
    seed_priority: i32,
    no_console: bool,
) -> Result<()> {
    if let Err(e) = fetchq::metrics::init_metrics() {
        tracing::warn!(error = %e, "metrics initialization failed, continuing without metrics");
    }

    let mut server_config = config.coordinator.to_server_config();
    if let Some(bind) = bind {
        server_config.bind_address = bind
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid bind address: {bind}"))?;
    }

    let server = CoordinatorServer::new(server_config)?;

    for url in &seed_urls {
        let id = server.add_task(url.clone(), seed_priority).await;
        tracing::debug!(task_id = %id, url = %url, "seeded task");
    }
    if !seed_urls.is_empty() {
        tracing::info!(count = seed_urls.len(), "seeded startup URLs");
    }

    let (console_tx, console_rx) = tokio::sync::watch::channel(false);
    if !no_console {
        tokio::spawn(console::run_console(server.state(), console_rx));
    }

    server.start_with_shutdown(shutdown_signal()).await?;
    let _ = console_tx.send(true);

    Ok(())
}

async fn worker(
    config: Config,
    coordinator: Option<String>,
    pool_size: Option<usize>,
) -> Result<()> {
    let addr = coordinator.unwrap_or_else(|| config.worker.coordinator_addr());
    let size = pool_size.unwrap_or(config.worker.pool_size).max(1);

    let fetcher = PageFetcher::new(config.worker.fetcher_config())?;
    let executor: Arc<dyn FetchExtract> = Arc::new(fetcher);

    let pool = WorkerPool::spawn(size, &addr, executor, config.worker.agent_config());
    tracing::info!(pool_size = size, coordinator = %addr, "worker pool started");

    shutdown_signal().await;
    tracing::info!("stopping worker pool");
    pool.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
