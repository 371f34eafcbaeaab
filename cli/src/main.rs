mod config;

use clap::Parser;
use config::Config;
use livepoll_api::ApiState;
use livepoll_core::{AdmissionPolicy, BroadcastHub, MemoryStore, PollService, PollStore, SledStore};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "livepolld")]
#[command(about = "LivePoll server: polls with live-updating results")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"))]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Address to listen on (overrides [server] bind)
    #[arg(short, long, value_name = "ADDR")]
    bind: Option<String>,

    /// sled database directory (overrides [storage] path)
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Keep polls and votes in memory only
    #[arg(long)]
    ephemeral: bool,

    /// Apply duplicate-vote checks to loopback clients too
    #[arg(long)]
    no_loopback_exempt: bool,
}

fn apply_cli(config: &mut Config, cli: &Cli) {
    if let Some(bind) = &cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(dir) = &cli.data_dir {
        config.storage.path = dir.clone();
    }
    if cli.ephemeral {
        config.storage.ephemeral = true;
    }
    if cli.no_loopback_exempt {
        config.voting.loopback_exempt = false;
    }
}

fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "ctrl_c_listener_failed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown_requested");
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.bind_addr()?;

    let store: Arc<dyn PollStore> = if config.storage.ephemeral {
        tracing::warn!("ephemeral_storage: polls and votes will not survive a restart");
        Arc::new(MemoryStore::new())
    } else {
        let store = SledStore::open(&config.storage.path)?;
        tracing::info!(path = %store.path(), "storage_opened");
        Arc::new(store)
    };

    let policy = AdmissionPolicy {
        loopback_exempt: config.voting.loopback_exempt,
    };
    if policy.loopback_exempt {
        tracing::warn!("loopback clients may vote repeatedly; disable with --no-loopback-exempt");
    }

    let hub = Arc::new(BroadcastHub::new());
    let service = Arc::new(PollService::new(store, policy, hub));

    println!("{}", "LivePoll Server".cyan().bold());
    println!("{} http://{}", "Listening on".bright_black(), addr);
    println!("{} ws://{}/socket\n", "Live results".bright_black(), addr);

    livepoll_api::start_server(addr, ApiState::new(service), shutdown_signal()).await?;

    tracing::info!("server_stopped");
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match Config::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Error: could not load config {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    apply_cli(&mut config, &cli);

    init_logging(&config.logging.filter);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "server_failed");
        std::process::exit(1);
    }
}
