pub mod cli;
pub mod clients;
pub mod config;
pub mod constants;
pub mod db;
pub mod domain;
pub mod entities;
pub mod models;
pub mod parser;
pub mod services;
pub mod state;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
pub use config::Config;
pub use state::Engine;

/// Installs the global subscriber. `RUST_LOG` takes precedence over the
/// configured level.
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.general.log_format.eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    init_tracing(&config);

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    };

    if matches!(command, Commands::InitConfig) {
        if Config::create_default_if_missing()? {
            println!("Created config.toml");
        } else {
            println!("config.toml already exists");
        }
        return Ok(());
    }

    let engine = Engine::new(config).await?;

    let result = match command {
        Commands::Daemon => run_daemon(&engine).await,
        Commands::Refresh { ids } => cli::cmd_refresh(&engine, &ids).await,
        Commands::UpdateSeason { season } => cli::cmd_update_season(&engine, season).await,
        Commands::UpdateAll { recent } => cli::cmd_update_all(&engine, recent).await,
        Commands::Reconcile {
            season,
            index,
            ids,
            titles_file,
        } => cli::cmd_reconcile(&engine, season, index, &ids, titles_file.as_deref()).await,
        Commands::Seasons => cli::cmd_list_seasons(&engine).await,
        Commands::Stale { ids } => cli::cmd_stale(&engine, &ids).await,
        Commands::InitConfig => Ok(()),
    };

    if let Err(e) = engine.shutdown().await {
        error!("Failed to close database: {}", e);
    }

    result
}

async fn run_daemon(engine: &Engine) -> anyhow::Result<()> {
    info!(
        "seasonrank v{} starting in daemon mode...",
        env!("CARGO_PKG_VERSION")
    );

    let scheduler = std::sync::Arc::new(engine.scheduler());

    let scheduler_handle = {
        let sched = std::sync::Arc::clone(&scheduler);
        tokio::spawn(async move {
            if let Err(e) = sched.start().await {
                error!("Scheduler error: {}", e);
            }
        })
    };

    info!("Daemon running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }

    scheduler.stop().await;
    if tokio::time::timeout(constants::intervals::SCHEDULER_SHUTDOWN_GRACE, scheduler_handle)
        .await
        .is_err()
    {
        info!("Scheduler did not stop in time, abandoning in-flight run");
    }
    info!("Daemon stopped");

    Ok(())
}
