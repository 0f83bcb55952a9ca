use clap::Parser;
use scorewatch::adapters::{build_notifier, ScoreboardClient, ScoreboardSource};
use scorewatch::analysis::{write_report, DowntimeScope, RollupReporter, RollupRow};
use scorewatch::cli::{self, Cli, Commands};
use scorewatch::config::AppConfig;
use scorewatch::error::Result;
use scorewatch::persistence::MetricStore;
use scorewatch::services::{
    probe_targets, HealthServer, HealthState, Monitor, MonitorMetrics, MonitorOutcome,
};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::time::Duration;
use tracing::{error, info, warn};

mod main_runtime;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command_or_default() {
        Commands::InitConfig { output, force } => {
            main_runtime::init_logging_simple();
            cli::init_config(output, *force)?;
            cli::print_success(&format!("Wrote example configuration to {}", output.display()));
        }
        Commands::Run => {
            let config = load_config(&cli, true)?;
            run_monitor(config).await?;
        }
        Commands::Check => {
            let config = load_config(&cli, false)?;
            run_check(&cli, &config).await?;
        }
        Commands::Report => {
            let config = load_config(&cli, false)?;
            run_report(&cli, &config).await?;
        }
        Commands::Standings { round } => {
            let config = load_config(&cli, false)?;
            run_standings(&cli, &config, *round).await?;
        }
    }

    Ok(())
}

/// Configuration problems stop the process before anything starts
fn load_config(cli: &Cli, full_logging: bool) -> Result<AppConfig> {
    match cli.load_config() {
        Ok(config) => {
            if full_logging {
                main_runtime::init_logging(&config.logging);
            } else {
                main_runtime::init_logging_simple();
            }
            Ok(config)
        }
        Err(e) => {
            main_runtime::init_logging_simple();
            error!("Failed to load configuration: {}", e);
            cli::print_error(&format!("✗ {}", e));
            Err(e)
        }
    }
}

fn build_source(config: &AppConfig) -> Result<Arc<dyn ScoreboardSource>> {
    Ok(Arc::new(ScoreboardClient::new(
        &config.scoreboard.base_url,
        config.request_timeout(),
    )?))
}

async fn open_store(config: &AppConfig) -> Result<MetricStore> {
    if config.storage.persist {
        MetricStore::open(&config.storage.database_path).await
    } else {
        MetricStore::in_memory().await
    }
}

async fn run_monitor(config: AppConfig) -> Result<()> {
    info!("Starting scoreboard monitor");

    let catalog = config.service_catalog()?;
    let source = build_source(&config)?;
    let notifier = build_notifier(&config.notify, config.request_timeout())?;
    let store = open_store(&config).await?;
    let metrics = Arc::new(MonitorMetrics::new());

    let mut monitor = Monitor::new(
        config.monitor.targets.clone(),
        catalog,
        config.poll_interval(),
        source,
        notifier,
        store.clone(),
    )?
    .with_notify_on_start(config.monitor.notify_on_start)
    .with_metrics(Arc::clone(&metrics));

    // Spawn status server
    let health_handle = match config.health_port() {
        Some(port) => {
            let staleness =
                (config.poll_interval() * 3 + config.request_timeout()).max(Duration::from_secs(30));
            let state = Arc::new(HealthState::new(staleness).with_metrics(Arc::clone(&metrics)));
            state.set_store_connected(store.ping().await);
            monitor = monitor.with_health(Arc::clone(&state));

            let server = HealthServer::new(state, port);
            Some(tokio::spawn(async move {
                if let Err(e) = server.run().await {
                    error!("Status server error: {}", e);
                }
            }))
        }
        None => None,
    };

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutting down...");
        let _ = shutdown_tx.send(());
    });

    info!("Monitor is running. Press Ctrl+C to stop.");
    let outcome = monitor.run(shutdown_rx).await;

    if let Some(handle) = health_handle {
        handle.abort();
    }

    info!(
        "Stopped after {} ticks; downtime per team: {:?}",
        outcome.ticks, outcome.downtime
    );

    finish_run(&config, &store, &outcome).await?;
    store.close().await;

    info!("Shutdown complete");
    Ok(())
}

/// Final report, then drop the data of a transient store
async fn finish_run(config: &AppConfig, store: &MetricStore, outcome: &MonitorOutcome) -> Result<()> {
    if config.report.enabled {
        let rollups = RollupReporter::new(store)
            .all(&outcome.downtime, &outcome.services)
            .await;
        match write_report(
            &config.report.output_dir,
            &rollups,
            DowntimeScope::ThisRun,
            chrono::Utc::now(),
        ) {
            Ok(path) => cli::print_success(&format!("Report written to {}", path.display())),
            Err(e) => warn!("Could not write report: {}", e),
        }
        let rows: Vec<RollupRow> = rollups.iter().map(RollupRow::from).collect();
        cli::print_items(&rows, cli::OutputMode::Table)?;
    }

    if store.is_transient() {
        store.reset().await?;
    }
    Ok(())
}

async fn run_check(cli: &Cli, config: &AppConfig) -> Result<()> {
    let source = build_source(config)?;
    let catalog = config.service_catalog()?;

    let (rows, failures) = probe_targets(source.as_ref(), &config.monitor.targets, &catalog).await;
    cli::print_items(&rows, cli.output_mode())?;

    for (team, e) in &failures {
        cli::print_warn(&format!("{}: {}", team, e));
    }
    Ok(())
}

async fn run_report(cli: &Cli, config: &AppConfig) -> Result<()> {
    if !config.storage.persist {
        cli::print_warn("storage.persist is false: nothing was persisted to report on");
        return Ok(());
    }

    let store = MetricStore::open(&config.storage.database_path).await?;
    let reporter = RollupReporter::new(&store);
    let downtime = reporter.downtime_from_store(&config.monitor.targets).await;
    let services = config.service_catalog()?.names();
    let rollups = reporter.all(&downtime, &services).await;

    let path = write_report(
        &config.report.output_dir,
        &rollups,
        DowntimeScope::StoredHistory,
        chrono::Utc::now(),
    )?;
    let rows: Vec<RollupRow> = rollups.iter().map(RollupRow::from).collect();
    cli::print_items(&rows, cli.output_mode())?;
    cli::print_success(&format!("Report written to {}", path.display()));

    store.close().await;
    Ok(())
}

async fn run_standings(cli: &Cli, config: &AppConfig, round: u32) -> Result<()> {
    let source = build_source(config)?;
    let table = source.global_table(round).await?;
    cli::print_items(&cli::standing_rows(&table), cli.output_mode())?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
