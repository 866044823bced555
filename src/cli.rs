use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use log::info;
use serde::Serialize;
use std::path::PathBuf;
use tokio::net::TcpListener;

use crate::alerts::channels_from_config;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::ingest::{Ingestor, Poller};
use crate::output::{self, bright, Spinner};
use crate::providers::AdapterRegistry;
use crate::server::{self, AppState};
use crate::store::BuildStore;

#[derive(Parser)]
#[command(name = "cipulse")]
#[command(author, version, about = "CI build status collector", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (TOML, JSON or YAML)
    #[arg(short, long, global = true, env = "CIPULSE_CONFIG")]
    config: Option<PathBuf>,

    /// Write JSON results to this file
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,

    /// Print JSON instead of a table
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the poller and the HTTP server until Ctrl-C
    Serve {
        #[arg(short, long, env = "BIND_ADDR")]
        bind: Option<String>,
    },
    /// Run one poll pass and print the transitions it produced
    Collect,
    /// Show the most recently started stored builds
    History {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

/// Opens the store and wires adapters, alert channels and the dispatcher.
fn build_ingestor(config: &Config) -> Result<Ingestor> {
    let store = BuildStore::open(&config.server.database_path).with_context(|| {
        format!(
            "Failed to open build store at {}",
            config.server.database_path.display()
        )
    })?;
    let registry = AdapterRegistry::from_config(config).context("Failed to set up providers")?;
    let channels = channels_from_config(&config.alerts, config.server.alert_timeout())
        .context("Failed to set up alert channels")?;

    Ok(Ingestor::new(
        registry,
        config.server.providers.clone(),
        store,
        Dispatcher::new(channels, config.server.alert_timeout()),
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

impl Cli {
    fn emit<T: Serialize>(&self, value: &T, table: impl FnOnce() -> Table) -> Result<()> {
        let json_output = || -> Result<String> {
            Ok(if self.pretty {
                serde_json::to_string_pretty(value)?
            } else {
                serde_json::to_string(value)?
            })
        };

        if let Some(output_path) = &self.output {
            std::fs::write(output_path, json_output()?)
                .with_context(|| format!("Failed to write {}", output_path.display()))?;
            info!("Results written to: {}", output_path.display());
        } else if self.json {
            println!("{}", json_output()?);
        } else {
            println!("{}", table());
        }
        Ok(())
    }

    async fn execute_serve(&self, config: &Config, bind: Option<&str>) -> Result<()> {
        let ingestor = build_ingestor(config)?;
        let bind = bind.unwrap_or(config.server.bind.as_str());

        let listener = TcpListener::bind(bind)
            .await
            .with_context(|| format!("Failed to bind {bind}"))?;

        let poller = Poller::spawn(ingestor.clone(), config.server.poll_interval());
        let state = AppState::new(ingestor, config.server.webhook_secret.clone());

        let served = server::serve(listener, state, shutdown_signal()).await;
        poller.shutdown().await;
        served.context("HTTP server failed")
    }

    async fn execute_collect(&self, config: &Config) -> Result<()> {
        let ingestor = build_ingestor(config)?;

        let spinner = Spinner::start("Polling providers");
        let (transitions, alerts) = match ingestor.run_once().await {
            Ok(result) => result,
            Err(e) => {
                spinner.fail("Poll pass failed");
                return Err(e).context("Poll pass failed");
            }
        };
        spinner.finish(&format!("{} transitions", transitions.len()));

        // Let alerts go out before the process exits.
        alerts.await.context("Alert delivery task failed")?;

        self.emit(&transitions, || output::transitions_table(&transitions))
    }

    async fn execute_history(&self, config: &Config, limit: usize) -> Result<()> {
        let store = BuildStore::open(&config.server.database_path).with_context(|| {
            format!(
                "Failed to open build store at {}",
                config.server.database_path.display()
            )
        })?;

        let builds = store.recent_builds(limit).await?;
        eprintln!(
            "{}  {}",
            bright("🗂"),
            bright(format!("{} most recent builds", builds.len())).underlined()
        );
        self.emit(&builds, || output::builds_table(&builds))
    }

    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Serve { bind } => self.execute_serve(&config, bind.as_deref()).await,
            Commands::Collect => self.execute_collect(&config).await,
            Commands::History { limit } => self.execute_history(&config, *limit).await,
        }
    }
}
