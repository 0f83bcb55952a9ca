use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};

use crate::config::AppConfig;
use crate::domain::GlobalTable;
use crate::error::{MonitorError, Result};

#[derive(Parser)]
#[command(name = "scorewatch")]
#[command(version)]
#[command(about = "Attack/Defense scoreboard monitor", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (skips the config directory lookup)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory holding default.toml and <SCOREWATCH_ENV>.toml
    #[arg(long, default_value = "config")]
    pub config_dir: PathBuf,

    /// Print tables as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Monitor the configured targets until Ctrl+C, then write the report
    Run,
    /// Poll every target once and print service status
    Check,
    /// Build the rollup report from the persisted store
    Report,
    /// Show the global standings at a round
    Standings {
        /// Round number
        #[arg(short, long)]
        round: u32,
    },
    /// Write an example configuration file
    InitConfig {
        /// Destination path
        #[arg(short, long, default_value = "config/default.toml")]
        output: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub fn command_or_default(&self) -> &Commands {
        self.command.as_ref().unwrap_or(&Commands::Run)
    }

    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from_json_flag(self.json)
    }

    /// Load and validate the configuration; any problem is fatal
    pub fn load_config(&self) -> Result<AppConfig> {
        let config = match &self.config {
            Some(path) => AppConfig::load_file(path)?,
            None => AppConfig::load_from(&self.config_dir)?,
        };
        config.validated()
    }
}

/// Write [`AppConfig::example`] as TOML
pub fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(MonitorError::InvalidConfig(format!(
            "{} already exists (use --force to overwrite)",
            output.display()
        )));
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, AppConfig::example().to_toml()?)?;
    Ok(())
}

#[derive(Debug, Serialize, Tabled)]
pub struct StandingRow {
    pub rank: u32,
    pub team: String,
    pub score: i64,
}

pub fn standing_rows(table: &GlobalTable) -> Vec<StandingRow> {
    table
        .standings()
        .into_iter()
        .map(|entry| StandingRow {
            rank: entry.rank,
            team: entry.team_name.clone(),
            score: entry.score,
        })
        .collect()
}

/// Output mode for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}

/// Print a vec of Tabled + Serialize items in the chosen mode.
pub fn print_items<T: Tabled + Serialize>(items: &[T], mode: OutputMode) -> anyhow::Result<()> {
    match mode {
        OutputMode::Table => {
            if items.is_empty() {
                println!("(no results)");
            } else {
                let table = Table::new(items).to_string();
                println!("{table}");
            }
        }
        OutputMode::Json => {
            let json = serde_json::to_string_pretty(items)?;
            println!("{json}");
        }
    }
    Ok(())
}

pub fn print_success(msg: &str) {
    println!("\x1b[32m{msg}\x1b[0m");
}

pub fn print_warn(msg: &str) {
    println!("\x1b[33m{msg}\x1b[0m");
}

pub fn print_error(msg: &str) {
    eprintln!("\x1b[31m{msg}\x1b[0m");
}
