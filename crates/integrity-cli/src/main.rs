//! # integrity CLI
//!
//! Command-line front end for the integrity storage stress tool.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use integrity_config::{init_logging, log_cli_debug, Config, LogLevel, PROJECT_CONFIG_PATH};

mod recreate;
mod run;
mod verify;

/// Fill a volume with self-verifying files, verify them, reclaim half, repeat.
#[derive(Parser)]
#[command(name = "integrity")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log at debug level (INTEGRITY_LOG and RUST_LOG still take precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the continuous fill/verify/reclaim test in a directory
    Run(run::RunArgs),

    /// Verify integrity files against their names
    Verify {
        #[arg(value_name = "FILE", required = true, num_args = 1..)]
        files: Vec<PathBuf>,
    },

    /// Recreate a file from an explicit seed and size
    Recreate(recreate::RecreateArgs),

    /// Show configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file locations
    Path,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::load().context("Failed to load configuration")?;

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        config.logging.level.parse().unwrap_or(LogLevel::Warn)
    };
    init_logging(level);
    log_cli_debug!(
        "Configuration loaded",
        reserve_percent = config.fill.reserve_percent,
        max_file_size = config.fill.max_file_size,
    );

    match cli.command {
        Commands::Run(args) => run::cmd_run(&config, args),
        Commands::Verify { files } => verify::cmd_verify(&files),
        Commands::Recreate(args) => recreate::cmd_recreate(&config, args),
        Commands::Config { command } => cmd_config(&config, command),
    }
}

fn cmd_config(config: &Config, command: ConfigCommands) -> Result<ExitCode> {
    match command {
        ConfigCommands::Show => {
            print!("{}", config.to_toml().context("Failed to render config")?);
        }
        ConfigCommands::Path => {
            let global = Config::global_config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(no home directory)".to_string());
            println!("Global:  {}", global);
            println!("Project: {}", PROJECT_CONFIG_PATH);
        }
    }
    Ok(ExitCode::SUCCESS)
}
