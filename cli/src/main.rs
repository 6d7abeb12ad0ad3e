use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use fee_sync::{ConfigError, FeeSyncConfig};
use tracing_subscriber::EnvFilter;

mod fee;
mod status;
use fee::FeeCmd;
use status::StatusCmd;

#[derive(Parser)]
#[command(name = "fee-sync")]
#[command(about = "Inspect and update foreign-chain fee policy")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = "fee_sync.toml")]
    config: PathBuf,

    /// Log output format: `plain` or `json`
    #[arg(long, global = true, default_value = "plain")]
    log_format: String,

    /// Log level directives (e.g. `info`, `fee_sync::gateway=debug`)
    #[arg(long = "log-level", global = true, value_name = "LEVEL", num_args = 0.., default_values_t = vec!["warn".to_string()])]
    log_level: Vec<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Fee(FeeCmd),
    #[command(flatten)]
    Status(StatusCmd),
}

fn init_tracing(log_level: &[String], log_format: &str) {
    let filter = EnvFilter::new(log_level.join(","));
    let fmt = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if log_format == "json" {
        fmt.json().init();
    } else {
        fmt.init();
    }
}

fn load_config(path: &Path) -> Result<FeeSyncConfig, ConfigError> {
    let mut config = FeeSyncConfig::load_or_default(path)?;
    config.apply_env()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, &cli.log_format);
    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    let result = match cli.cmd {
        Commands::Fee(cmd) => fee::handle(cmd, &config).await,
        Commands::Status(cmd) => status::handle(cmd, &config).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
