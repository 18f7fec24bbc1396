//! CLI entry and dispatch.

use std::time::Duration;

use anyhow::{Context, Result};
use buildboard_core::config::{self, Config};
use buildboard_core::visibility::VisibilitySource;
use clap::Parser;

mod commands;

#[derive(Parser)]
#[command(name = "buildboard")]
#[command(version)]
#[command(about = "Live terminal dashboard for build executions")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    watch: WatchArgs,
}

/// Options for the live dashboard.
#[derive(clap::Args, Debug, Clone, Default)]
struct WatchArgs {
    /// Push endpoint URL (overrides config and BUILDBOARD_URL)
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Where visibility comes from: focus, always or never
    #[arg(long, value_name = "SOURCE")]
    visibility: Option<VisibilitySource>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run the live dashboard (default)
    Watch(WatchArgs),

    /// Connect once and print the execution tree as plain text
    Snapshot {
        /// Push endpoint URL (overrides config and BUILDBOARD_URL)
        #[arg(long, value_name = "URL")]
        url: Option<String>,

        /// Stop collecting after this many seconds if the server keeps the
        /// stream open
        #[arg(long, value_name = "N", default_value_t = 10)]
        timeout_secs: u64,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
        Some(Commands::Snapshot { url, timeout_secs }) => {
            let config = load_config(url, Some(VisibilitySource::Never))?;
            commands::snapshot::run(&config, Duration::from_secs(timeout_secs)).await
        }
        Some(Commands::Watch(args)) => {
            let config = load_config(args.url, args.visibility)?;
            commands::watch::run(&config)
        }
        None => {
            let config = load_config(cli.watch.url, cli.watch.visibility)?;
            commands::watch::run(&config)
        }
    }
}

fn load_config(url: Option<String>, visibility: Option<VisibilitySource>) -> Result<Config> {
    let config = Config::load().context("load config")?;
    let env_url = std::env::var(config::URL_ENV).ok();
    Ok(config.with_overrides(url, env_url, visibility))
}
