//! DroidKit command-line shell
//!
//! Loads configuration, sets up logging, opens the persisted value context
//! and runs one command against it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use droidkit::commands::{NetCommand, StoreAction, StoreCommand};
use droidkit::core::{AppConfig, APP_NAME, VERSION};
use droidkit::prefs::{PrefsContext, StoreKind};

#[derive(Parser)]
#[command(name = "droidkit", version, about = "Observer registry and persisted value tools")]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory that relative store paths resolve against
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read or change preferences
    Pref {
        #[command(subcommand)]
        action: ActionArgs,
    },
    /// Read or change keeper values
    Keep {
        #[command(subcommand)]
        action: ActionArgs,
    },
    /// Feed link events (`interface:state`) through a network registry
    Net {
        #[arg(required = true)]
        events: Vec<String>,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Subcommand)]
enum ActionArgs {
    /// Print one value
    Get { key: String },
    /// Store a value
    Set {
        key: String,
        value: String,
        /// Store the value as text without type detection
        #[arg(long)]
        text: bool,
    },
    /// Remove one key
    Remove { key: String },
    /// Print every key and value
    List,
    /// Remove every key
    Clear,
}

impl From<ActionArgs> for StoreAction {
    fn from(args: ActionArgs) -> Self {
        match args {
            ActionArgs::Get { key } => StoreAction::Get { key },
            ActionArgs::Set { key, value, text } => StoreAction::Set { key, value, text },
            ActionArgs::Remove { key } => StoreAction::Remove { key },
            ActionArgs::List => StoreAction::List,
            ActionArgs::Clear => StoreAction::Clear,
        }
    }
}

/// Main entry point
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).await?;
    init_logging(&config, cli.log_level.as_deref())?;

    info!("{} v{} starting...", APP_NAME, VERSION);

    let lines = match cli.command {
        Command::Pref { action } => run_store(&config, cli.data_dir, StoreKind::Preferences, action).await?,
        Command::Keep { action } => run_store(&config, cli.data_dir, StoreKind::Keeper, action).await?,
        Command::Net { events } => NetCommand {
            events,
            log_each_round: config.network.log_each_round,
        }
        .execute()?,
        Command::Config => vec![toml::to_string_pretty(&config)?],
    };

    for line in lines {
        println!("{}", line);
    }

    Ok(())
}

/// Load configuration from `path` or the default location
async fn load_config(path: Option<&std::path::Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::load_from(path).await,
        None => AppConfig::load().await,
    };
    config.context("failed to load configuration")
}

/// Install the global tracing subscriber
fn init_logging(config: &AppConfig, level_override: Option<&str>) -> Result<()> {
    let level: Level = level_override
        .unwrap_or(config.logging.level.as_str())
        .parse()
        .context("invalid log level")?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_file(config.logging.with_file)
        .with_line_number(config.logging.with_file)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

async fn run_store(
    config: &AppConfig,
    data_dir: Option<PathBuf>,
    kind: StoreKind,
    action: ActionArgs,
) -> Result<Vec<String>> {
    let paths = config.prefs_paths(data_dir.as_deref())?;
    debug!("Stores: {:?} / {:?}", paths.preferences_file, paths.keeper_file);

    let ctx = PrefsContext::open(&paths).await?;
    StoreCommand {
        kind,
        action: action.into(),
        autosave: paths.autosave,
    }
    .execute(&ctx)
    .await
}
