//! Command-line inspector for paginated audio storybooks.
//!
//! Answers layout and narration questions for a document of a given length
//! without opening it, and inspects or clears the persisted reading session.

mod error;
mod report;

use crate::error::{ErrorKind, Result};
use crate::report::{Navigation, Narration, describe_session, spread_lines};
use clap::{Args, Parser, Subcommand};
use exn::ResultExt;
use std::path::PathBuf;
use std::sync::Arc;
use storybook_config::{AudioMap, Config, default_session_path};
use storybook_engine::SessionTracker;
use storybook_provider::FileStore;
use tracing::{debug, error};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "storybook", version, about = "Inspect storybook layout, narration and sessions")]
struct Cli {
    /// Log filter, e.g. `debug` or `storybook_engine=trace`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every spread of a document.
    Spreads { total: u32 },
    /// Show the pages displayed for PAGE and where turning leads.
    Navigate { total: u32, page: u32 },
    /// Show the narration selected for the view at PAGE.
    Narration {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Audio map JSON file; replaces any map from the configuration.
        #[arg(long)]
        audio_map: Option<PathBuf>,
        total: u32,
        page: u32,
    },
    /// Print the resolved configuration as JSON.
    Config {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Inspect or clear the saved reading session.
    Session {
        #[command(subcommand)]
        action: SessionAction,
        #[command(flatten)]
        store: StoreArgs,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    Show,
    Clear,
}

#[derive(Args)]
struct StoreArgs {
    /// Session store file. Defaults to the platform data directory.
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    /// Page count of the document, to check whether the session would be restored.
    #[arg(long, global = true)]
    pages: Option<u32>,
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());
    if let Err(err) = run(cli.command) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn init_tracing(level: Option<&str>) {
    let env_filter = match level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true).with_filter(env_filter))
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    Config::load(path.as_deref()).or_raise(|| ErrorKind::Config)
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Spreads { total } => {
            for line in spread_lines(total)? {
                println!("{line}");
            }
        },
        Command::Navigate { total, page } => {
            println!("{}", Navigation::at(page, total)?);
        },
        Command::Narration { config, audio_map, total, page } => {
            let mut config = load_config(config)?;
            if let Some(path) = audio_map {
                config.audio_map = AudioMap::from_json_file(&path);
            }
            println!("{}", Narration::at(page, total, &config.book, config.audio_map.as_ref())?);
        },
        Command::Config { config } => {
            let config = load_config(config)?;
            let json = serde_json::to_string_pretty(&config).or_raise(|| ErrorKind::Output)?;
            println!("{json}");
        },
        Command::Session { action, store } => session(action, store)?,
    }
    Ok(())
}

fn session(action: SessionAction, args: StoreArgs) -> Result<()> {
    let config = load_config(args.config)?;
    let Some(path) = args.store.or_else(default_session_path) else {
        exn::bail!(ErrorKind::InvalidArgument("no session store location; pass --store".to_string()));
    };
    debug!(path = %path.display(), key = %config.engine.storage_key, "Opening session store");
    let tracker = SessionTracker::new(
        Arc::new(FileStore::new(path)),
        config.engine.storage_key.clone(),
        config.engine.session_max_age(),
    );
    match action {
        SessionAction::Show => {
            let state = tracker.load().or_raise(|| ErrorKind::Session)?;
            let now = time::UtcDateTime::now();
            println!("{}", describe_session(state.as_ref(), args.pages, config.engine.session_max_age(), now));
        },
        SessionAction::Clear => {
            tracker.clear().or_raise(|| ErrorKind::Session)?;
            println!("session cleared");
        },
    }
    Ok(())
}
