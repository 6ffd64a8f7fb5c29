//! Binary entrypoint for the savekeep CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml`
//! - `create --owner <id> [--save <id>]` - write a fresh save record
//! - `inspect --owner <id> --save <id>` - print a stored save record
//! - `apply --owner <id> --save <id> --action <tag> [--params <json>] [--flush]` - run one action
//! - `serve` - answer newline-delimited JSON requests on stdin
//!
//! See the library crate docs for module-level details: `savekeep::`.
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use savekeep::config::Config;
use savekeep::game::{Action, Dispatcher, SaveRecord, SessionManager};
use savekeep::service::SaveService;
use savekeep::storage::autosave::AutosaveScheduler;
use savekeep::storage::SaveStore;

#[derive(Parser)]
#[command(name = "savekeep")]
#[command(about = "Session store and action engine for RPG save records")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Create a new save record
    Create {
        #[arg(long)]
        owner: String,
        /// Save id (a fresh uuid when omitted)
        #[arg(long)]
        save: Option<String>,
        #[arg(long)]
        race: Option<String>,
        #[arg(long)]
        class: Option<String>,
    },
    /// Print a stored save record as JSON
    Inspect {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        save: String,
    },
    /// Apply one action to a save record
    Apply {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        save: String,
        /// Action tag, e.g. `move` or `equip_item`
        #[arg(long)]
        action: String,
        /// Action parameters as a JSON object
        #[arg(long)]
        params: Option<String>,
        /// Write the record back to disk when the action succeeds
        #[arg(long)]
        flush: bool,
    },
    /// Serve newline-delimited JSON requests on stdin/stdout
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Init writes the config, so there is nothing to load yet
    let (pre_config, load_error) = match cli.command {
        Commands::Init => (None, None),
        _ => match Config::load(&cli.config).await {
            Ok(c) => (Some(c), None),
            Err(e) => (None, Some(e)),
        },
    };
    init_logging(&pre_config, cli.verbose);
    if let Some(e) = load_error {
        warn!("{}; using defaults", e);
    }
    let config = pre_config.unwrap_or_default();

    match cli.command {
        Commands::Init => {
            Config::create_default(&cli.config).await?;
            info!("Wrote default configuration to {}", cli.config);
            println!("Created {}", cli.config);
        }
        Commands::Create {
            owner,
            save,
            race,
            class,
        } => {
            let mut record = SaveRecord::new(&owner, save.as_deref().unwrap_or(""));
            if let Some(race) = race {
                record = record.with_race(&race);
            }
            if let Some(class) = class {
                record = record.with_class(&class);
            }
            let sessions = SessionManager::new(open_store(&config)?);
            let created = sessions.create(record)?;
            println!("{}", created.save_id);
        }
        Commands::Inspect { owner, save } => {
            let record = open_store(&config)?.read(&owner, &save)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Apply {
            owner,
            save,
            action,
            params,
            flush,
        } => {
            let mut request = Action::new(&action);
            if let Some(raw) = params {
                request.params = serde_json::from_str(&raw)
                    .map_err(|e| anyhow!("--params must be a JSON object: {}", e))?;
            }
            let dispatcher = build_dispatcher(&config)?;
            let sessions = SessionManager::new(open_store(&config)?);
            sessions.load(&owner, &save)?;
            let result = sessions.apply(&owner, &save, &dispatcher, &request)?;
            if flush && result.success {
                sessions.flush(&owner, &save)?;
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Serve => {
            let sessions = SessionManager::new(open_store(&config)?);
            let service = SaveService::new(sessions, build_dispatcher(&config)?);
            serve(service, AutosaveScheduler::new(config.autosave.clone())).await?;
        }
    }
    Ok(())
}

fn open_store(config: &Config) -> Result<SaveStore> {
    SaveStore::new(&config.storage.data_dir)
        .map_err(|e| anyhow!("Failed to open data dir {}: {}", config.storage.data_dir, e))
}

fn build_dispatcher(config: &Config) -> Result<Dispatcher> {
    let catalog = config.content.load_catalog()?;
    info!("Reference catalog ready ({} items)", catalog.item_count());
    Ok(Dispatcher::new(Arc::new(catalog), config.rules.clone()))
}

async fn serve(service: SaveService, mut autosave: AutosaveScheduler) -> Result<()> {
    info!("Starting savekeep v{} (serve)", env!("CARGO_PKG_VERSION"));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut tick = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let mut out = service.handle_line(&line);
                out.push('\n');
                stdout.write_all(out.as_bytes()).await?;
                stdout.flush().await?;
            }
            _ = tick.tick() => {
                if let Err(e) = autosave.check_and_flush(service.sessions()) {
                    warn!("Autosave check failed: {}", e);
                }
            }
        }
    }

    if autosave.config().enabled {
        let report = service.sessions().flush_dirty()?;
        if !report.failed.is_empty() {
            warn!("{} session(s) could not be flushed at shutdown", report.failed.len());
        }
        info!("Input closed; flushed {} session(s)", report.flushed);
    } else {
        let loaded = service.sessions().loaded()?.len();
        info!("Input closed; {} loaded session(s) discarded without flushing", loaded);
    }
    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse::<log::LevelFilter>().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| std::fs::OpenOptions::new().create(true).append(true).open(path).ok());

    if let Some(f) = log_file {
        let file = std::sync::Arc::new(std::sync::Mutex::new(f));
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = file.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    // stdout carries serve responses; keep log lines on stderr
    builder.target(env_logger::Target::Stderr);
    let _ = builder.try_init();
}
