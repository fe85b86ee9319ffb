use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use prattle_config::schema::StoreBackend;
use prattle_config::{ConfigLoader, PrattleConfig, WarningSeverity};
use prattle_core::PrattleError;
use prattle_memory::{InMemoryStore, open_store};
use prattle_runtime::Responder;

mod chat;

/// Prattle: a per-channel chat responder that learns as it talks
#[derive(Parser)]
#[command(name = "prattle", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to prattle.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat in the terminal
    Chat {
        /// Channel to talk on
        #[arg(long, default_value = "terminal")]
        channel: String,
        /// Print which cascade stage produced each reply
        #[arg(long)]
        show_stage: bool,
    },
    /// Serve the HTTP API
    Serve {
        /// Listen address, overriding server.listen
        #[arg(long)]
        listen: Option<String>,
    },
    /// Forget everything learned on a channel
    Reset {
        channel: String,
    },
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate configuration and compile the lexicon
    Check,
}

impl Cli {
    pub async fn run(self) -> prattle_core::Result<()> {
        // Load config first so we can use it for log format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        let log_level = resolve_log_level(
            self.verbose,
            self.quiet,
            self.log_level.as_deref(),
            &config.logging.level,
        );
        init_tracing(log_level, &config.logging.format);

        match self.command {
            Commands::Chat {
                channel,
                show_stage,
            } => chat::cmd_chat(config, channel, show_stage).await,
            Commands::Serve { listen } => Self::cmd_serve(config, listen, config_loader).await,
            Commands::Reset { channel } => Self::cmd_reset(config, channel).await,
            Commands::Config { json } => Self::cmd_config(config, json),
            Commands::Check => Self::cmd_check(config, config_loader.path()),
        }
    }

    async fn cmd_serve(
        mut config: PrattleConfig,
        listen: Option<String>,
        config_loader: ConfigLoader,
    ) -> prattle_core::Result<()> {
        if let Some(listen) = listen {
            config.server.listen = listen;
        }

        println!("💬 Prattle v{}", env!("CARGO_PKG_VERSION"));
        println!("   Listening: http://{}", config.server.listen);
        println!("   Store: {}", describe_store(&config));
        println!("   Search: {}", if config.search.enabled { "enabled" } else { "disabled" });

        // Reloads land in the loader's shared config; this server keeps the
        // lexicon it was started with.
        let _watcher = match config_loader.watch() {
            Ok(w) => Some(w),
            Err(e) => {
                tracing::warn!(error = %e, "config hot-reload disabled");
                None
            }
        };

        let responder = build_responder(config.clone())?;
        prattle_server::start_server(responder, &config.server).await
    }

    async fn cmd_reset(config: PrattleConfig, channel: String) -> prattle_core::Result<()> {
        let responder = build_responder(config)?;
        responder.reset(&channel).await?;
        println!("🧹 Channel '{channel}' reset");
        Ok(())
    }

    fn cmd_config(config: PrattleConfig, json: bool) -> prattle_core::Result<()> {
        let rendered = if json {
            serde_json::to_string_pretty(&config)?
        } else {
            toml::to_string_pretty(&config).map_err(|e| PrattleError::Config(e.to_string()))?
        };
        println!("{rendered}");
        Ok(())
    }

    fn cmd_check(config: PrattleConfig, path: &std::path::Path) -> prattle_core::Result<()> {
        println!("🩺 Checking {}", path.display());

        let warnings = config.validate().map_err(PrattleError::Config)?;
        for w in &warnings {
            println!("  {w}");
        }

        // Compiling the responder catches anything validation let through
        let lexicon = &config.lexicon;
        Responder::new(config.clone(), Arc::new(InMemoryStore::new()))?;

        let issues = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Warning)
            .count();
        println!();
        println!(
            "  {} FAQ entries, {} topics, {} follow-ups, {} knowledge patterns",
            lexicon.faq.len(),
            lexicon.topics.len(),
            lexicon.follow_ups.len(),
            lexicon.knowledge_patterns.len()
        );
        if issues == 0 {
            println!("  ✅ Configuration looks good");
        } else {
            println!("  ⚠️  {issues} warning(s)");
        }
        Ok(())
    }
}

/// Open the configured store and build a responder over it.
fn build_responder(config: PrattleConfig) -> prattle_core::Result<Arc<Responder>> {
    let store = open_store(&config.memory)?;
    Ok(Arc::new(Responder::new(config, store)?))
}

fn describe_store(config: &PrattleConfig) -> String {
    match config.memory.backend {
        StoreBackend::Sqlite => format!("sqlite ({})", config.memory.db_path.display()),
        StoreBackend::Memory => "memory (not persisted)".to_string(),
    }
}

/// --verbose > --quiet > --log-level > logging.level
fn resolve_log_level<'a>(
    verbose: bool,
    quiet: bool,
    flag: Option<&'a str>,
    configured: &'a str,
) -> &'a str {
    if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        flag.unwrap_or(configured)
    }
}

fn init_tracing(level: &str, format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        "json" => builder.json().with_target(true).init(),
        "compact" => builder.compact().with_target(false).init(),
        _ => builder.with_target(false).init(),
    }
}
