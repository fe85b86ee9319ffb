use notify::{Event as NotifyEvent, EventKind, RecursiveMode, Watcher};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use prattle_core::PrattleError;

use crate::schema::{PrattleConfig, StoreBackend};

/// Loads and optionally hot-reloads the Prattle configuration.
pub struct ConfigLoader {
    config: Arc<RwLock<PrattleConfig>>,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > PRATTLE_CONFIG env > ~/.prattle/prattle.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("PRATTLE_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".prattle")
            .join("prattle.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> prattle_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            Self::parse_file(&config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            PrattleConfig::default()
        };

        let config = Self::apply_env_overrides(config);

        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => {
                return Err(PrattleError::Config(e));
            }
        }

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
        })
    }

    fn parse_file(path: &Path) -> prattle_core::Result<PrattleConfig> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str::<PrattleConfig>(&raw).map_err(|e| {
            PrattleError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Get a read snapshot of the current config.
    pub fn get(&self) -> PrattleConfig {
        self.config.read().clone()
    }

    /// Get a shared reference for subscription.
    pub fn shared(&self) -> Arc<RwLock<PrattleConfig>> {
        Arc::clone(&self.config)
    }

    /// Path being watched.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (PRATTLE_DB_PATH, PRATTLE_LOG_LEVEL, etc.)
    fn apply_env_overrides(mut config: PrattleConfig) -> PrattleConfig {
        if let Ok(v) = std::env::var("PRATTLE_DB_PATH") {
            config.memory.db_path = PathBuf::from(v);
            config.memory.backend = StoreBackend::Sqlite;
        }
        if let Ok(v) = std::env::var("PRATTLE_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("PRATTLE_SERVER_LISTEN") {
            config.server.listen = v;
        }
        if let Ok(v) = std::env::var("PRATTLE_SEARCH_ENABLED") {
            if let Ok(enabled) = v.parse::<bool>() {
                config.search.enabled = enabled;
            }
        }
        if let Ok(v) = std::env::var("PRATTLE_MARKOV_SELECTION") {
            match v.parse() {
                Ok(selection) => config.markov.selection = selection,
                Err(e) => warn!(error = %e, "ignoring PRATTLE_MARKOV_SELECTION"),
            }
        }
        config
    }

    /// Reload the config from disk.
    pub fn reload(&self) -> prattle_core::Result<()> {
        if !self.config_path.exists() {
            return Err(PrattleError::Config(format!(
                "config file not found: {}",
                self.config_path.display()
            )));
        }
        let new_config = Self::apply_env_overrides(Self::parse_file(&self.config_path)?);
        new_config.validate().map_err(PrattleError::Config)?;
        *self.config.write() = new_config;
        info!("configuration reloaded");
        Ok(())
    }

    /// Start a background file watcher that swaps in the new config when the file changes.
    /// Returns a handle to the watcher (must be kept alive for watching to continue).
    pub fn watch(&self) -> prattle_core::Result<notify::RecommendedWatcher> {
        let config = Arc::clone(&self.config);
        let config_path = self.config_path.clone();

        info!(?config_path, "starting config file watcher");

        let path_for_event = config_path.clone();
        let mut watcher = notify::recommended_watcher(
            move |res: Result<NotifyEvent, notify::Error>| match res {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        return;
                    }
                    let is_our_file = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == path_for_event.file_name());
                    if !is_our_file {
                        return;
                    }

                    info!("config file changed, reloading");
                    match ConfigLoader::parse_file(&path_for_event) {
                        Ok(new_config) => {
                            let new_config = ConfigLoader::apply_env_overrides(new_config);
                            match new_config.validate() {
                                Ok(_) => {
                                    *config.write() = new_config;
                                    info!("configuration hot-reloaded successfully");
                                }
                                Err(e) => {
                                    warn!(error = %e, "config file is invalid, keeping current config");
                                }
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "config file has errors, keeping current config");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "file watcher error");
                }
            },
        )
        .map_err(|e| PrattleError::Config(format!("failed to create file watcher: {}", e)))?;

        // Watch the parent directory (some editors create temp files + rename)
        let watch_path = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        watcher
            .watch(watch_path, RecursiveMode::NonRecursive)
            .map_err(|e| PrattleError::Config(format!("failed to watch config directory: {}", e)))?;

        Ok(watcher)
    }
}
