use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use prattle_config::schema::{MemoryConfig, StoreBackend};
use prattle_core::{PrattleError, Result};

/// The persistent key-value contract every responder stage relies on.
///
/// Values are JSON. `push` appends to a sequence value, creating it if the
/// key is absent. A key holding a non-sequence value is replaced by a fresh
/// one-element sequence.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn has(&self, key: &str) -> Result<bool>;
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
    async fn push(&self, key: &str, item: Value) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Read a sequence stored under `key`.
///
/// An absent key is an empty sequence. A value that is not a sequence, or
/// elements that fail to decode, are skipped with a warning rather than
/// failing the caller.
pub async fn load_sequence<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Vec<T>> {
    let items = match store.get(key).await {
        Err(PrattleError::MalformedValue { reason, .. }) => {
            warn!(key, %reason, "stored value is not valid json, treating as empty");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
        Ok(None) => return Ok(Vec::new()),
        Ok(Some(Value::Array(items))) => items,
        Ok(Some(other)) => {
            warn!(key, kind = value_kind(&other), "expected a sequence, treating as empty");
            return Ok(Vec::new());
        }
    };

    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if decoded.len() < total {
        warn!(key, skipped = total - decoded.len(), "skipped malformed sequence elements");
    }
    Ok(decoded)
}

/// Overwrite `key` with a whole sequence.
pub async fn save_sequence<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    items: &[T],
) -> Result<()> {
    store.set(key, serde_json::to_value(items)?).await
}

/// Append one typed item to the sequence under `key`.
pub async fn push_item<T: Serialize>(store: &dyn KeyValueStore, key: &str, item: &T) -> Result<()> {
    store.push(key, serde_json::to_value(item)?).await
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn append(existing: Option<Value>, key: &str, item: Value) -> Value {
    match existing {
        Some(Value::Array(mut items)) => {
            items.push(item);
            Value::Array(items)
        }
        Some(other) => {
            warn!(key, kind = value_kind(&other), "push onto non-sequence value, replacing it");
            Value::Array(vec![item])
        }
        None => Value::Array(vec![item]),
    }
}

// ── In-memory backend ──────────────────────────────────────────

/// Process-local store. Contents are lost when the process exits.
#[derive(Default)]
pub struct InMemoryStore {
    data: Mutex<HashMap<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently present, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.data.lock().contains_key(key))
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.data.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.data.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn push(&self, key: &str, item: Value) -> Result<()> {
        let mut data = self.data.lock();
        let updated = append(data.remove(key), key, item);
        data.insert(key.to_string(), updated);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.data.lock().remove(key);
        Ok(())
    }
}

// ── SQLite backend ─────────────────────────────────────────────

fn store_err(e: impl std::fmt::Display) -> PrattleError {
    PrattleError::Store(e.to_string())
}

/// Durable store backed by a single SQLite table of JSON values.
pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        info!(?path, "opening sqlite store");
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(store_err)?;

        // WAL keeps readers unblocked while a channel writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(store_err)?;
        Self::with_connection(conn)
    }

    /// A throwaway database, mainly for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )
        .map_err(store_err)?;

        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    fn read(conn: &Connection, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(store_err)?;

        match raw {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| {
                PrattleError::MalformedValue {
                    key: key.to_string(),
                    reason: e.to_string(),
                }
            }),
        }
    }

    fn write(conn: &Connection, key: &str, value: &Value) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
            params![key, serde_json::to_string(value)?, now],
        )
        .map_err(store_err)?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn has(&self, key: &str) -> Result<bool> {
        let db = self.db.lock();
        let count: i64 = db
            .query_row("SELECT COUNT(*) FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .map_err(store_err)?;
        Ok(count > 0)
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let db = self.db.lock();
        Self::read(&db, key)
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let db = self.db.lock();
        Self::write(&db, key, &value)?;
        debug!(key, "stored value");
        Ok(())
    }

    async fn push(&self, key: &str, item: Value) -> Result<()> {
        let mut db = self.db.lock();
        let tx = db.transaction().map_err(store_err)?;
        // An undecodable existing value is replaced like any other non-sequence
        let existing = Self::read(&tx, key).unwrap_or_else(|e| {
            warn!(key, error = %e, "discarding malformed value");
            Some(Value::Null)
        });
        let updated = append(existing, key, item);
        Self::write(&tx, key, &updated)?;
        tx.commit().map_err(store_err)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let db = self.db.lock();
        db.execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(store_err)?;
        Ok(())
    }
}

/// Build the store selected by the `[memory]` section.
pub fn open_store(config: &MemoryConfig) -> Result<Arc<dyn KeyValueStore>> {
    match config.backend {
        StoreBackend::Sqlite => Ok(Arc::new(SqliteStore::open(&config.db_path)?)),
        StoreBackend::Memory => {
            info!("using in-memory store, nothing will be persisted");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}
