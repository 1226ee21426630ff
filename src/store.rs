//! Dedupe markers and subscriber list
//!
//! The watcher remembers, per (symbol, interval), the newest candle it has
//! analyzed and the last signal it reported. Subscribers are Telegram chat ids.
//! State lives either in memory or in SQLite.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

use crate::strategies::Timeframe;
use crate::types::{Signal, Symbol};

pub trait SignalStore: Send + Sync {
    fn last_candle_time(&self, symbol: &Symbol, interval: Timeframe) -> Result<Option<DateTime<Utc>>>;

    fn set_last_candle_time(&self, symbol: &Symbol, interval: Timeframe, time: DateTime<Utc>) -> Result<()>;

    fn last_signal(&self, symbol: &Symbol, interval: Timeframe) -> Result<Option<Signal>>;

    fn set_last_signal(&self, symbol: &Symbol, interval: Timeframe, signal: Signal) -> Result<()>;

    /// Chat ids in ascending order
    fn subscribers(&self) -> Result<Vec<i64>>;

    /// Returns false if already subscribed
    fn add_subscriber(&self, chat_id: i64) -> Result<bool>;

    /// Returns false if not subscribed
    fn remove_subscriber(&self, chat_id: i64) -> Result<bool>;
}

impl<S: SignalStore + ?Sized> SignalStore for Box<S> {
    fn last_candle_time(&self, symbol: &Symbol, interval: Timeframe) -> Result<Option<DateTime<Utc>>> {
        (**self).last_candle_time(symbol, interval)
    }

    fn set_last_candle_time(&self, symbol: &Symbol, interval: Timeframe, time: DateTime<Utc>) -> Result<()> {
        (**self).set_last_candle_time(symbol, interval, time)
    }

    fn last_signal(&self, symbol: &Symbol, interval: Timeframe) -> Result<Option<Signal>> {
        (**self).last_signal(symbol, interval)
    }

    fn set_last_signal(&self, symbol: &Symbol, interval: Timeframe, signal: Signal) -> Result<()> {
        (**self).set_last_signal(symbol, interval, signal)
    }

    fn subscribers(&self) -> Result<Vec<i64>> {
        (**self).subscribers()
    }

    fn add_subscriber(&self, chat_id: i64) -> Result<bool> {
        (**self).add_subscriber(chat_id)
    }

    fn remove_subscriber(&self, chat_id: i64) -> Result<bool> {
        (**self).remove_subscriber(chat_id)
    }
}

type MarkerKey = (Symbol, Timeframe);

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| anyhow::anyhow!("store lock poisoned"))
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryStore {
    candle_times: Mutex<HashMap<MarkerKey, DateTime<Utc>>>,
    signals: Mutex<HashMap<MarkerKey, Signal>>,
    subscribers: Mutex<BTreeSet<i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignalStore for MemoryStore {
    fn last_candle_time(&self, symbol: &Symbol, interval: Timeframe) -> Result<Option<DateTime<Utc>>> {
        Ok(lock(&self.candle_times)?
            .get(&(symbol.clone(), interval))
            .copied())
    }

    fn set_last_candle_time(&self, symbol: &Symbol, interval: Timeframe, time: DateTime<Utc>) -> Result<()> {
        lock(&self.candle_times)?.insert((symbol.clone(), interval), time);
        Ok(())
    }

    fn last_signal(&self, symbol: &Symbol, interval: Timeframe) -> Result<Option<Signal>> {
        Ok(lock(&self.signals)?.get(&(symbol.clone(), interval)).copied())
    }

    fn set_last_signal(&self, symbol: &Symbol, interval: Timeframe, signal: Signal) -> Result<()> {
        lock(&self.signals)?.insert((symbol.clone(), interval), signal);
        Ok(())
    }

    fn subscribers(&self) -> Result<Vec<i64>> {
        Ok(lock(&self.subscribers)?.iter().copied().collect())
    }

    fn add_subscriber(&self, chat_id: i64) -> Result<bool> {
        Ok(lock(&self.subscribers)?.insert(chat_id))
    }

    fn remove_subscriber(&self, chat_id: i64) -> Result<bool> {
        Ok(lock(&self.subscribers)?.remove(&chat_id))
    }
}

// =============================================================================
// SQLite store
// =============================================================================

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

        // journal_mode returns a row, so pragma_update would reject it
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.create_tables()?;
        info!("SQLite signal store at {}", db_path.display());

        Ok(store)
    }

    fn create_tables(&self) -> Result<()> {
        let conn = lock(&self.conn)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS candle_markers (
                symbol TEXT NOT NULL,
                interval TEXT NOT NULL,
                candle_time TEXT NOT NULL,
                PRIMARY KEY (symbol, interval)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS signal_markers (
                symbol TEXT NOT NULL,
                interval TEXT NOT NULL,
                signal TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (symbol, interval)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS subscribers (
                chat_id INTEGER PRIMARY KEY,
                added_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }
}

impl SignalStore for SqliteStore {
    fn last_candle_time(&self, symbol: &Symbol, interval: Timeframe) -> Result<Option<DateTime<Utc>>> {
        let conn = lock(&self.conn)?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT candle_time FROM candle_markers WHERE symbol = ?1 AND interval = ?2",
                params![symbol.as_str(), interval.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .with_context(|| format!("Corrupt candle marker: {}", s))
        })
        .transpose()
    }

    fn set_last_candle_time(&self, symbol: &Symbol, interval: Timeframe, time: DateTime<Utc>) -> Result<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT OR REPLACE INTO candle_markers (symbol, interval, candle_time) VALUES (?1, ?2, ?3)",
            params![symbol.as_str(), interval.as_str(), time.to_rfc3339()],
        )?;
        Ok(())
    }

    fn last_signal(&self, symbol: &Symbol, interval: Timeframe) -> Result<Option<Signal>> {
        let conn = lock(&self.conn)?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT signal FROM signal_markers WHERE symbol = ?1 AND interval = ?2",
                params![symbol.as_str(), interval.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|s| s.parse::<Signal>().map_err(anyhow::Error::msg))
            .transpose()
    }

    fn set_last_signal(&self, symbol: &Symbol, interval: Timeframe, signal: Signal) -> Result<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT OR REPLACE INTO signal_markers (symbol, interval, signal, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                symbol.as_str(),
                interval.as_str(),
                signal.as_str(),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn subscribers(&self) -> Result<Vec<i64>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare("SELECT chat_id FROM subscribers ORDER BY chat_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    fn add_subscriber(&self, chat_id: i64) -> Result<bool> {
        let conn = lock(&self.conn)?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO subscribers (chat_id, added_at) VALUES (?1, ?2)",
            params![chat_id, Utc::now().to_rfc3339()],
        )?;
        Ok(inserted > 0)
    }

    fn remove_subscriber(&self, chat_id: i64) -> Result<bool> {
        let conn = lock(&self.conn)?;
        let removed = conn.execute("DELETE FROM subscribers WHERE chat_id = ?1", params![chat_id])?;
        Ok(removed > 0)
    }
}

/// SQLite when a path is given, otherwise in-memory
pub fn create_store(path: Option<&Path>) -> Result<Box<dyn SignalStore>> {
    match path {
        Some(path) => Ok(Box::new(SqliteStore::open(path)?)),
        None => Ok(Box::new(MemoryStore::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn SignalStore) {
        let symbol = Symbol::new("XAU/USD");
        let t = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        assert_eq!(store.last_candle_time(&symbol, Timeframe::OneHour).unwrap(), None);
        store.set_last_candle_time(&symbol, Timeframe::OneHour, t).unwrap();
        assert_eq!(store.last_candle_time(&symbol, Timeframe::OneHour).unwrap(), Some(t));
        assert_eq!(store.last_candle_time(&symbol, Timeframe::OneDay).unwrap(), None);

        assert_eq!(store.last_signal(&symbol, Timeframe::OneHour).unwrap(), None);
        store.set_last_signal(&symbol, Timeframe::OneHour, Signal::Buy).unwrap();
        store.set_last_signal(&symbol, Timeframe::OneHour, Signal::Neutral).unwrap();
        assert_eq!(
            store.last_signal(&symbol, Timeframe::OneHour).unwrap(),
            Some(Signal::Neutral)
        );
        // Signal update leaves the candle marker alone
        assert_eq!(store.last_candle_time(&symbol, Timeframe::OneHour).unwrap(), Some(t));

        assert!(store.add_subscriber(42).unwrap());
        assert!(!store.add_subscriber(42).unwrap());
        assert!(store.add_subscriber(-1001).unwrap());
        assert_eq!(store.subscribers().unwrap(), vec![-1001, 42]);
        assert!(store.remove_subscriber(42).unwrap());
        assert!(!store.remove_subscriber(42).unwrap());
        assert_eq!(store.subscribers().unwrap(), vec![-1001]);
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn test_sqlite_store() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&SqliteStore::open(dir.path().join("signals.db")).unwrap());
    }

    #[test]
    fn test_sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/signals.db");
        let symbol = Symbol::new("XAU/USD");

        {
            let store = create_store(Some(&path)).unwrap();
            store.add_subscriber(7).unwrap();
            store.set_last_signal(&symbol, Timeframe::ThreeMin, Signal::Sell).unwrap();
        }

        let store = create_store(Some(&path)).unwrap();
        assert_eq!(store.subscribers().unwrap(), vec![7]);
        assert_eq!(
            store.last_signal(&symbol, Timeframe::ThreeMin).unwrap(),
            Some(Signal::Sell)
        );
    }
}
