// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persistent translation cache backed by SQLite.
//
// Entries are keyed by request fingerprint and are only ever inserted or
// overwritten. Nothing in the pipeline deletes them.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use satzwerk_core::error::{Result, SatzwerkError};

use crate::fingerprint::Fingerprint;

/// SQLite schema for the translations table.
const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS translations (
        fingerprint TEXT PRIMARY KEY,
        source_text TEXT NOT NULL,
        translated_text TEXT NOT NULL,
        service_id TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
"#;

/// How long a writer waits for another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// One stored translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub source_text: String,
    pub translated_text: String,
    pub service_id: String,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(
        fingerprint: Fingerprint,
        source_text: impl Into<String>,
        translated_text: impl Into<String>,
        service_id: impl Into<String>,
    ) -> Self {
        Self {
            fingerprint,
            source_text: source_text.into(),
            translated_text: translated_text.into(),
            service_id: service_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Key/value store from fingerprint to translated text.
///
/// `set` must be durable before it returns, and concurrent `set`s for the
/// same fingerprint must be safe.
pub trait TranslationCache: Send + Sync {
    fn get(&self, fingerprint: &Fingerprint) -> Result<Option<String>>;
    fn set(&self, entry: &CacheEntry) -> Result<()>;
}

// -- SQLite -------------------------------------------------------------------

/// Translation cache in a local SQLite database.
///
/// `rusqlite` is synchronous; the connection sits behind a mutex and each
/// call is a single short statement.
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Open (or create) the cache database at the given path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path.as_ref())
            .map_err(|e| SatzwerkError::Database(format!("open: {e}")))?;

        // Several satzwerk processes may share one cache file.
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| SatzwerkError::Database(format!("WAL pragma: {e}")))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| SatzwerkError::Database(format!("busy timeout: {e}")))?;

        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| SatzwerkError::Database(format!("create table: {e}")))?;

        info!("translation cache opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SatzwerkError::Database(format!("open in-memory: {e}")))?;

        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| SatzwerkError::Database(format!("create table: {e}")))?;

        debug!("in-memory translation cache opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of stored entries.
    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM translations", [], |row| row.get(0))
            .map_err(|e| SatzwerkError::Database(format!("count: {e}")))?;
        Ok(count as usize)
    }

    /// Full stored entry, including metadata.
    #[cfg(test)]
    fn entry(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT source_text, translated_text, service_id, created_at
                 FROM translations WHERE fingerprint = ?1",
                params![fingerprint.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| SatzwerkError::Database(format!("query entry: {e}")))?;

        let Some((source_text, translated_text, service_id, created_at)) = row else {
            return Ok(None);
        };
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| SatzwerkError::Database(format!("parse created_at: {e}")))?
            .with_timezone(&Utc);

        Ok(Some(CacheEntry {
            fingerprint: fingerprint.clone(),
            source_text,
            translated_text,
            service_id,
            created_at,
        }))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SatzwerkError::Database("cache connection lock poisoned".into()))
    }
}

impl TranslationCache for SqliteCache {
    fn get(&self, fingerprint: &Fingerprint) -> Result<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT translated_text FROM translations WHERE fingerprint = ?1",
            params![fingerprint.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| SatzwerkError::Database(format!("get: {e}")))
    }

    fn set(&self, entry: &CacheEntry) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO translations
             (fingerprint, source_text, translated_text, service_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.fingerprint.as_str(),
                entry.source_text,
                entry.translated_text,
                entry.service_id,
                entry.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| SatzwerkError::Database(format!("set: {e}")))?;

        debug!(fingerprint = %entry.fingerprint, "translation cached");
        Ok(())
    }
}

// -- In-memory ----------------------------------------------------------------

/// Process-local cache for tests and `--ignore-cache` style throwaway runs.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<Fingerprint, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TranslationCache for MemoryCache {
    fn get(&self, fingerprint: &Fingerprint) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| SatzwerkError::Database("memory cache lock poisoned".into()))?;
        Ok(entries.get(fingerprint).map(|e| e.translated_text.clone()))
    }

    fn set(&self, entry: &CacheEntry) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| SatzwerkError::Database("memory cache lock poisoned".into()))?;
        entries.insert(entry.fingerprint.clone(), entry.clone());
        Ok(())
    }
}
