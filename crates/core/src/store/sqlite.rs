//! SQLite-backed state store.
//!
//! All persistent state lives here: the indexer registry, the decision
//! cache, search timestamps, cached searchees, settings, and RSS cursors.
//! Writes go through a single mutex-guarded connection.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::types::{
    DecisionRow, Indexer, IndexerCaps, IndexerStatus, RssCursor, SearchTimestamps, StoreError,
};
use crate::matcher::Verdict;
use crate::searchee::SearcheeFile;

/// Schema migrations, applied in order; `PRAGMA user_version` tracks the
/// last applied step.
const MIGRATIONS: [&str; 2] = [
    // v1: core tables
    r#"
    CREATE TABLE indexer (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT NOT NULL UNIQUE,
        apikey TEXT NOT NULL,
        name TEXT,
        active INTEGER NOT NULL DEFAULT 1,
        status TEXT NOT NULL DEFAULT 'OK',
        status_count INTEGER NOT NULL DEFAULT 0,
        retry_after TEXT,
        caps TEXT NOT NULL DEFAULT '{}'
    );

    CREATE TABLE decision (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        searchee_name TEXT NOT NULL,
        candidate_guid TEXT NOT NULL,
        info_hash TEXT,
        indexer_id INTEGER REFERENCES indexer(id),
        verdict TEXT NOT NULL,
        fuzzy_size_factor REAL,
        first_seen TEXT NOT NULL,
        last_seen TEXT NOT NULL,
        UNIQUE(searchee_name, candidate_guid)
    );
    CREATE INDEX idx_decision_searchee ON decision(searchee_name);

    CREATE TABLE timestamp (
        searchee_name TEXT NOT NULL,
        indexer_id INTEGER NOT NULL REFERENCES indexer(id),
        first_searched TEXT NOT NULL,
        last_searched TEXT NOT NULL,
        PRIMARY KEY (searchee_name, indexer_id)
    );

    CREATE TABLE searchee (
        name TEXT PRIMARY KEY,
        info_hash TEXT,
        total_size INTEGER NOT NULL,
        files TEXT NOT NULL,
        first_seen TEXT NOT NULL
    );

    CREATE TABLE settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    "#,
    // v2: per-indexer RSS high-water marks
    r#"
    CREATE TABLE rss_cursor (
        indexer_id INTEGER PRIMARY KEY REFERENCES indexer(id),
        last_pub_date TEXT,
        last_guids TEXT NOT NULL DEFAULT '[]'
    );
    "#,
];

/// SQLite-backed state store.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (and migrate) the database at `path`.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn migrate(conn: &Connection) -> Result<(), StoreError> {
        let version: usize =
            conn.query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))? as usize;
        for (i, migration) in MIGRATIONS.iter().enumerate().skip(version) {
            conn.execute_batch(migration)?;
            conn.pragma_update(None, "user_version", (i + 1) as i64)?;
            info!(version = i + 1, "Applied schema migration");
        }
        Ok(())
    }

    // ---- indexers ----

    /// Insert or refresh an indexer row for a canonicalized URL. The
    /// apikey follows the config; health columns are preserved.
    pub fn upsert_indexer(&self, url: &str, apikey: &str) -> Result<Indexer, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO indexer (url, apikey, active) VALUES (?1, ?2, 1)
             ON CONFLICT(url) DO UPDATE SET apikey = ?2, active = 1",
            params![url, apikey],
        )?;
        let indexer = conn.query_row(
            "SELECT id, url, apikey, name, active, status, status_count, retry_after, caps
             FROM indexer WHERE url = ?1",
            params![url],
            row_to_indexer,
        )?;
        Ok(indexer)
    }

    /// Deactivate rows whose URL is no longer configured.
    pub fn retain_indexers(&self, urls: &[String]) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let placeholders = std::iter::repeat("?")
            .take(urls.len())
            .collect::<Vec<_>>()
            .join(",");
        let sql = if urls.is_empty() {
            "UPDATE indexer SET active = 0".to_string()
        } else {
            format!(
                "UPDATE indexer SET active = 0 WHERE url NOT IN ({})",
                placeholders
            )
        };
        let mut stmt = conn.prepare(&sql)?;
        stmt.execute(rusqlite::params_from_iter(urls.iter()))?;
        Ok(())
    }

    pub fn list_indexers(&self) -> Result<Vec<Indexer>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, url, apikey, name, active, status, status_count, retry_after, caps
             FROM indexer ORDER BY id",
        )?;
        let rows = stmt.query_map([], row_to_indexer)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn list_active_indexers(&self) -> Result<Vec<Indexer>, StoreError> {
        Ok(self
            .list_indexers()?
            .into_iter()
            .filter(|i| i.active)
            .collect())
    }

    pub fn get_indexer(&self, id: i64) -> Result<Option<Indexer>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, url, apikey, name, active, status, status_count, retry_after, caps
                 FROM indexer WHERE id = ?1",
                params![id],
                row_to_indexer,
            )
            .optional()?;
        Ok(row)
    }

    pub fn update_indexer_health(
        &self,
        id: i64,
        status: IndexerStatus,
        status_count: u32,
        retry_after: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE indexer SET status = ?2, status_count = ?3, retry_after = ?4 WHERE id = ?1",
            params![
                id,
                status.as_str(),
                status_count,
                retry_after.map(|t| t.to_rfc3339())
            ],
        )?;
        Ok(())
    }

    pub fn update_indexer_caps(
        &self,
        id: i64,
        name: Option<&str>,
        caps: &IndexerCaps,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let caps_json =
            serde_json::to_string(caps).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        conn.execute(
            "UPDATE indexer SET caps = ?2, name = COALESCE(?3, name) WHERE id = ?1",
            params![id, caps_json, name],
        )?;
        Ok(())
    }

    /// Reset status and cooldown for every indexer.
    pub fn clear_indexer_failures(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute(
            "UPDATE indexer SET status = 'OK', status_count = 0, retry_after = NULL",
            [],
        )?;
        Ok(n)
    }

    // ---- decisions ----

    /// Record a verdict, idempotent on (searchee_name, candidate_guid).
    /// `first_seen` is written once; Match-family verdicts are terminal
    /// and never downgraded to a non-match verdict.
    pub fn record_decision(
        &self,
        searchee_name: &str,
        candidate_guid: &str,
        info_hash: Option<&str>,
        indexer_id: Option<i64>,
        verdict: Verdict,
        fuzzy_size_factor: Option<f64>,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();

        let existing: Option<String> = conn
            .query_row(
                "SELECT verdict FROM decision WHERE searchee_name = ?1 AND candidate_guid = ?2",
                params![searchee_name, candidate_guid],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            None => {
                conn.execute(
                    "INSERT INTO decision
                     (searchee_name, candidate_guid, info_hash, indexer_id, verdict,
                      fuzzy_size_factor, first_seen, last_seen)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                    params![
                        searchee_name,
                        candidate_guid,
                        info_hash,
                        indexer_id,
                        verdict.as_str(),
                        fuzzy_size_factor,
                        now
                    ],
                )?;
            }
            Some(old) => {
                let old_verdict: Verdict = old
                    .parse()
                    .map_err(StoreError::Corrupt)?;
                if old_verdict.is_match() && !verdict.is_match() {
                    // Terminal verdicts survive; only refresh last_seen.
                    conn.execute(
                        "UPDATE decision SET last_seen = ?3
                         WHERE searchee_name = ?1 AND candidate_guid = ?2",
                        params![searchee_name, candidate_guid, now],
                    )?;
                } else {
                    conn.execute(
                        "UPDATE decision SET verdict = ?3, info_hash = COALESCE(?4, info_hash),
                         indexer_id = COALESCE(?5, indexer_id),
                         fuzzy_size_factor = COALESCE(?6, fuzzy_size_factor), last_seen = ?7
                         WHERE searchee_name = ?1 AND candidate_guid = ?2",
                        params![
                            searchee_name,
                            candidate_guid,
                            verdict.as_str(),
                            info_hash,
                            indexer_id,
                            fuzzy_size_factor,
                            now
                        ],
                    )?;
                }
            }
        }
        Ok(())
    }

    pub fn get_decision(
        &self,
        searchee_name: &str,
        candidate_guid: &str,
    ) -> Result<Option<DecisionRow>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT searchee_name, candidate_guid, info_hash, indexer_id, verdict,
                        fuzzy_size_factor, first_seen, last_seen
                 FROM decision WHERE searchee_name = ?1 AND candidate_guid = ?2",
                params![searchee_name, candidate_guid],
                row_to_decision,
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_decisions(&self, searchee_name: &str) -> Result<Vec<DecisionRow>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT searchee_name, candidate_guid, info_hash, indexer_id, verdict,
                    fuzzy_size_factor, first_seen, last_seen
             FROM decision WHERE searchee_name = ?1 ORDER BY first_seen",
        )?;
        let rows = stmt.query_map(params![searchee_name], row_to_decision)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Delete decisions that never ended in a snatch (no infohash).
    pub fn clear_decision_cache(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM decision WHERE info_hash IS NULL", [])?;
        Ok(n)
    }

    // ---- timestamps ----

    /// Record that a searchee was searched on an indexer just now.
    pub fn touch_search_timestamp(
        &self,
        searchee_name: &str,
        indexer_id: i64,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO timestamp (searchee_name, indexer_id, first_searched, last_searched)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(searchee_name, indexer_id) DO UPDATE SET last_searched = ?3",
            params![searchee_name, indexer_id, now],
        )?;
        Ok(())
    }

    /// Aggregate search history across all indexers for one searchee.
    pub fn get_search_timestamps(
        &self,
        searchee_name: &str,
    ) -> Result<Option<SearchTimestamps>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT MIN(first_searched), MAX(last_searched)
                 FROM timestamp WHERE searchee_name = ?1",
                params![searchee_name],
                |row| {
                    let first: Option<String> = row.get(0)?;
                    let last: Option<String> = row.get(1)?;
                    Ok((first, last))
                },
            )
            .optional()?;
        match row {
            Some((Some(first), Some(last))) => Ok(Some(SearchTimestamps {
                first_searched: parse_ts(&first)?,
                last_searched: parse_ts(&last)?,
            })),
            _ => Ok(None),
        }
    }

    // ---- searchees ----

    /// Remember a searchee, returning its first-seen instant.
    pub fn ensure_searchee(
        &self,
        name: &str,
        info_hash: Option<&str>,
        total_size: u64,
        files: &[SearcheeFile],
    ) -> Result<DateTime<Utc>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let files_json =
            serde_json::to_string(files).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        conn.execute(
            "INSERT INTO searchee (name, info_hash, total_size, files, first_seen)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(name) DO UPDATE SET info_hash = COALESCE(?2, info_hash),
             total_size = ?3, files = ?4",
            params![name, info_hash, total_size as i64, files_json, now],
        )?;
        let first_seen: String = conn.query_row(
            "SELECT first_seen FROM searchee WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        parse_ts(&first_seen)
    }

    // ---- settings ----

    pub fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    // ---- rss cursors ----

    pub fn get_rss_cursor(&self, indexer_id: i64) -> Result<RssCursor, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT last_pub_date, last_guids FROM rss_cursor WHERE indexer_id = ?1",
                params![indexer_id],
                |row| {
                    let pub_date: Option<String> = row.get(0)?;
                    let guids: String = row.get(1)?;
                    Ok((pub_date, guids))
                },
            )
            .optional()?;
        match row {
            None => Ok(RssCursor::default()),
            Some((pub_date, guids)) => Ok(RssCursor {
                last_pub_date: pub_date.as_deref().map(parse_ts).transpose()?,
                last_guids: serde_json::from_str(&guids)
                    .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            }),
        }
    }

    pub fn set_rss_cursor(&self, indexer_id: i64, cursor: &RssCursor) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let guids = serde_json::to_string(&cursor.last_guids)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        conn.execute(
            "INSERT INTO rss_cursor (indexer_id, last_pub_date, last_guids)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(indexer_id) DO UPDATE SET last_pub_date = ?2, last_guids = ?3",
            params![
                indexer_id,
                cursor.last_pub_date.map(|t| t.to_rfc3339()),
                guids
            ],
        )?;
        Ok(())
    }
}

fn row_to_indexer(row: &rusqlite::Row) -> rusqlite::Result<Indexer> {
    let status_str: String = row.get(5)?;
    let retry_after: Option<String> = row.get(7)?;
    let caps_json: String = row.get(8)?;
    Ok(Indexer {
        id: row.get(0)?,
        url: row.get(1)?,
        apikey: row.get(2)?,
        name: row.get(3)?,
        active: row.get::<_, i64>(4)? != 0,
        status: status_str.parse().unwrap_or(IndexerStatus::Ok),
        status_count: row.get::<_, i64>(6)? as u32,
        retry_after: retry_after
            .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
            .map(|t| t.with_timezone(&Utc)),
        caps: serde_json::from_str(&caps_json).unwrap_or_default(),
    })
}

fn row_to_decision(row: &rusqlite::Row) -> rusqlite::Result<DecisionRow> {
    let verdict_str: String = row.get(4)?;
    let first_seen: String = row.get(6)?;
    let last_seen: String = row.get(7)?;
    Ok(DecisionRow {
        searchee_name: row.get(0)?,
        candidate_guid: row.get(1)?,
        info_hash: row.get(2)?,
        indexer_id: row.get(3)?,
        verdict: verdict_str.parse().unwrap_or(Verdict::UnknownError),
        fuzzy_size_factor: row.get(5)?,
        first_seen: DateTime::parse_from_rfc3339(&first_seen)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        last_seen: DateTime::parse_from_rfc3339(&last_seen)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {}: {}", s, e)))
}
