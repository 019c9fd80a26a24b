use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::model::Report;

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create database directory {}", dir.display()))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sources (
            url          TEXT PRIMARY KEY,
            last_check   TEXT,
            last_error   TEXT,
            new_count    INTEGER NOT NULL DEFAULT 0,
            total_count  INTEGER NOT NULL DEFAULT 0,
            created_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS seen_identities (
            id          INTEGER PRIMARY KEY,
            url         TEXT NOT NULL REFERENCES sources(url),
            identity    TEXT NOT NULL,
            first_seen  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(url, identity)
        );
        CREATE INDEX IF NOT EXISTS idx_seen_url ON seen_identities(url);
        ",
    )?;
    Ok(())
}

pub fn ensure_source(conn: &Connection, url: &str) -> Result<()> {
    conn.execute("INSERT OR IGNORE INTO sources (url) VALUES (?1)", params![url])?;
    Ok(())
}

// ── Seen identities ──

pub fn load_seen(conn: &Connection, url: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT identity FROM seen_identities WHERE url = ?1 ORDER BY identity")?;
    let rows = stmt
        .query_map(params![url], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(rows)
}

/// Merge identities into the stored set. Existing rows keep their first_seen.
pub fn save_seen(conn: &Connection, url: &str, ids: &BTreeSet<String>) -> Result<usize> {
    ensure_source(conn, url)?;
    let tx = conn.unchecked_transaction()?;
    let mut inserted = 0;
    {
        let mut stmt =
            tx.prepare("INSERT OR IGNORE INTO seen_identities (url, identity) VALUES (?1, ?2)")?;
        for id in ids {
            inserted += stmt.execute(params![url, id])?;
        }
    }
    tx.commit()?;
    Ok(inserted)
}

// ── Check state ──

pub fn record_check(conn: &Connection, report: &Report) -> Result<()> {
    ensure_source(conn, &report.url)?;
    conn.execute(
        "UPDATE sources
         SET last_check = ?2, last_error = NULL, new_count = ?3, total_count = ?4
         WHERE url = ?1",
        params![
            report.url,
            report.checked_at,
            report.new_count as i64,
            report.total_count as i64
        ],
    )?;
    Ok(())
}

pub fn record_failure(conn: &Connection, url: &str, checked_at: &str, message: &str) -> Result<()> {
    ensure_source(conn, url)?;
    conn.execute(
        "UPDATE sources SET last_check = ?2, last_error = ?3 WHERE url = ?1",
        params![url, checked_at, message],
    )?;
    Ok(())
}

pub struct SourceStatus {
    pub url: String,
    pub last_check: Option<String>,
    pub last_error: Option<String>,
    pub new_count: i64,
    pub total_count: i64,
    pub seen: i64,
}

pub fn list_sources(conn: &Connection) -> Result<Vec<SourceStatus>> {
    let mut stmt = conn.prepare(
        "SELECT s.url, s.last_check, s.last_error, s.new_count, s.total_count,
                (SELECT COUNT(*) FROM seen_identities i WHERE i.url = s.url)
         FROM sources s
         ORDER BY s.url",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(SourceStatus {
                url: row.get(0)?,
                last_check: row.get(1)?,
                last_error: row.get(2)?,
                new_count: row.get(3)?,
                total_count: row.get(4)?,
                seen: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Tests ──
