// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Local SQLite snapshot of the last application list fetched per account.

use anyhow::{Context, Result, anyhow, bail};
use jobtrack_app::{ApplicationId, JobApplication, format_iso_date, parse_iso_date};
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

pub const APP_NAME: &str = "jobtrack";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS snapshots (
  account TEXT PRIMARY KEY,
  fetched_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS applications (
  account TEXT NOT NULL REFERENCES snapshots (account) ON DELETE CASCADE,
  id INTEGER NOT NULL,
  position INTEGER NOT NULL,
  company_name TEXT NOT NULL,
  job_title TEXT NOT NULL,
  status TEXT NOT NULL,
  application_date TEXT NOT NULL,
  location TEXT,
  job_url TEXT,
  notes TEXT,
  PRIMARY KEY (account, id)
);
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedSnapshot {
    pub applications: Vec<JobApplication>,
    pub fetched_at: OffsetDateTime,
}

impl CachedSnapshot {
    pub fn age(&self, now: OffsetDateTime) -> Duration {
        now - self.fetched_at
    }

    /// A zero `max_age` never expires.
    pub fn is_fresh(&self, max_age: std::time::Duration, now: OffsetDateTime) -> bool {
        if max_age.is_zero() {
            return true;
        }
        self.age(now) <= max_age
    }
}

pub struct Cache {
    conn: Connection,
}

impl Cache {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_cache_path(&printable)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create cache directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open cache at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory cache")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA)
            .context("create cache schema")
    }

    /// Replace the snapshot for `account` with `applications`.
    pub fn store_snapshot(
        &mut self,
        account: &str,
        applications: &[JobApplication],
        fetched_at: OffsetDateTime,
    ) -> Result<()> {
        let fetched_at = fetched_at
            .format(&Rfc3339)
            .context("format snapshot timestamp")?;
        let tx = self.conn.transaction().context("begin snapshot write")?;
        tx.execute("DELETE FROM snapshots WHERE account = ?", params![account])
            .context("drop previous snapshot")?;
        tx.execute(
            "INSERT INTO snapshots (account, fetched_at) VALUES (?, ?)",
            params![account, fetched_at],
        )
        .context("insert snapshot")?;
        {
            let mut stmt = tx
                .prepare(
                    "
                    INSERT INTO applications (
                      account, id, position, company_name, job_title, status,
                      application_date, location, job_url, notes
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    ",
                )
                .context("prepare snapshot insert")?;
            for (position, record) in applications.iter().enumerate() {
                let position = i64::try_from(position).context("snapshot position overflow")?;
                stmt.execute(params![
                    account,
                    record.id.get(),
                    position,
                    record.company_name,
                    record.job_title,
                    record.status,
                    format_iso_date(record.application_date),
                    record.location,
                    record.job_url,
                    record.notes,
                ])
                .with_context(|| format!("cache application {}", record.id))?;
            }
        }
        tx.commit().context("commit snapshot")?;
        debug!(rows = applications.len(), "stored application snapshot");
        Ok(())
    }

    pub fn load_snapshot(&self, account: &str) -> Result<Option<CachedSnapshot>> {
        let fetched_at: Option<String> = self
            .conn
            .query_row(
                "SELECT fetched_at FROM snapshots WHERE account = ?",
                params![account],
                |row| row.get(0),
            )
            .optional()
            .context("query snapshot")?;
        let Some(fetched_at) = fetched_at else {
            return Ok(None);
        };
        let fetched_at = OffsetDateTime::parse(&fetched_at, &Rfc3339)
            .with_context(|| format!("parse snapshot timestamp {fetched_at:?}"))?;

        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, company_name, job_title, status, application_date,
                       location, job_url, notes
                FROM applications
                WHERE account = ?
                ORDER BY position
                ",
            )
            .context("prepare snapshot query")?;
        let rows = stmt
            .query_map(params![account], |row| {
                let date_raw: String = row.get(4)?;
                let application_date = parse_iso_date(&date_raw).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        4,
                        rusqlite::types::Type::Text,
                        Box::new(std::io::Error::new(
                            std::io::ErrorKind::InvalidData,
                            format!("invalid cached date {date_raw:?}"),
                        )),
                    )
                })?;
                Ok(JobApplication {
                    id: ApplicationId::new(row.get(0)?),
                    company_name: row.get(1)?,
                    job_title: row.get(2)?,
                    status: row.get(3)?,
                    application_date,
                    location: row.get(5)?,
                    job_url: row.get(6)?,
                    notes: row.get(7)?,
                })
            })
            .context("query cached applications")?;
        let applications = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect cached applications")?;

        Ok(Some(CachedSnapshot {
            applications,
            fetched_at,
        }))
    }

    /// Drop every snapshot. Returns the number of accounts removed.
    pub fn clear(&self) -> Result<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM snapshots", [])
            .context("clear snapshots")?;
        info!(removed, "cleared application cache");
        Ok(removed)
    }
}

/// Stable cache key for an API endpoint and credential. The token itself is
/// never written to disk.
pub fn account_key(base_url: &str, token: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(base_url.trim_end_matches('/').as_bytes());
    hasher.update([0u8]);
    hasher.update(token.unwrap_or_default().as_bytes());
    let digest = hasher.finalize();

    let mut output = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}

pub fn default_cache_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("JOBTRACK_CACHE_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set JOBTRACK_CACHE_PATH to a writable cache path")
    })?;
    Ok(data_root.join(APP_NAME).join("cache.db"))
}

pub fn validate_cache_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("cache path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "cache path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("cache path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!("cache path {path:?} contains '?'; remove query parameters and use a plain file path");
    }

    Ok(())
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

#[cfg(test)]
mod tests {
    use super::account_key;

    #[test]
    fn account_key_depends_on_url_and_token() {
        let base = account_key("http://localhost:5000", Some("a"));
        assert_eq!(base.len(), 64);
        assert_eq!(base, account_key("http://localhost:5000/", Some("a")));
        assert_ne!(base, account_key("http://localhost:5000", Some("b")));
        assert_ne!(base, account_key("http://example.com", Some("a")));
        assert!(base.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
