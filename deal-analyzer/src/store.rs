//! SQLite cache of finished analysis reports
//!
//! Reports are keyed by the file id assigned at upload and are immutable once
//! written; saving the same id again replaces the previous report.
//!
//! # Database Schema
//!
//! 1. **reports** - one row per analysed file (report text, stage log JSON, timing)
//! 2. **schema_version** - database schema version for migrations
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use deal_analyzer::store::ReportStore;
//!
//! # fn main() -> anyhow::Result<()> {
//! let store = ReportStore::new("/tmp/reports.db".into())?;
//! store.initialize_schema()?;
//!
//! for report in store.list(20, 0)? {
//!     println!("{} {}", report.file_id, report.original_filename);
//! }
//! # Ok(())
//! # }
//! ```

use crate::analysis::{AnalysisOutcome, InvestmentType, StageResult};
use crate::media::FileKind;
use anyhow::{Context, Result};
use chrono::{DateTime, Local, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;

const SCHEMA_VERSION: i32 = 1;

/// Database wrapper for the report cache
pub struct ReportStore {
    conn: Connection,
}

/// A cached analysis
#[derive(Debug, Clone, PartialEq)]
pub struct CachedReport {
    pub file_id: String,
    pub original_filename: String,
    pub file_kind: FileKind,
    pub investment_type: Option<InvestmentType>,
    pub report: String,
    pub elapsed_seconds: f64,
    pub stage_log: Vec<StageResult>,
    /// Set when the run ended in the top-level guard
    pub error: Option<String>,
    pub created_at: DateTime<Local>,
}

impl CachedReport {
    pub fn from_outcome(
        file_id: impl Into<String>,
        original_filename: impl Into<String>,
        file_kind: FileKind,
        outcome: AnalysisOutcome,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            original_filename: original_filename.into(),
            file_kind,
            investment_type: outcome.investment_type,
            report: outcome.report,
            elapsed_seconds: outcome.elapsed_seconds,
            stage_log: outcome.stage_log,
            error: outcome.error,
            created_at: Local::now(),
        }
    }
}

impl ReportStore {
    /// Open (or create) the database at `path`
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open report cache {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self { conn })
    }

    /// Create an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    pub fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS reports (
                file_id TEXT PRIMARY KEY,
                original_filename TEXT NOT NULL,
                file_kind TEXT NOT NULL,
                investment_type TEXT,
                report TEXT NOT NULL,
                elapsed_seconds REAL NOT NULL,
                stage_log TEXT NOT NULL,
                error TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_reports_created_at ON reports(created_at DESC);

            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;

        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION],
        )?;

        Ok(())
    }

    pub fn get_schema_version(&self) -> Result<i32> {
        let version: i32 =
            self.conn
                .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                    row.get(0)
                })?;
        Ok(version)
    }

    /// Insert or replace the report for `report.file_id`
    pub fn save(&self, report: &CachedReport) -> Result<()> {
        let stage_log = serde_json::to_string(&report.stage_log)?;

        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO reports (
                file_id, original_filename, file_kind, investment_type, report,
                elapsed_seconds, stage_log, error, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                report.file_id,
                report.original_filename,
                report.file_kind.as_str(),
                report.investment_type.map(|t| t.as_str()),
                report.report,
                report.elapsed_seconds,
                stage_log,
                report.error,
                stored_timestamp(&report.created_at),
            ],
        )?;

        Ok(())
    }

    pub fn get(&self, file_id: &str) -> Result<Option<CachedReport>> {
        let result = self
            .conn
            .query_row(
                r#"
                SELECT file_id, original_filename, file_kind, investment_type, report,
                       elapsed_seconds, stage_log, error, created_at
                FROM reports
                WHERE file_id = ?1
                "#,
                params![file_id],
                map_report_row,
            )
            .optional()?;

        Ok(result)
    }

    /// Newest first
    pub fn list(&self, limit: usize, offset: usize) -> Result<Vec<CachedReport>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT file_id, original_filename, file_kind, investment_type, report,
                   elapsed_seconds, stage_log, error, created_at
            FROM reports
            ORDER BY created_at DESC
            LIMIT ?1 OFFSET ?2
            "#,
        )?;

        let reports = stmt
            .query_map(params![limit, offset], map_report_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(reports)
    }

    /// Returns whether a report was deleted
    pub fn delete(&self, file_id: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM reports WHERE file_id = ?1", params![file_id])?;
        Ok(deleted > 0)
    }

    /// Delete reports created before `cutoff`
    pub fn delete_before(&self, cutoff: DateTime<Local>) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM reports WHERE created_at < ?1",
            params![stored_timestamp(&cutoff)],
        )?;
        Ok(deleted)
    }
}

/// UTC with fixed precision, so text order is chronological order
fn stored_timestamp(at: &DateTime<Local>) -> String {
    at.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error<E>(index: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(err))
}

fn map_report_row(row: &Row) -> rusqlite::Result<CachedReport> {
    let file_kind_str: String = row.get(2)?;
    let investment_type_str: Option<String> = row.get(3)?;
    let stage_log_str: String = row.get(6)?;
    let created_at_str: String = row.get(8)?;

    let file_kind = FileKind::parse(&file_kind_str).ok_or_else(|| {
        conversion_error(
            2,
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown file kind {:?}", file_kind_str),
            ),
        )
    })?;
    let stage_log: Vec<StageResult> =
        serde_json::from_str(&stage_log_str).map_err(|e| conversion_error(6, e))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map_err(|e| conversion_error(8, e))?
        .with_timezone(&Local);

    Ok(CachedReport {
        file_id: row.get(0)?,
        original_filename: row.get(1)?,
        file_kind,
        investment_type: investment_type_str.as_deref().map(InvestmentType::from_label),
        report: row.get(4)?,
        elapsed_seconds: row.get(5)?,
        stage_log,
        error: row.get(7)?,
        created_at,
    })
}
