//! Migration history bookkeeping.
//!
//! The `migrations` table records, per applied revision, the version tag of
//! the code that applied it and when. Every revision's first statement inserts
//! its own row, so executing a batch also records it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dialect::MigrationDialect;

/// Name of the bookkeeping table.
pub const MIGRATIONS_TABLE: &str = "migrations";

/// SQL creating the bookkeeping table.
#[must_use]
pub fn create_table_query(dialect: &impl MigrationDialect, version_column: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\"revision\" INTEGER NOT NULL PRIMARY KEY, \
         {} TEXT NOT NULL, \"date_migrated\" INTEGER NOT NULL);",
        dialect.quote_identifier(MIGRATIONS_TABLE),
        dialect.quote_identifier(version_column)
    )
}

/// SQL reading the latest applied revision.
///
/// Always yields one row; on an empty table every field is NULL.
#[must_use]
pub fn select_latest_query(dialect: &impl MigrationDialect, version_column: &str) -> String {
    format!(
        "SELECT MAX(revision) AS \"latest_revision\", {}, \"date_migrated\" FROM {};",
        dialect.quote_identifier(version_column),
        dialect.quote_identifier(MIGRATIONS_TABLE)
    )
}

/// SQL recording a revision; takes `revision`, version tag and unix time.
#[must_use]
pub fn record_revision_query(dialect: &impl MigrationDialect, version_column: &str) -> String {
    format!(
        "INSERT INTO {} (revision, {}, date_migrated) VALUES (?, ?, ?);",
        dialect.quote_identifier(MIGRATIONS_TABLE),
        dialect.quote_identifier(version_column)
    )
}

/// The last migration a database has applied, as read by the executor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMigration {
    /// Highest applied revision; `None` when nothing was ever applied.
    pub latest_revision: Option<i64>,
    /// Version tag stored with that revision.
    pub app_version: Option<String>,
    /// Unix time (seconds) the revision was applied.
    pub date_migrated: Option<i64>,
}

impl LastMigration {
    /// A database with no migration history.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A database at `revision`.
    #[must_use]
    pub fn at(revision: i64) -> Self {
        Self {
            latest_revision: Some(revision),
            ..Self::default()
        }
    }

    /// Returns when the revision was applied, if known.
    #[must_use]
    pub fn migrated_at(&self) -> Option<DateTime<Utc>> {
        self.date_migrated
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}
