//! Error types for the migration builder.

/// Errors raised while declaring revisions or emitting their SQL.
///
/// Every variant describes a programming error on the caller's side: the
/// builder performs no I/O, so nothing here is transient or retryable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MigrateError {
    /// A builder call was made before any revision was opened.
    #[error("No revision is open; call create_migration() first")]
    NoOpenRevision,

    /// The table is not part of the schema model.
    #[error("Table '{0}' does not exist")]
    TableNotFound(String),

    /// The column is not part of the table's model.
    #[error("Column '{column}' does not exist in table '{table}'")]
    ColumnNotFound {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// The column name is already taken in the table's model.
    #[error("Column '{column}' already exists in table '{table}'")]
    ColumnExists {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// A textual column type outside the supported set.
    #[error("Unknown column type '{0}'")]
    UnknownColumnType(String),

    /// A column descriptor combines modifiers that cannot be rendered.
    #[error("Invalid column '{column}': {reason}")]
    InvalidColumn {
        /// Column name.
        column: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A table definition is inconsistent as a whole.
    #[error("Invalid table '{table}': {reason}")]
    InvalidTable {
        /// Table name.
        table: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A rebuild would read a column the physical table does not have.
    #[error("Rebuild of '{table}' reads column '{column}' which the table does not have")]
    MissingSourceColumn {
        /// Table name.
        table: String,
        /// Source column name.
        column: String,
    },

    /// A revision inside the replay range has no recorded entry.
    #[error("Revision {0} is missing from the revision log")]
    RevisionGap(usize),
}

impl MigrateError {
    pub(crate) fn invalid_column(column: &str, reason: impl Into<String>) -> Self {
        Self::InvalidColumn {
            column: column.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_table(table: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTable {
            table: table.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn column_not_found(table: &str, column: &str) -> Self {
        Self::ColumnNotFound {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

/// Result type for migration builder operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
