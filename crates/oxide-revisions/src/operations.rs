//! Changes that only take effect when a table is rebuilt.
//!
//! SQLite cannot retype, constrain or drop a column in place, and cannot
//! backfill a new column from other columns. Operations that need any of these
//! record a [`PendingChange`] on the table model instead of emitting SQL; the
//! next rebuild of that table consumes every record.

use serde::{Deserialize, Serialize};

/// A model change waiting for a table rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PendingChange {
    /// A column definition and/or its rebuild hints were replaced.
    Changed {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// A column was removed from the model.
    Deleted {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// A column was added with hints that backfill it from other data.
    Backfill {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
}

impl PendingChange {
    /// Returns the table this change belongs to.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::Changed { table, .. }
            | Self::Deleted { table, .. }
            | Self::Backfill { table, .. } => table,
        }
    }

    /// Returns the column this change concerns.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::Changed { column, .. }
            | Self::Deleted { column, .. }
            | Self::Backfill { column, .. } => column,
        }
    }
}
