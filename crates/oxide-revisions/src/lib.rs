//! Revision-indexed schema migrations for SQLite.
//!
//! `oxide-revisions` lets a program declare its schema history as an ordered
//! list of revisions through an imperative builder, and turns a database's
//! "last applied revision" into the exact statements that bring it up to date:
//! - Each revision is a list of SQL statements with positional arguments
//! - The schema model tracks tables as declared so far, so column changes that
//!   SQLite cannot express in place are emulated with a table rebuild
//! - Nothing is executed; statements are handed to the caller's SQL client
//!
//! # Architecture
//!
//! - **Schema** - Column, parameter and table model types
//! - **State** - The schema model and its mutators, including rebuild planning
//! - **Dialect** - DDL rendering
//! - **Revision** - The append-only revision log and replay
//! - **History** - The `migrations` bookkeeping table
//! - **Context** - Ties the above together behind the builder API
//!
//! # Example
//!
//! ```rust
//! use oxide_revisions::prelude::*;
//!
//! let mut ctx = MigrationContext::with_config(ContextConfig::new().app_version("1.0.0"));
//!
//! ctx.create_migration();
//! ctx.create_table(
//!     "species",
//!     vec![
//!         Column::id("id"),
//!         Column::new("name", ColumnType::Text).not_null(),
//!         Column::new("origin", ColumnType::Text),
//!     ],
//! )?;
//!
//! ctx.create_migration();
//! ctx.add_table_column(
//!     "species",
//!     Column::new("residence", ColumnType::Text),
//!     Some(ColumnParams::new().fill_from("origin").coalesce("New Earth")),
//! )?;
//! ctx.recreate_table("species", None)?;
//!
//! // A database that already has revision 0 only needs revision 1.
//! let queries = ctx.migrations_sql_queries(&mut LastMigration::at(0))?;
//! assert_eq!(queries.first().unwrap().query, "BEGIN TRANSACTION;");
//! assert_eq!(queries.last().unwrap().query, "VACUUM;");
//! # Ok::<(), oxide_revisions::error::MigrateError>(())
//! ```
//!
//! # Executing
//!
//! The caller creates the bookkeeping table with
//! [`MigrationContext::migration_table_create_query`], reads the single row
//! returned by [`MigrationContext::migration_revision_select_query`] into a
//! [`history::LastMigration`], and runs the returned statements in order on
//! one connection.

pub mod config;
pub mod context;
pub mod dialect;
pub mod error;
pub mod history;
pub mod operations;
pub mod revision;
pub mod schema;
pub mod state;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{ContextConfig, GapPolicy};
    pub use crate::context::{BEGIN_TRANSACTION, COMMIT_TRANSACTION, MigrationContext, VACUUM};
    pub use crate::dialect::{MigrationDialect, SqliteDialect};
    pub use crate::error::{MigrateError, Result};
    pub use crate::history::LastMigration;
    pub use crate::operations::PendingChange;
    pub use crate::revision::{Revision, RevisionLog, Statement};
    pub use crate::schema::{Column, ColumnDescriptor, ColumnParams, ColumnType, SqlValue};
    pub use crate::state::SchemaState;
}

/// A set of revisions declared in Rust code.
///
/// Implemented by the type that owns an application's schema history, so the
/// same declaration can be replayed into fresh contexts (tests, tooling).
pub trait RevisionSet {
    /// Declares every revision, in order, into `ctx`.
    fn declare(ctx: &mut context::MigrationContext) -> error::Result<()>;

    /// Builds a fresh context holding this set's revisions.
    fn build(config: config::ContextConfig) -> error::Result<context::MigrationContext> {
        let mut ctx = context::MigrationContext::with_config(config);
        Self::declare(&mut ctx)?;
        Ok(ctx)
    }
}
