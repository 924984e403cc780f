//! The migration context.
//!
//! A `MigrationContext` owns one schema model and one revision log. Builder
//! calls update the model and append the SQL they need to the open revision;
//! [`MigrationContext::migrations_sql_queries`] later picks the revisions a
//! given database is missing.
//!
//! The context is not synchronized: callers declare revisions from one thread,
//! in order.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::{ContextConfig, GapPolicy};
use crate::dialect::{MigrationDialect, SqliteDialect};
use crate::error::Result;
use crate::history::{self, LastMigration};
use crate::operations::PendingChange;
use crate::revision::{RevisionLog, Statement};
use crate::schema::{Column, ColumnParams, SqlValue};
use crate::state::{RebuildPlan, SchemaState};

/// Opens the batch transaction.
pub const BEGIN_TRANSACTION: &str = "BEGIN TRANSACTION;";
/// Commits the batch transaction.
pub const COMMIT_TRANSACTION: &str = "COMMIT TRANSACTION;";
/// Compacts the database after the batch.
pub const VACUUM: &str = "VACUUM;";

/// Schema model plus revision log for one migration set.
#[derive(Debug, Default)]
pub struct MigrationContext {
    config: ContextConfig,
    dialect: SqliteDialect,
    state: SchemaState,
    log: RevisionLog,
}

impl MigrationContext {
    /// Creates a context with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context with the given configuration.
    #[must_use]
    pub fn with_config(config: ContextConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Returns the schema model.
    #[must_use]
    pub fn schema(&self) -> &SchemaState {
        &self.state
    }

    /// Returns the revision log.
    #[must_use]
    pub fn revisions(&self) -> &RevisionLog {
        &self.log
    }

    /// Clears the schema model and revision log, keeping the configuration.
    pub fn reset(&mut self) {
        self.state.clear();
        self.log.clear();
    }

    /// Returns the dialect tag.
    #[must_use]
    pub fn sql_dialect(&self) -> Option<&str> {
        self.config.sql_dialect.as_deref()
    }

    /// Sets the dialect tag. It is stored only; rendering is unaffected.
    pub fn set_sql_dialect(&mut self, dialect: impl Into<String>) {
        self.config.sql_dialect = Some(dialect.into());
    }

    /// Sets how gaps in the replay range are handled.
    pub fn set_gap_policy(&mut self, policy: GapPolicy) {
        self.config.gap_policy = policy;
    }

    /// SQL creating the bookkeeping table.
    #[must_use]
    pub fn migration_table_create_query(&self) -> String {
        history::create_table_query(&self.dialect, &self.config.version_column)
    }

    /// SQL reading the latest applied revision.
    #[must_use]
    pub fn migration_revision_select_query(&self) -> String {
        history::select_latest_query(&self.dialect, &self.config.version_column)
    }

    /// Opens a new revision.
    ///
    /// Its first statement records the revision in the bookkeeping table.
    pub fn create_migration(&mut self) -> usize {
        let record = Statement::with_args(
            history::record_revision_query(&self.dialect, &self.config.version_column),
            vec![
                SqlValue::from(self.log.next_index()),
                SqlValue::from(self.config.app_version.as_str()),
                SqlValue::from(Utc::now().timestamp()),
            ],
        );
        let index = self.log.open(record);

        info!(revision = index, "Opened revision");
        index
    }

    /// Reserves the next revision index without recording a revision.
    ///
    /// Used for revisions that were shipped and later withdrawn.
    pub fn skip_migration(&mut self) -> usize {
        let index = self.log.skip();
        info!(revision = index, "Reserved empty revision");
        index
    }

    /// Appends an arbitrary statement to the open revision.
    pub fn add_sql(&mut self, query: impl Into<String>, args: Vec<SqlValue>) -> Result<()> {
        self.push(Statement::with_args(query, args))
    }

    fn push(&mut self, statement: Statement) -> Result<()> {
        let revision = self.log.push(statement)?;
        if let Some(statement) = self.log.get(revision).and_then(|r| r.statements.last()) {
            debug!(revision, sql = %statement.query, "Recorded statement");
        }
        Ok(())
    }

    /// Creates a table, dropping any table of the same name first.
    pub fn create_table(&mut self, name: &str, columns: Vec<Column>) -> Result<()> {
        self.log.current_index()?;
        let (columns, replaced) = self.state.create_table(name, columns)?;

        if replaced {
            self.push(Statement::new(self.dialect.drop_table(name)))?;
        }
        self.push(Statement::new(self.dialect.create_table(name, &columns)))
    }

    /// Adds a column in place.
    ///
    /// `params` only take effect when the table is next rebuilt.
    pub fn add_table_column(
        &mut self,
        table: &str,
        column: Column,
        params: Option<ColumnParams>,
    ) -> Result<Option<PendingChange>> {
        self.log.current_index()?;
        let (column, pending) = self.state.add_column(table, column, params)?;

        self.push(Statement::new(self.dialect.add_column(table, &column)))?;
        Ok(pending)
    }

    /// Renames a column in place.
    pub fn rename_table_column(&mut self, table: &str, old_name: &str, new_name: &str) -> Result<()> {
        self.log.current_index()?;
        self.state.rename_column(table, old_name, new_name)?;

        self.push(Statement::new(
            self.dialect.rename_column(table, old_name, new_name),
        ))
    }

    /// Replaces a column's definition and/or rebuild hints.
    ///
    /// Emits nothing; the change is applied by the next
    /// [`MigrationContext::recreate_table`].
    pub fn change_table_column(
        &mut self,
        table: &str,
        column_name: &str,
        column: Option<Column>,
        params: Option<ColumnParams>,
    ) -> Result<PendingChange> {
        self.log.current_index()?;
        self.state.change_column(table, column_name, column, params)
    }

    /// Removes a column.
    ///
    /// Emits nothing; the column is dropped by the next
    /// [`MigrationContext::recreate_table`].
    pub fn delete_table_column(&mut self, table: &str, column_name: &str) -> Result<PendingChange> {
        self.log.current_index()?;
        self.state.delete_column(table, column_name)
    }

    /// Rebuilds a table into `columns`, or into its current model columns.
    ///
    /// Emits: create `<table>_tmp`, copy rows, drop `<table>`, rename
    /// `<table>_tmp` to `<table>`. Returns the pending changes it applied.
    pub fn recreate_table(
        &mut self,
        table: &str,
        columns: Option<Vec<Column>>,
    ) -> Result<Vec<PendingChange>> {
        self.log.current_index()?;
        let plan = self.state.rebuild_table(table, columns)?;

        for statement in self.rebuild_statements(&plan) {
            self.push(statement)?;
        }

        info!(
            table = %plan.table,
            applied = plan.consumed.len(),
            "Recreated table"
        );
        Ok(plan.consumed)
    }

    fn rebuild_statements(&self, plan: &RebuildPlan) -> Vec<Statement> {
        let sources: Vec<String> = plan
            .sources
            .iter()
            .map(|(source, coalesce)| self.dialect.copy_source(source, coalesce.as_ref()))
            .collect();

        vec![
            Statement::new(self.dialect.create_table(&plan.temp_table, &plan.columns)),
            Statement::new(self.dialect.copy_rows(
                &plan.table,
                &plan.temp_table,
                &plan.targets,
                &sources,
            )),
            Statement::new(self.dialect.drop_table(&plan.table)),
            Statement::new(self.dialect.rename_table(&plan.temp_table, &plan.table)),
        ]
    }

    /// Drops a table and removes it from the model.
    pub fn remove_table(&mut self, table: &str) -> Result<()> {
        self.log.current_index()?;
        self.state.remove_table(table)?;
        self.push(Statement::new(self.dialect.drop_table(table)))
    }

    /// Returns the statements bringing a database at `last` up to date.
    ///
    /// A missing `latest_revision` is set to −1. The result is every
    /// statement of every later revision, wrapped in
    /// `BEGIN TRANSACTION;` … `COMMIT TRANSACTION;` and followed by
    /// `VACUUM;`. The envelope is emitted even when nothing is pending.
    pub fn migrations_sql_queries(&self, last: &mut LastMigration) -> Result<Vec<Statement>> {
        info!("Generating migration SQL queries");

        let latest = match last.latest_revision {
            Some(revision) => {
                info!(
                    revision,
                    version = last.app_version.as_deref().unwrap_or("unknown"),
                    migrated_at = %last
                        .migrated_at()
                        .map_or_else(|| "unknown".to_string(), |d| d.to_rfc3339()),
                    "Last database migration"
                );
                revision
            }
            None => {
                info!("Migration history is empty");
                last.latest_revision = Some(-1);
                -1
            }
        };

        let target = i64::try_from(self.log.len()).unwrap_or(i64::MAX) - 1;
        if latest > target {
            warn!(
                latest,
                target, "Database is ahead of the revision log, nothing to apply"
            );
        } else if latest < target {
            info!(target, "Target migration");
        }

        let body = self.log.statements_after(latest, self.config.gap_policy)?;

        let mut queries = Vec::with_capacity(body.len() + 3);
        queries.push(Statement::new(BEGIN_TRANSACTION));
        queries.extend(body);
        queries.push(Statement::new(COMMIT_TRANSACTION));
        queries.push(Statement::new(VACUUM));

        info!(statements = queries.len(), "SQL queries have been generated");
        Ok(queries)
    }
}
