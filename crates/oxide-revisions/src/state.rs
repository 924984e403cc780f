//! The schema model.
//!
//! `SchemaState` tracks every table as declared so far: its columns, their
//! rebuild hints, the columns the physical table actually has, and the changes
//! still waiting for a rebuild. It holds the declared end-state only; which
//! revision introduced what is the revision log's business.

use crate::error::{MigrateError, Result};
use crate::operations::PendingChange;
use crate::schema::{validate_table, Column, ColumnParams, SqlValue, TableModel};

/// Suffix of the temporary table used while rebuilding.
pub const REBUILD_SUFFIX: &str = "_tmp";

/// Everything needed to render one table rebuild.
#[derive(Debug, Clone, PartialEq)]
pub struct RebuildPlan {
    /// Table being rebuilt.
    pub table: String,
    /// Temporary table the rows are copied into.
    pub temp_table: String,
    /// Target column set.
    pub columns: Vec<Column>,
    /// INSERT target list.
    pub targets: Vec<String>,
    /// SELECT source per target: old-table column and optional fallback.
    pub sources: Vec<(String, Option<SqlValue>)>,
    /// Pending changes applied by this rebuild.
    pub consumed: Vec<PendingChange>,
}

/// Tracks the declared schema.
#[derive(Debug, Default)]
pub struct SchemaState {
    tables: Vec<TableModel>,
}

impl SchemaState {
    /// Creates a new empty schema state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all tables in creation order.
    #[must_use]
    pub fn tables(&self) -> &[TableModel] {
        &self.tables
    }

    /// Gets a table by name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<&TableModel> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Returns table names.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }

    /// Returns the changes of `table` still waiting for a rebuild.
    pub fn pending_changes(&self, table: &str) -> Result<&[PendingChange]> {
        Ok(self.table(table)?.pending_changes())
    }

    /// Forgets every table.
    pub fn clear(&mut self) {
        self.tables.clear();
    }

    fn table(&self, name: &str) -> Result<&TableModel> {
        self.get_table(name)
            .ok_or_else(|| MigrateError::TableNotFound(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut TableModel> {
        self.tables
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| MigrateError::TableNotFound(name.to_string()))
    }

    fn check_references(&self, table: &str, columns: &[Column]) -> Result<()> {
        for column in columns {
            if let Some(ref target) = column.references {
                if target != table && self.get_table(target).is_none() {
                    return Err(MigrateError::TableNotFound(target.clone()));
                }
            }
        }
        Ok(())
    }

    /// Registers a table, replacing any table of the same name.
    ///
    /// Returns the prepared columns and whether a previous table was replaced.
    pub fn create_table(&mut self, name: &str, columns: Vec<Column>) -> Result<(Vec<Column>, bool)> {
        let columns = columns
            .into_iter()
            .map(Column::prepare)
            .collect::<Result<Vec<_>>>()?;
        validate_table(name, &columns)?;
        self.check_references(name, &columns)?;

        let replaced = match self.tables.iter().position(|t| t.name == name) {
            Some(idx) => {
                self.tables.remove(idx);
                true
            }
            None => false,
        };
        self.tables.push(TableModel::new(name, columns.clone()));

        Ok((columns, replaced))
    }

    /// Adds a column that is created in place with `ADD COLUMN`.
    ///
    /// When `params` carry hints, a [`PendingChange::Backfill`] is recorded
    /// and returned alongside the prepared column.
    pub fn add_column(
        &mut self,
        table: &str,
        column: Column,
        params: Option<ColumnParams>,
    ) -> Result<(Column, Option<PendingChange>)> {
        let column = column.prepare()?;

        if column.primary_key || column.unique {
            return Err(MigrateError::invalid_column(
                &column.name,
                "PRIMARY KEY and UNIQUE columns cannot be added in place; recreate the table",
            ));
        }
        if column.not_null && column.default.as_ref().map_or(true, SqlValue::is_null) {
            return Err(MigrateError::invalid_column(
                &column.name,
                "a NOT NULL column needs a non-NULL default to be added in place",
            ));
        }
        if column.references.is_some()
            && column.default.as_ref().is_some_and(|d| !d.is_null())
        {
            return Err(MigrateError::invalid_column(
                &column.name,
                "a foreign key column added in place must default to NULL",
            ));
        }
        if let Some(ref params) = params {
            params.validate(&column.name)?;
        }
        self.check_references(table, std::slice::from_ref(&column))?;

        let model = self.table_mut(table)?;
        if model.get_column(&column.name).is_some()
            || model.physical.iter().any(|c| *c == column.name)
        {
            return Err(MigrateError::ColumnExists {
                table: table.to_string(),
                column: column.name,
            });
        }

        model.physical.push(column.name.clone());
        model.columns.push(column.clone());

        let pending = match params {
            Some(params) if !params.is_empty() => {
                model.params.insert(column.name.clone(), params);
                let change = PendingChange::Backfill {
                    table: table.to_string(),
                    column: column.name.clone(),
                };
                model.pending.push(change.clone());
                Some(change)
            }
            _ => {
                model.params.remove(&column.name);
                None
            }
        };

        Ok((column, pending))
    }

    /// Renames a column, keeping its definition and hints.
    pub fn rename_column(&mut self, table: &str, old_name: &str, new_name: &str) -> Result<()> {
        let model = self.table_mut(table)?;

        if model.get_column(new_name).is_some() || model.physical.iter().any(|c| c == new_name) {
            return Err(MigrateError::ColumnExists {
                table: table.to_string(),
                column: new_name.to_string(),
            });
        }

        let column = model
            .get_column_mut(old_name)
            .ok_or_else(|| MigrateError::column_not_found(table, old_name))?;
        column.name = new_name.to_string();

        if let Some(params) = model.params.remove(old_name) {
            model.params.insert(new_name.to_string(), params);
        }
        for name in &mut model.physical {
            if name == old_name {
                *name = new_name.to_string();
            }
        }

        Ok(())
    }

    /// Replaces a column's definition and/or hints in place.
    ///
    /// Empty `params` clear the column's hints.
    pub fn change_column(
        &mut self,
        table: &str,
        column_name: &str,
        column: Option<Column>,
        params: Option<ColumnParams>,
    ) -> Result<PendingChange> {
        let column = column.map(Column::prepare).transpose()?;
        if let Some(ref params) = params {
            params.validate(column_name)?;
        }
        if let Some(ref column) = column {
            if column.name != column_name {
                return Err(MigrateError::invalid_column(
                    &column.name,
                    format!("replacement for '{column_name}' must keep its name; rename it first"),
                ));
            }
            self.check_references(table, std::slice::from_ref(column))?;
        }

        let model = self.table_mut(table)?;
        let idx = model
            .columns
            .iter()
            .position(|c| c.name == column_name)
            .ok_or_else(|| MigrateError::column_not_found(table, column_name))?;

        if let Some(column) = column {
            let mut candidate = model.columns.clone();
            candidate[idx] = column;
            validate_table(table, &candidate)?;
            model.columns = candidate;
        }

        match params {
            Some(params) if params.is_empty() => {
                model.params.remove(column_name);
            }
            Some(params) => {
                model.params.insert(column_name.to_string(), params);
            }
            None => {}
        }

        let change = PendingChange::Changed {
            table: table.to_string(),
            column: column_name.to_string(),
        };
        model.pending.push(change.clone());
        Ok(change)
    }

    /// Removes a column from the model. The physical column stays until the
    /// next rebuild.
    pub fn delete_column(&mut self, table: &str, column_name: &str) -> Result<PendingChange> {
        let model = self.table_mut(table)?;
        let idx = model
            .columns
            .iter()
            .position(|c| c.name == column_name)
            .ok_or_else(|| MigrateError::column_not_found(table, column_name))?;
        model.columns.remove(idx);
        model.params.remove(column_name);

        let change = PendingChange::Deleted {
            table: table.to_string(),
            column: column_name.to_string(),
        };
        model.pending.push(change.clone());
        Ok(change)
    }

    /// Plans a rebuild of `table` into `columns` (or its current model
    /// columns) and applies it to the model.
    ///
    /// Each target column reads from its `fill_from` column, or from itself,
    /// wrapped in `COALESCE` when a fallback is set. Every source must exist
    /// in the physical table.
    pub fn rebuild_table(&mut self, table: &str, columns: Option<Vec<Column>>) -> Result<RebuildPlan> {
        let columns = match columns {
            Some(columns) => {
                let columns = columns
                    .into_iter()
                    .map(Column::prepare)
                    .collect::<Result<Vec<_>>>()?;
                validate_table(table, &columns)?;
                self.check_references(table, &columns)?;
                columns
            }
            None => self.table(table)?.columns.clone(),
        };

        let model = self.table_mut(table)?;

        let targets: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let mut sources = Vec::with_capacity(columns.len());
        for column in &columns {
            let params = model.params.get(&column.name);
            let source = params
                .and_then(|p| p.fill_from.clone())
                .unwrap_or_else(|| column.name.clone());
            let coalesce = params.and_then(|p| p.coalesce.clone());

            if !model.physical.iter().any(|c| *c == source) {
                return Err(MigrateError::MissingSourceColumn {
                    table: table.to_string(),
                    column: source,
                });
            }
            sources.push((source, coalesce));
        }

        model.columns = columns.clone();
        model.params.retain(|name, _| targets.contains(name));
        model.physical = targets.clone();
        let consumed = std::mem::take(&mut model.pending);

        Ok(RebuildPlan {
            table: table.to_string(),
            temp_table: format!("{table}{REBUILD_SUFFIX}"),
            columns,
            targets,
            sources,
            consumed,
        })
    }

    /// Removes a table from the model.
    pub fn remove_table(&mut self, table: &str) -> Result<TableModel> {
        let idx = self
            .tables
            .iter()
            .position(|t| t.name == table)
            .ok_or_else(|| MigrateError::TableNotFound(table.to_string()))?;
        Ok(self.tables.remove(idx))
    }
}
