//! DDL rendering.
//!
//! A dialect turns column and table descriptions into SQL text. Rendering is
//! pure: nothing here touches the schema model or the revision log.

mod sqlite;

pub use sqlite::SqliteDialect;

use crate::schema::{Column, ColumnType, SqlValue};

/// Trait for database-specific DDL generation.
pub trait MigrationDialect {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns the SQL type keyword for the given type.
    fn type_name(&self, column_type: ColumnType) -> &'static str {
        column_type.keyword()
    }

    /// Returns the auto-increment keyword for this dialect.
    fn auto_increment_keyword(&self) -> &'static str;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Renders a literal value.
    fn literal(&self, value: &SqlValue) -> String {
        value.to_sql()
    }

    /// Generates a column definition.
    ///
    /// Only the auto-increment key declares `PRIMARY KEY` inline; other key
    /// columns are collected into the table's `PRIMARY KEY(...)` clause.
    fn column_definition(&self, column: &Column) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.type_name(column.column_type).to_string(),
        ];

        if column.is_inline_key() {
            parts.push("PRIMARY KEY".to_string());
        }
        if column.auto_increment {
            parts.push(self.auto_increment_keyword().to_string());
        }
        if column.not_null {
            parts.push("NOT NULL".to_string());
        }
        if let Some(ref default) = column.default {
            parts.push(format!("DEFAULT {}", self.literal(default)));
        }

        parts.join(" ")
    }

    /// Generates the trailing table constraints: composite primary key,
    /// composite unique and foreign keys, in that order.
    fn table_constraints(&self, columns: &[Column]) -> Vec<String> {
        let mut constraints = Vec::new();

        let primary_keys: Vec<String> = columns
            .iter()
            .filter(|c| c.primary_key && !c.is_inline_key())
            .map(|c| self.quote_identifier(&c.name))
            .collect();
        if !primary_keys.is_empty() {
            constraints.push(format!("PRIMARY KEY({})", primary_keys.join(", ")));
        }

        let uniques: Vec<String> = columns
            .iter()
            .filter(|c| c.unique)
            .map(|c| self.quote_identifier(&c.name))
            .collect();
        if !uniques.is_empty() {
            constraints.push(format!("UNIQUE({})", uniques.join(", ")));
        }

        for column in columns {
            if let Some(ref table) = column.references {
                constraints.push(format!(
                    "FOREIGN KEY ({}) REFERENCES {}({})",
                    self.quote_identifier(&column.name),
                    self.quote_identifier(table),
                    self.quote_identifier("id")
                ));
            }
        }

        constraints
    }

    /// Generates SQL for creating a table.
    fn create_table(&self, name: &str, columns: &[Column]) -> String {
        let mut defs: Vec<String> = columns.iter().map(|c| self.column_definition(c)).collect();
        defs.extend(self.table_constraints(columns));

        format!(
            "CREATE TABLE {} ({});",
            self.quote_identifier(name),
            defs.join(", ")
        )
    }

    /// Generates SQL for dropping a table.
    fn drop_table(&self, name: &str) -> String {
        format!("DROP TABLE {};", self.quote_identifier(name))
    }

    /// Generates SQL for renaming a table.
    fn rename_table(&self, old_name: &str, new_name: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {};",
            self.quote_identifier(old_name),
            self.quote_identifier(new_name)
        )
    }

    /// Generates SQL for adding a column.
    ///
    /// A foreign key is declared inline, since `ADD COLUMN` takes no table
    /// constraints.
    fn add_column(&self, table: &str, column: &Column) -> String {
        let mut definition = self.column_definition(column);
        if let Some(ref target) = column.references {
            definition.push_str(&format!(
                " REFERENCES {}({})",
                self.quote_identifier(target),
                self.quote_identifier("id")
            ));
        }

        format!(
            "ALTER TABLE {} ADD COLUMN {};",
            self.quote_identifier(table),
            definition
        )
    }

    /// Generates SQL for renaming a column.
    fn rename_column(&self, table: &str, old_name: &str, new_name: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {};",
            self.quote_identifier(table),
            self.quote_identifier(old_name),
            self.quote_identifier(new_name)
        )
    }

    /// Generates the source expression for one rebuilt column.
    ///
    /// `source` is the column read from the old table.
    fn copy_source(&self, source: &str, coalesce: Option<&SqlValue>) -> String {
        match coalesce {
            Some(value) => format!(
                "COALESCE({}, {})",
                self.quote_identifier(source),
                self.literal(value)
            ),
            None => self.quote_identifier(source),
        }
    }

    /// Generates `INSERT INTO <to> (<targets>) SELECT <sources> FROM <from>`.
    fn copy_rows(&self, from: &str, to: &str, targets: &[String], sources: &[String]) -> String {
        let targets: Vec<String> = targets.iter().map(|t| self.quote_identifier(t)).collect();
        format!(
            "INSERT INTO {} ({}) SELECT {} FROM {};",
            self.quote_identifier(to),
            targets.join(", "),
            sources.join(", "),
            self.quote_identifier(from)
        )
    }
}
