//! Column and table representation types.
//!
//! These types describe the schema as declared by the caller. They are used by
//! the schema model to track the declared end-state of every table and by the
//! dialect to render DDL.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};
use crate::operations::PendingChange;

/// Storage classes a column can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColumnType {
    /// NULL storage class.
    Null,
    /// Signed integer.
    Integer,
    /// Floating point.
    Real,
    /// Text string.
    Text,
    /// Binary large object.
    Blob,
    /// Shorthand for an auto-incrementing integer primary key.
    ///
    /// Expanded to `INTEGER` + primary key + auto-increment before it reaches
    /// the model, so it never appears in rendered SQL.
    Id,
}

impl ColumnType {
    /// Returns the uppercase SQL keyword for this type.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Integer | Self::Id => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
        }
    }
}

impl FromStr for ColumnType {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NULL" => Ok(Self::Null),
            "INTEGER" => Ok(Self::Integer),
            "REAL" => Ok(Self::Real),
            "TEXT" => Ok(Self::Text),
            "BLOB" => Ok(Self::Blob),
            "ID" => Ok(Self::Id),
            _ => Err(MigrateError::UnknownColumnType(s.to_string())),
        }
    }
}

impl TryFrom<String> for ColumnType {
    type Error = MigrateError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ColumnType> for String {
    fn from(value: ColumnType) -> Self {
        match value {
            ColumnType::Id => "ID".to_string(),
            other => other.keyword().to_string(),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from(*self))
    }
}

/// A literal value: column default, coalesce fallback or statement argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// Integer literal.
    Integer(i64),
    /// Floating point literal.
    Real(f64),
    /// Text literal.
    Text(String),
    /// Binary literal.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Returns the SQL literal for this value.
    ///
    /// Text is single-quoted with embedded quotes doubled. NaN and infinities
    /// have no SQL literal and render as `NULL`; everything else is emitted
    /// as-is.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Real(f) if f.is_finite() => format!("{f:?}"),
            Self::Real(_) => "NULL".to_string(),
            Self::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Self::Blob(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
                format!("X'{hex}'")
            }
        }
    }

    /// Returns true for [`SqlValue::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns false for reals without a SQL literal (NaN, infinities).
    #[must_use]
    pub fn is_valid_literal(&self) -> bool {
        !matches!(self, Self::Real(f) if !f.is_finite())
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<usize> for SqlValue {
    fn from(value: usize) -> Self {
        Self::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Definition of a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Declared type.
    pub column_type: ColumnType,
    /// Whether this column is part of the primary key.
    pub primary_key: bool,
    /// Whether this column auto-increments.
    pub auto_increment: bool,
    /// Whether the column rejects NULL.
    pub not_null: bool,
    /// Whether this column is part of the table's UNIQUE clause.
    pub unique: bool,
    /// Default value, if any.
    pub default: Option<SqlValue>,
    /// Table whose `id` this column references.
    pub references: Option<String>,
}

impl Column {
    /// Creates a nullable column with no constraints.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            primary_key: false,
            auto_increment: false,
            not_null: false,
            unique: false,
            default: None,
            references: None,
        }
    }

    /// Creates an auto-incrementing integer primary key column.
    #[must_use]
    pub fn id(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Id)
    }

    /// Creates an integer column referencing `table`'s `id` column.
    #[must_use]
    pub fn foreign(name: impl Into<String>, table: impl Into<String>) -> Self {
        let mut column = Self::new(name, ColumnType::Integer);
        column.references = Some(table.into());
        column
    }

    /// Marks the column as part of the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks the column as auto-incrementing.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Adds the column to the table's UNIQUE clause.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(mut self, value: impl Into<SqlValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Returns true for the auto-incrementing key, which is declared inline
    /// rather than in the table's `PRIMARY KEY(...)` clause.
    #[must_use]
    pub fn is_inline_key(&self) -> bool {
        self.primary_key && self.auto_increment
    }

    /// Validates the descriptor and expands the `ID` shorthand.
    pub fn prepare(mut self) -> Result<Self> {
        if self.name.is_empty() {
            return Err(MigrateError::invalid_column("", "column name is empty"));
        }

        if self.default.as_ref().is_some_and(|d| !d.is_valid_literal()) {
            return Err(MigrateError::invalid_column(
                &self.name,
                "default must be a finite number",
            ));
        }

        if self.column_type == ColumnType::Id {
            if self.unique {
                return Err(MigrateError::invalid_column(
                    &self.name,
                    "an ID column is already a key and cannot be UNIQUE",
                ));
            }
            if self.default.is_some() {
                return Err(MigrateError::invalid_column(
                    &self.name,
                    "an ID column cannot have a default",
                ));
            }
            self.column_type = ColumnType::Integer;
            self.primary_key = true;
            self.auto_increment = true;
        }

        if self.auto_increment && !(self.primary_key && self.column_type == ColumnType::Integer) {
            return Err(MigrateError::invalid_column(
                &self.name,
                "AUTOINCREMENT requires an INTEGER primary key",
            ));
        }

        if self.column_type == ColumnType::Null && (self.primary_key || self.not_null) {
            return Err(MigrateError::invalid_column(
                &self.name,
                "a NULL column cannot be a primary key or NOT NULL",
            ));
        }

        if self.references.is_some() && self.column_type != ColumnType::Integer {
            return Err(MigrateError::invalid_column(
                &self.name,
                "foreign key columns must be INTEGER",
            ));
        }

        Ok(self)
    }
}

/// Table-level checks over an already prepared column set.
pub(crate) fn validate_table(table: &str, columns: &[Column]) -> Result<()> {
    for (i, column) in columns.iter().enumerate() {
        if columns[..i].iter().any(|c| c.name == column.name) {
            return Err(MigrateError::ColumnExists {
                table: table.to_string(),
                column: column.name.clone(),
            });
        }
    }

    let inline_keys = columns.iter().filter(|c| c.is_inline_key()).count();
    let clause_keys = columns
        .iter()
        .filter(|c| c.primary_key && !c.is_inline_key())
        .count();

    if inline_keys > 1 {
        return Err(MigrateError::invalid_table(
            table,
            "more than one auto-increment key",
        ));
    }
    if inline_keys == 1 && clause_keys > 0 {
        return Err(MigrateError::invalid_table(
            table,
            "an auto-increment key cannot be combined with other primary key columns",
        ));
    }

    Ok(())
}

/// Rebuild hints attached to a column.
///
/// Only consulted when the table is regenerated; never rendered into DDL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColumnParams {
    /// Column of the old table to copy values from.
    pub fill_from: Option<String>,
    /// Fallback literal used when the source value is NULL.
    pub coalesce: Option<SqlValue>,
}

impl ColumnParams {
    /// Creates empty params.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies values from another column during rebuilds.
    #[must_use]
    pub fn fill_from(mut self, column: impl Into<String>) -> Self {
        self.fill_from = Some(column.into());
        self
    }

    /// Substitutes `value` for NULL source values during rebuilds.
    #[must_use]
    pub fn coalesce(mut self, value: impl Into<SqlValue>) -> Self {
        self.coalesce = Some(value.into());
        self
    }

    /// Returns true if neither hint is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fill_from.is_none() && self.coalesce.is_none()
    }

    pub(crate) fn validate(&self, column: &str) -> Result<()> {
        match self.coalesce {
            Some(ref value) if !value.is_valid_literal() => Err(MigrateError::invalid_column(
                column,
                "coalesce value must be a finite number",
            )),
            _ => Ok(()),
        }
    }
}

/// Loosely typed column descriptor, as found in declarative migration files.
///
/// ```
/// use oxide_revisions::schema::ColumnDescriptor;
///
/// let descriptor = ColumnDescriptor {
///     column_type: Some("text".to_string()),
///     not_null: true,
///     ..Default::default()
/// };
/// let column = descriptor.into_column("name").unwrap();
/// assert!(column.not_null);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ColumnDescriptor {
    /// Type name: NULL, INTEGER, REAL, TEXT, BLOB, ID or FOREIGN.
    #[serde(rename = "type")]
    pub column_type: Option<String>,
    /// `id: true` shorthand for the ID type.
    pub id: bool,
    /// Primary key flag.
    pub primary_key: bool,
    /// Auto-increment flag.
    pub auto_increment: bool,
    /// NOT NULL flag.
    pub not_null: bool,
    /// UNIQUE flag.
    pub unique: bool,
    /// Default value.
    pub default: Option<SqlValue>,
    /// Referenced table for FOREIGN columns.
    pub table: Option<String>,
}

impl ColumnDescriptor {
    /// Converts the descriptor into a typed column named `name`.
    pub fn into_column(self, name: impl Into<String>) -> Result<Column> {
        let name = name.into();

        let mut column = if self.id {
            Column::id(name)
        } else {
            let type_name = self
                .column_type
                .ok_or_else(|| MigrateError::invalid_column(&name, "missing type"))?;

            if type_name.eq_ignore_ascii_case("FOREIGN") {
                let table = self.table.clone().ok_or_else(|| {
                    MigrateError::invalid_column(&name, "FOREIGN columns need a table")
                })?;
                Column::foreign(name, table)
            } else {
                if self.table.is_some() {
                    return Err(MigrateError::invalid_column(
                        &name,
                        "only FOREIGN columns may name a table",
                    ));
                }
                Column::new(name, type_name.parse()?)
            }
        };

        column.primary_key |= self.primary_key;
        column.auto_increment |= self.auto_increment;
        column.not_null = self.not_null;
        column.unique = self.unique;
        column.default = self.default;
        Ok(column)
    }
}

/// Model of one table as of the revision currently being built.
#[derive(Debug, Clone, PartialEq)]
pub struct TableModel {
    /// Table name.
    pub name: String,
    /// Declared columns, in declaration order.
    pub columns: Vec<Column>,
    /// Rebuild hints keyed by column name.
    pub params: BTreeMap<String, ColumnParams>,
    /// Columns the physical table has as of the last emitted DDL.
    pub(crate) physical: Vec<String>,
    /// Changes recorded but not yet applied by a rebuild.
    pub(crate) pending: Vec<PendingChange>,
}

impl TableModel {
    pub(crate) fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        let physical = columns.iter().map(|c| c.name.clone()).collect();
        Self {
            name: name.into(),
            columns,
            params: BTreeMap::new(),
            physical,
            pending: Vec::new(),
        }
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Gets a mutable column by name.
    #[must_use]
    pub fn get_column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Returns column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Returns the columns the physical table currently has.
    #[must_use]
    pub fn physical_columns(&self) -> &[String] {
        &self.physical
    }

    /// Returns the changes awaiting a rebuild.
    #[must_use]
    pub fn pending_changes(&self) -> &[PendingChange] {
        &self.pending
    }
}
