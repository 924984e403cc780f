//! Migration context configuration.

use serde::{Deserialize, Serialize};

/// Default name of the bookkeeping column holding the version tag.
pub const DEFAULT_VERSION_COLUMN: &str = "app_version";

/// Default version tag recorded when the caller supplies none.
pub const DEFAULT_APP_VERSION: &str = "0.0.0";

/// What to do with a revision index that has no recorded entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Treat the revision as empty and move on.
    #[default]
    Skip,
    /// Refuse to emit anything.
    Fail,
}

/// Settings fixed when a migration context is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Name of the bookkeeping column holding the version tag.
    pub version_column: String,
    /// Version tag recorded with every revision.
    pub app_version: String,
    /// Handling of gaps in the replay range.
    pub gap_policy: GapPolicy,
    /// Free-form SQL dialect tag.
    pub sql_dialect: Option<String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            version_column: DEFAULT_VERSION_COLUMN.to_string(),
            app_version: DEFAULT_APP_VERSION.to_string(),
            gap_policy: GapPolicy::default(),
            sql_dialect: None,
        }
    }
}

impl ContextConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bookkeeping version column name.
    #[must_use]
    pub fn version_column(mut self, name: impl Into<String>) -> Self {
        self.version_column = name.into();
        self
    }

    /// Sets the version tag recorded with every revision.
    #[must_use]
    pub fn app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = version.into();
        self
    }

    /// Sets the gap policy.
    #[must_use]
    pub fn gap_policy(mut self, policy: GapPolicy) -> Self {
        self.gap_policy = policy;
        self
    }

    /// Sets the dialect tag.
    #[must_use]
    pub fn sql_dialect(mut self, dialect: impl Into<String>) -> Self {
        self.sql_dialect = Some(dialect.into());
        self
    }
}
