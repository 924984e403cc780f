//! The revision log.
//!
//! Revisions are numbered densely from 0 in the order they are opened; the
//! index is the schema version a database claims to be at. Statements are
//! only ever appended to the most recently opened revision.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::GapPolicy;
use crate::error::{MigrateError, Result};
use crate::schema::SqlValue;

/// A SQL statement with its positional arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// SQL text.
    pub query: String,
    /// Positional arguments, bound to `?` placeholders in order.
    pub args: Vec<SqlValue>,
}

impl Statement {
    /// Creates a statement without arguments.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            args: Vec::new(),
        }
    }

    /// Creates a statement with arguments.
    #[must_use]
    pub fn with_args(query: impl Into<String>, args: Vec<SqlValue>) -> Self {
        Self {
            query: query.into(),
            args,
        }
    }
}

/// One atomic unit of schema change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    /// Position in the log.
    pub index: usize,
    /// Statements in execution order.
    pub statements: Vec<Statement>,
}

/// Ordered, append-only log of revisions.
///
/// An index can be reserved without an entry (see
/// [`RevisionLog::skip`]); such gaps are resolved by a [`GapPolicy`] when
/// replaying.
#[derive(Debug, Default)]
pub struct RevisionLog {
    revisions: BTreeMap<usize, Revision>,
    next_index: usize,
    current: Option<usize>,
}

impl RevisionLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of revision indices handed out, including reserved ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.next_index
    }

    /// Returns true if no revision was ever opened or reserved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.next_index == 0
    }

    /// Index the next opened revision will get.
    #[must_use]
    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Gets a recorded revision.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Revision> {
        self.revisions.get(&index)
    }

    /// Iterates recorded revisions in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Revision> {
        self.revisions.values()
    }

    /// Opens a new revision holding `first` and makes it the append target.
    ///
    /// `first` is built from the index the revision will get, which
    /// [`RevisionLog::next_index`] returns beforehand.
    pub fn open(&mut self, first: Statement) -> usize {
        let index = self.next_index;
        self.revisions.insert(
            index,
            Revision {
                index,
                statements: vec![first],
            },
        );
        self.next_index += 1;
        self.current = Some(index);
        index
    }

    /// Reserves a revision index without recording anything under it.
    ///
    /// Nothing can be appended until the next [`RevisionLog::open`].
    pub fn skip(&mut self) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        self.current = None;
        index
    }

    /// Returns the index of the revision statements are appended to.
    pub fn current_index(&self) -> Result<usize> {
        self.current.ok_or(MigrateError::NoOpenRevision)
    }

    /// Appends a statement to the open revision.
    pub fn push(&mut self, statement: Statement) -> Result<usize> {
        let index = self.current_index()?;
        let revision = self
            .revisions
            .get_mut(&index)
            .ok_or(MigrateError::NoOpenRevision)?;
        revision.statements.push(statement);
        Ok(index)
    }

    /// Returns the statements of every revision after `latest`, in order.
    ///
    /// `latest` is the revision a database is already at (−1 for none);
    /// revisions at or below it are not looked at.
    pub fn statements_after(&self, latest: i64, policy: GapPolicy) -> Result<Vec<Statement>> {
        let start = usize::try_from(latest.saturating_add(1)).unwrap_or(0);
        let mut statements = Vec::new();

        for index in start..self.next_index {
            match (self.revisions.get(&index), policy) {
                (Some(revision), _) => statements.extend(revision.statements.iter().cloned()),
                (None, GapPolicy::Skip) => {
                    warn!(revision = index, "Revision missing from log, skipping");
                }
                (None, GapPolicy::Fail) => return Err(MigrateError::RevisionGap(index)),
            }
        }

        Ok(statements)
    }

    /// Drops every revision.
    pub fn clear(&mut self) {
        self.revisions.clear();
        self.next_index = 0;
        self.current = None;
    }
}
