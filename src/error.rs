//! Error taxonomy for the feature engine.
//!
//! Only `MergeInvariantViolation` is fatal. The other kinds are reported and the
//! run carries on without the affected rows.

use thiserror::Error;

/// A merge broke one of its invariants. Aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeInvariantViolation {
    #[error("merge invariant violated at {stage}: {before} rows before merge, {after} rows after")]
    RowCount { stage: &'static str, before: usize, after: usize },

    #[error("merge invariant violated at {stage}: column `{column}` appears more than once ({rows} rows)")]
    DuplicateColumn { stage: &'static str, column: String, rows: usize },

    #[error("merge invariant violated at {stage}: key `{key}` matches {matches} rows on the right-hand side")]
    DuplicateKey { stage: &'static str, key: String, matches: usize },
}

/// Feature computation failed for one row. The row is dropped from that feature set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("feature computation failed for {key}: {reason}")]
pub struct RowFailure {
    pub key: String,
    pub reason: String,
}

impl RowFailure {
    pub fn new(key: impl Into<String>, err: &anyhow::Error) -> Self {
        Self { key: key.into(), reason: format!("{err:#}") }
    }
}

/// Malformed parent links found while indexing a post's comments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralAnomaly {
    #[error("comment {comment_id} points at unknown parent {parent_id}")]
    DanglingParent { comment_id: String, parent_id: String },

    #[error("comment {comment_id} sits on a cyclic parent chain")]
    Cycle { comment_id: String },

    #[error("comment id {comment_id} appears more than once; later copies are ignored")]
    DuplicateId { comment_id: String },
}

/// Authors that reply in the thread but have no user record (deleted or suspended accounts).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingUsers {
    /// Distinct author values; `None` stands for an author-deleted reply.
    pub authors: Vec<Option<String>>,
    /// Reply rows dropped because of them.
    pub rows_excluded: usize,
}

impl MissingUsers {
    pub fn count(&self) -> usize {
        self.authors.len()
    }
}
