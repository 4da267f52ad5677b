//! Row-oriented tables and the keyed merge used to join feature sets back onto
//! their source rows.
//!
//! Columns are an ordered list that may contain the same name twice: a merge
//! never renames or drops a clashing column, so shadowing stays visible to
//! `check_merge`.

use crate::error::MergeInvariantViolation;
use ahash::{AHashMap, AHashSet};
use anyhow::{bail, Result};
use serde_json::{Map, Value};

/// Feature name -> scalar or list value, in emission order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureRecord {
    fields: Vec<(String, Value)>,
}

impl FeatureRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.push((name.into(), value.into()));
    }

    pub fn extend(&mut self, other: FeatureRecord) {
        self.fields.extend(other.fields);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// String form of a join key. Nulls never match anything.
pub fn key_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    /// Build a table from records; columns are the union of record fields in first-seen
    /// order and absent fields become `null`. A name repeated inside one record gets one
    /// column per occurrence, so the clash shows up in `duplicate_column`.
    pub fn from_records<I: IntoIterator<Item = FeatureRecord>>(records: I) -> Self {
        let mut columns: Vec<String> = Vec::new();
        // (name, nth occurrence within a record) -> column
        let mut pos: AHashMap<(String, usize), usize> = AHashMap::new();
        let mut staged = Vec::new();
        for rec in records {
            {
                let mut seen: AHashMap<&str, usize> = AHashMap::new();
                for name in rec.names() {
                    let nth = seen.entry(name).or_insert(0);
                    let key = (name.to_string(), *nth);
                    *nth += 1;
                    if !pos.contains_key(&key) {
                        pos.insert(key, columns.len());
                        columns.push(name.to_string());
                    }
                }
            }
            staged.push(rec);
        }
        let rows = staged
            .into_iter()
            .map(|rec| {
                let mut row = vec![Value::Null; columns.len()];
                let mut seen: AHashMap<String, usize> = AHashMap::new();
                for (k, v) in rec.fields {
                    let nth = seen.entry(k.clone()).or_insert(0);
                    let key = (k, *nth);
                    *nth += 1;
                    if let Some(&c) = pos.get(&key) {
                        row[c] = v;
                    }
                }
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            bail!("row has {} values, table has {} columns", row.len(), self.columns.len());
        }
        self.rows.push(row);
        Ok(())
    }

    /// Append `name` as an all-null column when absent, so keyed operations work on
    /// tables built from zero records.
    pub fn ensure_column(&mut self, name: &str) {
        if self.column_index(name).is_none() {
            self.columns.push(name.to_string());
            for row in &mut self.rows {
                row.push(Value::Null);
            }
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let c = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[c])
    }

    pub fn column_values<'a>(&'a self, column: &str) -> Result<impl Iterator<Item = &'a Value> + 'a> {
        let c = self.require_column(column)?;
        Ok(self.rows.iter().map(move |r| &r[c]))
    }

    fn require_column(&self, column: &str) -> Result<usize> {
        match self.column_index(column) {
            Some(c) => Ok(c),
            None => bail!("table has no column `{column}` (columns: {})", self.columns.join(", ")),
        }
    }

    /// Keep rows whose `column` value satisfies `keep`. Returns the number removed.
    pub fn retain_by(&mut self, column: &str, mut keep: impl FnMut(&Value) -> bool) -> Result<usize> {
        let c = self.require_column(column)?;
        let before = self.rows.len();
        self.rows.retain(|r| keep(&r[c]));
        Ok(before - self.rows.len())
    }

    /// Rewrite every value of `column` in place; no-op when the column is absent.
    pub fn map_column(&mut self, column: &str, mut f: impl FnMut(&Value) -> Option<Value>) {
        if let Some(c) = self.column_index(column) {
            for row in &mut self.rows {
                if let Some(v) = f(&row[c]) {
                    row[c] = v;
                }
            }
        }
    }

    /// Drop later rows repeating an earlier `column` value. Returns the number removed.
    pub fn dedup_by(&mut self, column: &str) -> Result<usize> {
        let c = self.require_column(column)?;
        let mut seen: AHashSet<Option<String>> = AHashSet::new();
        let before = self.rows.len();
        self.rows.retain(|r| seen.insert(key_string(&r[c])));
        Ok(before - self.rows.len())
    }

    /// Inner join on `key`: every left row is paired with each right row carrying the same
    /// key value, right-hand columns (except `key`) appended. A right row matching several
    /// left rows is reused; several right rows matching one left row fan the row out.
    pub fn merge(&self, right: &Table, key: &str) -> Result<Table> {
        let lk = self.require_column(key)?;
        let rk = right.require_column(key)?;

        let mut index: AHashMap<String, Vec<usize>> = AHashMap::with_capacity(right.rows.len());
        for (i, row) in right.rows.iter().enumerate() {
            if let Some(k) = key_string(&row[rk]) {
                index.entry(k).or_default().push(i);
            }
        }

        let mut columns = self.columns.clone();
        columns.extend(right.columns.iter().enumerate().filter(|(i, _)| *i != rk).map(|(_, c)| c.clone()));

        let mut rows = Vec::with_capacity(self.rows.len());
        for left in &self.rows {
            let Some(k) = key_string(&left[lk]) else { continue };
            let Some(matches) = index.get(&k) else { continue };
            for &ri in matches {
                let mut row = left.clone();
                row.extend(right.rows[ri].iter().enumerate().filter(|(i, _)| *i != rk).map(|(_, v)| v.clone()));
                rows.push(row);
            }
        }
        Ok(Table { columns, rows })
    }

    /// First column name that occurs more than once.
    pub fn duplicate_column(&self) -> Option<&str> {
        let mut seen = AHashSet::new();
        self.columns.iter().find(|c| !seen.insert(c.as_str())).map(String::as_str)
    }

    /// Fail when two rows share a `column` value.
    pub fn ensure_unique_key(&self, stage: &'static str, column: &str) -> Result<()> {
        let c = self.require_column(column)?;
        let mut counts: AHashMap<String, usize> = AHashMap::new();
        for row in &self.rows {
            if let Some(k) = key_string(&row[c]) {
                *counts.entry(k).or_insert(0) += 1;
            }
        }
        if let Some((key, matches)) = counts.into_iter().filter(|(_, n)| *n > 1).max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0))) {
            return Err(MergeInvariantViolation::DuplicateKey { stage, key, matches }.into());
        }
        Ok(())
    }

    /// Rows as JSON objects, for persistence. Only meaningful when column names are unique.
    pub fn to_objects(&self) -> impl Iterator<Item = Map<String, Value>> + '_ {
        self.rows.iter().map(move |row| {
            self.columns.iter().cloned().zip(row.iter().cloned()).collect()
        })
    }
}

/// The invariants every merge must keep: same row count as the left-hand table, and no
/// column name appearing twice.
pub fn check_merge(stage: &'static str, pre: &Table, post: &Table) -> Result<(), MergeInvariantViolation> {
    if pre.len() != post.len() {
        return Err(MergeInvariantViolation::RowCount { stage, before: pre.len(), after: post.len() });
    }
    if let Some(column) = post.duplicate_column() {
        return Err(MergeInvariantViolation::DuplicateColumn { stage, column: column.to_string(), rows: post.len() });
    }
    Ok(())
}
