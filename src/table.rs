//! Ordered-column row collection used throughout the pipeline.
//!
//! Rows are insertion-ordered JSON object maps so arbitrary passthrough
//! attributes survive every stage unchanged. Column selection and renaming
//! are two explicit operations chosen by the caller.

use anyhow::{Result, anyhow};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// A single record: column name to value, insertion-ordered.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Table {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Registers a column name if it is not already present.
    pub fn ensure_column(&mut self, name: &str) {
        if !self.has_column(name) {
            self.columns.push(name.to_string());
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Returns a new table holding only `columns`, in the given order.
    ///
    /// Errors if any requested column is unknown to this table. A row that
    /// lacks a value for a selected column yields null there.
    pub fn select(&self, columns: &[&str]) -> Result<Table> {
        let mapping: Vec<(&str, &str)> = columns.iter().map(|c| (*c, *c)).collect();
        self.select_rename(&mapping)
    }

    /// Select-and-rename: `mapping` is an ordered list of
    /// (destination name, source name) pairs. The destinations define both
    /// the retained column set and the final names.
    pub fn select_rename(&self, mapping: &[(&str, &str)]) -> Result<Table> {
        for (_, source) in mapping {
            if !self.has_column(source) {
                return Err(anyhow!(
                    "column '{}' not found in table (available: {})",
                    source,
                    self.columns.join(", ")
                ));
            }
        }
        let mut out = Table::new(mapping.iter().map(|(dest, _)| *dest));
        for row in &self.rows {
            let mut selected = Row::new();
            for (dest, source) in mapping {
                let value = row.get(*source).cloned().unwrap_or(Value::Null);
                selected.insert((*dest).to_string(), value);
            }
            out.push(selected);
        }
        Ok(out)
    }

    /// Keeps only rows whose `column` string-equals `value`.
    pub fn filter_eq(&self, column: &str, value: &str) -> Table {
        let mut out = Table::new(self.columns.clone());
        for row in &self.rows {
            if row.get(column).and_then(Value::as_str) == Some(value) {
                out.push(row.clone());
            }
        }
        out
    }

    /// Drops duplicate rows, keeping the first occurrence.
    pub fn dedup(&mut self) {
        let mut seen = HashSet::new();
        self.rows
            .retain(|row| seen.insert(serde_json::to_string(row).unwrap_or_default()));
    }

    /// Drops rows with a missing or null value in any known column.
    pub fn drop_nulls(&mut self) {
        let columns = self.columns.clone();
        self.rows
            .retain(|row| columns.iter().all(|c| row.get(c).is_some_and(|v| !v.is_null())));
    }
}

/// Reads a finite f64 out of a row value, accepting numbers and numeric
/// strings (raw TSV fields arrive as strings).
pub fn f64_value(row: &Row, column: &str) -> Option<f64> {
    let value = row.get(column)?;
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}
