//! Flat tabular form shared by every exported result.

use chrono::NaiveDate;
use serde::Serialize;

use super::calendar::format_date;

/// Index label column plus named `f64` columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub index_name: String,
    pub index: Vec<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl Table {
    pub fn new(index_name: &str, columns: Vec<String>) -> Self {
        Self {
            index_name: index_name.to_string(),
            index: Vec::new(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn from_dated_rows(
        index_name: &str,
        dates: &[NaiveDate],
        columns: Vec<String>,
        rows: &[Vec<f64>],
    ) -> Self {
        Self {
            index_name: index_name.to_string(),
            index: dates.iter().map(|d| format_date(*d)).collect(),
            columns,
            rows: rows.to_vec(),
        }
    }

    pub fn push_row(&mut self, label: impl Into<String>, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.columns.len());
        self.index.push(label.into());
        self.rows.push(values);
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, row: &str, column: &str) -> Option<f64> {
        let r = self.index.iter().position(|l| l == row)?;
        let c = self.columns.iter().position(|l| l == column)?;
        Some(self.rows[r][c])
    }

    /// Header followed by one string record per row; `NaN` renders empty.
    pub fn records(&self) -> Vec<Vec<String>> {
        let mut out = Vec::with_capacity(self.rows.len() + 1);
        let mut header = vec![self.index_name.clone()];
        header.extend(self.columns.iter().cloned());
        out.push(header);
        for (label, row) in self.index.iter().zip(&self.rows) {
            let mut record = vec![label.clone()];
            record.extend(row.iter().map(|v| format_value(*v)));
            out.push(record);
        }
        out
    }
}

fn format_value(v: f64) -> String {
    if v.is_nan() { String::new() } else { v.to_string() }
}
