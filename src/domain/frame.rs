//! Date-indexed matrices and vectors.
//!
//! A [`Frame`] is row-major: one row per calendar date, one column per
//! ticker. Missing observations are `NaN`.

use chrono::NaiveDate;
use std::ops::Range;

use super::table::Table;

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl Frame {
    pub fn filled(dates: Vec<NaiveDate>, columns: Vec<String>, value: f64) -> Self {
        let values = vec![vec![value; columns.len()]; dates.len()];
        Self {
            dates,
            columns,
            values,
        }
    }

    /// Builds a frame from rows; every row must have one value per column.
    pub fn from_rows(dates: Vec<NaiveDate>, columns: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        debug_assert_eq!(dates.len(), rows.len());
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self {
            dates,
            columns,
            values: rows,
        }
    }

    pub fn nrows(&self) -> usize {
        self.dates.len()
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row][col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.values[row][col] = value;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row]
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.values
    }

    pub fn last_row(&self) -> Option<&[f64]> {
        self.values.last().map(|r| r.as_slice())
    }

    pub fn column(&self, col: usize) -> Vec<f64> {
        self.values.iter().map(|r| r[col]).collect()
    }

    pub fn column_by_name(&self, name: &str) -> Option<Vec<f64>> {
        self.column_index(name).map(|c| self.column(c))
    }

    /// Projects onto `names`; a name the frame does not carry becomes a
    /// `NaN` column.
    pub fn select_columns(&self, names: &[String]) -> Frame {
        let idx: Vec<Option<usize>> = names.iter().map(|n| self.column_index(n)).collect();
        let rows = self
            .values
            .iter()
            .map(|r| {
                idx.iter()
                    .map(|i| i.map(|c| r[c]).unwrap_or(f64::NAN))
                    .collect()
            })
            .collect();
        Frame::from_rows(self.dates.clone(), names.to_vec(), rows)
    }

    pub fn slice_rows(&self, range: Range<usize>) -> Frame {
        Frame::from_rows(
            self.dates[range.clone()].to_vec(),
            self.columns.clone(),
            self.values[range].to_vec(),
        )
    }

    /// Column-wise running total.
    pub fn cumsum(&self) -> Frame {
        let mut acc = vec![0.0; self.ncols()];
        let rows = self
            .values
            .iter()
            .map(|r| {
                for (a, v) in acc.iter_mut().zip(r) {
                    *a += v;
                }
                acc.clone()
            })
            .collect();
        Frame::from_rows(self.dates.clone(), self.columns.clone(), rows)
    }

    /// Row sums skipping `NaN` entries.
    pub fn row_sums(&self) -> Vec<f64> {
        self.values
            .iter()
            .map(|r| r.iter().filter(|v| !v.is_nan()).sum())
            .collect()
    }

    pub fn to_table(&self, index_name: &str) -> Table {
        Table::from_dated_rows(index_name, &self.dates, self.columns.clone(), &self.values)
    }
}

/// One value per calendar date.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Self {
        debug_assert_eq!(dates.len(), values.len());
        Self { dates, values }
    }

    pub fn zeros(dates: Vec<NaiveDate>) -> Self {
        let values = vec![0.0; dates.len()];
        Self { dates, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first(&self) -> Option<f64> {
        self.values.first().copied()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn cumsum(&self) -> TimeSeries {
        let mut acc = 0.0;
        let values = self
            .values
            .iter()
            .map(|v| {
                acc += v;
                acc
            })
            .collect();
        TimeSeries::new(self.dates.clone(), values)
    }

    pub fn slice(&self, range: Range<usize>) -> TimeSeries {
        TimeSeries::new(
            self.dates[range.clone()].to_vec(),
            self.values[range].to_vec(),
        )
    }

    pub fn to_table(&self, index_name: &str, column: &str) -> Table {
        let rows: Vec<Vec<f64>> = self.values.iter().map(|v| vec![*v]).collect();
        Table::from_dated_rows(index_name, &self.dates, vec![column.to_string()], &rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect()
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cumsum_runs_per_column() {
        let f = Frame::from_rows(
            dates(3),
            cols(&["A", "B"]),
            vec![vec![1.0, 10.0], vec![2.0, 0.0], vec![-1.0, 5.0]],
        );
        let c = f.cumsum();
        assert_eq!(c.column(0), vec![1.0, 3.0, 2.0]);
        assert_eq!(c.column(1), vec![10.0, 10.0, 15.0]);
    }

    #[test]
    fn row_sums_skip_nan() {
        let f = Frame::from_rows(
            dates(2),
            cols(&["A", "B"]),
            vec![vec![1.0, f64::NAN], vec![2.0, 3.0]],
        );
        assert_eq!(f.row_sums(), vec![1.0, 5.0]);
    }

    #[test]
    fn select_columns_fills_unknown_with_nan() {
        let f = Frame::from_rows(dates(1), cols(&["A", "B"]), vec![vec![1.0, 2.0]]);
        let s = f.select_columns(&cols(&["B", "Z"]));
        assert_eq!(s.get(0, 0), 2.0);
        assert!(s.get(0, 1).is_nan());
    }

    #[test]
    fn slice_rows_keeps_columns() {
        let f = Frame::filled(dates(5), cols(&["A"]), 1.0);
        let s = f.slice_rows(1..3);
        assert_eq!(s.nrows(), 2);
        assert_eq!(s.dates[0], f.dates[1]);
    }

    #[test]
    fn series_cumsum() {
        let s = TimeSeries::new(dates(3), vec![1.0, 2.0, 3.0]);
        assert_eq!(s.cumsum().values, vec![1.0, 3.0, 6.0]);
    }
}
