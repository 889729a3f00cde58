//! Report adapter writing one CSV per table plus a `summary.json`.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::domain::engine::AnalysisOutcome;
use crate::domain::error::FundError;
use crate::domain::table::Table;
use crate::ports::report_port::ReportPort;

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    fn write_table(table: &Table, path: &Path) -> Result<(), FundError> {
        let mut wtr = csv::Writer::from_path(path).map_err(|e| FundError::Report {
            reason: format!("failed to create {}: {}", path.display(), e),
        })?;
        for record in table.records() {
            wtr.write_record(&record).map_err(|e| FundError::Report {
                reason: format!("failed to write {}: {}", path.display(), e),
            })?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, outcome: &AnalysisOutcome, output_dir: &Path) -> Result<(), FundError> {
        fs::create_dir_all(output_dir)?;

        let tables = outcome.report.tables();
        for (name, table) in &tables {
            Self::write_table(table, &output_dir.join(format!("{name}.csv")))?;
        }

        let summary = serde_json::to_string_pretty(&outcome.summary()).map_err(|e| {
            FundError::Report {
                reason: format!("failed to serialize summary: {e}"),
            }
        })?;
        fs::write(output_dir.join("summary.json"), summary)?;

        info!(
            tables = tables.len(),
            dir = %output_dir.display(),
            "report written"
        );
        Ok(())
    }
}
