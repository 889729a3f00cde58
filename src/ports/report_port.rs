//! Report output port trait.

use crate::domain::engine::AnalysisOutcome;
use crate::domain::error::FundError;
use std::path::Path;

/// Port for writing analysis results.
pub trait ReportPort {
    fn write(&self, outcome: &AnalysisOutcome, output_dir: &Path) -> Result<(), FundError>;
}
