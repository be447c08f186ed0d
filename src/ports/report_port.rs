//! Report generation port trait.

use std::path::Path;

use crate::domain::backtest::BacktestReport;
use crate::domain::error::BacktestError;

/// Port for writing a finished backtest to a file.
pub trait ReportPort {
    fn write(&self, report: &BacktestReport, output_path: &Path) -> Result<(), BacktestError>;
}
