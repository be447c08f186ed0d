//! CSV trade report adapter.

use std::fs::File;
use std::path::Path;

use log::info;

use crate::domain::backtest::BacktestReport;
use crate::domain::error::BacktestError;
use crate::domain::trade_report::EXPORT_HEADERS;
use crate::ports::report_port::ReportPort;

/// Writes one row per processed trade. The header row is always written,
/// so a run without trades still produces a valid table.
#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    fn csv_error(output_path: &Path, e: csv::Error) -> BacktestError {
        match e.into_kind() {
            csv::ErrorKind::Io(io) => BacktestError::Io(io),
            other => BacktestError::Io(std::io::Error::other(format!(
                "failed to write {}: {:?}",
                output_path.display(),
                other
            ))),
        }
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, report: &BacktestReport, output_path: &Path) -> Result<(), BacktestError> {
        let file = File::create(output_path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        writer
            .write_record(EXPORT_HEADERS)
            .map_err(|e| Self::csv_error(output_path, e))?;
        let rows = report.export_rows();
        for row in &rows {
            writer
                .serialize(row)
                .map_err(|e| Self::csv_error(output_path, e))?;
        }
        writer.flush()?;

        info!("Wrote {} trades to {}", rows.len(), output_path.display());
        Ok(())
    }
}
