//! Catalog persistence as `symbol,name,category` CSV.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::error::BacktestError;
use crate::domain::instrument::{Catalog, Category, Instrument};

#[derive(Debug, Serialize, Deserialize)]
struct CatalogRecord {
    symbol: String,
    name: String,
    category: String,
}

fn parse_error(path: &Path, reason: impl Into<String>) -> BacktestError {
    BacktestError::ConfigParse {
        file: path.display().to_string(),
        reason: reason.into(),
    }
}

/// Read catalog entries. Categories may be given as codes or labels.
pub fn load_entries(path: &Path) -> Result<Vec<Instrument>, BacktestError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| parse_error(path, e.to_string()))?;
    let mut entries = Vec::new();
    for (row, record) in reader.deserialize::<CatalogRecord>().enumerate() {
        let record = record.map_err(|e| parse_error(path, e.to_string()))?;
        let category: Category = record
            .category
            .parse()
            .map_err(|e| parse_error(path, format!("line {}: {}", row + 2, e)))?;
        if record.symbol.trim().is_empty() {
            return Err(parse_error(path, format!("line {}: empty symbol", row + 2)));
        }
        entries.push(Instrument::new(&record.symbol, record.name.trim(), category));
    }
    Ok(entries)
}

pub fn load_catalog(path: &Path) -> Result<Catalog, BacktestError> {
    let mut catalog = Catalog::new();
    catalog.populate(load_entries(path)?, false);
    Ok(catalog)
}

/// Write the catalog sorted by symbol, categories as short codes.
pub fn save_catalog(catalog: &Catalog, path: &Path) -> Result<(), BacktestError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| parse_error(path, e.to_string()))?;
    for instrument in catalog.iter() {
        writer
            .serialize(CatalogRecord {
                symbol: instrument.symbol.clone(),
                name: instrument.name.clone(),
                category: instrument.category.code().to_string(),
            })
            .map_err(|e| parse_error(path, e.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}
