use crate::error::{PlanError, Result};
use crate::history::HistoricalSeries;
use crate::schema::{ActualRecord, HistoricalRecord};
use crate::utils::parse_decimal_comma;
use chrono::NaiveDate;
use log::{debug, info};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Records accepted from an import plus the number of malformed rows that
/// were skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport<T> {
    pub records: Vec<T>,
    pub skipped: usize,
}

impl ImportReport<HistoricalRecord> {
    pub fn into_series(self) -> HistoricalSeries {
        HistoricalSeries::new(self.records)
    }
}

const HISTORICAL_REQUIRED: [&str; 4] = ["ano", "mes", "loja", "venda_total"];
const ACTUALS_REQUIRED: [&str; 3] = ["data", "loja", "venda_total"];

/// Columns: `ano, mes, loja, cidade, estado, venda_total`.
pub fn import_historical_str(text: &str) -> Result<ImportReport<HistoricalRecord>> {
    let (mut reader, columns) = open(text, &HISTORICAL_REQUIRED)?;
    let mut report = ImportReport {
        records: Vec::new(),
        skipped: 0,
    };

    for (line, row) in reader.records().enumerate() {
        let parsed = row.ok().and_then(|row| {
            Some(HistoricalRecord {
                year: field(&row, columns.get("ano"))?.parse::<i32>().ok()?,
                month: field(&row, columns.get("mes"))?
                    .parse::<u32>()
                    .ok()
                    .filter(|m| (1..=12).contains(m))?,
                store: field(&row, columns.get("loja"))?.to_string(),
                city: field(&row, columns.get("cidade")).map(str::to_string),
                state: field(&row, columns.get("estado")).map(str::to_string),
                amount: parse_decimal_comma(field(&row, columns.get("venda_total"))?)?,
            })
        });

        match parsed {
            Some(record) => report.records.push(record),
            None => {
                debug!("Skipping malformed historical row {}", line + 2);
                report.skipped += 1;
            }
        }
    }

    info!(
        "Imported {} historical records ({} skipped)",
        report.records.len(),
        report.skipped
    );
    Ok(report)
}

/// Columns: `data` (ISO date), `loja, cidade, estado, venda_total`.
pub fn import_actuals_str(text: &str) -> Result<ImportReport<ActualRecord>> {
    let (mut reader, columns) = open(text, &ACTUALS_REQUIRED)?;
    let mut report = ImportReport {
        records: Vec::new(),
        skipped: 0,
    };

    for (line, row) in reader.records().enumerate() {
        let parsed = row.ok().and_then(|row| {
            Some(ActualRecord {
                date: NaiveDate::parse_from_str(field(&row, columns.get("data"))?, "%Y-%m-%d")
                    .ok()?,
                store: field(&row, columns.get("loja"))?.to_string(),
                city: field(&row, columns.get("cidade")).map(str::to_string),
                state: field(&row, columns.get("estado")).map(str::to_string),
                amount: parse_decimal_comma(field(&row, columns.get("venda_total"))?)?,
            })
        });

        match parsed {
            Some(record) => report.records.push(record),
            None => {
                debug!("Skipping malformed actuals row {}", line + 2);
                report.skipped += 1;
            }
        }
    }

    info!(
        "Imported {} actual sales records ({} skipped)",
        report.records.len(),
        report.skipped
    );
    Ok(report)
}

pub fn import_historical<R: Read>(mut reader: R) -> Result<ImportReport<HistoricalRecord>> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    import_historical_str(&text)
}

pub fn import_actuals<R: Read>(mut reader: R) -> Result<ImportReport<ActualRecord>> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    import_actuals_str(&text)
}

pub fn import_historical_file(path: impl AsRef<Path>) -> Result<ImportReport<HistoricalRecord>> {
    import_historical_str(&fs::read_to_string(path)?)
}

pub fn import_actuals_file(path: impl AsRef<Path>) -> Result<ImportReport<ActualRecord>> {
    import_actuals_str(&fs::read_to_string(path)?)
}

struct Columns {
    names: Vec<String>,
}

impl Columns {
    fn get(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// Builds a reader over `text`, choosing `;` as delimiter when the header
/// uses it, and checks the required columns are present.
fn open<'t>(text: &'t str, required: &[&str]) -> Result<(csv::Reader<&'t [u8]>, Columns)> {
    let text = text.trim_start_matches('\u{feff}');
    let header_line = text.lines().next().unwrap_or("");
    let delimiter = if header_line.contains(';') { b';' } else { b',' };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let names: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    let columns = Columns { names };

    for name in required {
        if columns.get(name).is_none() {
            return Err(PlanError::MissingColumn(name.to_string()));
        }
    }

    Ok((reader, columns))
}

fn field(row: &csv::StringRecord, index: Option<usize>) -> Option<&str> {
    row.get(index?).map(str::trim).filter(|v| !v.is_empty())
}
