//! Well ingest and time-series preparation.
//!
//! Two input shapes are accepted:
//! - a JSON array of wells (`{id, name, data: [{date, oilRate, ...}]}`)
//! - a single-well CSV with one dated production record per row
//!
//! `prepare_series` then turns one well into the `(t, q)` points the fitter
//! consumes, plus the state (`start_t`, `start_cumulative`) the forecast
//! continues from. No fitting logic lives here.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;

use crate::domain::{FitConfig, ProductionRecord, Stream, TimeSeriesPoint, Well};
use crate::error::DeclineError;

/// A row-level error encountered during CSV ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// CSV ingest output: the well plus any rows that were skipped.
#[derive(Debug, Clone)]
pub struct IngestedWell {
    pub well: Well,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// One well's stream, windowed and converted to days since the first sample.
#[derive(Debug, Clone, PartialEq)]
pub struct WellSeries {
    pub points: Vec<TimeSeriesPoint>,
    /// Date of `t = 0`.
    pub first_date: Option<NaiveDate>,
    /// Time of the last observation; the forecast starts here.
    pub start_t: f64,
    /// Cumulative volume at `start_t`.
    pub start_cumulative: f64,
    /// True when `start_cumulative` came from integrating rates.
    pub cumulative_estimated: bool,
}

/// Load wells from a `.json` (array of wells) or `.csv` (single well) file.
pub fn load_wells(path: &Path) -> Result<Vec<Well>, DeclineError> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        let ingested = load_well_csv(path)?;
        for err in &ingested.row_errors {
            tracing::warn!(line = err.line, "{}", err.message);
        }
        Ok(vec![ingested.well])
    } else {
        load_wells_json(path)
    }
}

/// Load a JSON array of wells.
pub fn load_wells_json(path: &Path) -> Result<Vec<Well>, DeclineError> {
    let file = File::open(path)
        .map_err(|e| DeclineError::data_access(format!("failed to open '{}': {e}", path.display())))?;
    let wells: Vec<Well> = serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| DeclineError::data_access(format!("invalid wells JSON '{}': {e}", path.display())))?;
    tracing::debug!(wells = wells.len(), path = %path.display(), "loaded wells");
    Ok(wells)
}

/// Load a single-well production CSV.
///
/// The well id and name default to the file stem. Rows with an unparseable
/// date are skipped and reported; empty numeric cells are treated as missing.
pub fn load_well_csv(path: &Path) -> Result<IngestedWell, DeclineError> {
    let file = File::open(path)
        .map_err(|e| DeclineError::data_access(format!("failed to open CSV '{}': {e}", path.display())))?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("well")
        .to_string();
    read_well_csv(file, &stem)
}

/// Parse a single-well production CSV from any reader.
pub fn read_well_csv<R: std::io::Read>(reader: R, well_id: &str) -> Result<IngestedWell, DeclineError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| DeclineError::data_access(format!("failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    if !header_map.contains_key("date") {
        return Err(DeclineError::data_access("missing required column: `date`"));
    }
    if !["oil_rate", "gas_rate", "water_rate"]
        .iter()
        .any(|c| header_map.contains_key(*c))
    {
        return Err(DeclineError::data_access(
            "CSV needs at least one of `oil_rate`, `gas_rate`, `water_rate`",
        ));
    }

    let mut data = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_record(&record, &header_map) {
            Ok(rec) => data.push(rec),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    data.sort_by_key(|r| r.date);

    Ok(IngestedWell {
        well: Well {
            id: well_id.to_string(),
            name: well_id.to_string(),
            data,
        },
        row_errors,
        rows_read,
    })
}

/// Extract one stream of a well as fit-ready points.
///
/// Records outside `config.start_date..=config.end_date` or without a value
/// for `stream` are ignored. `t` counts days from the first remaining record.
/// Non-positive rates are kept here; the fitter filters them.
pub fn prepare_series(well: &Well, stream: Stream, config: &FitConfig) -> WellSeries {
    let mut records: Vec<&ProductionRecord> = well
        .data
        .iter()
        .filter(|r| config.start_date.is_none_or(|d| r.date >= d))
        .filter(|r| config.end_date.is_none_or(|d| r.date <= d))
        .filter(|r| r.rate(stream).is_some_and(f64::is_finite))
        .collect();
    records.sort_by_key(|r| r.date);

    let Some(first) = records.first() else {
        return WellSeries {
            points: Vec::new(),
            first_date: None,
            start_t: 0.0,
            start_cumulative: 0.0,
            cumulative_estimated: false,
        };
    };
    let first_date = first.date;

    let points: Vec<TimeSeriesPoint> = records
        .iter()
        .filter_map(|r| {
            let q = r.rate(stream)?;
            let t = (r.date - first_date).num_days() as f64;
            Some(TimeSeriesPoint::new(t, q))
        })
        .collect();

    let start_t = points.last().map_or(0.0, |p| p.t);
    let reported = records
        .last()
        .and_then(|r| r.cumulative(stream))
        .filter(|c| c.is_finite());

    let (start_cumulative, cumulative_estimated) = match reported {
        Some(c) => (c, false),
        None => (trapezoid_cumulative(&points), true),
    };

    WellSeries {
        points,
        first_date: Some(first_date),
        start_t,
        start_cumulative,
        cumulative_estimated,
    }
}

/// Trapezoidal integral of `q` over `t`, ignoring non-positive rates.
pub fn trapezoid_cumulative(points: &[TimeSeriesPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| {
            let q0 = w[0].q.max(0.0);
            let q1 = w[1].q.max(0.0);
            0.5 * (q0 + q1) * (w[1].t - w[0].t)
        })
        .sum()
}

fn parse_record(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<ProductionRecord, String> {
    let date = get_optional(record, header_map, "date").ok_or_else(|| "missing required value: `date`".to_string())?;
    let date = parse_date(date)?;

    let num = |name: &str| -> Result<Option<f64>, String> {
        match get_optional(record, header_map, name) {
            None => Ok(None),
            Some(s) => match s.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(Some(v)),
                _ => Err(format!("invalid number '{s}' in column `{name}`")),
            },
        }
    };

    Ok(ProductionRecord {
        date,
        oil_rate: num("oil_rate")?,
        gas_rate: num("gas_rate")?,
        water_rate: num("water_rate")?,
        cumulative_oil: num("cumulative_oil")?,
        cumulative_gas: num("cumulative_gas")?,
        cumulative_water: num("cumulative_water")?,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    const FMTS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
    FMTS.iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .ok_or_else(|| format!("invalid date '{s}' (expected YYYY-MM-DD)"))
}
