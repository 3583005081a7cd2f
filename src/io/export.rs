//! Scenario sinks and file exports.
//!
//! A `ScenarioSink` is the boundary to whatever stores scenarios for a
//! project. The pipeline calls it once per successfully fitted well.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Days, NaiveDate};

use crate::domain::{ForecastPoint, Scenario};
use crate::error::DeclineError;

/// Receives finished scenarios.
pub trait ScenarioSink: Send + Sync {
    fn add_scenario(&self, project_id: &str, scenario: Scenario) -> Result<(), DeclineError>;
}

/// Keeps scenarios in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    scenarios: Mutex<Vec<(String, Scenario)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(project_id, scenario)` pairs received so far.
    pub fn scenarios(&self) -> Vec<(String, Scenario)> {
        self.scenarios.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.scenarios.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ScenarioSink for MemorySink {
    fn add_scenario(&self, project_id: &str, scenario: Scenario) -> Result<(), DeclineError> {
        self.scenarios
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((project_id.to_string(), scenario));
        Ok(())
    }
}

/// Writes each scenario as pretty JSON to `<root>/<project_id>/<well_id>.json`.
#[derive(Debug, Clone)]
pub struct JsonDirSink {
    root: PathBuf,
}

impl JsonDirSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, project_id: &str, well_id: &str) -> PathBuf {
        self.root
            .join(sanitize_file_stem(project_id))
            .join(format!("{}.json", sanitize_file_stem(well_id)))
    }
}

impl ScenarioSink for JsonDirSink {
    fn add_scenario(&self, project_id: &str, scenario: Scenario) -> Result<(), DeclineError> {
        let path = self.path_for(project_id, &scenario.well_id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DeclineError::data_access(format!("failed to create '{}': {e}", parent.display()))
            })?;
        }
        write_scenario_json(&path, &scenario)?;
        tracing::debug!(path = %path.display(), "scenario written");
        Ok(())
    }
}

/// Write one scenario as pretty JSON.
pub fn write_scenario_json(path: &Path, scenario: &Scenario) -> Result<(), DeclineError> {
    let file = File::create(path)
        .map_err(|e| DeclineError::data_access(format!("failed to create '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, scenario)
        .map_err(|e| DeclineError::data_access(format!("failed to write scenario JSON: {e}")))
}

/// Write forecast points to CSV.
///
/// When `first_date` is known, each row also carries the calendar date
/// (`first_date + t` days, rounded down).
pub fn write_forecast_csv(
    path: &Path,
    points: &[ForecastPoint],
    first_date: Option<NaiveDate>,
) -> Result<(), DeclineError> {
    let file = File::create(path)
        .map_err(|e| DeclineError::data_access(format!("failed to create forecast CSV '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);
    let io_err = |e: csv::Error| DeclineError::data_access(format!("failed to write forecast CSV: {e}"));

    writer.write_record(["t_days", "date", "rate", "cumulative"]).map_err(io_err)?;
    for p in points {
        let date = first_date
            .and_then(|d| d.checked_add_days(Days::new(p.t.max(0.0).floor() as u64)))
            .map(|d| d.to_string())
            .unwrap_or_default();
        writer
            .write_record([
                format!("{:.2}", p.t),
                date,
                format!("{:.6}", p.q),
                format!("{:.4}", p.cumulative),
            ])
            .map_err(io_err)?;
    }
    writer
        .flush()
        .map_err(|e| DeclineError::data_access(format!("failed to flush forecast CSV: {e}")))
}

fn sanitize_file_stem(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() { "_".to_string() } else { cleaned }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Diagnostics, FitConfig, FitResult, FittedParams, ForecastConfig, ModelKind, QualityLabel, ScenarioConfig,
        Stream,
    };

    fn scenario(well_id: &str) -> Scenario {
        Scenario {
            name: format!("{well_id} oil auto"),
            well_id: well_id.to_string(),
            results: FitResult {
                model: ModelKind::Exponential,
                params: FittedParams::from_annual(1000.0, 0.3, 0.0),
                r2: 0.99,
            },
            diagnostics: Diagnostics {
                r2: 0.99,
                quality: QualityLabel::Excellent,
                sse: 1.0,
                rmse: 0.5,
                n: 4,
            },
            forecast: vec![ForecastPoint {
                t: 30.0,
                q: 975.0,
                cumulative: 29_600.0,
            }],
            config: ScenarioConfig {
                stream: Stream::Oil,
                fit: FitConfig::default(),
                forecast: ForecastConfig::default(),
            },
        }
    }

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.add_scenario("p1", scenario("a")).unwrap();
        sink.add_scenario("p1", scenario("b")).unwrap();
        let got = sink.scenarios();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].0, "p1");
        assert_eq!(got[1].1.well_id, "b");
    }

    #[test]
    fn json_dir_sink_writes_readable_scenarios() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonDirSink::new(dir.path());
        sink.add_scenario("north field", scenario("w/1")).unwrap();

        let path = sink.path_for("north field", "w/1");
        assert!(path.ends_with("north_field/w_1.json"));
        let back: Scenario = serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(back, scenario("w/1"));
    }

    #[test]
    fn forecast_csv_has_header_and_dates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fc.csv");
        let points = [
            ForecastPoint {
                t: 30.0,
                q: 90.0,
                cumulative: 100.0,
            },
            ForecastPoint {
                t: 60.0,
                q: 80.0,
                cumulative: 200.0,
            },
        ];
        write_forecast_csv(&path, &points, NaiveDate::from_ymd_opt(2024, 1, 1)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "t_days,date,rate,cumulative");
        assert_eq!(lines[1], "30.00,2024-01-31,90.000000,100.0000");
        assert_eq!(lines.len(), 3);
    }
}
