//! Formatted terminal output.
//!
//! Formatting lives here so the fitting and forecasting code stays free of
//! presentation concerns.

use chrono::{Days, NaiveDate};

use crate::app::pipeline::WellOutcome;
use crate::batch::BatchStatus;
use crate::diagnostics::ResidualRow;
use crate::domain::ForecastPoint;
use crate::forecast::StopReason;
use crate::report::batch_totals;

/// Fit + forecast summary for one well.
pub fn format_fit_summary(outcome: &WellOutcome) -> String {
    let scenario = &outcome.scenario;
    let config = &scenario.config;
    let series = &outcome.series;
    let mut out = String::new();

    out.push_str("=== dca - Decline Curve Analysis ===\n");
    out.push_str(&format!("Well: {} ({})\n", outcome.well_name, scenario.well_id));
    out.push_str(&format!("Stream: {}\n", config.stream.display_name()));
    out.push_str(&format!(
        "Window: {} .. {}\n",
        series.first_date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
        date_at(series.first_date, series.start_t).unwrap_or_else(|| "-".to_string()),
    ));
    out.push_str(&format!(
        "Points: n={} | b range=[{:.2}, {:.2}]\n",
        scenario.diagnostics.n, config.fit.min_b, config.fit.max_b
    ));

    out.push_str("\nModel fits:\n");
    out.push_str(
        format!(
            "  {:<12} {:>12} {:>10} {:>6} {:>10}",
            "model", "qi", "Di (1/yr)", "b", "R2"
        )
        .trim_end(),
    );
    out.push('\n');
    for fit in &outcome.selection.fits {
        let chosen = if fit.model == outcome.selection.best.model { "*" } else { " " };
        out.push_str(&format!(
            "{chosen} {:<12} {:>12.3} {:>10.4} {:>6.3} {:>10.6}\n",
            fit.model.display_name(),
            fit.params.qi,
            fit.params.di_annual(),
            fit.params.b,
            fit.r2
        ));
    }
    for (kind, reason) in &outcome.selection.skipped {
        out.push_str(&format!("  (skipped {}) {reason}\n", kind.display_name()));
    }

    let d = &scenario.diagnostics;
    out.push_str("\nDiagnostics:\n");
    out.push_str(&format!(
        "- R2={:.6} ({}) | RMSE={:.3} | SSE={:.3}\n",
        d.r2,
        d.quality.display_name(),
        d.rmse,
        d.sse
    ));

    out.push_str("\nForecast:\n");
    out.push_str(&format!(
        "- start: t={:.0}d | cumulative={:.1}{}\n",
        series.start_t,
        series.start_cumulative,
        if series.cumulative_estimated { " (estimated)" } else { "" }
    ));
    match &outcome.summary {
        Some(s) => {
            let stop = match s.stop {
                StopReason::EconomicLimit => format!("economic limit {:.2}", config.forecast.economic_limit),
                StopReason::MaxDuration => format!("max duration {:.0}d", config.forecast.max_duration),
            };
            out.push_str(&format!(
                "- end: {} (t={:.0}d) | rate={:.3} | stop: {stop}\n",
                date_at(series.first_date, s.end_t).unwrap_or_else(|| "-".to_string()),
                s.end_t,
                s.end_rate
            ));
            out.push_str(&format!("- EUR={:.1} | remaining={:.1}\n", s.eur, s.remaining));
        }
        None => out.push_str("- (no forecast points)\n"),
    }

    out
}

/// First `max_rows` forecast points as a table.
pub fn format_forecast_table(points: &[ForecastPoint], first_date: Option<NaiveDate>, max_rows: usize) -> String {
    let mut out = String::new();
    out.push_str(format!("{:>10} {:<10} {:>12} {:>14}", "t (d)", "date", "rate", "cumulative").trim_end());
    out.push('\n');
    for p in points.iter().take(max_rows) {
        out.push_str(&format!(
            "{:>10.0} {:<10} {:>12.3} {:>14.1}\n",
            p.t,
            date_at(first_date, p.t).unwrap_or_default(),
            p.q,
            p.cumulative
        ));
    }
    if points.len() > max_rows {
        out.push_str(&format!("... {} more\n", points.len() - max_rows));
    }
    out
}

/// Observed vs fitted rates.
pub fn format_residuals(rows: &[ResidualRow]) -> String {
    let mut out = String::new();
    out.push_str(format!("{:>10} {:>12} {:>12} {:>12}", "t (d)", "q_obs", "q_fit", "residual").trim_end());
    out.push('\n');
    for r in rows {
        out.push_str(&format!(
            "{:>10.0} {:>12.3} {:>12.3} {:>12.3}\n",
            r.t, r.q_obs, r.q_fit, r.residual
        ));
    }
    out
}

/// Per-well table plus failures for a finished batch.
pub fn format_batch_summary(status: &BatchStatus<WellOutcome>) -> String {
    let totals = batch_totals(status);
    let mut out = String::new();

    out.push_str("=== dca - Batch Summary ===\n");
    out.push_str(&format!(
        "Status: {:?} | processed {}/{} | succeeded {} | failed {}\n",
        status.phase, status.processed, status.total, totals.succeeded, totals.failed
    ));

    if !status.results.is_empty() {
        out.push('\n');
        out.push_str(
            format!(
                "{:<16} {:<12} {:>10} {:<10} {:>14}",
                "well", "model", "R2", "quality", "EUR"
            )
            .trim_end(),
        );
        out.push('\n');
        out.push_str(format!("{:-<16} {:-<12} {:-<10} {:-<10} {:-<14}", "", "", "", "", "").trim_end());
        out.push('\n');
        for r in &status.results {
            let s = &r.data.scenario;
            let eur = r
                .data
                .summary
                .as_ref()
                .map(|x| format!("{:.1}", x.eur))
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "{:<16} {:<12} {:>10.4} {:<10} {:>14}\n",
                truncate(&r.id, 16),
                s.results.model.display_name(),
                s.diagnostics.r2,
                s.diagnostics.quality.display_name(),
                eur
            ));
        }
        out.push_str(&format!("\nTotal EUR: {:.1}\n", totals.total_eur));
    }

    if !status.errors.is_empty() {
        out.push_str("\nFailures:\n");
        for e in &status.errors {
            out.push_str(&format!("- {}: {}\n", e.id, e.error));
        }
    }

    if !status.pending.is_empty() {
        out.push_str(&format!("\nNot processed: {}\n", status.pending.join(", ")));
    }

    out
}

fn date_at(first: Option<NaiveDate>, t: f64) -> Option<String> {
    let days = t.max(0.0).floor() as u64;
    first?.checked_add_days(Days::new(days)).map(|d| d.to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
