//! Reporting exports
//!
//! Hands athlete state to reporting and plotting collaborators: the snapshot
//! as JSON, the daily load series and activity summaries as CSV.

use crate::error::ExportError;
use crate::pmc::{AthleteSnapshot, DailyLoad};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

pub mod csv;
pub mod json;

/// Export format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Snapshot plus daily series, as written by the JSON report export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AthleteReport {
    pub generated_at: DateTime<Utc>,
    pub snapshot: AthleteSnapshot,
    pub daily_series: Vec<DailyLoad>,
}

/// Write an athlete report.
///
/// JSON carries the full snapshot and series; CSV carries the daily series only.
pub fn export_report<P: AsRef<Path>>(
    snapshot: &AthleteSnapshot,
    series: &[DailyLoad],
    format: ExportFormat,
    output_path: P,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Json => {
            let report = AthleteReport {
                generated_at: Utc::now(),
                snapshot: snapshot.clone(),
                daily_series: series.to_vec(),
            };
            json::export_json(&report, &output_path)?;
        }
        ExportFormat::Csv => csv::export_daily_series(series, &output_path)?,
    }

    info!(
        athlete_id = %snapshot.athlete_id,
        format = ?format,
        path = %output_path.as_ref().display(),
        "Exported athlete report"
    );
    Ok(())
}
