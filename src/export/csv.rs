use crate::error::ExportError;
use crate::models::ActivitySummary;
use crate::pmc::DailyLoad;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::Path;

/// Flat CSV row for one activity summary
#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    start: DateTime<Utc>,
    activity_type: &'a str,
    name: &'a str,
    sample_count: usize,
    elapsed_seconds: Option<u32>,
    moving_seconds: Option<u32>,
    total_distance_2d: Option<Decimal>,
    total_distance_3d: Option<Decimal>,
    elevation_gain: Option<Decimal>,
    elevation_loss: Option<Decimal>,
    avg_speed_2d: Option<Decimal>,
    avg_speed_3d: Option<Decimal>,
    avg_cadence: Option<u16>,
    zone_1_minutes: Option<u32>,
    zone_2_minutes: Option<u32>,
    zone_3_minutes: Option<u32>,
    zone_4_minutes: Option<u32>,
    zone_5_minutes: Option<u32>,
    training_load: u32,
}

impl<'a> From<&'a ActivitySummary> for SummaryRow<'a> {
    fn from(summary: &'a ActivitySummary) -> Self {
        let zone = |index: usize| summary.zone_minutes.map(|minutes| minutes[index]);
        SummaryRow {
            start: summary.start(),
            activity_type: summary.activity_type().label(),
            name: &summary.identity.name,
            sample_count: summary.sample_count,
            elapsed_seconds: summary.elapsed_seconds,
            moving_seconds: summary.moving_seconds,
            total_distance_2d: summary.total_distance_2d,
            total_distance_3d: summary.total_distance_3d,
            elevation_gain: summary.elevation_gain,
            elevation_loss: summary.elevation_loss,
            avg_speed_2d: summary.avg_speed_2d,
            avg_speed_3d: summary.avg_speed_3d,
            avg_cadence: summary.avg_cadence,
            zone_1_minutes: zone(0),
            zone_2_minutes: zone(1),
            zone_3_minutes: zone(2),
            zone_4_minutes: zone(3),
            zone_5_minutes: zone(4),
            training_load: summary.training_load,
        }
    }
}

fn writer_for<P: AsRef<Path>>(output_path: P) -> Result<csv::Writer<std::fs::File>, ExportError> {
    csv::Writer::from_path(&output_path).map_err(|e| ExportError::Write {
        path: output_path.as_ref().to_path_buf(),
        reason: e.to_string(),
    })
}

fn serialization(e: csv::Error) -> ExportError {
    ExportError::Serialization(e.to_string())
}

/// Export the daily load series to CSV (one row per day, suitable for plotting)
pub fn export_daily_series<P: AsRef<Path>>(
    series: &[DailyLoad],
    output_path: P,
) -> Result<(), ExportError> {
    let mut writer = writer_for(output_path)?;
    for day in series {
        writer.serialize(day).map_err(serialization)?;
    }
    writer.flush()?;
    Ok(())
}

/// Export activity summaries to CSV; inapplicable figures are empty cells
pub fn export_activity_summaries<P: AsRef<Path>>(
    summaries: &[ActivitySummary],
    output_path: P,
) -> Result<(), ExportError> {
    let mut writer = writer_for(output_path)?;
    for summary in summaries {
        writer
            .serialize(SummaryRow::from(summary))
            .map_err(serialization)?;
    }
    writer.flush()?;
    Ok(())
}
