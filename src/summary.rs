use crate::error::DataIssue;
use crate::features::FeatureTable;
use crate::formulas::CANONICAL_ZONE_WEIGHTS;
use crate::models::{ActivityIdentity, ActivitySummary, ZoneMinutes, FEET_PER_MILE};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use tracing::debug;

/// Cadence at or below this is treated as walking or idle noise
const MIN_CADENCE: u16 = 40;

/// Reduces a feature table to a fixed-size activity summary
#[derive(Debug, Clone)]
pub struct ActivitySummarizer {
    zone_weights: [Decimal; 5],
}

impl Default for ActivitySummarizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivitySummarizer {
    /// Summarizer using the canonical zone weights
    pub fn new() -> Self {
        Self::with_weights(CANONICAL_ZONE_WEIGHTS)
    }

    pub fn with_weights(zone_weights: [Decimal; 5]) -> Self {
        ActivitySummarizer { zone_weights }
    }

    /// Summarize a feature table.
    ///
    /// The summary carries the table's activity type, which may differ from
    /// the declared one when the type was inferred from speed.
    pub fn summarize(&self, identity: ActivityIdentity, table: &FeatureTable) -> ActivitySummary {
        self.summarize_with_issues(identity, table, &mut Vec::new())
    }

    /// Summarize a feature table, recording undefined metrics in `issues`
    pub fn summarize_with_issues(
        &self,
        identity: ActivityIdentity,
        table: &FeatureTable,
        issues: &mut Vec<DataIssue>,
    ) -> ActivitySummary {
        let identity = ActivityIdentity {
            activity_type: table.activity_type.clone(),
            ..identity
        };

        if table.is_empty() {
            return ActivitySummary::empty(identity);
        }

        let columns = table.columns;

        let elapsed = columns
            .time_delta
            .then(|| table.rows.iter().filter_map(|r| r.time_delta).sum::<f64>());
        let moving = columns
            .time_delta
            .then(|| table.active_rows().filter_map(|r| r.time_delta).sum::<f64>());

        let distance_2d = columns
            .distance_2d
            .then(|| table.rows.iter().filter_map(|r| r.distance_2d).sum::<f64>() / FEET_PER_MILE);
        let distance_3d = columns
            .distance_3d
            .then(|| table.rows.iter().filter_map(|r| r.distance_3d).sum::<f64>() / FEET_PER_MILE);

        let (elevation_gain, elevation_loss) = if columns.elevation_change {
            let (gain, loss) = elevation_totals(table);
            (to_decimal(gain, 1), to_decimal(loss, 1))
        } else {
            (None, None)
        };

        let (avg_speed_2d, avg_speed_3d) = if columns.speed {
            let hours = moving.unwrap_or(0.0) / 3600.0;
            if hours > 0.0 {
                (
                    distance_2d.and_then(|d| to_decimal(d / hours, 2)),
                    distance_3d.and_then(|d| to_decimal(d / hours, 2)),
                )
            } else {
                issues.push(DataIssue::undefined_metric("average speed"));
                (
                    Some(Decimal::ZERO),
                    columns.distance_3d.then_some(Decimal::ZERO),
                )
            }
        } else {
            (None, None)
        };

        let zone_minutes = (columns.zone && columns.time_delta).then(|| zone_minutes(table));
        let training_load = zone_minutes
            .map(|minutes| self.training_load(&minutes))
            .unwrap_or(0);

        let avg_cadence = if columns.cadence && columns.time_delta {
            average_cadence(table)
        } else {
            None
        };

        let summary = ActivitySummary {
            identity,
            sample_count: table.len(),
            elapsed_seconds: elapsed.map(|s| s.round() as u32),
            moving_seconds: moving.map(|s| s.round() as u32),
            total_distance_2d: distance_2d.and_then(|d| to_decimal(d, 2)),
            total_distance_3d: distance_3d.and_then(|d| to_decimal(d, 2)),
            elevation_gain,
            elevation_loss,
            avg_speed_2d,
            avg_speed_3d,
            avg_cadence,
            zone_minutes,
            training_load,
        };

        debug!(
            name = %summary.identity.name,
            activity_type = %summary.identity.activity_type,
            training_load = summary.training_load,
            zone_minutes = ?summary.zone_minutes,
            "Summarized activity"
        );

        summary
    }

    /// `floor(sum(zone_minutes[k] * weight[k]))`
    pub fn training_load(&self, zone_minutes: &ZoneMinutes) -> u32 {
        zone_minutes
            .iter()
            .zip(self.zone_weights.iter())
            .map(|(&minutes, &weight)| Decimal::from(minutes) * weight)
            .sum::<Decimal>()
            .floor()
            .to_u32()
            .unwrap_or(0)
    }
}

fn to_decimal(value: f64, dp: u32) -> Option<Decimal> {
    Decimal::from_f64(value).map(|d| d.round_dp(dp))
}

/// (gain, loss) in feet; loss is reported as a positive number
fn elevation_totals(table: &FeatureTable) -> (f64, f64) {
    table
        .rows
        .iter()
        .filter_map(|r| r.elevation_change)
        .fold((0.0, 0.0), |(gain, loss), change| {
            if change > 0.0 {
                (gain + change, loss)
            } else {
                (gain, loss - change)
            }
        })
}

/// Whole minutes per zone over active rows
fn zone_minutes(table: &FeatureTable) -> ZoneMinutes {
    let mut seconds = [0.0f64; 5];
    for row in table.active_rows() {
        if let (Some(zone), Some(dt)) = (row.zone, row.time_delta) {
            seconds[usize::from(zone.clamp(1, 5)) - 1] += dt;
        }
    }
    seconds.map(|s| (s / 60.0).round() as u32)
}

/// Time-weighted cadence over active rows above the idle cutoff, truncated
fn average_cadence(table: &FeatureTable) -> Option<u16> {
    let (total_seconds, weighted) = table
        .active_rows()
        .filter_map(|r| match (r.sample.cadence, r.time_delta) {
            (Some(cadence), Some(dt)) if cadence > MIN_CADENCE => Some((cadence, dt)),
            _ => None,
        })
        .fold((0.0, 0.0), |(secs, sum), (cadence, dt)| {
            (secs + dt, sum + f64::from(cadence) * dt)
        });

    (total_seconds > 0.0).then(|| (weighted / total_seconds) as u16)
}
