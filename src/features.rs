//! Per-sample feature engineering
//!
//! Derives time deltas, distances, speeds, the moving flag and heart rate
//! zones from a normalized sample table. A feature whose source column is
//! absent for the whole activity is omitted (every row `None`, and the
//! matching [`FeatureColumns`] flag cleared) rather than defaulted to zero.

use crate::models::{ActivityType, FeatureRow, Sample, FEET_PER_METER, FEET_PER_MILE};
use crate::zones::ZoneBoundaries;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Mean Earth radius in feet (3956 miles)
pub const EARTH_RADIUS_FEET: f64 = 3956.0 * FEET_PER_MILE;

/// Minimum surface speed (mph) for a sample to count as moving
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovingThresholds {
    pub cycling: f64,
    pub running: f64,
    pub swimming: f64,
    /// Applies to every other type, including unknown
    pub default: f64,
}

impl Default for MovingThresholds {
    fn default() -> Self {
        MovingThresholds {
            cycling: 2.5,
            running: 2.0,
            swimming: 0.1,
            default: 0.01,
        }
    }
}

impl MovingThresholds {
    pub fn threshold(&self, activity_type: &ActivityType) -> f64 {
        match activity_type {
            ActivityType::Cycling => self.cycling,
            ActivityType::Running => self.running,
            ActivityType::Swimming => self.swimming,
            _ => self.default,
        }
    }
}

/// Which derived features apply to a table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureColumns {
    pub time_delta: bool,
    pub elevation_change: bool,
    pub distance_2d: bool,
    pub distance_3d: bool,
    pub speed: bool,
    pub moving: bool,
    pub zone: bool,
    pub cadence: bool,
}

impl FeatureColumns {
    fn from_samples(samples: &[Sample]) -> Self {
        let has_time = samples.iter().any(|s| s.timestamp.is_some());
        let has_position = samples.iter().any(|s| s.position().is_some());
        let has_elevation = samples.iter().any(|s| s.elevation.is_some());

        FeatureColumns {
            time_delta: has_time,
            elevation_change: has_elevation,
            distance_2d: has_position,
            distance_3d: has_position && has_elevation,
            speed: has_time && has_position,
            moving: has_time && has_position,
            zone: samples.iter().any(|s| s.heart_rate.is_some()),
            cadence: samples.iter().any(|s| s.cadence.is_some()),
        }
    }
}

/// Feature-engineered sample table for one activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    /// Declared type, or the type inferred from speed when none was declared
    pub activity_type: ActivityType,

    /// True when `activity_type` was inferred from speed
    pub reclassified: bool,

    pub rows: Vec<FeatureRow>,

    pub columns: FeatureColumns,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows that count towards moving-time figures.
    ///
    /// When the activity has no moving classification every row counts.
    pub fn active_rows(&self) -> impl Iterator<Item = &FeatureRow> {
        let filter_moving = self.columns.moving;
        self.rows
            .iter()
            .filter(move |row| !filter_moving || row.is_moving())
    }
}

/// Great-circle distance in feet between two (lat, lon) points in degrees
pub fn haversine_feet(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, lon2) = (to.0.to_radians(), to.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_FEET * c
}

/// Speed in miles per hour from feet and seconds
fn mph(distance_feet: f64, seconds: f64) -> Option<f64> {
    if seconds > 0.0 {
        Some((distance_feet / FEET_PER_MILE) / (seconds / 3600.0))
    } else {
        None
    }
}

/// Infer a type from average moving speed (mph)
fn classify_by_speed(avg_speed: f64) -> ActivityType {
    if avg_speed > 10.0 {
        ActivityType::Cycling
    } else if avg_speed > 5.0 {
        ActivityType::Running
    } else if avg_speed > 1.5 {
        ActivityType::Hiking
    } else {
        ActivityType::Unknown
    }
}

/// Derives per-sample features for one activity at a time
#[derive(Debug, Clone, Default)]
pub struct FeatureEngineer {
    zones: ZoneBoundaries,
    thresholds: MovingThresholds,
}

impl FeatureEngineer {
    pub fn new(zones: ZoneBoundaries) -> Self {
        Self::with_thresholds(zones, MovingThresholds::default())
    }

    pub fn with_thresholds(zones: ZoneBoundaries, thresholds: MovingThresholds) -> Self {
        FeatureEngineer { zones, thresholds }
    }

    pub fn zones(&self) -> &ZoneBoundaries {
        &self.zones
    }

    /// Derive features for a normalized sample table
    pub fn engineer(&self, samples: &[Sample], declared: ActivityType) -> FeatureTable {
        let columns = FeatureColumns::from_samples(samples);
        let threshold = self.thresholds.threshold(&declared);

        let mut rows: Vec<FeatureRow> = Vec::with_capacity(samples.len());
        let mut previous: Option<&Sample> = None;

        for sample in samples {
            let mut row = FeatureRow::bare(sample.clone());

            if let Some(prev) = previous {
                row.time_delta = match (prev.timestamp, sample.timestamp) {
                    (Some(from), Some(to)) => Some((to - from).num_milliseconds() as f64 / 1000.0),
                    _ => None,
                };

                row.elevation_change = match (prev.elevation, sample.elevation) {
                    (Some(from), Some(to)) => Some((to - from) * FEET_PER_METER),
                    _ => None,
                };

                row.distance_2d = match (prev.position(), sample.position()) {
                    (Some(from), Some(to)) => Some(haversine_feet(from, to)),
                    _ => None,
                };

                row.distance_3d = match (row.distance_2d, row.elevation_change) {
                    (Some(flat), Some(climb)) => Some((flat * flat + climb * climb).sqrt()),
                    _ => None,
                };

                if let Some(dt) = row.time_delta {
                    row.speed_2d = row.distance_2d.and_then(|d| mph(d, dt));
                    row.speed_3d = row.distance_3d.and_then(|d| mph(d, dt));
                }

                row.moving = row.speed_2d.map(|speed| speed >= threshold);
            }

            row.zone = sample.heart_rate.map(|hr| self.zones.zone_for(hr));

            rows.push(row);
            previous = Some(sample);
        }

        let mut table = FeatureTable {
            activity_type: declared,
            reclassified: false,
            rows,
            columns,
        };

        if table.activity_type.is_unknown() && table.columns.speed {
            let avg_speed = average_moving_speed(&table);
            let inferred = classify_by_speed(avg_speed);
            if !inferred.is_unknown() {
                info!(
                    avg_speed_mph = avg_speed,
                    inferred = %inferred,
                    "Reclassified activity of unknown type from average speed"
                );
                table.activity_type = inferred;
                table.reclassified = true;
            }
        }

        debug!(
            rows = table.rows.len(),
            activity_type = %table.activity_type,
            columns = ?table.columns,
            "Engineered features"
        );

        table
    }
}

/// Total surface distance over moving time, in mph (0 when nothing moved)
fn average_moving_speed(table: &FeatureTable) -> f64 {
    let distance: f64 = table.rows.iter().filter_map(|row| row.distance_2d).sum();
    let moving_seconds: f64 = table
        .rows
        .iter()
        .filter(|row| row.is_moving())
        .filter_map(|row| row.time_delta)
        .sum();

    mph(distance, moving_seconds).unwrap_or(0.0)
}
