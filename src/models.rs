use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Feet in one statute mile
pub const FEET_PER_MILE: f64 = 5280.0;

/// Feet in one meter (raw elevations are recorded in meters)
pub const FEET_PER_METER: f64 = 3.280_84;

/// Label used by track recorders when no activity type was declared
pub const UNKNOWN_TYPE_LABEL: &str = "Unknown Activity Type";

/// Display name used when the track carries no name
pub const UNNAMED_ACTIVITY: &str = "Unnamed Activity";

/// Minutes spent in each of the five heart rate zones (index 0 = zone 1)
pub type ZoneMinutes = [u32; 5];

/// Activity types recognized by the training load model
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Cycling,
    Running,
    Swimming,
    Hiking,
    /// Declared by the source but not one of the recognized sports
    Other(String),
    Unknown,
}

impl ActivityType {
    /// Map a vendor sport label onto an activity type
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        match trimmed.to_lowercase().as_str() {
            "cycling" | "biking" | "bike" | "ride" | "road_biking" => ActivityType::Cycling,
            "running" | "run" | "trail_running" => ActivityType::Running,
            "swimming" | "swim" | "open_water_swimming" => ActivityType::Swimming,
            "hiking" | "hike" | "walking" => ActivityType::Hiking,
            "" | "unknown" | "other" => ActivityType::Unknown,
            _ if trimmed == UNKNOWN_TYPE_LABEL => ActivityType::Unknown,
            _ => ActivityType::Other(trimmed.to_string()),
        }
    }

    /// Canonical lowercase label
    pub fn label(&self) -> &str {
        match self {
            ActivityType::Cycling => "cycling",
            ActivityType::Running => "running",
            ActivityType::Swimming => "swimming",
            ActivityType::Hiking => "hiking",
            ActivityType::Other(label) => label.as_str(),
            ActivityType::Unknown => "unknown",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ActivityType::Unknown)
    }
}

impl Default for ActivityType {
    fn default() -> Self {
        ActivityType::Unknown
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Identity of a recorded activity, supplied by the track source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityIdentity {
    /// Start timestamp; the sole identity key inside an athlete's history
    pub start: DateTime<Utc>,

    /// Declared (or reclassified) activity type
    pub activity_type: ActivityType,

    /// Display name
    pub name: String,
}

impl ActivityIdentity {
    pub fn new(start: DateTime<Utc>, activity_type: ActivityType, name: impl Into<String>) -> Self {
        let name = name.into();
        ActivityIdentity {
            start,
            activity_type,
            name: if name.trim().is_empty() {
                UNNAMED_ACTIVITY.to_string()
            } else {
                name
            },
        }
    }
}

/// One observation at a point in time, as produced by a track source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Absolute time of the observation
    pub timestamp: Option<DateTime<Utc>>,

    /// Latitude in decimal degrees
    pub latitude: Option<f64>,

    /// Longitude in decimal degrees
    pub longitude: Option<f64>,

    /// Elevation in meters above sea level
    pub elevation: Option<f64>,

    /// Heart rate in beats per minute
    pub heart_rate: Option<u16>,

    /// Cadence (steps or revolutions per minute)
    pub cadence: Option<u16>,

    /// Ambient temperature in degrees Celsius
    pub temperature: Option<f64>,
}

/// A complete raw activity: identity plus its ordered sample stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawActivity {
    pub identity: ActivityIdentity,
    pub samples: Vec<RawSample>,
}

/// Canonical sample after normalization.
///
/// Same schema as [`RawSample`]; a `None` here is an explicit unknown that
/// could not be repaired from neighbouring samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
    pub heart_rate: Option<u16>,
    pub cadence: Option<u16>,
    pub temperature: Option<f64>,
}

impl From<&RawSample> for Sample {
    fn from(raw: &RawSample) -> Self {
        Sample {
            timestamp: raw.timestamp,
            latitude: raw.latitude,
            longitude: raw.longitude,
            elevation: raw.elevation,
            heart_rate: raw.heart_rate,
            cadence: raw.cadence,
            temperature: raw.temperature,
        }
    }
}

impl Sample {
    /// Position as (latitude, longitude) when both coordinates are known
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Named sample columns, used when reporting data-quality issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleField {
    Timestamp,
    Latitude,
    Longitude,
    Elevation,
    HeartRate,
    Cadence,
    Temperature,
}

impl fmt::Display for SampleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleField::Timestamp => "timestamp",
            SampleField::Latitude => "latitude",
            SampleField::Longitude => "longitude",
            SampleField::Elevation => "elevation",
            SampleField::HeartRate => "heart_rate",
            SampleField::Cadence => "cadence",
            SampleField::Temperature => "temperature",
        };
        write!(f, "{}", name)
    }
}

/// A canonical sample plus its derived per-sample features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub sample: Sample,

    /// Seconds since the previous sample (undefined on the first row)
    pub time_delta: Option<f64>,

    /// Elevation change since the previous sample, in feet (raw elevations are
    /// meters, converted with [`FEET_PER_METER`])
    pub elevation_change: Option<f64>,

    /// Great-circle surface distance from the previous sample, in feet
    pub distance_2d: Option<f64>,

    /// Distance including elevation change, in feet
    pub distance_3d: Option<f64>,

    /// Surface speed in miles per hour
    pub speed_2d: Option<f64>,

    /// Speed including elevation change in miles per hour
    pub speed_3d: Option<f64>,

    /// Whether surface speed clears the activity's noise threshold
    pub moving: Option<bool>,

    /// Heart rate zone (1-5)
    pub zone: Option<u8>,
}

impl FeatureRow {
    /// A row with no derived features yet
    pub fn bare(sample: Sample) -> Self {
        FeatureRow {
            sample,
            time_delta: None,
            elevation_change: None,
            distance_2d: None,
            distance_3d: None,
            speed_2d: None,
            speed_3d: None,
            moving: None,
            zone: None,
        }
    }

    pub fn is_moving(&self) -> bool {
        self.moving == Some(true)
    }
}

/// Fixed-size summary of one activity.
///
/// Created once by the summarizer and never edited afterwards; `None` marks a
/// figure that does not apply to this activity (its source column was absent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub identity: ActivityIdentity,

    /// Number of samples the summary was derived from
    pub sample_count: usize,

    /// Total elapsed time in seconds
    pub elapsed_seconds: Option<u32>,

    /// Time spent moving in seconds
    pub moving_seconds: Option<u32>,

    /// Surface distance in miles
    pub total_distance_2d: Option<Decimal>,

    /// Distance including elevation change in miles
    pub total_distance_3d: Option<Decimal>,

    /// Total climbing in feet
    pub elevation_gain: Option<Decimal>,

    /// Total descending in feet
    pub elevation_loss: Option<Decimal>,

    /// Average moving surface speed in miles per hour
    pub avg_speed_2d: Option<Decimal>,

    /// Average moving speed including elevation change in miles per hour
    pub avg_speed_3d: Option<Decimal>,

    /// Time-weighted average cadence while moving
    pub avg_cadence: Option<u16>,

    /// Minutes per heart rate zone
    pub zone_minutes: Option<ZoneMinutes>,

    /// Zone-weighted training impulse
    pub training_load: u32,
}

impl ActivitySummary {
    /// Summary of an activity with no usable samples
    pub fn empty(identity: ActivityIdentity) -> Self {
        ActivitySummary {
            identity,
            sample_count: 0,
            elapsed_seconds: None,
            moving_seconds: None,
            total_distance_2d: None,
            total_distance_3d: None,
            elevation_gain: None,
            elevation_loss: None,
            avg_speed_2d: None,
            avg_speed_3d: None,
            avg_cadence: None,
            zone_minutes: None,
            training_load: 0,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.identity.start
    }

    pub fn activity_type(&self) -> &ActivityType {
        &self.identity.activity_type
    }

    /// Zone minutes, treating an inapplicable vector as all zeros
    pub fn zone_minutes_or_zero(&self) -> ZoneMinutes {
        self.zone_minutes.unwrap_or([0; 5])
    }
}
