use quick_xml::de::from_str;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::error::ImportError;
use crate::import::{has_extension, parse_error, parse_timestamp, ImportFormat};
use crate::models::{ActivityIdentity, ActivityType, RawActivity, RawSample};

const FORMAT: &str = "TCX";

/// TCX (Training Center XML) importer.
///
/// Imports the first activity of the document. Trackpoints of every lap are
/// concatenated in document order.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcxImporter;

impl TcxImporter {
    pub fn new() -> Self {
        Self
    }
}

impl ImportFormat for TcxImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        has_extension(file_path, "tcx")
    }

    fn import_str(&self, content: &str) -> Result<RawActivity, ImportError> {
        parse_tcx(content)
    }

    fn get_format_name(&self) -> &'static str {
        FORMAT
    }
}

/// Parse the first activity of a TCX document
pub fn parse_tcx(content: &str) -> Result<RawActivity, ImportError> {
    let tcx: TrainingCenterDatabase =
        from_str(content).map_err(|e| parse_error(FORMAT, e.to_string()))?;

    let activity = tcx
        .activities
        .and_then(|activities| activities.activity.into_iter().next())
        .ok_or_else(|| ImportError::MissingData {
            field: "Activity".to_string(),
        })?;

    let start = parse_timestamp(FORMAT, &activity.id)?;
    let activity_type = ActivityType::from_label(&activity.sport);

    let type_label = match activity_type {
        ActivityType::Other(_) | ActivityType::Unknown => activity.sport.trim().to_string(),
        ref known => known.label().to_string(),
    };
    let name = format!("{} activity on {}", type_label, start.format("%Y-%m-%d"));

    let mut samples = Vec::new();
    for trackpoint in activity
        .lap
        .into_iter()
        .filter_map(|lap| lap.track)
        .flat_map(|track| track.trackpoint)
    {
        samples.push(RawSample {
            timestamp: trackpoint
                .time
                .as_deref()
                .map(|t| parse_timestamp(FORMAT, t))
                .transpose()?,
            latitude: trackpoint.position.as_ref().map(|p| p.latitude_degrees),
            longitude: trackpoint.position.as_ref().map(|p| p.longitude_degrees),
            elevation: trackpoint.altitude_meters,
            heart_rate: trackpoint.heart_rate_bpm.map(|hr| hr.value),
            cadence: trackpoint.cadence,
            temperature: None,
        });
    }

    debug!(
        samples = samples.len(),
        activity_type = %activity_type,
        "Parsed TCX activity"
    );

    Ok(RawActivity {
        identity: ActivityIdentity::new(start, activity_type, name),
        samples,
    })
}

// TCX XML structures

#[derive(Debug, Deserialize)]
#[serde(rename = "TrainingCenterDatabase")]
struct TrainingCenterDatabase {
    #[serde(rename = "Activities")]
    activities: Option<Activities>,
}

#[derive(Debug, Deserialize)]
struct Activities {
    #[serde(rename = "Activity", default)]
    activity: Vec<Activity>,
}

#[derive(Debug, Deserialize)]
struct Activity {
    #[serde(rename = "@Sport")]
    sport: String,
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Lap", default)]
    lap: Vec<Lap>,
}

#[derive(Debug, Deserialize)]
struct Lap {
    #[serde(rename = "Track")]
    track: Option<Track>,
}

#[derive(Debug, Deserialize)]
struct Track {
    #[serde(rename = "Trackpoint", default)]
    trackpoint: Vec<Trackpoint>,
}

#[derive(Debug, Deserialize)]
struct Trackpoint {
    #[serde(rename = "Time")]
    time: Option<String>,
    #[serde(rename = "Position")]
    position: Option<Position>,
    #[serde(rename = "AltitudeMeters")]
    altitude_meters: Option<f64>,
    #[serde(rename = "HeartRateBpm")]
    heart_rate_bpm: Option<HeartRateBpm>,
    #[serde(rename = "Cadence")]
    cadence: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct Position {
    #[serde(rename = "LatitudeDegrees")]
    latitude_degrees: f64,
    #[serde(rename = "LongitudeDegrees")]
    longitude_degrees: f64,
}

#[derive(Debug, Deserialize)]
struct HeartRateBpm {
    #[serde(rename = "Value")]
    value: u16,
}
