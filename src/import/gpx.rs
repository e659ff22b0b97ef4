use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;
use tracing::debug;

use crate::error::ImportError;
use crate::import::{has_extension, parse_error, parse_number, parse_timestamp, ImportFormat};
use crate::models::{ActivityIdentity, ActivityType, RawActivity, RawSample};

const FORMAT: &str = "GPX";

/// GPX track importer.
///
/// Reads `trkpt` positions, elevation and time, plus the heart rate, cadence
/// and air temperature carried in TrackPointExtension blocks. Extension
/// elements are matched by local name, so the vendor namespace prefix
/// (`gpxtpx:`, `ns3:`) does not matter.
#[derive(Debug, Clone, Copy, Default)]
pub struct GpxImporter;

impl GpxImporter {
    pub fn new() -> Self {
        Self
    }
}

impl ImportFormat for GpxImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        has_extension(file_path, "gpx")
    }

    fn import_str(&self, content: &str) -> Result<RawActivity, ImportError> {
        parse_gpx(content)
    }

    fn get_format_name(&self) -> &'static str {
        FORMAT
    }
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Sample seeded from the `lat`/`lon` attributes of a `trkpt`
fn track_point(e: &BytesStart) -> Result<RawSample, ImportError> {
    let mut sample = RawSample::default();
    for attr in e.attributes().flatten() {
        let value = attr
            .unescape_value()
            .map_err(|err| parse_error(FORMAT, err.to_string()))?;
        match attr.key.local_name().as_ref() {
            b"lat" => sample.latitude = Some(parse_number(FORMAT, "lat", &value)?),
            b"lon" => sample.longitude = Some(parse_number(FORMAT, "lon", &value)?),
            _ => {}
        }
    }
    Ok(sample)
}

/// Parse a single-track GPX document
pub fn parse_gpx(content: &str) -> Result<RawActivity, ImportError> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut creator: Option<String> = None;
    let mut metadata_time = None;
    let mut name: Option<String> = None;
    let mut type_label: Option<String> = None;
    let mut current: Option<RawSample> = None;
    let mut samples: Vec<RawSample> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let local = local_name(e);
                match local.as_str() {
                    "gpx" => {
                        creator = e
                            .try_get_attribute("creator")
                            .ok()
                            .flatten()
                            .and_then(|attr| attr.unescape_value().ok())
                            .map(|value| value.into_owned());
                    }
                    "trkpt" => current = Some(track_point(e)?),
                    _ => {}
                }
                path.push(local);
            }
            Ok(Event::Empty(ref e)) => {
                if local_name(e) == "trkpt" {
                    samples.push(track_point(e)?);
                }
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| parse_error(FORMAT, err.to_string()))?;
                let parent = path.last().map(String::as_str);
                let grandparent = path.len().checked_sub(2).map(|i| path[i].as_str());

                match (current.as_mut(), parent) {
                    (Some(sample), Some("time")) => {
                        sample.timestamp = Some(parse_timestamp(FORMAT, &text)?)
                    }
                    (Some(sample), Some("ele")) => {
                        sample.elevation = Some(parse_number(FORMAT, "ele", &text)?)
                    }
                    (Some(sample), Some("hr")) => {
                        sample.heart_rate = Some(parse_number(FORMAT, "hr", &text)?)
                    }
                    (Some(sample), Some("cad")) => {
                        sample.cadence = Some(parse_number(FORMAT, "cad", &text)?)
                    }
                    (Some(sample), Some("atemp")) => {
                        sample.temperature = Some(parse_number(FORMAT, "atemp", &text)?)
                    }
                    (None, Some("time")) if grandparent == Some("metadata") => {
                        metadata_time = Some(parse_timestamp(FORMAT, &text)?)
                    }
                    (None, Some("name")) if grandparent == Some("trk") => {
                        name = Some(text.trim().to_string())
                    }
                    (None, Some("type")) if grandparent == Some("trk") => {
                        type_label = Some(text.trim().to_string())
                    }
                    _ => {}
                }
            }
            Ok(Event::End(_)) => {
                if path.pop().as_deref() == Some("trkpt") {
                    if let Some(sample) = current.take() {
                        samples.push(sample);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(parse_error(
                    FORMAT,
                    format!("XML error at position {}: {}", reader.buffer_position(), e),
                ))
            }
            _ => {}
        }
    }

    let start = metadata_time
        .or_else(|| samples.iter().find_map(|s| s.timestamp))
        .ok_or_else(|| ImportError::MissingData {
            field: "start time".to_string(),
        })?;

    let activity_type = type_label
        .as_deref()
        .map(ActivityType::from_label)
        .unwrap_or(ActivityType::Unknown);

    debug!(
        creator = creator.as_deref().unwrap_or("unknown"),
        samples = samples.len(),
        activity_type = %activity_type,
        "Parsed GPX track"
    );

    Ok(RawActivity {
        identity: ActivityIdentity::new(start, activity_type, name.unwrap_or_default()),
        samples,
    })
}
