use crate::error::ExportError;
use crate::pmc::AthleteSnapshot;
use std::io::Write;
use std::path::Path;

/// Export an athlete snapshot to JSON
pub fn export_snapshot<P: AsRef<Path>>(
    snapshot: &AthleteSnapshot,
    output_path: P,
) -> Result<(), ExportError> {
    export_json(snapshot, output_path)
}

/// Export any serializable data structure to JSON
pub fn export_json<T, P>(data: &T, output_path: P) -> Result<(), ExportError>
where
    T: serde::Serialize,
    P: AsRef<Path>,
{
    let json_data = serde_json::to_string_pretty(data)
        .map_err(|e| ExportError::Serialization(e.to_string()))?;

    let mut file = std::fs::File::create(&output_path).map_err(|e| ExportError::Write {
        path: output_path.as_ref().to_path_buf(),
        reason: e.to_string(),
    })?;
    file.write_all(json_data.as_bytes())?;

    Ok(())
}
