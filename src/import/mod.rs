//! Track file importers
//!
//! Importers turn a vendor file into a [`RawActivity`]: the activity identity
//! plus an ordered list of raw samples. They do no cleaning; everything
//! downstream of the import goes through the activity pipeline.

use crate::error::ImportError;
use crate::models::RawActivity;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub mod gpx;
pub mod tcx;

/// Trait for importing activities from different file formats
pub trait ImportFormat: Send + Sync {
    /// Check if this importer can handle the given file
    fn can_import(&self, file_path: &Path) -> bool;

    /// Parse one activity from file content
    fn import_str(&self, content: &str) -> Result<RawActivity, ImportError>;

    /// Get the format name for this importer
    fn get_format_name(&self) -> &'static str;

    /// Read and parse one activity file
    fn import_file(&self, file_path: &Path) -> Result<RawActivity> {
        let content = std::fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read {}", file_path.display()))?;
        self.import_str(&content).with_context(|| {
            format!(
                "Failed to import {} as {}",
                file_path.display(),
                self.get_format_name()
            )
        })
    }
}

/// Manager for coordinating different import formats
pub struct ImportManager {
    importers: Vec<Box<dyn ImportFormat>>,
}

impl ImportManager {
    /// Create a new import manager with all available importers
    pub fn new() -> Self {
        let importers: Vec<Box<dyn ImportFormat>> = vec![
            Box::new(gpx::GpxImporter::new()),
            Box::new(tcx::TcxImporter::new()),
        ];

        Self { importers }
    }

    fn importer_for(&self, file_path: &Path) -> Option<&dyn ImportFormat> {
        self.importers
            .iter()
            .find(|importer| importer.can_import(file_path))
            .map(|importer| importer.as_ref())
    }

    /// Import a single file, auto-detecting the format from its extension
    pub fn import_file(&self, file_path: &Path) -> Result<RawActivity> {
        let importer = self.importer_for(file_path).ok_or_else(|| {
            ImportError::UnsupportedFormat {
                format: file_path
                    .extension()
                    .map(|ext| ext.to_string_lossy().to_string())
                    .unwrap_or_else(|| "<none>".to_string()),
            }
        })?;

        info!(
            path = %file_path.display(),
            format = importer.get_format_name(),
            "Importing activity"
        );
        importer.import_file(file_path)
    }

    /// Import every supported file in a directory, sorted by path.
    ///
    /// Files that fail to import are logged and skipped.
    pub fn import_directory(&self, dir_path: &Path) -> Result<Vec<RawActivity>> {
        if !dir_path.is_dir() {
            anyhow::bail!("Path is not a directory: {}", dir_path.display());
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(dir_path)
            .with_context(|| format!("Failed to read directory {}", dir_path.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && self.can_import_file(path))
            .collect();
        files.sort();

        let mut activities = Vec::with_capacity(files.len());
        for file_path in &files {
            match self.import_file(file_path) {
                Ok(activity) => activities.push(activity),
                Err(e) => warn!(path = %file_path.display(), error = %e, "Skipped file"),
            }
        }

        info!(
            directory = %dir_path.display(),
            found = files.len(),
            imported = activities.len(),
            "Directory import complete"
        );
        Ok(activities)
    }

    pub fn can_import_file(&self, file_path: &Path) -> bool {
        self.importer_for(file_path).is_some()
    }
}

impl Default for ImportManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Case-insensitive extension check
pub(crate) fn has_extension(file_path: &Path, expected: &str) -> bool {
    file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}

/// RFC 3339 timestamp, with or without fractional seconds
pub(crate) fn parse_timestamp(format: &str, text: &str) -> Result<DateTime<Utc>, ImportError> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| parse_error(format, format!("invalid timestamp '{}': {}", text, e)))
}

pub(crate) fn parse_number<T: std::str::FromStr>(
    format: &str,
    field: &str,
    text: &str,
) -> Result<T, ImportError> {
    let trimmed = text.trim();
    trimmed
        .parse::<T>()
        .map_err(|_| parse_error(format, format!("invalid {} value '{}'", field, trimmed)))
}

pub(crate) fn parse_error(format: &str, reason: impl Into<String>) -> ImportError {
    ImportError::ParseError {
        format: format.to_string(),
        reason: reason.into(),
    }
}
