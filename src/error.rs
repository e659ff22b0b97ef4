//! Unified error hierarchy for trackload
//!
//! Hard failures are `TrackLoadError` variants. Data-quality findings that do
//! not stop processing are reported as [`DataIssue`] values next to the data
//! they describe.

use crate::formulas::FormulaError;
use crate::models::SampleField;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all trackload operations
#[derive(Debug, Error)]
pub enum TrackLoadError {
    /// Training load history errors
    #[error("Training load error: {0}")]
    Load(#[from] LoadError),

    /// Zone configuration errors
    #[error("Zone error: {0}")]
    Zone(#[from] ZoneError),

    /// Track import errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Export errors
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Formula preset selection errors
    #[error("Formula error: {0}")]
    Formula(#[from] FormulaError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the training load engine
#[derive(Debug, Error, PartialEq)]
pub enum LoadError {
    /// An activity with the same start timestamp is already in the history
    #[error("Duplicate activity: an activity starting at {start} is already recorded")]
    DuplicateActivity { start: DateTime<Utc> },

    /// No state is registered for the athlete
    #[error("Unknown athlete: {athlete_id}")]
    UnknownAthlete { athlete_id: String },

    /// The athlete's state lock was poisoned by a panicking writer
    #[error("Athlete state unavailable: {athlete_id}")]
    StateUnavailable { athlete_id: String },
}

/// Errors raised while building zone boundaries
#[derive(Debug, Error, PartialEq)]
pub enum ZoneError {
    #[error("Zone boundaries must be strictly ascending, got {boundaries:?}")]
    NotAscending { boundaries: [u16; 4] },

    #[error("Invalid maximum heart rate: {max_hr}")]
    InvalidMaxHr { max_hr: u16 },
}

/// Track import errors
#[derive(Debug, Error)]
pub enum ImportError {
    /// Unsupported format
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// Format-specific parsing error
    #[error("Parse error in {format}: {reason}")]
    ParseError { format: String, reason: String },

    /// Missing required data
    #[error("Missing required data: {field}")]
    MissingData { field: String },
}

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Export failed to {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for trackload operations
pub type Result<T> = std::result::Result<T, TrackLoadError>;

impl TrackLoadError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TrackLoadError::Load(LoadError::DuplicateActivity { .. }) => ErrorSeverity::Info,
            TrackLoadError::Load(LoadError::UnknownAthlete { .. }) => ErrorSeverity::Warning,
            TrackLoadError::Load(LoadError::StateUnavailable { .. }) => ErrorSeverity::Critical,
            TrackLoadError::Zone(_) => ErrorSeverity::Warning,
            TrackLoadError::Import(_) => ErrorSeverity::Warning,
            TrackLoadError::Formula(_) => ErrorSeverity::Error,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            TrackLoadError::Load(LoadError::DuplicateActivity { start }) => {
                format!(
                    "This activity ({}) has already been added.",
                    start.format("%Y-%m-%d %H:%M:%S")
                )
            }
            TrackLoadError::Import(ImportError::UnsupportedFormat { format }) => {
                format!("Track files of type '{}' cannot be imported.", format)
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical system error requiring immediate attention
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}

/// Kinds of non-fatal data-quality findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A field is missing on the first or last sample and cannot be imputed
    IncompleteBoundaryData,
    /// A run of consecutive missing values could not be properly repaired
    PartiallyImputed,
    /// A metric had no defined value and was resolved to its sentinel
    UndefinedMetric,
}

/// A non-fatal data-quality finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataIssue {
    pub kind: IssueKind,

    /// Sample column the finding refers to, when it is column-specific
    pub field: Option<SampleField>,

    /// Affected row indices (empty for activity-level findings)
    pub rows: Vec<usize>,

    /// Human-readable detail
    pub detail: String,
}

impl DataIssue {
    pub fn incomplete_boundary(field: SampleField, row: usize) -> Self {
        DataIssue {
            kind: IssueKind::IncompleteBoundaryData,
            field: Some(field),
            rows: vec![row],
            detail: format!("{} missing on boundary row {}", field, row),
        }
    }

    pub fn partially_imputed(field: SampleField, rows: Vec<usize>) -> Self {
        let detail = format!(
            "{} consecutive {} values missing at rows {:?}",
            rows.len(),
            field,
            rows
        );
        DataIssue {
            kind: IssueKind::PartiallyImputed,
            field: Some(field),
            rows,
            detail,
        }
    }

    pub fn undefined_metric(metric: &str) -> Self {
        DataIssue {
            kind: IssueKind::UndefinedMetric,
            field: None,
            rows: Vec::new(),
            detail: format!("{} undefined, reported as 0", metric),
        }
    }
}

impl fmt::Display for DataIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.detail)
    }
}
