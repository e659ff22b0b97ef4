// Library interface for trackload modules
// Raw GPS/heart-rate tracks in, per-athlete fitness/fatigue/form out.

pub mod config;
pub mod error;
pub mod export;
pub mod features;
pub mod formulas;
pub mod import;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod pmc;
pub mod registry;
pub mod summary;
pub mod zones;

// Re-export commonly used types for convenience
pub use models::*;
pub use config::{AppConfig, AthleteConfig};
pub use error::{DataIssue, IssueKind, LoadError, Result, TrackLoadError};
pub use features::{FeatureEngineer, FeatureTable, MovingThresholds};
pub use formulas::{DecayModel, FormulaError, FormulaPreset, PresetName};
pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
pub use normalize::{NormalizedTrack, SampleNormalizer};
pub use pipeline::{ActivityPipeline, ProcessedActivity};
pub use pmc::{
    AthleteSnapshot, AthleteState, DailyLoad, FormInterpretation, LoadMetrics, LoadModelConfig,
    LoadRollups, TrainingLoadEngine,
};
pub use registry::AthleteRegistry;
pub use summary::ActivitySummarizer;
pub use zones::ZoneBoundaries;
