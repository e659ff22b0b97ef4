use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{TrackLoadError, ZoneError};
use crate::features::MovingThresholds;
use crate::formulas::{FormulaPreset, PresetName};
use crate::logging::LogConfig;
use crate::pmc::LoadModelConfig;
use crate::zones::ZoneBoundaries;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default athlete ID (currently active)
    pub default_athlete_id: Option<String>,

    /// Configuration metadata
    pub metadata: ConfigMetadata,

    /// Formula and load model settings
    #[serde(default)]
    pub model: ModelSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LogConfig,

    /// Athletes configuration
    #[serde(default)]
    pub athletes: HashMap<String, AthleteConfig>,
}

/// Configuration metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Formula preset selection and load model windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Named formula preset (canonical, legacy-linear)
    pub preset: PresetName,

    /// Fitness window and history retention in days
    pub fitness_window_days: u16,

    /// Fatigue window in days
    pub fatigue_window_days: u16,

    /// Moving-speed noise thresholds (mph)
    pub moving_thresholds: MovingThresholds,
}

impl Default for ModelSettings {
    fn default() -> Self {
        let load = LoadModelConfig::default();
        ModelSettings {
            preset: PresetName::default(),
            fitness_window_days: load.fitness_window_days,
            fatigue_window_days: load.fatigue_window_days,
            moving_thresholds: MovingThresholds::default(),
        }
    }
}

impl ModelSettings {
    /// The named preset with this configuration's moving thresholds
    pub fn formula_preset(&self) -> FormulaPreset {
        FormulaPreset {
            moving_thresholds: self.moving_thresholds,
            ..FormulaPreset::by_name(self.preset)
        }
    }

    /// Load model configuration with this configuration's windows
    pub fn load_config(&self) -> LoadModelConfig {
        LoadModelConfig {
            fitness_window_days: self.fitness_window_days,
            fatigue_window_days: self.fatigue_window_days,
            ..self.formula_preset().load_config()
        }
    }
}

/// Athlete-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AthleteConfig {
    /// Unique athlete identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Maximum heart rate, used when no explicit zones are configured
    pub max_hr: Option<u16>,

    /// Explicit zone boundaries (four ascending bpm values)
    pub zones: Option<ZoneBoundaries>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let now = Utc::now();

        AppConfig {
            default_athlete_id: None,
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            model: ModelSettings::default(),
            logging: LogConfig::default(),
            athletes: HashMap::new(),
        }
    }
}

/// Configuration management implementation
impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        config
            .validate()
            .with_context(|| format!("Invalid configuration: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".trackload")
            .join("config.toml")
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    path = %config_path.display(),
                    error = %e,
                    "Config file unavailable, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> std::result::Result<(), TrackLoadError> {
        let model = &self.model;
        if model.fatigue_window_days == 0 || model.fitness_window_days == 0 {
            return Err(TrackLoadError::Configuration(
                "load windows must be at least one day".to_string(),
            ));
        }
        if model.fatigue_window_days > model.fitness_window_days {
            return Err(TrackLoadError::Configuration(format!(
                "fatigue window ({} days) exceeds fitness window ({} days)",
                model.fatigue_window_days, model.fitness_window_days
            )));
        }
        for athlete in self.athletes.values() {
            athlete.zone_boundaries()?;
        }
        if let Some(id) = &self.default_athlete_id {
            if !self.athletes.contains_key(id) {
                return Err(TrackLoadError::Configuration(format!(
                    "default athlete '{}' is not configured",
                    id
                )));
            }
        }
        Ok(())
    }

    /// Add a new athlete to the configuration
    pub fn add_athlete(&mut self, athlete_config: AthleteConfig) -> Result<()> {
        athlete_config.zone_boundaries()?;
        let athlete_id = athlete_config.id.clone();

        // First athlete becomes the default
        if self.athletes.is_empty() {
            self.default_athlete_id = Some(athlete_id.clone());
        }

        self.athletes.insert(athlete_id, athlete_config);
        self.metadata.updated_at = Utc::now();

        Ok(())
    }

    /// Remove an athlete from the configuration
    pub fn remove_athlete(&mut self, athlete_id: &str) -> Result<()> {
        if self.athletes.remove(athlete_id).is_none() {
            return Err(anyhow::anyhow!("Athlete not found: {}", athlete_id));
        }

        if self.default_athlete_id.as_deref() == Some(athlete_id) {
            self.default_athlete_id = self.athletes.keys().min().cloned();
        }

        self.metadata.updated_at = Utc::now();
        Ok(())
    }

    pub fn get_athlete(&self, athlete_id: &str) -> Option<&AthleteConfig> {
        self.athletes.get(athlete_id)
    }

    pub fn get_athlete_mut(&mut self, athlete_id: &str) -> Option<&mut AthleteConfig> {
        self.athletes.get_mut(athlete_id)
    }

    /// Get the default (currently active) athlete
    pub fn get_default_athlete(&self) -> Option<&AthleteConfig> {
        self.default_athlete_id
            .as_ref()
            .and_then(|id| self.athletes.get(id))
    }

    pub fn set_default_athlete(&mut self, athlete_id: &str) -> Result<()> {
        if !self.athletes.contains_key(athlete_id) {
            return Err(anyhow::anyhow!("Athlete not found: {}", athlete_id));
        }

        self.default_athlete_id = Some(athlete_id.to_string());
        self.metadata.updated_at = Utc::now();
        Ok(())
    }
}

impl AthleteConfig {
    /// Create a new athlete configuration; a missing id is generated
    pub fn new(name: String, athlete_id: Option<String>) -> Self {
        let id = athlete_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let now = Utc::now();

        AthleteConfig {
            id,
            name,
            max_hr: None,
            zones: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_max_hr(mut self, max_hr: u16) -> Self {
        self.max_hr = Some(max_hr);
        self
    }

    pub fn with_zones(mut self, zones: ZoneBoundaries) -> Self {
        self.zones = Some(zones);
        self
    }

    /// Explicit zones, else zones derived from max HR, else the defaults
    pub fn zone_boundaries(&self) -> std::result::Result<ZoneBoundaries, ZoneError> {
        match (self.zones, self.max_hr) {
            (Some(zones), _) => Ok(zones),
            (None, Some(max_hr)) => ZoneBoundaries::from_max_hr(max_hr),
            (None, None) => Ok(ZoneBoundaries::default()),
        }
    }
}
