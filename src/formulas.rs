//! Formula presets for training load calculations
//!
//! Several competing formula sets have been used over time for the same
//! quantities. Each one is a named [`FormulaPreset`] selected by
//! configuration instead of being merged into one code path.
//!
//! - **canonical**: exponential decay over 42/7-day windows, normalized by
//!   the discrete decay sums
//! - **legacy-linear**: plain windowed averages, `trunc(sum / window)`
//!
//! Every preset defines form as `fitness - fatigue`.
//!
//! # Example
//!
//! ```rust,ignore
//! use trackload::formulas::FormulaPreset;
//!
//! let preset: FormulaPreset = "legacy-linear".parse()?;
//! let engine_config = preset.load_config();
//! ```

use crate::features::MovingThresholds;
use crate::pmc::LoadModelConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Formula selection errors
#[derive(Error, Debug, PartialEq)]
pub enum FormulaError {
    #[error("Unknown formula preset '{0}', expected one of: canonical, legacy-linear")]
    UnknownPreset(String),
}

/// Training-load points per minute spent in zones 1-5
pub const CANONICAL_ZONE_WEIGHTS: [Decimal; 5] =
    [dec!(0.2), dec!(0.4), dec!(0.75), dec!(1.6667), dec!(2.0)];

/// How fitness and fatigue fold a window of training loads into one number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecayModel {
    /// `round(sum(load * exp(-age_days / window)) / sum_{i=1..window} exp(-i / window))`
    Exponential,
    /// `trunc(sum(load) / window)`
    LinearAverage,
}

impl Default for DecayModel {
    fn default() -> Self {
        DecayModel::Exponential
    }
}

/// Named presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresetName {
    Canonical,
    LegacyLinear,
}

impl PresetName {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresetName::Canonical => "canonical",
            PresetName::LegacyLinear => "legacy-linear",
        }
    }
}

impl Default for PresetName {
    fn default() -> Self {
        PresetName::Canonical
    }
}

impl FromStr for PresetName {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "canonical" | "default" => Ok(PresetName::Canonical),
            "legacy-linear" | "linear" => Ok(PresetName::LegacyLinear),
            _ => Err(FormulaError::UnknownPreset(s.to_string())),
        }
    }
}

/// A complete, consistent set of formula parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaPreset {
    pub name: PresetName,

    /// Training-load points per zone minute
    pub zone_weights: [Decimal; 5],

    /// Fitness/fatigue folding model
    pub decay: DecayModel,

    /// Noise thresholds for the moving flag
    pub moving_thresholds: MovingThresholds,
}

impl FormulaPreset {
    pub fn canonical() -> Self {
        FormulaPreset {
            name: PresetName::Canonical,
            zone_weights: CANONICAL_ZONE_WEIGHTS,
            decay: DecayModel::Exponential,
            moving_thresholds: MovingThresholds::default(),
        }
    }

    pub fn legacy_linear() -> Self {
        FormulaPreset {
            name: PresetName::LegacyLinear,
            decay: DecayModel::LinearAverage,
            ..Self::canonical()
        }
    }

    pub fn by_name(name: PresetName) -> Self {
        match name {
            PresetName::Canonical => Self::canonical(),
            PresetName::LegacyLinear => Self::legacy_linear(),
        }
    }

    /// Training load engine configuration for this preset
    pub fn load_config(&self) -> LoadModelConfig {
        LoadModelConfig {
            decay: self.decay,
            ..LoadModelConfig::default()
        }
    }
}

impl Default for FormulaPreset {
    fn default() -> Self {
        Self::canonical()
    }
}

impl FromStr for FormulaPreset {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<PresetName>().map(Self::by_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_parsing() {
        assert_eq!(
            "canonical".parse::<FormulaPreset>().unwrap(),
            FormulaPreset::canonical()
        );
        assert_eq!(
            "Legacy_Linear".parse::<PresetName>().unwrap(),
            PresetName::LegacyLinear
        );
        assert_eq!(
            "self-referential".parse::<PresetName>(),
            Err(FormulaError::UnknownPreset("self-referential".to_string()))
        );
    }

    #[test]
    fn test_presets_share_weights() {
        let canonical = FormulaPreset::canonical();
        let legacy = FormulaPreset::legacy_linear();

        assert_eq!(canonical.zone_weights, legacy.zone_weights);
        assert_eq!(canonical.decay, DecayModel::Exponential);
        assert_eq!(legacy.decay, DecayModel::LinearAverage);
        assert_eq!(legacy.load_config().decay, DecayModel::LinearAverage);
        assert_eq!(legacy.load_config().fitness_window_days, 42);
    }

    #[test]
    fn test_preset_name_serialization() {
        let json = serde_json::to_string(&PresetName::LegacyLinear).unwrap();
        assert_eq!(json, "\"legacy-linear\"");
        assert_eq!(PresetName::LegacyLinear.as_str(), "legacy-linear");
    }
}
