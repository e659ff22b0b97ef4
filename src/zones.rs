use crate::error::ZoneError;
use serde::{Deserialize, Serialize};

/// Default zone boundaries (bpm)
pub const DEFAULT_BOUNDARIES: [u16; 4] = [113, 150, 168, 187];

/// Maximum heart rate assumed when an athlete has none configured
pub const DEFAULT_MAX_HR: u16 = 195;

/// Fractions of maximum heart rate at which zones 2-5 begin
const MAX_HR_FRACTIONS: [f64; 4] = [0.59, 0.78, 0.87, 0.97];

/// Heart rate zone boundaries.
///
/// Four strictly ascending thresholds split heart rate into five zones:
/// `[-inf, b1)`, `[b1, b2)`, `[b2, b3)`, `[b3, b4)`, `[b4, +inf)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[u16; 4]", into = "[u16; 4]")]
pub struct ZoneBoundaries {
    boundaries: [u16; 4],
}

impl ZoneBoundaries {
    /// Build from explicit thresholds, which must be strictly ascending
    pub fn new(boundaries: [u16; 4]) -> Result<Self, ZoneError> {
        if boundaries.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ZoneError::NotAscending { boundaries });
        }
        Ok(ZoneBoundaries { boundaries })
    }

    /// Derive thresholds from maximum heart rate
    ///
    /// - Z2 from 59% max HR
    /// - Z3 from 78% max HR
    /// - Z4 from 87% max HR
    /// - Z5 from 97% max HR
    pub fn from_max_hr(max_hr: u16) -> Result<Self, ZoneError> {
        if !(60..=250).contains(&max_hr) {
            return Err(ZoneError::InvalidMaxHr { max_hr });
        }

        let mut boundaries = [0u16; 4];
        for (slot, fraction) in boundaries.iter_mut().zip(MAX_HR_FRACTIONS) {
            *slot = (f64::from(max_hr) * fraction) as u16;
        }
        Self::new(boundaries)
    }

    pub fn boundaries(&self) -> [u16; 4] {
        self.boundaries
    }

    /// Zone (1-5) for a heart rate
    pub fn zone_for(&self, heart_rate: u16) -> u8 {
        self.boundaries
            .iter()
            .position(|&boundary| heart_rate < boundary)
            .map(|index| index as u8 + 1)
            .unwrap_or(5)
    }
}

impl Default for ZoneBoundaries {
    fn default() -> Self {
        ZoneBoundaries {
            boundaries: DEFAULT_BOUNDARIES,
        }
    }
}

impl TryFrom<[u16; 4]> for ZoneBoundaries {
    type Error = ZoneError;

    fn try_from(boundaries: [u16; 4]) -> Result<Self, Self::Error> {
        Self::new(boundaries)
    }
}

impl From<ZoneBoundaries> for [u16; 4] {
    fn from(zones: ZoneBoundaries) -> Self {
        zones.boundaries
    }
}
