use serde::{Deserialize, Serialize};

use crate::error::CalculationError;
use crate::models::RangeThresholds;

/// The five glycemic bands, ordered low to high
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Band {
    VeryLow,
    Low,
    InRange,
    High,
    VeryHigh,
}

impl Band {
    /// Short label for reports
    pub fn label(&self) -> &'static str {
        match self {
            Band::VeryLow => "very low",
            Band::Low => "low",
            Band::InRange => "in range",
            Band::High => "high",
            Band::VeryHigh => "very high",
        }
    }
}

/// Band classification against a 4-threshold configuration
pub struct BandClassifier;

impl BandClassifier {
    /// Classify a value into one of the five bands
    ///
    /// Boundary policy: the in-range band is closed on both ends
    /// (`low <= v <= high`); the outer boundaries belong to the band
    /// closer to range (`very_low` is Low, `very_high` is High).
    pub fn classify(value: f64, thresholds: &RangeThresholds) -> Band {
        if value < thresholds.very_low {
            Band::VeryLow
        } else if value < thresholds.low {
            Band::Low
        } else if value <= thresholds.high {
            Band::InRange
        } else if value <= thresholds.very_high {
            Band::High
        } else {
            Band::VeryHigh
        }
    }

    /// Check the strict ordering invariant of a threshold configuration
    pub fn validate(thresholds: &RangeThresholds) -> Result<(), CalculationError> {
        let RangeThresholds {
            very_low,
            low,
            high,
            very_high,
        } = *thresholds;

        if very_low < low && low < high && high < very_high {
            Ok(())
        } else {
            Err(CalculationError::InvalidThresholds {
                very_low,
                low,
                high,
                very_high,
            })
        }
    }
}
