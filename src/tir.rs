//! Time-in-range: duration-weighted band percentages over a reading
//! series

use crate::bands::{Band, BandClassifier};
use crate::models::{RangeThresholds, Reading, TirResult};

/// Core time-in-range calculation engine
pub struct TirCalculator;

impl TirCalculator {
    /// Compute duration-weighted time-in-range percentages
    ///
    /// Each adjacent pair of readings contributes its full gap duration
    /// to the band of the pair's average value, approximating the area
    /// under a linear interpolation between samples. Input order is not
    /// assumed; the series is sorted internally. Fewer than two
    /// readings, or a series spanning zero time, yields the all-zero
    /// result.
    pub fn compute(readings: &[Reading], thresholds: &RangeThresholds) -> TirResult {
        if readings.len() < 2 {
            return TirResult::default();
        }

        let mut sorted: Vec<&Reading> = readings.iter().collect();
        sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let mut band_ms = [0i64; 5];
        let mut total_ms = 0i64;

        for pair in sorted.windows(2) {
            let (newer, older) = (pair[0], pair[1]);
            let duration_ms = (newer.timestamp - older.timestamp)
                .num_milliseconds()
                .abs();
            let avg = (newer.value + older.value) / 2.0;
            let band = BandClassifier::classify(avg, thresholds);
            band_ms[Self::band_index(band)] += duration_ms;
            total_ms += duration_ms;
        }

        if total_ms == 0 {
            return TirResult::default();
        }

        let pct = |ms: i64| ms as f64 / total_ms as f64 * 100.0;

        TirResult {
            very_low: pct(band_ms[0]),
            low: pct(band_ms[1]),
            in_range: pct(band_ms[2]),
            high: pct(band_ms[3]),
            very_high: pct(band_ms[4]),
        }
    }

    fn band_index(band: Band) -> usize {
        match band {
            Band::VeryLow => 0,
            Band::Low => 1,
            Band::InRange => 2,
            Band::High => 3,
            Band::VeryHigh => 4,
        }
    }
}
