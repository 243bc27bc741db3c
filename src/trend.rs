//! Trend fitting over irregular glucose readings
//!
//! Turns an unordered batch of readings into a least-squares trend
//! line, an instantaneous rate of change, a clamped one-hour
//! prediction, and a smoothed series. Every degenerate input
//! (too few points, zero-variance window) yields `None`; callers skip
//! dependent alerts and rendering rather than handle an error.

use chrono::Duration;

use crate::models::{Prediction, Reading, Trend};

/// EMA smoothing factor
const EMA_ALPHA: f64 = 0.3;

/// Prediction horizon past the newest reading
const PREDICTION_HORIZON_MINUTES: i64 = 60;

/// Physiological bound on the projected slope, mmol/L per hour
const MAX_PLAUSIBLE_SLOPE_PER_HOUR: f64 = 15.0;

/// Bounds on the projected value, mmol/L
const PREDICTION_FLOOR: f64 = 1.0;
const PREDICTION_CEILING: f64 = 25.0;

/// Regression denominators below this are treated as zero variance
const DEGENERACY_EPSILON: f64 = 1e-9;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Core trend calculation engine
pub struct TrendCalculator;

impl TrendCalculator {
    /// Fit a trend to a batch of readings, in any order
    ///
    /// The regression window is chosen by a fallback chain anchored at
    /// the newest reading: the last 6 hours, else 12, else 24, else the
    /// last 10 readings regardless of age. Returns `None` when no
    /// window holds two points or the window has no time variance.
    pub fn compute(readings: &[Reading]) -> Option<Trend> {
        if readings.len() < 2 {
            return None;
        }

        let mut sorted: Vec<&Reading> = readings.iter().collect();
        sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let window = Self::select_window(&sorted);
        if window.len() < 2 {
            return None;
        }

        let window_start = window[0].timestamp;
        let (slope_per_ms, intercept) = Self::least_squares(window, window_start)?;
        let slope_per_hour = slope_per_ms * MS_PER_HOUR;

        let rate_of_change_per_hour = Self::rate_of_change(window);
        let prediction = Self::predict(window, window_start, slope_per_hour, intercept);
        let ema = Self::ema_series(&sorted);

        Some(Trend {
            slope_per_hour,
            intercept,
            window_start,
            rate_of_change_per_hour,
            prediction: Some(prediction),
            ema,
        })
    }

    /// Pick the regression window from an ascending-sorted series
    fn select_window<'a>(sorted: &'a [&'a Reading]) -> &'a [&'a Reading] {
        let newest = sorted[sorted.len() - 1].timestamp;

        for hours in [6, 12, 24] {
            let cutoff = newest - Duration::hours(hours);
            let start = sorted.partition_point(|r| r.timestamp < cutoff);
            let window = &sorted[start..];
            if window.len() >= 2 {
                return window;
            }
        }

        // Sparse history: fall back to the last 10 readings by index
        let start = sorted.len().saturating_sub(10);
        &sorted[start..]
    }

    /// Ordinary least squares of value against elapsed milliseconds
    ///
    /// Returns `None` when the denominator collapses, which happens
    /// when all window timestamps coincide.
    fn least_squares(
        window: &[&Reading],
        window_start: chrono::DateTime<chrono::Utc>,
    ) -> Option<(f64, f64)> {
        let n = window.len() as f64;
        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        let mut sum_xy = 0.0;
        let mut sum_x2 = 0.0;

        for r in window {
            let x = (r.timestamp - window_start).num_milliseconds() as f64;
            let y = r.value;
            sum_x += x;
            sum_y += y;
            sum_xy += x * y;
            sum_x2 += x * x;
        }

        let denominator = n * sum_x2 - sum_x * sum_x;
        if denominator.abs() < DEGENERACY_EPSILON {
            return None;
        }

        let slope = (n * sum_xy - sum_x * sum_y) / denominator;
        let intercept = (sum_y - slope * sum_x) / n;
        Some((slope, intercept))
    }

    /// Instantaneous rate of change from the last two window points
    fn rate_of_change(window: &[&Reading]) -> f64 {
        let last = window[window.len() - 1];
        let prev = window[window.len() - 2];
        let delta_hours =
            (last.timestamp - prev.timestamp).num_milliseconds() as f64 / MS_PER_HOUR;
        if delta_hours <= 0.0 {
            0.0
        } else {
            (last.value - prev.value) / delta_hours
        }
    }

    /// Project the regression one hour past the newest reading
    ///
    /// The slope is clamped before projection so a noisy fit cannot
    /// forecast a physiologically impossible excursion, and the
    /// projected value is clamped to the meter-plausible range.
    fn predict(
        window: &[&Reading],
        window_start: chrono::DateTime<chrono::Utc>,
        slope_per_hour: f64,
        intercept: f64,
    ) -> Prediction {
        let newest = window[window.len() - 1].timestamp;
        let at = newest + Duration::minutes(PREDICTION_HORIZON_MINUTES);

        let clamped_slope_per_ms = slope_per_hour
            .clamp(-MAX_PLAUSIBLE_SLOPE_PER_HOUR, MAX_PLAUSIBLE_SLOPE_PER_HOUR)
            / MS_PER_HOUR;
        let elapsed_ms = (at - window_start).num_milliseconds() as f64;
        let value =
            (intercept + clamped_slope_per_ms * elapsed_ms).clamp(PREDICTION_FLOOR, PREDICTION_CEILING);

        Prediction { at, value }
    }

    /// EMA over the full chronological series, one entry per reading
    fn ema_series(sorted: &[&Reading]) -> Vec<f64> {
        let mut ema = Vec::with_capacity(sorted.len());
        for r in sorted {
            let next = match ema.last() {
                None => r.value,
                Some(prev) => EMA_ALPHA * r.value + (1.0 - EMA_ALPHA) * prev,
            };
            ema.push(next);
        }
        ema
    }
}
