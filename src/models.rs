use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single glucose measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Moment the measurement was taken
    pub timestamp: DateTime<Utc>,

    /// Glucose value in mmol/L
    pub value: f64,

    /// Optional free-text note ("after lunch", sensor id, ...)
    pub comment: Option<String>,
}

impl Reading {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Reading {
            timestamp,
            value,
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Band boundaries for range classification, in mmol/L
///
/// Invariant: `very_low < low < high < very_high`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeThresholds {
    /// Upper bound of the very-low band
    pub very_low: f64,

    /// Upper bound of the low band (lower bound of in-range)
    pub low: f64,

    /// Upper bound of the in-range band
    pub high: f64,

    /// Upper bound of the high band
    pub very_high: f64,
}

impl Default for RangeThresholds {
    fn default() -> Self {
        RangeThresholds {
            very_low: 3.0,
            low: 4.0,
            high: 10.0,
            very_high: 13.9,
        }
    }
}

/// Duration-weighted share of time spent in each band, in percent
///
/// All fields are non-negative and sum to 100 whenever the underlying
/// reading set spans a non-zero duration; otherwise all fields are 0.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TirResult {
    pub very_low: f64,
    pub low: f64,
    pub in_range: f64,
    pub high: f64,
    pub very_high: f64,
}

impl TirResult {
    /// Combined share below the in-range band
    pub fn below_range(&self) -> f64 {
        self.very_low + self.low
    }

    /// Combined share above the in-range band
    pub fn above_range(&self) -> f64 {
        self.high + self.very_high
    }
}

/// Short-horizon projection derived from the fitted trend
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Instant the projection applies to
    pub at: DateTime<Utc>,

    /// Projected glucose value, clamped to a plausible range
    pub value: f64,
}

/// Result of fitting a linear model to a recent window of readings
///
/// Recomputed wholesale on every data change; never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    /// Regression slope in mmol/L per hour
    pub slope_per_hour: f64,

    /// Regression intercept at `window_start`, in mmol/L
    pub intercept: f64,

    /// Earliest timestamp in the regression window (regression origin)
    pub window_start: DateTime<Utc>,

    /// Instantaneous rate of change from the last two window points,
    /// in mmol/L per hour
    pub rate_of_change_per_hour: f64,

    /// Projected value one hour past the newest reading, if derivable
    pub prediction: Option<Prediction>,

    /// Exponential moving average over the full reading series, one
    /// entry per input reading in chronological order
    pub ema: Vec<f64>,
}

impl Trend {
    /// Regression slope in mmol/L per millisecond, the unit the
    /// crossing-time solver works in
    pub fn slope_per_ms(&self) -> f64 {
        self.slope_per_hour / 3_600_000.0
    }
}

/// Recurrence rule for a reminder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReminderRule {
    /// Fire once per day at a fixed wall-clock time ("HH:MM")
    Daily { time: String },

    /// Fire every `every_minutes` inside a daily window, aligned to the
    /// window start; the window may cross midnight
    Interval {
        every_minutes: u32,
        window_start: String,
        window_end: String,
    },
}

/// A user-configured reminder as stored by the settings source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderSetting {
    /// Stable identifier; also the basis of the setting's job key
    pub id: Uuid,

    /// When the reminder should fire
    #[serde(flatten)]
    pub rule: ReminderRule,

    /// Message delivered to the notification facility on firing
    pub message: String,

    /// Disabled settings keep their configuration but never schedule
    pub enabled: bool,
}

impl ReminderSetting {
    pub fn daily(time: impl Into<String>, message: impl Into<String>) -> Self {
        ReminderSetting {
            id: Uuid::new_v4(),
            rule: ReminderRule::Daily { time: time.into() },
            message: message.into(),
            enabled: true,
        }
    }

    pub fn interval(
        every_minutes: u32,
        window_start: impl Into<String>,
        window_end: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ReminderSetting {
            id: Uuid::new_v4(),
            rule: ReminderRule::Interval {
                every_minutes,
                window_start: window_start.into(),
                window_end: window_end.into(),
            },
            message: message.into(),
            enabled: true,
        }
    }

    /// Job-queue key for this setting; one live job per setting
    pub fn job_key(&self) -> String {
        format!("reminder-{}", self.id)
    }
}

/// Scalar preferences for trend-derived threshold alerts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertPrefs {
    /// Master switch for trend alerts
    pub trend_alerts_enabled: bool,

    /// Predicted-crossing threshold for heading-low alerts, mmol/L
    pub trend_low_threshold: f64,

    /// Predicted-crossing threshold for heading-high alerts, mmol/L
    pub trend_high_threshold: f64,
}

impl Default for AlertPrefs {
    fn default() -> Self {
        AlertPrefs {
            trend_alerts_enabled: true,
            trend_low_threshold: 4.0,
            trend_high_threshold: 10.0,
        }
    }
}

/// Scalar preferences for the post-meal check reminder
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PostMealPrefs {
    pub enabled: bool,

    /// Minutes after a saved reading at which to prompt a re-check
    pub delay_minutes: u32,
}

impl Default for PostMealPrefs {
    fn default() -> Self {
        PostMealPrefs {
            enabled: false,
            delay_minutes: 120,
        }
    }
}
