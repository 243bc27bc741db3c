//! Unified error hierarchy for glucors
//!
//! Expected, recoverable conditions (too little data, no schedulable
//! tick) are modelled as `Option`/sentinel values in their modules;
//! everything here is a genuine failure the caller must handle.

use thiserror::Error;

/// Top-level error type for all glucors operations
#[derive(Debug, Error)]
pub enum GlucorsError {
    /// Wall-clock time string parsing errors
    #[error("time parse error: {0}")]
    TimeParse(#[from] TimeParseError),

    /// Scheduling errors
    #[error("schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    /// Analytics calculation errors
    #[error("calculation error: {0}")]
    Calculation(#[from] CalculationError),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors parsing "HH:MM" wall-clock strings
///
/// Parse failures are surfaced loudly rather than defaulting to some
/// fallback time; a malformed string in a stored setting means the
/// data needs repair, and a silent default would mask that.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    /// Not of the form "HH:MM"
    #[error("malformed time string {input:?}, expected \"HH:MM\"")]
    Malformed { input: String },

    /// Parsed but outside 00:00..=23:59
    #[error("time component out of range in {input:?}: {component}={value}")]
    OutOfRange {
        input: String,
        component: &'static str,
        value: u32,
    },
}

/// Errors in reminder scheduling
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// Interval length must be positive
    #[error("invalid interval: {minutes} minutes")]
    InvalidInterval { minutes: u32 },

    /// A stored time string failed to parse
    #[error("bad time in setting {setting}: {source}")]
    BadSettingTime {
        setting: String,
        #[source]
        source: TimeParseError,
    },
}

/// Errors in analytics calculations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalculationError {
    /// Threshold band configuration violates ordering
    #[error("thresholds not strictly increasing: {very_low} / {low} / {high} / {very_high}")]
    InvalidThresholds {
        very_low: f64,
        low: f64,
        high: f64,
        very_high: f64,
    },
}

/// Result type alias for glucors operations
pub type Result<T> = std::result::Result<T, GlucorsError>;
