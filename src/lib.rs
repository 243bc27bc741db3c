// Library interface for the glucors analytics and scheduling core
// This allows integration tests to access the core functionality

pub mod alerts;
pub mod bands;
pub mod config;
pub mod error;
pub mod import;
pub mod jobs;
pub mod logging;
pub mod models;
pub mod scheduler;
pub mod timewindow;
pub mod tir;
pub mod trend;

// Re-export commonly used types for convenience
pub use alerts::ThresholdAlertPlanner;
pub use bands::{Band, BandClassifier};
pub use config::AppConfig;
pub use error::{GlucorsError, Result};
pub use jobs::{InMemoryJobQueue, JobPayload, JobQueue, ScheduledJob};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use models::*;
pub use scheduler::{NextFire, ReminderScheduler};
pub use timewindow::{in_window, ParsedTime};
pub use tir::TirCalculator;
pub use trend::TrendCalculator;
