//! CSV import of glucose readings
//!
//! Accepts `timestamp,value[,comment]` rows with RFC 3339 timestamps
//! or the plain `YYYY-MM-DD HH:MM[:SS]` form exporters commonly write.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use csv::ReaderBuilder;
use std::path::Path;

use crate::models::Reading;

/// CSV reading importer
pub struct CsvImporter;

impl CsvImporter {
    /// Import readings from a CSV file
    pub fn import_file<P: AsRef<Path>>(path: P) -> Result<Vec<Reading>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path.as_ref())
            .with_context(|| format!("Failed to open {}", path.as_ref().display()))?;

        let mut readings = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("Bad CSV record at row {}", i + 2))?;
            let reading = Self::parse_record(&record)
                .with_context(|| format!("Bad reading at row {}", i + 2))?;
            readings.push(reading);
        }
        Ok(readings)
    }

    fn parse_record(record: &csv::StringRecord) -> Result<Reading> {
        let ts_field = record
            .get(0)
            .ok_or_else(|| anyhow!("missing timestamp column"))?;
        let value_field = record
            .get(1)
            .ok_or_else(|| anyhow!("missing value column"))?;

        let timestamp = Self::parse_timestamp(ts_field)?;
        let value: f64 = value_field
            .trim()
            .parse()
            .with_context(|| format!("invalid glucose value {:?}", value_field))?;

        let mut reading = Reading::new(timestamp, value);
        if let Some(comment) = record.get(2) {
            if !comment.trim().is_empty() {
                reading = reading.with_comment(comment.trim());
            }
        }
        Ok(reading)
    }

    fn parse_timestamp(field: &str) -> Result<DateTime<Utc>> {
        let field = field.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(field) {
            return Ok(ts.with_timezone(&Utc));
        }
        for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(field, format) {
                return Ok(naive.and_utc());
            }
        }
        Err(anyhow!("unrecognized timestamp {:?}", field))
    }
}
