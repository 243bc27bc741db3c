//! Wall-clock time parsing and daily window membership
//!
//! Every consumer of "HH:MM" strings and every window-membership check
//! goes through this module, so the boundary rules live in exactly one
//! place.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::TimeParseError;

pub const MINUTES_PER_DAY: u32 = 1440;

/// A validated "HH:MM" wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTime {
    pub hour: u32,
    pub minute: u32,
}

impl ParsedTime {
    /// Parse a strict "HH:MM" string
    ///
    /// Malformed input is an error, never a default: a bad stored time
    /// means corrupted settings, and the caller decides whether to skip
    /// the setting or prompt a repair.
    pub fn parse(input: &str) -> Result<Self, TimeParseError> {
        let (h, m) = input.split_once(':').ok_or_else(|| TimeParseError::Malformed {
            input: input.to_string(),
        })?;

        // Strictly two digits per component: "8:30" is malformed
        let parse_component = |s: &str| -> Result<u32, TimeParseError> {
            if s.len() != 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(TimeParseError::Malformed {
                    input: input.to_string(),
                });
            }
            Ok(s.parse::<u32>().unwrap_or(0))
        };

        let hour = parse_component(h)?;
        let minute = parse_component(m)?;

        if hour > 23 {
            return Err(TimeParseError::OutOfRange {
                input: input.to_string(),
                component: "hour",
                value: hour,
            });
        }
        if minute > 59 {
            return Err(TimeParseError::OutOfRange {
                input: input.to_string(),
                component: "minute",
                value: minute,
            });
        }

        Ok(ParsedTime { hour, minute })
    }

    /// Minutes since midnight
    pub fn minutes_of_day(&self) -> u32 {
        self.hour * 60 + self.minute
    }

    pub fn to_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0)
            .unwrap_or(NaiveTime::MIN)
    }
}

impl std::fmt::Display for ParsedTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Is `now` inside the daily window `[start, end]`?
///
/// The end bound is treated as `end + 1` minute so the end minute
/// itself is inclusive; a reminder window ending at 22:00 still covers
/// a tick landing exactly on 22:00. Windows with `start > end` cross
/// midnight and wrap.
pub fn in_window(start: ParsedTime, end: ParsedTime, now: NaiveTime) -> bool {
    let now_min = now.hour() * 60 + now.minute();
    in_window_minutes(start.minutes_of_day(), end.minutes_of_day(), now_min)
}

/// String-bound form of [`in_window`] for callers holding raw setting
/// fields; parse failures surface instead of defaulting
pub fn in_window_str(start: &str, end: &str, now: NaiveTime) -> Result<bool, TimeParseError> {
    let start = ParsedTime::parse(start)?;
    let end = ParsedTime::parse(end)?;
    Ok(in_window(start, end, now))
}

/// Minutes-since-midnight form of [`in_window`]
pub fn in_window_minutes(start: u32, end: u32, now: u32) -> bool {
    let end_incl = end + 1;
    if start <= end {
        start <= now && now < end_incl
    } else {
        now >= start || now < end_incl
    }
}
