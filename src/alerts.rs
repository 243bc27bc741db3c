//! Trend-derived threshold alerts
//!
//! Projects the fitted trend line forward to find when it crosses the
//! configured low or high threshold, and keeps the job queue holding
//! exactly the alerts that projection supports: an immediate
//! heads-up plus a pre-emptive warning shortly before the crossing.
//! Replanned after every saved reading, since each reading changes the
//! trend; the keyed replace-batch keeps stale alert pairs from
//! surviving a replan.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::jobs::{JobPayload, JobQueue, ScheduledJob, KEY_TREND_HIGH, KEY_TREND_LOW};
use crate::models::{AlertPrefs, Trend};

/// Lead time of the pre-emptive warning before the predicted crossing
const PRE_EMPTIVE_LEAD_MINUTES: i64 = 15;

/// Direction a trend alert guards against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Low,
    High,
}

impl Direction {
    fn key(&self) -> &'static str {
        match self {
            Direction::Low => KEY_TREND_LOW,
            Direction::High => KEY_TREND_HIGH,
        }
    }
}

/// Plans threshold-crossing alerts from a fitted trend
pub struct ThresholdAlertPlanner;

impl ThresholdAlertPlanner {
    /// Reconcile both alert keys against the current trend
    ///
    /// A falling trend can only cross the low threshold and a rising
    /// trend only the high one; whichever direction the slope does not
    /// support gets its key cancelled, as does a crossing already in
    /// the past. Call with `None` (no computable trend) to clear both.
    pub fn plan<Q: JobQueue>(
        trend: Option<&Trend>,
        prefs: &AlertPrefs,
        now: DateTime<Utc>,
        queue: &mut Q,
    ) {
        let trend = match (prefs.trend_alerts_enabled, trend) {
            (true, Some(t)) => t,
            _ => {
                queue.cancel(KEY_TREND_LOW);
                queue.cancel(KEY_TREND_HIGH);
                return;
            }
        };

        let slope_per_ms = trend.slope_per_ms();

        if slope_per_ms < 0.0 {
            Self::plan_direction(
                Direction::Low,
                trend,
                prefs.trend_low_threshold,
                slope_per_ms,
                now,
                queue,
            );
            queue.cancel(KEY_TREND_HIGH);
        } else if slope_per_ms > 0.0 {
            Self::plan_direction(
                Direction::High,
                trend,
                prefs.trend_high_threshold,
                slope_per_ms,
                now,
                queue,
            );
            queue.cancel(KEY_TREND_LOW);
        } else {
            queue.cancel(KEY_TREND_LOW);
            queue.cancel(KEY_TREND_HIGH);
        }
    }

    fn plan_direction<Q: JobQueue>(
        direction: Direction,
        trend: &Trend,
        threshold: f64,
        slope_per_ms: f64,
        now: DateTime<Utc>,
        queue: &mut Q,
    ) {
        let key = direction.key();

        let crossing = match Self::crossing_time(trend, threshold, slope_per_ms) {
            Some(t) => t,
            None => {
                queue.cancel(key);
                return;
            }
        };

        if crossing <= now {
            // Already there (or past); a prediction-based warning would
            // only duplicate what the current reading shows
            queue.cancel(key);
            return;
        }

        let verb = match direction {
            Direction::Low => "low",
            Direction::High => "high",
        };
        let mut batch = vec![ScheduledJob {
            key: key.to_string(),
            fire_at: now,
            payload: JobPayload::TrendAlert {
                message: format!(
                    "Glucose heading {}, expected to cross {:.1} at {}",
                    verb,
                    threshold,
                    crossing.format("%H:%M")
                ),
                expected_at: crossing,
            },
        }];

        let pre_emptive_at = crossing - Duration::minutes(PRE_EMPTIVE_LEAD_MINUTES);
        if pre_emptive_at > now {
            batch.push(ScheduledJob {
                key: key.to_string(),
                fire_at: pre_emptive_at,
                payload: JobPayload::TrendAlert {
                    message: format!(
                        "Expected to go {} around {}, consider acting now",
                        verb,
                        crossing.format("%H:%M")
                    ),
                    expected_at: crossing,
                },
            });
        }

        debug!(key = %key, crossing = %crossing, jobs = batch.len(), "trend alert planned");
        queue.submit_batch(key, batch);
    }

    /// Solve the regression line for the instant it reaches `threshold`
    ///
    /// A near-flat slope puts the crossing astronomically far out;
    /// `checked_add_signed` turns anything past the representable
    /// calendar into "no supportable crossing" rather than a panic.
    fn crossing_time(trend: &Trend, threshold: f64, slope_per_ms: f64) -> Option<DateTime<Utc>> {
        let elapsed_ms = (threshold - trend.intercept) / slope_per_ms;
        if !elapsed_ms.is_finite() {
            return None;
        }
        trend
            .window_start
            .checked_add_signed(Duration::milliseconds(elapsed_ms as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::InMemoryJobQueue;
    use crate::models::{Reading, Trend};
    use crate::trend::TrendCalculator;
    use chrono::{TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    /// Trend falling (or rising) at `slope` mmol/L/h from `start_value`
    fn synthetic_trend(start_value: f64, slope: f64) -> Trend {
        let readings = vec![
            Reading::new(t0(), start_value),
            Reading::new(t0() + Duration::hours(1), start_value + slope),
        ];
        TrendCalculator::compute(&readings).unwrap()
    }

    #[test]
    fn falling_trend_schedules_low_alert_pair() {
        let mut queue = InMemoryJobQueue::new();
        // 8.0 falling 1.0/h crosses 4.0 four hours after window start
        let trend = synthetic_trend(8.0, -1.0);
        let now = t0() + Duration::hours(1);
        ThresholdAlertPlanner::plan(Some(&trend), &AlertPrefs::default(), now, &mut queue);

        let pending = queue.pending(KEY_TREND_LOW);
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].fire_at, now);
        assert_eq!(
            pending[1].fire_at,
            t0() + Duration::hours(4) - Duration::minutes(15)
        );
        assert!(queue.pending(KEY_TREND_HIGH).is_empty());
    }

    #[test]
    fn rising_trend_schedules_high_alert_pair() {
        let mut queue = InMemoryJobQueue::new();
        // 6.0 rising 2.0/h crosses 10.0 two hours after window start
        let trend = synthetic_trend(6.0, 2.0);
        let now = t0() + Duration::hours(1);
        ThresholdAlertPlanner::plan(Some(&trend), &AlertPrefs::default(), now, &mut queue);

        let pending = queue.pending(KEY_TREND_HIGH);
        assert_eq!(pending.len(), 2);
        assert_eq!(
            pending[1].fire_at,
            t0() + Duration::hours(2) - Duration::minutes(15)
        );
        assert!(queue.pending(KEY_TREND_LOW).is_empty());
    }

    #[test]
    fn imminent_crossing_drops_the_pre_emptive_job() {
        let mut queue = InMemoryJobQueue::new();
        // 4.5 falling 4.0/h crosses 4.0 seven and a half minutes in:
        // less than the 15-minute lead, so only the immediate job fits
        let trend = synthetic_trend(4.5, -4.0);
        let now = t0();
        ThresholdAlertPlanner::plan(Some(&trend), &AlertPrefs::default(), now, &mut queue);

        let pending = queue.pending(KEY_TREND_LOW);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].fire_at, now);
    }

    #[test]
    fn past_crossing_cancels_instead_of_alerting() {
        let mut queue = InMemoryJobQueue::new();
        let trend = synthetic_trend(8.0, -1.0);
        // Pre-existing alert pair from an earlier replan
        ThresholdAlertPlanner::plan(
            Some(&trend),
            &AlertPrefs::default(),
            t0() + Duration::hours(1),
            &mut queue,
        );
        assert!(!queue.pending(KEY_TREND_LOW).is_empty());

        // Five hours in, the predicted crossing is behind us
        ThresholdAlertPlanner::plan(
            Some(&trend),
            &AlertPrefs::default(),
            t0() + Duration::hours(5),
            &mut queue,
        );
        assert!(queue.pending(KEY_TREND_LOW).is_empty());
    }

    #[test]
    fn flat_trend_cancels_both_directions() {
        let mut queue = InMemoryJobQueue::new();
        let falling = synthetic_trend(8.0, -1.0);
        let rising = synthetic_trend(6.0, 2.0);
        let now = t0() + Duration::hours(1);
        ThresholdAlertPlanner::plan(Some(&falling), &AlertPrefs::default(), now, &mut queue);
        ThresholdAlertPlanner::plan(Some(&rising), &AlertPrefs::default(), now, &mut queue);

        let flat = synthetic_trend(6.0, 0.0);
        ThresholdAlertPlanner::plan(Some(&flat), &AlertPrefs::default(), now, &mut queue);
        assert!(queue.pending(KEY_TREND_LOW).is_empty());
        assert!(queue.pending(KEY_TREND_HIGH).is_empty());
    }

    #[test]
    fn near_flat_slope_cancels_instead_of_panicking() {
        let mut queue = InMemoryJobQueue::new();
        let now = t0() + Duration::hours(1);
        // Stale pair from an earlier, steeper trend
        ThresholdAlertPlanner::plan(
            Some(&synthetic_trend(6.0, 2.0)),
            &AlertPrefs::default(),
            now,
            &mut queue,
        );
        assert!(!queue.pending(KEY_TREND_HIGH).is_empty());

        // A nanoscale rise over an hour is a valid trend whose crossing
        // lies millennia out, far past the representable calendar
        let barely_rising = synthetic_trend(5.0, 1e-9);
        assert!(barely_rising.slope_per_ms() > 0.0);
        ThresholdAlertPlanner::plan(Some(&barely_rising), &AlertPrefs::default(), now, &mut queue);
        assert!(queue.pending(KEY_TREND_HIGH).is_empty());

        let barely_falling = synthetic_trend(5.0, -1e-12);
        ThresholdAlertPlanner::plan(Some(&barely_falling), &AlertPrefs::default(), now, &mut queue);
        assert!(queue.pending(KEY_TREND_LOW).is_empty());
    }

    #[test]
    fn disabled_prefs_or_missing_trend_clear_everything() {
        let mut queue = InMemoryJobQueue::new();
        let trend = synthetic_trend(8.0, -1.0);
        let now = t0() + Duration::hours(1);
        ThresholdAlertPlanner::plan(Some(&trend), &AlertPrefs::default(), now, &mut queue);
        assert!(!queue.pending(KEY_TREND_LOW).is_empty());

        let off = AlertPrefs {
            trend_alerts_enabled: false,
            ..AlertPrefs::default()
        };
        ThresholdAlertPlanner::plan(Some(&trend), &off, now, &mut queue);
        assert!(queue.pending(KEY_TREND_LOW).is_empty());

        ThresholdAlertPlanner::plan(Some(&trend), &AlertPrefs::default(), now, &mut queue);
        ThresholdAlertPlanner::plan(None, &AlertPrefs::default(), now, &mut queue);
        assert!(queue.pending(KEY_TREND_LOW).is_empty());
    }

    #[test]
    fn replan_replaces_the_previous_pair() {
        let mut queue = InMemoryJobQueue::new();
        let now = t0() + Duration::hours(1);
        ThresholdAlertPlanner::plan(
            Some(&synthetic_trend(8.0, -1.0)),
            &AlertPrefs::default(),
            now,
            &mut queue,
        );
        ThresholdAlertPlanner::plan(
            Some(&synthetic_trend(9.0, -0.5)),
            &AlertPrefs::default(),
            now,
            &mut queue,
        );
        // Still exactly one pair, reflecting the newer, slower fall
        let pending = queue.pending(KEY_TREND_LOW);
        assert_eq!(pending.len(), 2);
        assert_eq!(
            pending[1].fire_at,
            t0() + Duration::hours(10) - Duration::minutes(15)
        );
    }
}
