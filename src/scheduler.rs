//! Reminder scheduling over a one-shot job facility
//!
//! The host gives us single-shot timed jobs only, so recurrence is a
//! state machine: compute the next fire time, submit it under the
//! setting's key, and when it fires, compute and submit the next one
//! from inside the firing handler. Initial arming, re-arming, and the
//! CLI schedule preview all call the same two next-fire computations
//! below; there is deliberately no second copy of this math anywhere.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::error::ScheduleError;
use crate::jobs::{JobPayload, JobQueue, ScheduledJob, KEY_POST_MEAL};
use crate::models::{PostMealPrefs, Reading, ReminderRule, ReminderSetting};
use crate::timewindow::{in_window, ParsedTime, MINUTES_PER_DAY};

/// Outcome of a next-fire computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextFire {
    /// Fire at this instant
    At(DateTime<Utc>),

    /// No tick lands inside the window within a full day; the setting
    /// cannot be scheduled as configured
    Unschedulable,
}

impl NextFire {
    pub fn fire_at(&self) -> Option<DateTime<Utc>> {
        match self {
            NextFire::At(t) => Some(*t),
            NextFire::Unschedulable => None,
        }
    }

    /// Delay until firing, floored at zero
    pub fn delay_from(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.fire_at()
            .map(|t| (t - now).max(Duration::zero()))
    }
}

/// Single implementation of the reminder fire-time rules
pub struct ReminderScheduler;

impl ReminderScheduler {
    /// Next fire time for a daily reminder
    ///
    /// Today's candidate at the given wall-clock time, pushed a day out
    /// if it is not strictly in the future.
    pub fn next_daily_fire(time: ParsedTime, now: DateTime<Utc>) -> DateTime<Utc> {
        let candidate = now.date_naive().and_time(time.to_naive_time()).and_utc();
        if candidate > now {
            candidate
        } else {
            candidate + Duration::days(1)
        }
    }

    /// Next fire time for a windowed interval reminder
    ///
    /// Ticks are aligned to a grid anchored at the most recent window
    /// start at or before `now`, so editing-unrelated calls always see
    /// the same grid. The first tick strictly after `now` that lands in
    /// the window wins; if a full day of ticks misses the window the
    /// setting is unschedulable.
    pub fn next_interval_fire(
        every_minutes: u32,
        window_start: ParsedTime,
        window_end: ParsedTime,
        now: DateTime<Utc>,
    ) -> Result<NextFire, ScheduleError> {
        if every_minutes == 0 {
            return Err(ScheduleError::InvalidInterval {
                minutes: every_minutes,
            });
        }

        let mut anchor = now
            .date_naive()
            .and_time(window_start.to_naive_time())
            .and_utc();
        if anchor > now {
            anchor -= Duration::days(1);
        }

        let step = Duration::minutes(every_minutes as i64);
        let mut cursor = anchor;
        while cursor <= now {
            cursor += step;
        }

        let max_ticks = (MINUTES_PER_DAY + every_minutes - 1) / every_minutes + 1;
        for _ in 0..max_ticks {
            if in_window(window_start, window_end, cursor.time()) {
                return Ok(NextFire::At(cursor));
            }
            cursor += step;
        }

        Ok(NextFire::Unschedulable)
    }

    /// Next fire time for a setting, whatever its rule
    pub fn next_fire(
        setting: &ReminderSetting,
        now: DateTime<Utc>,
    ) -> Result<NextFire, ScheduleError> {
        match &setting.rule {
            ReminderRule::Daily { time } => {
                let time = Self::parse_setting_time(setting, time)?;
                Ok(NextFire::At(Self::next_daily_fire(time, now)))
            }
            ReminderRule::Interval {
                every_minutes,
                window_start,
                window_end,
            } => {
                let start = Self::parse_setting_time(setting, window_start)?;
                let end = Self::parse_setting_time(setting, window_end)?;
                Self::next_interval_fire(*every_minutes, start, end, now)
            }
        }
    }

    /// Compute and submit the setting's next fire under its key
    ///
    /// Disabled settings cancel their key instead. Returns the
    /// submitted fire time, or `None` when nothing was scheduled.
    pub fn arm<Q: JobQueue>(
        setting: &ReminderSetting,
        now: DateTime<Utc>,
        queue: &mut Q,
    ) -> Result<Option<DateTime<Utc>>, ScheduleError> {
        let key = setting.job_key();

        if !setting.enabled {
            queue.cancel(&key);
            debug!(key = %key, "reminder disabled, job cancelled");
            return Ok(None);
        }

        match Self::next_fire(setting, now)? {
            NextFire::At(fire_at) => {
                queue.submit(ScheduledJob {
                    key: key.clone(),
                    fire_at,
                    payload: JobPayload::Reminder {
                        setting_id: setting.id,
                        message: setting.message.clone(),
                    },
                });
                debug!(key = %key, fire_at = %fire_at, "reminder armed");
                Ok(Some(fire_at))
            }
            NextFire::Unschedulable => {
                // No valid tick exists; stop recurring rather than spin
                queue.cancel(&key);
                warn!(key = %key, "reminder window admits no tick, not rescheduled");
                Ok(None)
            }
        }
    }

    /// Re-arm after a firing, from inside the firing handler
    ///
    /// Uses the fired instant as "now", which guarantees the next fire
    /// is strictly later and closes the immediate-refire loop. An
    /// unschedulable re-arm stops the recurrence (logged by [`arm`])
    /// without failing the handler.
    pub fn on_fired<Q: JobQueue>(
        setting: &ReminderSetting,
        fired_at: DateTime<Utc>,
        queue: &mut Q,
    ) -> Result<Option<DateTime<Utc>>, ScheduleError> {
        Self::arm(setting, fired_at, queue)
    }

    /// Cancel the setting's pending job (disable or delete)
    pub fn cancel<Q: JobQueue>(setting: &ReminderSetting, queue: &mut Q) {
        queue.cancel(&setting.job_key());
    }

    /// Schedule or cancel the post-meal check for a just-saved reading
    pub fn plan_post_meal<Q: JobQueue>(
        reading: &Reading,
        prefs: &PostMealPrefs,
        queue: &mut Q,
    ) {
        if !prefs.enabled {
            queue.cancel(KEY_POST_MEAL);
            return;
        }

        let fire_at = reading.timestamp + Duration::minutes(prefs.delay_minutes as i64);
        queue.submit(ScheduledJob {
            key: KEY_POST_MEAL.to_string(),
            fire_at,
            payload: JobPayload::PostMealCheck {
                message: format!(
                    "Time to check your glucose ({} min since last reading)",
                    prefs.delay_minutes
                ),
            },
        });
    }

    fn parse_setting_time(
        setting: &ReminderSetting,
        input: &str,
    ) -> Result<ParsedTime, ScheduleError> {
        ParsedTime::parse(input).map_err(|source| ScheduleError::BadSettingTime {
            setting: setting.id.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::InMemoryJobQueue;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
    }

    fn p(s: &str) -> ParsedTime {
        ParsedTime::parse(s).unwrap()
    }

    #[test]
    fn daily_target_later_today_fires_today() {
        let now = at(9, 30);
        let fire = ReminderScheduler::next_daily_fire(p("21:00"), now);
        assert_eq!(fire, at(21, 0));
        assert_eq!(fire - now, Duration::minutes(11 * 60 + 30));
    }

    #[test]
    fn daily_target_already_past_fires_tomorrow() {
        let now = at(9, 30);
        let fire = ReminderScheduler::next_daily_fire(p("08:00"), now);
        assert_eq!(fire, at(8, 0) + Duration::days(1));
        assert_eq!(fire - now, Duration::days(1) - Duration::minutes(90));
    }

    #[test]
    fn daily_target_exactly_now_fires_tomorrow() {
        let now = at(8, 0);
        let fire = ReminderScheduler::next_daily_fire(p("08:00"), now);
        assert_eq!(fire, at(8, 0) + Duration::days(1));
    }

    #[test]
    fn delay_is_floored_at_zero() {
        let now = at(9, 30);
        assert_eq!(
            NextFire::At(at(10, 0)).delay_from(now),
            Some(Duration::minutes(30))
        );
        // A fire time the host is late to dispatch yields zero, not a
        // negative delay
        assert_eq!(
            NextFire::At(at(9, 0)).delay_from(now),
            Some(Duration::zero())
        );
        assert_eq!(NextFire::Unschedulable.delay_from(now), None);
    }

    #[test]
    fn interval_fires_on_window_grid() {
        // Window 08:00-22:00 every 90 min; at 09:40 the next grid tick
        // is 11:00 (08:00 + 2*90min)
        let next =
            ReminderScheduler::next_interval_fire(90, p("08:00"), p("22:00"), at(9, 40)).unwrap();
        assert_eq!(next, NextFire::At(at(11, 0)));
    }

    #[test]
    fn interval_outside_window_waits_for_window_start() {
        // At 23:10 the 60-min grid keeps ticking through the night but
        // only the 08:00 tick lands back inside the window
        let next =
            ReminderScheduler::next_interval_fire(60, p("08:00"), p("22:00"), at(23, 10)).unwrap();
        let tomorrow = at(8, 0) + Duration::days(1);
        assert_eq!(next, NextFire::At(tomorrow));
    }

    #[test]
    fn interval_tick_on_end_minute_still_fires() {
        // 22:00 is the inclusive end minute; a tick landing exactly
        // there must fire rather than roll to tomorrow
        let next =
            ReminderScheduler::next_interval_fire(120, p("10:00"), p("22:00"), at(21, 30)).unwrap();
        assert_eq!(next, NextFire::At(at(22, 0)));
    }

    #[test]
    fn interval_overnight_window_ticks_across_midnight() {
        let next =
            ReminderScheduler::next_interval_fire(60, p("22:00"), p("06:00"), at(23, 30)).unwrap();
        let midnight = at(0, 0) + Duration::days(1);
        assert_eq!(next, NextFire::At(midnight));
    }

    #[test]
    fn interval_zero_minutes_is_an_error() {
        let err = ReminderScheduler::next_interval_fire(0, p("08:00"), p("22:00"), at(9, 0));
        assert!(matches!(
            err,
            Err(ScheduleError::InvalidInterval { minutes: 0 })
        ));
    }

    #[test]
    fn arm_submits_under_setting_key() {
        let mut queue = InMemoryJobQueue::new();
        let setting = ReminderSetting::daily("21:00", "evening check");
        let fired = ReminderScheduler::arm(&setting, at(9, 0), &mut queue).unwrap();
        assert_eq!(fired, Some(at(21, 0)));
        let pending = queue.pending(&setting.job_key());
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payload.message(), "evening check");
    }

    #[test]
    fn arm_disabled_setting_cancels_key() {
        let mut queue = InMemoryJobQueue::new();
        let mut setting = ReminderSetting::daily("21:00", "evening check");
        ReminderScheduler::arm(&setting, at(9, 0), &mut queue).unwrap();

        setting.enabled = false;
        let fired = ReminderScheduler::arm(&setting, at(9, 0), &mut queue).unwrap();
        assert_eq!(fired, None);
        assert!(queue.pending(&setting.job_key()).is_empty());
    }

    #[test]
    fn arm_replaces_rather_than_duplicates() {
        let mut queue = InMemoryJobQueue::new();
        let setting = ReminderSetting::daily("21:00", "evening check");
        ReminderScheduler::arm(&setting, at(9, 0), &mut queue).unwrap();
        ReminderScheduler::arm(&setting, at(10, 0), &mut queue).unwrap();
        assert_eq!(queue.pending(&setting.job_key()).len(), 1);
    }

    #[test]
    fn arm_surfaces_corrupt_time_strings() {
        let mut queue = InMemoryJobQueue::new();
        let mut setting = ReminderSetting::daily("21:00", "evening check");
        setting.rule = ReminderRule::Daily {
            time: "25:99".to_string(),
        };
        let err = ReminderScheduler::arm(&setting, at(9, 0), &mut queue);
        assert!(matches!(err, Err(ScheduleError::BadSettingTime { .. })));
        assert!(queue.pending(&setting.job_key()).is_empty());
    }

    #[test]
    fn rearm_is_strictly_after_fired_instant() {
        let mut queue = InMemoryJobQueue::new();
        let setting = ReminderSetting::interval(30, "08:00", "22:00", "check");
        let fired_at = at(12, 0);
        let next = ReminderScheduler::on_fired(&setting, fired_at, &mut queue)
            .unwrap()
            .unwrap();
        assert!(next > fired_at);
        assert_eq!(next, at(12, 30));
    }

    #[test]
    fn unschedulable_rearm_stops_recurrence() {
        let mut queue = InMemoryJobQueue::new();
        let mut setting = ReminderSetting::interval(30, "08:00", "22:00", "check");
        ReminderScheduler::arm(&setting, at(11, 45), &mut queue).unwrap();
        assert_eq!(queue.pending(&setting.job_key()).len(), 1);

        // The user edits the window so that no 1000-minute tick ever
        // lands inside it; the already-queued job then fires. The
        // handler must complete without rescheduling.
        setting.rule = ReminderRule::Interval {
            every_minutes: 1000,
            window_start: "02:00".to_string(),
            window_end: "03:00".to_string(),
        };
        let outcome = ReminderScheduler::on_fired(&setting, at(12, 0), &mut queue).unwrap();
        assert_eq!(outcome, None);
        assert!(queue.pending(&setting.job_key()).is_empty());
    }

    #[test]
    fn arm_unschedulable_window_cancels_and_reports_none() {
        let mut queue = InMemoryJobQueue::new();
        // A day of 1000-minute ticks anchored at 02:00 lands at 18:40,
        // 11:20 and 04:00 time-of-day; none is inside 02:00-03:00
        let setting = ReminderSetting::interval(1000, "02:00", "03:00", "night check");
        let outcome = ReminderScheduler::arm(&setting, at(1, 59), &mut queue).unwrap();
        assert_eq!(outcome, None);
        assert!(queue.pending(&setting.job_key()).is_empty());
    }

    #[test]
    fn post_meal_check_follows_reading_by_delay() {
        let mut queue = InMemoryJobQueue::new();
        let prefs = PostMealPrefs {
            enabled: true,
            delay_minutes: 90,
        };
        let reading = Reading::new(at(12, 15), 7.8);
        ReminderScheduler::plan_post_meal(&reading, &prefs, &mut queue);
        let pending = queue.pending(KEY_POST_MEAL);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].fire_at, at(13, 45));
    }

    #[test]
    fn post_meal_disabled_cancels_pending_check() {
        let mut queue = InMemoryJobQueue::new();
        let reading = Reading::new(at(12, 15), 7.8);
        ReminderScheduler::plan_post_meal(
            &reading,
            &PostMealPrefs {
                enabled: true,
                delay_minutes: 90,
            },
            &mut queue,
        );
        ReminderScheduler::plan_post_meal(&reading, &PostMealPrefs::default(), &mut queue);
        assert!(queue.pending(KEY_POST_MEAL).is_empty());
    }
}
