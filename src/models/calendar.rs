//! Mandatory-window calendar.
//!
//! Describes the recurring daily obligations of the line (peak-tariff
//! stop, ring change, channel change) and when they apply.
//!
//! # Concepts
//!
//! - [`Interval`]: a half-open wall-clock interval `[start, end)`.
//! - [`MandatoryWindow`]: a recurring time-of-day obligation with a
//!   [`DayRule`] (which dates it applies to) and a [`CoverageRule`]
//!   (how already-scheduled stoppages reduce it).
//! - [`DayCalendar`]: pluggable date predicate (working day / holiday).
//!   [`HolidayCalendar`] is the standard Monday–Friday implementation.
//! - [`ObligationCalendar`]: the ordered window set used by the simulator.
//!
//! # Coverage
//! Obligations are only ever reduced by existing stoppages:
//! - `Remainder`: while inside the occurrence, the line must stop for
//!   `required − covered`, capped at the occurrence end.
//! - `Lookback`: at the occurrence instant, the full duration is
//!   inserted only if the stoppage time in the preceding look-back span
//!   is below a minimum.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use super::SegmentKind;
use super::timeline::shift_secs;

/// A wall-clock interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    /// Start (inclusive).
    pub start: NaiveDateTime,
    /// End (exclusive).
    pub end: NaiveDateTime,
}

impl Interval {
    /// Creates an interval.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Length in seconds (zero for inverted intervals).
    #[inline]
    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).num_seconds().max(0)
    }

    /// Whether `t` falls inside.
    #[inline]
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        t >= self.start && t < self.end
    }

    /// Seconds shared with `[start, end)`.
    pub fn overlap_secs(&self, start: NaiveDateTime, end: NaiveDateTime) -> i64 {
        let s = self.start.max(start);
        let e = self.end.min(end);
        if e > s {
            (e - s).num_seconds()
        } else {
            0
        }
    }
}

/// Which dates a window applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayRule {
    /// Every calendar day.
    EveryDay,
    /// Working days only (as decided by the [`DayCalendar`]).
    WorkingDays,
}

/// Pluggable date predicate.
pub trait DayCalendar {
    /// Whether `date` is a holiday.
    fn is_holiday(&self, date: NaiveDate) -> bool;

    /// Whether `date` is a working day. Default: Monday–Friday, not a holiday.
    fn is_working_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.is_holiday(date)
    }

    /// Whether a window with `rule` applies on `date`.
    fn applies(&self, rule: DayRule, date: NaiveDate) -> bool {
        match rule {
            DayRule::EveryDay => true,
            DayRule::WorkingDays => self.is_working_day(date),
        }
    }
}

/// Weekday set plus explicit holiday dates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidayCalendar {
    /// Holiday dates.
    pub holidays: BTreeSet<NaiveDate>,
    /// Working weekdays.
    pub working_days: Vec<Weekday>,
}

impl HolidayCalendar {
    /// Monday–Friday with the given holidays.
    pub fn new(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
            working_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
        }
    }

    /// Replaces the working weekdays.
    pub fn with_working_days(mut self, days: Vec<Weekday>) -> Self {
        self.working_days = days;
        self
    }
}

impl Default for HolidayCalendar {
    fn default() -> Self {
        Self::new([])
    }
}

impl DayCalendar for HolidayCalendar {
    fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    fn is_working_day(&self, date: NaiveDate) -> bool {
        self.working_days.contains(&date.weekday()) && !self.is_holiday(date)
    }
}

/// How existing stoppages reduce an obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoverageRule {
    /// Stop for the uncovered remainder of the occurrence interval.
    Remainder,
    /// At the occurrence instant, stop for the full duration unless the
    /// preceding `lookback_secs` already hold `min_stoppage_secs` of stoppage.
    Lookback {
        /// Look-back span before the instant (s).
        lookback_secs: i64,
        /// Stoppage that satisfies the obligation (s).
        min_stoppage_secs: i64,
    },
}

/// A recurring daily obligation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MandatoryWindow {
    /// Segment kind of the inserted obligation.
    pub kind: SegmentKind,
    /// Label of the inserted obligation.
    pub label: String,
    /// Time of day the occurrence starts.
    pub start_time: NaiveTime,
    /// Required stop (s).
    pub duration_secs: i64,
    /// Applicable dates.
    pub days: DayRule,
    /// Coverage rule.
    pub coverage: CoverageRule,
}

impl MandatoryWindow {
    /// Creates a window.
    pub fn new(
        kind: SegmentKind,
        start_time: NaiveTime,
        duration_secs: i64,
        days: DayRule,
        coverage: CoverageRule,
    ) -> Self {
        Self {
            kind,
            label: kind.label().to_string(),
            start_time,
            duration_secs: duration_secs.max(0),
            days,
            coverage,
        }
    }

    /// Peak-tariff stop on working days, reduced by any stoppage inside it.
    pub fn peak(start_time: NaiveTime, duration_secs: i64) -> Self {
        Self::new(
            SegmentKind::PeakObligation,
            start_time,
            duration_secs,
            DayRule::WorkingDays,
            CoverageRule::Remainder,
        )
    }

    /// Daily ring change, skipped if enough stoppage preceded it.
    pub fn ring_change(start_time: NaiveTime, duration_secs: i64, lookback_secs: i64) -> Self {
        Self::new(
            SegmentKind::RingChange,
            start_time,
            duration_secs,
            DayRule::EveryDay,
            CoverageRule::Lookback {
                lookback_secs,
                min_stoppage_secs: duration_secs,
            },
        )
        .with_label("Ring change (automatic)")
    }

    /// Daily channel change, skipped if enough stoppage preceded it.
    pub fn channel_change(start_time: NaiveTime, duration_secs: i64, lookback_secs: i64) -> Self {
        Self::new(
            SegmentKind::ChannelChange,
            start_time,
            duration_secs,
            DayRule::EveryDay,
            CoverageRule::Lookback {
                lookback_secs,
                min_stoppage_secs: duration_secs,
            },
        )
        .with_label("Channel change (automatic)")
    }

    /// Overrides the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Overrides the day rule.
    pub fn with_days(mut self, days: DayRule) -> Self {
        self.days = days;
        self
    }

    /// The occurrence on `date`.
    pub fn occurrence_on(&self, date: NaiveDate) -> Interval {
        let start = date.and_time(self.start_time);
        Interval::new(start, shift_secs(start, self.duration_secs))
    }

    /// Whether the cursor is positioned to act on `occurrence`.
    pub fn is_active_at(&self, occurrence: &Interval, cursor: NaiveDateTime) -> bool {
        match self.coverage {
            CoverageRule::Remainder => occurrence.contains(cursor),
            CoverageRule::Lookback { .. } => cursor == occurrence.start,
        }
    }

    /// Interval whose stoppages count as coverage for `occurrence`.
    pub fn coverage_interval(&self, occurrence: &Interval) -> Interval {
        match self.coverage {
            CoverageRule::Remainder => *occurrence,
            CoverageRule::Lookback { lookback_secs, .. } => Interval::new(
                shift_secs(occurrence.start, -lookback_secs.max(0)),
                occurrence.start,
            ),
        }
    }

    /// Stop still owed at `cursor` given `covered_secs` of existing stoppage.
    ///
    /// Never exceeds the window duration.
    pub fn required_secs(&self, occurrence: &Interval, cursor: NaiveDateTime, covered_secs: i64) -> i64 {
        match self.coverage {
            CoverageRule::Remainder => {
                let owed = (self.duration_secs - covered_secs).max(0);
                owed.min((occurrence.end - cursor).num_seconds().max(0))
            }
            CoverageRule::Lookback {
                min_stoppage_secs, ..
            } => {
                if covered_secs < min_stoppage_secs {
                    self.duration_secs
                } else {
                    0
                }
            }
        }
    }
}

/// Ordered set of mandatory windows.
///
/// Windows acting at the same instant are evaluated in insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObligationCalendar {
    /// Windows, in evaluation order.
    pub windows: Vec<MandatoryWindow>,
}

impl ObligationCalendar {
    /// Creates a calendar without obligations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard plant calendar.
    ///
    /// | Window | Time | Stop | Days | Coverage |
    /// |--------|------|------|------|----------|
    /// | Channel change | 06:30 | 40 min | every day | skipped if ≥ 40 min stopped in the previous 7 h |
    /// | Ring change | 18:30 | 60 min | every day | skipped if ≥ 60 min stopped in the previous 7 h |
    /// | Peak tariff | 18:30–20:30 | 120 min | working days | remainder |
    pub fn plant_default() -> Self {
        Self::new()
            .with_window(MandatoryWindow::channel_change(hm(6, 30), 40 * 60, 7 * 3600))
            .with_window(MandatoryWindow::ring_change(hm(18, 30), 60 * 60, 7 * 3600))
            .with_window(MandatoryWindow::peak(hm(18, 30), 120 * 60))
    }

    /// Adds a window.
    pub fn with_window(mut self, window: MandatoryWindow) -> Self {
        self.windows.push(window);
        self
    }

    /// Applicable occurrences the cursor is positioned to act on.
    ///
    /// Checks the previous day as well, for windows running past midnight.
    pub fn active_at<C: DayCalendar + ?Sized>(
        &self,
        cursor: NaiveDateTime,
        days: &C,
    ) -> Vec<(&MandatoryWindow, Interval)> {
        let today = cursor.date();
        let dates = [today.pred_opt(), Some(today)];
        let mut active = Vec::new();
        for window in &self.windows {
            for date in dates.iter().flatten() {
                if !days.applies(window.days, *date) {
                    continue;
                }
                let occ = window.occurrence_on(*date);
                if window.duration_secs > 0 && window.is_active_at(&occ, cursor) {
                    active.push((window, occ));
                }
            }
        }
        active
    }

    /// Earliest applicable occurrence start in `(after, before)`.
    ///
    /// Scans day by day up to the date of `before`, so long runs of
    /// non-applicable days (weekends, shutdowns) never hide a later
    /// occurrence.
    pub fn next_start_between<C: DayCalendar + ?Sized>(
        &self,
        after: NaiveDateTime,
        before: NaiveDateTime,
        days: &C,
    ) -> Option<NaiveDateTime> {
        let windows: Vec<&MandatoryWindow> =
            self.windows.iter().filter(|w| w.duration_secs > 0).collect();
        if windows.is_empty() {
            return None;
        }

        let last = before.date();
        let mut date = after.date();
        while date <= last {
            let best = windows
                .iter()
                .filter(|w| days.applies(w.days, date))
                .map(|w| date.and_time(w.start_time))
                .filter(|&start| start > after && start < before)
                .min();
            if best.is_some() {
                return best;
            }
            date = date.succ_opt()?;
        }
        None
    }
}

/// Time of day from hour and minute; midnight on invalid input.
pub fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}
