//! Calendar-aware timeline simulator.
//!
//! # Algorithm
//!
//! A single cursor advances monotonically from the run start.
//!
//! 1. For each lot, emit its fixed stoppage components (changeover,
//!    quality change, stop change, adjustment, manual ring/channel
//!    change, named stoppages) and any ad-hoc stops for the lot, each
//!    starting at the current cursor.
//! 2. Produce `quantity / pace` hours. Before each production chunk,
//!    ask the calendar whether an obligation is owed at the cursor; if
//!    so, insert exactly the owed amount. Otherwise produce up to the
//!    next occurrence start (or until the block is done).
//! 3. Occurrences over multi-day lots are handled one at a time in
//!    chronological order. The search for the next occurrence runs to
//!    the end of the block, however many non-applicable days lie between.
//!
//! Coverage counts every stoppage already on the timeline, including
//! earlier lots and earlier obligations. The simulator never fails:
//! negative or missing durations contribute nothing, oversized ones are
//! capped at [`MAX_DURATION_SECS`](crate::models::MAX_DURATION_SECS), and
//! the timeline stops growing at the last representable instant.
//!
//! # Complexity
//! O(s · w) per chunk, where s = stoppage segments inside the coverage
//! span and w = windows.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{
    DayCalendar, HolidayCalendar, Interval, Lot, LotTimeline, ObligationCalendar, SegmentKind,
    SegmentOrigin, Timeline, TimelineSegment, shift_secs,
};

/// A forced stop attached to a lot.
///
/// Ad-hoc stops are placed at the start of their lot, after the lot's
/// own stoppage components. They carry no wall-clock instant of their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdHocStop {
    /// Lot the stop precedes.
    pub lot_id: String,
    /// Display label.
    pub label: String,
    /// Stop length (s).
    pub duration_secs: i64,
}

impl AdHocStop {
    /// Creates an ad-hoc stop of `minutes` before `lot_id`.
    pub fn new(lot_id: impl Into<String>, label: impl Into<String>, minutes: f64) -> Self {
        Self {
            lot_id: lot_id.into(),
            label: label.into(),
            duration_secs: crate::models::minutes_to_secs(minutes),
        }
    }
}

/// Simulator input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRequest {
    /// Lots in production order.
    pub lots: Vec<Lot>,
    /// Run start.
    pub start: NaiveDateTime,
    /// Holiday dates (working-day windows are skipped on these).
    pub holidays: BTreeSet<NaiveDate>,
    /// Ad-hoc stops.
    pub ad_hoc_stops: Vec<AdHocStop>,
}

impl SimulationRequest {
    /// Creates a request.
    pub fn new(lots: Vec<Lot>, start: NaiveDateTime) -> Self {
        Self {
            lots,
            start,
            holidays: BTreeSet::new(),
            ad_hoc_stops: Vec::new(),
        }
    }

    /// Sets the holiday dates.
    pub fn with_holidays(mut self, holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays = holidays.into_iter().collect();
        self
    }

    /// Adds an ad-hoc stop.
    pub fn with_ad_hoc_stop(mut self, stop: AdHocStop) -> Self {
        self.ad_hoc_stops.push(stop);
        self
    }
}

/// Turns an ordered lot sequence into a contiguous [`Timeline`].
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use line_sequencer::models::Lot;
/// use line_sequencer::scheduler::{SimulationRequest, TimelineSimulator};
///
/// let start = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap().and_hms_opt(8, 0, 0).unwrap();
/// let lots = vec![Lot::new("L1", "SKU-1").with_quantity(120.0).with_pace(60.0)];
///
/// let timeline = TimelineSimulator::new().simulate(&SimulationRequest::new(lots, start));
/// assert!(timeline.is_contiguous());
/// assert_eq!(timeline.span_secs(), 2 * 3600);
/// ```
#[derive(Debug, Clone)]
pub struct TimelineSimulator {
    calendar: ObligationCalendar,
}

impl Default for TimelineSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl TimelineSimulator {
    /// Creates a simulator with the standard plant calendar.
    pub fn new() -> Self {
        Self {
            calendar: ObligationCalendar::plant_default(),
        }
    }

    /// Replaces the obligation calendar.
    pub fn with_calendar(mut self, calendar: ObligationCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    /// The obligation calendar in use.
    pub fn calendar(&self) -> &ObligationCalendar {
        &self.calendar
    }

    /// Simulates using a Monday–Friday calendar with the request's holidays.
    pub fn simulate(&self, request: &SimulationRequest) -> Timeline {
        let days = HolidayCalendar::new(request.holidays.iter().copied());
        self.simulate_with(request, &days)
    }

    /// Simulates against an arbitrary [`DayCalendar`].
    pub fn simulate_with<C: DayCalendar + ?Sized>(
        &self,
        request: &SimulationRequest,
        days: &C,
    ) -> Timeline {
        let start = truncate_to_minute(request.start);
        let mut timeline = Timeline::new(start);
        let mut cursor = start;

        debug!(lots = request.lots.len(), %start, "simulating timeline");

        for lot in &request.lots {
            let lot_start = cursor;
            let mut segments: Vec<TimelineSegment> = Vec::new();

            for (kind, secs, label) in lot.stoppage_components() {
                let seg = TimelineSegment::new(kind, SegmentOrigin::Lot, &lot.id, cursor, secs)
                    .with_label(label);
                cursor = seg.end;
                segments.push(seg);
            }

            for stop in request.ad_hoc_stops.iter().filter(|s| s.lot_id == lot.id) {
                if stop.duration_secs <= 0 {
                    warn!(lot = %lot.id, label = %stop.label, "ignoring non-positive ad-hoc stop");
                    continue;
                }
                let seg = TimelineSegment::new(
                    SegmentKind::AdHocStop,
                    SegmentOrigin::Lot,
                    &lot.id,
                    cursor,
                    stop.duration_secs,
                )
                .with_label(stop.label.clone());
                cursor = seg.end;
                segments.push(seg);
            }

            if lot.pace <= 0.0 && lot.quantity > 0.0 {
                warn!(lot = %lot.id, pace = lot.pace, "lot has no usable pace; production skipped");
            }

            self.produce(&lot.id, lot.production_secs(), &mut cursor, &mut segments, &timeline, days);

            timeline.lots.push(LotTimeline {
                lot_id: lot.id.clone(),
                start: lot_start,
                end: cursor,
                quantity: if lot.quantity.is_finite() { lot.quantity.max(0.0) } else { 0.0 },
                segments,
            });
        }

        debug!(
            segments = timeline.segment_count(),
            end = %timeline.end(),
            "timeline simulated"
        );
        timeline
    }

    /// Advances through a production block, splitting it around obligations.
    fn produce<C: DayCalendar + ?Sized>(
        &self,
        lot_id: &str,
        production_secs: i64,
        cursor: &mut NaiveDateTime,
        segments: &mut Vec<TimelineSegment>,
        timeline: &Timeline,
        days: &C,
    ) {
        let mut remaining = production_secs.max(0);

        while remaining > 0 {
            if let Some(obligation) = self.owed_obligation(lot_id, *cursor, segments, timeline, days) {
                if obligation.duration_secs == 0 {
                    warn!(lot = lot_id, %cursor, "timeline reached the end of representable time");
                    return;
                }
                *cursor = obligation.end;
                segments.push(obligation);
                continue;
            }

            let finish = shift_secs(*cursor, remaining);
            let stop_at = self
                .calendar
                .next_start_between(*cursor, finish, days)
                .unwrap_or(finish);

            let seg = TimelineSegment::new(
                SegmentKind::Production,
                SegmentOrigin::Lot,
                lot_id,
                *cursor,
                (stop_at - *cursor).num_seconds(),
            );
            if seg.duration_secs == 0 {
                warn!(
                    lot = lot_id,
                    %cursor,
                    remaining_secs = remaining,
                    "timeline reached the end of representable time"
                );
                return;
            }
            remaining -= seg.duration_secs;
            *cursor = seg.end;
            segments.push(seg);
        }
    }

    /// First obligation owed at `cursor`, in calendar order.
    fn owed_obligation<C: DayCalendar + ?Sized>(
        &self,
        lot_id: &str,
        cursor: NaiveDateTime,
        current: &[TimelineSegment],
        timeline: &Timeline,
        days: &C,
    ) -> Option<TimelineSegment> {
        for (window, occurrence) in self.calendar.active_at(cursor, days) {
            let span = window.coverage_interval(&occurrence);
            let covered = stoppage_in(&span, current, timeline);
            let owed = window.required_secs(&occurrence, cursor, covered);
            if owed > 0 {
                debug!(
                    lot = lot_id,
                    kind = ?window.kind,
                    %cursor,
                    covered_secs = covered,
                    owed_secs = owed,
                    "inserting obligation"
                );
                return Some(
                    TimelineSegment::new(window.kind, SegmentOrigin::Calendar, lot_id, cursor, owed)
                        .with_label(window.label.clone()),
                );
            }
        }
        None
    }
}

/// Stoppage seconds inside `span` across the timeline so far.
fn stoppage_in(span: &Interval, current: &[TimelineSegment], timeline: &Timeline) -> i64 {
    let overlap = |seg: &TimelineSegment| {
        if seg.kind.is_stoppage() {
            seg.overlap_secs(span.start, span.end)
        } else {
            0
        }
    };

    let mut total: i64 = 0;
    for seg in current.iter().rev() {
        if seg.end <= span.start {
            return total;
        }
        total += overlap(seg);
    }
    for lot in timeline.lots.iter().rev() {
        if lot.end <= span.start {
            break;
        }
        total += lot.segments.iter().map(overlap).sum::<i64>();
    }
    total
}

fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DayRule, MAX_DURATION_SECS, MandatoryWindow, hm};

    // 2024-03-04 is a Monday.
    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn peak_only() -> TimelineSimulator {
        TimelineSimulator::new().with_calendar(
            ObligationCalendar::new().with_window(MandatoryWindow::peak(hm(18, 30), 120 * 60)),
        )
    }

    fn no_windows() -> TimelineSimulator {
        TimelineSimulator::new().with_calendar(ObligationCalendar::new())
    }

    /// 300 minutes of production at 60 t/h.
    fn five_hour_lot(id: &str) -> Lot {
        Lot::new(id, "SKU-1").with_quantity(300.0).with_pace(60.0)
    }

    fn shape(t: &Timeline) -> Vec<(SegmentKind, i64)> {
        t.segments().map(|s| (s.kind, s.duration_secs / 60)).collect()
    }

    #[test]
    fn test_production_split_around_peak() {
        crate::logging::init_test();
        let req = SimulationRequest::new(vec![five_hour_lot("L1")], at(4, 17, 0));
        let t = peak_only().simulate(&req);

        assert_eq!(
            shape(&t),
            vec![
                (SegmentKind::Production, 90),
                (SegmentKind::PeakObligation, 120),
                (SegmentKind::Production, 210),
            ]
        );
        assert_eq!(t.end(), at(5, 0, 0));
        assert!(t.is_contiguous());
    }

    #[test]
    fn test_peak_reduced_by_setup_overlap() {
        let lot = five_hour_lot("L1").with_changeover_minutes(60.0);
        let req = SimulationRequest::new(vec![lot], at(4, 18, 0));
        let t = peak_only().simulate(&req);

        let segs: Vec<&TimelineSegment> = t.segments().collect();
        assert_eq!(segs[0].kind, SegmentKind::Changeover);
        assert_eq!(segs[0].end, at(4, 19, 0));
        assert_eq!(segs[1].kind, SegmentKind::PeakObligation);
        assert_eq!(segs[1].duration_secs, 90 * 60);
        assert_eq!(segs[1].end, at(4, 20, 30));
        assert_eq!(segs[1].origin, SegmentOrigin::Calendar);
    }

    #[test]
    fn test_fully_covered_occurrence_inserts_nothing() {
        let lot = five_hour_lot("L1").with_stoppage_minutes("maintenance", 180.0);
        let req = SimulationRequest::new(vec![lot], at(4, 18, 0));
        let t = peak_only().simulate(&req);

        assert!(t.segments().all(|s| s.kind != SegmentKind::PeakObligation));
        assert_eq!(t.end(), at(4, 21, 0) + chrono::Duration::hours(5));
    }

    #[test]
    fn test_coverage_from_previous_lot() {
        // L1 stops 18:00-19:30, covering 60 of the 120 peak minutes.
        let l1 = Lot::new("L1", "SKU-1").with_stoppage_minutes("cleaning", 90.0);
        let l2 = Lot::new("L2", "SKU-2").with_quantity(120.0).with_pace(60.0);
        let req = SimulationRequest::new(vec![l1, l2], at(4, 18, 0));
        let t = peak_only().simulate(&req);

        let l2t = t.lot("L2").unwrap();
        assert_eq!(l2t.obligation_secs(), 60 * 60);
        assert!(t.is_contiguous());
    }

    #[test]
    fn test_multi_day_lot_hits_each_occurrence() {
        // 60 hours from Monday 12:00 → crosses Monday, Tuesday and Wednesday peaks.
        let lot = Lot::new("L1", "SKU-1").with_quantity(600.0).with_pace(10.0);
        let req = SimulationRequest::new(vec![lot], at(4, 12, 0));
        let t = peak_only().simulate(&req);

        let peaks: Vec<NaiveDateTime> = t
            .segments()
            .filter(|s| s.kind == SegmentKind::PeakObligation)
            .map(|s| s.start)
            .collect();
        assert_eq!(peaks, vec![at(4, 18, 30), at(5, 18, 30), at(6, 18, 30)]);
        assert_eq!(t.lot("L1").unwrap().production_secs(), 60 * 3600);
    }

    #[test]
    fn test_weekend_and_holiday_skip_peak() {
        // Saturday, then a Monday holiday.
        let lot = Lot::new("L1", "SKU-1").with_quantity(10.0).with_pace(10.0);
        let sat = SimulationRequest::new(vec![lot.clone()], at(9, 18, 0));
        let t = peak_only().simulate(&sat);
        assert_eq!(t.segment_count(), 1);

        let hol = SimulationRequest::new(vec![lot], at(11, 18, 0))
            .with_holidays([NaiveDate::from_ymd_opt(2024, 3, 11).unwrap()]);
        let t = peak_only().simulate(&hol);
        assert_eq!(t.segment_count(), 1);
        assert_eq!(t.end(), at(11, 19, 0));
    }

    #[test]
    fn test_peaks_resume_after_long_shutdown() {
        // 480 hours from Saturday 03-02 over a two-week shutdown (03-04 to 03-15).
        let lot = Lot::new("L1", "SKU-1").with_quantity(480.0).with_pace(1.0);
        let shutdown = (4..=15).map(|d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap());
        let req = SimulationRequest::new(vec![lot], at(2, 8, 0)).with_holidays(shutdown);
        let t = peak_only().simulate(&req);

        let peaks: Vec<NaiveDateTime> = t
            .segments()
            .filter(|s| s.kind == SegmentKind::PeakObligation)
            .map(|s| s.start)
            .collect();
        assert_eq!(
            peaks,
            vec![at(18, 18, 30), at(19, 18, 30), at(20, 18, 30), at(21, 18, 30)]
        );
        assert_eq!(t.end(), at(22, 16, 0));
    }

    #[test]
    fn test_friday_block_splits_on_monday() {
        // 80 hours from Friday 21:00 runs into Monday's window.
        let lot = Lot::new("L1", "SKU-1").with_quantity(80.0).with_pace(1.0);
        let req = SimulationRequest::new(vec![lot], at(8, 21, 0));
        let t = peak_only().simulate(&req);

        let peak = t
            .segments()
            .find(|s| s.kind == SegmentKind::PeakObligation)
            .unwrap();
        assert_eq!(peak.start, at(11, 18, 30));
    }

    #[test]
    fn test_plant_default_ring_then_peak() {
        let req = SimulationRequest::new(vec![five_hour_lot("L1")], at(4, 17, 0));
        let t = TimelineSimulator::new().simulate(&req);

        assert_eq!(
            shape(&t),
            vec![
                (SegmentKind::Production, 90),
                (SegmentKind::RingChange, 60),
                (SegmentKind::PeakObligation, 60),
                (SegmentKind::Production, 210),
            ]
        );
        assert_eq!(t.end(), at(5, 0, 0));
    }

    #[test]
    fn test_ring_change_skipped_after_long_stop() {
        let lot = five_hour_lot("L1").with_changeover_minutes(90.0);
        // Saturday: no peak; changeover 16:00–17:30 lies in the 7 h look-back.
        let req = SimulationRequest::new(vec![lot], at(9, 16, 0));
        let t = TimelineSimulator::new().simulate(&req);
        assert!(t.segments().all(|s| s.kind != SegmentKind::RingChange));
    }

    #[test]
    fn test_channel_change_inserted_at_morning_instant() {
        let lot = Lot::new("L1", "SKU-1").with_quantity(2.0).with_pace(1.0);
        let req = SimulationRequest::new(vec![lot], at(9, 6, 0));
        let t = TimelineSimulator::new().simulate(&req);
        assert_eq!(
            shape(&t),
            vec![
                (SegmentKind::Production, 30),
                (SegmentKind::ChannelChange, 40),
                (SegmentKind::Production, 90),
            ]
        );
    }

    #[test]
    fn test_declared_durations_preserved() {
        let lots = vec![
            five_hour_lot("L1")
                .with_changeover_minutes(45.0)
                .with_quality_change_minutes(60.0)
                .with_stop_change_minutes(10.0)
                .with_adjustment_minutes(30.0),
            Lot::new("L2", "SKU-2")
                .with_quantity(900.0)
                .with_pace(25.0)
                .with_ring_change_minutes(60.0)
                .with_channel_change_minutes(40.0)
                .with_stoppage_minutes("inspection", 20.0),
            Lot::new("L3", "SKU-3").with_quantity(55.5).with_pace(7.0),
        ];
        let req = SimulationRequest::new(lots.clone(), at(4, 5, 17));
        let t = TimelineSimulator::new().simulate(&req);

        assert!(t.is_contiguous());
        for (lot, lt) in lots.iter().zip(&t.lots) {
            assert_eq!(lt.declared_secs(), lot.declared_secs(), "lot {}", lot.id);
            assert_eq!(lt.duration_secs(), lt.declared_secs() + lt.obligation_secs());
        }
    }

    #[test]
    fn test_ad_hoc_stop_anchored_at_lot_start() {
        let lots = vec![
            Lot::new("L1", "SKU-1").with_quantity(60.0).with_pace(60.0),
            Lot::new("L2", "SKU-2")
                .with_quantity(60.0)
                .with_pace(60.0)
                .with_changeover_minutes(30.0),
        ];
        let req = SimulationRequest::new(lots, at(4, 8, 0))
            .with_ad_hoc_stop(AdHocStop::new("L2", "Power cut", 45.0))
            .with_ad_hoc_stop(AdHocStop::new("L2", "Bogus", -5.0));
        let t = no_windows().simulate(&req);

        let l2 = t.lot("L2").unwrap();
        assert_eq!(l2.start, at(4, 9, 0));
        assert_eq!(l2.segments[1].kind, SegmentKind::AdHocStop);
        assert_eq!(l2.segments[1].label, "Power cut");
        assert_eq!(l2.segments[1].start, at(4, 9, 30));
        assert_eq!(l2.segments.len(), 3);
        assert_eq!(l2.end, at(4, 11, 15));
    }

    #[test]
    fn test_invalid_inputs_degrade_gracefully() {
        let mut bad = Lot::new("L1", "SKU-1").with_quantity(f64::NAN).with_pace(-3.0);
        bad.changeover_secs = -100;
        let req = SimulationRequest::new(vec![bad, Lot::new("L2", "SKU-2")], at(4, 8, 0));
        let t = TimelineSimulator::new().simulate(&req);

        assert_eq!(t.lots.len(), 2);
        assert_eq!(t.segment_count(), 0);
        assert_eq!(t.end(), at(4, 8, 0));
        assert_eq!(t.lots[0].quantity, 0.0);
    }

    #[test]
    fn test_oversized_production_is_capped() {
        let lot = Lot::new("L1", "SKU-1").with_quantity(1e12).with_pace(1e-3);
        let req = SimulationRequest::new(vec![lot], at(4, 8, 0));
        let t = peak_only().simulate(&req);

        assert!(t.is_contiguous());
        let l1 = t.lot("L1").unwrap();
        assert_eq!(l1.production_secs(), MAX_DURATION_SECS);
        assert!(l1.segments.iter().any(|s| s.kind == SegmentKind::PeakObligation));
    }

    #[test]
    fn test_timeline_saturates_at_last_instant() {
        let mut first = Lot::new("L1", "SKU-1").with_quantity(48.0).with_pace(1.0);
        first.changeover_secs = i64::MAX;
        let second = Lot::new("L2", "SKU-2")
            .with_changeover_minutes(60.0)
            .with_quantity(10.0)
            .with_pace(1.0);
        let start = NaiveDate::MAX.and_hms_opt(0, 0, 0).unwrap();
        let req = SimulationRequest::new(vec![first, second], start);
        let t = no_windows().simulate(&req);

        assert_eq!(t.lots.len(), 2);
        assert!(t.is_contiguous());
        assert_eq!(t.lots[0].segments.len(), 1);
        assert_eq!(t.lots[0].segments[0].duration_secs, 86_399);
        assert_eq!(t.lots[1].production_secs(), 0);
    }

    #[test]
    fn test_start_truncated_to_minute() {
        let start = at(4, 8, 0) + chrono::Duration::seconds(42);
        let req = SimulationRequest::new(vec![five_hour_lot("L1")], start);
        let t = no_windows().simulate(&req);
        assert_eq!(t.start, at(4, 8, 0));
    }

    #[test]
    fn test_synthetic_day_calendar() {
        struct Weekends;
        impl DayCalendar for Weekends {
            fn is_holiday(&self, _date: NaiveDate) -> bool {
                false
            }
            fn is_working_day(&self, date: NaiveDate) -> bool {
                use chrono::Datelike;
                date.weekday().number_from_monday() >= 6
            }
        }

        let sim = peak_only();
        let monday = SimulationRequest::new(vec![five_hour_lot("L1")], at(4, 17, 0));
        assert!(sim
            .simulate_with(&monday, &Weekends)
            .segments()
            .all(|s| s.kind != SegmentKind::PeakObligation));

        let saturday = SimulationRequest::new(vec![five_hour_lot("L1")], at(9, 17, 0));
        assert!(sim
            .simulate_with(&saturday, &Weekends)
            .segments()
            .any(|s| s.kind == SegmentKind::PeakObligation));
    }

    #[test]
    fn test_every_day_window() {
        let sim = TimelineSimulator::new().with_calendar(ObligationCalendar::new().with_window(
            MandatoryWindow::peak(hm(12, 0), 30 * 60).with_days(DayRule::EveryDay),
        ));
        let req = SimulationRequest::new(vec![five_hour_lot("L1")], at(10, 11, 0));
        let t = sim.simulate(&req);
        assert_eq!(t.lot("L1").unwrap().obligation_secs(), 30 * 60);
    }

    #[test]
    fn test_empty_request() {
        let t = TimelineSimulator::new().simulate(&SimulationRequest::new(vec![], at(4, 8, 0)));
        assert!(t.lots.is_empty());
        assert_eq!(t.span_secs(), 0);
    }
}
