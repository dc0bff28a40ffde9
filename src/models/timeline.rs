//! Timeline (simulation output) model.
//!
//! A timeline is the wall-clock rendering of an ordered lot sequence:
//! one [`LotTimeline`] per lot, each holding contiguous
//! [`TimelineSegment`]s. Segments never overlap and the end of one
//! segment is the start of the next, across lot boundaries too.
//!
//! # Time Model
//! Instants are `chrono::NaiveDateTime` in plant-local wall-clock time.
//! Durations are whole seconds.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::lot::MAX_DURATION_SECS;

/// `t` moved by `secs`, saturating at the representable range.
pub(crate) fn shift_secs(t: NaiveDateTime, secs: i64) -> NaiveDateTime {
    let secs = secs.clamp(-MAX_DURATION_SECS, MAX_DURATION_SECS);
    chrono::Duration::try_seconds(secs)
        .and_then(|d| t.checked_add_signed(d))
        .unwrap_or(if secs < 0 {
            NaiveDateTime::MIN
        } else {
            NaiveDateTime::MAX
        })
}

/// What the line is doing during a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SegmentKind {
    /// Material is being produced.
    Production,
    /// Size changeover (die/tooling change).
    Changeover,
    /// Billet quality change.
    QualityChange,
    /// Stop (length gauge) change.
    StopChange,
    /// Hit-and-calibration adjustment after a changeover.
    Adjustment,
    /// Ring change.
    RingChange,
    /// Channel change.
    ChannelChange,
    /// Mandatory stop during the peak-tariff window.
    PeakObligation,
    /// Unplanned or manually entered stop.
    AdHocStop,
}

impl SegmentKind {
    /// Whether the line is stopped during this kind of segment.
    #[inline]
    pub fn is_stoppage(self) -> bool {
        self != SegmentKind::Production
    }

    /// Default human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            SegmentKind::Production => "Production",
            SegmentKind::Changeover => "Size changeover",
            SegmentKind::QualityChange => "Quality change",
            SegmentKind::StopChange => "Stop change",
            SegmentKind::Adjustment => "Hit and calibration",
            SegmentKind::RingChange => "Ring change",
            SegmentKind::ChannelChange => "Channel change",
            SegmentKind::PeakObligation => "Peak-hour stop",
            SegmentKind::AdHocStop => "Ad-hoc stop",
        }
    }
}

/// Where a segment's duration comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentOrigin {
    /// A duration component declared on the lot (or an ad-hoc stop).
    Lot,
    /// An obligation inserted by the mandatory-window calendar.
    Calendar,
}

/// A timed segment of the line's activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSegment {
    /// Segment type.
    pub kind: SegmentKind,
    /// Declared by the lot or inserted by the calendar.
    pub origin: SegmentOrigin,
    /// Start instant (inclusive).
    pub start: NaiveDateTime,
    /// End instant (exclusive).
    pub end: NaiveDateTime,
    /// `end - start` in seconds.
    pub duration_secs: i64,
    /// Owning lot ID.
    pub lot_id: String,
    /// Display label.
    pub label: String,
}

impl TimelineSegment {
    /// Creates a segment starting at `start` and lasting `duration_secs`.
    ///
    /// Durations are clamped to `[0, MAX_DURATION_SECS]` and the end
    /// saturates at the last representable instant.
    pub fn new(
        kind: SegmentKind,
        origin: SegmentOrigin,
        lot_id: impl Into<String>,
        start: NaiveDateTime,
        duration_secs: i64,
    ) -> Self {
        let end = shift_secs(start, duration_secs.max(0));
        Self {
            kind,
            origin,
            start,
            end,
            duration_secs: (end - start).num_seconds(),
            lot_id: lot_id.into(),
            label: kind.label().to_string(),
        }
    }

    /// Overrides the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Seconds of this segment falling inside `[from, to)`.
    pub fn overlap_secs(&self, from: NaiveDateTime, to: NaiveDateTime) -> i64 {
        let start = self.start.max(from);
        let end = self.end.min(to);
        if end > start {
            (end - start).num_seconds()
        } else {
            0
        }
    }
}

/// Simulated timing of one lot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotTimeline {
    /// Lot ID.
    pub lot_id: String,
    /// Computed start (cursor when the lot began).
    pub start: NaiveDateTime,
    /// Computed end (cursor after the lot's last segment).
    pub end: NaiveDateTime,
    /// Produced quantity (tons).
    pub quantity: f64,
    /// Ordered segments.
    pub segments: Vec<TimelineSegment>,
}

impl LotTimeline {
    /// Total span of the lot (seconds).
    #[inline]
    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }

    /// Summed duration of segments declared by the lot itself.
    pub fn declared_secs(&self) -> i64 {
        self.segments
            .iter()
            .filter(|s| s.origin == SegmentOrigin::Lot)
            .map(|s| s.duration_secs)
            .sum()
    }

    /// Summed duration of calendar obligations inserted into this lot.
    pub fn obligation_secs(&self) -> i64 {
        self.segments
            .iter()
            .filter(|s| s.origin == SegmentOrigin::Calendar)
            .map(|s| s.duration_secs)
            .sum()
    }

    /// Summed production time (seconds).
    pub fn production_secs(&self) -> i64 {
        self.segments
            .iter()
            .filter(|s| s.kind == SegmentKind::Production)
            .map(|s| s.duration_secs)
            .sum()
    }
}

/// A complete simulated timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    /// Run start (after normalisation).
    pub start: NaiveDateTime,
    /// Per-lot timings, in sequence order.
    pub lots: Vec<LotTimeline>,
}

impl Timeline {
    /// Creates an empty timeline anchored at `start`.
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            start,
            lots: Vec::new(),
        }
    }

    /// End of the last segment (or `start` when empty).
    pub fn end(&self) -> NaiveDateTime {
        self.lots.last().map(|l| l.end).unwrap_or(self.start)
    }

    /// Total span (seconds).
    pub fn span_secs(&self) -> i64 {
        (self.end() - self.start).num_seconds()
    }

    /// All segments in chronological order.
    pub fn segments(&self) -> impl Iterator<Item = &TimelineSegment> {
        self.lots.iter().flat_map(|l| l.segments.iter())
    }

    /// Number of segments.
    pub fn segment_count(&self) -> usize {
        self.lots.iter().map(|l| l.segments.len()).sum()
    }

    /// Finds the timing of a lot.
    pub fn lot(&self, lot_id: &str) -> Option<&LotTimeline> {
        self.lots.iter().find(|l| l.lot_id == lot_id)
    }

    /// Whether every segment ends where the next one starts.
    pub fn is_contiguous(&self) -> bool {
        let mut expected = self.start;
        for seg in self.segments() {
            if seg.start != expected || seg.end < seg.start {
                return false;
            }
            expected = seg.end;
        }
        true
    }

    /// Seconds spent per segment kind.
    pub fn totals_by_kind(&self) -> BTreeMap<SegmentKind, i64> {
        let mut totals = BTreeMap::new();
        for seg in self.segments() {
            *totals.entry(seg.kind).or_insert(0) += seg.duration_secs;
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn sample_timeline() -> Timeline {
        let mut t = Timeline::new(at(8, 0));
        let s1 = TimelineSegment::new(SegmentKind::Changeover, SegmentOrigin::Lot, "L1", at(8, 0), 1800);
        let s2 = TimelineSegment::new(SegmentKind::Production, SegmentOrigin::Lot, "L1", s1.end, 3600);
        let s3 = TimelineSegment::new(SegmentKind::PeakObligation, SegmentOrigin::Calendar, "L1", s2.end, 600);
        t.lots.push(LotTimeline {
            lot_id: "L1".into(),
            start: at(8, 0),
            end: s3.end,
            quantity: 50.0,
            segments: vec![s1, s2, s3],
        });
        t
    }

    #[test]
    fn test_segment_end_from_duration() {
        let s = TimelineSegment::new(SegmentKind::Production, SegmentOrigin::Lot, "L1", at(8, 0), 5400);
        assert_eq!(s.end, at(9, 30));
        assert_eq!(s.label, "Production");
    }

    #[test]
    fn test_negative_duration_clamped() {
        let s = TimelineSegment::new(SegmentKind::AdHocStop, SegmentOrigin::Lot, "L1", at(8, 0), -60);
        assert_eq!(s.duration_secs, 0);
        assert_eq!(s.start, s.end);
    }

    #[test]
    fn test_oversized_duration_saturates() {
        let s = TimelineSegment::new(SegmentKind::Changeover, SegmentOrigin::Lot, "L1", at(8, 0), i64::MAX);
        assert_eq!(s.duration_secs, MAX_DURATION_SECS);

        let late = NaiveDate::MAX.and_hms_opt(23, 0, 0).unwrap();
        let s = TimelineSegment::new(SegmentKind::Production, SegmentOrigin::Lot, "L1", late, 7200);
        assert_eq!(s.end, NaiveDateTime::MAX);
        assert_eq!(s.duration_secs, 3599);
        assert_eq!(shift_secs(at(8, 0), -i64::MAX), at(8, 0) - chrono::Duration::seconds(MAX_DURATION_SECS));
    }

    #[test]
    fn test_overlap_secs() {
        let s = TimelineSegment::new(SegmentKind::Changeover, SegmentOrigin::Lot, "L1", at(18, 0), 3600);
        assert_eq!(s.overlap_secs(at(18, 30), at(20, 30)), 1800);
        assert_eq!(s.overlap_secs(at(19, 0), at(20, 0)), 0); // touching
        assert_eq!(s.overlap_secs(at(17, 0), at(21, 0)), 3600);
    }

    #[test]
    fn test_lot_totals() {
        let t = sample_timeline();
        let lot = t.lot("L1").unwrap();
        assert_eq!(lot.declared_secs(), 5400);
        assert_eq!(lot.obligation_secs(), 600);
        assert_eq!(lot.production_secs(), 3600);
        assert_eq!(lot.duration_secs(), 6000);
    }

    #[test]
    fn test_timeline_contiguous() {
        let mut t = sample_timeline();
        assert!(t.is_contiguous());
        assert_eq!(t.segment_count(), 3);
        assert_eq!(t.span_secs(), 6000);

        t.lots[0].segments[1].start = at(8, 31);
        assert!(!t.is_contiguous());
    }

    #[test]
    fn test_totals_by_kind() {
        let t = sample_timeline();
        let totals = t.totals_by_kind();
        assert_eq!(totals[&SegmentKind::Changeover], 1800);
        assert_eq!(totals[&SegmentKind::PeakObligation], 600);
        assert!(!totals.contains_key(&SegmentKind::RingChange));
    }

    #[test]
    fn test_empty_timeline() {
        let t = Timeline::new(at(8, 0));
        assert_eq!(t.end(), at(8, 0));
        assert!(t.is_contiguous());
        assert_eq!(t.segment_count(), 0);
    }
}
