//! Timeline quality metrics (KPIs).
//!
//! Summarises a simulated timeline for reporting.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Span | Last segment end − run start |
//! | Production time | Sum of production segments |
//! | Stoppage time | Sum of every other segment |
//! | Obligation time | Stoppage inserted by the calendar |
//! | Utilisation | Production time / span |
//! | Changeovers | Lots carrying a size changeover segment |
//!
//! Daily buckets split segments at midnight; each lot's quantity is
//! prorated over its production seconds.
//!
//! # Reference
//! Nakajima (1988), "Introduction to TPM", Ch. 2: availability losses

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::models::{SegmentKind, SegmentOrigin, Timeline};

/// Timeline performance indicators. Durations in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineKpi {
    /// Run start → last segment end.
    pub span_secs: i64,
    /// Time producing.
    pub production_secs: i64,
    /// Time stopped, for any reason.
    pub stoppage_secs: i64,
    /// Stoppage inserted by the obligation calendar.
    pub obligation_secs: i64,
    /// Production / span (0.0..1.0); 0 for an empty timeline.
    pub utilization: f64,
    /// Total produced quantity (tons).
    pub total_quantity: f64,
    /// Number of lots.
    pub lot_count: usize,
    /// Lots preceded by a size changeover.
    pub changeover_count: usize,
    /// Time per segment kind.
    pub by_kind: BTreeMap<SegmentKind, i64>,
}

/// Activity within one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    /// Calendar date.
    pub date: NaiveDate,
    /// Production time (s).
    pub production_secs: i64,
    /// Stoppage time (s).
    pub stoppage_secs: i64,
    /// Quantity produced on this day (tons).
    pub quantity: f64,
    /// Time per segment kind (s).
    pub by_kind: BTreeMap<SegmentKind, i64>,
}

impl DailySummary {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            production_secs: 0,
            stoppage_secs: 0,
            quantity: 0.0,
            by_kind: BTreeMap::new(),
        }
    }

    /// Production / (production + stoppage) for the day.
    pub fn utilization(&self) -> f64 {
        let busy = self.production_secs + self.stoppage_secs;
        if busy == 0 {
            0.0
        } else {
            self.production_secs as f64 / busy as f64
        }
    }
}

impl TimelineKpi {
    /// Computes KPIs from a timeline.
    pub fn calculate(timeline: &Timeline) -> Self {
        let by_kind = timeline.totals_by_kind();
        let production_secs = by_kind.get(&SegmentKind::Production).copied().unwrap_or(0);
        let stoppage_secs = by_kind
            .iter()
            .filter(|(k, _)| k.is_stoppage())
            .map(|(_, s)| s)
            .sum();
        let obligation_secs = timeline
            .segments()
            .filter(|s| s.origin == SegmentOrigin::Calendar)
            .map(|s| s.duration_secs)
            .sum();

        let span_secs = timeline.span_secs();
        let utilization = if span_secs > 0 {
            production_secs as f64 / span_secs as f64
        } else {
            0.0
        };

        Self {
            span_secs,
            production_secs,
            stoppage_secs,
            obligation_secs,
            utilization,
            total_quantity: timeline.lots.iter().map(|l| l.quantity).sum(),
            lot_count: timeline.lots.len(),
            changeover_count: timeline
                .lots
                .iter()
                .filter(|l| l.segments.iter().any(|s| s.kind == SegmentKind::Changeover))
                .count(),
            by_kind,
        }
    }

    /// Per-day buckets, in date order. Days without segments are omitted.
    pub fn daily(timeline: &Timeline) -> Vec<DailySummary> {
        let mut days: BTreeMap<NaiveDate, DailySummary> = BTreeMap::new();

        for lot in &timeline.lots {
            let lot_production = lot.production_secs();
            for seg in &lot.segments {
                for (date, secs) in split_at_midnight(seg.start, seg.end) {
                    let day = days.entry(date).or_insert_with(|| DailySummary::empty(date));
                    *day.by_kind.entry(seg.kind).or_insert(0) += secs;
                    if seg.kind.is_stoppage() {
                        day.stoppage_secs += secs;
                    } else {
                        day.production_secs += secs;
                        if lot_production > 0 {
                            day.quantity += lot.quantity * secs as f64 / lot_production as f64;
                        }
                    }
                }
            }
        }

        days.into_values().collect()
    }

    /// Whether the timeline meets the given quality thresholds.
    pub fn meets_thresholds(&self, min_utilization: f64, max_obligation_secs: i64) -> bool {
        self.utilization >= min_utilization && self.obligation_secs <= max_obligation_secs
    }
}

/// Splits `[start, end)` into per-date portions (seconds).
fn split_at_midnight(start: NaiveDateTime, end: NaiveDateTime) -> Vec<(NaiveDate, i64)> {
    let mut parts = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let date = cursor.date();
        let next_midnight = date
            .succ_opt()
            .map(|d| d.and_time(chrono::NaiveTime::MIN))
            .unwrap_or(end);
        let stop = next_midnight.min(end);
        parts.push((date, (stop - cursor).num_seconds()));
        if stop <= cursor {
            break;
        }
        cursor = stop;
    }
    parts
}
