//! Lot model.
//!
//! A lot is a quantity of one SKU produced as a contiguous run on the
//! line. Besides quantity and pace it carries the named stoppage
//! components that precede production (changeover, quality change, ...)
//! and an open map of ad-hoc stoppages.
//!
//! # Units
//! Quantities are tons, pace is tons/hour, all durations are whole
//! seconds. Constructors taking minutes or hours clamp negative and
//! non-finite inputs to zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::SegmentKind;

/// Longest single duration (ten years); longer inputs are capped.
pub const MAX_DURATION_SECS: i64 = 3_653 * 86_400;

/// Converts minutes to whole seconds, clamping invalid input to zero.
pub fn minutes_to_secs(minutes: f64) -> i64 {
    hours_to_secs(minutes / 60.0)
}

/// Converts hours to whole seconds, clamping invalid input to zero and
/// capping at [`MAX_DURATION_SECS`].
pub fn hours_to_secs(hours: f64) -> i64 {
    if hours.is_finite() && hours > 0.0 {
        ((hours * 3600.0).round() as i64).min(MAX_DURATION_SECS)
    } else {
        0
    }
}

/// A production lot with pre-resolved attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lot {
    /// Unique lot identifier.
    pub id: String,
    /// Product code.
    pub sku: String,
    /// Quantity to produce (tons).
    pub quantity: f64,
    /// Line pace for this SKU (tons/hour).
    pub pace: f64,
    /// Change-group (tooling family). `None` = unmapped.
    pub change_group: Option<String>,
    /// Size changeover (s).
    pub changeover_secs: i64,
    /// Quality change (s).
    pub quality_change_secs: i64,
    /// Stop change (s).
    pub stop_change_secs: i64,
    /// Hit-and-calibration adjustment (s).
    pub adjustment_secs: i64,
    /// Manually planned ring change (s).
    pub ring_change_secs: i64,
    /// Manually planned channel change (s).
    pub channel_change_secs: i64,
    /// Named ad-hoc stoppages (s), emitted in key order.
    pub stoppages: BTreeMap<String, i64>,
}

impl Lot {
    /// Creates an empty lot.
    pub fn new(id: impl Into<String>, sku: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sku: sku.into(),
            quantity: 0.0,
            pace: 0.0,
            change_group: None,
            changeover_secs: 0,
            quality_change_secs: 0,
            stop_change_secs: 0,
            adjustment_secs: 0,
            ring_change_secs: 0,
            channel_change_secs: 0,
            stoppages: BTreeMap::new(),
        }
    }

    /// Sets quantity (tons).
    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.quantity = quantity;
        self
    }

    /// Sets pace (tons/hour).
    pub fn with_pace(mut self, pace: f64) -> Self {
        self.pace = pace;
        self
    }

    /// Sets the change-group.
    pub fn with_change_group(mut self, group: impl Into<String>) -> Self {
        self.change_group = Some(group.into());
        self
    }

    /// Sets the size changeover (minutes).
    pub fn with_changeover_minutes(mut self, minutes: f64) -> Self {
        self.changeover_secs = minutes_to_secs(minutes);
        self
    }

    /// Sets the quality change (minutes).
    pub fn with_quality_change_minutes(mut self, minutes: f64) -> Self {
        self.quality_change_secs = minutes_to_secs(minutes);
        self
    }

    /// Sets the stop change (minutes).
    pub fn with_stop_change_minutes(mut self, minutes: f64) -> Self {
        self.stop_change_secs = minutes_to_secs(minutes);
        self
    }

    /// Sets the calibration adjustment (minutes).
    pub fn with_adjustment_minutes(mut self, minutes: f64) -> Self {
        self.adjustment_secs = minutes_to_secs(minutes);
        self
    }

    /// Sets a manually planned ring change (minutes).
    pub fn with_ring_change_minutes(mut self, minutes: f64) -> Self {
        self.ring_change_secs = minutes_to_secs(minutes);
        self
    }

    /// Sets a manually planned channel change (minutes).
    pub fn with_channel_change_minutes(mut self, minutes: f64) -> Self {
        self.channel_change_secs = minutes_to_secs(minutes);
        self
    }

    /// Adds a named ad-hoc stoppage (minutes).
    pub fn with_stoppage_minutes(mut self, name: impl Into<String>, minutes: f64) -> Self {
        self.stoppages.insert(name.into(), minutes_to_secs(minutes));
        self
    }

    /// Production block length (s): `quantity / pace` hours.
    ///
    /// Zero when either value is missing, negative or non-finite.
    pub fn production_secs(&self) -> i64 {
        if self.pace > 0.0 && self.quantity > 0.0 {
            hours_to_secs(self.quantity / self.pace)
        } else {
            0
        }
    }

    /// Fixed stoppage components in emission order, negatives clamped.
    ///
    /// Zero-length components are skipped. Ad-hoc stoppages are listed
    /// last, labelled with their map key.
    pub fn stoppage_components(&self) -> Vec<(SegmentKind, i64, String)> {
        let fixed = [
            (SegmentKind::Changeover, self.changeover_secs),
            (SegmentKind::QualityChange, self.quality_change_secs),
            (SegmentKind::StopChange, self.stop_change_secs),
            (SegmentKind::Adjustment, self.adjustment_secs),
            (SegmentKind::RingChange, self.ring_change_secs),
            (SegmentKind::ChannelChange, self.channel_change_secs),
        ];

        let mut components: Vec<(SegmentKind, i64, String)> = fixed
            .into_iter()
            .filter(|(_, secs)| *secs > 0)
            .map(|(kind, secs)| (kind, secs, kind.label().to_string()))
            .collect();

        components.extend(
            self.stoppages
                .iter()
                .filter(|(_, secs)| **secs > 0)
                .map(|(name, secs)| (SegmentKind::AdHocStop, *secs, name.clone())),
        );
        components
    }

    /// Sum of all declared duration components including production (s).
    pub fn declared_secs(&self) -> i64 {
        self.stoppage_components()
            .iter()
            .fold(self.production_secs(), |acc, (_, s, _)| acc.saturating_add(*s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minutes_to_secs_clamps() {
        assert_eq!(minutes_to_secs(1.5), 90);
        assert_eq!(minutes_to_secs(-10.0), 0);
        assert_eq!(minutes_to_secs(f64::NAN), 0);
        assert_eq!(minutes_to_secs(f64::INFINITY), 0);
        assert_eq!(hours_to_secs(2.0), 7200);
        assert_eq!(hours_to_secs(1e15), MAX_DURATION_SECS);
        assert_eq!(hours_to_secs(f64::MAX), MAX_DURATION_SECS);
    }

    #[test]
    fn test_production_secs() {
        let lot = Lot::new("L1", "SKU1").with_quantity(300.0).with_pace(60.0);
        assert_eq!(lot.production_secs(), 5 * 3600);

        let no_pace = Lot::new("L2", "SKU1").with_quantity(300.0);
        assert_eq!(no_pace.production_secs(), 0);

        let nan = Lot::new("L3", "SKU1").with_quantity(f64::NAN).with_pace(10.0);
        assert_eq!(nan.production_secs(), 0);
    }

    #[test]
    fn test_stoppage_components_order() {
        let lot = Lot::new("L1", "SKU1")
            .with_changeover_minutes(60.0)
            .with_adjustment_minutes(30.0)
            .with_stoppage_minutes("maintenance", 15.0)
            .with_stoppage_minutes("cleaning", 0.0);

        let comps = lot.stoppage_components();
        let kinds: Vec<SegmentKind> = comps.iter().map(|c| c.0).collect();
        assert_eq!(
            kinds,
            vec![SegmentKind::Changeover, SegmentKind::Adjustment, SegmentKind::AdHocStop]
        );
        assert_eq!(comps[2].2, "maintenance");
    }

    #[test]
    fn test_negative_raw_components_skipped() {
        let mut lot = Lot::new("L1", "SKU1");
        lot.changeover_secs = -600;
        lot.stoppages.insert("bad".into(), -5);
        assert!(lot.stoppage_components().is_empty());
        assert_eq!(lot.declared_secs(), 0);
    }

    #[test]
    fn test_declared_secs() {
        let lot = Lot::new("L1", "SKU1")
            .with_quantity(100.0)
            .with_pace(50.0)
            .with_quality_change_minutes(60.0)
            .with_stop_change_minutes(10.0);
        assert_eq!(lot.declared_secs(), 2 * 3600 + 3600 + 600);
    }
}
