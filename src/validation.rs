//! Input diagnostics for simulation and sequencing.
//!
//! The simulator and optimizer clamp bad data instead of failing, so
//! these checks are advisory: they report what will be clamped or
//! ignored. Detects:
//! - Duplicate lot IDs
//! - Non-finite or negative quantities, paces and durations
//! - Lots with quantity but no usable pace
//! - Change groups missing from the changeover matrix
//! - Ad-hoc stops referencing unknown lots

use std::collections::HashSet;

use crate::ga::LotDemand;
use crate::models::{ChangeoverMatrix, Lot};
use crate::scheduler::SimulationRequest;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationIssue>>;

/// A validation finding.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    /// Issue category.
    pub kind: ValidationIssueKind,
    /// Affected lot, if any.
    pub lot_id: Option<String>,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationIssueKind {
    /// Two lots share the same ID.
    DuplicateId,
    /// A numeric field is NaN, infinite or negative.
    InvalidNumber,
    /// Quantity is positive but pace is not; production will be empty.
    MissingPace,
    /// A change group is not in the changeover matrix.
    UnmappedChangeGroup,
    /// An ad-hoc stop names a lot that is not in the sequence.
    UnknownLot,
}

impl ValidationIssue {
    fn new(kind: ValidationIssueKind, lot_id: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            lot_id: Some(lot_id.to_string()),
            message: message.into(),
        }
    }
}

/// Validates lots before simulation.
///
/// Checks:
/// 1. No duplicate lot IDs
/// 2. Quantity and pace are finite and non-negative
/// 3. Lots with quantity have a pace
/// 4. No negative duration components
/// 5. Change groups resolve in `matrix` (skipped when `matrix` is empty)
pub fn validate_lots(lots: &[Lot], matrix: &ChangeoverMatrix) -> ValidationResult {
    let mut issues = Vec::new();
    let mut ids = HashSet::new();

    for lot in lots {
        if !ids.insert(lot.id.as_str()) {
            issues.push(ValidationIssue::new(
                ValidationIssueKind::DuplicateId,
                &lot.id,
                format!("Duplicate lot ID: {}", lot.id),
            ));
        }

        for (field, value) in [("quantity", lot.quantity), ("pace", lot.pace)] {
            if !value.is_finite() || value < 0.0 {
                issues.push(ValidationIssue::new(
                    ValidationIssueKind::InvalidNumber,
                    &lot.id,
                    format!("Lot '{}' has invalid {field}: {value}", lot.id),
                ));
            }
        }

        if lot.quantity > 0.0 && (lot.pace.is_nan() || lot.pace <= 0.0) {
            issues.push(ValidationIssue::new(
                ValidationIssueKind::MissingPace,
                &lot.id,
                format!("Lot '{}' has quantity {} but no pace", lot.id, lot.quantity),
            ));
        }

        let components = [
            ("changeover", lot.changeover_secs),
            ("quality change", lot.quality_change_secs),
            ("stop change", lot.stop_change_secs),
            ("adjustment", lot.adjustment_secs),
            ("ring change", lot.ring_change_secs),
            ("channel change", lot.channel_change_secs),
        ];
        let stoppages = lot.stoppages.iter().map(|(k, v)| (k.as_str(), *v));
        for (name, secs) in components.into_iter().chain(stoppages) {
            if secs < 0 {
                issues.push(ValidationIssue::new(
                    ValidationIssueKind::InvalidNumber,
                    &lot.id,
                    format!("Lot '{}' has negative {name}: {secs} s", lot.id),
                ));
            }
        }

        if let Some(group) = &lot.change_group {
            if !matrix.is_empty() && matrix.group_index(group).is_none() {
                issues.push(ValidationIssue::new(
                    ValidationIssueKind::UnmappedChangeGroup,
                    &lot.id,
                    format!("Lot '{}' references unknown change group '{group}'", lot.id),
                ));
            }
        }
    }

    finish(issues)
}

/// Validates a simulation request: its lots plus ad-hoc stop references.
pub fn validate_request(request: &SimulationRequest, matrix: &ChangeoverMatrix) -> ValidationResult {
    let mut issues = validate_lots(&request.lots, matrix).err().unwrap_or_default();
    let ids: HashSet<&str> = request.lots.iter().map(|l| l.id.as_str()).collect();

    for stop in &request.ad_hoc_stops {
        if !ids.contains(stop.lot_id.as_str()) {
            issues.push(ValidationIssue::new(
                ValidationIssueKind::UnknownLot,
                &stop.lot_id,
                format!("Ad-hoc stop '{}' references unknown lot '{}'", stop.label, stop.lot_id),
            ));
        }
        if stop.duration_secs <= 0 {
            issues.push(ValidationIssue::new(
                ValidationIssueKind::InvalidNumber,
                &stop.lot_id,
                format!("Ad-hoc stop '{}' has no duration", stop.label),
            ));
        }
    }

    finish(issues)
}

/// Validates optimizer lots.
///
/// Checks duplicate IDs, invalid numbers and change-group indices
/// outside `matrix`.
pub fn validate_demand(lots: &[LotDemand], matrix: &ChangeoverMatrix) -> ValidationResult {
    let mut issues = Vec::new();
    let mut ids = HashSet::new();

    for lot in lots {
        if !ids.insert(lot.lot_id.as_str()) {
            issues.push(ValidationIssue::new(
                ValidationIssueKind::DuplicateId,
                &lot.lot_id,
                format!("Duplicate lot ID: {}", lot.lot_id),
            ));
        }

        for (field, value) in [
            ("daily_sale", lot.daily_sale),
            ("stock_days", lot.stock_days),
            ("production_days", lot.production_days),
            ("size", lot.size),
        ] {
            if !value.is_finite() || value < 0.0 {
                issues.push(ValidationIssue::new(
                    ValidationIssueKind::InvalidNumber,
                    &lot.lot_id,
                    format!("Lot '{}' has invalid {field}: {value}", lot.lot_id),
                ));
            }
        }

        if let Some(g) = lot.change_group {
            if g >= matrix.len() {
                issues.push(ValidationIssue::new(
                    ValidationIssueKind::UnmappedChangeGroup,
                    &lot.lot_id,
                    format!(
                        "Lot '{}' change group {g} is outside the {}-group matrix",
                        lot.lot_id,
                        matrix.len()
                    ),
                ));
            }
        }
    }

    finish(issues)
}

fn finish(issues: Vec<ValidationIssue>) -> ValidationResult {
    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}
