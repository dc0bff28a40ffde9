//! Lot sequencing problem and cost evaluator.
//!
//! Scores a sequence of lot assignments by walking it once with an
//! elapsed-time clock (days):
//!
//! ```text
//! for each assignment a at position i:
//!     elapsed      += changeover(prev, a) / hours_per_day        (i > 0)
//!     stockout      = max(0, elapsed − stock[a.lot])
//!     lost_units   += stockout × daily_sale[a.lot]
//!     stock[a.lot] += a.size / daily_sale[a.lot]                 (999 if no sales)
//!     elapsed      += production_days[a.lot] × a.size / Σ size(a.lot)
//!
//! objective = w · lost_units · cost_per_ton
//!           + (1 − w) · changeover_hours · cost_per_hour
//! fitness   = 1 / (objective + ε)
//! ```
//!
//! Invalid numbers (negative, NaN) are clamped to zero when the problem
//! is built, so evaluation never fails.
//!
//! # Reference
//! Allahverdi et al. (2008), "A survey of scheduling problems with
//! setup times or costs"

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::chromosome::LotAssignment;
use crate::error::{Result, SequencerError};
use crate::models::ChangeoverMatrix;

/// Added to the objective before inverting it into a fitness.
pub const FITNESS_EPSILON: f64 = 1e-4;
/// Stock-days credited per replenishment when a lot has no sales.
pub const NO_SALE_STOCK_DAYS: f64 = 999.0;

/// Demand and stock data of one lot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotDemand {
    /// Lot ID.
    pub lot_id: String,
    /// Product code.
    pub sku: String,
    /// Daily sale rate (tons/day).
    pub daily_sale: f64,
    /// Remaining stock coverage (days).
    pub stock_days: f64,
    /// Time to produce the whole lot (days).
    pub production_days: f64,
    /// Lot size (tons).
    pub size: f64,
    /// Change-group index into the matrix. `None` = unmapped.
    pub change_group: Option<usize>,
}

impl LotDemand {
    /// Creates a lot without demand data.
    pub fn new(lot_id: impl Into<String>, sku: impl Into<String>) -> Self {
        Self {
            lot_id: lot_id.into(),
            sku: sku.into(),
            daily_sale: 0.0,
            stock_days: 0.0,
            production_days: 0.0,
            size: 0.0,
            change_group: None,
        }
    }

    /// Sets the daily sale rate.
    pub fn with_daily_sale(mut self, tons_per_day: f64) -> Self {
        self.daily_sale = tons_per_day;
        self
    }

    /// Sets the remaining stock coverage.
    pub fn with_stock_days(mut self, days: f64) -> Self {
        self.stock_days = days;
        self
    }

    /// Sets the production time.
    pub fn with_production_days(mut self, days: f64) -> Self {
        self.production_days = days;
        self
    }

    /// Sets the lot size.
    pub fn with_size(mut self, tons: f64) -> Self {
        self.size = tons;
        self
    }

    /// Sets the change-group index.
    pub fn with_change_group(mut self, group: usize) -> Self {
        self.change_group = Some(group);
        self
    }

    fn sanitized(mut self) -> Self {
        for (name, value) in [
            ("daily_sale", &mut self.daily_sale),
            ("stock_days", &mut self.stock_days),
            ("production_days", &mut self.production_days),
            ("size", &mut self.size),
        ] {
            if !value.is_finite() || *value < 0.0 {
                warn!(lot = %self.lot_id, field = name, value = *value, "clamping invalid value to zero");
                *value = 0.0;
            }
        }
        self
    }
}

/// Parallel per-lot columns, as exported by planning spreadsheets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProblemColumns {
    /// Lot IDs.
    pub lot_ids: Vec<String>,
    /// Product codes.
    pub skus: Vec<String>,
    /// Daily sale rates.
    pub daily_sale: Vec<f64>,
    /// Remaining stock-days.
    pub stock_days: Vec<f64>,
    /// Production days.
    pub production_days: Vec<f64>,
    /// Lot sizes.
    pub sizes: Vec<f64>,
    /// Change-group indices.
    pub change_groups: Vec<Option<usize>>,
}

/// Cost coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostWeights {
    /// Weight of the lost-sale cost, in [0, 1].
    pub sale_weight: f64,
    /// Cost per ton of lost sales.
    pub cost_per_ton_lost: f64,
    /// Cost per changeover hour.
    pub cost_per_changeover_hour: f64,
    /// Working hours per day.
    pub hours_per_day: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            sale_weight: 0.5,
            cost_per_ton_lost: 100.0,
            cost_per_changeover_hour: 5000.0,
            hours_per_day: 24.0,
        }
    }
}

impl CostWeights {
    /// Sets the sale weight.
    pub fn with_sale_weight(mut self, weight: f64) -> Self {
        self.sale_weight = weight;
        self
    }

    /// Sets the cost per lost ton.
    pub fn with_cost_per_ton_lost(mut self, cost: f64) -> Self {
        self.cost_per_ton_lost = cost;
        self
    }

    /// Sets the cost per changeover hour.
    pub fn with_cost_per_changeover_hour(mut self, cost: f64) -> Self {
        self.cost_per_changeover_hour = cost;
        self
    }

    /// Sets the working hours per day.
    pub fn with_hours_per_day(mut self, hours: f64) -> Self {
        self.hours_per_day = hours;
        self
    }

    /// Copy with every field in its valid range.
    pub fn clamped(self) -> Self {
        let non_negative = |v: f64| if v.is_finite() && v > 0.0 { v } else { 0.0 };
        let defaults = Self::default();
        Self {
            sale_weight: if self.sale_weight.is_finite() {
                self.sale_weight.clamp(0.0, 1.0)
            } else {
                defaults.sale_weight
            },
            cost_per_ton_lost: non_negative(self.cost_per_ton_lost),
            cost_per_changeover_hour: non_negative(self.cost_per_changeover_hour),
            hours_per_day: if self.hours_per_day.is_finite() && self.hours_per_day > 0.0 {
                self.hours_per_day
            } else {
                defaults.hours_per_day
            },
        }
    }
}

/// Decomposed cost of one sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// Total changeover time (hours).
    pub changeover_hours: f64,
    /// Total changeover time (days).
    pub changeover_days: f64,
    /// Projected lost sales (tons).
    pub lost_sale_units: f64,
    /// Elapsed time at the end of the sequence (days).
    pub elapsed_days: f64,
    /// Changeover hours before each position (0 for the first).
    pub changeover_times: Vec<f64>,
    /// `lost_sale_units × cost_per_ton_lost`.
    pub lost_sale_cost: f64,
    /// `changeover_hours × cost_per_changeover_hour`.
    pub changeover_cost: f64,
    /// Weighted objective.
    pub objective: f64,
}

impl CostBreakdown {
    /// Production time without changeovers (days).
    pub fn production_days(&self) -> f64 {
        self.elapsed_days - self.changeover_days
    }

    /// Unweighted monetary cost.
    pub fn total_cost(&self) -> f64 {
        self.lost_sale_cost + self.changeover_cost
    }

    /// `1 / (objective + ε)`, strictly positive.
    pub fn fitness(&self) -> f64 {
        1.0 / (self.objective.max(0.0) + FITNESS_EPSILON)
    }
}

/// A lot sequencing instance.
///
/// Holds the lots, their assignment arena (one entry per lot unless
/// split), the changeover matrix and the cost weights. Sequences are
/// permutations of assignment IDs.
#[derive(Debug, Clone)]
pub struct SequencingProblem {
    lots: Vec<LotDemand>,
    assignments: Vec<LotAssignment>,
    lot_sizes: Vec<f64>,
    matrix: ChangeoverMatrix,
    weights: CostWeights,
}

impl SequencingProblem {
    /// Creates a problem with one assignment per lot.
    pub fn new(lots: Vec<LotDemand>, matrix: ChangeoverMatrix, weights: CostWeights) -> Self {
        let lots: Vec<LotDemand> = lots.into_iter().map(LotDemand::sanitized).collect();
        let assignments = lots
            .iter()
            .enumerate()
            .map(|(i, l)| LotAssignment::new(i, i, 1, l.size))
            .collect();
        let mut problem = Self {
            lots,
            assignments,
            lot_sizes: Vec::new(),
            matrix,
            weights: weights.clamped(),
        };
        problem.refresh_sizes();
        problem
    }

    /// Creates a problem from parallel columns.
    ///
    /// # Errors
    /// [`SequencerError::LengthMismatch`] when a column's length differs
    /// from `lot_ids`.
    pub fn from_columns(
        columns: ProblemColumns,
        matrix: ChangeoverMatrix,
        weights: CostWeights,
    ) -> Result<Self> {
        let n = columns.lot_ids.len();
        for (field, len) in [
            ("skus", columns.skus.len()),
            ("daily_sale", columns.daily_sale.len()),
            ("stock_days", columns.stock_days.len()),
            ("production_days", columns.production_days.len()),
            ("sizes", columns.sizes.len()),
            ("change_groups", columns.change_groups.len()),
        ] {
            if len != n {
                return Err(SequencerError::LengthMismatch {
                    field,
                    expected: n,
                    actual: len,
                });
            }
        }

        let lots = columns
            .lot_ids
            .into_iter()
            .zip(columns.skus)
            .enumerate()
            .map(|(i, (lot_id, sku))| LotDemand {
                lot_id,
                sku,
                daily_sale: columns.daily_sale[i],
                stock_days: columns.stock_days[i],
                production_days: columns.production_days[i],
                size: columns.sizes[i],
                change_group: columns.change_groups[i],
            })
            .collect();

        Ok(Self::new(lots, matrix, weights))
    }

    /// Replaces the assignments of `lot` with one sub-lot per size.
    ///
    /// Assignment IDs are renumbered. Non-positive sizes are dropped;
    /// a lot left without sub-lots keeps a single full-size assignment.
    pub fn split_lot(&mut self, lot: usize, sizes: &[f64]) {
        if lot >= self.lots.len() {
            warn!(lot, "split ignored: lot index out of range");
            return;
        }
        let sizes: Vec<f64> = sizes
            .iter()
            .copied()
            .filter(|s| s.is_finite() && *s > 0.0)
            .collect();
        if sizes.is_empty() {
            return;
        }

        let mut rebuilt = Vec::with_capacity(self.assignments.len() + sizes.len());
        for a in &self.assignments {
            if a.lot != lot {
                rebuilt.push(LotAssignment::new(rebuilt.len(), a.lot, a.sublot, a.size));
            } else if a.sublot == 1 {
                for (k, size) in sizes.iter().enumerate() {
                    rebuilt.push(LotAssignment::new(rebuilt.len(), lot, k as u32 + 1, *size));
                }
            }
        }
        self.assignments = rebuilt;
        self.refresh_sizes();
    }

    /// Builder form of [`split_lot`](Self::split_lot).
    pub fn with_split_lot(mut self, lot: usize, sizes: &[f64]) -> Self {
        self.split_lot(lot, sizes);
        self
    }

    /// Lots.
    pub fn lots(&self) -> &[LotDemand] {
        &self.lots
    }

    /// Assignment arena, indexed by assignment ID.
    pub fn assignments(&self) -> &[LotAssignment] {
        &self.assignments
    }

    /// Number of assignments (sequence length).
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Whether there is nothing to sequence.
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Cost coefficients.
    pub fn weights(&self) -> &CostWeights {
        &self.weights
    }

    /// Changeover matrix.
    pub fn matrix(&self) -> &ChangeoverMatrix {
        &self.matrix
    }

    /// Copy of this problem with another sale weight.
    pub fn with_sale_weight(&self, sale_weight: f64) -> Self {
        let mut problem = self.clone();
        problem.weights = self.weights.with_sale_weight(sale_weight).clamped();
        problem
    }

    /// Changeover hours between two assignments.
    #[inline]
    pub fn changeover_hours(&self, from: usize, to: usize) -> f64 {
        let group = |id: usize| {
            self.assignments
                .get(id)
                .and_then(|a| self.lots.get(a.lot))
                .and_then(|l| l.change_group)
        };
        self.matrix.hours_between(group(from), group(to))
    }

    /// Stock-days of the lot behind an assignment.
    pub fn stock_days_of(&self, assignment: usize) -> f64 {
        self.assignments
            .get(assignment)
            .and_then(|a| self.lots.get(a.lot))
            .map_or(0.0, |l| l.stock_days)
    }

    /// The heuristic order: assignments by ascending remaining stock-days.
    ///
    /// Ties keep arena order.
    pub fn earliest_stockout_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.assignments.len()).collect();
        order.sort_by(|&a, &b| self.stock_days_of(a).total_cmp(&self.stock_days_of(b)));
        order
    }

    /// Evaluates a sequence of assignment IDs.
    ///
    /// Unknown IDs are skipped.
    pub fn evaluate(&self, order: &[usize]) -> CostBreakdown {
        let mut stock: Vec<f64> = self.lots.iter().map(|l| l.stock_days).collect();
        let mut changeover_times = vec![0.0; order.len()];
        let mut changeover_hours = 0.0;
        let mut elapsed = 0.0;
        let mut lost_units = 0.0;
        let mut prev: Option<usize> = None;

        for (pos, &id) in order.iter().enumerate() {
            let Some(a) = self.assignments.get(id) else {
                continue;
            };
            let lot = &self.lots[a.lot];

            if let Some(p) = prev {
                let hours = self.changeover_hours(p, id);
                changeover_times[pos] = hours;
                changeover_hours += hours;
                elapsed += hours / self.weights.hours_per_day;
            }

            let stockout = (elapsed - stock[a.lot]).max(0.0);
            lost_units += stockout * lot.daily_sale;

            stock[a.lot] += if lot.daily_sale > 0.0 {
                a.size / lot.daily_sale
            } else {
                NO_SALE_STOCK_DAYS
            };

            let total = self.lot_sizes[a.lot];
            if total > 0.0 {
                elapsed += lot.production_days * a.size / total;
            }
            prev = Some(id);
        }

        let w = self.weights;
        let lost_sale_cost = lost_units * w.cost_per_ton_lost;
        let changeover_cost = changeover_hours * w.cost_per_changeover_hour;
        let objective =
            (w.sale_weight * lost_sale_cost + (1.0 - w.sale_weight) * changeover_cost).max(0.0);

        CostBreakdown {
            changeover_hours,
            changeover_days: changeover_hours / w.hours_per_day,
            lost_sale_units: lost_units,
            elapsed_days: elapsed,
            changeover_times,
            lost_sale_cost,
            changeover_cost,
            objective,
        }
    }

    /// Fitness of a sequence.
    pub fn fitness(&self, order: &[usize]) -> f64 {
        self.evaluate(order).fitness()
    }

    fn refresh_sizes(&mut self) {
        self.lot_sizes = vec![0.0; self.lots.len()];
        for a in &self.assignments {
            self.lot_sizes[a.lot] += a.size;
        }
    }
}
