//! Permutation chromosome for lot sequencing.
//!
//! # Encoding
//!
//! A chromosome is a permutation of assignment IDs. Assignments live in
//! an arena owned by [`SequencingProblem`]; an ID is the arena index.
//! Sub-lots of the same lot are distinct entries with distinct IDs, so
//! operators compare IDs, never lot contents.
//!
//! # Reference
//! Davis (1985), "Applying adaptive algorithms to epistatic domains" (OX1)

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::problem::{CostBreakdown, SequencingProblem};

/// One schedulable unit: a whole lot or a sub-lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotAssignment {
    /// Arena index.
    pub id: usize,
    /// Index of the lot in the problem.
    pub lot: usize,
    /// Sub-lot number (1-based).
    pub sublot: u32,
    /// Assigned size (tons).
    pub size: f64,
}

impl LotAssignment {
    /// Creates an assignment.
    pub fn new(id: usize, lot: usize, sublot: u32, size: f64) -> Self {
        Self {
            id,
            lot,
            sublot,
            size,
        }
    }
}

/// An evaluated sequence.
///
/// Higher fitness = better sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceChromosome {
    /// Assignment IDs in production order.
    pub order: Vec<usize>,
    /// Cost of `order`.
    pub costs: CostBreakdown,
    /// `1 / (objective + ε)`.
    pub fitness: f64,
}

impl SequenceChromosome {
    /// Evaluates `order` against `problem`.
    pub fn evaluated(order: Vec<usize>, problem: &SequencingProblem) -> Self {
        let costs = problem.evaluate(&order);
        let fitness = costs.fitness();
        Self {
            order,
            costs,
            fitness,
        }
    }

    /// Whether `order` holds each of `0..n` exactly once.
    pub fn is_permutation(&self, n: usize) -> bool {
        if self.order.len() != n {
            return false;
        }
        let mut seen = vec![false; n];
        for &id in &self.order {
            if id >= n || seen[id] {
                return false;
            }
            seen[id] = true;
        }
        true
    }
}

/// Order crossover (OX1).
///
/// Copies a random slice `[start, end]` from `p1`, then fills the
/// remaining positions left to right with `p2`'s IDs in their order,
/// skipping IDs already placed.
pub fn ox_crossover<R: Rng>(p1: &[usize], p2: &[usize], rng: &mut R) -> Vec<usize> {
    let n = p1.len();
    if n < 2 || p2.len() != n {
        return p1.to_vec();
    }

    let start = rng.random_range(0..n);
    let end = rng.random_range(start..n);

    let bound = p1.iter().chain(p2).max().map_or(0, |m| m + 1);
    let mut placed = vec![false; bound];
    for &id in &p1[start..=end] {
        placed[id] = true;
    }

    let mut child = Vec::with_capacity(n);
    let mut donors = p2.iter().copied().filter(|id| !placed[*id]);
    for i in 0..n {
        if (start..=end).contains(&i) {
            child.push(p1[i]);
        } else if let Some(id) = donors.next() {
            child.push(id);
        }
    }
    child
}

/// Swaps two distinct random positions.
pub fn swap_mutation<R: Rng>(order: &mut [usize], rng: &mut R) {
    let n = order.len();
    if n < 2 {
        return;
    }
    let i = rng.random_range(0..n);
    let mut j = rng.random_range(0..n - 1);
    if j >= i {
        j += 1;
    }
    order.swap(i, j);
}

/// Removes a random element and reinserts it at a different position.
pub fn insert_mutation<R: Rng>(order: &mut Vec<usize>, rng: &mut R) {
    let n = order.len();
    if n < 2 {
        return;
    }
    let from = rng.random_range(0..n);
    let mut to = rng.random_range(0..n - 1);
    if to >= from {
        to += 1;
    }
    let id = order.remove(from);
    order.insert(to, id);
}

/// One left-to-right pass of first-improvement adjacent swaps.
///
/// Each adjacent pair is swapped tentatively and kept only if fitness
/// strictly improves. The pass is not repeated to convergence.
pub fn adjacent_swap_pass(
    chromosome: &SequenceChromosome,
    problem: &SequencingProblem,
) -> SequenceChromosome {
    let mut best = chromosome.clone();
    let n = best.order.len();
    if n < 2 {
        return best;
    }

    let mut order = best.order.clone();
    for i in 0..n - 1 {
        order.swap(i, i + 1);
        let costs = problem.evaluate(&order);
        let fitness = costs.fitness();
        if fitness > best.fitness {
            best = SequenceChromosome {
                order: order.clone(),
                costs,
                fitness,
            };
        } else {
            order.swap(i, i + 1);
        }
    }
    best
}
