//! Selection, seeding and mutation operators.
//!
//! # Usage
//!
//! ```
//! use line_sequencer::ga::operators::{SeedHeuristic, MutationType};
//!
//! assert_eq!(SeedHeuristic::default(), SeedHeuristic::EarliestStockout);
//! assert_ne!(MutationType::Swap, MutationType::Insert);
//! ```

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::chromosome::{SequenceChromosome, insert_mutation, swap_mutation};
use super::problem::SequencingProblem;

/// How initial sequences are built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedHeuristic {
    /// Ascending remaining stock-days (earliest stockout first).
    #[default]
    EarliestStockout,
    /// Greedy minimum changeover from a random first lot.
    NearestNeighbor,
    /// Either of the above with equal probability, per individual.
    Mixed,
}

/// Mutation move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationType {
    /// Swap two random positions.
    Swap,
    /// Remove and reinsert at another position.
    Insert,
}

/// k-way tournament: the fittest of `k` uniformly drawn individuals.
///
/// Returns `None` only for an empty population.
pub fn tournament_select<'a, R: Rng>(
    population: &'a [SequenceChromosome],
    k: usize,
    rng: &mut R,
) -> Option<&'a SequenceChromosome> {
    if population.is_empty() {
        return None;
    }
    let mut best = &population[rng.random_range(0..population.len())];
    for _ in 1..k.max(1) {
        let challenger = &population[rng.random_range(0..population.len())];
        if challenger.fitness > best.fitness {
            best = challenger;
        }
    }
    Some(best)
}

/// Greedy nearest-neighbour order over changeover hours.
///
/// Candidates are scanned in earliest-stockout order; ties keep the
/// first candidate.
pub fn nearest_neighbor_order<R: Rng>(problem: &SequencingProblem, rng: &mut R) -> Vec<usize> {
    let candidates = problem.earliest_stockout_order();
    let n = candidates.len();
    if n == 0 {
        return candidates;
    }

    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let first = rng.random_range(0..n);
    visited[first] = true;
    order.push(candidates[first]);

    while order.len() < n {
        let current = order[order.len() - 1];
        let mut next: Option<(usize, f64)> = None;
        for (pos, &id) in candidates.iter().enumerate() {
            if visited[pos] {
                continue;
            }
            let hours = problem.changeover_hours(current, id);
            if next.map_or(true, |(_, best)| hours < best) {
                next = Some((pos, hours));
            }
        }
        let Some((pos, _)) = next else { break };
        visited[pos] = true;
        order.push(candidates[pos]);
    }
    order
}

/// Builds one heuristic order (unshuffled).
pub fn heuristic_order<R: Rng>(
    problem: &SequencingProblem,
    heuristic: SeedHeuristic,
    rng: &mut R,
) -> Vec<usize> {
    match heuristic {
        SeedHeuristic::EarliestStockout => problem.earliest_stockout_order(),
        SeedHeuristic::NearestNeighbor => nearest_neighbor_order(problem, rng),
        SeedHeuristic::Mixed => {
            if rng.random_bool(0.5) {
                problem.earliest_stockout_order()
            } else {
                nearest_neighbor_order(problem, rng)
            }
        }
    }
}

/// Seeds a population of `size` evaluated individuals.
///
/// Individual 0 is the plain heuristic order. Every other individual
/// starts from a heuristic order and is fully shuffled with probability
/// `shuffle_probability`.
pub fn seed_population<R: Rng>(
    problem: &SequencingProblem,
    size: usize,
    heuristic: SeedHeuristic,
    shuffle_probability: f64,
    rng: &mut R,
) -> Vec<SequenceChromosome> {
    let p = if shuffle_probability.is_finite() {
        shuffle_probability.clamp(0.0, 1.0)
    } else {
        0.0
    };
    (0..size)
        .map(|i| {
            let mut order = heuristic_order(problem, heuristic, rng);
            if i > 0 && rng.random_bool(p) {
                order.shuffle(rng);
            }
            SequenceChromosome::evaluated(order, problem)
        })
        .collect()
}

/// With probability `rate`, applies a uniformly chosen mutation.
///
/// Returns the move applied, if any.
pub fn mutate<R: Rng>(order: &mut Vec<usize>, rate: f64, rng: &mut R) -> Option<MutationType> {
    let rate = if rate.is_finite() { rate.clamp(0.0, 1.0) } else { 0.0 };
    if order.len() < 2 || !rng.random_bool(rate) {
        return None;
    }
    if rng.random_bool(0.5) {
        swap_mutation(order, rng);
        Some(MutationType::Swap)
    } else {
        insert_mutation(order, rng);
        Some(MutationType::Insert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ga::problem::{CostWeights, LotDemand};
    use crate::models::ChangeoverMatrix;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn problem() -> SequencingProblem {
        // Groups: L1=0, L2=1, L3=0, L4=1. Cross-group changes cost 10 h.
        let lots = (0..4)
            .map(|i| {
                LotDemand::new(format!("L{}", i + 1), format!("S{i}"))
                    .with_daily_sale(1.0)
                    .with_stock_days([3.0, 1.0, 4.0, 2.0][i])
                    .with_production_days(1.0)
                    .with_size(1.0)
                    .with_change_group(i % 2)
            })
            .collect();
        let matrix = ChangeoverMatrix::from_rows(vec![vec![0.0, 10.0], vec![10.0, 0.0]]);
        SequencingProblem::new(lots, matrix, CostWeights::default())
    }

    fn chrom(fitness: f64) -> SequenceChromosome {
        SequenceChromosome {
            order: vec![],
            costs: Default::default(),
            fitness,
        }
    }

    #[test]
    fn test_tournament_prefers_fitter() {
        let mut rng = SmallRng::seed_from_u64(42);
        let pop: Vec<SequenceChromosome> = (0..10).map(|i| chrom(i as f64)).collect();
        let mut total = 0.0;
        for _ in 0..200 {
            total += tournament_select(&pop, 5, &mut rng).unwrap().fitness;
        }
        // Mean of max of 5 uniform draws over 0..9 is well above 4.5.
        assert!(total / 200.0 > 6.0);
        assert!(tournament_select(&[], 5, &mut rng).is_none());
    }

    #[test]
    fn test_tournament_single() {
        let mut rng = SmallRng::seed_from_u64(42);
        let pop = vec![chrom(1.0)];
        assert_eq!(tournament_select(&pop, 5, &mut rng).unwrap().fitness, 1.0);
    }

    #[test]
    fn test_earliest_stockout_order() {
        assert_eq!(problem().earliest_stockout_order(), vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_nearest_neighbor_groups_families() {
        let p = problem();
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..20 {
            let order = nearest_neighbor_order(&p, &mut rng);
            assert_eq!(order.len(), 4);
            let c = p.evaluate(&order);
            assert!((c.changeover_hours - 10.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_seed_population_first_is_heuristic() {
        let p = problem();
        let mut rng = SmallRng::seed_from_u64(42);
        let pop = seed_population(&p, 20, SeedHeuristic::EarliestStockout, 1.0, &mut rng);
        assert_eq!(pop.len(), 20);
        assert_eq!(pop[0].order, vec![1, 3, 0, 2]);
        assert!(pop.iter().all(|c| c.is_permutation(4)));
        assert!(pop[1..].iter().any(|c| c.order != pop[0].order));

        let plain = seed_population(&p, 5, SeedHeuristic::EarliestStockout, 0.0, &mut rng);
        assert!(plain.iter().all(|c| c.order == vec![1, 3, 0, 2]));
    }

    #[test]
    fn test_mutate_rates() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut order: Vec<usize> = (0..5).collect();
        assert_eq!(mutate(&mut order, 0.0, &mut rng), None);
        assert_eq!(order, vec![0, 1, 2, 3, 4]);

        let mut seen_swap = false;
        let mut seen_insert = false;
        for _ in 0..50 {
            match mutate(&mut order, 1.0, &mut rng) {
                Some(MutationType::Swap) => seen_swap = true,
                Some(MutationType::Insert) => seen_insert = true,
                None => panic!("rate 1.0 must mutate"),
            }
        }
        assert!(seen_swap && seen_insert);
        assert_eq!(mutate(&mut order, f64::NAN, &mut rng), None);
    }
}
