//! Memetic optimizer loop.
//!
//! # Generation Step
//!
//! 1. Sort by fitness; update the best-ever individual and the
//!    stagnation counter.
//! 2. Pick the mutation rate (doubled past the stagnation threshold).
//! 3. Optionally re-seed the worst 20% after long stagnation.
//! 4. Keep the elite unchanged.
//! 5. Every `local_search_interval` generations, refine the top
//!    `local_search_fraction` of the elite with one adjacent-swap pass.
//! 6. Breed: tournament × 2 → OX1 → mutation → evaluate, until the
//!    population is full again.
//!
//! The best-ever individual is tracked apart from the population, so the
//! reported fitness never decreases even when a generation's best does.
//!
//! # Reference
//! Moscato (1989), "On Evolution, Search, Optimization, Genetic Algorithms
//! and Martial Arts: Towards Memetic Algorithms"

use std::time::Instant;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::chromosome::{LotAssignment, SequenceChromosome, adjacent_swap_pass, ox_crossover};
use super::config::GaConfig;
use super::operators::{mutate, seed_population, tournament_select};
use super::problem::{CostBreakdown, SequencingProblem};
use super::task::CancelToken;
use crate::error::{Result, SequencerError};

/// Progress notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Generations completed.
    pub generation: usize,
    /// Generation budget.
    pub generations: usize,
    /// Completion (0–100).
    pub percent: u8,
    /// Best-ever fitness.
    pub best_fitness: f64,
    /// Best-ever weighted objective.
    pub best_objective: f64,
}

/// Outcome of an optimizer run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencingResult {
    /// Best order (assignment IDs).
    pub order: Vec<usize>,
    /// Best order as assignment records.
    pub sequence: Vec<LotAssignment>,
    /// Cost of the best order.
    pub costs: CostBreakdown,
    /// Fitness of the best order.
    pub fitness: f64,
    /// Best-ever fitness after each generation.
    pub fitness_history: Vec<f64>,
    /// Generations executed.
    pub generations_run: usize,
    /// Wall-clock run time (s).
    pub processing_secs: f64,
}

impl SequencingResult {
    /// Lot IDs in the best order.
    pub fn lot_ids<'a>(&self, problem: &'a SequencingProblem) -> Vec<&'a str> {
        self.sequence
            .iter()
            .filter_map(|a| problem.lots().get(a.lot))
            .map(|l| l.lot_id.as_str())
            .collect()
    }
}

/// Memetic (GA + local search) sequence optimizer.
///
/// # Example
///
/// ```
/// use line_sequencer::ga::{CostWeights, GaConfig, LotDemand, MemeticRunner, SequencingProblem};
/// use line_sequencer::models::ChangeoverMatrix;
///
/// let lots = vec![
///     LotDemand::new("L1", "A").with_daily_sale(10.0).with_stock_days(5.0).with_production_days(1.0).with_size(50.0),
///     LotDemand::new("L2", "B").with_daily_sale(10.0).with_stock_days(0.5).with_production_days(1.0).with_size(50.0),
/// ];
/// let problem = SequencingProblem::new(lots, ChangeoverMatrix::default(), CostWeights::default());
/// let config = GaConfig::default().with_population_size(10).with_generations(5).with_seed(42);
///
/// let result = MemeticRunner::new(config).run(&problem);
/// assert_eq!(result.order, vec![1, 0]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemeticRunner {
    config: GaConfig,
}

impl MemeticRunner {
    /// Creates a runner; the configuration is clamped to valid ranges.
    pub fn new(config: GaConfig) -> Self {
        Self {
            config: config.clamped(),
        }
    }

    /// Effective configuration.
    pub fn config(&self) -> &GaConfig {
        &self.config
    }

    /// Runs the full generation budget.
    ///
    /// Uses `config.seed` when set, otherwise a thread-seeded generator.
    pub fn run(&self, problem: &SequencingProblem) -> SequencingResult {
        let mut rng = self.make_rng();
        self.run_with_rng(problem, &mut rng)
    }

    /// Runs the full generation budget with the given generator.
    pub fn run_with_rng<R: Rng>(&self, problem: &SequencingProblem, rng: &mut R) -> SequencingResult {
        let started = Instant::now();
        let mut evolution = Evolution::new(problem, &self.config, rng);
        for _ in 0..self.config.generations {
            evolution.step();
        }
        evolution.finish(started)
    }

    /// Runs with cancellation checks before every generation and progress
    /// reports every `progress_interval` generations and after the last.
    ///
    /// # Errors
    /// [`SequencerError::Cancelled`] if `cancel` fires before completion.
    pub fn run_cancellable<R, F>(
        &self,
        problem: &SequencingProblem,
        rng: &mut R,
        cancel: &CancelToken,
        mut on_progress: F,
    ) -> Result<SequencingResult>
    where
        R: Rng,
        F: FnMut(&Progress),
    {
        let started = Instant::now();
        let total = self.config.generations;

        if cancel.is_cancelled() {
            info!("optimization cancelled before start");
            return Err(SequencerError::Cancelled);
        }
        let mut evolution = Evolution::new(problem, &self.config, rng);

        for gen in 0..total {
            if cancel.is_cancelled() {
                info!(generation = gen, "optimization cancelled");
                return Err(SequencerError::Cancelled);
            }
            evolution.step();
            if gen % self.config.progress_interval == 0 || gen + 1 == total {
                on_progress(&evolution.progress(total));
            }
        }
        Ok(evolution.finish(started))
    }

    pub(crate) fn make_rng(&self) -> SmallRng {
        match self.config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_rng(&mut rand::rng()),
        }
    }
}

/// Mutable state of one run.
struct Evolution<'a, R: Rng> {
    problem: &'a SequencingProblem,
    config: &'a GaConfig,
    rng: &'a mut R,
    population: Vec<SequenceChromosome>,
    best: SequenceChromosome,
    stagnant: usize,
    generation: usize,
    history: Vec<f64>,
}

impl<'a, R: Rng> Evolution<'a, R> {
    fn new(problem: &'a SequencingProblem, config: &'a GaConfig, rng: &'a mut R) -> Self {
        let population = seed_population(
            problem,
            config.population_size,
            config.seed_heuristic,
            config.seed_shuffle_probability,
            rng,
        );
        let best = fittest(&population)
            .cloned()
            .unwrap_or_else(|| SequenceChromosome::evaluated(Vec::new(), problem));

        debug!(
            assignments = problem.len(),
            population = population.len(),
            generations = config.generations,
            initial_objective = best.costs.objective,
            "optimizer started"
        );

        Self {
            problem,
            config,
            rng,
            population,
            best,
            stagnant: 0,
            generation: 0,
            history: Vec::with_capacity(config.generations),
        }
    }

    fn step(&mut self) {
        let cfg = self.config;
        let pop_size = cfg.population_size;

        self.population
            .sort_by(|a, b| b.fitness.total_cmp(&a.fitness));

        if let Some(top) = self.population.first() {
            if top.fitness > self.best.fitness {
                self.best = top.clone();
                self.stagnant = 0;
                debug!(
                    generation = self.generation,
                    objective = self.best.costs.objective,
                    "new best sequence"
                );
            } else {
                self.stagnant += 1;
            }
        }

        let rate = cfg.effective_mutation_rate(self.stagnant);

        if let Some(after) = cfg.diversify_after {
            if self.stagnant > after {
                self.diversify();
                self.stagnant = 0;
            }
        }

        let elite = cfg.elite_count().min(self.population.len());
        let mut next: Vec<SequenceChromosome> = self.population[..elite].to_vec();

        if cfg.local_search_interval > 0 && self.generation % cfg.local_search_interval == 0 {
            let refine = ((next.len() as f64 * cfg.local_search_fraction).floor() as usize)
                .max(1)
                .min(next.len());
            for individual in next.iter_mut().take(refine) {
                *individual = adjacent_swap_pass(individual, self.problem);
                if individual.fitness > self.best.fitness {
                    self.best = individual.clone();
                    self.stagnant = 0;
                }
            }
        }

        while next.len() < pop_size {
            let (Some(p1), Some(p2)) = (
                tournament_select(&self.population, cfg.tournament_size, self.rng),
                tournament_select(&self.population, cfg.tournament_size, self.rng),
            ) else {
                break;
            };
            let mut child = ox_crossover(&p1.order, &p2.order, self.rng);
            mutate(&mut child, rate, self.rng);
            next.push(SequenceChromosome::evaluated(child, self.problem));
        }

        self.population = next;
        self.generation += 1;
        self.history.push(self.best.fitness);
    }

    /// Replaces individuals ranked past 80% with fresh seeds.
    fn diversify(&mut self) {
        let n = self.population.len();
        let keep = (0..n).take_while(|&k| (k as f64) <= n as f64 * 0.8).count();
        if keep >= n {
            return;
        }
        let fresh = seed_population(
            self.problem,
            n - keep + 1,
            self.config.seed_heuristic,
            self.config.seed_shuffle_probability,
            self.rng,
        );
        // Skip the unshuffled seed at index 0; it is already represented.
        self.population.truncate(keep);
        self.population.extend(fresh.into_iter().skip(1));
        debug!(
            generation = self.generation,
            replaced = n - keep,
            "population diversified"
        );
    }

    fn progress(&self, total: usize) -> Progress {
        let percent = if total == 0 {
            100
        } else {
            ((self.generation as f64 / total as f64) * 100.0).round().min(100.0) as u8
        };
        Progress {
            generation: self.generation,
            generations: total,
            percent,
            best_fitness: self.best.fitness,
            best_objective: self.best.costs.objective,
        }
    }

    fn finish(mut self, started: Instant) -> SequencingResult {
        if let Some(top) = fittest(&self.population) {
            if top.fitness > self.best.fitness {
                self.best = top.clone();
            }
        }

        let best = self.best;
        let sequence = best
            .order
            .iter()
            .filter_map(|&id| self.problem.assignments().get(id).cloned())
            .collect();
        let processing_secs = started.elapsed().as_secs_f64();

        info!(
            generations = self.generation,
            objective = best.costs.objective,
            changeover_hours = best.costs.changeover_hours,
            lost_sale_units = best.costs.lost_sale_units,
            total_cost = best.costs.total_cost(),
            processing_secs,
            "optimization complete"
        );

        SequencingResult {
            order: best.order,
            sequence,
            costs: best.costs,
            fitness: best.fitness,
            fitness_history: self.history,
            generations_run: self.generation,
            processing_secs,
        }
    }
}

fn fittest(population: &[SequenceChromosome]) -> Option<&SequenceChromosome> {
    population
        .iter()
        .max_by(|a, b| a.fitness.total_cmp(&b.fitness))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ga::operators::SeedHeuristic;
    use crate::ga::problem::{CostWeights, LotDemand};
    use crate::models::ChangeoverMatrix;

    /// Eight lots in four change groups with asymmetric changeovers.
    fn problem(weights: CostWeights) -> SequencingProblem {
        let stock = [2.0, 0.5, 6.0, 1.0, 3.5, 0.2, 4.0, 1.5];
        let sale = [10.0, 20.0, 5.0, 8.0, 12.0, 30.0, 6.0, 9.0];
        let lots = (0..8)
            .map(|i| {
                LotDemand::new(format!("L{i}"), format!("S{i}"))
                    .with_daily_sale(sale[i])
                    .with_stock_days(stock[i])
                    .with_production_days(0.5 + 0.1 * i as f64)
                    .with_size(50.0)
                    .with_change_group(i % 4)
            })
            .collect();
        SequencingProblem::new(lots, matrix(), weights)
    }

    fn matrix() -> ChangeoverMatrix {
        let mut rows = vec![vec![0.0; 4]; 4];
        for (i, row) in rows.iter_mut().enumerate() {
            for (j, h) in row.iter_mut().enumerate() {
                if i != j {
                    *h = 1.0 + ((i * 3 + j * 5) % 7) as f64;
                }
            }
        }
        ChangeoverMatrix::from_rows(rows)
    }

    fn small_config() -> GaConfig {
        GaConfig::default()
            .with_population_size(30)
            .with_generations(60)
            .with_seed(42)
    }

    #[test]
    fn test_result_is_permutation() {
        crate::logging::init_test();
        let p = problem(CostWeights::default());
        let r = MemeticRunner::new(small_config()).run(&p);
        let best = SequenceChromosome::evaluated(r.order.clone(), &p);
        assert!(best.is_permutation(8));
        assert_eq!(r.sequence.len(), 8);
        assert_eq!(r.generations_run, 60);
        assert_eq!(r.fitness_history.len(), 60);
        assert!((best.fitness - r.fitness).abs() < 1e-12);
        assert_eq!(best.costs, r.costs);
    }

    #[test]
    fn test_best_fitness_non_decreasing() {
        let p = problem(CostWeights::default());
        let config = small_config().with_mutation_rate(0.9).with_diversify_after(5);
        let r = MemeticRunner::new(config).run(&p);
        assert!(r.fitness_history.windows(2).all(|w| w[1] >= w[0]));
        assert!(r.fitness >= *r.fitness_history.last().unwrap());
    }

    #[test]
    fn test_not_worse_than_seed() {
        let p = problem(CostWeights::default());
        let seed = p.evaluate(&p.earliest_stockout_order());
        let r = MemeticRunner::new(small_config()).run(&p);
        assert!(r.costs.objective <= seed.objective);
    }

    #[test]
    fn test_deterministic_with_seed() {
        let p = problem(CostWeights::default());
        let a = MemeticRunner::new(small_config()).run(&p);
        let b = MemeticRunner::new(small_config()).run(&p);
        assert_eq!(a.order, b.order);
        assert_eq!(a.fitness_history, b.fitness_history);
    }

    #[test]
    fn test_single_individual_zero_generations() {
        let p = problem(CostWeights::default());
        let config = GaConfig::default()
            .with_population_size(1)
            .with_generations(0)
            .with_seed(42);
        let r = MemeticRunner::new(config).run(&p);

        let seed_order = p.earliest_stockout_order();
        assert_eq!(r.order, seed_order);
        assert_eq!(r.costs, p.evaluate(&seed_order));
        assert_eq!(r.generations_run, 0);
        assert!(r.fitness_history.is_empty());
    }

    #[test]
    fn test_relabeling_invariance() {
        let weights = CostWeights::default();
        let p = problem(weights);

        // Reverse the lots and rename change group g → 3 − g.
        let mut lots: Vec<LotDemand> = p.lots().to_vec();
        lots.reverse();
        for lot in &mut lots {
            lot.change_group = lot.change_group.map(|g| 3 - g);
        }
        let m = matrix();
        let rows = (0..4)
            .map(|i| (0..4).map(|j| m.hours_between(Some(3 - i), Some(3 - j))).collect())
            .collect();
        let q = SequencingProblem::new(lots, ChangeoverMatrix::from_rows(rows), weights);

        let a = MemeticRunner::new(small_config()).run(&p);
        let b = MemeticRunner::new(small_config()).run(&q);
        assert!((a.costs.objective - b.costs.objective).abs() < 1e-9);
        assert_eq!(a.lot_ids(&p), b.lot_ids(&q));
    }

    #[test]
    fn test_zero_matrix_trends_to_stock_order() {
        let lots = (0..6)
            .map(|i| {
                LotDemand::new(format!("L{i}"), format!("S{i}"))
                    .with_daily_sale(10.0)
                    .with_stock_days([3.0, 0.5, 2.0, 0.1, 4.0, 1.0][i])
                    .with_production_days(1.0)
                    .with_size(10.0)
                    .with_change_group(i % 3)
            })
            .collect();
        let matrix = ChangeoverMatrix::from_rows(vec![vec![0.0; 3]; 3]);
        let p = SequencingProblem::new(lots, matrix, CostWeights::default());

        let config = small_config().with_seed_shuffle_probability(1.0);
        let r = MemeticRunner::new(config).run(&p);

        // Stock order is optimal here; ties exist among later positions.
        assert_eq!(r.costs.changeover_cost, 0.0);
        let edd = p.evaluate(&p.earliest_stockout_order());
        assert!((r.costs.objective - edd.objective).abs() < 1e-9);
        assert_eq!(r.order[0], 3);
    }

    #[test]
    fn test_nearest_neighbor_scenario() {
        let p = problem(CostWeights::default()).with_sale_weight(0.0);
        let config = small_config().with_seed_heuristic(SeedHeuristic::NearestNeighbor);
        let r = MemeticRunner::new(config).run(&p);
        // Four groups, two lots each: at least three group changes.
        assert_eq!(r.costs.objective, r.costs.changeover_cost);
        assert!(r.costs.changeover_times.iter().filter(|h| **h > 0.0).count() >= 3);
    }

    #[test]
    fn test_cancellable_progress() {
        let p = problem(CostWeights::default());
        let runner = MemeticRunner::new(small_config().with_generations(25));
        let mut rng = runner.make_rng();
        let mut reports = Vec::new();
        let r = runner
            .run_cancellable(&p, &mut rng, &CancelToken::new(), |pr| reports.push(pr.clone()))
            .unwrap();

        let gens: Vec<usize> = reports.iter().map(|p| p.generation).collect();
        assert_eq!(gens, vec![1, 11, 21, 25]);
        assert_eq!(reports.last().unwrap().percent, 100);
        assert_eq!(r.generations_run, 25);
    }

    #[test]
    fn test_cancelled_before_start() {
        let p = problem(CostWeights::default());
        let runner = MemeticRunner::new(small_config());
        let token = CancelToken::new();
        token.cancel();
        let mut rng = runner.make_rng();
        let err = runner.run_cancellable(&p, &mut rng, &token, |_| {}).unwrap_err();
        assert_eq!(err, SequencerError::Cancelled);
    }

    #[test]
    fn test_empty_problem() {
        let p = SequencingProblem::new(vec![], ChangeoverMatrix::default(), CostWeights::default());
        let r = MemeticRunner::new(small_config()).run(&p);
        assert!(r.order.is_empty());
        assert_eq!(r.costs.objective, 0.0);
    }
}
