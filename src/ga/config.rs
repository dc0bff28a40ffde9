//! Optimizer configuration.
//!
//! All fields have plant defaults, so a configuration can be read from
//! partial JSON:
//!
//! ```
//! use line_sequencer::ga::GaConfig;
//!
//! let config: GaConfig = serde_json::from_str(r#"{ "generations": 50 }"#).unwrap();
//! assert_eq!(config.generations, 50);
//! assert_eq!(config.population_size, 100);
//! ```

use serde::{Deserialize, Serialize};

use super::operators::SeedHeuristic;

/// Memetic optimizer parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaConfig {
    /// Individuals per generation.
    pub population_size: usize,
    /// Generation budget.
    pub generations: usize,
    /// Base probability of mutating an offspring.
    pub mutation_rate: f64,
    /// Fraction of the population kept unchanged (at least one).
    pub elitism_rate: f64,
    /// Individuals drawn per tournament.
    pub tournament_size: usize,
    /// Local search runs every this many generations (0 = never).
    pub local_search_interval: usize,
    /// Fraction of the elite refined by local search (at least one).
    pub local_search_fraction: f64,
    /// Stagnant generations before the mutation rate is doubled.
    pub stagnation_threshold: usize,
    /// Upper bound of the boosted mutation rate.
    pub max_mutation_rate: f64,
    /// Initial sequence heuristic.
    pub seed_heuristic: SeedHeuristic,
    /// Probability of fully shuffling a seeded individual.
    pub seed_shuffle_probability: f64,
    /// Stagnant generations before the worst 20% are re-seeded
    /// (`None` disables re-seeding).
    pub diversify_after: Option<usize>,
    /// Progress is reported every this many generations.
    pub progress_interval: usize,
    /// Random seed. `None` draws from the thread generator.
    pub seed: Option<u64>,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            generations: 250,
            mutation_rate: 0.15,
            elitism_rate: 0.1,
            tournament_size: 5,
            local_search_interval: 10,
            local_search_fraction: 0.2,
            stagnation_threshold: 20,
            max_mutation_rate: 0.8,
            seed_heuristic: SeedHeuristic::EarliestStockout,
            seed_shuffle_probability: 0.5,
            diversify_after: Some(40),
            progress_interval: 10,
            seed: None,
        }
    }
}

impl GaConfig {
    /// Sets the population size.
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size;
        self
    }

    /// Sets the generation budget.
    pub fn with_generations(mut self, generations: usize) -> Self {
        self.generations = generations;
        self
    }

    /// Sets the base mutation rate.
    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate;
        self
    }

    /// Sets the elitism rate.
    pub fn with_elitism_rate(mut self, rate: f64) -> Self {
        self.elitism_rate = rate;
        self
    }

    /// Sets the seeding heuristic.
    pub fn with_seed_heuristic(mut self, heuristic: SeedHeuristic) -> Self {
        self.seed_heuristic = heuristic;
        self
    }

    /// Sets the seed shuffle probability.
    pub fn with_seed_shuffle_probability(mut self, p: f64) -> Self {
        self.seed_shuffle_probability = p;
        self
    }

    /// Re-seeds after more than `generations` without improvement.
    pub fn with_diversify_after(mut self, generations: usize) -> Self {
        self.diversify_after = Some(generations);
        self
    }

    /// Disables re-seeding.
    pub fn without_diversification(mut self) -> Self {
        self.diversify_after = None;
        self
    }

    /// Sets the local search interval.
    pub fn with_local_search_interval(mut self, generations: usize) -> Self {
        self.local_search_interval = generations;
        self
    }

    /// Fixes the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Copy with every field in its valid range.
    ///
    /// Population ≥ 1, rates in [0, 1] (non-finite → default),
    /// tournament ≥ 1, progress interval ≥ 1.
    pub fn clamped(&self) -> Self {
        let d = Self::default();
        let rate = |v: f64, fallback: f64| {
            if v.is_finite() {
                v.clamp(0.0, 1.0)
            } else {
                fallback
            }
        };
        Self {
            population_size: self.population_size.max(1),
            tournament_size: self.tournament_size.max(1),
            progress_interval: self.progress_interval.max(1),
            mutation_rate: rate(self.mutation_rate, d.mutation_rate),
            elitism_rate: rate(self.elitism_rate, d.elitism_rate),
            local_search_fraction: rate(self.local_search_fraction, d.local_search_fraction),
            max_mutation_rate: rate(self.max_mutation_rate, d.max_mutation_rate),
            seed_shuffle_probability: rate(self.seed_shuffle_probability, d.seed_shuffle_probability),
            ..self.clone()
        }
    }

    /// Survivors per generation: `max(1, ⌊elitism × population⌋)`, never
    /// more than the population.
    pub fn elite_count(&self) -> usize {
        let pop = self.population_size.max(1);
        let elite = (self.elitism_rate.max(0.0) * pop as f64).floor() as usize;
        elite.max(1).min(pop)
    }

    /// Mutation rate after `stagnant` generations without improvement.
    ///
    /// Doubled (capped at `max_mutation_rate`) past the stagnation
    /// threshold; never lower than the base rate.
    pub fn effective_mutation_rate(&self, stagnant: usize) -> f64 {
        if stagnant > self.stagnation_threshold {
            (self.mutation_rate * 2.0)
                .min(self.max_mutation_rate)
                .max(self.mutation_rate)
        } else {
            self.mutation_rate
        }
    }
}

/// Optimization preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// The configured sale weight.
    Balanced,
    /// Lost sales only (weight 1).
    MinLostSales,
    /// Changeovers only (weight 0).
    MinChangeovers,
}

impl Scenario {
    /// All presets.
    pub const ALL: [Scenario; 3] = [
        Scenario::Balanced,
        Scenario::MinLostSales,
        Scenario::MinChangeovers,
    ];

    /// Sale weight for this preset.
    pub fn sale_weight(self, configured: f64) -> f64 {
        match self {
            Scenario::Balanced => configured,
            Scenario::MinLostSales => 1.0,
            Scenario::MinChangeovers => 0.0,
        }
    }

    /// Seeding heuristic suited to this preset.
    pub fn seed_heuristic(self) -> SeedHeuristic {
        match self {
            Scenario::Balanced => SeedHeuristic::Mixed,
            Scenario::MinLostSales => SeedHeuristic::EarliestStockout,
            Scenario::MinChangeovers => SeedHeuristic::NearestNeighbor,
        }
    }

    /// Short name.
    pub fn label(self) -> &'static str {
        match self {
            Scenario::Balanced => "balanced",
            Scenario::MinLostSales => "min_lost_sales",
            Scenario::MinChangeovers => "min_changeovers",
        }
    }
}
