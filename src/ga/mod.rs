//! Memetic lot-sequence optimization.
//!
//! Searches permutations of lot assignments for the order minimising
//! `w · lost-sale cost + (1 − w) · changeover cost`. A genetic algorithm
//! (tournament selection, OX1 crossover, swap / insert mutation, elitism)
//! is combined with a periodic adjacent-swap local search on the elite.
//!
//! # Encoding
//!
//! A chromosome is a permutation of assignment IDs. Each assignment is a
//! whole lot or a sub-lot, stored in an arena owned by the problem.
//!
//! # Submodules
//!
//! - [`operators`]: Selection, seeding heuristics and mutation dispatch
//!
//! # Reference
//! - Moscato (1989), "On Evolution, Search, Optimization, Genetic Algorithms
//!   and Martial Arts: Towards Memetic Algorithms"
//! - Ruiz & Maroto (2006), "A genetic algorithm for hybrid flowshops with
//!   sequence dependent setup times"

mod chromosome;
mod config;
pub mod operators;
mod problem;
mod runner;
mod task;

pub use chromosome::{
    LotAssignment, SequenceChromosome, adjacent_swap_pass, insert_mutation, ox_crossover,
    swap_mutation,
};
pub use config::{GaConfig, Scenario};
pub use problem::{
    CostBreakdown, CostWeights, FITNESS_EPSILON, LotDemand, NO_SALE_STOCK_DAYS, ProblemColumns,
    SequencingProblem,
};
pub use runner::{MemeticRunner, Progress, SequencingResult};
pub use task::{CancelToken, OptimizerTask, TaskHandle};
