//! Single-line production sequencing.
//!
//! Computes the wall-clock timeline of an ordered lot sequence on one
//! production line, and searches for the lot order that best trades
//! changeover time against lost sales.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Lot`, `ChangeoverMatrix`, mandatory
//!   windows and the `DayCalendar` capability, `Timeline` segments
//! - **`scheduler`**: `TimelineSimulator`, lot derivation from article
//!   data, timeline KPIs
//! - **`ga`**: Cost evaluator, memetic optimizer, cancellable task
//! - **`validation`**: Advisory input checks (duplicate IDs, invalid
//!   numbers, unmapped change groups)
//! - **`error`**: `SequencerError`
//! - **`logging`**: `tracing-subscriber` setup helpers
//!
//! # Data Flow
//!
//! ```text
//! LotDemand + ChangeoverMatrix ──► MemeticRunner ──► best order
//!                                                        │
//! Article + PlannedLot ──► LotDeriver ──► Lot ◄──────────┘
//!                                          │
//!               ObligationCalendar ──► TimelineSimulator ──► Timeline ──► TimelineKpi
//! ```
//!
//! Both subsystems are pure and synchronous. Only `ga::OptimizerTask`
//! spawns a thread, so a long run can be cancelled from the caller.
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"
//! - Allahverdi et al. (2008), "A survey of scheduling problems with setup times or costs"
//! - Moscato (1989), "Towards Memetic Algorithms"

pub mod error;
pub mod ga;
pub mod logging;
pub mod models;
pub mod scheduler;
pub mod validation;

pub use error::{Result, SequencerError};
