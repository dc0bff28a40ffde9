//! Timeline simulation and KPI evaluation.
//!
//! Turns an ordered lot sequence into wall-clock segments and summarises
//! the result.
//!
//! # Algorithm
//!
//! `TimelineSimulator` walks the sequence with a single cursor, emitting
//! each lot's declared stoppages and splitting its production block
//! around recurring calendar obligations. It is deterministic and never
//! fails on bad data.
//!
//! # Derivation
//!
//! `LotDeriver` fills in the transition components of a planned sequence
//! (changeover, quality change, stop change, calibration) from article
//! master data.
//!
//! # KPI
//!
//! `TimelineKpi` computes span, production and stoppage time,
//! utilisation and per-day summaries.
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 3-4
//! - Allahverdi et al. (2008), "A survey of scheduling problems with setup times or costs"

mod derivation;
mod kpi;
mod simulator;

pub use derivation::{
    Article, LotDeriver, PlannedLot, QUALITY_CHANGE_SECS, STOP_CHANGE_SECS,
    length_from_description,
};
pub use kpi::{DailySummary, TimelineKpi};
pub use simulator::{AdHocStop, SimulationRequest, TimelineSimulator};
