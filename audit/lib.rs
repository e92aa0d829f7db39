#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

//! Confounder audit engine.
//!
//! Given an observational study and a list of proposed confounders, the crate
//! matches each proposal to a dataset column, tests whether it is associated
//! with both treatment and outcome, measures how much leaving it out shifts
//! the treatment effect, and ranks the results with suggested corrections.

pub mod association;
pub mod bias;
pub mod config;
pub mod correction;
pub mod matcher;
pub mod pipeline;
pub mod ranking;
pub mod regression;
pub mod report;
pub mod sensitivity;
pub mod types;
pub mod validator;

#[path = "../data/mod.rs"]
pub mod data;

#[path = "../proposer/mod.rs"]
pub mod proposer;

pub use config::AuditConfig;
pub use pipeline::{AuditOutcome, run_audit};
pub use report::AuditReport;
pub use types::{
    AssessedConfounder, AuditError, BiasEstimationResult, CandidateSeverity, ConfounderCandidate,
    ValidatedConfounder,
};
