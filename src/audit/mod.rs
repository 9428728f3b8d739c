//! Audit & relink resolution engine.
//!
//! A run is strictly pipelined:
//!
//! ```text
//! enumerate -> classify -> match -> plan -> execute
//! ```
//!
//! Classification and search fan out over a bounded number of concurrent
//! gateway calls; playlist mutation is strictly sequential. Every stage reads
//! its settings from one explicit [`RunContext`] instead of shared state.

pub mod classify;
pub mod enumerate;
pub mod execute;
pub mod matcher;
pub mod pipeline;
pub mod plan;

pub use pipeline::{RunOutcome, run};
pub use plan::PlannedPair;

use crate::catalog::Gateway;
use crate::config::MatchingConfig;
use crate::model::RunConfig;

/// Everything a run needs, passed explicitly through every stage.
pub struct RunContext {
    pub gateway: Gateway,
    pub run: RunConfig,
    pub matching: MatchingConfig,
}

impl RunContext {
    pub fn new(gateway: Gateway, run: RunConfig, matching: MatchingConfig) -> Self {
        Self {
            gateway,
            run,
            matching,
        }
    }
}
