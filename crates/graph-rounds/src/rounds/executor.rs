//! Round executor contract
//!
//! The driver submits one [`RoundRequest`] per round and waits for its
//! [`RoundOutcome`]. How the round is partitioned, where tasks run and how
//! records are stored is entirely up to the executor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::aggregate::Aggregate;
use super::error::ExecutorError;
use super::rule::RoundRule;
use super::store::ObjectLocation;

/// One round submitted to an executor
#[derive(Debug, Clone)]
pub struct RoundRequest {
    /// Run the round belongs to; executors use it to name outputs
    pub run_id: String,
    /// 1-based round index
    pub round: usize,
    /// Rule for this round, shared read-only with every unit
    pub rule: Arc<RoundRule>,
    /// Records the transform reads
    pub input: ObjectLocation,
    /// Number of transform units
    pub task_count: usize,
}

/// Final status of a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundStatus {
    Succeeded,
    Failed(String),
}

impl RoundStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RoundStatus::Succeeded)
    }
}

/// What a finished round hands back to the driver
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub output: ObjectLocation,
    pub aggregate: Aggregate,
    pub status: RoundStatus,
}

impl RoundOutcome {
    pub fn succeeded(output: ObjectLocation, aggregate: Aggregate) -> Self {
        Self {
            output,
            aggregate,
            status: RoundStatus::Succeeded,
        }
    }
}

/// Runs one barrier-synchronised round
#[async_trait]
pub trait RoundExecutor: Send + Sync {
    /// Run transform, barrier and merge for one round
    ///
    /// Returns after every merge unit has finished. A unit failure fails the
    /// whole round.
    async fn execute(&self, request: RoundRequest) -> Result<RoundOutcome, ExecutorError>;
}
