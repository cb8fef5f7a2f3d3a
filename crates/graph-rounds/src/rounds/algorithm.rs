//! Algorithm interface used by the round driver
//!
//! An algorithm is a parameter type plus three functions: round-1 parameters
//! from the run plan, the rule for a set of parameters, and extraction of the
//! next parameters from a round's aggregate.

use std::fmt;

use super::aggregate::Aggregate;
use super::error::{ConsistencyError, RoundError};
use super::rule::RoundRule;

/// Facts about a run that round-1 parameters may depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPlan {
    /// Number of transform units every round is split into
    pub task_count: usize,
}

impl RunPlan {
    pub fn new(task_count: usize) -> Self {
        Self {
            task_count: task_count.max(1),
        }
    }
}

/// Outcome of extracting a round's aggregate
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict<P> {
    /// Run another round with these parameters
    Continue(P),
    /// Fixpoint reached
    Converged,
    /// The algorithm's own iteration bound was reached; not an error
    Exhausted,
}

impl<P> Verdict<P> {
    /// Check if the run stops after this round
    pub fn is_final(&self) -> bool {
        !matches!(self, Verdict::Continue(_))
    }
}

/// A multi-round graph algorithm
pub trait Algorithm: Send + Sync {
    /// Immutable per-round parameters
    type Params: Clone + Send + Sync + fmt::Debug;

    /// Algorithm name for logs and reports
    fn name(&self) -> &'static str;

    /// Parameters of round 1
    fn initial_params(&self, plan: &RunPlan) -> Result<Self::Params, RoundError>;

    /// Rule run by a round with these parameters
    fn rule(&self, params: &Self::Params) -> RoundRule;

    /// Decide convergence and compute the next round's parameters
    fn extract(
        &self,
        round: usize,
        params: &Self::Params,
        aggregate: &Aggregate,
    ) -> Result<Verdict<Self::Params>, ConsistencyError>;

    /// Largest number of rounds the algorithm runs before stopping on its own
    ///
    /// The driver refuses to start when this exceeds its `max_rounds`.
    fn round_bound(&self) -> Option<usize> {
        None
    }
}
