//! Error types for the round runtime
//!
//! Executor failures are fatal for a run: the driver wraps them with the round
//! index and stops. Nothing here is retried.

use std::time::Duration;
use thiserror::Error;

use crate::error::{RuleError, StoreError};

/// Stage of a round inside an executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transform,
    Merge,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Transform => write!(f, "transform"),
            Stage::Merge => write!(f, "merge"),
        }
    }
}

/// Errors reported by a round executor
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// A transform or merge unit failed
    #[error("{stage} task {task} failed: {source}")]
    Rule {
        stage: Stage,
        task: usize,
        #[source]
        source: RuleError,
    },

    /// A unit did not finish in time
    #[error("{stage} task {task} timed out after {timeout:?}")]
    TaskTimeout {
        stage: Stage,
        task: usize,
        timeout: Duration,
    },

    /// A unit panicked or was aborted
    #[error("Task join error: {0}")]
    Join(String),

    /// Round input or output could not be read or written
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// The executor reported an abnormal status
    #[error("Round failed: {0}")]
    Failed(String),
}

impl ExecutorError {
    /// Create a rule error for a unit
    pub fn rule(stage: Stage, task: usize, source: RuleError) -> Self {
        Self::Rule {
            stage,
            task,
            source,
        }
    }

    /// Create a failure from a status message
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    /// Check if the failure comes from a malformed record
    pub fn is_format(&self) -> bool {
        matches!(self, ExecutorError::Rule { source, .. } if source.is_format())
    }
}

/// A round aggregate that no correct rule could have produced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Inconsistent aggregate: {0}")]
pub struct ConsistencyError(pub String);

impl ConsistencyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors that abort a multi-round run
#[derive(Debug, Error)]
pub enum RoundError {
    /// The executor failed the round
    #[error("Round {round} failed: {source}")]
    ExecutionFailure {
        round: usize,
        #[source]
        source: ExecutorError,
    },

    /// The aggregate of a round is inconsistent
    #[error("Round {round} produced an inconsistent aggregate: {source}")]
    Consistency {
        round: usize,
        #[source]
        source: ConsistencyError,
    },

    /// Global safety limit on rounds reached before convergence
    #[error("Max rounds exceeded: {0}")]
    MaxRoundsExceeded(usize),

    /// The whole run took too long
    #[error("Run timeout after {0:?}")]
    RunTimeout(Duration),

    /// The run was cancelled between rounds
    #[error("Run cancelled")]
    Cancelled,

    /// Invalid algorithm or driver configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RoundError {
    /// Create an execution failure for a round
    pub fn execution_failure(round: usize, source: ExecutorError) -> Self {
        Self::ExecutionFailure { round, source }
    }

    /// Create a consistency error for a round
    pub fn consistency(round: usize, source: ConsistencyError) -> Self {
        Self::Consistency { round, source }
    }

    /// Create a config error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Round index the error is attached to, if any
    pub fn round(&self) -> Option<usize> {
        match self {
            RoundError::ExecutionFailure { round, .. } | RoundError::Consistency { round, .. } => {
                Some(*round)
            }
            _ => None,
        }
    }

    /// Check if the run failed on a malformed record
    pub fn is_format(&self) -> bool {
        matches!(self, RoundError::ExecutionFailure { source, .. } if source.is_format())
    }
}
