//! Round driver - the iteration controller
//!
//! The driver asks the algorithm for round-1 parameters, submits one round at
//! a time to the executor, hands each aggregate to the algorithm's extractor
//! and stops on convergence, on the algorithm's own bound, or on the first
//! failure. It never touches records itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::aggregate::Aggregate;
use super::algorithm::{Algorithm, RunPlan, Verdict};
use super::config::RoundConfig;
use super::error::{ExecutorError, RoundError};
use super::executor::{RoundExecutor, RoundRequest, RoundStatus};
use super::rule::RecordRule;
use super::store::ObjectLocation;

/// Driver state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverPhase {
    Initializing,
    RunningRound,
    Evaluating,
    Converged,
    Exhausted,
    Failed,
}

impl std::fmt::Display for DriverPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DriverPhase::Initializing => "initializing",
            DriverPhase::RunningRound => "running_round",
            DriverPhase::Evaluating => "evaluating",
            DriverPhase::Converged => "converged",
            DriverPhase::Exhausted => "exhausted",
            DriverPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Record of one finished round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundReport {
    pub round: usize,
    pub rule: String,
    pub aggregate: Aggregate,
    pub output: ObjectLocation,
    pub started_at: DateTime<Utc>,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Output of the last round
    pub output: ObjectLocation,
    /// Number of rounds executed
    pub rounds: usize,
    /// Whether the algorithm reached its fixpoint (false when it stopped on its bound)
    pub converged: bool,
    /// One report per round, in order
    pub history: Vec<RoundReport>,
}

impl RunResult {
    /// Aggregate of the last round
    pub fn last_aggregate(&self) -> Option<&Aggregate> {
        self.history.last().map(|report| &report.aggregate)
    }
}

/// Cooperative cancellation flag, checked before every round
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sequences rounds of an algorithm over an executor
pub struct RoundDriver<E> {
    executor: Arc<E>,
    config: RoundConfig,
    run_id: String,
    cancel: CancelToken,
}

impl<E: RoundExecutor> RoundDriver<E> {
    pub fn new(executor: Arc<E>, config: RoundConfig) -> Self {
        Self {
            executor,
            config,
            run_id: uuid::Uuid::new_v4().to_string(),
            cancel: CancelToken::default(),
        }
    }

    /// Set the run id used to name round outputs
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    pub fn executor(&self) -> &Arc<E> {
        &self.executor
    }

    /// Handle that cancels the run before its next round
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run an algorithm to completion
    ///
    /// Enforces the configured `run_timeout` around the whole loop.
    pub async fn run_iteration<A: Algorithm>(
        &self,
        algorithm: &A,
        input: ObjectLocation,
    ) -> Result<RunResult, RoundError> {
        let run_timeout = self.config.run_timeout;
        match timeout(run_timeout, self.run_inner(algorithm, input)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(run_id = %self.run_id, phase = %DriverPhase::Failed, "Run timed out");
                Err(RoundError::RunTimeout(run_timeout))
            }
        }
    }

    async fn run_inner<A: Algorithm>(
        &self,
        algorithm: &A,
        input: ObjectLocation,
    ) -> Result<RunResult, RoundError> {
        let plan = RunPlan::new(self.config.parallelism);
        debug!(
            run_id = %self.run_id,
            algorithm = algorithm.name(),
            phase = %DriverPhase::Initializing,
            tasks = plan.task_count,
            "Starting run"
        );

        if let Some(bound) = algorithm
            .round_bound()
            .filter(|bound| *bound > self.config.max_rounds)
        {
            return Err(RoundError::config_error(format!(
                "{} needs up to {} rounds but max_rounds is {}",
                algorithm.name(),
                bound,
                self.config.max_rounds
            )));
        }

        let mut params = algorithm.initial_params(&plan)?;
        let mut input = input;
        let mut history = Vec::new();
        let mut round = 1;

        loop {
            if self.cancel.is_cancelled() {
                warn!(run_id = %self.run_id, round, "Run cancelled");
                return Err(RoundError::Cancelled);
            }
            if round > self.config.max_rounds {
                warn!(
                    run_id = %self.run_id,
                    algorithm = algorithm.name(),
                    max_rounds = self.config.max_rounds,
                    "Round limit reached before convergence"
                );
                return Err(RoundError::MaxRoundsExceeded(round - 1));
            }

            // Running round
            let rule = Arc::new(algorithm.rule(&params));
            let rule_name = rule.name();
            debug!(
                run_id = %self.run_id,
                round,
                rule = rule_name,
                phase = %DriverPhase::RunningRound,
                "Submitting round"
            );

            let started_at = Utc::now();
            let clock = Instant::now();
            let request = RoundRequest {
                run_id: self.run_id.clone(),
                round,
                rule,
                input: input.clone(),
                task_count: plan.task_count,
            };
            let outcome = match self.executor.execute(request).await {
                Ok(outcome) => outcome,
                Err(e) => return Err(self.fail(RoundError::execution_failure(round, e))),
            };
            if let RoundStatus::Failed(reason) = &outcome.status {
                let source = ExecutorError::failed(reason.clone());
                return Err(self.fail(RoundError::execution_failure(round, source)));
            }

            debug!(round, phase = %DriverPhase::Evaluating, aggregate = ?outcome.aggregate);
            let verdict = match algorithm.extract(round, &params, &outcome.aggregate) {
                Ok(verdict) => verdict,
                Err(e) => return Err(self.fail(RoundError::consistency(round, e))),
            };

            let elapsed = clock.elapsed();
            if self.config.tracing_enabled {
                info!(
                    run_id = %self.run_id,
                    round,
                    rule = rule_name,
                    aggregate_keys = outcome.aggregate.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Round finished"
                );
            }
            history.push(RoundReport {
                round,
                rule: rule_name.to_string(),
                aggregate: outcome.aggregate,
                output: outcome.output.clone(),
                started_at,
                elapsed,
            });
            input = outcome.output;

            let bound_reached = algorithm.round_bound().is_some_and(|bound| round >= bound);
            match verdict {
                Verdict::Converged => return Ok(self.finish(input, history, true)),
                Verdict::Exhausted => return Ok(self.finish(input, history, false)),
                Verdict::Continue(_) if bound_reached => {
                    return Ok(self.finish(input, history, false));
                }
                Verdict::Continue(next) => {
                    params = next;
                    round += 1;
                }
            }
        }
    }

    fn finish(&self, output: ObjectLocation, history: Vec<RoundReport>, converged: bool) -> RunResult {
        let phase = if converged {
            DriverPhase::Converged
        } else {
            DriverPhase::Exhausted
        };
        info!(run_id = %self.run_id, rounds = history.len(), phase = %phase, output = %output, "Run finished");
        RunResult {
            output,
            rounds: history.len(),
            converged,
            history,
        }
    }

    fn fail(&self, error: RoundError) -> RoundError {
        warn!(run_id = %self.run_id, phase = %DriverPhase::Failed, error = %error, "Run failed");
        error
    }
}
