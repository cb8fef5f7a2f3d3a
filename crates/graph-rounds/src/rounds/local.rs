//! In-process round executor
//!
//! Runs a round as `task_count` transform units over disjoint slices of the
//! input, waits for all of them, groups the emitted values by key and runs the
//! merge units over disjoint key ranges. Units run on the blocking pool with at
//! most `parallelism` in flight. A run keeps only its latest round output;
//! the previous one is removed after the next round's output is stored.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::aggregate::{Aggregate, Counters};
use super::config::RoundConfig;
use super::error::{ExecutorError, Stage};
use super::executor::{RoundExecutor, RoundOutcome, RoundRequest};
use super::rule::{Emitter, MergeOutput, RecordKey, RecordRule, RoundRule, TaskInfo};
use super::store::{MemoryStore, ObjectLocation, ObjectStore};
use crate::error::RuleError;

type Partition = BTreeMap<RecordKey, Vec<String>>;

/// Executor that runs every unit inside the current process
pub struct LocalExecutor<S = MemoryStore> {
    store: Arc<S>,
    parallelism: usize,
    task_timeout: Duration,
}

impl LocalExecutor<MemoryStore> {
    /// Executor over a fresh in-memory store
    pub fn in_memory(config: &RoundConfig) -> Self {
        Self::new(Arc::new(MemoryStore::new()), config)
    }
}

impl<S: ObjectStore + 'static> LocalExecutor<S> {
    pub fn new(store: Arc<S>, config: &RoundConfig) -> Self {
        Self {
            store,
            parallelism: config.parallelism.max(1),
            task_timeout: config.task_timeout,
        }
    }

    /// Store holding round inputs and outputs
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Location a round's output is written to
    pub fn output_location(run_id: &str, round: usize) -> ObjectLocation {
        ObjectLocation::new(format!("{}/round-{:04}", run_id, round))
    }

    /// Drop the previous round's output once this round's output is stored
    ///
    /// Only outputs this executor wrote for the same run are removed; the
    /// caller's initial input is left alone.
    async fn release_input(&self, request: &RoundRequest) {
        let prefix = format!("{}/round-", request.run_id);
        if !request.input.as_str().starts_with(&prefix) {
            return;
        }
        if let Err(e) = self.store.remove(&request.input).await {
            warn!(input = %request.input, error = %e, "Failed to release round input");
        }
    }

    /// Run independent units with bounded parallelism, returning results in unit order
    async fn run_units<T, F>(&self, stage: Stage, units: Vec<F>) -> Result<Vec<T>, ExecutorError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, RuleError> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let task_timeout = self.task_timeout;

        let handles: Vec<_> = units
            .into_iter()
            .enumerate()
            .map(|(task, unit)| {
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| ExecutorError::Join(e.to_string()))?;

                    match timeout(task_timeout, tokio::task::spawn_blocking(unit)).await {
                        Ok(Ok(result)) => {
                            result.map_err(|source| ExecutorError::rule(stage, task, source))
                        }
                        Ok(Err(join_error)) => Err(ExecutorError::Join(join_error.to_string())),
                        Err(_) => Err(ExecutorError::TaskTimeout {
                            stage,
                            task,
                            timeout: task_timeout,
                        }),
                    }
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for joined in futures::future::join_all(handles).await {
            let result = joined.map_err(|e| ExecutorError::Join(e.to_string()))?;
            results.push(result?);
        }
        Ok(results)
    }
}

#[async_trait]
impl<S: ObjectStore + 'static> RoundExecutor for LocalExecutor<S> {
    async fn execute(&self, request: RoundRequest) -> Result<RoundOutcome, ExecutorError> {
        let task_count = request.task_count.max(1);
        let input = self.store.get(&request.input).await?;

        // Transform
        let transform_units: Vec<_> = slice_bounds(input.len(), task_count)
            .into_iter()
            .enumerate()
            .map(|(index, (start, end))| {
                let rule = Arc::clone(&request.rule);
                let input = Arc::clone(&input);
                let task = TaskInfo::new(index, task_count, request.round);
                move || transform_unit(&rule, &task, &input[start..end])
            })
            .collect();
        let partitions = self.run_units(Stage::Transform, transform_units).await?;

        debug!(
            round = request.round,
            rule = request.rule.name(),
            tasks = task_count,
            emitted = partitions.iter().map(|p| p.len()).sum::<usize>(),
            "Transform stage finished"
        );

        // Barrier passed: group by key, values in task order
        let mut groups: Partition = BTreeMap::new();
        for partition in partitions {
            for (key, values) in partition {
                groups.entry(key).or_default().extend(values);
            }
        }
        let key_count = groups.len();
        let groups: Vec<(RecordKey, Vec<String>)> = groups.into_iter().collect();

        // Merge
        let mut chunks = Vec::with_capacity(task_count);
        let mut remaining = groups.into_iter();
        for (start, end) in slice_bounds(key_count, task_count) {
            chunks.push(remaining.by_ref().take(end - start).collect::<Vec<_>>());
        }
        let merge_units: Vec<_> = chunks
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| {
                let rule = Arc::clone(&request.rule);
                let task = TaskInfo::new(index, task_count, request.round);
                move || merge_unit(&rule, &task, chunk)
            })
            .collect();
        let merged = self.run_units(Stage::Merge, merge_units).await?;

        let mut lines = Vec::new();
        let mut partials = Vec::with_capacity(merged.len());
        for (unit_lines, counters) in merged {
            lines.extend(unit_lines);
            partials.push(counters);
        }
        let aggregate = Aggregate::from_partials(partials);

        debug!(
            round = request.round,
            keys = key_count,
            lines = lines.len(),
            aggregate_keys = aggregate.len(),
            "Merge stage finished"
        );

        let output = Self::output_location(&request.run_id, request.round);
        self.store.put(&output, lines).await?;
        self.release_input(&request).await;

        Ok(RoundOutcome::succeeded(output, aggregate))
    }
}

/// Split `len` items into `parts` contiguous, disjoint ranges of near-equal size
fn slice_bounds(len: usize, parts: usize) -> Vec<(usize, usize)> {
    let parts = parts.max(1);
    (0..parts)
        .map(|i| (len * i / parts, len * (i + 1) / parts))
        .collect()
}

fn transform_unit(rule: &RoundRule, task: &TaskInfo, lines: &[String]) -> Result<Partition, RuleError> {
    let mut out = Emitter::new();
    rule.begin_task(task, &mut out)?;
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        rule.transform(task, line, &mut out)?;
    }

    let mut partition: Partition = BTreeMap::new();
    for (key, value) in out.into_records() {
        partition.entry(key).or_default().push(value);
    }
    for (key, values) in partition.iter_mut() {
        let combined = rule.combine(key, std::mem::take(values))?;
        *values = combined;
    }
    Ok(partition)
}

fn merge_unit(
    rule: &RoundRule,
    task: &TaskInfo,
    groups: Vec<(RecordKey, Vec<String>)>,
) -> Result<(Vec<String>, Counters), RuleError> {
    let mut out = MergeOutput::new();
    for (key, values) in groups {
        rule.merge(task, &key, values, &mut out)?;
    }
    Ok(out.into_parts())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_bounds_cover_input() {
        let bounds = slice_bounds(10, 3);
        assert_eq!(bounds, vec![(0, 3), (3, 6), (6, 10)]);

        let bounds = slice_bounds(2, 4);
        assert_eq!(bounds.len(), 4);
        let covered: usize = bounds.iter().map(|(s, e)| e - s).sum();
        assert_eq!(covered, 2);

        assert_eq!(slice_bounds(0, 0), vec![(0, 0)]);
    }

    #[test]
    fn test_output_location() {
        let location = LocalExecutor::<MemoryStore>::output_location("run", 7);
        assert_eq!(location.as_str(), "run/round-0007");
    }
}
