//! Transform and merge rules
//!
//! A round runs one [`RoundRule`]. Transform units turn input lines into keyed
//! values written to their own [`Emitter`]; after the barrier every key's
//! values are handed to exactly one merge call, which writes output lines and
//! counts events into its [`MergeOutput`].

use std::fmt;

use crate::algorithms::{
    CommunityRule, ComponentRule, GrowthInitRule, GrowthStepRule, SearchRule, StatsComputeRule,
    StatsGatherRule,
};
use crate::error::RuleError;
use crate::graph::VertexId;

use super::aggregate::{AggregateKey, Counters};

/// Shuffle key of an emitted value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordKey {
    /// Values addressed to one vertex
    Vertex(VertexId),
    /// The single key for whole-graph summaries
    Summary,
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Vertex(id) => write!(f, "{}", id),
            RecordKey::Summary => f.write_str("summary"),
        }
    }
}

impl From<VertexId> for RecordKey {
    fn from(id: VertexId) -> Self {
        Self::Vertex(id)
    }
}

/// Position of a transform unit within its round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskInfo {
    pub index: usize,
    pub task_count: usize,
    pub round: usize,
}

impl TaskInfo {
    pub fn new(index: usize, task_count: usize, round: usize) -> Self {
        Self {
            index,
            task_count,
            round,
        }
    }
}

/// Outbox of one transform unit
#[derive(Debug, Default)]
pub struct Emitter {
    records: Vec<(RecordKey, String)>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit a value under a key
    pub fn emit(&mut self, key: RecordKey, value: impl Into<String>) {
        self.records.push((key, value.into()));
    }

    /// Emit a value addressed to a vertex
    pub fn send(&mut self, to: VertexId, value: impl Into<String>) {
        self.emit(RecordKey::Vertex(to), value);
    }

    /// Emit the same value to several vertices
    pub fn broadcast<'a>(&mut self, targets: impl IntoIterator<Item = &'a VertexId>, value: &str) {
        for target in targets {
            self.send(*target, value);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consume the emitter and return all emitted values in order
    pub fn into_records(self) -> Vec<(RecordKey, String)> {
        self.records
    }
}

/// Output of one merge unit
#[derive(Debug, Default)]
pub struct MergeOutput {
    lines: Vec<String>,
    counters: Counters,
}

impl MergeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one output line
    pub fn write(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Count one event
    pub fn increment(&mut self, key: impl Into<AggregateKey>) {
        self.counters.increment(key);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn into_parts(self) -> (Vec<String>, Counters) {
        (self.lines, self.counters)
    }
}

/// Per-round transform, combine and merge functions
///
/// Implementations are stateless: everything a round needs is captured in the
/// rule value itself, which is shared read-only between units.
pub trait RecordRule: Send + Sync {
    /// Rule name for logs and reports
    fn name(&self) -> &'static str;

    /// Called once per transform unit before its first line
    fn begin_task(&self, _task: &TaskInfo, _out: &mut Emitter) -> Result<(), RuleError> {
        Ok(())
    }

    /// Transform one input line
    fn transform(&self, task: &TaskInfo, line: &str, out: &mut Emitter) -> Result<(), RuleError>;

    /// Pre-merge values of one key inside a transform unit
    ///
    /// Must be associative and commutative. Defaults to passing values through.
    fn combine(&self, _key: &RecordKey, values: Vec<String>) -> Result<Vec<String>, RuleError> {
        Ok(values)
    }

    /// Merge every value emitted under one key
    fn merge(
        &self,
        task: &TaskInfo,
        key: &RecordKey,
        values: Vec<String>,
        out: &mut MergeOutput,
    ) -> Result<(), RuleError>;
}

/// The rule a round runs, selected from the round parameters
#[derive(Debug, Clone)]
pub enum RoundRule {
    Search(SearchRule),
    ComponentLabelDirected(ComponentRule),
    ComponentLabelUndirected(ComponentRule),
    CommunityLabel(CommunityRule),
    GrowthInit(GrowthInitRule),
    GrowthStep(GrowthStepRule),
    StatsGather(StatsGatherRule),
    StatsCompute(StatsComputeRule),
}

impl RoundRule {
    fn inner(&self) -> &dyn RecordRule {
        match self {
            RoundRule::Search(rule) => rule,
            RoundRule::ComponentLabelDirected(rule) | RoundRule::ComponentLabelUndirected(rule) => {
                rule
            }
            RoundRule::CommunityLabel(rule) => rule,
            RoundRule::GrowthInit(rule) => rule,
            RoundRule::GrowthStep(rule) => rule,
            RoundRule::StatsGather(rule) => rule,
            RoundRule::StatsCompute(rule) => rule,
        }
    }
}

impl RecordRule for RoundRule {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn begin_task(&self, task: &TaskInfo, out: &mut Emitter) -> Result<(), RuleError> {
        self.inner().begin_task(task, out)
    }

    fn transform(&self, task: &TaskInfo, line: &str, out: &mut Emitter) -> Result<(), RuleError> {
        self.inner().transform(task, line, out)
    }

    fn combine(&self, key: &RecordKey, values: Vec<String>) -> Result<Vec<String>, RuleError> {
        self.inner().combine(key, values)
    }

    fn merge(
        &self,
        task: &TaskInfo,
        key: &RecordKey,
        values: Vec<String>,
        out: &mut MergeOutput,
    ) -> Result<(), RuleError> {
        self.inner().merge(task, key, values, out)
    }
}

/// Split a merge group into the vertex's own record and the tokens sent to it
///
/// Fails when more than one record arrived. Tokens addressed to a vertex with
/// no record are reported by the caller, which knows whether that is allowed.
pub(crate) fn split_record(
    id: VertexId,
    values: Vec<String>,
) -> Result<(Option<String>, Vec<String>), RuleError> {
    let mut record = None;
    let mut tokens = Vec::new();
    for value in values {
        if crate::codec::is_record(&value) {
            if record.is_some() {
                return Err(RuleError::DuplicateRecord(id));
            }
            record = Some(value);
        } else {
            tokens.push(value);
        }
    }
    Ok((record, tokens))
}

/// Vertex id of a merge key, or an error for rules that never emit summaries
pub(crate) fn vertex_key(rule: &'static str, key: &RecordKey) -> Result<VertexId, RuleError> {
    match key {
        RecordKey::Vertex(id) => Ok(*id),
        RecordKey::Summary => Err(RuleError::UnexpectedKey {
            rule,
            key: key.to_string(),
        }),
    }
}
