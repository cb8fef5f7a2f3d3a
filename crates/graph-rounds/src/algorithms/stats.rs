//! Degree and clustering statistics in two rounds
//!
//! The gather round assembles one neighbourhood record per vertex. The compute
//! round turns each neighbourhood into a `vertices,degree_sum,cc_sum` partial
//! under the summary key, folds partials inside every transform unit and
//! writes a single `vertices<TAB>edges<TAB>average_cc` line. The first unit
//! seeds a zero partial, so a graph without vertices reports `0<TAB>0<TAB>0`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codec::{decode_vertex, NeighbourEdges, Neighbourhood};
use crate::error::{FormatError, RuleError};
use crate::graph::{GraphKind, Vertex};
use crate::rounds::aggregate::Aggregate;
use crate::rounds::algorithm::{Algorithm, RunPlan, Verdict};
use crate::rounds::error::{ConsistencyError, RoundError};
use crate::rounds::extract::expect_empty;
use crate::rounds::rule::{
    split_record, vertex_key, Emitter, MergeOutput, RecordKey, RecordRule, RoundRule, TaskInfo,
};

/// Gather round: build neighbourhood records
#[derive(Debug, Clone)]
pub struct StatsGatherRule {
    kind: GraphKind,
}

impl RecordRule for StatsGatherRule {
    fn name(&self) -> &'static str {
        "stats_gather"
    }

    fn transform(&self, _task: &TaskInfo, line: &str, out: &mut Emitter) -> Result<(), RuleError> {
        let vertex: Vertex = decode_vertex(line, self.kind)?;
        let edges = NeighbourEdges::new(vertex.id, vertex.adjacency.successors().to_vec());
        out.broadcast(&vertex.adjacency.neighbours(), &edges.encode());
        out.send(vertex.id, line);
        Ok(())
    }

    fn merge(
        &self,
        _task: &TaskInfo,
        key: &RecordKey,
        values: Vec<String>,
        out: &mut MergeOutput,
    ) -> Result<(), RuleError> {
        let id = vertex_key(self.name(), key)?;
        let (record, tokens) = split_record(id, values)?;
        let record = record.ok_or(RuleError::MissingRecord(id))?;

        let central: Vertex = decode_vertex(&record, self.kind)?;
        let mut neighbours = tokens
            .iter()
            .map(|token| NeighbourEdges::decode(token))
            .collect::<Result<Vec<_>, _>>()?;
        neighbours.sort_by_key(|n| n.id);

        out.write(Neighbourhood {
            central,
            neighbours,
        }
        .encode());
        Ok(())
    }
}

/// Running totals over a set of neighbourhoods
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Partial {
    vertices: u64,
    degree_sum: u64,
    cc_sum: f64,
}

impl Partial {
    fn add(self, other: Partial) -> Partial {
        Partial {
            vertices: self.vertices + other.vertices,
            degree_sum: self.degree_sum + other.degree_sum,
            cc_sum: self.cc_sum + other.cc_sum,
        }
    }

    fn encode(&self) -> String {
        format!("{},{},{}", self.vertices, self.degree_sum, self.cc_sum)
    }

    fn decode(text: &str) -> Result<Self, FormatError> {
        let parts: Vec<&str> = text.split(',').collect();
        if parts.len() != 3 {
            return Err(FormatError::arity(text, "3", parts.len()));
        }
        Ok(Self {
            vertices: parts[0].trim().parse().map_err(|e| invalid(text, e))?,
            degree_sum: parts[1].trim().parse().map_err(|e| invalid(text, e))?,
            cc_sum: parts[2].trim().parse().map_err(|e| invalid(text, e))?,
        })
    }
}

fn invalid(line: &str, error: impl fmt::Display) -> FormatError {
    FormatError::new(line, format!("invalid number: {}", error))
}

fn sum_partials(values: &[String]) -> Result<Partial, FormatError> {
    values
        .iter()
        .try_fold(Partial::default(), |acc, value| Ok(acc.add(Partial::decode(value)?)))
}

/// Compute round: reduce neighbourhoods to one summary line
#[derive(Debug, Clone)]
pub struct StatsComputeRule {
    kind: GraphKind,
}

impl RecordRule for StatsComputeRule {
    fn name(&self) -> &'static str {
        "stats_compute"
    }

    /// Seed the summary key so an empty graph still yields `0\t0\t0`
    fn begin_task(&self, task: &TaskInfo, out: &mut Emitter) -> Result<(), RuleError> {
        if task.index == 0 {
            out.emit(RecordKey::Summary, Partial::default().encode());
        }
        Ok(())
    }

    fn transform(&self, _task: &TaskInfo, line: &str, out: &mut Emitter) -> Result<(), RuleError> {
        let neighbourhood = Neighbourhood::decode(line, self.kind)?;
        let partial = Partial {
            vertices: 1,
            degree_sum: neighbourhood.central.adjacency.successors().len() as u64,
            cc_sum: neighbourhood.clustering_coefficient(),
        };
        out.emit(RecordKey::Summary, partial.encode());
        Ok(())
    }

    fn combine(&self, key: &RecordKey, values: Vec<String>) -> Result<Vec<String>, RuleError> {
        if *key != RecordKey::Summary {
            return Err(RuleError::UnexpectedKey {
                rule: self.name(),
                key: key.to_string(),
            });
        }
        Ok(vec![sum_partials(&values)?.encode()])
    }

    fn merge(
        &self,
        _task: &TaskInfo,
        key: &RecordKey,
        values: Vec<String>,
        out: &mut MergeOutput,
    ) -> Result<(), RuleError> {
        if *key != RecordKey::Summary {
            return Err(RuleError::UnexpectedKey {
                rule: self.name(),
                key: key.to_string(),
            });
        }
        let total = sum_partials(&values)?;
        let edges = match self.kind {
            GraphKind::Directed => total.degree_sum,
            GraphKind::Undirected => total.degree_sum / 2,
        };
        let average_clustering = if total.vertices == 0 {
            0.0
        } else {
            total.cc_sum / total.vertices as f64
        };
        out.write(
            GraphSummary {
                vertices: total.vertices,
                edges,
                average_clustering,
            }
            .to_string(),
        );
        Ok(())
    }
}

/// Whole-graph statistics line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub vertices: u64,
    pub edges: u64,
    pub average_clustering: f64,
}

impl GraphSummary {
    /// Parse `vertices<TAB>edges<TAB>average_cc`
    pub fn parse(line: &str) -> Result<Self, FormatError> {
        let segments: Vec<&str> = line.split('\t').collect();
        if segments.len() != 3 {
            return Err(FormatError::arity(line, "3", segments.len()));
        }
        Ok(Self {
            vertices: segments[0].trim().parse().map_err(|e| invalid(line, e))?,
            edges: segments[1].trim().parse().map_err(|e| invalid(line, e))?,
            average_clustering: segments[2].trim().parse().map_err(|e| invalid(line, e))?,
        })
    }
}

impl fmt::Display for GraphSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}",
            self.vertices, self.edges, self.average_clustering
        )
    }
}

/// Round parameters: which of the two passes to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsPhase {
    Gather,
    Compute,
}

/// Vertex count, edge count and average local clustering coefficient
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphStats {
    #[serde(default)]
    pub kind: GraphKind,
}

impl GraphStats {
    pub fn new(kind: GraphKind) -> Self {
        Self { kind }
    }
}

impl Algorithm for GraphStats {
    type Params = StatsPhase;

    fn name(&self) -> &'static str {
        "graph_stats"
    }

    fn initial_params(&self, _plan: &RunPlan) -> Result<StatsPhase, RoundError> {
        Ok(StatsPhase::Gather)
    }

    fn rule(&self, params: &StatsPhase) -> RoundRule {
        match params {
            StatsPhase::Gather => RoundRule::StatsGather(StatsGatherRule { kind: self.kind }),
            StatsPhase::Compute => RoundRule::StatsCompute(StatsComputeRule { kind: self.kind }),
        }
    }

    fn extract(
        &self,
        _round: usize,
        params: &StatsPhase,
        aggregate: &Aggregate,
    ) -> Result<Verdict<StatsPhase>, ConsistencyError> {
        expect_empty(aggregate)?;
        Ok(match params {
            StatsPhase::Gather => Verdict::Continue(StatsPhase::Compute),
            StatsPhase::Compute => Verdict::Converged,
        })
    }

    fn round_bound(&self) -> Option<usize> {
        Some(2)
    }
}
