//! Shortest-hop search
//!
//! A frontier of propagating records advances one hop per round:
//!
//! ```text
//! round 1   source emits `0` to itself and `T1` to its successors
//! round k   `$T<d>` records emit `T<d+1>` and replay themselves as `$<d>`
//! merge     an unreached record adopts the smallest token it receives
//! ```
//!
//! The run converges on the first round that reaches no new vertex.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::codec::{decode_vertex, encode_vertex};
use crate::error::{FormatError, RuleError};
use crate::graph::{GraphKind, Vertex, VertexId, VertexValue};
use crate::rounds::aggregate::{Aggregate, CounterTag};
use crate::rounds::algorithm::{Algorithm, RunPlan, Verdict};
use crate::rounds::error::{ConsistencyError, RoundError};
use crate::rounds::extract::converge_on_zero;
use crate::rounds::rule::{
    split_record, vertex_key, Emitter, MergeOutput, RecordKey, RecordRule, RoundRule, TaskInfo,
};

const PROPAGATING_MARKER: char = 'T';

/// Hop distance of a reached vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    /// Reached last round, still has to notify its successors
    Propagating(u64),
    /// Final
    Settled(u64),
}

impl Distance {
    pub fn hops(&self) -> u64 {
        match self {
            Distance::Propagating(d) | Distance::Settled(d) => *d,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, Distance::Settled(_))
    }

    fn parse(text: &str) -> Result<Self, String> {
        let (propagating, digits) = match text.strip_prefix(PROPAGATING_MARKER) {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let hops = digits
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid distance {:?}: {}", text, e))?;
        Ok(if propagating {
            Distance::Propagating(hops)
        } else {
            Distance::Settled(hops)
        })
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distance::Propagating(d) => write!(f, "{}{}", PROPAGATING_MARKER, d),
            Distance::Settled(d) => write!(f, "{}", d),
        }
    }
}

impl VertexValue for Distance {
    fn encode_value(&self) -> String {
        self.to_string()
    }

    fn decode_value(text: &str) -> Result<Self, String> {
        Self::parse(text)
    }
}

/// Transform and merge for one search round
#[derive(Debug, Clone)]
pub struct SearchRule {
    kind: GraphKind,
    source: VertexId,
}

impl SearchRule {
    pub fn new(kind: GraphKind, source: VertexId) -> Self {
        Self { kind, source }
    }
}

impl RecordRule for SearchRule {
    fn name(&self) -> &'static str {
        "search"
    }

    fn transform(&self, _task: &TaskInfo, line: &str, out: &mut Emitter) -> Result<(), RuleError> {
        let mut vertex: Vertex<Distance> = decode_vertex(line, self.kind)?;
        match vertex.value {
            None if vertex.id == self.source => {
                out.send(vertex.id, Distance::Settled(0).to_string());
                let token = Distance::Propagating(1).to_string();
                out.broadcast(vertex.adjacency.successors(), &token);
            }
            Some(Distance::Propagating(d)) => {
                let token = Distance::Propagating(d + 1).to_string();
                out.broadcast(vertex.adjacency.successors(), &token);
                vertex.value = Some(Distance::Settled(d));
            }
            _ => {}
        }
        out.send(vertex.id, encode_vertex(&vertex));
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
        let mut vertex: Vertex<Distance> = decode_vertex(&record, self.kind)?;

        if vertex.value.is_none() && !tokens.is_empty() {
            let mut best: Option<Distance> = None;
            for token in &tokens {
                let candidate =
                    Distance::parse(token).map_err(|reason| FormatError::new(token, reason))?;
                // settled wins over propagating at equal distance
                let better = match best {
                    None => true,
                    Some(current) => {
                        (candidate.hops(), !candidate.is_settled())
                            < (current.hops(), !current.is_settled())
                    }
                };
                if better {
                    best = Some(candidate);
                }
            }
            vertex.value = best;
            out.increment(CounterTag::Visited);
        }

        out.write(encode_vertex(&vertex));
        Ok(())
    }
}

/// Shortest-hop search from a single source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Search {
    pub source: VertexId,
    #[serde(default)]
    pub kind: GraphKind,
}

impl Search {
    pub fn new(source: impl Into<VertexId>, kind: GraphKind) -> Self {
        Self {
            source: source.into(),
            kind,
        }
    }
}

impl Algorithm for Search {
    type Params = ();

    fn name(&self) -> &'static str {
        "search"
    }

    fn initial_params(&self, _plan: &RunPlan) -> Result<(), RoundError> {
        Ok(())
    }

    fn rule(&self, _params: &()) -> RoundRule {
        RoundRule::Search(SearchRule::new(self.kind, self.source))
    }

    fn extract(
        &self,
        _round: usize,
        _params: &(),
        aggregate: &Aggregate,
    ) -> Result<Verdict<()>, ConsistencyError> {
        converge_on_zero(aggregate, CounterTag::Visited, || ())
    }
}

/// Read hop distances from search output; unreached vertices are absent
pub fn distances<S: AsRef<str>>(
    lines: &[S],
    kind: GraphKind,
) -> Result<BTreeMap<VertexId, u64>, FormatError> {
    let mut result = BTreeMap::new();
    for line in lines {
        let vertex: Vertex<Distance> = decode_vertex(line.as_ref(), kind)?;
        if let Some(distance) = vertex.value {
            result.insert(vertex.id, distance.hops());
        }
    }
    Ok(result)
}
