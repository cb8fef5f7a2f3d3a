//! Connected component labelling by flooding
//!
//! Every vertex starts with its own id as label and repeatedly takes the
//! smallest label among itself and its neighbours, ignoring edge direction.
//! A round that lowers no label is the fixpoint.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

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

/// Component labels are vertex ids
impl VertexValue for VertexId {
    fn encode_value(&self) -> String {
        self.to_string()
    }

    fn decode_value(text: &str) -> Result<Self, String> {
        text.parse()
            .map_err(|e| format!("invalid component label {:?}: {}", text, e))
    }
}

/// Transform and merge for one labelling round
#[derive(Debug, Clone)]
pub struct ComponentRule {
    kind: GraphKind,
}

impl ComponentRule {
    pub fn new(kind: GraphKind) -> Self {
        Self { kind }
    }
}

impl RecordRule for ComponentRule {
    fn name(&self) -> &'static str {
        match self.kind {
            GraphKind::Directed => "component_label_directed",
            GraphKind::Undirected => "component_label_undirected",
        }
    }

    fn transform(&self, _task: &TaskInfo, line: &str, out: &mut Emitter) -> Result<(), RuleError> {
        let mut vertex: Vertex<VertexId> = decode_vertex(line, self.kind)?;
        let label = *vertex.value.get_or_insert(vertex.id);
        let token = label.to_string();

        out.send(vertex.id, token.as_str());
        out.broadcast(&vertex.adjacency.neighbours(), &token);
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
        let mut vertex: Vertex<VertexId> = decode_vertex(&record, self.kind)?;

        let current = vertex.value.unwrap_or(vertex.id);
        let mut lowest = current;
        for token in &tokens {
            let label = VertexId::decode_value(token)
                .map_err(|reason| FormatError::new(token, reason))?;
            lowest = lowest.min(label);
        }
        if lowest < current {
            out.increment(CounterTag::Updated);
        }
        vertex.value = Some(lowest);

        out.write(encode_vertex(&vertex));
        Ok(())
    }
}

/// Connected components (weakly connected for directed graphs)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectedComponents {
    #[serde(default)]
    pub kind: GraphKind,
}

impl ConnectedComponents {
    pub fn new(kind: GraphKind) -> Self {
        Self { kind }
    }
}

impl Algorithm for ConnectedComponents {
    type Params = ();

    fn name(&self) -> &'static str {
        "connected_components"
    }

    fn initial_params(&self, _plan: &RunPlan) -> Result<(), RoundError> {
        Ok(())
    }

    fn rule(&self, _params: &()) -> RoundRule {
        let rule = ComponentRule::new(self.kind);
        match self.kind {
            GraphKind::Directed => RoundRule::ComponentLabelDirected(rule),
            GraphKind::Undirected => RoundRule::ComponentLabelUndirected(rule),
        }
    }

    fn extract(
        &self,
        _round: usize,
        _params: &(),
        aggregate: &Aggregate,
    ) -> Result<Verdict<()>, ConsistencyError> {
        converge_on_zero(aggregate, CounterTag::Updated, || ())
    }
}

/// Read component labels from labelling output
///
/// Records that have not been through a round yet are their own component.
pub fn labels<S: AsRef<str>>(
    lines: &[S],
    kind: GraphKind,
) -> Result<BTreeMap<VertexId, VertexId>, FormatError> {
    let mut result = BTreeMap::new();
    for line in lines {
        let vertex: Vertex<VertexId> = decode_vertex(line.as_ref(), kind)?;
        result.insert(vertex.id, vertex.value.unwrap_or(vertex.id));
    }
    Ok(result)
}
