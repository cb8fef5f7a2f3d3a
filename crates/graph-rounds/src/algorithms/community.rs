//! Community detection by weighted label propagation
//!
//! Each vertex carries a `(label, score)` pair. Every round it offers its label
//! to its neighbours, weighted by `score * degree^m` where `m` is the node
//! preference. A vertex adopts the heaviest label it sees; its own label gets a
//! retention bonus of its own weight. Scores decay by the hop attenuation each
//! time a label is handed on, which keeps labels from flooding the graph.

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

/// Community label of a vertex with its score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Membership {
    pub label: VertexId,
    pub score: f64,
}

impl Membership {
    pub fn new(label: VertexId, score: f64) -> Self {
        Self { label, score }
    }
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.label, self.score)
    }
}

impl VertexValue for Membership {
    fn encode_value(&self) -> String {
        self.to_string()
    }

    fn decode_value(text: &str) -> Result<Self, String> {
        let (label, score) = text
            .split_once(',')
            .ok_or_else(|| format!("membership must be label,score: {:?}", text))?;
        Ok(Self {
            label: label
                .parse()
                .map_err(|e| format!("invalid label {:?}: {}", label, e))?,
            score: parse_score(score)?,
        })
    }
}

/// Label offer sent to a neighbour: `label,score,degree`
#[derive(Debug, Clone, Copy, PartialEq)]
struct Offer {
    label: VertexId,
    score: f64,
    degree: usize,
}

impl Offer {
    fn encode(&self) -> String {
        format!("{},{},{}", self.label, self.score, self.degree)
    }

    fn decode(text: &str) -> Result<Self, FormatError> {
        let parts: Vec<&str> = text.split(',').collect();
        if parts.len() != 3 {
            return Err(FormatError::arity(text, "3", parts.len()));
        }
        let label = parts[0]
            .parse()
            .map_err(|e| FormatError::new(text, format!("invalid label: {}", e)))?;
        let score = parse_score(parts[1]).map_err(|reason| FormatError::new(text, reason))?;
        let degree = parts[2]
            .trim()
            .parse()
            .map_err(|e| FormatError::new(text, format!("invalid degree: {}", e)))?;
        Ok(Self {
            label,
            score,
            degree,
        })
    }
}

fn parse_score(text: &str) -> Result<f64, String> {
    let score: f64 = text
        .trim()
        .parse()
        .map_err(|e| format!("invalid score {:?}: {}", text, e))?;
    if score.is_finite() {
        Ok(score)
    } else {
        Err(format!("score must be finite, got {}", text))
    }
}

/// Transform and merge for one propagation round
#[derive(Debug, Clone)]
pub struct CommunityRule {
    kind: GraphKind,
    node_preference: f64,
    hop_attenuation: f64,
}

impl CommunityRule {
    pub fn new(kind: GraphKind, node_preference: f64, hop_attenuation: f64) -> Self {
        Self {
            kind,
            node_preference,
            hop_attenuation,
        }
    }

    fn weight(&self, score: f64, degree: usize) -> f64 {
        score * (degree as f64).powf(self.node_preference)
    }
}

impl RecordRule for CommunityRule {
    fn name(&self) -> &'static str {
        "community_label"
    }

    fn transform(&self, _task: &TaskInfo, line: &str, out: &mut Emitter) -> Result<(), RuleError> {
        let mut vertex: Vertex<Membership> = decode_vertex(line, self.kind)?;
        let membership = *vertex
            .value
            .get_or_insert(Membership::new(vertex.id, 1.0));
        let neighbours = vertex.adjacency.neighbours();

        let offer = Offer {
            label: membership.label,
            score: membership.score,
            degree: neighbours.len(),
        };
        out.broadcast(&neighbours, &offer.encode());
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
        let mut vertex: Vertex<Membership> = decode_vertex(&record, self.kind)?;
        let current = vertex.value.unwrap_or(Membership::new(vertex.id, 1.0));

        let mut offers = tokens
            .iter()
            .map(|token| Offer::decode(token))
            .collect::<Result<Vec<_>, _>>()?;
        // fixed summation order
        offers.sort_by(|a, b| {
            a.label
                .cmp(&b.label)
                .then(a.score.total_cmp(&b.score))
                .then(a.degree.cmp(&b.degree))
        });

        let mut weights: BTreeMap<VertexId, f64> = BTreeMap::new();
        let mut best_scores: BTreeMap<VertexId, f64> = BTreeMap::new();
        for offer in &offers {
            *weights.entry(offer.label).or_insert(0.0) += self.weight(offer.score, offer.degree);
            let best = best_scores.entry(offer.label).or_insert(offer.score);
            *best = best.max(offer.score);
        }
        *weights.entry(current.label).or_insert(0.0) +=
            self.weight(current.score, vertex.adjacency.degree());

        // ties keep the current label, then the smallest label
        let mut chosen = current.label;
        let mut chosen_weight = weights.get(&current.label).copied().unwrap_or(0.0);
        for (label, weight) in &weights {
            if *weight > chosen_weight {
                chosen = *label;
                chosen_weight = *weight;
            }
        }

        let next = if chosen == current.label {
            current
        } else {
            out.increment(CounterTag::Changed);
            let inherited = best_scores.get(&chosen).copied().unwrap_or(current.score);
            Membership::new(chosen, inherited * (1.0 - self.hop_attenuation))
        };
        vertex.value = Some(next);

        out.write(encode_vertex(&vertex));
        Ok(())
    }
}

/// Label propagation community detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityDetection {
    #[serde(default)]
    pub kind: GraphKind,
    /// Exponent `m` applied to neighbour degrees
    pub node_preference: f64,
    /// Score decay `δ` applied when a label is adopted
    pub hop_attenuation: f64,
    /// Rounds after which the run stops without converging
    pub max_iterations: usize,
}

impl Default for CommunityDetection {
    fn default() -> Self {
        Self {
            kind: GraphKind::Undirected,
            node_preference: 0.1,
            hop_attenuation: 0.1,
            max_iterations: 20,
        }
    }
}

impl CommunityDetection {
    pub fn new(kind: GraphKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn with_node_preference(mut self, m: f64) -> Self {
        self.node_preference = m;
        self
    }

    pub fn with_hop_attenuation(mut self, delta: f64) -> Self {
        self.hop_attenuation = delta;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }
}

impl Algorithm for CommunityDetection {
    type Params = ();

    fn name(&self) -> &'static str {
        "community_detection"
    }

    fn initial_params(&self, _plan: &RunPlan) -> Result<(), RoundError> {
        if !self.node_preference.is_finite() {
            return Err(RoundError::config_error("node preference must be finite"));
        }
        if !(0.0..1.0).contains(&self.hop_attenuation) {
            return Err(RoundError::config_error(format!(
                "hop attenuation must be in [0, 1), got {}",
                self.hop_attenuation
            )));
        }
        if self.max_iterations == 0 {
            return Err(RoundError::config_error("max iterations must be at least 1"));
        }
        Ok(())
    }

    fn rule(&self, _params: &()) -> RoundRule {
        RoundRule::CommunityLabel(CommunityRule::new(
            self.kind,
            self.node_preference,
            self.hop_attenuation,
        ))
    }

    fn extract(
        &self,
        _round: usize,
        _params: &(),
        aggregate: &Aggregate,
    ) -> Result<Verdict<()>, ConsistencyError> {
        converge_on_zero(aggregate, CounterTag::Changed, || ())
    }

    fn round_bound(&self) -> Option<usize> {
        Some(self.max_iterations)
    }
}

/// Read community memberships from propagation output
pub fn memberships<S: AsRef<str>>(
    lines: &[S],
    kind: GraphKind,
) -> Result<BTreeMap<VertexId, Membership>, FormatError> {
    let mut result = BTreeMap::new();
    for line in lines {
        let vertex: Vertex<Membership> = decode_vertex(line.as_ref(), kind)?;
        let membership = vertex.value.unwrap_or(Membership::new(vertex.id, 1.0));
        result.insert(vertex.id, membership);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> TaskInfo {
        TaskInfo::new(0, 1, 1)
    }

    fn merge(rule: &CommunityRule, id: u64, values: &[&str]) -> (String, Aggregate) {
        let mut out = MergeOutput::new();
        rule.merge(
            &task(),
            &RecordKey::Vertex(VertexId(id)),
            values.iter().map(|v| v.to_string()).collect(),
            &mut out,
        )
        .unwrap();
        let (mut lines, counters) = out.into_parts();
        (lines.remove(0), counters.into())
    }

    #[test]
    fn test_membership_encoding() {
        let m = Membership::new(VertexId(4), 0.9);
        assert_eq!(m.encode_value(), "4,0.9");
        assert_eq!(Membership::decode_value("4,0.9").unwrap(), m);
        assert!(Membership::decode_value("4").is_err());
        assert!(Membership::decode_value("4,NaN").is_err());
    }

    #[test]
    fn test_transform_offers_label_to_neighbours() {
        let rule = CommunityRule::new(GraphKind::Undirected, 1.0, 0.1);
        let mut out = Emitter::new();
        rule.transform(&task(), "2\t1,3", &mut out).unwrap();
        let records = out.into_records();
        assert_eq!(records[0], (RecordKey::Vertex(VertexId(1)), "2,1,2".to_string()));
        assert_eq!(records[1], (RecordKey::Vertex(VertexId(3)), "2,1,2".to_string()));
        assert_eq!(records[2].1, "2\t1,3\t$2,1");
    }

    #[test]
    fn test_leaf_adopts_hub_label() {
        // leaf 2 of a star centred on 1 with three leaves
        let rule = CommunityRule::new(GraphKind::Undirected, 1.0, 0.1);
        let (line, aggregate) = merge(&rule, 2, &["2\t1\t$2,1", "1,1,3"]);
        let vertex: Vertex<Membership> = decode_vertex(&line, GraphKind::Undirected).unwrap();
        let membership = vertex.value.unwrap();
        assert_eq!(membership.label, VertexId(1));
        assert!((membership.score - 0.9).abs() < 1e-12);
        assert_eq!(aggregate.count(CounterTag::Changed), 1);
    }

    #[test]
    fn test_hub_retains_label() {
        let rule = CommunityRule::new(GraphKind::Undirected, 1.0, 0.1);
        let (line, aggregate) = merge(
            &rule,
            1,
            &["1\t2,3,4\t$1,1", "2,1,1", "3,1,1", "4,1,1"],
        );
        assert_eq!(line, "1\t2,3,4\t$1,1");
        assert!(aggregate.is_empty());
    }

    #[test]
    fn test_tie_prefers_current_then_smallest() {
        let rule = CommunityRule::new(GraphKind::Undirected, 0.0, 0.0);
        // current label 5 weighs 1, labels 3 and 4 weigh 2 each
        let (line, _) = merge(
            &rule,
            5,
            &["5\t1,2,3,4\t$5,1", "4,1,1", "3,1,1", "4,1,1", "3,1,1"],
        );
        assert!(line.ends_with("$3,1"));

        // current label 3 ties with 2
        let (line, aggregate) = merge(&rule, 6, &["6\t1,2\t$3,1", "2,1,1"]);
        assert!(line.ends_with("$3,1"));
        assert!(aggregate.is_empty());
    }

    #[test]
    fn test_config_validation() {
        let plan = RunPlan::new(2);
        assert!(CommunityDetection::default().initial_params(&plan).is_ok());
        assert!(CommunityDetection::default()
            .with_hop_attenuation(1.0)
            .initial_params(&plan)
            .is_err());
        assert!(CommunityDetection::default()
            .with_max_iterations(0)
            .initial_params(&plan)
            .is_err());
        assert_eq!(
            CommunityDetection::default().with_max_iterations(7).round_bound(),
            Some(7)
        );
    }
}
