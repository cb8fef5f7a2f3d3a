//! Synthetic graph growth with the forest-fire model
//!
//! The init round creates `K` new vertices and links each one to an
//! ambassador drawn uniformly from the existing vertices its task has seen.
//! Every following round spreads the fire one hop: neighbours of the last
//! round's ambassadors offer themselves to the new vertex, which links to each
//! with probability `p` (ambassador points at the neighbour) or `r` (the
//! neighbour points at the ambassador). Each linked pair becomes an ambassador
//! for the next round.
//!
//! New vertex ids are assigned per transform task:
//!
//! ```text
//! base = max_id + 1, per_task = ceil(K / T)
//! task i creates base + i * per_task + j  for i * per_task + j < K
//! ```

use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::codec::{decode_vertex, encode_vertex};
use crate::error::{FormatError, RuleError};
use crate::graph::{Adjacency, GraphKind, Vertex, VertexId};
use crate::rounds::aggregate::{Aggregate, AggregateKey};
use crate::rounds::algorithm::{Algorithm, RunPlan, Verdict};
use crate::rounds::error::{ConsistencyError, RoundError};
use crate::rounds::extract::{expect_empty, pairs};
use crate::rounds::rule::{
    split_record, vertex_key, Emitter, MergeOutput, RecordKey, RecordRule, RoundRule, TaskInfo,
};

const CANDIDATE: char = 'A';
const FORWARD: char = 'F';
const BACKWARD: char = 'B';

/// Placement of new vertex ids across transform tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowthLayout {
    /// First new id
    pub base: u64,
    /// Number of new vertices
    pub new_vertices: u64,
    /// Upper bound of new vertices per task
    pub per_task: u64,
}

impl GrowthLayout {
    pub fn new(base: u64, new_vertices: u64, task_count: usize) -> Self {
        let task_count = task_count.max(1) as u64;
        Self {
            base,
            new_vertices,
            per_task: new_vertices.div_ceil(task_count),
        }
    }

    /// Ids created by one task
    pub fn task_ids(&self, task: usize) -> impl Iterator<Item = VertexId> {
        let base = self.base;
        let start = (task as u64).saturating_mul(self.per_task);
        let end = start.saturating_add(self.per_task).min(self.new_vertices);
        (start..end).map(move |offset| VertexId(base + offset))
    }

    /// Check whether an id was created by the growth run
    pub fn is_new(&self, id: VertexId) -> bool {
        id.get() >= self.base && id.get() - self.base < self.new_vertices
    }

    /// Check whether an id belongs to the graph before growth
    pub fn is_existing(&self, id: VertexId) -> bool {
        id.get() < self.base
    }
}

/// New vertices linked to each ambassador in the last round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmbassadorMap {
    by_ambassador: BTreeMap<VertexId, Vec<VertexId>>,
    pairs: usize,
}

impl AmbassadorMap {
    /// Rebuild the map from a round aggregate
    ///
    /// Every key must be a `(new, ambassador)` pair counted exactly once, with
    /// a new vertex from the layout and an ambassador from the original graph.
    pub fn from_aggregate(
        aggregate: &Aggregate,
        layout: &GrowthLayout,
    ) -> Result<Self, ConsistencyError> {
        if let Some((key, count)) = aggregate.iter().find(|(_, count)| *count != 1) {
            return Err(ConsistencyError::new(format!(
                "pair {} counted {} times",
                key, count
            )));
        }

        let mut map = Self::default();
        for (new, ambassador) in pairs(aggregate)? {
            if !layout.is_new(new) {
                return Err(ConsistencyError::new(format!(
                    "vertex {} in pair {} was not created by this run",
                    new,
                    AggregateKey::pair(new, ambassador)
                )));
            }
            if !layout.is_existing(ambassador) {
                return Err(ConsistencyError::new(format!(
                    "ambassador {} in pair {} is not an existing vertex",
                    ambassador,
                    AggregateKey::pair(new, ambassador)
                )));
            }
            map.by_ambassador.entry(ambassador).or_default().push(new);
            map.pairs += 1;
        }
        Ok(map)
    }

    /// New vertices an ambassador was linked to
    pub fn new_vertices_of(&self, ambassador: VertexId) -> Option<&[VertexId]> {
        self.by_ambassador.get(&ambassador).map(Vec::as_slice)
    }

    pub fn is_ambassador(&self, id: VertexId) -> bool {
        self.by_ambassador.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs == 0
    }

    /// Number of `(new, ambassador)` pairs
    pub fn len(&self) -> usize {
        self.pairs
    }
}

/// Growth round parameters
#[derive(Debug, Clone, PartialEq)]
pub enum GrowthPhase {
    /// Create new vertices and pick their first ambassador
    Init,
    /// Link the last ambassadors back and spread the fire one hop
    Step(Arc<AmbassadorMap>),
    /// Link the last ambassadors back without spreading further
    Finalize(Arc<AmbassadorMap>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GrowthParams {
    pub layout: GrowthLayout,
    pub phase: GrowthPhase,
}

/// Per-vertex random stream, independent of task scheduling
fn vertex_rng(seed: u64, round: usize, id: VertexId) -> StdRng {
    let mixed = seed
        ^ (round as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ id.get().wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    StdRng::seed_from_u64(mixed)
}

fn parse_token(token: &str) -> Result<(char, VertexId), FormatError> {
    let mut chars = token.chars();
    let tag = chars
        .next()
        .ok_or_else(|| FormatError::new(token, "empty growth token"))?;
    let id = chars
        .as_str()
        .parse::<VertexId>()
        .map_err(|e| FormatError::new(token, format!("invalid candidate id: {}", e)))?;
    Ok((tag, id))
}

/// Init round: create the new vertices and choose ambassadors
#[derive(Debug, Clone)]
pub struct GrowthInitRule {
    kind: GraphKind,
    layout: GrowthLayout,
    seed: u64,
}

impl RecordRule for GrowthInitRule {
    fn name(&self) -> &'static str {
        "growth_init"
    }

    fn begin_task(&self, task: &TaskInfo, out: &mut Emitter) -> Result<(), RuleError> {
        for id in self.layout.task_ids(task.index) {
            let vertex: Vertex = Vertex::new(id, Adjacency::empty(self.kind));
            out.send(id, encode_vertex(&vertex));
        }
        Ok(())
    }

    fn transform(&self, task: &TaskInfo, line: &str, out: &mut Emitter) -> Result<(), RuleError> {
        let vertex: Vertex = decode_vertex(line, self.kind)?;
        let token = format!("{}{}", CANDIDATE, vertex.id);
        for new in self.layout.task_ids(task.index) {
            out.send(new, token.as_str());
        }
        out.send(vertex.id, line);
        Ok(())
    }

    fn merge(
        &self,
        task: &TaskInfo,
        key: &RecordKey,
        values: Vec<String>,
        out: &mut MergeOutput,
    ) -> Result<(), RuleError> {
        let id = vertex_key(self.name(), key)?;
        let (record, tokens) = split_record(id, values)?;
        let record = record.ok_or(RuleError::MissingRecord(id))?;
        if tokens.is_empty() {
            out.write(record);
            return Ok(());
        }

        let mut vertex: Vertex = decode_vertex(&record, self.kind)?;
        let mut candidates = BTreeSet::new();
        for token in &tokens {
            match parse_token(token)? {
                (CANDIDATE, candidate) => {
                    candidates.insert(candidate);
                }
                _ => return Err(FormatError::new(token, "expected a candidate token").into()),
            }
        }

        let mut rng = vertex_rng(self.seed, task.round, id);
        let pick = rng.random_range(0..candidates.len());
        if let Some(ambassador) = candidates.into_iter().nth(pick) {
            vertex.adjacency.add_outgoing(ambassador);
            out.increment(AggregateKey::pair(id, ambassador));
        }

        out.write(encode_vertex(&vertex));
        Ok(())
    }
}

/// Growth round: reverse edges for the last ambassadors, then burn one hop
#[derive(Debug, Clone)]
pub struct GrowthStepRule {
    kind: GraphKind,
    layout: GrowthLayout,
    ambassadors: Arc<AmbassadorMap>,
    forward_probability: f64,
    backward_probability: f64,
    seed: u64,
    finalize: bool,
}

impl RecordRule for GrowthStepRule {
    fn name(&self) -> &'static str {
        if self.finalize {
            "growth_finalize"
        } else {
            "growth_step"
        }
    }

    fn transform(&self, _task: &TaskInfo, line: &str, out: &mut Emitter) -> Result<(), RuleError> {
        let mut vertex: Vertex = decode_vertex(line, self.kind)?;

        if let Some(new_vertices) = self.ambassadors.new_vertices_of(vertex.id) {
            for new in new_vertices {
                vertex.adjacency.add_incoming(*new);
            }
        } else if !self.finalize && self.layout.is_existing(vertex.id) {
            for neighbour in vertex.adjacency.neighbours() {
                let Some(new_vertices) = self.ambassadors.new_vertices_of(neighbour) else {
                    continue;
                };
                // forward when the ambassador points at this vertex
                let tag = if vertex.adjacency.predecessors().contains(&neighbour) {
                    FORWARD
                } else {
                    BACKWARD
                };
                let token = format!("{}{}", tag, vertex.id);
                out.broadcast(new_vertices, &token);
            }
        }

        out.send(vertex.id, encode_vertex(&vertex));
        Ok(())
    }

    fn merge(
        &self,
        task: &TaskInfo,
        key: &RecordKey,
        values: Vec<String>,
        out: &mut MergeOutput,
    ) -> Result<(), RuleError> {
        let id = vertex_key(self.name(), key)?;
        let (record, tokens) = split_record(id, values)?;
        let record = record.ok_or(RuleError::MissingRecord(id))?;
        if tokens.is_empty() {
            out.write(record);
            return Ok(());
        }

        let mut vertex: Vertex = decode_vertex(&record, self.kind)?;
        let mut candidates: BTreeMap<VertexId, bool> = BTreeMap::new();
        for token in &tokens {
            match parse_token(token)? {
                (FORWARD, candidate) => {
                    candidates.insert(candidate, true);
                }
                (BACKWARD, candidate) => {
                    candidates.entry(candidate).or_insert(false);
                }
                _ => return Err(FormatError::new(token, "expected a burn token").into()),
            }
        }

        let mut rng = vertex_rng(self.seed, task.round, id);
        for (candidate, forward) in candidates {
            if vertex.adjacency.successors().contains(&candidate) {
                continue;
            }
            let probability = if forward {
                self.forward_probability
            } else {
                self.backward_probability
            };
            if rng.random_bool(probability) {
                vertex.adjacency.add_outgoing(candidate);
                out.increment(AggregateKey::pair(id, candidate));
            }
        }

        out.write(encode_vertex(&vertex));
        Ok(())
    }
}

/// Forest-fire graph growth
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestFire {
    #[serde(default)]
    pub kind: GraphKind,
    /// Largest id in the input graph
    pub max_id: u64,
    /// Number of vertices to add
    pub new_vertices: u64,
    /// Burn probability along an ambassador's out-edges
    pub forward_probability: f64,
    /// Burn probability along an ambassador's in-edges
    pub backward_probability: f64,
    /// Growth rounds after the init round
    pub max_iterations: usize,
    #[serde(default)]
    pub seed: u64,
}

impl ForestFire {
    pub fn new(kind: GraphKind, max_id: u64, new_vertices: u64) -> Self {
        Self {
            kind,
            max_id,
            new_vertices,
            forward_probability: 0.37,
            backward_probability: 0.32,
            max_iterations: 10,
            seed: 0,
        }
    }

    pub fn with_probabilities(mut self, forward: f64, backward: f64) -> Self {
        self.forward_probability = forward;
        self.backward_probability = backward;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn step_rule(
        &self,
        layout: GrowthLayout,
        ambassadors: &Arc<AmbassadorMap>,
        finalize: bool,
    ) -> RoundRule {
        RoundRule::GrowthStep(GrowthStepRule {
            kind: self.kind,
            layout,
            ambassadors: Arc::clone(ambassadors),
            forward_probability: self.forward_probability,
            backward_probability: self.backward_probability,
            seed: self.seed,
            finalize,
        })
    }
}

impl Algorithm for ForestFire {
    type Params = GrowthParams;

    fn name(&self) -> &'static str {
        "forest_fire"
    }

    fn initial_params(&self, plan: &RunPlan) -> Result<GrowthParams, RoundError> {
        for (name, p) in [
            ("forward", self.forward_probability),
            ("backward", self.backward_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(RoundError::config_error(format!(
                    "{} burn probability must be in [0, 1], got {}",
                    name, p
                )));
            }
        }
        let base = self
            .max_id
            .checked_add(1)
            .ok_or_else(|| RoundError::config_error("max id leaves no room for new vertices"))?;
        if base.checked_add(self.new_vertices).is_none() {
            return Err(RoundError::config_error(format!(
                "{} new vertices overflow the id space",
                self.new_vertices
            )));
        }

        Ok(GrowthParams {
            layout: GrowthLayout::new(base, self.new_vertices, plan.task_count),
            phase: GrowthPhase::Init,
        })
    }

    fn rule(&self, params: &GrowthParams) -> RoundRule {
        match &params.phase {
            GrowthPhase::Init => RoundRule::GrowthInit(GrowthInitRule {
                kind: self.kind,
                layout: params.layout,
                seed: self.seed,
            }),
            GrowthPhase::Step(ambassadors) => self.step_rule(params.layout, ambassadors, false),
            GrowthPhase::Finalize(ambassadors) => self.step_rule(params.layout, ambassadors, true),
        }
    }

    fn extract(
        &self,
        round: usize,
        params: &GrowthParams,
        aggregate: &Aggregate,
    ) -> Result<Verdict<GrowthParams>, ConsistencyError> {
        if let GrowthPhase::Finalize(_) = params.phase {
            expect_empty(aggregate)?;
            return Ok(Verdict::Exhausted);
        }

        let ambassadors = AmbassadorMap::from_aggregate(aggregate, &params.layout)?;
        if ambassadors.is_empty() {
            return Ok(Verdict::Converged);
        }

        // round 1 is the init round
        let growth_rounds = round.saturating_sub(1);
        let ambassadors = Arc::new(ambassadors);
        let phase = if growth_rounds >= self.max_iterations {
            GrowthPhase::Finalize(ambassadors)
        } else {
            GrowthPhase::Step(ambassadors)
        };
        Ok(Verdict::Continue(GrowthParams {
            layout: params.layout,
            phase,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rounds::aggregate::{CounterTag, Counters};

    fn aggregate(pairs: &[(u64, u64)]) -> Aggregate {
        let mut counters = Counters::new();
        for (new, ambassador) in pairs {
            counters.increment(AggregateKey::pair(VertexId(*new), VertexId(*ambassador)));
        }
        counters.into()
    }

    #[test]
    fn test_layout_splits_ids() {
        let layout = GrowthLayout::new(10, 5, 2);
        assert_eq!(layout.per_task, 3);
        let first: Vec<_> = layout.task_ids(0).map(VertexId::get).collect();
        let second: Vec<_> = layout.task_ids(1).map(VertexId::get).collect();
        assert_eq!(first, vec![10, 11, 12]);
        assert_eq!(second, vec![13, 14]);
        assert_eq!(layout.task_ids(2).count(), 0);
        assert!(layout.is_new(VertexId(14)));
        assert!(!layout.is_new(VertexId(15)));
        assert!(layout.is_existing(VertexId(9)));
    }

    #[test]
    fn test_layout_more_tasks_than_vertices() {
        let layout = GrowthLayout::new(1, 2, 4);
        assert_eq!(layout.per_task, 1);
        let counts: Vec<_> = (0..4).map(|t| layout.task_ids(t).count()).collect();
        assert_eq!(counts, vec![1, 1, 0, 0]);
    }

    #[test]
    fn test_ambassador_map_validation() {
        let layout = GrowthLayout::new(10, 3, 1);
        let pairs = aggregate(&[(10, 2), (11, 2), (12, 5)]);
        let map = AmbassadorMap::from_aggregate(&pairs, &layout).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.new_vertices_of(VertexId(2)), Some(&[VertexId(10), VertexId(11)][..]));
        assert!(!map.is_ambassador(VertexId(10)));

        // new vertex outside the created range
        assert!(AmbassadorMap::from_aggregate(&aggregate(&[(13, 2)]), &layout).is_err());
        // ambassador is itself a new vertex
        assert!(AmbassadorMap::from_aggregate(&aggregate(&[(10, 11)]), &layout).is_err());

        let mut counters = Counters::new();
        counters.add(AggregateKey::pair(VertexId(10), VertexId(1)), 2);
        assert!(AmbassadorMap::from_aggregate(&counters.into(), &layout).is_err());

        let mut counters = Counters::new();
        counters.increment(CounterTag::Visited);
        assert!(AmbassadorMap::from_aggregate(&counters.into(), &layout).is_err());
    }

    #[test]
    fn test_init_creates_records_and_candidates() {
        let rule = GrowthInitRule {
            kind: GraphKind::Directed,
            layout: GrowthLayout::new(5, 2, 1),
            seed: 1,
        };
        let task = TaskInfo::new(0, 1, 1);
        let mut out = Emitter::new();
        rule.begin_task(&task, &mut out).unwrap();
        rule.transform(&task, "3\t#\t@4", &mut out).unwrap();
        let records = out.into_records();
        assert_eq!(records[0], (RecordKey::Vertex(VertexId(5)), "5\t#\t@".to_string()));
        assert_eq!(records[1], (RecordKey::Vertex(VertexId(6)), "6\t#\t@".to_string()));
        assert_eq!(records[2], (RecordKey::Vertex(VertexId(5)), "A3".to_string()));
        assert_eq!(records[3], (RecordKey::Vertex(VertexId(6)), "A3".to_string()));
        assert_eq!(records[4], (RecordKey::Vertex(VertexId(3)), "3\t#\t@4".to_string()));
    }

    #[test]
    fn test_init_merge_picks_one_candidate() {
        let rule = GrowthInitRule {
            kind: GraphKind::Directed,
            layout: GrowthLayout::new(5, 1, 1),
            seed: 42,
        };
        let task = TaskInfo::new(0, 1, 1);
        let mut out = MergeOutput::new();
        rule.merge(
            &task,
            &RecordKey::Vertex(VertexId(5)),
            vec!["5\t#\t@".into(), "A1".into(), "A2".into(), "A3".into()],
            &mut out,
        )
        .unwrap();
        let (lines, counters) = out.into_parts();
        let vertex: Vertex = decode_vertex(&lines[0], GraphKind::Directed).unwrap();
        let aggregate = Aggregate::from(counters);
        assert_eq!(vertex.adjacency.successors().len(), 1);
        let ambassador = vertex.adjacency.successors()[0];
        assert!((1..=3).contains(&ambassador.get()));
        assert_eq!(aggregate.get(&AggregateKey::pair(VertexId(5), ambassador)), 1);
        assert_eq!(aggregate.len(), 1);
    }

    #[test]
    fn test_step_transform_tags_direction() {
        let mut counters = Counters::new();
        counters.increment(AggregateKey::pair(VertexId(10), VertexId(1)));
        let layout = GrowthLayout::new(10, 1, 1);
        let map = Arc::new(AmbassadorMap::from_aggregate(&counters.into(), &layout).unwrap());
        let algorithm = ForestFire::new(GraphKind::Directed, 9, 1);
        let RoundRule::GrowthStep(rule) = algorithm.step_rule(layout, &map, false) else {
            panic!("expected a step rule");
        };
        let task = TaskInfo::new(0, 1, 2);

        // ambassador adds the reverse edge and sends nothing
        let mut out = Emitter::new();
        rule.transform(&task, "1\t#3\t@2", &mut out).unwrap();
        assert_eq!(
            out.into_records(),
            vec![(RecordKey::Vertex(VertexId(1)), "1\t#3,10\t@2".to_string())]
        );

        // 1 -> 2: forward
        let mut out = Emitter::new();
        rule.transform(&task, "2\t#1\t@", &mut out).unwrap();
        assert_eq!(out.into_records()[0], (RecordKey::Vertex(VertexId(10)), "F2".to_string()));

        // 3 -> 1: backward
        let mut out = Emitter::new();
        rule.transform(&task, "3\t#\t@1", &mut out).unwrap();
        assert_eq!(out.into_records()[0], (RecordKey::Vertex(VertexId(10)), "B3".to_string()));
    }

    #[test]
    fn test_step_merge_burns_with_certainty() {
        let layout = GrowthLayout::new(10, 1, 1);
        let map = Arc::new(AmbassadorMap::default());
        let algorithm = ForestFire::new(GraphKind::Directed, 9, 1).with_probabilities(1.0, 0.0);
        let RoundRule::GrowthStep(rule) = algorithm.step_rule(layout, &map, false) else {
            panic!("expected a step rule");
        };
        let mut out = MergeOutput::new();
        rule.merge(
            &TaskInfo::new(0, 1, 2),
            &RecordKey::Vertex(VertexId(10)),
            vec![
                "10\t#1\t@1".into(),
                "F2".into(),
                "B3".into(),
                "F1".into(),
                "B2".into(),
            ],
            &mut out,
        )
        .unwrap();
        let (lines, counters) = out.into_parts();
        // 1 already linked, 2 forward (p = 1), 3 backward (r = 0)
        assert_eq!(lines, vec!["10\t#1\t@1,2".to_string()]);
        let aggregate = Aggregate::from(counters);
        assert_eq!(aggregate.len(), 1);
        assert_eq!(aggregate.get(&AggregateKey::pair(VertexId(10), VertexId(2))), 1);
    }

    #[test]
    fn test_extract_phases() {
        let algorithm = ForestFire::new(GraphKind::Undirected, 9, 2).with_max_iterations(1);
        let init = algorithm.initial_params(&RunPlan::new(1)).unwrap();

        let verdict = algorithm.extract(1, &init, &aggregate(&[(10, 1), (11, 2)])).unwrap();
        let Verdict::Continue(step) = verdict else {
            panic!("expected another round");
        };
        assert!(matches!(step.phase, GrowthPhase::Step(_)));

        let verdict = algorithm.extract(2, &step, &aggregate(&[(10, 3)])).unwrap();
        let Verdict::Continue(last) = verdict else {
            panic!("expected a finalize round");
        };
        assert!(matches!(last.phase, GrowthPhase::Finalize(_)));
        assert_eq!(
            algorithm.extract(3, &last, &Aggregate::default()).unwrap(),
            Verdict::Exhausted
        );

        assert_eq!(
            algorithm.extract(2, &step, &Aggregate::default()).unwrap(),
            Verdict::Converged
        );
    }

    #[test]
    fn test_invalid_configuration() {
        let plan = RunPlan::new(1);
        let bad = ForestFire::new(GraphKind::Directed, 9, 1).with_probabilities(1.5, 0.1);
        assert!(bad.initial_params(&plan).is_err());
        let overflow = ForestFire::new(GraphKind::Directed, u64::MAX, 1);
        assert!(overflow.initial_params(&plan).is_err());
    }

    #[test]
    fn test_vertex_rng_is_deterministic() {
        let a: u64 = vertex_rng(7, 2, VertexId(3)).random();
        let b: u64 = vertex_rng(7, 2, VertexId(3)).random();
        let c: u64 = vertex_rng(7, 3, VertexId(3)).random();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
