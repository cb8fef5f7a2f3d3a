//! Vertex records processed by the round rules
//!
//! A record is one vertex with its adjacency and, optionally, the scalar label
//! an algorithm attaches to it for the duration of a run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Unique identifier of a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VertexId(pub u64);

impl VertexId {
    /// Get the raw id
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for VertexId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VertexId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(VertexId)
    }
}

/// Whether edges carry a direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphKind {
    Directed,
    #[default]
    Undirected,
}

impl GraphKind {
    /// Check if the graph is directed
    pub fn is_directed(&self) -> bool {
        matches!(self, GraphKind::Directed)
    }
}

/// Edges attached to a vertex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Adjacency {
    /// In-edges (`src -> self`) and out-edges (`self -> dst`), stored by the other endpoint
    Directed {
        incoming: Vec<VertexId>,
        outgoing: Vec<VertexId>,
    },
    /// Single edge set
    Undirected { neighbours: Vec<VertexId> },
}

impl Adjacency {
    /// Empty adjacency of the given kind
    pub fn empty(kind: GraphKind) -> Self {
        match kind {
            GraphKind::Directed => Adjacency::Directed {
                incoming: Vec::new(),
                outgoing: Vec::new(),
            },
            GraphKind::Undirected => Adjacency::Undirected {
                neighbours: Vec::new(),
            },
        }
    }

    /// Kind of graph this adjacency belongs to
    pub fn kind(&self) -> GraphKind {
        match self {
            Adjacency::Directed { .. } => GraphKind::Directed,
            Adjacency::Undirected { .. } => GraphKind::Undirected,
        }
    }

    /// Vertices reachable over one edge in the edge direction
    ///
    /// Out-neighbours for directed graphs, all neighbours otherwise.
    pub fn successors(&self) -> &[VertexId] {
        match self {
            Adjacency::Directed { outgoing, .. } => outgoing,
            Adjacency::Undirected { neighbours } => neighbours,
        }
    }

    /// Vertices with an edge pointing at this vertex
    pub fn predecessors(&self) -> &[VertexId] {
        match self {
            Adjacency::Directed { incoming, .. } => incoming,
            Adjacency::Undirected { neighbours } => neighbours,
        }
    }

    /// Distinct neighbours ignoring direction, sorted
    pub fn neighbours(&self) -> BTreeSet<VertexId> {
        match self {
            Adjacency::Directed { incoming, outgoing } => {
                incoming.iter().chain(outgoing.iter()).copied().collect()
            }
            Adjacency::Undirected { neighbours } => neighbours.iter().copied().collect(),
        }
    }

    /// Number of distinct neighbours ignoring direction
    pub fn degree(&self) -> usize {
        self.neighbours().len()
    }

    /// Check if `id` is adjacent ignoring direction
    pub fn is_adjacent(&self, id: VertexId) -> bool {
        match self {
            Adjacency::Directed { incoming, outgoing } => {
                incoming.contains(&id) || outgoing.contains(&id)
            }
            Adjacency::Undirected { neighbours } => neighbours.contains(&id),
        }
    }

    /// Record an edge `from -> self` (plain neighbour for undirected graphs)
    ///
    /// Returns `false` when the edge was already present.
    pub fn add_incoming(&mut self, from: VertexId) -> bool {
        let list = match self {
            Adjacency::Directed { incoming, .. } => incoming,
            Adjacency::Undirected { neighbours } => neighbours,
        };
        push_unique(list, from)
    }

    /// Record an edge `self -> to` (plain neighbour for undirected graphs)
    ///
    /// Returns `false` when the edge was already present.
    pub fn add_outgoing(&mut self, to: VertexId) -> bool {
        let list = match self {
            Adjacency::Directed { outgoing, .. } => outgoing,
            Adjacency::Undirected { neighbours } => neighbours,
        };
        push_unique(list, to)
    }
}

fn push_unique(list: &mut Vec<VertexId>, id: VertexId) -> bool {
    if list.contains(&id) {
        false
    } else {
        list.push(id);
        true
    }
}

/// Scalar label carried in the trailing `$` segment of a record
pub trait VertexValue: Sized + Clone + Send + Sync + 'static {
    /// Text after the `$` sigil
    fn encode_value(&self) -> String;

    /// Parse the text after the `$` sigil
    fn decode_value(text: &str) -> Result<Self, String>;
}

/// Plain records carry no label
impl VertexValue for () {
    fn encode_value(&self) -> String {
        String::new()
    }

    fn decode_value(text: &str) -> Result<Self, String> {
        Err(format!("unexpected label segment ${}", text))
    }
}

/// A vertex record, optionally labelled
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex<V = ()> {
    pub id: VertexId,
    pub adjacency: Adjacency,
    pub value: Option<V>,
}

impl<V> Vertex<V> {
    /// Create an unlabelled vertex
    pub fn new(id: impl Into<VertexId>, adjacency: Adjacency) -> Self {
        Self {
            id: id.into(),
            adjacency,
            value: None,
        }
    }

    /// Create a directed vertex from raw ids
    pub fn directed(id: u64, incoming: &[u64], outgoing: &[u64]) -> Self {
        Self::new(
            id,
            Adjacency::Directed {
                incoming: incoming.iter().copied().map(VertexId).collect(),
                outgoing: outgoing.iter().copied().map(VertexId).collect(),
            },
        )
    }

    /// Create an undirected vertex from raw ids
    pub fn undirected(id: u64, neighbours: &[u64]) -> Self {
        Self::new(
            id,
            Adjacency::Undirected {
                neighbours: neighbours.iter().copied().map(VertexId).collect(),
            },
        )
    }

    /// Attach a label
    pub fn with_value(mut self, value: V) -> Self {
        self.value = Some(value);
        self
    }

    /// Replace the label type, keeping id and adjacency
    pub fn relabel<W>(self, value: Option<W>) -> Vertex<W> {
        Vertex {
            id: self.id,
            adjacency: self.adjacency,
            value,
        }
    }

    /// Kind of graph this record belongs to
    pub fn kind(&self) -> GraphKind {
        self.adjacency.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_id_parse_and_display() {
        let id: VertexId = " 17 ".parse().unwrap();
        assert_eq!(id, VertexId(17));
        assert_eq!(id.to_string(), "17");
        assert!("x".parse::<VertexId>().is_err());
        assert!("-1".parse::<VertexId>().is_err());
    }

    #[test]
    fn test_directed_neighbours_ignore_direction() {
        let v: Vertex = Vertex::directed(1, &[3, 2], &[2, 4]);
        let ns: Vec<_> = v.adjacency.neighbours().into_iter().map(|v| v.0).collect();
        assert_eq!(ns, vec![2, 3, 4]);
        assert_eq!(v.adjacency.degree(), 3);
        assert_eq!(v.adjacency.successors(), &[VertexId(2), VertexId(4)]);
        assert!(v.adjacency.is_adjacent(VertexId(3)));
        assert!(!v.adjacency.is_adjacent(VertexId(1)));
    }

    #[test]
    fn test_add_edges_are_idempotent() {
        let mut adjacency = Adjacency::empty(GraphKind::Directed);
        assert!(adjacency.add_incoming(VertexId(5)));
        assert!(!adjacency.add_incoming(VertexId(5)));
        assert!(adjacency.add_outgoing(VertexId(5)));
        assert_eq!(adjacency.predecessors(), &[VertexId(5)]);
        assert_eq!(adjacency.successors(), &[VertexId(5)]);

        let mut undirected = Adjacency::empty(GraphKind::Undirected);
        undirected.add_incoming(VertexId(1));
        assert!(!undirected.add_outgoing(VertexId(1)));
        assert_eq!(undirected.degree(), 1);
    }

    #[test]
    fn test_unit_value_rejects_labels() {
        assert!(<() as VertexValue>::decode_value("3").is_err());
    }

    #[test]
    fn test_graph_kind_serialization() {
        let json = serde_json::to_string(&GraphKind::Directed).unwrap();
        assert_eq!(json, "\"directed\"");
        let kind: GraphKind = serde_json::from_str("\"undirected\"").unwrap();
        assert!(!kind.is_directed());
    }
}
