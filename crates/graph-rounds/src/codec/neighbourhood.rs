//! Neighbourhood record codec
//!
//! A neighbourhood is a central vertex together with the out-edge list of each
//! of its neighbours:
//!
//! ```text
//! 2	#1	@3,4|1@2,3|3@|4@
//! ```

use std::collections::BTreeSet;

use super::adjacency::{decode_vertex, encode_vertex, join_ids, parse_id, parse_ids};
use crate::error::FormatError;
use crate::graph::{GraphKind, Vertex, VertexId};

const SEGMENT_SEPARATOR: char = '|';
const OUT_LIST_SEPARATOR: char = '@';

/// A neighbour of the central vertex and that neighbour's out-edges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighbourEdges {
    pub id: VertexId,
    pub outgoing: Vec<VertexId>,
}

impl NeighbourEdges {
    pub fn new(id: VertexId, outgoing: Vec<VertexId>) -> Self {
        Self { id, outgoing }
    }

    /// Encode as `id@out1,out2`
    pub fn encode(&self) -> String {
        format!("{}{}{}", self.id, OUT_LIST_SEPARATOR, join_ids(&self.outgoing))
    }

    /// Decode `id@out1,out2`
    pub fn decode(text: &str) -> Result<Self, FormatError> {
        let mut parts = text.split(OUT_LIST_SEPARATOR);
        let (Some(id), Some(outgoing), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(FormatError::new(text, "neighbour segment must be id@out-list"));
        };
        Ok(Self {
            id: parse_id(text, id)?,
            outgoing: parse_ids(text, outgoing)?,
        })
    }
}

/// Central vertex plus its neighbours' out-edge lists
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbourhood {
    pub central: Vertex,
    pub neighbours: Vec<NeighbourEdges>,
}

impl Neighbourhood {
    /// Encode as `central|n1@..|n2@..`
    pub fn encode(&self) -> String {
        let mut line = encode_vertex(&self.central);
        for neighbour in &self.neighbours {
            line.push(SEGMENT_SEPARATOR);
            line.push_str(&neighbour.encode());
        }
        line
    }

    /// Decode a neighbourhood line
    ///
    /// Each neighbour segment must name a distinct neighbour of the central
    /// vertex, so there can never be more segments than neighbours.
    pub fn decode(line: &str, kind: GraphKind) -> Result<Self, FormatError> {
        let mut segments = line.split(SEGMENT_SEPARATOR);
        let central_text = segments
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FormatError::new(line, "missing central vertex"))?;
        let central: Vertex = decode_vertex(central_text, kind)?;

        let expected = central.adjacency.neighbours();
        let mut seen = BTreeSet::new();
        let mut neighbours = Vec::new();
        for segment in segments {
            let neighbour = NeighbourEdges::decode(segment)?;
            if !expected.contains(&neighbour.id) {
                return Err(FormatError::new(
                    line,
                    format!("{} is not a neighbour of {}", neighbour.id, central.id),
                ));
            }
            if !seen.insert(neighbour.id) {
                return Err(FormatError::new(
                    line,
                    format!("neighbour {} listed twice", neighbour.id),
                ));
            }
            neighbours.push(neighbour);
        }

        Ok(Self {
            central,
            neighbours,
        })
    }

    /// Local clustering coefficient of the central vertex
    ///
    /// Ordered links between distinct neighbours divided by `k * (k - 1)`.
    /// Undirected links appear in both neighbours' lists and are counted twice,
    /// which matches the `k * (k - 1)` denominator.
    pub fn clustering_coefficient(&self) -> f64 {
        let members = self.central.adjacency.neighbours();
        let k = members.len();
        if k < 2 {
            return 0.0;
        }
        let links: usize = self
            .neighbours
            .iter()
            .map(|n| {
                n.outgoing
                    .iter()
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .filter(|dst| **dst != n.id && members.contains(dst))
                    .count()
            })
            .sum();
        links as f64 / (k * (k - 1)) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Neighbourhood {
        Neighbourhood {
            central: Vertex::directed(2, &[1], &[3, 4]),
            neighbours: vec![
                NeighbourEdges::new(VertexId(1), vec![VertexId(2), VertexId(3)]),
                NeighbourEdges::new(VertexId(3), vec![]),
                NeighbourEdges::new(VertexId(4), vec![]),
            ],
        }
    }

    #[test]
    fn test_encode_matches_wire_format() {
        assert_eq!(sample().encode(), "2\t#1\t@3,4|1@2,3|3@|4@");
    }

    #[test]
    fn test_roundtrip() {
        let n = sample();
        assert_eq!(Neighbourhood::decode(&n.encode(), GraphKind::Directed).unwrap(), n);

        let undirected = Neighbourhood {
            central: Vertex::undirected(1, &[2]),
            neighbours: vec![NeighbourEdges::new(VertexId(2), vec![VertexId(1)])],
        };
        assert_eq!(
            Neighbourhood::decode(&undirected.encode(), GraphKind::Undirected).unwrap(),
            undirected
        );
    }

    #[test]
    fn test_isolated_central_vertex() {
        let n = Neighbourhood {
            central: Vertex::undirected(8, &[]),
            neighbours: vec![],
        };
        assert_eq!(n.encode(), "8\t");
        assert_eq!(Neighbourhood::decode("8\t", GraphKind::Undirected).unwrap(), n);
    }

    #[test]
    fn test_decode_rejects_bad_segments() {
        // missing '@'
        assert!(Neighbourhood::decode("2\t1|1", GraphKind::Undirected).is_err());
        // two '@'
        assert!(Neighbourhood::decode("2\t1|1@2@3", GraphKind::Undirected).is_err());
        // not a neighbour
        assert!(Neighbourhood::decode("2\t1|5@", GraphKind::Undirected).is_err());
        // listed twice
        assert!(Neighbourhood::decode("2\t1|1@|1@", GraphKind::Undirected).is_err());
        // empty central
        assert!(Neighbourhood::decode("|1@", GraphKind::Undirected).is_err());
    }

    #[test]
    fn test_clustering_coefficient_triangle() {
        let n = Neighbourhood {
            central: Vertex::undirected(1, &[2, 3]),
            neighbours: vec![
                NeighbourEdges::new(VertexId(2), vec![VertexId(1), VertexId(3)]),
                NeighbourEdges::new(VertexId(3), vec![VertexId(1), VertexId(2)]),
            ],
        };
        assert!((n.clustering_coefficient() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_clustering_coefficient_directed() {
        // neighbours {1, 3, 4}; links 1->3 only
        assert!((sample().clustering_coefficient() - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_clustering_coefficient_low_degree() {
        let n = Neighbourhood {
            central: Vertex::undirected(1, &[2]),
            neighbours: vec![NeighbourEdges::new(VertexId(2), vec![VertexId(1)])],
        };
        assert_eq!(n.clustering_coefficient(), 0.0);
    }
}
