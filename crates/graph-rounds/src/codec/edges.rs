//! Edge list and vertex list to adjacency conversion
//!
//! Graphs usually arrive as `src dst` edge lines or as `id n1 n2 ...` vertex
//! lines. The round rules work on one adjacency record per vertex, so inputs
//! are converted once before the first round.

use std::collections::{BTreeMap, BTreeSet};

use super::adjacency::parse_id;
use crate::error::FormatError;
use crate::graph::{Adjacency, GraphKind, Vertex, VertexId};

/// Build adjacency records from whitespace-separated `src dst` lines
///
/// Blank lines and lines starting with `#` or `%` are skipped. Duplicate edges
/// collapse and self-loops are dropped. Every endpoint gets a record, and the
/// records come back sorted by id.
pub fn adjacency_from_edges<'a>(
    lines: impl IntoIterator<Item = &'a str>,
    kind: GraphKind,
) -> Result<Vec<Vertex>, FormatError> {
    let mut builder = AdjacencyBuilder::default();

    for line in data_lines(lines) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != 2 {
            return Err(FormatError::arity(line, "2", tokens.len()));
        }
        let src = parse_id(line, tokens[0])?;
        let dst = parse_id(line, tokens[1])?;
        builder.add_edge(src, dst);
    }

    Ok(builder.build(kind))
}

/// Build adjacency records from whitespace-separated `id n1 n2 ...` lines
///
/// For directed graphs the listed ids are out-neighbours and in-edges are
/// derived. For undirected graphs the lists are symmetrised, so an edge listed
/// on only one side still reaches both endpoints. A vertex may appear on more
/// than one line; its lists are unioned. Comments, duplicates and self-loops
/// are handled as in [`adjacency_from_edges`].
pub fn adjacency_from_vertices<'a>(
    lines: impl IntoIterator<Item = &'a str>,
    kind: GraphKind,
) -> Result<Vec<Vertex>, FormatError> {
    let mut builder = AdjacencyBuilder::default();

    for line in data_lines(lines) {
        let mut tokens = line.split_whitespace();
        let Some(head) = tokens.next() else {
            continue;
        };
        let id = parse_id(line, head)?;
        builder.add_vertex(id);
        for token in tokens {
            builder.add_edge(id, parse_id(line, token)?);
        }
    }

    Ok(builder.build(kind))
}

fn data_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> impl Iterator<Item = &'a str> {
    lines.into_iter().filter(|line| {
        let trimmed = line.trim();
        !(trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('%'))
    })
}

/// Sorted, deduplicated in/out sets per vertex
#[derive(Default)]
struct AdjacencyBuilder {
    vertices: BTreeMap<VertexId, (BTreeSet<VertexId>, BTreeSet<VertexId>)>,
}

impl AdjacencyBuilder {
    fn add_vertex(&mut self, id: VertexId) -> &mut (BTreeSet<VertexId>, BTreeSet<VertexId>) {
        self.vertices.entry(id).or_default()
    }

    fn add_edge(&mut self, src: VertexId, dst: VertexId) {
        self.add_vertex(src);
        self.add_vertex(dst);
        if src == dst {
            return;
        }
        self.add_vertex(src).1.insert(dst);
        self.add_vertex(dst).0.insert(src);
    }

    fn build(self, kind: GraphKind) -> Vec<Vertex> {
        self.vertices
            .into_iter()
            .map(|(id, (incoming, outgoing))| {
                let adjacency = match kind {
                    GraphKind::Directed => Adjacency::Directed {
                        incoming: incoming.into_iter().collect(),
                        outgoing: outgoing.into_iter().collect(),
                    },
                    GraphKind::Undirected => Adjacency::Undirected {
                        neighbours: incoming.union(&outgoing).copied().collect(),
                    },
                };
                Vertex::new(id, adjacency)
            })
            .collect()
    }
}
