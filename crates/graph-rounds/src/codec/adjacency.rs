//! Adjacency record codec
//!
//! ```text
//! directed:    id<TAB>#in1,in2<TAB>@out1,out2[<TAB>$label]
//! undirected:  id<TAB>n1,n2[<TAB>$label]
//! ```

use crate::error::FormatError;
use crate::graph::{Adjacency, GraphKind, Vertex, VertexId, VertexValue};

pub(crate) const IN_SIGIL: char = '#';
pub(crate) const OUT_SIGIL: char = '@';
pub(crate) const VALUE_SIGIL: char = '$';

/// Encode a vertex record as one line
pub fn encode_vertex<V: VertexValue>(vertex: &Vertex<V>) -> String {
    let mut line = vertex.id.to_string();
    match &vertex.adjacency {
        Adjacency::Directed { incoming, outgoing } => {
            line.push('\t');
            line.push(IN_SIGIL);
            line.push_str(&join_ids(incoming));
            line.push('\t');
            line.push(OUT_SIGIL);
            line.push_str(&join_ids(outgoing));
        }
        Adjacency::Undirected { neighbours } => {
            line.push('\t');
            line.push_str(&join_ids(neighbours));
        }
    }
    if let Some(value) = &vertex.value {
        line.push('\t');
        line.push(VALUE_SIGIL);
        line.push_str(&value.encode_value());
    }
    line
}

/// Decode one line into a vertex record of the given kind
pub fn decode_vertex<V: VertexValue>(line: &str, kind: GraphKind) -> Result<Vertex<V>, FormatError> {
    let segments: Vec<&str> = line.split('\t').collect();
    let (adjacency, value_segment) = match kind {
        GraphKind::Directed => {
            if !(3..=4).contains(&segments.len()) {
                return Err(FormatError::arity(line, "3 or 4", segments.len()));
            }
            let incoming = segments[1]
                .trim()
                .strip_prefix(IN_SIGIL)
                .ok_or_else(|| FormatError::new(line, "in-edge segment must start with '#'"))?;
            let outgoing = segments[2]
                .trim()
                .strip_prefix(OUT_SIGIL)
                .ok_or_else(|| FormatError::new(line, "out-edge segment must start with '@'"))?;
            (
                Adjacency::Directed {
                    incoming: parse_ids(line, incoming)?,
                    outgoing: parse_ids(line, outgoing)?,
                },
                segments.get(3),
            )
        }
        GraphKind::Undirected => {
            if !(2..=3).contains(&segments.len()) {
                return Err(FormatError::arity(line, "2 or 3", segments.len()));
            }
            (
                Adjacency::Undirected {
                    neighbours: parse_ids(line, segments[1])?,
                },
                segments.get(2),
            )
        }
    };

    let id = parse_id(line, segments[0])?;
    let value = match value_segment {
        Some(segment) => {
            let text = segment
                .strip_prefix(VALUE_SIGIL)
                .ok_or_else(|| FormatError::new(line, "label segment must start with '$'"))?;
            Some(V::decode_value(text).map_err(|reason| FormatError::new(line, reason))?)
        }
        None => None,
    };

    Ok(Vertex {
        id,
        adjacency,
        value,
    })
}

/// Check whether a shuffled value is an adjacency record rather than a token
///
/// Records always contain a tab; tokens never do.
pub fn is_record(text: &str) -> bool {
    text.contains('\t')
}

pub(crate) fn join_ids(ids: &[VertexId]) -> String {
    let mut out = String::with_capacity(ids.len() * 4);
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&id.to_string());
    }
    out
}

pub(crate) fn parse_id(line: &str, text: &str) -> Result<VertexId, FormatError> {
    text.parse::<VertexId>()
        .map_err(|e| FormatError::new(line, format!("invalid vertex id {:?}: {}", text.trim(), e)))
}

pub(crate) fn parse_ids(line: &str, text: &str) -> Result<Vec<VertexId>, FormatError> {
    text.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| parse_id(line, token))
        .collect()
}
