//! Line-oriented record codec
//!
//! Pure, stateless encoders and decoders for the records exchanged between
//! rounds. Every decoder fails with a [`FormatError`](crate::error::FormatError)
//! instead of skipping bad input.

pub mod adjacency;
pub mod edges;
pub mod neighbourhood;

pub use adjacency::{decode_vertex, encode_vertex, is_record};
pub use edges::{adjacency_from_edges, adjacency_from_vertices};
pub use neighbourhood::{NeighbourEdges, Neighbourhood};
