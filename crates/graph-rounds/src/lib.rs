//! graph-rounds: barrier-synchronised graph analytics
//!
//! Algorithms are decomposed into rounds over line-oriented vertex records:
//! - Round Driver: sequences rounds, carries parameters, detects convergence
//! - Round Executor: parallel transform, barrier, group-by-key merge
//! - Record Codec: adjacency and neighbourhood line formats
//! - Algorithms: search, components, communities, forest-fire growth, statistics
//!
//! # Running an algorithm
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use graph_rounds::{ConnectedComponents, GraphKind, LocalExecutor, ObjectLocation, RoundConfig, RoundDriver};
//!
//! let config = RoundConfig::default().with_parallelism(4);
//! let executor = Arc::new(LocalExecutor::in_memory(&config));
//! let input = ObjectLocation::new("graph");
//! executor.store().put(&input, records).await?;
//!
//! let driver = RoundDriver::new(executor.clone(), config);
//! let result = driver
//!     .run_iteration(&ConnectedComponents::new(GraphKind::Undirected), input)
//!     .await?;
//! let labels = executor.store().get(&result.output).await?;
//! ```

pub mod algorithms;
pub mod codec;
pub mod error;
pub mod graph;
pub mod rounds;

// Re-exports for convenience
pub use error::{FormatError, RuleError, StoreError};
pub use graph::{Adjacency, GraphKind, Vertex, VertexId, VertexValue};
pub use codec::{
    adjacency_from_edges, adjacency_from_vertices, decode_vertex, encode_vertex, NeighbourEdges,
    Neighbourhood,
};
pub use rounds::{
    Aggregate, AggregateKey, Algorithm, CancelToken, ConsistencyError, CounterTag, ExecutorError,
    LocalExecutor, MemoryStore, ObjectLocation, ObjectStore, RoundConfig, RoundDriver,
    RoundError, RoundExecutor, RoundOutcome, RoundReport, RoundRequest, RoundRule, RoundStatus,
    RunPlan, RunResult, Verdict,
};

// Algorithm exports
pub use algorithms::{
    CommunityDetection, ConnectedComponents, Distance, ForestFire, GraphStats, GraphSummary,
    Membership, Search,
};
