//! Barrier-synchronised round runtime
//!
//! Each round is a parallel transform over disjoint slices of the input, a
//! full barrier, a group-by-key merge and the extraction of a small aggregate:
//!
//! ```text
//! driver --(rule, input)--> executor: transform | barrier | merge
//!    ^                                                   |
//!    +------- verdict + next params <-- extract <-- aggregate
//! ```
//!
//! Rounds are strictly sequential and round parameters are immutable values.

pub mod aggregate;
pub mod algorithm;
pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod extract;
pub mod local;
pub mod rule;
pub mod store;

pub use aggregate::{Aggregate, AggregateKey, CounterTag, Counters};
pub use algorithm::{Algorithm, RunPlan, Verdict};
pub use config::RoundConfig;
pub use driver::{CancelToken, DriverPhase, RoundDriver, RoundReport, RunResult};
pub use error::{ConsistencyError, ExecutorError, RoundError, Stage};
pub use executor::{RoundExecutor, RoundOutcome, RoundRequest, RoundStatus};
pub use local::LocalExecutor;
pub use rule::{Emitter, MergeOutput, RecordKey, RecordRule, RoundRule, TaskInfo};
pub use store::{MemoryStore, ObjectLocation, ObjectStore};
