//! Graph algorithms expressed as round rules
//!
//! Each algorithm pairs an [`Algorithm`](crate::rounds::Algorithm) impl that
//! owns parameters and convergence with the [`RecordRule`](crate::rounds::RecordRule)
//! impls its rounds run.

pub mod community;
pub mod components;
pub mod growth;
pub mod search;
pub mod stats;

pub use community::{memberships, CommunityDetection, CommunityRule, Membership};
pub use components::{labels, ComponentRule, ConnectedComponents};
pub use growth::{
    AmbassadorMap, ForestFire, GrowthInitRule, GrowthLayout, GrowthParams, GrowthPhase,
    GrowthStepRule,
};
pub use search::{distances, Distance, Search, SearchRule};
pub use stats::{GraphStats, GraphSummary, StatsComputeRule, StatsGatherRule, StatsPhase};
