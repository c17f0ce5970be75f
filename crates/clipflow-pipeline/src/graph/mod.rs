//! Branching execution graph.
//!
//! Named nodes connected by direct or conditional edges. The platform
//! branches are not run in parallel: each platform node returns to a single
//! check node, which picks the next platform with pending work until none is
//! left.

pub mod builder;
pub mod decisions;
pub mod nodes;
pub mod types;
pub mod workflow;

pub use builder::{Graph, GraphBuilder, GraphRun, DEFAULT_STEP_LIMIT};
pub use types::{Decision, Edge, GraphObserver, Node, NoopObserver, END};
pub use workflow::{BranchingWorkflow, WorkflowDeps, BRANCHING_SUFFIX};
