//! Resumable pipeline execution for video segment distribution.
//!
//! This crate provides:
//! - [`LinearPipeline`]: ordered stages with checkpointed resume and reset
//! - [`graph`]: a branching node graph with conditional edges and a
//!   convergence point that drains per-platform work
//! - The default stages, workflow nodes and their collaborator traits
//! - Configuration, structured run logging and metrics for the `clipflow` binary

pub mod agents;
pub mod config;
pub mod error;
pub mod executor;
pub mod graph;
pub mod logging;
pub mod metrics;
pub mod payload;
pub mod report;
pub mod stages;
pub mod state;

pub use config::{AnalyzerKind, PipelineConfig};
pub use error::{GraphError, GraphResult, PipelineError, PipelineResult};
pub use executor::{LinearPipeline, PipelineOutcome, RunOptions};
pub use graph::{BranchingWorkflow, Graph, GraphBuilder, GraphRun, WorkflowDeps};
pub use logging::RunLogger;
pub use payload::StagePayload;
pub use stages::{default_stages, StageContext, StageHandler};
pub use state::{Analysis, PipelineState, WorkflowState};
