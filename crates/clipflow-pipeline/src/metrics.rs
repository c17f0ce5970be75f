//! Prometheus metrics for pipeline runs.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::{PipelineError, PipelineResult};

/// Install the Prometheus recorder.
/// Returns a handle that renders the current snapshot.
pub fn init_metrics() -> PipelineResult<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| PipelineError::config_error(format!("Failed to install Prometheus recorder: {}", e)))
}

/// Metric names as constants for consistency.
pub mod names {
    // Linear executor
    pub const STAGES_EXECUTED_TOTAL: &str = "clipflow_stages_executed_total";
    pub const STAGE_FAILURES_TOTAL: &str = "clipflow_stage_failures_total";
    pub const STAGE_DURATION_SECONDS: &str = "clipflow_stage_duration_seconds";

    // Graph executor
    pub const GRAPH_NODE_VISITS_TOTAL: &str = "clipflow_graph_node_visits_total";

    // Recorded by the checkpoint crate
    pub use clipflow_checkpoint::{CHECKPOINT_CORRUPT_TOTAL, CHECKPOINT_SAVES_TOTAL};
}

/// Record one stage execution.
pub fn record_stage(stage: &str, duration_secs: f64, succeeded: bool) {
    let labels = [("stage", stage.to_string())];
    counter!(names::STAGES_EXECUTED_TOTAL, &labels).increment(1);
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
    if !succeeded {
        counter!(names::STAGE_FAILURES_TOTAL, &labels).increment(1);
    }
}

/// Record a graph node visit.
pub fn record_node_visit(node: &str) {
    let labels = [("node", node.to_string())];
    counter!(names::GRAPH_NODE_VISITS_TOTAL, &labels).increment(1);
}
