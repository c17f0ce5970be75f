//! Decision functions of the branching workflow.
//!
//! All of them are pure: they only look at the state the previous node
//! produced.

use std::sync::Arc;

use clipflow_models::Platform;

use crate::state::WorkflowState;

use super::nodes::{AGGREGATE_RESULTS, ROUTE_TO_PLATFORMS};
use super::types::{Decision, END};

/// Continue to `next` unless the previous node failed.
pub fn continue_or_end(next: &'static str) -> Arc<dyn Decision> {
    Arc::new(move |state: &WorkflowState| {
        (if state.has_error() { END } else { next }).to_string()
    })
}

/// After selection: nothing selected means there is nothing to route.
pub fn after_selection(state: &WorkflowState) -> String {
    if state.has_error() || state.selected.is_empty() {
        END.to_string()
    } else {
        ROUTE_TO_PLATFORMS.to_string()
    }
}

/// First platform in `priority` that still has items waiting for formatting,
/// or aggregation when none is left or an error is set.
pub fn next_platform(state: &WorkflowState, priority: &[Platform]) -> String {
    if state.has_error() {
        return AGGREGATE_RESULTS.to_string();
    }
    priority
        .iter()
        .find(|p| state.platform_content.has_pending(**p))
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| AGGREGATE_RESULTS.to_string())
}

/// [`next_platform`] bound to a fixed priority order.
pub fn check_formatting(priority: Vec<Platform>) -> Arc<dyn Decision> {
    Arc::new(move |state: &WorkflowState| next_platform(state, &priority))
}
