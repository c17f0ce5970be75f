//! Graph building blocks.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::error::GraphResult;
use crate::state::WorkflowState;

/// Terminal target name.
pub const END: &str = "__end__";

/// A unit of work. Receives the state by value and hands it back.
///
/// Node failures are written to `state.error`; a node never aborts the graph.
#[async_trait]
pub trait Node: Send + Sync {
    async fn run(&self, state: WorkflowState) -> WorkflowState;
}

/// Picks the next node from the state a node just produced.
pub trait Decision: Send + Sync {
    fn next(&self, state: &WorkflowState) -> String;
}

impl<F> Decision for F
where
    F: Fn(&WorkflowState) -> String + Send + Sync,
{
    fn next(&self, state: &WorkflowState) -> String {
        self(state)
    }
}

/// Outgoing edge of a node.
#[derive(Clone)]
pub enum Edge {
    Direct(String),
    Conditional(Arc<dyn Decision>),
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Direct(target) => write!(f, "Direct({})", target),
            Edge::Conditional(_) => write!(f, "Conditional"),
        }
    }
}

/// Called after every node with the state it returned.
#[async_trait]
pub trait GraphObserver: Send {
    async fn on_node_complete(&mut self, node: &str, state: &WorkflowState) -> GraphResult<()>;
}

/// Observer that does nothing.
#[derive(Debug, Default)]
pub struct NoopObserver;

#[async_trait]
impl GraphObserver for NoopObserver {
    async fn on_node_complete(&mut self, _node: &str, _state: &WorkflowState) -> GraphResult<()> {
        Ok(())
    }
}
