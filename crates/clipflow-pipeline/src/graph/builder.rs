//! Graph construction and execution.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::metrics;
use crate::state::WorkflowState;

use super::types::{Decision, Edge, GraphObserver, Node, NoopObserver, END};

/// Node visits allowed before a run is considered stuck.
pub const DEFAULT_STEP_LIMIT: usize = 64;

/// Result of one graph invocation.
#[derive(Debug, Clone)]
pub struct GraphRun {
    pub state: WorkflowState,
    /// Every visited node, in order
    pub path: Vec<String>,
}

impl GraphRun {
    /// How many times `node` ran.
    pub fn visits(&self, node: &str) -> usize {
        self.path.iter().filter(|n| *n == node).count()
    }
}

#[derive(Default)]
pub struct GraphBuilder {
    nodes: HashMap<String, Arc<dyn Node>>,
    edges: HashMap<String, Edge>,
    entry: Option<String>,
    step_limit: Option<usize>,
    duplicates: Vec<String>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(mut self, name: impl Into<String>, node: Arc<dyn Node>) -> Self {
        let name = name.into();
        if self.nodes.insert(name.clone(), node).is_some() {
            self.duplicates.push(name);
        }
        self
    }

    /// Unconditional edge. A node has exactly one outgoing edge; the last one set wins.
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.insert(from.into(), Edge::Direct(to.into()));
        self
    }

    pub fn add_conditional_edges(mut self, from: impl Into<String>, decision: Arc<dyn Decision>) -> Self {
        self.edges.insert(from.into(), Edge::Conditional(decision));
        self
    }

    pub fn set_entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    pub fn step_limit(mut self, limit: usize) -> Self {
        self.step_limit = Some(limit);
        self
    }

    /// Validate and freeze the graph.
    ///
    /// Targets of conditional edges are only known at run time and are
    /// checked when taken.
    pub fn build(self) -> GraphResult<Graph> {
        if let Some(name) = self.duplicates.into_iter().next() {
            return Err(GraphError::DuplicateNode(name));
        }

        let entry = self.entry.ok_or(GraphError::MissingEntry)?;
        if !self.nodes.contains_key(&entry) {
            return Err(GraphError::UnknownNode(entry));
        }

        for (from, edge) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(GraphError::UnknownNode(from.clone()));
            }
            if let Edge::Direct(to) = edge {
                if to != END && !self.nodes.contains_key(to) {
                    return Err(GraphError::UnknownNode(to.clone()));
                }
            }
        }

        if let Some(dangling) = self.nodes.keys().find(|n| !self.edges.contains_key(*n)) {
            return Err(GraphError::NoRoute(dangling.clone()));
        }

        Ok(Graph {
            nodes: self.nodes,
            edges: self.edges,
            entry,
            step_limit: self.step_limit.unwrap_or(DEFAULT_STEP_LIMIT),
        })
    }
}

/// An immutable, validated graph.
pub struct Graph {
    nodes: HashMap<String, Arc<dyn Node>>,
    edges: HashMap<String, Edge>,
    entry: String,
    step_limit: usize,
}

impl Graph {
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub async fn invoke(&self, state: WorkflowState) -> GraphResult<GraphRun> {
        self.invoke_observed(state, &mut NoopObserver).await
    }

    /// Run from the entry node until a decision or edge yields [`END`].
    pub async fn invoke_observed(
        &self,
        mut state: WorkflowState,
        observer: &mut dyn GraphObserver,
    ) -> GraphResult<GraphRun> {
        let mut path = Vec::new();
        let mut current = self.entry.clone();

        while current != END {
            if path.len() >= self.step_limit {
                return Err(GraphError::StepLimitExceeded(self.step_limit));
            }
            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| GraphError::UnknownNode(current.clone()))?;

            debug!(node = %current, subject = %state.subject, "Entering node");
            metrics::record_node_visit(&current);
            state = node.run(state).await;
            path.push(current.clone());
            observer.on_node_complete(&current, &state).await?;

            let next = match self.edges.get(&current) {
                Some(Edge::Direct(to)) => to.clone(),
                Some(Edge::Conditional(decision)) => decision.next(&state),
                None => return Err(GraphError::NoRoute(current)),
            };
            if next != END && !self.nodes.contains_key(&next) {
                return Err(GraphError::UnknownNode(next));
            }
            debug!(from = %current, to = %next, "Transition");
            current = next;
        }

        Ok(GraphRun { state, path })
    }
}
