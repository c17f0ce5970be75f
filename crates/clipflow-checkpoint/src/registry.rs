//! Stage registry.
//!
//! Maps stage indices to display names and descriptions. A registry is built
//! once per pipeline configuration and merged into each checkpoint it touches;
//! there is no process-wide registry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CheckpointError, CheckpointResult};

/// Display information for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StageInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Stage index to name/description mapping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StageRegistry {
    stages: BTreeMap<usize, StageInfo>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `(index, name, description)` descriptors.
    ///
    /// Fails when the same index is registered twice under different names.
    pub fn from_descriptors<I, N, D>(descriptors: I) -> CheckpointResult<Self>
    where
        I: IntoIterator<Item = (usize, N, D)>,
        N: Into<String>,
        D: Into<String>,
    {
        let mut registry = Self::new();
        for (index, name, description) in descriptors {
            let name = name.into();
            if let Some(existing) = registry.stages.get(&index) {
                if existing.name != name {
                    return Err(CheckpointError::invalid_stage(format!(
                        "index {} registered as both '{}' and '{}'",
                        index, existing.name, name
                    )));
                }
                continue;
            }
            registry.stages.insert(
                index,
                StageInfo {
                    name,
                    description: description.into(),
                },
            );
        }
        Ok(registry)
    }

    /// Add a stage (builder style); a later call for the same index wins.
    pub fn with_stage(
        mut self,
        index: usize,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.stages.insert(
            index,
            StageInfo {
                name: name.into(),
                description: description.into(),
            },
        );
        self
    }

    pub fn get(&self, index: usize) -> Option<&StageInfo> {
        self.stages.get(&index)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&usize, &StageInfo)> {
        self.stages.iter()
    }

    /// Merge into a persisted name map. Returns whether anything changed.
    pub(crate) fn merge_into(&self, names: &mut BTreeMap<usize, StageInfo>) -> bool {
        let mut changed = false;
        for (index, info) in &self.stages {
            if names.get(index) != Some(info) {
                names.insert(*index, info.clone());
                changed = true;
            }
        }
        changed
    }
}
