// src/dag/graph.rs

use std::collections::BTreeMap;

use crate::config::model::ConfigFile;

/// Adjacency view of the stage DAG, keyed by stage name.
///
/// Acyclicity and reference validity are enforced by `config::validate`
/// before this is ever built, so lookups here never need to fail; an unknown
/// name just yields an empty slice.
///
/// Both directions are materialized up front because the scheduler walks
/// dependents on every trigger and dependencies on every readiness check.
#[derive(Debug, Clone)]
pub struct StageGraph {
    deps: BTreeMap<String, Vec<String>>,
    dependents: BTreeMap<String, Vec<String>>,
}

impl StageGraph {
    /// Build the adjacency maps from a validated [`ConfigFile`].
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let mut deps: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut dependents: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (name, stage) in cfg.stage.iter() {
            deps.insert(name.clone(), stage.after.clone());
            dependents.entry(name.clone()).or_default();
            for dep in &stage.after {
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .push(name.clone());
            }
        }

        Self { deps, dependents }
    }

    /// Immediate dependencies of a stage (the stages listed in its `after`).
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.deps.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Immediate dependents of a stage (stages that list this one in their
    /// `after`).
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.dependents.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Stages with no dependencies, in name order; seeding these triggers a
    /// full run.
    pub fn roots(&self) -> Vec<String> {
        self.deps
            .iter()
            .filter(|(_, after)| after.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }
}
