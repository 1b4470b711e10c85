// src/config/validate.rs

use globset::Glob;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, StageKind};
use crate::errors::{PipelineError, Result};

/// Run basic semantic validation against a loaded configuration.
///
/// This checks:
/// - there is at least one stage
/// - every stage has at least one input glob
/// - `exec` stages have a `command`; other kinds must not
/// - all `after` dependencies refer to existing stages
/// - the stage graph has no cycles
/// - all glob patterns compile
///
/// Everything reported here is a [`PipelineError::Config`]: fatal at startup.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    ensure_has_stages(cfg)?;
    validate_stage_fields(cfg)?;
    validate_stage_dependencies(cfg)?;
    validate_dag(cfg)?;
    validate_globs(cfg)?;
    Ok(())
}

fn config_err(msg: impl Into<String>) -> PipelineError {
    PipelineError::Config(msg.into())
}

fn ensure_has_stages(cfg: &ConfigFile) -> Result<()> {
    if cfg.stage.is_empty() {
        return Err(config_err(
            "config must contain at least one [stage.<name>] section",
        ));
    }
    Ok(())
}

fn validate_stage_fields(cfg: &ConfigFile) -> Result<()> {
    for (name, stage) in cfg.stage.iter() {
        if stage.input.is_empty() {
            return Err(config_err(format!("stage '{}' has no input globs", name)));
        }

        match stage.kind {
            StageKind::Exec => {
                if stage.command.is_none() {
                    return Err(config_err(format!(
                        "stage '{}' has kind = \"exec\" but no `command`",
                        name
                    )));
                }
            }
            StageKind::Copy | StageKind::Concat => {
                if stage.command.is_some() {
                    return Err(config_err(format!(
                        "stage '{}' sets `command` but is not kind = \"exec\"",
                        name
                    )));
                }
            }
        }

        if stage.kind == StageKind::Concat && stage.dest.is_empty() {
            return Err(config_err(format!(
                "stage '{}' has kind = \"concat\" but no `dest` output file",
                name
            )));
        }
    }
    Ok(())
}

fn validate_stage_dependencies(cfg: &ConfigFile) -> Result<()> {
    for (name, stage) in cfg.stage.iter() {
        for dep in stage.after.iter() {
            if !cfg.stage.contains_key(dep) {
                return Err(config_err(format!(
                    "stage '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(config_err(format!(
                    "stage '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &ConfigFile) -> Result<()> {
    // Edge direction: dep -> stage, so for
    //   [stage.css]
    //   after = ["clean_css"]
    // we add edge clean_css -> css.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.stage.keys() {
        graph.add_node(name.as_str());
    }

    for (name, stage) in cfg.stage.iter() {
        for dep in stage.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(config_err(format!(
                "cycle detected in stage DAG involving stage '{}'",
                node
            )))
        }
    }
}

fn validate_globs(cfg: &ConfigFile) -> Result<()> {
    for (name, stage) in cfg.stage.iter() {
        let all = stage
            .input
            .iter()
            .chain(stage.exclude.iter())
            .chain(stage.watch.iter().flatten());
        for pat in all {
            Glob::new(pat).map_err(|e| {
                config_err(format!("invalid glob '{}' in stage '{}': {}", pat, name, e))
            })?;
        }
    }
    Ok(())
}
