// src/config/loader.rs

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::model::ConfigFile;
use crate::config::validate::validate_config;

/// Name of the config file looked up in the working directory when `--config`
/// is not given.
pub const DEFAULT_CONFIG_NAME: &str = "Assetpipe.toml";

/// Deserialize a config file without semantic validation.
///
/// Use [`load_and_validate`] unless you specifically want to inspect a broken
/// config (e.g. for diagnostics).
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading config file at {:?}", path))?;
    toml::from_str(&contents).with_context(|| format!("parsing TOML config from {:?}", path))
}

/// Load a config file and check its semantic invariants: stage fields per
/// kind, `after` references, DAG acyclicity, glob validity. This is the entry
/// point every subcommand goes through.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let config = load_from_path(&path)?;
    validate_config(&config)?;
    Ok(config)
}
