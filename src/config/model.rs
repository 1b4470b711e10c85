// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [project]
/// source_dir = "src"
/// out_dir = "public"
/// port = 3500
///
/// [stage.fonts]
/// kind = "copy"
/// input = ["assets/fonts/**/*"]
/// base = "assets/fonts"
/// dest = "assets/fonts"
/// ```
///
/// The `[project]` section is optional and has reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    /// Project-wide settings from `[project]`.
    #[serde(default)]
    pub project: ProjectSection,

    /// All stages from `[stage.<name>]`.
    ///
    /// Keys are the *stage names* (e.g. `"css"`, `"images"`).
    #[serde(default)]
    pub stage: BTreeMap<String, StageConfig>,
}

/// `[project]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
    /// Source tree root; all stage globs are relative to this.
    #[serde(default = "default_source_dir")]
    pub source_dir: String,

    /// Output tree root; `clean` deletes this directory recursively.
    #[serde(default = "default_out_dir")]
    pub out_dir: String,

    /// Dev server port used by `watch`.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Watch debounce window in milliseconds.
    ///
    /// Rapid successive events within this window are coalesced into a
    /// single trigger batch.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_source_dir() -> String {
    "src".to_string()
}

fn default_out_dir() -> String {
    "public".to_string()
}

fn default_port() -> u16 {
    3500
}

fn default_debounce_ms() -> u64 {
    200
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            out_dir: default_out_dir(),
            port: default_port(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// What a stage does with its matched input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// Mirror inputs into the output tree.
    Copy,
    /// Concatenate all inputs (sorted) into a single output file.
    Concat,
    /// Run an external command per input file (`{input}` / `{output}`).
    Exec,
}

/// `[stage.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    /// Transformation kind for this stage.
    pub kind: StageKind,

    /// Input globs, relative to `project.source_dir`.
    #[serde(default)]
    pub input: Vec<String>,

    /// Globs removed from the input set (and from watching).
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Prefix stripped from an input's source-relative path before the
    /// remainder is joined under `dest`.
    #[serde(default)]
    pub base: String,

    /// Output location under `project.out_dir`.
    ///
    /// For `copy`/`exec` this is a directory; for `concat` a single file.
    #[serde(default)]
    pub dest: String,

    /// Output file extension rewrite for `exec` (e.g. `"webp"`).
    #[serde(default)]
    pub ext: Option<String>,

    /// Shell command template for `exec`, with `{input}` and `{output}`
    /// placeholders.
    #[serde(default)]
    pub command: Option<String>,

    /// Dependency list: this stage waits for all stages listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Optional watch globs; if `None`, the stage watches its `input` globs.
    #[serde(default)]
    pub watch: Option<Vec<String>>,

    /// If true, a watch trigger is skipped when the aggregate content hash
    /// of the stage's current input set is unchanged.
    #[serde(default)]
    pub fingerprint: bool,
}

impl StageConfig {
    /// Effective watch patterns: the explicit `watch` list, or `input`.
    pub fn effective_watch(&self) -> &[String] {
        match &self.watch {
            Some(list) => list.as_slice(),
            None => self.input.as_slice(),
        }
    }
}
