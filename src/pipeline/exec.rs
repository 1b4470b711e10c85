// src/pipeline/exec.rs

//! External-command stages.
//!
//! An `exec` stage delegates the actual transformation (SASS compilation,
//! image conversion, transpilation, ...) to an external tool, one invocation
//! per input file, with `{input}` and `{output}` substituted into the
//! configured command template.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{anyhow, Context};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::{PipelineError, Result};
use crate::pipeline::context::BuildContext;
use crate::pipeline::report::StageReport;
use crate::pipeline::spec::StageSpec;

/// Run the stage command once per input file.
///
/// A non-zero exit (or spawn failure) marks that file as failed; remaining
/// files are still processed.
pub async fn run_exec_stage(
    spec: &StageSpec,
    ctx: &BuildContext,
    inputs: &[PathBuf],
) -> Result<StageReport> {
    let template = spec.command.as_deref().ok_or_else(|| {
        PipelineError::Config(format!("exec stage '{}' has no command", spec.name))
    })?;

    let mut report = StageReport::default();

    for rel in inputs {
        let src = ctx.source_dir().join(rel);
        let dst = spec.output_path(ctx, rel);

        match run_one(template, &src, &dst).await {
            Ok(()) => report.record_output(dst),
            Err(err) => {
                let failure = PipelineError::Transform {
                    stage: spec.name.clone(),
                    file: rel.clone(),
                    reason: err.to_string(),
                };
                warn!(error = %failure, "command failed; skipping file");
                report.record_failure(rel.clone(), err.to_string());
            }
        }
    }

    Ok(report)
}

async fn run_one(template: &str, input: &Path, output: &Path) -> anyhow::Result<()> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {:?}", parent))?;
    }

    let cmdline = template
        .replace("{input}", &input.to_string_lossy())
        .replace("{output}", &output.to_string_lossy());

    debug!(cmd = %cmdline, "running stage command");

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&cmdline);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&cmdline);
        c
    };

    cmd.stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let out = cmd
        .output()
        .await
        .with_context(|| format!("spawning command: {cmdline}"))?;

    if out.status.success() {
        Ok(())
    } else {
        let code = out.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&out.stderr);
        Err(anyhow!(
            "exit code {code}: {}",
            stderr.trim().lines().next().unwrap_or("(no stderr)")
        ))
    }
}
