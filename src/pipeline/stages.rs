// src/pipeline/stages.rs

use std::path::Path;

use anyhow::Context;
use tracing::{debug, warn};

use crate::config::model::StageKind;
use crate::errors::Result;
use crate::pipeline::context::BuildContext;
use crate::pipeline::exec::run_exec_stage;
use crate::pipeline::report::StageReport;
use crate::pipeline::spec::StageSpec;

/// Run a single stage against the current source tree.
///
/// Returns a [`StageReport`]; a non-empty failure list means the stage
/// failed, but every input that could be processed has been. Errors returned
/// here are stage-level (IO on the source tree, etc.), not per-file.
pub async fn run_stage(spec: &StageSpec, ctx: &BuildContext) -> Result<StageReport> {
    let inputs = spec.collect_inputs(ctx)?;
    debug!(stage = %spec.name, files = inputs.len(), "stage inputs collected");

    match spec.kind {
        StageKind::Copy => run_copy(spec, ctx, &inputs),
        StageKind::Concat => run_concat(spec, ctx, &inputs),
        StageKind::Exec => run_exec_stage(spec, ctx, &inputs).await,
    }
}

/// Mirror each input into the output tree, preserving the base-stripped
/// relative layout.
fn run_copy(spec: &StageSpec, ctx: &BuildContext, inputs: &[std::path::PathBuf]) -> Result<StageReport> {
    let mut report = StageReport::default();

    for rel in inputs {
        let src = ctx.source_dir().join(rel);
        let dst = spec.output_path(ctx, rel);

        match copy_one(&src, &dst) {
            Ok(()) => report.record_output(dst),
            Err(err) => {
                warn!(stage = %spec.name, file = ?rel, error = %err, "copy failed; skipping file");
                report.record_failure(rel.clone(), err.to_string());
            }
        }
    }

    Ok(report)
}

fn copy_one(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(src, dst)?;
    Ok(())
}

/// Concatenate all inputs (already sorted by `collect_inputs`) into the
/// single `dest` file.
///
/// The output is written atomically via a sibling temp file so a failing
/// input never leaves a truncated bundle behind.
fn run_concat(spec: &StageSpec, ctx: &BuildContext, inputs: &[std::path::PathBuf]) -> Result<StageReport> {
    let mut report = StageReport::default();
    let dst = ctx.out_dir().join(&spec.dest);

    let mut bundle: Vec<u8> = Vec::new();
    for rel in inputs {
        let src = ctx.source_dir().join(rel);
        match std::fs::read(&src) {
            Ok(bytes) => {
                bundle.extend_from_slice(&bytes);
                if !bytes.ends_with(b"\n") {
                    bundle.push(b'\n');
                }
            }
            Err(err) => {
                warn!(stage = %spec.name, file = ?rel, error = %err, "read failed; skipping file");
                report.record_failure(rel.clone(), err.to_string());
            }
        }
    }

    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = dst.with_extension("assetpipe.tmp");
    std::fs::write(&tmp, &bundle).with_context(|| format!("writing bundle to {:?}", tmp))?;
    std::fs::rename(&tmp, &dst)
        .with_context(|| format!("moving bundle into place at {:?}", dst))?;

    report.record_output(dst);
    Ok(report)
}
