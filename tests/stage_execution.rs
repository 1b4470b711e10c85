use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::Path;

use assetpipe::config::{ConfigFile, ProjectSection, StageConfig, StageKind};
use assetpipe::pipeline::{build_stage_specs, run_stage, BuildContext};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn Error>>;

struct TestProject {
    _dir: TempDir,
    ctx: BuildContext,
}

impl TestProject {
    fn new() -> Result<Self, Box<dyn Error>> {
        let dir = TempDir::new()?;
        let source = dir.path().join("src");
        let out = dir.path().join("public");
        fs::create_dir_all(&source)?;
        let ctx = BuildContext::new(source, out);
        Ok(Self { _dir: dir, ctx })
    }

    fn write_source(&self, rel: &str, contents: &str) -> Result<(), Box<dyn Error>> {
        let path = self.ctx.source_dir().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    fn read_output(&self, rel: &str) -> Result<String, Box<dyn Error>> {
        Ok(fs::read_to_string(self.ctx.out_dir().join(rel))?)
    }
}

fn single_stage_config(name: &str, stage: StageConfig) -> ConfigFile {
    let mut stages = BTreeMap::new();
    stages.insert(name.to_string(), stage);
    ConfigFile {
        project: ProjectSection::default(),
        stage: stages,
    }
}

fn stage(kind: StageKind, input: &[&str]) -> StageConfig {
    StageConfig {
        kind,
        input: input.iter().map(|s| s.to_string()).collect(),
        exclude: vec![],
        base: String::new(),
        dest: String::new(),
        ext: None,
        command: None,
        after: vec![],
        watch: None,
        fingerprint: false,
    }
}

#[tokio::test]
async fn copy_stage_mirrors_base_stripped_layout() -> TestResult {
    let project = TestProject::new()?;
    project.write_source("assets/fonts/deep/icons.woff", "woff-bytes")?;
    project.write_source("assets/fonts/body.woff", "body-bytes")?;
    project.write_source("assets/sass/main.sass", "not-a-font")?;

    let mut fonts = stage(StageKind::Copy, &["assets/fonts/**/*"]);
    fonts.base = "assets/fonts".into();
    fonts.dest = "fonts".into();

    let cfg = single_stage_config("fonts", fonts);
    let specs = build_stage_specs(&cfg)?;

    let report = run_stage(&specs["fonts"], &project.ctx).await?;
    assert!(report.is_success());
    assert_eq!(report.outputs.len(), 2);

    assert_eq!(project.read_output("fonts/deep/icons.woff")?, "woff-bytes");
    assert_eq!(project.read_output("fonts/body.woff")?, "body-bytes");
    assert!(!project.ctx.out_dir().join("fonts/main.sass").exists());

    Ok(())
}

#[tokio::test]
async fn copy_stage_honours_exclude_globs() -> TestResult {
    let project = TestProject::new()?;
    project.write_source("pages/index.html", "<html>")?;
    project.write_source("pages/drafts/wip.html", "<draft>")?;

    let mut html = stage(StageKind::Copy, &["pages/**/*.html"]);
    html.exclude = vec!["pages/drafts/**".into()];
    html.base = "pages".into();

    let cfg = single_stage_config("html", html);
    let specs = build_stage_specs(&cfg)?;

    let report = run_stage(&specs["html"], &project.ctx).await?;
    assert!(report.is_success());
    assert_eq!(report.outputs.len(), 1);

    assert_eq!(project.read_output("index.html")?, "<html>");
    assert!(!project.ctx.out_dir().join("drafts/wip.html").exists());

    Ok(())
}

#[tokio::test]
async fn concat_stage_bundles_inputs_in_sorted_order() -> TestResult {
    let project = TestProject::new()?;
    // Written out of order on purpose; output order follows sorted paths.
    project.write_source("css/02-layout.css", "layout {}\n")?;
    project.write_source("css/01-reset.css", "reset {}")?;

    let mut bundle = stage(StageKind::Concat, &["css/**/*.css"]);
    bundle.dest = "css/bundle.css".into();

    let cfg = single_stage_config("bundle", bundle);
    let specs = build_stage_specs(&cfg)?;

    let report = run_stage(&specs["bundle"], &project.ctx).await?;
    assert!(report.is_success());

    // Missing trailing newline on the first file is inserted between parts.
    let first = project.read_output("css/bundle.css")?;
    assert_eq!(first, "reset {}\nlayout {}\n");

    // Rebuilding with unchanged sources is byte-identical.
    run_stage(&specs["bundle"], &project.ctx).await?;
    assert_eq!(project.read_output("css/bundle.css")?, first);

    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn exec_stage_substitutes_placeholders_and_rewrites_extension() -> TestResult {
    let project = TestProject::new()?;
    project.write_source("img/logo.png", "fake-png")?;

    let mut images = stage(StageKind::Exec, &["img/**/*.png"]);
    images.base = "img".into();
    images.dest = "img".into();
    images.ext = Some("webp".into());
    images.command = Some("cp {input} {output}".into());

    let cfg = single_stage_config("images", images);
    let specs = build_stage_specs(&cfg)?;

    let report = run_stage(&specs["images"], &project.ctx).await?;
    assert!(report.is_success());

    assert_eq!(project.read_output("img/logo.webp")?, "fake-png");

    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn exec_stage_records_per_file_failures_and_continues() -> TestResult {
    let project = TestProject::new()?;
    project.write_source("data/good.txt", "ok\n")?;
    project.write_source("data/bad.txt", "nope\n")?;

    let mut filter = stage(StageKind::Exec, &["data/*.txt"]);
    filter.base = "data".into();
    filter.dest = "data".into();
    filter.command = Some("grep ok {input} > {output}".into());

    let cfg = single_stage_config("filter", filter);
    let specs = build_stage_specs(&cfg)?;

    let report = run_stage(&specs["filter"], &project.ctx).await?;
    assert!(!report.is_success());

    // The failing file is reported, the good one still got processed.
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, Path::new("data/bad.txt"));
    assert_eq!(report.outputs.len(), 1);
    assert_eq!(project.read_output("data/good.txt")?, "ok\n");

    Ok(())
}

#[tokio::test]
async fn clean_removes_output_tree_and_tolerates_missing_dir() -> TestResult {
    let project = TestProject::new()?;
    project.write_source("index.html", "<html>")?;

    let cfg = single_stage_config("html", stage(StageKind::Copy, &["**/*.html"]));
    let specs = build_stage_specs(&cfg)?;
    run_stage(&specs["html"], &project.ctx).await?;
    assert!(project.ctx.out_dir().exists());

    project.ctx.clean()?;
    assert!(!project.ctx.out_dir().exists());

    // Cleaning again is a no-op, not an error.
    project.ctx.clean()?;

    Ok(())
}
