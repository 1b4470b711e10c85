use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use assetpipe::config::{ConfigFile, ProjectSection, StageConfig, StageKind};
use assetpipe::pipeline::{build_stage_specs, BuildContext};
use assetpipe::watch::{build_watch_profiles, spawn_debouncer, FingerprintCache};
use tempfile::TempDir;
use tokio::sync::mpsc;

type TestResult = Result<(), Box<dyn Error>>;

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

fn config_with(name: &str, stage: StageConfig) -> ConfigFile {
    let mut stages = BTreeMap::new();
    stages.insert(name.to_string(), stage);
    ConfigFile {
        project: ProjectSection::default(),
        stage: stages,
    }
}

#[tokio::test(start_paused = true)]
async fn debouncer_coalesces_a_burst_into_one_batch() -> TestResult {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<PathBuf>();
    let (batch_tx, mut batch_rx) = mpsc::channel::<Vec<PathBuf>>(4);
    let _debouncer = spawn_debouncer(event_rx, batch_tx, Duration::from_millis(200));

    // Editor-style burst: several events for one logical save.
    event_tx.send(PathBuf::from("assets/sass/main.sass"))?;
    event_tx.send(PathBuf::from("assets/sass/main.sass"))?;
    event_tx.send(PathBuf::from("assets/sass/_mixins.sass"))?;

    let mut batch = batch_rx.recv().await.ok_or("debouncer closed early")?;
    batch.sort();
    assert_eq!(
        batch,
        vec![
            PathBuf::from("assets/sass/_mixins.sass"),
            PathBuf::from("assets/sass/main.sass"),
        ]
    );

    // A later change starts a fresh window and a fresh batch.
    event_tx.send(PathBuf::from("index.html"))?;
    let batch = batch_rx.recv().await.ok_or("debouncer closed early")?;
    assert_eq!(batch, vec![PathBuf::from("index.html")]);

    // Closing the event source ends the debouncer.
    drop(event_tx);
    assert!(batch_rx.recv().await.is_none());

    Ok(())
}

#[test]
fn watch_profiles_prefer_explicit_watch_globs() -> TestResult {
    let mut css = stage(StageKind::Exec, &["assets/sass/main.sass"]);
    css.command = Some("sassc {input} {output}".into());
    css.dest = "css".into();
    // Partials are not inputs but must still trigger the stage.
    css.watch = Some(vec!["assets/sass/**/*.sass".into()]);
    css.exclude = vec!["assets/sass/vendor/**".into()];

    let cfg = config_with("css", css);
    let profiles = build_watch_profiles(&cfg)?;
    assert_eq!(profiles.len(), 1);

    let profile = &profiles[0];
    assert_eq!(profile.name(), "css");
    assert!(profile.matches("assets/sass/main.sass"));
    assert!(profile.matches("assets/sass/_mixins.sass"));
    assert!(!profile.matches("assets/sass/vendor/reset.sass"));
    assert!(!profile.matches("assets/css/plain.css"));

    Ok(())
}

#[test]
fn watch_profiles_fall_back_to_input_globs() -> TestResult {
    let cfg = config_with("html", stage(StageKind::Copy, &["**/*.html"]));
    let profiles = build_watch_profiles(&cfg)?;

    let profile = &profiles[0];
    assert!(profile.matches("index.html"));
    assert!(profile.matches("pages/about.html"));
    assert!(!profile.matches("assets/sass/main.sass"));

    Ok(())
}

#[test]
fn fingerprint_cache_skips_unchanged_content() -> TestResult {
    let dir = TempDir::new()?;
    let source = dir.path().join("src");
    fs::create_dir_all(source.join("img"))?;
    fs::write(source.join("img/logo.png"), "v1")?;

    let ctx = BuildContext::new(&source, dir.path().join("public"));

    let mut images = stage(StageKind::Copy, &["img/**/*"]);
    images.fingerprint = true;
    let cfg = config_with("images", images);
    let specs = build_stage_specs(&cfg)?;
    let spec = &specs["images"];

    let mut cache = FingerprintCache::new();
    assert!(cache.changed(spec, &ctx), "first sighting counts as changed");
    assert!(!cache.changed(spec, &ctx), "unchanged content is skipped");

    fs::write(source.join("img/logo.png"), "v2")?;
    assert!(cache.changed(spec, &ctx), "content edit is detected");
    assert!(!cache.changed(spec, &ctx));

    // A new file with identical content still changes the set.
    fs::write(source.join("img/logo2.png"), "v2")?;
    assert!(cache.changed(spec, &ctx));

    Ok(())
}
