use std::collections::BTreeMap;
use std::error::Error;

use assetpipe::config::{ConfigFile, ProjectSection, StageConfig, StageKind};
use assetpipe::dag::Scheduler;
use assetpipe::engine::{RebuildQueue, StageOutcome};

type TestResult = Result<(), Box<dyn Error>>;

fn copy_stage(after: &[&str]) -> StageConfig {
    StageConfig {
        kind: StageKind::Copy,
        input: vec!["**/*".into()],
        exclude: vec![],
        base: String::new(),
        dest: String::new(),
        ext: None,
        command: None,
        after: after.iter().map(|s| s.to_string()).collect(),
        watch: None,
        fingerprint: false,
    }
}

fn config(stages: &[(&str, &[&str])]) -> ConfigFile {
    let mut map = BTreeMap::new();
    for (name, after) in stages {
        map.insert(name.to_string(), copy_stage(after));
    }
    ConfigFile {
        project: ProjectSection::default(),
        stage: map,
    }
}

/// A -> B -> C
fn chain() -> ConfigFile {
    config(&[("A", &[]), ("B", &["A"]), ("C", &["B"])])
}

#[test]
fn triggering_a_root_cascades_down_the_chain() -> TestResult {
    let mut scheduler = Scheduler::from_config(&chain());

    scheduler.start_new_run();
    let step = scheduler.handle_trigger(&["A".to_string()]);
    assert_eq!(step.ready, vec!["A".to_string()]);
    assert!(step.blocked.is_empty());

    let step = scheduler.handle_completion("A", StageOutcome::Success);
    assert_eq!(step.ready, vec!["B".to_string()]);

    let step = scheduler.handle_completion("B", StageOutcome::Success);
    assert_eq!(step.ready, vec!["C".to_string()]);

    let step = scheduler.handle_completion("C", StageOutcome::Success);
    assert!(step.ready.is_empty());
    assert!(scheduler.is_idle());

    Ok(())
}

#[test]
fn triggering_mid_chain_reruns_only_downstream_stages() -> TestResult {
    let mut scheduler = Scheduler::from_config(&chain());

    // First run everything so history exists.
    scheduler.start_new_run();
    scheduler.handle_trigger(&["A".to_string()]);
    scheduler.handle_completion("A", StageOutcome::Success);
    scheduler.handle_completion("B", StageOutcome::Success);
    scheduler.handle_completion("C", StageOutcome::Success);
    assert!(scheduler.is_idle());

    // Touching only B's inputs runs B then C, never A again.
    scheduler.start_new_run();
    let step = scheduler.handle_trigger(&["B".to_string()]);
    assert_eq!(step.ready, vec!["B".to_string()]);

    let step = scheduler.handle_completion("B", StageOutcome::Success);
    assert_eq!(step.ready, vec!["C".to_string()]);

    scheduler.handle_completion("C", StageOutcome::Success);
    assert!(scheduler.is_idle());

    Ok(())
}

#[test]
fn mid_chain_trigger_without_history_blocks_the_branch() -> TestResult {
    let mut scheduler = Scheduler::from_config(&chain());

    // B depends on A; A has never succeeded and is not part of this run.
    scheduler.start_new_run();
    let step = scheduler.handle_trigger(&["B".to_string()]);

    assert!(step.ready.is_empty());
    let mut blocked = step.blocked;
    blocked.sort();
    assert_eq!(blocked, vec!["B".to_string(), "C".to_string()]);
    assert!(scheduler.is_idle());

    Ok(())
}

#[test]
fn diamond_triggered_as_one_batch_runs_the_join_once() -> TestResult {
    let cfg = config(&[("A", &[]), ("B", &[]), ("C", &["A", "B"])]);
    let mut scheduler = Scheduler::from_config(&cfg);

    scheduler.start_new_run();
    let step = scheduler.handle_trigger(&["A".to_string(), "B".to_string()]);
    let mut ready = step.ready;
    ready.sort();
    assert_eq!(ready, vec!["A".to_string(), "B".to_string()]);

    // C waits until both arms are done.
    let step = scheduler.handle_completion("A", StageOutcome::Success);
    assert!(step.ready.is_empty());

    let step = scheduler.handle_completion("B", StageOutcome::Success);
    assert_eq!(step.ready, vec!["C".to_string()]);

    scheduler.handle_completion("C", StageOutcome::Success);
    assert!(scheduler.is_idle());

    Ok(())
}

#[test]
fn failure_skips_dependents_but_not_unrelated_branches() -> TestResult {
    let cfg = config(&[("css", &[]), ("js", &[]), ("html", &["css"])]);
    let mut scheduler = Scheduler::from_config(&cfg);

    scheduler.start_new_run();
    let step = scheduler.handle_trigger(&["css".to_string(), "js".to_string()]);
    let mut ready = step.ready;
    ready.sort();
    assert_eq!(ready, vec!["css".to_string(), "js".to_string()]);

    // css fails: html must never become ready, js keeps going.
    let step = scheduler.handle_completion("css", StageOutcome::Failed);
    assert!(step.ready.is_empty());
    assert!(!scheduler.is_idle());

    let step = scheduler.handle_completion("js", StageOutcome::Success);
    assert!(step.ready.is_empty());
    assert!(scheduler.is_idle());

    Ok(())
}

#[test]
fn rebuild_queue_coalesces_triggers_into_one_batch() -> TestResult {
    let mut queue = RebuildQueue::new();
    assert!(queue.is_empty());

    queue.record_trigger("css");
    queue.record_trigger("js");
    queue.record_trigger("css");

    let mut drained = queue.drain_pending();
    drained.sort();
    assert_eq!(drained, vec!["css".to_string(), "js".to_string()]);
    assert!(queue.is_empty());

    Ok(())
}
