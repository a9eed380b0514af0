use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use weft_core::command_validator::CommandValidator;
use weft_core::error::Error;
use weft_core::executor::CommandSpec;
use weft_core::package::Package;
use weft_core::result::ExecutionStatus;
use weft_core::runner::{CancelHandle, ExecutionEngine};

/// Creates a package whose `task.sh` runs `script`.
fn package(root: &Path, name: &str, script: &str, deps: &[&str]) -> Arc<Package> {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("task.sh"), script).unwrap();
    Arc::new(Package::new(name, dir, "0.1.0").with_workspace_dependencies(deps.iter().copied()))
}

fn task() -> CommandSpec {
    CommandSpec::new("sh ./task.sh")
}

#[tokio::test]
async fn test_fail_fast_skips_unstarted_packages() {
    let temp = TempDir::new().unwrap();
    let packages = vec![
        package(temp.path(), "pkg1", "sleep 0.5", &[]),
        package(temp.path(), "pkg2", "exit 1", &[]),
        package(temp.path(), "pkg3", "echo never", &[]),
    ];

    let engine = ExecutionEngine::new(2).unwrap().with_fail_fast(true);
    let batch = engine.run_parallel(&packages, &task()).await.unwrap();

    assert_eq!(batch.len(), 3);
    assert_eq!(batch.get("pkg1").unwrap().status, ExecutionStatus::Success);
    assert_eq!(batch.get("pkg2").unwrap().status, ExecutionStatus::Failure);
    let skipped = batch.get("pkg3").unwrap();
    assert_eq!(skipped.status, ExecutionStatus::Skipped);
    assert!(skipped.error.as_deref().unwrap().contains("fail-fast"));
    assert!(batch.any_failure());
    assert_eq!(batch.exit_code(), 1);
}

#[tokio::test]
async fn test_without_fail_fast_everything_runs() {
    let temp = TempDir::new().unwrap();
    let packages = vec![
        package(temp.path(), "a", "exit 3", &[]),
        package(temp.path(), "b", "echo b", &[]),
        package(temp.path(), "c", "echo c", &[]),
    ];

    let engine = ExecutionEngine::new(1).unwrap();
    let batch = engine.run_parallel(&packages, &task()).await.unwrap();

    assert_eq!(batch.failure_count(), 1);
    assert_eq!(batch.success_count(), 2);
    assert_eq!(batch.get("a").unwrap().exit_code, Some(3));
    assert_eq!(batch.failed_packages(), vec!["a"]);
}

#[tokio::test]
async fn test_concurrency_limit_is_respected() {
    let temp = TempDir::new().unwrap();
    let log = temp.path().join("log");
    fs::create_dir_all(&log).unwrap();
    // Each task records its start and end, then the max overlap is checked.
    let script = format!(
        "echo start >> {log}/events; sleep 0.2; echo end >> {log}/events",
        log = log.display()
    );
    let packages: Vec<Arc<Package>> = (0..6)
        .map(|i| package(temp.path(), &format!("p{}", i), &script, &[]))
        .collect();

    let engine = ExecutionEngine::new(2).unwrap();
    let batch = engine.run_parallel(&packages, &task()).await.unwrap();
    assert!(batch.all_success());

    let events = fs::read_to_string(log.join("events")).unwrap();
    let mut running = 0i32;
    let mut peak = 0i32;
    for line in events.lines() {
        running += if line == "start" { 1 } else { -1 };
        peak = peak.max(running);
    }
    assert!(peak <= 2, "peak concurrency was {}", peak);
}

#[tokio::test]
async fn test_topological_waits_for_previous_batch() {
    let temp = TempDir::new().unwrap();
    let marker = temp.path().join("core-done");
    let core = package(
        temp.path(),
        "core",
        &format!("sleep 0.3; touch {}", marker.display()),
        &[],
    );
    let app = package(temp.path(), "app", &format!("test -f {}", marker.display()), &["core"]);

    let engine = ExecutionEngine::new(4).unwrap();
    let batch = engine.run(&[app, core], &task(), true).await.unwrap();

    assert!(batch.all_success(), "{:?}", batch.failed_packages());
    let ordered: Vec<&str> = batch.sorted_by_index().iter().map(|r| r.package.as_str()).collect();
    assert_eq!(ordered, vec!["core", "app"]);
}

#[tokio::test]
async fn test_dependents_still_run_after_upstream_failure() {
    let temp = TempDir::new().unwrap();
    let core = package(temp.path(), "core", "exit 1", &[]);
    let app = package(temp.path(), "app", "echo app", &["core"]);

    let engine = ExecutionEngine::new(2).unwrap();
    let batch = engine.run(&[core, app], &task(), true).await.unwrap();

    assert_eq!(batch.get("core").unwrap().status, ExecutionStatus::Failure);
    assert_eq!(batch.get("app").unwrap().status, ExecutionStatus::Success);
}

#[tokio::test]
async fn test_fail_fast_skips_later_batches() {
    let temp = TempDir::new().unwrap();
    let core = package(temp.path(), "core", "exit 1", &[]);
    let utils = package(temp.path(), "utils", "echo utils", &["core"]);
    let app = package(temp.path(), "app", "echo app", &["utils"]);

    let engine = ExecutionEngine::new(2).unwrap().with_fail_fast(true);
    let batch = engine.run(&[core, utils, app], &task(), true).await.unwrap();

    assert_eq!(batch.failure_count(), 1);
    assert_eq!(batch.skipped_packages(), vec!["utils", "app"]);
    assert!(!batch.all_success());
}

#[tokio::test]
async fn test_cycle_is_reported_before_running() {
    let temp = TempDir::new().unwrap();
    let marker = temp.path().join("ran");
    let script = format!("touch {}", marker.display());
    let a = package(temp.path(), "a", &script, &["b"]);
    let b = package(temp.path(), "b", &script, &["a"]);

    let engine = ExecutionEngine::new(2).unwrap();
    let err = engine.run(&[a, b], &task(), true).await.unwrap_err();
    assert!(matches!(err, Error::CyclicDependency { .. }));
    assert!(!marker.exists());
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let temp = TempDir::new().unwrap();
    let packages = vec![
        package(temp.path(), "a", "echo a", &[]),
        package(temp.path(), "b", "echo b", &[]),
    ];

    let cancel = CancelHandle::new();
    cancel.cancel();
    let engine = ExecutionEngine::new(2).unwrap().with_cancel_handle(cancel);
    let batch = engine.run_parallel(&packages, &task()).await.unwrap();

    assert_eq!(batch.cancelled_count(), 2);
    assert_eq!(batch.exit_code(), 1);
}

#[tokio::test]
async fn test_cancel_during_run_keeps_finished_results() {
    let temp = TempDir::new().unwrap();
    let packages = vec![
        package(temp.path(), "first", "echo first", &[]),
        package(temp.path(), "second", "echo second", &[]),
        package(temp.path(), "third", "echo third", &[]),
    ];

    let cancel = CancelHandle::new();
    let trigger = cancel.clone();
    let engine = ExecutionEngine::new(1)
        .unwrap()
        .with_cancel_handle(cancel)
        .on_result(move |_| trigger.cancel());
    let batch = engine.run_parallel(&packages, &task()).await.unwrap();

    assert_eq!(batch.len(), 3);
    assert_eq!(batch.get("first").unwrap().status, ExecutionStatus::Success);
    assert_eq!(batch.get("third").unwrap().status, ExecutionStatus::Cancelled);
}

#[tokio::test]
async fn test_on_result_sees_every_package() {
    let temp = TempDir::new().unwrap();
    let packages: Vec<Arc<Package>> = (0..5)
        .map(|i| package(temp.path(), &format!("p{}", i), "true", &[]))
        .collect();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let count = Arc::new(AtomicUsize::new(0));
    let (seen_cb, count_cb) = (Arc::clone(&seen), Arc::clone(&count));
    let engine = ExecutionEngine::new(3).unwrap().on_result(move |result| {
        count_cb.fetch_add(1, Ordering::SeqCst);
        seen_cb.lock().unwrap().push(result.package.clone());
    });
    let batch = engine.run_parallel(&packages, &task()).await.unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 5);
    let mut seen = seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec!["p0", "p1", "p2", "p3", "p4"]);
    let indices: Vec<usize> = batch.sorted_by_index().iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_strict_validator_rejects_before_running() {
    let temp = TempDir::new().unwrap();
    let packages = vec![package(temp.path(), "a", "true", &[])];
    let engine = ExecutionEngine::new(1)
        .unwrap()
        .with_command_validator(CommandValidator::strict());
    let err = engine
        .run_parallel(&packages, &CommandSpec::new("echo a | cat"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidCommand(_)));
}

#[tokio::test]
async fn test_environment_reaches_the_command() {
    let temp = TempDir::new().unwrap();
    let packages = vec![package(temp.path(), "a", "test \"$MODE\" = release", &[])];
    let spec = task().with_env([("MODE", "release")]);
    let batch = ExecutionEngine::new(1).unwrap().run_parallel(&packages, &spec).await.unwrap();
    assert!(batch.all_success());
}
