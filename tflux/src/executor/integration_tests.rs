//! End-to-end runs through the shared executor.

use super::{Executor, ExecutorConfig};
use crate::core::TaskStatus;
use crate::errors::FluxError;
use crate::events::{self, CollectingEventSink};
use crate::pipeline::Pipeline;
use crate::testing::{
    diamond_pipeline, linear_pipeline, panicking_task, succeeding_task, ExecutionRecorder,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn executor() -> Executor {
    Executor::start(ExecutorConfig::default()).unwrap()
}

#[tokio::test]
async fn test_diamond_with_failing_branch() {
    let recorder = ExecutionRecorder::new();
    let (pipeline, _) = diamond_pipeline(&recorder, true);
    let executor = executor();

    let report = executor.run(pipeline.queue()).wait().await.unwrap();

    assert_eq!(report.status_of("a"), Some(TaskStatus::Success));
    assert_eq!(report.status_of("b"), Some(TaskStatus::Success));
    assert_eq!(report.status_of("c"), Some(TaskStatus::Failed));
    assert_eq!(report.status_of("d"), Some(TaskStatus::UpstreamFailed));
    assert!(report.is_done());
    assert!(!recorder.ran("d"));
    assert_eq!(recorder.executed()[0], "a");
    assert_eq!(recorder.count(), 3);

    executor.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_diamond_success_respects_order() {
    let recorder = ExecutionRecorder::new();
    let (pipeline, _) = diamond_pipeline(&recorder, false);
    let executor = executor();

    let report = executor.run(pipeline.queue()).wait().await.unwrap();

    assert!(report.is_success());
    let executed = recorder.executed();
    assert_eq!(executed.first().map(String::as_str), Some("a"));
    assert_eq!(executed.last().map(String::as_str), Some("d"));
    assert_eq!(executed.len(), 4);
}

#[tokio::test]
async fn test_single_task_submission() {
    let executor = executor();

    let handle = executor.submit(succeeding_task("solo"));
    let solo = handle.find("solo").unwrap();
    let report = handle.wait().await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.tasks.len(), 1);
    assert_eq!(report.tasks[0].output.as_deref(), Some("solo done"));
    assert_eq!(report.pipeline_name, "solo");
    assert_eq!(solo.index(), 0);
}

#[tokio::test]
async fn test_refused_back_link_leaves_pipeline_runnable() {
    let recorder = ExecutionRecorder::new();
    let mut pipeline = Pipeline::new("pair");
    let a = pipeline.add_task(recorder.task("a"));
    let b = pipeline.add_task(recorder.task("b"));
    pipeline.add_start(a).unwrap();
    pipeline.add_link(a, b).unwrap();

    let err = pipeline.add_link(b, a).unwrap_err();
    assert!(err.is_cycle());
    assert!(pipeline.graph().task(a).unwrap().upstream().is_empty());
    assert!(pipeline.graph().task(b).unwrap().downstream().is_empty());

    let report = executor().run(pipeline.queue()).wait().await.unwrap();
    assert!(report.is_success());
    assert_eq!(recorder.executed(), vec!["a", "b"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_runs_execute_one_task_at_a_time() {
    let recorder = ExecutionRecorder::new();
    let mut first = Pipeline::new("first");
    let mut second = Pipeline::new("second");
    for (pipeline, prefix) in [(&mut first, "x"), (&mut second, "y")] {
        let ids: Vec<_> = (0..3)
            .map(|i| {
                pipeline.add_task(recorder.slow_task(format!("{prefix}{i}"), Duration::from_millis(5)))
            })
            .collect();
        let _ = pipeline.from(ids[0]).go_to(ids[1]).go_to(ids[2]);
    }

    let executor = executor();
    let reports = executor
        .run_all(vec![first.queue(), second.queue(), first.queue()])
        .await;

    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|r| r.as_ref().is_ok_and(|r| r.is_success())));
    assert_eq!(recorder.count(), 9);
    assert_eq!(recorder.max_concurrency(), 1);
}

#[tokio::test]
async fn test_panicking_task_does_not_stop_worker() {
    let executor = executor();

    let report = executor
        .submit(panicking_task("boom", "exploded"))
        .wait()
        .await
        .unwrap();
    assert_eq!(report.status_of("boom"), Some(TaskStatus::Failed));
    let error = report.tasks[0].error.clone().unwrap_or_default();
    assert!(error.contains("exploded"), "unexpected error: {error}");

    let report = executor.submit(succeeding_task("after")).wait().await.unwrap();
    assert!(report.is_success());
}

#[tokio::test]
async fn test_repeated_runs_are_isolated() {
    let recorder = ExecutionRecorder::new();
    let (pipeline, names) = linear_pipeline("chain", &recorder, &["one", "two", "three"]);
    let executor = executor();

    let first = executor.run(pipeline.queue());
    let second = executor.run(pipeline.queue());
    assert_ne!(first.run_id(), second.run_id());

    let first = first.wait().await.unwrap();
    let second = second.wait().await.unwrap();

    assert!(first.is_success());
    assert!(second.is_success());
    assert_ne!(first.tasks[0].task_id, second.tasks[0].task_id);
    assert_eq!(recorder.count(), 6);
    for id in names {
        assert_eq!(pipeline.task(id).unwrap().status(), TaskStatus::None);
    }
}

#[tokio::test]
async fn test_handle_reports_progress() {
    let recorder = ExecutionRecorder::new();
    let (pipeline, _) = linear_pipeline("chain", &recorder, &["one", "two"]);
    let executor = executor();

    let handle = executor.run(pipeline.queue());
    assert_eq!(handle.pipeline_name(), "chain");
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.tasks.len(), 2);
    assert_eq!(snapshot.run_id, handle.run_id());

    let two = handle.find("two").unwrap();
    let report = handle.wait().await.unwrap();
    assert_eq!(report.status_of("two"), Some(TaskStatus::Success));
    assert_eq!(two.index(), 1);
}

#[tokio::test]
async fn test_events_follow_the_run() {
    let sink = Arc::new(CollectingEventSink::new());
    let executor = Executor::start_with_sink(ExecutorConfig::default(), sink.clone()).unwrap();
    let recorder = ExecutionRecorder::new();
    let (pipeline, _) = diamond_pipeline(&recorder, true);

    executor.run(pipeline.queue()).wait().await.unwrap();

    let types = sink.event_types();
    assert_eq!(types.first().map(String::as_str), Some(events::RUN_STARTED));
    assert_eq!(types.last().map(String::as_str), Some(events::RUN_COMPLETED));
    assert_eq!(sink.events_of_type(events::TASK_QUEUED).len(), 3);
    assert_eq!(sink.events_of_type(events::TASK_STARTED).len(), 3);
    assert_eq!(sink.events_of_type(events::TASK_SUCCEEDED).len(), 2);
    assert_eq!(sink.events_of_type(events::TASK_FAILED).len(), 1);

    let skipped = sink.events_of_type(events::TASK_UPSTREAM_FAILED);
    assert_eq!(skipped.len(), 1);
    let payload = skipped[0].1.clone().unwrap_or_default();
    assert_eq!(payload["task"], "d");

    let completed = sink.events_of_type(events::RUN_COMPLETED);
    let payload = completed[0].1.clone().unwrap_or_default();
    assert_eq!(payload["success"], false);
}

#[tokio::test]
async fn test_inline_execution() {
    let config = ExecutorConfig::new().with_blocking_pool(false).with_queue_capacity(4);
    let executor = Executor::start(config).unwrap();
    let recorder = ExecutionRecorder::new();
    let (pipeline, _) = diamond_pipeline(&recorder, false);

    let report = executor.run(pipeline.queue()).wait().await.unwrap();
    assert!(report.is_success());
    assert_eq!(executor.config().queue_capacity, 4);
}

#[tokio::test]
async fn test_shutdown_then_restart() {
    let executor = executor();
    executor.shutdown().await.unwrap();

    let executor = Executor::start(ExecutorConfig::default()).unwrap();
    let report = executor.submit(succeeding_task("last")).wait().await.unwrap();
    assert!(report.is_success());
}

#[test]
fn test_start_outside_runtime_fails() {
    let err = Executor::start(ExecutorConfig::default()).unwrap_err();
    assert!(matches!(err, FluxError::Config(_)));
}

#[tokio::test]
async fn test_start_rejects_invalid_config() {
    let err = Executor::start(ExecutorConfig::new().with_queue_capacity(0)).unwrap_err();
    assert!(matches!(err, FluxError::Config(_)));
}

#[test]
fn test_run_from_synchronous_code() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let executor = runtime
        .block_on(async { Executor::start(ExecutorConfig::default()) })
        .unwrap();
    let recorder = ExecutionRecorder::new();
    let (pipeline, _) = diamond_pipeline(&recorder, false);

    let handle = executor.run(pipeline.queue());
    let single = executor.submit(succeeding_task("solo"));

    let report = runtime.block_on(handle.wait()).unwrap();
    assert!(report.is_success());
    assert_eq!(recorder.count(), 4);
    let report = runtime.block_on(single.wait()).unwrap();
    assert_eq!(report.status_of("solo"), Some(TaskStatus::Success));

    runtime.block_on(executor.shutdown()).unwrap();
}
