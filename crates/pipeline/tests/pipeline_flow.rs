//! Full pipeline walks: review gates, retries, and terminal completion.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use fabula_core::events::{
    project_channel, EVENT_PROGRESS_DETAIL, EVENT_PROJECT_COMPLETE, EVENT_STEP_COMPLETE,
    EVENT_STEP_NEED_REVIEW, EVENT_STEP_START,
};
use fabula_core::status::PipelineStatus;
use fabula_core::step::PipelineStep;
use fabula_core::NotificationSink;
use fabula_events::EventBus;
use fabula_pipeline::{
    ExecutorSet, JobProcessor, MemoryQueue, Orchestrator, PipelineRunner, RunnerConfig,
};

use common::{
    instant_retries, run_until_idle, uniform_executors, MemoryArtifactStore, MemoryStateStore,
    RecordingSink, StubExecutor,
};

#[tokio::test]
async fn full_walk_pauses_at_both_review_gates_and_completes_once() {
    let state = Arc::new(MemoryStateStore::new());
    let artifacts = Arc::new(MemoryArtifactStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let sink = Arc::new(RecordingSink::new());
    let orchestrator = Arc::new(
        Orchestrator::new(
            state.clone(),
            artifacts.clone(),
            queue.clone(),
            sink.clone(),
        )
        .with_enqueue_options(instant_retries()),
    );

    // Video generation fails its first attempt; everything else succeeds.
    let video = StubExecutor::failing(1);
    let executors = ExecutorSet::new(
        StubExecutor::ok(),
        StubExecutor::ok(),
        StubExecutor::ok(),
        StubExecutor::ok(),
        video.clone(),
        StubExecutor::ok(),
    );
    let processor = JobProcessor::new(
        state.clone(),
        artifacts,
        executors,
        sink.clone(),
        orchestrator.clone(),
    );

    orchestrator
        .start_from(42, PipelineStep::AssetExtraction)
        .await
        .unwrap();
    run_until_idle(queue.as_ref(), &processor).await;
    assert_eq!(
        state.status_of(42),
        Some(PipelineStatus::Review(PipelineStep::AssetExtraction))
    );

    orchestrator.continue_after_review(42).await.unwrap();
    run_until_idle(queue.as_ref(), &processor).await;
    assert_eq!(
        state.status_of(42),
        Some(PipelineStatus::Review(PipelineStep::Storyboarding))
    );

    orchestrator.continue_after_review(42).await.unwrap();
    run_until_idle(queue.as_ref(), &processor).await;

    assert_eq!(state.status_of(42), Some(PipelineStatus::Completed));
    assert_eq!(sink.count_of(EVENT_PROJECT_COMPLETE), 1);
    // Six stages, one extra start for the retried video attempt.
    assert_eq!(sink.count_of(EVENT_STEP_START), 7);
    assert_eq!(sink.count_of(EVENT_STEP_COMPLETE), 6);
    assert_eq!(sink.count_of(EVENT_STEP_NEED_REVIEW), 2);
    assert_eq!(sink.count_of(EVENT_PROGRESS_DETAIL), 1);
    assert_eq!(video.calls(), 2);
    assert_eq!(queue.pending_count().await, 0);
    assert!(queue.dead_jobs().await.is_empty());

    // Every event went out on the project's channel.
    for (channel, _, _) in sink.events() {
        assert_eq!(channel, project_channel(42));
    }
}

#[tokio::test]
async fn events_flow_through_the_broadcast_bus() {
    let state = Arc::new(MemoryStateStore::new());
    let artifacts = Arc::new(MemoryArtifactStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let bus = Arc::new(EventBus::default());
    let mut receiver = bus.subscribe();

    let sink: Arc<dyn NotificationSink> = bus.clone();
    let orchestrator = Arc::new(
        Orchestrator::new(state.clone(), artifacts.clone(), queue.clone(), sink.clone())
            .with_enqueue_options(instant_retries()),
    );
    let processor = JobProcessor::new(
        state,
        artifacts,
        uniform_executors(StubExecutor::ok()),
        sink,
        orchestrator.clone(),
    );

    orchestrator
        .start_from(6, PipelineStep::Assembly)
        .await
        .unwrap();
    run_until_idle(queue.as_ref(), &processor).await;

    let mut names = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        assert_eq!(event.channel, project_channel(6));
        names.push(event.event);
    }
    assert_eq!(
        names,
        vec![EVENT_STEP_START, EVENT_STEP_COMPLETE, EVENT_PROJECT_COMPLETE]
    );
}

#[tokio::test]
async fn runner_drains_the_queue_until_cancelled() {
    let state = Arc::new(MemoryStateStore::new());
    let artifacts = Arc::new(MemoryArtifactStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let sink = Arc::new(RecordingSink::new());
    let orchestrator = Arc::new(
        Orchestrator::new(
            state.clone(),
            artifacts.clone(),
            queue.clone(),
            sink.clone(),
        )
        .with_enqueue_options(instant_retries()),
    );
    let processor = Arc::new(JobProcessor::new(
        state.clone(),
        artifacts,
        uniform_executors(StubExecutor::ok()),
        sink.clone(),
        orchestrator.clone(),
    ));

    orchestrator
        .start_from(8, PipelineStep::AnchorImages)
        .await
        .unwrap();

    let runner = PipelineRunner::new(
        queue.clone(),
        processor,
        RunnerConfig {
            workers: 2,
            poll_interval: Duration::from_millis(10),
        },
    );
    let cancel = CancellationToken::new();
    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { runner.run(cancel).await })
    };

    // Anchor, video, and assembly stages all run off the queue.
    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel();
    handle.await.unwrap();

    assert_eq!(state.status_of(8), Some(PipelineStatus::Completed));
    assert_eq!(sink.count_of(EVENT_PROJECT_COMPLETE), 1);
    assert_eq!(queue.pending_count().await, 0);
    assert_eq!(queue.in_flight_count().await, 0);
}
