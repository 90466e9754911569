//! In-memory fakes shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use fabula_core::status::{PipelineStatus, ProjectPipelineState};
use fabula_core::step::{ArtifactKind, PipelineStep};
use fabula_core::types::DbId;
use fabula_core::{
    ArtifactStore, EnqueueOptions, NotificationSink, PipelineError, StateStore, WorkQueue,
};
use fabula_pipeline::{ExecutorSet, JobProcessor, StepContext, StepExecutor};

/// Enqueue options with zero backoff so retries are redelivered on the next
/// claim instead of after a wall-clock delay.
pub fn instant_retries() -> EnqueueOptions {
    EnqueueOptions {
        base_backoff: Duration::ZERO,
        ..EnqueueOptions::default()
    }
}

/// Claim and process deliveries until the queue has nothing ready.
pub async fn run_until_idle(queue: &dyn WorkQueue, processor: &JobProcessor) {
    while let Some(delivery) = queue.claim().await.unwrap() {
        let job_id = delivery.payload.job_id.clone();
        match processor.handle(&delivery).await {
            Ok(()) => queue.complete(&job_id).await.unwrap(),
            Err(e) => queue.fail(&job_id, &e.to_string()).await.unwrap(),
        }
    }
}

// --- state store -----------------------------------------------------------

#[derive(Default)]
pub struct MemoryStateStore {
    rows: Mutex<HashMap<DbId, ProjectPipelineState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_of(&self, project_id: DbId) -> Option<PipelineStatus> {
        self.rows
            .lock()
            .unwrap()
            .get(&project_id)
            .map(|row| row.status)
    }

    pub fn last_error_of(&self, project_id: DbId) -> Option<String> {
        self.rows
            .lock()
            .unwrap()
            .get(&project_id)
            .and_then(|row| row.last_error.clone())
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, project_id: DbId) -> Result<Option<ProjectPipelineState>, PipelineError> {
        Ok(self.rows.lock().unwrap().get(&project_id).cloned())
    }

    async fn set_status(
        &self,
        project_id: DbId,
        step: PipelineStep,
        status: PipelineStatus,
    ) -> Result<(), PipelineError> {
        self.rows.lock().unwrap().insert(
            project_id,
            ProjectPipelineState {
                project_id,
                current_step: Some(step),
                status,
                last_error: None,
                updated_at: chrono::Utc::now(),
            },
        );
        Ok(())
    }

    async fn complete(&self, project_id: DbId) -> Result<bool, PipelineError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&project_id) {
            Some(row) if row.status != PipelineStatus::Completed => {
                row.status = PipelineStatus::Completed;
                row.updated_at = chrono::Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_failure(
        &self,
        project_id: DbId,
        step: PipelineStep,
        error: &str,
    ) -> Result<(), PipelineError> {
        self.rows.lock().unwrap().insert(
            project_id,
            ProjectPipelineState {
                project_id,
                current_step: Some(step),
                status: PipelineStatus::Failed,
                last_error: Some(error.to_string()),
                updated_at: chrono::Utc::now(),
            },
        );
        Ok(())
    }
}

// --- artifact store --------------------------------------------------------

/// Records deletions instead of performing them.
#[derive(Default)]
pub struct MemoryArtifactStore {
    project_deletes: Mutex<Vec<(DbId, ArtifactKind)>>,
    shot_deletes: Mutex<Vec<(DbId, ArtifactKind)>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project_deletes(&self) -> Vec<(DbId, ArtifactKind)> {
        self.project_deletes.lock().unwrap().clone()
    }

    pub fn shot_deletes(&self) -> Vec<(DbId, ArtifactKind)> {
        self.shot_deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn delete(&self, project_id: DbId, kind: ArtifactKind) -> Result<u64, PipelineError> {
        self.project_deletes.lock().unwrap().push((project_id, kind));
        Ok(1)
    }

    async fn delete_for_shot(
        &self,
        shot_id: DbId,
        kind: ArtifactKind,
    ) -> Result<u64, PipelineError> {
        self.shot_deletes.lock().unwrap().push((shot_id, kind));
        Ok(1)
    }
}

// --- notification sink -----------------------------------------------------

/// Captures emitted events for assertions.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(String, String, serde_json::Value)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, String, serde_json::Value)> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, event, _)| event.clone())
            .collect()
    }

    pub fn count_of(&self, event: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, e, _)| e == event)
            .count()
    }
}

impl NotificationSink for RecordingSink {
    fn emit(&self, channel: &str, event: &str, payload: serde_json::Value) {
        self.events
            .lock()
            .unwrap()
            .push((channel.to_string(), event.to_string(), payload));
    }
}

// --- step executor ---------------------------------------------------------

/// Scripted executor: fails the first `fail_times` invocations, then
/// succeeds. Records every call.
pub struct StubExecutor {
    remaining_failures: AtomicU32,
    calls: AtomicU32,
    shot_calls: Mutex<Vec<DbId>>,
}

impl StubExecutor {
    pub fn ok() -> Arc<Self> {
        Self::failing(0)
    }

    pub fn failing(times: u32) -> Arc<Self> {
        Arc::new(Self {
            remaining_failures: AtomicU32::new(times),
            calls: AtomicU32::new(0),
            shot_calls: Mutex::new(Vec::new()),
        })
    }

    pub fn always_failing() -> Arc<Self> {
        Self::failing(u32::MAX)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn shot_calls(&self) -> Vec<DbId> {
        self.shot_calls.lock().unwrap().clone()
    }

    fn next_outcome(&self, step: PipelineStep) -> Result<(), PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
            }
            Err(PipelineError::execution(format!("{step} blew up")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StepExecutor for StubExecutor {
    async fn execute(&self, ctx: StepContext<'_>) -> Result<(), PipelineError> {
        self.next_outcome(ctx.step)
    }

    async fn execute_shot(
        &self,
        ctx: StepContext<'_>,
        shot_id: DbId,
    ) -> Result<(), PipelineError> {
        self.shot_calls.lock().unwrap().push(shot_id);
        self.next_outcome(ctx.step)
    }
}

/// An executor set using the same stub for every step.
pub fn uniform_executors(exec: Arc<StubExecutor>) -> ExecutorSet {
    ExecutorSet::new(
        exec.clone(),
        exec.clone(),
        exec.clone(),
        exec.clone(),
        exec.clone(),
        exec,
    )
}
