//! Pipeline orchestrator.
//!
//! The single entry point for deciding what runs next: operator actions
//! (start, confirm review, restart, single-shot retry) and the automatic
//! advance after a stage completes all land here. The orchestrator is the
//! only writer of the `completed` status; every other status transition
//! belongs to the job processor.

use std::sync::Arc;

use fabula_core::events::{project_channel, EVENT_PROJECT_COMPLETE};
use fabula_core::job::stage_job_key;
use fabula_core::queue::EnqueueOptions;
use fabula_core::status::PipelineStatus;
use fabula_core::step::PipelineStep;
use fabula_core::types::DbId;
use fabula_core::{
    ArtifactStore, JobPayload, NotificationSink, PipelineError, StateStore, WorkQueue,
};

/// Decides what to enqueue next and owns destructive restart scope.
pub struct Orchestrator {
    state: Arc<dyn StateStore>,
    artifacts: Arc<dyn ArtifactStore>,
    queue: Arc<dyn WorkQueue>,
    sink: Arc<dyn NotificationSink>,
    enqueue_opts: EnqueueOptions,
}

impl Orchestrator {
    pub fn new(
        state: Arc<dyn StateStore>,
        artifacts: Arc<dyn ArtifactStore>,
        queue: Arc<dyn WorkQueue>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            state,
            artifacts,
            queue,
            sink,
            enqueue_opts: EnqueueOptions::default(),
        }
    }

    /// Override the retry parameters attached to enqueued jobs.
    pub fn with_enqueue_options(mut self, opts: EnqueueOptions) -> Self {
        self.enqueue_opts = opts;
        self
    }

    /// Enqueue a stage for the project, replacing any still-pending job for
    /// the same `(project, step)` lane so a forced re-submission wins.
    ///
    /// Queue errors propagate: a submission that silently vanished would
    /// leave the project stalled with nobody the wiser.
    pub async fn start_from(
        &self,
        project_id: DbId,
        step: PipelineStep,
    ) -> Result<(), PipelineError> {
        let replaced = self
            .queue
            .remove(&stage_job_key(project_id, step))
            .await?;
        if replaced > 0 {
            tracing::info!(project_id, step = %step, replaced, "Replaced pending stage job");
        }

        let payload = JobPayload::stage(project_id, step);
        tracing::info!(project_id, step = %step, job_id = %payload.job_id, "Enqueued stage");
        self.queue.enqueue(payload, self.enqueue_opts).await
    }

    /// Advance past a finished step, or complete the pipeline at the end of
    /// the catalog. The terminal `project:complete` event fires exactly
    /// once even if the final stage is redelivered.
    pub async fn schedule_next_step(
        &self,
        project_id: DbId,
        current: PipelineStep,
    ) -> Result<(), PipelineError> {
        match current.next() {
            Some(next) => self.start_from(project_id, next).await,
            None => {
                let newly_completed = self.state.complete(project_id).await?;
                if newly_completed {
                    tracing::info!(project_id, "Pipeline completed");
                    self.sink.emit(
                        &project_channel(project_id),
                        EVENT_PROJECT_COMPLETE,
                        serde_json::json!({ "project_id": project_id }),
                    );
                }
                Ok(())
            }
        }
    }

    /// Resume a project paused at a review gate, continuing with the step
    /// after the one under review.
    pub async fn continue_after_review(&self, project_id: DbId) -> Result<(), PipelineError> {
        let state = self
            .state
            .get(project_id)
            .await?
            .ok_or(PipelineError::NotFound {
                entity: "pipeline_state",
                id: project_id,
            })?;

        let PipelineStatus::Review(step) = state.status else {
            return Err(PipelineError::Conflict(format!(
                "project {project_id} is not awaiting review (status is '{}')",
                state.status
            )));
        };

        tracing::info!(project_id, step = %step, "Review confirmed");
        self.schedule_next_step(project_id, step).await
    }

    /// Destructive, idempotent restart: clear this stage's and every
    /// downstream stage's artifacts, then re-enqueue the stage.
    pub async fn restart_from(
        &self,
        project_id: DbId,
        step: PipelineStep,
    ) -> Result<(), PipelineError> {
        tracing::info!(project_id, step = %step, "Restarting pipeline from stage");
        self.clear_outputs_from(project_id, step).await?;
        self.start_from(project_id, step).await
    }

    /// Delete every artifact owned by `from_step` and all later stages, in
    /// catalog order; within a stage, kinds are deleted in their declared
    /// referential order so dependent rows go before their parents.
    pub async fn clear_outputs_from(
        &self,
        project_id: DbId,
        from_step: PipelineStep,
    ) -> Result<(), PipelineError> {
        for step in from_step.from_here() {
            for kind in step.owned_artifacts() {
                self.artifacts.delete(project_id, *kind).await?;
            }
        }
        Ok(())
    }

    /// Enqueue a scoped regeneration of one shot's outputs at `step`,
    /// outside the project's sequential stage lane.
    pub async fn retry_single_shot(
        &self,
        project_id: DbId,
        shot_id: DbId,
        step: PipelineStep,
    ) -> Result<(), PipelineError> {
        if !step.supports_single_shot() {
            return Err(PipelineError::Validation(format!(
                "step {step} has no shot-scoped artifacts to regenerate"
            )));
        }

        let payload = JobPayload::single_shot(project_id, step, shot_id);
        let replaced = self.queue.remove(&payload.job_key()).await?;
        if replaced > 0 {
            tracing::info!(project_id, shot_id, step = %step, "Replaced pending shot retry");
        }
        tracing::info!(project_id, shot_id, step = %step, "Enqueued single-shot retry");
        self.queue.enqueue(payload, self.enqueue_opts).await
    }
}
