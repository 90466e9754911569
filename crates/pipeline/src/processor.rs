//! Job processor: executes one claimed delivery.
//!
//! The processor owns every status transition except `completed` — it marks
//! projects processing, parks them at review gates, and records terminal
//! failures. Advancing to the next stage is delegated back to the
//! orchestrator so stage sequencing lives in one place.
//!
//! `handle` returns `Err` for every failed attempt, terminal or not; the
//! runner reports that to the queue, which schedules the retry or parks the
//! job dead. Terminal bookkeeping (failed status, `step:failed`) happens
//! here on the last attempt, before the error is returned.

use std::sync::Arc;

use fabula_core::events::{
    project_channel, EVENT_ERROR, EVENT_PROGRESS_DETAIL, EVENT_SHOT_COMPLETE, EVENT_STEP_COMPLETE,
    EVENT_STEP_FAILED, EVENT_STEP_NEED_REVIEW, EVENT_STEP_START,
};
use fabula_core::status::PipelineStatus;
use fabula_core::step::{ArtifactScope, PipelineStep};
use fabula_core::types::DbId;
use fabula_core::{
    ArtifactStore, Delivery, JobKind, NotificationSink, PipelineError, StateStore,
};

use crate::executor::{ExecutorSet, StepContext};
use crate::orchestrator::Orchestrator;

/// Executes claimed jobs and applies their state and event side effects.
pub struct JobProcessor {
    state: Arc<dyn StateStore>,
    artifacts: Arc<dyn ArtifactStore>,
    executors: ExecutorSet,
    sink: Arc<dyn NotificationSink>,
    orchestrator: Arc<Orchestrator>,
}

impl JobProcessor {
    pub fn new(
        state: Arc<dyn StateStore>,
        artifacts: Arc<dyn ArtifactStore>,
        executors: ExecutorSet,
        sink: Arc<dyn NotificationSink>,
        orchestrator: Arc<Orchestrator>,
    ) -> Self {
        Self {
            state,
            artifacts,
            executors,
            sink,
            orchestrator,
        }
    }

    /// Process one delivery. `Err` means this attempt failed and the queue
    /// should apply its retry policy.
    pub async fn handle(&self, delivery: &Delivery) -> Result<(), PipelineError> {
        match delivery.payload.kind {
            JobKind::Stage => self.handle_stage(delivery).await,
            JobKind::SingleShot { shot_id } => self.handle_single_shot(delivery, shot_id).await,
        }
    }

    async fn handle_stage(&self, delivery: &Delivery) -> Result<(), PipelineError> {
        let project_id = delivery.payload.project_id;
        let step = delivery.payload.step;
        let channel = project_channel(project_id);

        tracing::info!(
            project_id,
            step = %step,
            attempt = delivery.attempt,
            job_id = %delivery.payload.job_id,
            "Stage started"
        );
        self.state
            .set_status(project_id, step, PipelineStatus::Processing(step))
            .await?;
        self.sink.emit(
            &channel,
            EVENT_STEP_START,
            serde_json::json!({ "step": step.as_str(), "attempt": delivery.attempt }),
        );

        // Re-runs and retries start from a clean slate: only this stage's
        // own outputs are cleared, never downstream stages'.
        for kind in step.owned_artifacts() {
            self.artifacts.delete(project_id, *kind).await?;
        }

        let ctx = StepContext {
            project_id,
            step,
            sink: self.sink.as_ref(),
        };
        match self.executors.for_step(step).execute(ctx).await {
            Ok(()) => {
                tracing::info!(project_id, step = %step, "Stage completed");
                self.sink.emit(
                    &channel,
                    EVENT_STEP_COMPLETE,
                    serde_json::json!({ "step": step.as_str() }),
                );
                if step.requires_review() {
                    self.state
                        .set_status(project_id, step, PipelineStatus::Review(step))
                        .await?;
                    self.sink.emit(
                        &channel,
                        EVENT_STEP_NEED_REVIEW,
                        serde_json::json!({ "step": step.as_str() }),
                    );
                    Ok(())
                } else {
                    self.orchestrator.schedule_next_step(project_id, step).await
                }
            }
            Err(e) => {
                self.on_stage_failure(delivery, step, e).await
            }
        }
    }

    async fn on_stage_failure(
        &self,
        delivery: &Delivery,
        step: PipelineStep,
        error: PipelineError,
    ) -> Result<(), PipelineError> {
        let project_id = delivery.payload.project_id;
        let channel = project_channel(project_id);

        if delivery.attempt < delivery.max_attempts {
            tracing::warn!(
                project_id,
                step = %step,
                attempt = delivery.attempt,
                max_attempts = delivery.max_attempts,
                error = %error,
                "Stage failed, will retry"
            );
            self.sink.emit(
                &channel,
                EVENT_PROGRESS_DETAIL,
                serde_json::json!({
                    "step": step.as_str(),
                    "message": format!(
                        "attempt {} of {} failed, retrying: {error}",
                        delivery.attempt, delivery.max_attempts
                    ),
                }),
            );
        } else {
            tracing::error!(
                project_id,
                step = %step,
                attempt = delivery.attempt,
                error = %error,
                "Stage failed terminally"
            );
            self.state
                .record_failure(project_id, step, &error.to_string())
                .await?;
            self.sink.emit(
                &channel,
                EVENT_STEP_FAILED,
                serde_json::json!({ "step": step.as_str(), "error": error.to_string() }),
            );
        }
        Err(error)
    }

    async fn handle_single_shot(
        &self,
        delivery: &Delivery,
        shot_id: DbId,
    ) -> Result<(), PipelineError> {
        let project_id = delivery.payload.project_id;
        let step = delivery.payload.step;
        let channel = project_channel(project_id);

        tracing::info!(
            project_id,
            shot_id,
            step = %step,
            attempt = delivery.attempt,
            "Single-shot retry started"
        );

        // Clear only this shot's outputs; project-scoped artifacts of the
        // stage stay intact.
        for kind in step.owned_artifacts() {
            if kind.scope() == ArtifactScope::Shot {
                self.artifacts.delete_for_shot(shot_id, *kind).await?;
            }
        }

        let ctx = StepContext {
            project_id,
            step,
            sink: self.sink.as_ref(),
        };
        match self.executors.for_step(step).execute_shot(ctx, shot_id).await {
            Ok(()) => {
                tracing::info!(project_id, shot_id, step = %step, "Single-shot retry completed");
                self.sink.emit(
                    &channel,
                    EVENT_SHOT_COMPLETE,
                    serde_json::json!({ "step": step.as_str(), "shot_id": shot_id }),
                );
                Ok(())
            }
            Err(e) => {
                // A shot retry never touches the project's pipeline status.
                if delivery.attempt < delivery.max_attempts {
                    tracing::warn!(
                        project_id,
                        shot_id,
                        step = %step,
                        attempt = delivery.attempt,
                        error = %e,
                        "Single-shot retry failed, will retry"
                    );
                } else {
                    tracing::error!(
                        project_id,
                        shot_id,
                        step = %step,
                        error = %e,
                        "Single-shot retry failed terminally"
                    );
                    self.sink.emit(
                        &channel,
                        EVENT_ERROR,
                        serde_json::json!({
                            "step": step.as_str(),
                            "shot_id": shot_id,
                            "error": e.to_string(),
                        }),
                    );
                }
                Err(e)
            }
        }
    }
}
