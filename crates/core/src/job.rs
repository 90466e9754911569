//! Queued job payloads.
//!
//! A [`JobPayload`] is what the orchestrator enqueues and the job processor
//! consumes. The `job_id` is unique per submission (it embeds the submission
//! time), while [`JobPayload::job_key`] is the logical dedup key used when a
//! forced re-submission replaces a still-pending job.

use serde::{Deserialize, Serialize};

use crate::step::PipelineStep;
use crate::types::DbId;

/// What a queued job asks the processor to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    /// Run the full stage for the project.
    Stage,
    /// Regenerate one shot's outputs, outside the sequential project lane.
    SingleShot { shot_id: DbId },
}

/// A unit of pipeline work delivered through the durable queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    /// Unique per submission: `{project}:{step}[:shot:{shot}]:{millis}`.
    /// Queue-level retries of the same submission keep this id.
    pub job_id: String,
    pub project_id: DbId,
    pub step: PipelineStep,
    #[serde(flatten)]
    pub kind: JobKind,
}

impl JobPayload {
    /// Build a full-stage payload with a fresh submission-time id.
    pub fn stage(project_id: DbId, step: PipelineStep) -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        Self {
            job_id: format!("{project_id}:{step}:{millis}"),
            project_id,
            step,
            kind: JobKind::Stage,
        }
    }

    /// Build a single-shot payload with a fresh submission-time id.
    pub fn single_shot(project_id: DbId, step: PipelineStep, shot_id: DbId) -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        Self {
            job_id: format!("{project_id}:{step}:shot:{shot_id}:{millis}"),
            project_id,
            step,
            kind: JobKind::SingleShot { shot_id },
        }
    }

    /// Logical key identifying "this work", regardless of submission time.
    /// Stage jobs share one key per `(project, step)`; single-shot jobs get
    /// their own key so they never displace the stage lane.
    pub fn job_key(&self) -> String {
        match self.kind {
            JobKind::Stage => stage_job_key(self.project_id, self.step),
            JobKind::SingleShot { shot_id } => {
                format!("{}:{}:shot:{shot_id}", self.project_id, self.step)
            }
        }
    }
}

/// The logical job key for a full-stage job, usable before a payload exists.
pub fn stage_job_key(project_id: DbId, step: PipelineStep) -> String {
    format!("{project_id}:{step}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_key_is_stable_across_submissions() {
        let a = JobPayload::stage(3, PipelineStep::Storyboarding);
        let b = JobPayload::stage(3, PipelineStep::Storyboarding);
        assert_eq!(a.job_key(), b.job_key());
        assert_eq!(a.job_key(), stage_job_key(3, PipelineStep::Storyboarding));
    }

    #[test]
    fn job_id_embeds_project_and_step() {
        let job = JobPayload::stage(42, PipelineStep::AnchorImages);
        assert!(job.job_id.starts_with("42:anchor:"));
    }

    #[test]
    fn single_shot_key_is_outside_the_stage_lane() {
        let stage = JobPayload::stage(5, PipelineStep::VideoGeneration);
        let shot = JobPayload::single_shot(5, PipelineStep::VideoGeneration, 99);
        assert_ne!(stage.job_key(), shot.job_key());
        assert_eq!(shot.job_key(), "5:video:shot:99");
    }

    #[test]
    fn payload_round_trips_through_json() {
        let job = JobPayload::single_shot(1, PipelineStep::AnchorImages, 12);
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["kind"], "single_shot");
        assert_eq!(json["step"], "anchor");
        let back: JobPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, job);
    }
}
