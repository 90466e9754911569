//! Step executor seam and the per-step dispatch table.
//!
//! Executors perform the actual generation work (LLM calls, image and video
//! synthesis, stitching); they live with the generation services and are
//! injected into the engine. The engine guarantees each `execute` call
//! starts from a clean artifact slate and may be re-invoked after a crash.

use std::sync::Arc;

use async_trait::async_trait;

use fabula_core::step::PipelineStep;
use fabula_core::types::DbId;
use fabula_core::{NotificationSink, PipelineError};

/// Execution context handed to a step executor.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    pub project_id: DbId,
    pub step: PipelineStep,
    /// For `progress:detail` and per-artifact events during fan-out.
    pub sink: &'a dyn NotificationSink,
}

/// Performs the generation work for one pipeline step.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Run the full stage for a project. Must tolerate re-invocation: the
    /// processor deletes the stage's owned artifacts beforehand, but side
    /// effects already committed to third-party services may persist.
    async fn execute(&self, ctx: StepContext<'_>) -> Result<(), PipelineError>;

    /// Regenerate one shot's outputs without re-running the stage. Only
    /// steps with shot-scoped artifacts support this.
    async fn execute_shot(
        &self,
        ctx: StepContext<'_>,
        shot_id: DbId,
    ) -> Result<(), PipelineError> {
        let _ = shot_id;
        Err(PipelineError::Validation(format!(
            "step {} cannot regenerate a single shot",
            ctx.step
        )))
    }
}

/// One executor per catalog step; dispatch is an exhaustive match, so a new
/// step will not compile until it has an executor slot.
#[derive(Clone)]
pub struct ExecutorSet {
    asset: Arc<dyn StepExecutor>,
    episode: Arc<dyn StepExecutor>,
    storyboard: Arc<dyn StepExecutor>,
    anchor: Arc<dyn StepExecutor>,
    video: Arc<dyn StepExecutor>,
    assembly: Arc<dyn StepExecutor>,
}

impl ExecutorSet {
    pub fn new(
        asset: Arc<dyn StepExecutor>,
        episode: Arc<dyn StepExecutor>,
        storyboard: Arc<dyn StepExecutor>,
        anchor: Arc<dyn StepExecutor>,
        video: Arc<dyn StepExecutor>,
        assembly: Arc<dyn StepExecutor>,
    ) -> Self {
        Self {
            asset,
            episode,
            storyboard,
            anchor,
            video,
            assembly,
        }
    }

    /// The executor responsible for `step`.
    pub fn for_step(&self, step: PipelineStep) -> &Arc<dyn StepExecutor> {
        match step {
            PipelineStep::AssetExtraction => &self.asset,
            PipelineStep::EpisodePlanning => &self.episode,
            PipelineStep::Storyboarding => &self.storyboard,
            PipelineStep::AnchorImages => &self.anchor,
            PipelineStep::VideoGeneration => &self.video,
            PipelineStep::Assembly => &self.assembly,
        }
    }
}
