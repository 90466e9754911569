//! Pipeline step catalog.
//!
//! The catalog is a fixed, totally ordered list of stages. It is pure and
//! side-effect free: the orchestrator and job processor consult it but never
//! mutate it. Adding a stage extends [`PipelineStep::ALL`] and forces every
//! `match` over the enum to be updated at compile time.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PipelineStep
// ---------------------------------------------------------------------------

/// A stage of the novel-to-video pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    /// Extract characters (and their reference images) from the novel.
    #[serde(rename = "asset")]
    AssetExtraction,
    /// Split the novel into episode plans.
    #[serde(rename = "episode")]
    EpisodePlanning,
    /// Break each episode into per-shot storyboard records.
    #[serde(rename = "storyboard")]
    Storyboarding,
    /// Generate the anchor image for every shot.
    #[serde(rename = "anchor")]
    AnchorImages,
    /// Generate the video clip for every shot.
    #[serde(rename = "video")]
    VideoGeneration,
    /// Stitch shot clips into the final episode videos.
    #[serde(rename = "assembly")]
    Assembly,
}

impl PipelineStep {
    /// Every step in catalog (execution) order.
    pub const ALL: [PipelineStep; 6] = [
        PipelineStep::AssetExtraction,
        PipelineStep::EpisodePlanning,
        PipelineStep::Storyboarding,
        PipelineStep::AnchorImages,
        PipelineStep::VideoGeneration,
        PipelineStep::Assembly,
    ];

    /// Canonical short name, used in status strings, job keys, and the
    /// `pipeline_state.current_step` column.
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStep::AssetExtraction => "asset",
            PipelineStep::EpisodePlanning => "episode",
            PipelineStep::Storyboarding => "storyboard",
            PipelineStep::AnchorImages => "anchor",
            PipelineStep::VideoGeneration => "video",
            PipelineStep::Assembly => "assembly",
        }
    }

    /// Parse a canonical short name back into a step.
    pub fn parse(s: &str) -> Option<PipelineStep> {
        Self::ALL.into_iter().find(|step| step.as_str() == s)
    }

    /// The step that follows `self` in catalog order, or `None` for the
    /// final step.
    pub fn next(self) -> Option<PipelineStep> {
        let idx = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    /// Whether the pipeline pauses for human review after this step
    /// completes, instead of advancing automatically.
    pub fn requires_review(self) -> bool {
        matches!(
            self,
            PipelineStep::AssetExtraction | PipelineStep::Storyboarding
        )
    }

    /// Every step from `self` (inclusive) to the end of the catalog, in
    /// catalog order. Used for downstream artifact clearing.
    pub fn from_here(self) -> impl Iterator<Item = PipelineStep> {
        Self::ALL.into_iter().skip_while(move |s| *s != self)
    }

    /// The persisted artifact kinds this step owns, in referential deletion
    /// order (dependents first). Re-executing a step deletes exactly this
    /// list for the project beforehand; nothing else may delete them.
    pub fn owned_artifacts(self) -> &'static [ArtifactKind] {
        match self {
            PipelineStep::AssetExtraction => {
                &[ArtifactKind::CharacterImage, ArtifactKind::Character]
            }
            PipelineStep::EpisodePlanning => &[ArtifactKind::Episode],
            PipelineStep::Storyboarding => &[ArtifactKind::Shot],
            PipelineStep::AnchorImages => &[ArtifactKind::ShotImage],
            PipelineStep::VideoGeneration => &[ArtifactKind::ShotVideo],
            PipelineStep::Assembly => &[ArtifactKind::FinalVideo],
        }
    }

    /// Whether this step has any shot-scoped artifacts, i.e. supports
    /// regenerating a single shot outside a full-stage run.
    pub fn supports_single_shot(self) -> bool {
        self.owned_artifacts()
            .iter()
            .any(|kind| kind.scope() == ArtifactScope::Shot)
    }
}

impl std::fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ArtifactKind
// ---------------------------------------------------------------------------

/// The deletion scope of an artifact kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactScope {
    /// Deleted per project (all rows for the project).
    Project,
    /// Rows belong to a single shot and can also be deleted per shot.
    Shot,
}

/// A kind of persisted artifact owned by exactly one pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Reference image rows for extracted characters.
    CharacterImage,
    /// Extracted character records.
    Character,
    /// Episode plan records.
    Episode,
    /// Per-shot storyboard records.
    Shot,
    /// Generated anchor images, one set per shot.
    ShotImage,
    /// Generated video clips, one set per shot.
    ShotVideo,
    /// Assembled episode videos.
    FinalVideo,
}

impl ArtifactKind {
    /// Deletion scope for this kind.
    pub fn scope(self) -> ArtifactScope {
        match self {
            ArtifactKind::CharacterImage
            | ArtifactKind::Character
            | ArtifactKind::Episode
            | ArtifactKind::Shot
            | ArtifactKind::FinalVideo => ArtifactScope::Project,
            ArtifactKind::ShotImage | ArtifactKind::ShotVideo => ArtifactScope::Shot,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
