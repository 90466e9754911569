//! Pipeline status model and the per-project state row.
//!
//! `pipeline_state.status` is the single source of truth for where a project
//! sits in the pipeline. The job processor writes the processing / review /
//! failed values; the orchestrator alone writes `completed`.

use serde::{Deserialize, Serialize};

use crate::step::PipelineStep;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// PipelineStatus
// ---------------------------------------------------------------------------

/// Pipeline status of a project.
///
/// Stored as text using the canonical encoding `idle`, `<step>_processing`,
/// `<step>_review`, `completed`, `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    /// The project has never entered the pipeline, or was reset.
    Idle,
    /// A stage is currently executing.
    Processing(PipelineStep),
    /// A stage finished and is paused for human review.
    Review(PipelineStep),
    /// Every stage completed.
    Completed,
    /// A stage exhausted its attempts; operator action required.
    Failed,
}

impl PipelineStatus {
    /// Canonical string encoding.
    pub fn encode(self) -> String {
        match self {
            PipelineStatus::Idle => "idle".to_string(),
            PipelineStatus::Processing(step) => format!("{step}_processing"),
            PipelineStatus::Review(step) => format!("{step}_review"),
            PipelineStatus::Completed => "completed".to_string(),
            PipelineStatus::Failed => "failed".to_string(),
        }
    }

    /// Parse the canonical string encoding.
    pub fn parse(s: &str) -> Option<PipelineStatus> {
        match s {
            "idle" => return Some(PipelineStatus::Idle),
            "completed" => return Some(PipelineStatus::Completed),
            "failed" => return Some(PipelineStatus::Failed),
            _ => {}
        }
        if let Some(step) = s.strip_suffix("_processing") {
            return PipelineStep::parse(step).map(PipelineStatus::Processing);
        }
        if let Some(step) = s.strip_suffix("_review") {
            return PipelineStep::parse(step).map(PipelineStatus::Review);
        }
        None
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

// ---------------------------------------------------------------------------
// ProjectPipelineState
// ---------------------------------------------------------------------------

/// One row per project; created on first entry into the pipeline, mutated on
/// every stage transition, never deleted while the project exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectPipelineState {
    pub project_id: DbId,
    /// The step the status refers to; `None` only while `Idle`.
    pub current_step: Option<PipelineStep>,
    #[serde(with = "status_string")]
    pub status: PipelineStatus,
    /// Error text from the last terminal failure, if any.
    pub last_error: Option<String>,
    pub updated_at: Timestamp,
}

/// Serde adapter persisting [`PipelineStatus`] as its canonical string.
mod status_string {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::PipelineStatus;

    pub fn serialize<S: Serializer>(
        status: &PipelineStatus,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&status.encode())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<PipelineStatus, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PipelineStatus::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown pipeline status '{raw}'")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
