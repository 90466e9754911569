//! Well-known lifecycle event name constants.
//!
//! These must match the event names observers subscribe to; they are shared
//! by the job processor, the orchestrator, and the notification layer.

use crate::types::DbId;

/// A stage began executing.
pub const EVENT_STEP_START: &str = "step:start";

/// A stage finished successfully.
pub const EVENT_STEP_COMPLETE: &str = "step:complete";

/// A stage finished and the pipeline paused for review.
pub const EVENT_STEP_NEED_REVIEW: &str = "step:need_review";

/// A stage exhausted its attempts; carries the last error text.
pub const EVENT_STEP_FAILED: &str = "step:failed";

/// Fine-grained progress during a stage (retry notices, fan-out counts).
pub const EVENT_PROGRESS_DETAIL: &str = "progress:detail";

/// A single shot's outputs were regenerated.
pub const EVENT_SHOT_COMPLETE: &str = "shot:complete";

/// Every stage completed; emitted exactly once per project run.
pub const EVENT_PROJECT_COMPLETE: &str = "project:complete";

/// A scoped, non-stage failure observers should surface.
pub const EVENT_ERROR: &str = "error";

/// Notification channel key for a project's lifecycle events.
pub fn project_channel(project_id: DbId) -> String {
    format!("project:{project_id}")
}
