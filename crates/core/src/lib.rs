//! Fabula core domain: the pipeline step catalog, status model, job
//! payloads, retry policy, lifecycle event taxonomy, and the trait seams for
//! external collaborators (durable queue, state store, artifact store,
//! notification sink).
//!
//! This crate has no I/O dependencies; implementations live in `fabula-db`
//! and `fabula-events`, and the engine itself in `fabula-pipeline`.

pub mod error;
pub mod events;
pub mod job;
pub mod queue;
pub mod retry;
pub mod sink;
pub mod status;
pub mod step;
pub mod store;
pub mod types;

pub use error::PipelineError;
pub use job::{JobKind, JobPayload};
pub use queue::{Delivery, EnqueueOptions, WorkQueue};
pub use sink::NotificationSink;
pub use status::{PipelineStatus, ProjectPipelineState};
pub use step::{ArtifactKind, ArtifactScope, PipelineStep};
pub use store::{ArtifactStore, StateStore};
pub use types::{DbId, Timestamp};
