//! Pipeline engine: orchestration, job processing, and the worker runner.
//!
//! The engine turns the step catalog in `fabula-core` into running work:
//! the [`Orchestrator`] decides what gets enqueued, the [`JobProcessor`]
//! executes claimed jobs and applies their state transitions, and the
//! [`PipelineRunner`] hosts the polling worker pool. [`BatchExecutor`]
//! gives step executors bounded fan-out for per-shot generation.
//!
//! Everything here is storage-agnostic: the engine talks to the queue,
//! state, artifacts, and notifications only through the `fabula-core`
//! traits. `fabula-db` provides the Postgres implementations; the
//! in-process [`MemoryQueue`] backs tests and single-node deployments.

mod batch;
mod executor;
mod orchestrator;
mod processor;
mod queue;
mod runner;

pub use batch::BatchExecutor;
pub use executor::{ExecutorSet, StepContext, StepExecutor};
pub use orchestrator::Orchestrator;
pub use processor::JobProcessor;
pub use queue::MemoryQueue;
pub use runner::{PipelineRunner, RunnerConfig};
