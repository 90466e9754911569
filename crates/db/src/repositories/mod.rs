pub mod artifact_repo;
pub mod queue_repo;
pub mod state_repo;

pub use artifact_repo::ArtifactRepo;
pub use queue_repo::QueueRepo;
pub use state_repo::StateRepo;
