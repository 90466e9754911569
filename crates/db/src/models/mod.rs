pub mod pipeline_state;
pub mod queued_job;
