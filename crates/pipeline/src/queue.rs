//! In-process work queue.
//!
//! [`MemoryQueue`] implements the same at-least-once contract as the
//! Postgres-backed queue — attempt counting on claim, exponential backoff
//! between attempts, dead-parking on exhaustion — without durability. It
//! backs the engine's tests and single-process embeddings; production
//! deployments use `fabula-db`'s `PgWorkQueue`.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Mutex;

use fabula_core::queue::{Delivery, EnqueueOptions, WorkQueue};
use fabula_core::retry::backoff_delay;
use fabula_core::{JobPayload, PipelineError};

struct Entry {
    payload: JobPayload,
    job_key: String,
    attempt: u32,
    opts: EnqueueOptions,
    available_at: Instant,
}

#[derive(Default)]
struct Inner {
    pending: Vec<Entry>,
    running: HashMap<String, Entry>,
    dead: Vec<(JobPayload, String)>,
}

/// Non-durable [`WorkQueue`] over in-process state.
pub struct MemoryQueue {
    inner: Mutex<Inner>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Jobs waiting for delivery (due or backing off).
    pub async fn pending_count(&self) -> usize {
        self.inner.lock().await.pending.len()
    }

    /// Jobs claimed but not yet completed or failed.
    pub async fn in_flight_count(&self) -> usize {
        self.inner.lock().await.running.len()
    }

    /// Jobs that exhausted their attempts, with the last error text.
    pub async fn dead_jobs(&self) -> Vec<(JobPayload, String)> {
        self.inner.lock().await.dead.clone()
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkQueue for MemoryQueue {
    async fn enqueue(
        &self,
        payload: JobPayload,
        opts: EnqueueOptions,
    ) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock().await;
        let job_key = payload.job_key();
        inner.pending.push(Entry {
            payload,
            job_key,
            attempt: 0,
            opts,
            available_at: Instant::now(),
        });
        Ok(())
    }

    async fn remove(&self, job_key: &str) -> Result<u64, PipelineError> {
        let mut inner = self.inner.lock().await;
        let before = inner.pending.len();
        inner.pending.retain(|entry| entry.job_key != job_key);
        Ok((before - inner.pending.len()) as u64)
    }

    async fn claim(&self) -> Result<Option<Delivery>, PipelineError> {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        let Some(position) = inner.pending.iter().position(|e| e.available_at <= now) else {
            return Ok(None);
        };
        let mut entry = inner.pending.remove(position);
        entry.attempt += 1;

        let delivery = Delivery {
            payload: entry.payload.clone(),
            attempt: entry.attempt,
            max_attempts: entry.opts.max_attempts,
        };
        inner.running.insert(entry.payload.job_id.clone(), entry);
        Ok(Some(delivery))
    }

    async fn complete(&self, job_id: &str) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock().await;
        inner.running.remove(job_id);
        Ok(())
    }

    async fn fail(&self, job_id: &str, error: &str) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock().await;
        let Some(mut entry) = inner.running.remove(job_id) else {
            return Ok(());
        };

        if entry.attempt >= entry.opts.max_attempts {
            tracing::warn!(job_id, error, "Job exhausted its attempts");
            inner.dead.push((entry.payload, error.to_string()));
            return Ok(());
        }

        entry.available_at = Instant::now() + backoff_delay(entry.attempt, entry.opts.base_backoff);
        inner.pending.push(entry);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
