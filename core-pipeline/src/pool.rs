//! # Volume Task Pool
//!
//! Bounded parallelism over volumes. Each submitted job handles exactly one
//! volume; at most `workers` jobs run at once. Jobs are independent: a failing
//! or panicking job only affects its own volume's result.
//!
//! ```rust,ignore
//! let mut pool = VolumeTaskPool::new(4);
//! for (volume, dir) in volumes {
//!     pool.submit(volume, convert_volume(volume, dir));
//! }
//! for outcome in pool.join().await {
//!     println!("volume {}: {:?}", outcome.volume, outcome.result);
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::error;

use crate::error::{PipelineError, Result};

/// Outcome of one volume job
#[derive(Debug)]
pub struct VolumeResult<T> {
    pub volume: u32,
    pub result: Result<T>,
}

impl<T> VolumeResult<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct VolumeTaskPool<T> {
    semaphore: Arc<Semaphore>,
    tasks: JoinSet<VolumeResult<T>>,
    workers: usize,
}

impl<T: Send + 'static> VolumeTaskPool<T> {
    /// `workers` below 1 is raised to 1.
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(workers)),
            tasks: JoinSet::new(),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Schedule `job` for `volume`; it starts once a worker slot is free.
    pub fn submit<F>(&mut self, volume: u32, job: F)
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let semaphore = self.semaphore.clone();
        self.tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await;

            // The inner task isolates panics so the volume number survives.
            let result = match tokio::spawn(job).await {
                Ok(result) => result,
                Err(e) => {
                    error!(volume, error = %e, "Volume job panicked");
                    Err(PipelineError::Join(e.to_string()))
                }
            };

            VolumeResult { volume, result }
        });
    }

    /// Wait for every job; results are ascending by volume number.
    pub async fn join(mut self) -> Vec<VolumeResult<T>> {
        let mut results = Vec::with_capacity(self.tasks.len());

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(outcome) => results.push(outcome),
                // The wrapper itself only fails if the runtime is shutting down.
                Err(e) => error!(error = %e, "Volume task lost"),
            }
        }

        results.sort_by_key(|r| r.volume);
        results
    }
}
