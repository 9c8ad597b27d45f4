use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::error;

use crate::jobs::Job;
use crate::worker::DownloadWorker;

/// Spawns one task per job, optionally capped by a semaphore
///
/// A job waiting for a permit stays `queued`. A worker task that panics
/// leaves its job in `error` instead of stuck mid-download.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    limiter: Option<Arc<Semaphore>>,
}

impl Executor {
    pub fn new(max_concurrent_jobs: Option<usize>) -> Self {
        Self {
            limiter: max_concurrent_jobs.map(|limit| Arc::new(Semaphore::new(limit))),
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Free slots, or `None` without a ceiling
    pub fn available_permits(&self) -> Option<usize> {
        self.limiter.as_ref().map(|limiter| limiter.available_permits())
    }

    pub fn spawn(&self, worker: Arc<DownloadWorker>, job: Arc<Job>) -> JoinHandle<()> {
        let limiter = self.limiter.clone();
        tokio::spawn(async move {
            let _permit = match limiter {
                Some(limiter) => match limiter.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        job.fail("worker pool is shut down");
                        return;
                    }
                },
                None => None,
            };

            let task = tokio::spawn({
                let job = job.clone();
                async move { worker.run(job).await }
            });

            if let Err(err) = task.await {
                error!(job_id = %job.id(), error = %err, "Download worker crashed");
                job.fail(format!("download worker crashed: {err}"));
            }
        })
    }
}
