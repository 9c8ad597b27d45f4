//! Job admission
//!
//! The [`Dispatcher`] turns a raw URL into a running job: it validates the
//! input, refuses hosts that resolve to non-public addresses, registers a
//! queued job and hands it to the [`Executor`]. Submission never waits for
//! the download itself.

mod executor;
mod resolver;
mod validation;

pub use executor::Executor;
pub use resolver::{HostResolver, StaticResolver, SystemResolver};
pub use validation::{check_host, is_forbidden_ip, parse_url};

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::jobs::{JobId, JobRegistry, JobStatus};
use crate::observability::Metrics;
use crate::worker::DownloadWorker;

/// Reasons a submission is refused before any job exists
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("missing url")]
    MissingUrl,
    #[error("invalid url")]
    InvalidUrl,
    #[error("forbidden host")]
    ForbiddenHost,
}

/// Accepted submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submission {
    pub id: JobId,
    pub status: JobStatus,
}

pub struct Dispatcher {
    registry: Arc<JobRegistry>,
    worker: Arc<DownloadWorker>,
    executor: Executor,
    resolver: Arc<dyn HostResolver>,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<JobRegistry>,
        worker: Arc<DownloadWorker>,
        executor: Executor,
        resolver: Arc<dyn HostResolver>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            registry,
            worker,
            executor,
            resolver,
            metrics,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Validate `raw`, create a queued job and start its worker
    pub async fn submit(&self, raw: &str) -> Result<Submission, SubmitError> {
        let url = match self.admit(raw).await {
            Ok(url) => url,
            Err(err) => {
                self.metrics.job_rejected();
                warn!(url = raw.trim(), error = %err, "Rejected download request");
                return Err(err);
            }
        };

        let job = self.registry.create(url);
        let submission = Submission {
            id: job.id().clone(),
            status: job.status(),
        };
        self.metrics.job_submitted();
        info!(job_id = %job.id(), url = %job.url(), "Accepted download job");

        self.executor.spawn(self.worker.clone(), job);
        Ok(submission)
    }

    async fn admit(&self, raw: &str) -> Result<Url, SubmitError> {
        let url = parse_url(raw)?;
        check_host(&url, self.resolver.as_ref()).await?;
        Ok(url)
    }
}
