use std::sync::Arc;

use crate::config::Config;
use crate::dispatch::{Dispatcher, Executor, HostResolver};
use crate::engine::DownloadEngine;
use crate::jobs::JobRegistry;
use crate::observability::Metrics;
use crate::storage::{self, DownloadsRoot};
use crate::worker::DownloadWorker;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<JobRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub outputs: DownloadsRoot,
    pub engine: Arc<dyn DownloadEngine>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Wire registry, worker and dispatcher around one engine
    ///
    /// Opens (and creates) the downloads root from `config.downloads.root`.
    pub fn new(
        config: Config,
        engine: Arc<dyn DownloadEngine>,
        resolver: Arc<dyn HostResolver>,
    ) -> storage::Result<Self> {
        let outputs = DownloadsRoot::open(&config.downloads.root)?;
        let metrics = Arc::new(Metrics::new());
        let registry = Arc::new(JobRegistry::new());

        let worker = Arc::new(DownloadWorker::new(
            engine.clone(),
            outputs.clone(),
            config.engine.output_template.clone(),
            metrics.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            registry.clone(),
            worker,
            Executor::new(config.worker.max_concurrent_jobs),
            resolver,
            metrics.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            registry,
            dispatcher,
            outputs,
            engine,
            metrics,
        })
    }
}
