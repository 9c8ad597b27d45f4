//! Download worker
//!
//! A [`DownloadWorker`] runs exactly one job to completion: it marks the job
//! as downloading, drives the configured engine, folds engine events into job
//! state and finally records either the produced files or a bounded error.
//! Failed jobs are never retried; callers resubmit a new job instead.

pub mod progress;

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::engine::{
    DownloadEngine, EngineError, EngineEvent, EngineRequest, EventSink, OutputStream,
};
use crate::jobs::{ERROR_MAX_CHARS, Job};
use crate::observability::Metrics;
use crate::storage::DownloadsRoot;

/// Log lines quoted in the error of a job whose engine exited non-zero
pub const ERROR_TAIL_LINES: usize = 10;

pub struct DownloadWorker {
    engine: Arc<dyn DownloadEngine>,
    outputs: DownloadsRoot,
    output_template: String,
    metrics: Arc<Metrics>,
}

impl DownloadWorker {
    pub fn new(
        engine: Arc<dyn DownloadEngine>,
        outputs: DownloadsRoot,
        output_template: impl Into<String>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            engine,
            outputs,
            output_template: output_template.into(),
            metrics,
        }
    }

    /// Drive `job` from queued to a terminal state
    pub async fn run(&self, job: Arc<Job>) {
        if !job.begin() {
            return;
        }
        info!(
            job_id = %job.id(),
            url = %job.url(),
            engine = self.engine.name(),
            "Download started"
        );

        let dest_dir = match self.outputs.prepare_job_dir(job.id()).await {
            Ok(dir) => dir,
            Err(err) => {
                self.fail(&job, format!("failed to prepare output directory: {err}"));
                return;
            }
        };

        let request = EngineRequest {
            url: job.url().clone(),
            dest_dir: dest_dir.clone(),
            output_template: self.output_template.clone(),
        };

        match self.drive(&job, request).await {
            Ok(()) => self.finish(&job, dest_dir).await,
            Err(err) => {
                let message = failure_message(&job, &err);
                self.fail(&job, message);
            }
        }
    }

    /// Run the engine while applying its events as they arrive
    async fn drive(&self, job: &Job, request: EngineRequest) -> Result<(), EngineError> {
        let (sink, mut rx) = EventSink::channel();
        let run = self.engine.run(request, sink);
        tokio::pin!(run);

        let outcome = loop {
            tokio::select! {
                Some(event) = rx.recv() => apply_event(job, event),
                outcome = &mut run => break outcome,
            }
        };

        // Events emitted just before the engine returned
        rx.close();
        while let Ok(event) = rx.try_recv() {
            apply_event(job, event);
        }

        outcome
    }

    async fn finish(&self, job: &Job, dest_dir: PathBuf) {
        let outputs = self.outputs.clone();
        let scan = tokio::task::spawn_blocking(move || outputs.collect_files(&dest_dir)).await;

        match scan {
            Ok(Ok(files)) => {
                let count = files.len();
                if job.complete(files) {
                    self.metrics.job_completed();
                    info!(job_id = %job.id(), files = count, "Download finished");
                }
            }
            Ok(Err(err)) => self.fail(job, err.to_string()),
            Err(err) => self.fail(job, format!("output scan aborted: {err}")),
        }
    }

    fn fail(&self, job: &Job, message: String) {
        if job.fail(message) {
            self.metrics.job_failed();
            let snapshot = job.snapshot();
            warn!(
                job_id = %job.id(),
                error = snapshot.error.as_deref().unwrap_or_default(),
                "Download failed"
            );
        }
    }
}

fn apply_event(job: &Job, event: EngineEvent) {
    match event {
        EngineEvent::Output { stream, line } => {
            if stream == OutputStream::Stdout {
                if let Some(value) = progress::parse_percent(&line) {
                    job.set_progress(value);
                }
            }
            job.append_log(&line);
        }
        EngineEvent::Progress { downloaded, total } => {
            if let Some(value) = progress::from_bytes(downloaded, total) {
                job.set_progress(value);
            }
        }
        EngineEvent::Finished => job.set_progress(100.0),
    }
}

/// Non-zero exits quote the log tail; every other fault describes itself
fn failure_message(job: &Job, err: &EngineError) -> String {
    if let EngineError::Exited { .. } = err {
        let tail = job.log_tail(ERROR_TAIL_LINES).join("\n");
        if !tail.is_empty() {
            return last_chars(&tail, ERROR_MAX_CHARS).to_string();
        }
    }
    err.to_string()
}

fn last_chars(value: &str, max: usize) -> &str {
    let count = value.chars().count();
    if count <= max {
        return value;
    }
    match value.char_indices().nth(count - max) {
        Some((idx, _)) => &value[idx..],
        None => value,
    }
}
