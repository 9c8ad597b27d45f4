//! Download engine capability
//!
//! The worker drives downloads exclusively through [`DownloadEngine`]. Two
//! interchangeable backends exist:
//!
//! - [`ProcessEngine`] runs an external `yt-dlp` compatible binary and streams
//!   its stdout/stderr as [`EngineEvent::Output`] lines
//! - [`HttpEngine`] fetches the URL in-process and reports structured
//!   [`EngineEvent::Progress`] callbacks
//!
//! [`ScriptedEngine`] replays a fixed script and backs the test suites.
//!
//! Engines never touch job state. They only emit events through an
//! [`EventSink`] and return a terminal outcome.

mod http;
mod process;
mod scripted;

pub use http::{HttpConfig, HttpEngine};
pub use process::ProcessEngine;
pub use scripted::{ScriptedEngine, ScriptedOutcome};

use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

use crate::config::{EngineBackend, EngineConfig};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("download engine not available: {0}")]
    Unavailable(String),

    #[error("download engine exited with {}", describe_exit(.code))]
    Exited { code: Option<i32> },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("{0}")]
    Fault(String),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

/// Everything an engine needs for one download
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub url: Url,
    pub dest_dir: PathBuf,
    /// yt-dlp style file name template such as `%(title)s.%(ext)s`
    ///
    /// The process backend passes it through. The HTTP backend fills
    /// `%(title)s` and `%(ext)s` from the URL and otherwise keeps the URL's
    /// file name.
    pub output_template: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// One line of diagnostic output
    Output { stream: OutputStream, line: String },
    /// Structured byte progress; `total` may be an estimate or unknown
    Progress { downloaded: u64, total: Option<u64> },
    /// The engine finished transferring data
    Finished,
}

/// Sending half of the engine event channel
///
/// Sends never fail from the engine's point of view; once the worker stops
/// listening, events are dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }

    pub fn output(&self, stream: OutputStream, line: impl Into<String>) {
        self.emit(EngineEvent::Output {
            stream,
            line: line.into(),
        });
    }

    pub fn progress(&self, downloaded: u64, total: Option<u64>) {
        self.emit(EngineEvent::Progress { downloaded, total });
    }

    pub fn finished(&self) {
        self.emit(EngineEvent::Finished);
    }
}

/// Download capability consumed by the worker
#[async_trait]
pub trait DownloadEngine: Send + Sync {
    /// Download `request.url` into `request.dest_dir`
    ///
    /// Returns once the engine has terminated. On success zero or more files
    /// exist under the destination directory.
    async fn run(&self, request: EngineRequest, events: EventSink) -> Result<(), EngineError>;

    /// Short backend identifier used in logs and health output
    fn name(&self) -> &'static str;

    /// Whether the backend looks usable right now
    fn is_available(&self) -> bool {
        true
    }
}

/// Build the configured backend
pub fn from_config(config: &EngineConfig) -> Result<Arc<dyn DownloadEngine>, EngineError> {
    match config.backend {
        EngineBackend::Process => Ok(Arc::new(
            ProcessEngine::new(config.binary.clone()).with_args(config.extra_args.clone()),
        )),
        EngineBackend::Http => {
            let http_config = HttpConfig {
                connect_timeout: Duration::from_secs(config.connect_timeout_secs),
                user_agent: config.user_agent.clone(),
            };
            Ok(Arc::new(HttpEngine::new(http_config)?))
        }
    }
}
