//! Deterministic backend that replays a fixed script
//!
//! Used by tests and embedders that need the job lifecycle without a network
//! or an external binary.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::{DownloadEngine, EngineError, EngineEvent, EngineRequest, EventSink, OutputStream};

/// How a scripted run ends
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedOutcome {
    Success,
    Exit(Option<i32>),
    Unavailable(String),
    Fault(String),
}

#[derive(Debug, Clone)]
pub struct ScriptedEngine {
    events: Vec<EngineEvent>,
    files: Vec<(String, Vec<u8>)>,
    outcome: ScriptedOutcome,
    gate: Option<Arc<Semaphore>>,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            files: Vec::new(),
            outcome: ScriptedOutcome::Success,
            gate: None,
        }
    }

    pub fn event(mut self, event: EngineEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn stdout(self, line: impl Into<String>) -> Self {
        self.event(EngineEvent::Output {
            stream: OutputStream::Stdout,
            line: line.into(),
        })
    }

    pub fn stderr(self, line: impl Into<String>) -> Self {
        self.event(EngineEvent::Output {
            stream: OutputStream::Stderr,
            line: line.into(),
        })
    }

    pub fn progress(self, downloaded: u64, total: Option<u64>) -> Self {
        self.event(EngineEvent::Progress { downloaded, total })
    }

    /// File written under the job directory (`/` separated) before finishing
    pub fn file(mut self, relative: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.push((relative.into(), contents.into()));
        self
    }

    pub fn outcome(mut self, outcome: ScriptedOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Hold every run until a permit is added to `gate`
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl DownloadEngine for ScriptedEngine {
    async fn run(&self, request: EngineRequest, events: EventSink) -> Result<(), EngineError> {
        if let ScriptedOutcome::Unavailable(reason) = &self.outcome {
            return Err(EngineError::Unavailable(reason.clone()));
        }

        for event in &self.events {
            events.emit(event.clone());
        }

        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| EngineError::Fault("script gate closed".to_string()))?;
            permit.forget();
        }

        for (relative, contents) in &self.files {
            let path = relative
                .split('/')
                .fold(request.dest_dir.clone(), |path, part| path.join(part));
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, contents).await?;
        }

        match &self.outcome {
            ScriptedOutcome::Success => Ok(()),
            ScriptedOutcome::Exit(code) => Err(EngineError::Exited { code: *code }),
            ScriptedOutcome::Unavailable(reason) => Err(EngineError::Unavailable(reason.clone())),
            ScriptedOutcome::Fault(reason) => Err(EngineError::Fault(reason.clone())),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use url::Url;

    fn request(dest: &TempDir) -> EngineRequest {
        EngineRequest {
            url: Url::parse("https://example.com/video").unwrap(),
            dest_dir: dest.path().to_path_buf(),
            output_template: "%(title)s.%(ext)s".to_string(),
        }
    }

    #[tokio::test]
    async fn test_replays_events_and_writes_files() {
        let dest = TempDir::new().unwrap();
        let engine = ScriptedEngine::new()
            .stdout("[download] 10%")
            .progress(1, Some(2))
            .file("sub/clip.mp4", b"data".to_vec());
        let (sink, mut rx) = EventSink::channel();

        engine.run(request(&dest), sink).await.unwrap();

        assert!(matches!(rx.try_recv(), Ok(EngineEvent::Output { .. })));
        assert!(matches!(rx.try_recv(), Ok(EngineEvent::Progress { .. })));
        assert_eq!(
            std::fs::read(dest.path().join("sub").join("clip.mp4")).unwrap(),
            b"data"
        );
    }

    #[tokio::test]
    async fn test_unavailable_emits_nothing() {
        let dest = TempDir::new().unwrap();
        let engine = ScriptedEngine::new()
            .stdout("never sent")
            .outcome(ScriptedOutcome::Unavailable("missing".to_string()));
        let (sink, mut rx) = EventSink::channel();

        let err = engine.run(request(&dest), sink).await.unwrap_err();
        assert!(matches!(err, EngineError::Unavailable(_)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_gate_holds_run() {
        let dest = TempDir::new().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let engine = ScriptedEngine::new().gated(gate.clone());
        let (sink, _rx) = EventSink::channel();

        let run = tokio::spawn({
            let request = request(&dest);
            async move { engine.run(request, sink).await }
        });
        tokio::task::yield_now().await;
        assert!(!run.is_finished());

        gate.add_permits(1);
        run.await.unwrap().unwrap();
    }
}
