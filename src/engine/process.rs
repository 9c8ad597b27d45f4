//! External-process backend (`yt-dlp` command line)

use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{DownloadEngine, EngineError, EngineRequest, EventSink, OutputStream};

/// Runs `<binary> --no-playlist --newline -P <dest> -o <template> [args] <url>`
///
/// Both output channels are forwarded line by line. `--newline` makes the
/// binary print one progress line per update instead of redrawing in place.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    binary: PathBuf,
    extra_args: Vec<String>,
}

impl ProcessEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            extra_args: Vec::new(),
        }
    }

    /// Extra arguments placed between the fixed options and the URL
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    fn command(&self, request: &EngineRequest) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("--no-playlist")
            .arg("--newline")
            .arg("-P")
            .arg(&request.dest_dir)
            .arg("-o")
            .arg(&request.output_template)
            .args(&self.extra_args)
            .arg(request.url.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl DownloadEngine for ProcessEngine {
    async fn run(&self, request: EngineRequest, events: EventSink) -> Result<(), EngineError> {
        let mut child = self.command(&request).spawn().map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                EngineError::Unavailable(format!(
                    "{} not found. Install yt-dlp or set engine.binary / YTDLP_BIN",
                    self.binary.display()
                ))
            } else {
                EngineError::Io(err)
            }
        })?;

        debug!(binary = %self.binary.display(), pid = ?child.id(), "Engine process started");

        let stdout = forward_lines(child.stdout.take(), OutputStream::Stdout, events.clone());
        let stderr = forward_lines(child.stderr.take(), OutputStream::Stderr, events.clone());
        let (status, (), ()) = tokio::join!(child.wait(), stdout, stderr);
        let status = status?;

        if status.success() {
            Ok(())
        } else {
            Err(EngineError::Exited {
                code: status.code(),
            })
        }
    }

    fn name(&self) -> &'static str {
        "process"
    }

    fn is_available(&self) -> bool {
        which::which(&self.binary).is_ok()
    }
}

/// Forward every line of `reader` until EOF; invalid UTF-8 is replaced lossily
async fn forward_lines<R>(reader: Option<R>, stream: OutputStream, events: EventSink)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };

    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                events.output(stream, line.trim_end());
            }
            Err(err) => {
                warn!(?stream, error = %err, "Failed to read engine output");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineEvent;
    use tempfile::TempDir;
    use url::Url;

    fn request(dest: &TempDir) -> EngineRequest {
        EngineRequest {
            url: Url::parse("https://example.com/watch?v=1").unwrap(),
            dest_dir: dest.path().to_path_buf(),
            output_template: "%(title)s.%(ext)s".to_string(),
        }
    }

    fn drain(mut rx: tokio::sync::mpsc::UnboundedReceiver<EngineEvent>) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[cfg(unix)]
    fn fake_binary(dir: &TempDir, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("fake-yt-dlp");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let dest = TempDir::new().unwrap();
        let engine = ProcessEngine::new("/nonexistent/grabbox-yt-dlp-xyz");
        assert!(!engine.is_available());

        let (sink, _rx) = EventSink::channel();
        let err = engine.run(request(&dest), sink).await.unwrap_err();
        assert!(matches!(err, EngineError::Unavailable(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_streams_both_channels_and_writes_output() {
        let bin_dir = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        // $4 is the -P destination directory
        let binary = fake_binary(
            &bin_dir,
            "echo '[download]  50.0% of 10.00MiB'\n\
             echo 'WARNING: slow' >&2\n\
             touch \"$4/video.mp4\"\n\
             exit 0",
        );

        let engine = ProcessEngine::new(binary);
        assert!(engine.is_available());

        let (sink, rx) = EventSink::channel();
        engine.run(request(&dest), sink).await.unwrap();

        let events = drain(rx);
        assert!(events.contains(&EngineEvent::Output {
            stream: OutputStream::Stdout,
            line: "[download]  50.0% of 10.00MiB".to_string(),
        }));
        assert!(events.contains(&EngineEvent::Output {
            stream: OutputStream::Stderr,
            line: "WARNING: slow".to_string(),
        }));
        assert!(dest.path().join("video.mp4").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit() {
        let bin_dir = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let binary = fake_binary(&bin_dir, "echo 'ERROR: network unreachable' >&2\nexit 3");

        let (sink, rx) = EventSink::channel();
        let err = ProcessEngine::new(binary)
            .run(request(&dest), sink)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Exited { code: Some(3) }));
        assert_eq!(
            drain(rx),
            vec![EngineEvent::Output {
                stream: OutputStream::Stderr,
                line: "ERROR: network unreachable".to_string(),
            }]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_extra_args_precede_url() {
        let bin_dir = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let binary = fake_binary(&bin_dir, "echo \"$7 $8 $9\"");

        let (sink, rx) = EventSink::channel();
        ProcessEngine::new(binary)
            .with_args(vec!["-f".to_string(), "best".to_string()])
            .run(request(&dest), sink)
            .await
            .unwrap();

        assert_eq!(
            drain(rx),
            vec![EngineEvent::Output {
                stream: OutputStream::Stdout,
                line: "-f best https://example.com/watch?v=1".to_string(),
            }]
        );
    }
}
