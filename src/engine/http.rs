//! In-process HTTP backend with structured progress callbacks

use async_trait::async_trait;
use reqwest::Client;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::redirect::{Attempt, Policy};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use url::{Host, Url};

use super::{DownloadEngine, EngineError, EngineRequest, EventSink, OutputStream};
use crate::dispatch::is_forbidden_ip;
use crate::humanize::ByteSize;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const FALLBACK_FILE_NAME: &str = "download";
const MAX_FILE_NAME_CHARS: usize = 200;
const MAX_REDIRECTS: usize = 10;

/// HTTP client configuration
///
/// Only connecting is bounded; a transfer may take as long as it needs.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("grabbox/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Streams a single URL to `<dest_dir>/<name derived from the URL path>`
///
/// Redirects and DNS answers are held to the same public-address policy as
/// submission: a hop to a forbidden IP literal is refused and forbidden
/// resolved addresses are never connected to.
pub struct HttpEngine {
    client: Client,
}

impl HttpEngine {
    pub fn new(config: HttpConfig) -> Result<Self, EngineError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .redirect(Policy::custom(public_redirects_only))
            .dns_resolver(Arc::new(PublicOnlyResolver))
            .build()
            .map_err(|e| EngineError::Http(e.to_string()))?;

        Ok(Self { client })
    }

    async fn fetch(
        &self,
        request: &EngineRequest,
        destination: &Path,
        events: &EventSink,
    ) -> Result<u64, EngineError> {
        let mut response = self
            .client
            .get(request.url.clone())
            .send()
            .await
            .map_err(|e| EngineError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Http(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let total = response.content_length();
        events.output(
            OutputStream::Stdout,
            format!("[download] Destination: {}", destination.display()),
        );

        let mut file = tokio::fs::File::create(destination).await?;
        let mut downloaded = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| EngineError::Http(format!("Failed to read body: {e}")))?
        {
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            events.progress(downloaded, total);
        }
        file.flush().await?;

        Ok(downloaded)
    }
}

#[async_trait]
impl DownloadEngine for HttpEngine {
    async fn run(&self, request: EngineRequest, events: EventSink) -> Result<(), EngineError> {
        let destination = request
            .dest_dir
            .join(output_name(&request.output_template, &request.url));
        debug!(url = %request.url, path = %destination.display(), "Starting HTTP download");

        match self.fetch(&request, &destination, &events).await {
            Ok(downloaded) => {
                events.output(
                    OutputStream::Stdout,
                    format!("[download] 100% of {}", ByteSize(downloaded)),
                );
                events.finished();
                Ok(())
            }
            Err(err) => {
                events.output(OutputStream::Stderr, format!("ERROR: {err}"));
                if let Err(remove_err) = tokio::fs::remove_file(&destination).await {
                    if remove_err.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %destination.display(), error = %remove_err, "Failed to remove partial download");
                    }
                }
                Err(err)
            }
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn public_redirects_only(attempt: Attempt) -> reqwest::redirect::Action {
    if attempt.previous().len() >= MAX_REDIRECTS {
        return attempt.error("too many redirects");
    }
    if is_forbidden_target(attempt.url()) {
        let target = attempt.url().to_string();
        return attempt.error(format!("redirect to forbidden host: {target}"));
    }
    attempt.follow()
}

/// IP-literal targets are checked here since they never reach the resolver
fn is_forbidden_target(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(ip)) => is_forbidden_ip(ip.into()),
        Some(Host::Ipv6(ip)) => is_forbidden_ip(ip.into()),
        Some(Host::Domain(_)) => false,
        None => true,
    }
}

/// Resolver that drops every address the host policy forbids
#[derive(Debug, Clone, Copy)]
struct PublicOnlyResolver;

impl Resolve for PublicOnlyResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(resolve_public(name.as_str().to_string()))
    }
}

async fn resolve_public(host: String) -> Result<Addrs, BoxError> {
    let public: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
        .await?
        .filter(|addr| !is_forbidden_ip(addr.ip()))
        .collect();

    if public.is_empty() {
        return Err(format!("{host} has no public address").into());
    }
    Ok(Box::new(public.into_iter()))
}

/// File name for a download, rendered from the output template
///
/// `%(title)s` and `%(ext)s` are filled from the URL's last path segment.
/// Templates with other fields or directories fall back to that segment.
fn output_name(template: &str, url: &Url) -> String {
    let name = file_name_for(url);
    let (title, ext) = match name.rsplit_once('.') {
        Some((title, ext)) if !title.is_empty() => (title, ext),
        _ => (name.as_str(), ""),
    };

    let rendered = template.replace("%(title)s", title).replace("%(ext)s", ext);
    let rendered = rendered.trim_end_matches('.');
    if rendered.contains("%(") || rendered.contains('/') || rendered.contains('\\') {
        return name;
    }

    let sanitized = sanitize(rendered);
    if sanitized.is_empty() { name } else { sanitized }
}

/// Last non-empty path segment, reduced to a conservative character set
fn file_name_for(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or_default();

    let sanitized = sanitize(segment);
    if sanitized.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        sanitized
    }
}

fn sanitize(raw: &str) -> String {
    let sanitized: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILE_NAME_CHARS)
        .collect();

    sanitized.trim_start_matches('.').to_string()
}
