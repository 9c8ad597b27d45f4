use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub downloads: DownloadsConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Upper bound for submitted form bodies
    #[serde(default = "default_max_form_bytes")]
    pub max_form_bytes: ByteSize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_form_bytes: default_max_form_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 8084))
}

fn default_max_form_bytes() -> ByteSize {
    ByteSize(1024 * 1024) // 1 MB
}

/// Where job output lands
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadsConfig {
    #[serde(default = "default_downloads_root")]
    pub root: PathBuf,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            root: default_downloads_root(),
        }
    }
}

fn default_downloads_root() -> PathBuf {
    PathBuf::from("data")
}

/// Download backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineBackend {
    /// External `yt-dlp` compatible executable
    #[default]
    Process,
    /// Direct in-process HTTP fetch
    Http,
}

/// Download engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub backend: EngineBackend,
    /// Executable for the process backend (`YTDLP_BIN` overrides it)
    #[serde(default = "default_binary")]
    pub binary: PathBuf,
    #[serde(default = "default_output_template")]
    pub output_template: String,
    /// Appended to the process command line before the URL
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: EngineBackend::default(),
            binary: default_binary(),
            output_template: default_output_template(),
            extra_args: Vec::new(),
            user_agent: default_user_agent(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_binary() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_output_template() -> String {
    "%(title)s.%(ext)s".to_string()
}

fn default_user_agent() -> String {
    concat!("grabbox/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Worker scheduling
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Jobs allowed to download at once; unset means no ceiling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_jobs: Option<usize>,
}
