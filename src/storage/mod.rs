//! Downloads root: the on-disk home of every job's output
//!
//! Layout is `<root>/<job_id>/<files produced by the engine>`. Paths reported
//! to clients are relative to the root and always use `/` as separator.

use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::jobs::JobId;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("path escapes the downloads root: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to scan output directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Canonicalized global downloads directory
#[derive(Debug, Clone)]
pub struct DownloadsRoot {
    root: PathBuf,
}

impl DownloadsRoot {
    /// Create the directory if needed and pin its canonical location
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;
        let root = path.canonicalize()?;
        tracing::info!(root = %root.display(), "Downloads root ready");
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn job_dir(&self, id: &JobId) -> PathBuf {
        self.root.join(id.as_str())
    }

    pub async fn prepare_job_dir(&self, id: &JobId) -> Result<PathBuf> {
        let dir = self.job_dir(id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Render `path` relative to the root with `/` separators
    pub fn relative_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            return None;
        }
        Some(parts.join("/"))
    }

    /// Every regular file below `dir`, as sorted root-relative paths
    ///
    /// Blocking; callers on the runtime should go through `spawn_blocking`.
    pub fn collect_files(&self, dir: &Path) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).follow_links(false) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(relative) = self.relative_path(entry.path()) {
                files.push(relative);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Map `(job_id, relative)` to an existing file under the root
    ///
    /// Rejects absolute paths, parent components and anything whose canonical
    /// location (symlinks resolved) falls outside the root.
    pub fn resolve_output(&self, job_id: &str, relative: &str) -> Result<PathBuf> {
        if !is_single_component(job_id) {
            return Err(StorageError::Forbidden(job_id.to_string()));
        }

        let relative_path = Path::new(relative);
        let mut clean = PathBuf::new();
        for component in relative_path.components() {
            match component {
                Component::Normal(part) => clean.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageError::Forbidden(relative.to_string()));
                }
            }
        }
        if clean.as_os_str().is_empty() {
            return Err(StorageError::NotFound(relative.to_string()));
        }

        let candidate = self.root.join(job_id).join(clean);
        let canonical = match candidate.canonicalize() {
            Ok(path) => path,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(format!("{job_id}/{relative}")));
            }
            Err(err) => return Err(err.into()),
        };

        if !canonical.starts_with(&self.root) {
            tracing::warn!(job_id, relative, "Rejected output path outside downloads root");
            return Err(StorageError::Forbidden(relative.to_string()));
        }
        if !canonical.is_file() {
            return Err(StorageError::NotFound(format!("{job_id}/{relative}")));
        }

        Ok(canonical)
    }
}

fn is_single_component(value: &str) -> bool {
    let mut components = Path::new(value).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !value.contains(['/', '\\'])
}
