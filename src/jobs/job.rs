use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::warn;
use url::Url;

use super::log::LogRing;
use super::model::{ERROR_MAX_CHARS, JobId, JobSnapshot, JobStatus};

/// One tracked download request
///
/// Identity (`id`, `url`, `created_at`) is immutable. Everything else sits in
/// one private state struct behind a single mutex; transitions that would leave a terminal
/// state or skip a step are refused and reported as `false`.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    url: Url,
    created_at: DateTime<Utc>,
    state: Mutex<JobState>,
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    progress: f64,
    log: LogRing,
    files: Vec<String>,
    error: Option<String>,
    updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: JobId, url: Url) -> Self {
        let now = Utc::now();
        Self {
            id,
            url,
            created_at: now,
            state: Mutex::new(JobState {
                status: JobStatus::Queued,
                progress: 0.0,
                log: LogRing::new(),
                files: Vec::new(),
                error: None,
                updated_at: now,
            }),
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn status(&self) -> JobStatus {
        self.lock().status
    }

    /// Copy every field out under the lock
    pub fn snapshot(&self) -> JobSnapshot {
        let state = self.lock();
        JobSnapshot {
            id: self.id.clone(),
            url: self.url.to_string(),
            status: state.status,
            progress: state.progress,
            log: state.log.snapshot(),
            files: state.files.clone(),
            error: state.error.clone(),
            created_at: self.created_at,
            updated_at: state.updated_at,
        }
    }

    /// queued -> downloading
    pub fn begin(&self) -> bool {
        let mut state = self.lock();
        if !self.transition(&mut state, JobStatus::Downloading) {
            return false;
        }
        state.updated_at = Utc::now();
        true
    }

    /// Record a progress value; ignored unless the job is downloading
    pub fn set_progress(&self, value: f64) {
        if !value.is_finite() {
            return;
        }

        let mut state = self.lock();
        if state.status != JobStatus::Downloading {
            return;
        }
        state.progress = value.clamp(0.0, 100.0);
        state.updated_at = Utc::now();
    }

    pub fn append_log(&self, line: &str) {
        let mut state = self.lock();
        if state.log.append(line) {
            state.updated_at = Utc::now();
        }
    }

    /// Last `n` log lines, oldest first
    pub fn log_tail(&self, n: usize) -> Vec<String> {
        self.lock().log.tail(n)
    }

    /// downloading -> done, with the collected output files
    pub fn complete(&self, files: Vec<String>) -> bool {
        let mut state = self.lock();
        if !self.transition(&mut state, JobStatus::Done) {
            return false;
        }
        state.files = files;
        state.progress = 100.0;
        state.updated_at = Utc::now();
        true
    }

    /// Move into the terminal error state with a bounded, non-empty message
    pub fn fail(&self, message: impl Into<String>) -> bool {
        let mut state = self.lock();
        if !self.transition(&mut state, JobStatus::Error) {
            return false;
        }

        let message = message.into();
        let message = if message.trim().is_empty() {
            "download failed".to_string()
        } else {
            truncate_chars(&message, ERROR_MAX_CHARS)
        };

        state.files.clear();
        state.error = Some(message);
        state.updated_at = Utc::now();
        true
    }

    fn transition(&self, state: &mut JobState, next: JobStatus) -> bool {
        if state.status.can_transition_to(next) {
            state.status = next;
            return true;
        }

        warn!(
            job_id = %self.id,
            from = %state.status,
            to = %next,
            "Ignoring illegal job transition"
        );
        false
    }

    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` while this job's state lock is held
    #[cfg(test)]
    pub(crate) fn with_state_held<R>(&self, f: impl FnOnce() -> R) -> R {
        let _state = self.lock();
        f()
    }
}

fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(
            JobId::from("job-1"),
            Url::parse("https://example.com/video").unwrap(),
        )
    }

    #[test]
    fn test_new_job_is_queued() {
        let snapshot = job().snapshot();
        assert_eq!(snapshot.status, JobStatus::Queued);
        assert_eq!(snapshot.progress, 0.0);
        assert!(snapshot.log.is_empty());
        assert!(snapshot.files.is_empty());
        assert!(snapshot.error.is_none());
    }

    #[test]
    fn test_happy_path() {
        let job = job();
        assert!(job.begin());
        job.set_progress(42.5);
        assert_eq!(job.snapshot().progress, 42.5);

        assert!(job.complete(vec!["job-1/video.mp4".to_string()]));
        let snapshot = job.snapshot();
        assert_eq!(snapshot.status, JobStatus::Done);
        assert_eq!(snapshot.progress, 100.0);
        assert_eq!(snapshot.files, vec!["job-1/video.mp4"]);
        assert!(snapshot.error.is_none());
    }

    #[test]
    fn test_cannot_complete_from_queued() {
        let job = job();
        assert!(!job.complete(vec![]));
        assert_eq!(job.status(), JobStatus::Queued);
    }

    #[test]
    fn test_terminal_state_is_sticky() {
        let job = job();
        job.begin();
        assert!(job.fail("boom"));

        assert!(!job.begin());
        assert!(!job.complete(vec!["x".to_string()]));
        assert!(!job.fail("again"));
        job.set_progress(99.0);

        let snapshot = job.snapshot();
        assert_eq!(snapshot.status, JobStatus::Error);
        assert_eq!(snapshot.error.as_deref(), Some("boom"));
        assert!(snapshot.files.is_empty());
        assert_ne!(snapshot.progress, 99.0);
    }

    #[test]
    fn test_progress_is_clamped_and_last_value_wins() {
        let job = job();
        job.begin();
        job.set_progress(80.0);
        job.set_progress(20.0);
        assert_eq!(job.snapshot().progress, 20.0);

        job.set_progress(250.0);
        assert_eq!(job.snapshot().progress, 100.0);

        job.set_progress(f64::NAN);
        assert_eq!(job.snapshot().progress, 100.0);
    }

    #[test]
    fn test_progress_ignored_while_queued() {
        let job = job();
        job.set_progress(50.0);
        assert_eq!(job.snapshot().progress, 0.0);
    }

    #[test]
    fn test_error_message_is_bounded() {
        let job = job();
        job.begin();
        job.fail("é".repeat(ERROR_MAX_CHARS + 100));

        let error = job.snapshot().error.unwrap();
        assert_eq!(error.chars().count(), ERROR_MAX_CHARS);
    }

    #[test]
    fn test_empty_error_message_is_replaced() {
        let job = job();
        job.begin();
        job.fail("  ");
        assert_eq!(job.snapshot().error.as_deref(), Some("download failed"));
    }

    #[test]
    fn test_snapshot_is_stable_without_activity() {
        let job = job();
        job.begin();
        job.append_log("[download] 10.0% of 1MiB");
        assert_eq!(job.snapshot(), job.snapshot());
    }

    #[test]
    fn test_logs_survive_failure() {
        let job = job();
        job.begin();
        job.append_log("ERROR: network unreachable");
        job.fail("network unreachable");
        assert_eq!(job.snapshot().log, vec!["ERROR: network unreachable"]);
    }
}
