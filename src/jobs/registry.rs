use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;
use url::Url;

use super::job::Job;
use super::model::JobId;

/// Owns every job created during the process lifetime
///
/// Jobs are never removed. Lookups hand out `Arc<Job>` clones so that callers
/// can take snapshots without holding the registry lock.
#[derive(Debug, Default)]
pub struct JobRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    order: Vec<Arc<Job>>,
    by_id: HashMap<JobId, Arc<Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id and insert a queued job
    pub fn create(&self, url: Url) -> Arc<Job> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        let mut id = JobId::generate();
        while inner.by_id.contains_key(&id) {
            id = JobId::generate();
        }

        let job = Arc::new(Job::new(id.clone(), url));
        inner.order.push(job.clone());
        inner.by_id.insert(id, job.clone());

        debug!(job_id = %job.id(), total = inner.order.len(), "Registered job");
        job
    }

    pub fn get(&self, id: &str) -> Option<Arc<Job>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.by_id.get(&JobId::from(id)).cloned()
    }

    /// All jobs in insertion order
    pub fn list(&self) -> Vec<Arc<Job>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.order.clone()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobStatus;
    use std::collections::HashSet;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn url() -> Url {
        Url::parse("https://example.com/video").unwrap()
    }

    #[test]
    fn test_create_and_get() {
        let registry = JobRegistry::new();
        let job = registry.create(url());

        let found = registry.get(job.id().as_str()).unwrap();
        assert!(Arc::ptr_eq(&job, &found));
        assert_eq!(found.status(), JobStatus::Queued);
    }

    #[test]
    fn test_get_unknown_returns_none() {
        let registry = JobRegistry::new();
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_list_keeps_insertion_order() {
        let registry = JobRegistry::new();
        let ids: Vec<JobId> = (0..5).map(|_| registry.create(url()).id().clone()).collect();

        let listed: Vec<JobId> = registry.list().iter().map(|job| job.id().clone()).collect();
        assert_eq!(listed, ids);
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_concurrent_creates_yield_unique_ids() {
        let registry = Arc::new(JobRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    (0..50)
                        .map(|_| registry.create(url()).id().clone())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let ids: HashSet<JobId> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();

        assert_eq!(ids.len(), 400);
        assert_eq!(registry.len(), 400);
    }

    #[test]
    fn test_listing_does_not_wait_on_job_mutation() {
        let registry = Arc::new(JobRegistry::new());
        let job = registry.create(url());
        let id = job.id().to_string();

        let (held_tx, held_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let holder = {
            let job = Arc::clone(&job);
            thread::spawn(move || {
                job.with_state_held(|| {
                    held_tx.send(()).unwrap();
                    let _ = release_rx.recv();
                })
            })
        };
        held_rx.recv().unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let reader = Arc::clone(&registry);
        thread::spawn(move || {
            let listed = reader.list().len();
            let found = reader.get(&id).is_some();
            let _ = done_tx.send((listed, found, reader.len()));
        });
        let result = done_rx.recv_timeout(Duration::from_secs(5));

        release_tx.send(()).unwrap();
        holder.join().unwrap();
        assert_eq!(result, Ok((1, true, 1)));
    }
}
