//! In-memory job tracking
//!
//! A [`Job`] is created by the dispatcher, mutated only by its own worker and
//! read by any number of pollers. All mutable fields of a job live behind one
//! per-job lock, so readers always receive a consistent [`JobSnapshot`].
//!
//! The [`JobRegistry`] owns every job for the lifetime of the process. Its
//! structural lock is independent of the per-job locks, which means listing
//! jobs never waits on a download in progress.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use grabbox::jobs::JobRegistry;
//!
//! let registry = JobRegistry::new();
//! let job = registry.create(url);
//! let snapshot = registry.get(job.id()).map(|job| job.snapshot());
//! ```

mod job;
mod log;
mod model;
mod registry;

pub use job::Job;
pub use log::{LOG_CAPACITY, LogRing};
pub use model::{ERROR_MAX_CHARS, JobId, JobSnapshot, JobStatus};
pub use registry::JobRegistry;
