//! Wire types for the grabbox HTTP API
//!
//! Job snapshots are served as-is ([`crate::jobs::JobSnapshot`]); submission
//! answers with [`crate::dispatch::Submission`]. This module only adds the
//! request bodies and the envelope types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::observability::MetricsSnapshot;

/// Value of the `Cache-Control` header on every JSON response
pub const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

/// `POST /api/download` form body
#[derive(Debug, Deserialize)]
pub struct SubmitForm {
    #[serde(default)]
    pub url: Option<String>,
}

/// `GET /api/status` query
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: BTreeMap<String, String>,
    pub jobs: usize,
    pub metrics: MetricsSnapshot,
    pub version: String,
}
