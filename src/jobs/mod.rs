//! Job Store
//!
//! In-memory store for delivery jobs. Job records are owned here, outside the
//! contact router; the router only reads the phone field through the
//! [`ContactLookup`] seam and never writes back. Pickup/delivery/payment
//! details ride along as opaque JSON metadata.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{RelayError, Result};
use crate::router::ContactLookup;

/// Job lifecycle: `new → accepted → completed`, with `cancelled` reachable
/// from `new` and `accepted`. Completed and cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    New,
    Accepted,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Accepted => "accepted",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::New, Self::Accepted)
                | (Self::Accepted, Self::Completed)
                | (Self::New, Self::Cancelled)
                | (Self::Accepted, Self::Cancelled)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A delivery task. The contact phone is optional; unbound jobs fall back
/// to the router's provisioning policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub phone: Option<String>,
    pub status: JobStatus,
    /// Pickup/delivery/payment details, opaque to the relay.
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: impl Into<String>, phone: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            phone,
            status: JobStatus::New,
            metadata: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One record in a seed file: a JSON array of these.
#[derive(Debug, Deserialize)]
struct SeedRecord {
    id: String,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    status: Option<JobStatus>,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

/// In-memory job store.
#[derive(Default)]
pub struct JobStore {
    inner: RwLock<HashMap<String, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a job record.
    pub async fn upsert(&self, job: Job) {
        self.inner.write().await.insert(job.id.clone(), job);
    }

    pub async fn get(&self, job_id: &str) -> Option<Job> {
        self.inner.read().await.get(job_id).cloned()
    }

    /// All jobs, oldest first.
    pub async fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.inner.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        jobs
    }

    /// Apply a lifecycle transition, rejecting invalid ones.
    pub async fn set_status(&self, job_id: &str, next: JobStatus) -> Result<Job> {
        let mut jobs = self.inner.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| RelayError::unknown_job(job_id))?;
        if !job.status.can_transition_to(next) {
            return Err(RelayError::InvalidTransition {
                from: job.status.to_string(),
                to: next.to_string(),
            });
        }
        job.status = next;
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    /// `(job_id, phone)` pairs for seeding the contact router. Jobs without a
    /// phone are skipped.
    pub async fn seed_pairs(&self) -> Vec<(String, String)> {
        self.inner
            .read()
            .await
            .values()
            .filter_map(|job| job.phone.clone().map(|phone| (job.id.clone(), phone)))
            .collect()
    }

    /// Load jobs from a JSON seed file and insert them. Returns the number of
    /// records loaded.
    pub async fn load_seed_file(&self, path: &Path) -> Result<usize> {
        let contents = std::fs::read_to_string(path)?;
        let records: Vec<SeedRecord> = serde_json::from_str(&contents)?;
        let count = records.len();

        let mut jobs = self.inner.write().await;
        for record in records {
            let now = Utc::now();
            let job = Job {
                id: record.id.clone(),
                phone: record.phone,
                status: record.status.unwrap_or(JobStatus::New),
                metadata: record.metadata.unwrap_or(serde_json::Value::Null),
                created_at: now,
                updated_at: now,
            };
            jobs.insert(record.id, job);
        }
        tracing::info!("jobs: loaded {} job(s) from {}", count, path.display());
        Ok(count)
    }
}

#[async_trait]
impl ContactLookup for JobStore {
    async fn contact_for(&self, job_id: &str) -> Option<String> {
        self.inner.read().await.get(job_id)?.phone.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_upsert_and_get() {
        let store = JobStore::new();
        store.upsert(Job::new("ORD1", Some("111".into()))).await;

        let job = store.get("ORD1").await.unwrap();
        assert_eq!(job.status, JobStatus::New);
        assert_eq!(job.phone.as_deref(), Some("111"));
        assert!(store.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let store = JobStore::new();
        store.upsert(Job::new("ORD1", None)).await;

        let job = store.set_status("ORD1", JobStatus::Accepted).await.unwrap();
        assert_eq!(job.status, JobStatus::Accepted);
        let job = store.set_status("ORD1", JobStatus::Completed).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);

        // Completed is terminal.
        let err = store.set_status("ORD1", JobStatus::Cancelled).await.unwrap_err();
        assert!(matches!(err, RelayError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_cancel_from_new_and_accepted() {
        let store = JobStore::new();
        store.upsert(Job::new("a", None)).await;
        store.upsert(Job::new("b", None)).await;

        assert!(store.set_status("a", JobStatus::Cancelled).await.is_ok());
        store.set_status("b", JobStatus::Accepted).await.unwrap();
        assert!(store.set_status("b", JobStatus::Cancelled).await.is_ok());
    }

    #[tokio::test]
    async fn test_set_status_unknown_job() {
        let store = JobStore::new();
        let err = store.set_status("nope", JobStatus::Accepted).await.unwrap_err();
        assert!(matches!(err, RelayError::UnknownJob { .. }));
    }

    #[tokio::test]
    async fn test_seed_pairs_skip_phoneless_jobs() {
        let store = JobStore::new();
        store.upsert(Job::new("with", Some("111".into()))).await;
        store.upsert(Job::new("without", None)).await;

        let pairs = store.seed_pairs().await;
        assert_eq!(pairs, vec![("with".to_string(), "111".to_string())]);
    }

    #[tokio::test]
    async fn test_contact_lookup_reads_phone() {
        let store = JobStore::new();
        store.upsert(Job::new("ORD1", Some("628111".into()))).await;

        assert_eq!(store.contact_for("ORD1").await.as_deref(), Some("628111"));
        assert!(store.contact_for("ORD2").await.is_none());
    }

    #[tokio::test]
    async fn test_load_seed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"id": "ORD1", "phone": "+62 812-0001", "metadata": {{"pickup": "Warehouse A"}}}},
                {{"id": "ORD2", "status": "accepted"}}
            ]"#
        )
        .unwrap();

        let store = JobStore::new();
        let count = store.load_seed_file(file.path()).await.unwrap();
        assert_eq!(count, 2);

        let ord1 = store.get("ORD1").await.unwrap();
        assert_eq!(ord1.metadata["pickup"], "Warehouse A");
        assert_eq!(store.get("ORD2").await.unwrap().status, JobStatus::Accepted);
        assert!(store.get("ORD2").await.unwrap().phone.is_none());
    }

    #[tokio::test]
    async fn test_load_seed_file_rejects_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let store = JobStore::new();
        assert!(store.load_seed_file(file.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_list_sorted_by_creation() {
        let store = JobStore::new();
        store.upsert(Job::new("b", None)).await;
        store.upsert(Job::new("a", None)).await;
        let ids: Vec<String> = store.list().await.into_iter().map(|j| j.id).collect();
        assert_eq!(ids.len(), 2);
    }
}
