//! Auto-Provisioning Policy
//!
//! What the router does when asked to resolve a job that has no binding.
//! The policy is injected at construction time rather than hardcoded:
//! deployments choose between rejecting, assigning from a configured
//! fallback pool (demo/test traffic), or consulting the job store.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rand::Rng;

use crate::config::{RouterConfig, SelectionMode};

/// External contact source for the `job-store-lookup` strategy. The job
/// store implements this; the router only ever reads through it.
#[async_trait]
pub trait ContactLookup: Send + Sync {
    async fn contact_for(&self, job_id: &str) -> Option<String>;
}

/// Strategy for provisioning a contact when a job has no binding.
#[derive(Debug, Clone)]
pub enum ProvisionPolicy {
    /// Never provision; `resolve_or_provision` fails for unbound jobs.
    Reject,
    /// Pick a phone from a configured fallback pool.
    AssignFromPool {
        pool: Vec<String>,
        selection: SelectionMode,
    },
    /// Read the phone from the job store record.
    JobStoreLookup,
}

impl ProvisionPolicy {
    pub fn from_config(config: &RouterConfig) -> Self {
        match config.provisioning {
            crate::config::ProvisioningMode::Reject => Self::Reject,
            crate::config::ProvisioningMode::AssignFromPool => Self::AssignFromPool {
                pool: config
                    .fallback_pool
                    .iter()
                    .map(|p| super::normalize_phone(p))
                    .filter(|p| !p.is_empty())
                    .collect(),
                selection: config.selection,
            },
            crate::config::ProvisioningMode::JobStoreLookup => Self::JobStoreLookup,
        }
    }
}

/// Cursor for `sequential` pool selection. Kept outside the router state so
/// selection never needs the state lock.
#[derive(Debug, Default)]
pub(crate) struct PoolCursor(AtomicUsize);

impl PoolCursor {
    /// Pick a phone from the pool, honoring the configured selection mode.
    pub(crate) fn pick<'a>(&self, pool: &'a [String], selection: SelectionMode) -> Option<&'a str> {
        if pool.is_empty() {
            return None;
        }
        let idx = match selection {
            SelectionMode::Random => rand::rng().random_range(0..pool.len()),
            SelectionMode::Sequential => self.0.fetch_add(1, Ordering::Relaxed) % pool.len(),
        };
        pool.get(idx).map(String::as_str)
    }
}
