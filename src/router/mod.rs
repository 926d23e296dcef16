//! Contact Router
//!
//! The core of the relay: a bijective job↔phone mapping, per-job chat
//! history, and the policy for auto-provisioning a contact when none exists.
//! Inbound messages (tagged with a sender phone) and outbound send requests
//! (tagged with a job id) both route through here; actual delivery happens
//! outside, in the transport collaborator.
//!
//! All mutating operations serialize on a single write lock so no caller can
//! observe a half-updated forward/reverse pair. Reads (`get_history`,
//! `bindings`) take the read lock and never block each other. No I/O happens
//! while a lock is held.

mod extract;
pub mod policy;
mod types;

pub use policy::{ContactLookup, ProvisionPolicy};
pub use types::{
    ChatMessage, ContactBinding, DeliveryInstruction, DeliveryStatus, Direction, OutboundRouted,
    SenderRole,
};

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{RelayError, Result};
use policy::PoolCursor;

/// Strip everything but digits from a phone number.
/// "+62 812-3456" and "628123456" refer to the same contact.
pub(crate) fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

#[derive(Default)]
struct RouterState {
    /// job_id -> phone
    forward: HashMap<String, String>,
    /// phone -> job_id
    reverse: HashMap<String, String>,
    /// job_id -> ordered message log, created lazily on first message
    sessions: HashMap<String, Vec<ChatMessage>>,
}

impl RouterState {
    /// Install `job_id ⇄ phone`, dropping any stale forward or reverse entry
    /// first so the mapping stays a bijection over the active set.
    fn install_binding(&mut self, job_id: &str, phone: &str) {
        if let Some(prev_job) = self.reverse.insert(phone.to_string(), job_id.to_string())
            && prev_job != job_id
        {
            self.forward.remove(&prev_job);
        }
        if let Some(prev_phone) = self.forward.insert(job_id.to_string(), phone.to_string())
            && prev_phone != phone
        {
            self.reverse.remove(&prev_phone);
        }
    }
}

/// Owns binding and session state for the lifetime of the process (or until
/// `reset`). Job records live in the external job store; the router only
/// reads the phone field it needs through [`ContactLookup`].
pub struct ContactRouter {
    inner: RwLock<RouterState>,
    policy: ProvisionPolicy,
    lookup: Option<Arc<dyn ContactLookup>>,
    cursor: PoolCursor,
}

impl ContactRouter {
    pub fn new(policy: ProvisionPolicy) -> Self {
        Self {
            inner: RwLock::new(RouterState::default()),
            policy,
            lookup: None,
            cursor: PoolCursor::default(),
        }
    }

    /// Attach the contact source used by the `job-store-lookup` policy.
    pub fn with_lookup(mut self, lookup: Arc<dyn ContactLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Bind a job to a phone. Normalizes the phone and atomically removes any
    /// stale mapping on either side. Malformed input (no digits, empty job
    /// id) is logged and ignored; routing operations fail soft.
    pub async fn bind(&self, job_id: &str, phone: &str) {
        let phone = normalize_phone(phone);
        if job_id.is_empty() || phone.is_empty() {
            tracing::warn!("router: ignoring bind with empty job id or phone");
            return;
        }
        let mut state = self.inner.write().await;
        state.install_binding(job_id, &phone);
        tracing::debug!("router: bound job {} to phone {}", job_id, phone);
    }

    /// Return the bound phone for a job, provisioning one via the configured
    /// policy if absent. The provisioned binding persists. Fails with
    /// [`RelayError::NotProvisionable`] only when no contact can be
    /// determined; callers must treat that as terminal for the job, not
    /// retry it.
    pub async fn resolve_or_provision(&self, job_id: &str) -> Result<String> {
        if let Some(phone) = self.inner.read().await.forward.get(job_id) {
            return Ok(phone.clone());
        }

        // Candidate selection happens outside the lock; the job-store lookup
        // may await its own lock and the pool pick needs no state at all.
        let candidate = self.provision_candidate(job_id).await?;
        let phone = normalize_phone(&candidate);
        if phone.is_empty() {
            return Err(RelayError::not_provisionable(job_id));
        }

        let mut state = self.inner.write().await;
        // A concurrent bind may have won the race; the installed binding
        // takes precedence over our candidate.
        if let Some(existing) = state.forward.get(job_id) {
            return Ok(existing.clone());
        }
        state.install_binding(job_id, &phone);
        tracing::info!("router: provisioned phone {} for job {}", phone, job_id);
        Ok(phone)
    }

    async fn provision_candidate(&self, job_id: &str) -> Result<String> {
        match &self.policy {
            ProvisionPolicy::Reject => Err(RelayError::not_provisionable(job_id)),
            ProvisionPolicy::AssignFromPool { pool, selection } => self
                .cursor
                .pick(pool, *selection)
                .map(str::to_string)
                .ok_or_else(|| RelayError::not_provisionable(job_id)),
            ProvisionPolicy::JobStoreLookup => match &self.lookup {
                Some(lookup) => lookup
                    .contact_for(job_id)
                    .await
                    .ok_or_else(|| RelayError::not_provisionable(job_id)),
                None => Err(RelayError::not_provisionable(job_id)),
            },
        }
    }

    /// Route an inbound message by sender phone. An existing reverse binding
    /// always wins; only for unknown phones does the `#token` recovery
    /// heuristic run (and implicitly bind). Unroutable messages are logged
    /// and dropped, and no session is created for them.
    pub async fn route_inbound(&self, from_phone: &str, body: &str) -> Option<(String, ChatMessage)> {
        let phone = normalize_phone(from_phone);
        if phone.is_empty() {
            tracing::debug!("router: inbound message with no usable sender phone, dropping");
            return None;
        }

        let mut state = self.inner.write().await;
        let job_id = match state.reverse.get(&phone) {
            Some(job_id) => job_id.clone(),
            None => match extract::job_token(body) {
                Some(token) => {
                    state.install_binding(&token, &phone);
                    tracing::info!(
                        "router: recovered job {} from message body, bound to phone {}",
                        token,
                        phone
                    );
                    token
                }
                None => {
                    tracing::info!("router: unroutable inbound message from {}, dropped", phone);
                    return None;
                }
            },
        };

        let message = ChatMessage::received(&job_id, SenderRole::Courier, body);
        state
            .sessions
            .entry(job_id.clone())
            .or_default()
            .push(message.clone());
        Some((job_id, message))
    }

    /// Route an outbound message: resolve/provision the destination, append a
    /// `sent` message with `delivery = pending`, and return the instruction
    /// for the transport layer. Delivery itself happens outside the router;
    /// report the outcome back via [`mark_delivery`](Self::mark_delivery).
    pub async fn route_outbound(
        &self,
        job_id: &str,
        body: &str,
        sender: SenderRole,
    ) -> Result<OutboundRouted> {
        let phone = self.resolve_or_provision(job_id).await?;
        let message = ChatMessage::sent(job_id, sender, body);

        let mut state = self.inner.write().await;
        state
            .sessions
            .entry(job_id.to_string())
            .or_default()
            .push(message.clone());

        Ok(OutboundRouted {
            message,
            instruction: DeliveryInstruction {
                destination_phone: phone,
                body: body.to_string(),
            },
        })
    }

    /// Record the transport's delivery report for a previously routed
    /// outbound message. Returns the updated message, or `None` when the
    /// message is unknown (fail soft, logged).
    pub async fn mark_delivery(
        &self,
        job_id: &str,
        message_id: Uuid,
        status: DeliveryStatus,
    ) -> Option<ChatMessage> {
        let mut state = self.inner.write().await;
        let message = state
            .sessions
            .get_mut(job_id)?
            .iter_mut()
            .find(|m| m.id == message_id);
        match message {
            Some(m) => {
                m.delivery = Some(status);
                Some(m.clone())
            }
            None => {
                tracing::warn!(
                    "router: delivery report for unknown message {} on job {}",
                    message_id,
                    job_id
                );
                None
            }
        }
    }

    /// Ordered message log for a job. Never fails; unknown jobs yield an
    /// empty sequence.
    pub async fn get_history(&self, job_id: &str) -> Vec<ChatMessage> {
        self.inner
            .read()
            .await
            .sessions
            .get(job_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Clear all bindings and sessions, then re-seed bindings from the given
    /// `(job_id, phone)` pairs. Idempotent; used at startup to load known
    /// jobs.
    pub async fn reset(&self, seeds: &[(String, String)]) {
        let mut state = self.inner.write().await;
        state.forward.clear();
        state.reverse.clear();
        state.sessions.clear();
        for (job_id, phone) in seeds {
            let phone = normalize_phone(phone);
            if job_id.is_empty() || phone.is_empty() {
                continue;
            }
            state.install_binding(job_id, &phone);
        }
        tracing::info!("router: reset with {} seed binding(s)", state.forward.len());
    }

    /// Read-only snapshot of current bindings for diagnostics, sorted by job
    /// id for stable output.
    pub async fn bindings(&self) -> Vec<ContactBinding> {
        let state = self.inner.read().await;
        let mut snapshot: Vec<ContactBinding> = state
            .forward
            .iter()
            .map(|(job_id, phone)| ContactBinding {
                job_id: job_id.clone(),
                phone: phone.clone(),
            })
            .collect();
        snapshot.sort_by(|a, b| a.job_id.cmp(&b.job_id));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectionMode;
    use async_trait::async_trait;

    fn pool_router(phones: &[&str]) -> ContactRouter {
        ContactRouter::new(ProvisionPolicy::AssignFromPool {
            pool: phones.iter().map(|p| p.to_string()).collect(),
            selection: SelectionMode::Sequential,
        })
    }

    fn reject_router() -> ContactRouter {
        ContactRouter::new(ProvisionPolicy::Reject)
    }

    #[tokio::test]
    async fn test_bind_and_resolve() {
        let router = reject_router();
        router.bind("ORD1", "+62 812-0001").await;
        let phone = router.resolve_or_provision("ORD1").await.unwrap();
        assert_eq!(phone, "628120001");
    }

    #[tokio::test]
    async fn test_rebinding_phone_removes_stale_job() {
        // bind(j1,p1) then bind(j2,p1): j1 must no longer resolve to p1.
        let router = reject_router();
        router.bind("j1", "111").await;
        router.bind("j2", "111").await;

        assert!(router.resolve_or_provision("j1").await.is_err());
        assert_eq!(router.resolve_or_provision("j2").await.unwrap(), "111");

        let bindings = router.bindings().await;
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].job_id, "j2");
    }

    #[tokio::test]
    async fn test_rebinding_job_removes_stale_phone() {
        let router = reject_router();
        router.bind("j1", "111").await;
        router.bind("j1", "222").await;

        assert_eq!(router.resolve_or_provision("j1").await.unwrap(), "222");
        // Old phone no longer routes inbound to j1.
        assert!(router.route_inbound("111", "hello").await.is_none());
    }

    #[tokio::test]
    async fn test_bind_ignores_empty_input() {
        let router = reject_router();
        router.bind("", "111").await;
        router.bind("j1", "no digits here").await;
        assert!(router.bindings().await.is_empty());
    }

    #[tokio::test]
    async fn test_inbound_appends_to_history_in_order() {
        let router = reject_router();
        router.bind("ORD1", "111").await;

        router.route_inbound("111", "first").await.unwrap();
        router.route_inbound("111", "second").await.unwrap();

        let history = router.get_history("ORD1").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].body, "first");
        assert_eq!(history[1].body, "second");
        assert_eq!(history[1].direction, Direction::Received);
        assert_eq!(history[1].sender, SenderRole::Courier);
    }

    #[tokio::test]
    async fn test_outbound_provisions_from_pool_and_persists() {
        let router = pool_router(&["555", "666"]);
        let routed = router
            .route_outbound("ORD9", "hello", SenderRole::Customer)
            .await
            .unwrap();
        assert_eq!(routed.instruction.destination_phone, "555");
        assert_eq!(routed.message.delivery, Some(DeliveryStatus::Pending));

        // The provisioned binding persists.
        assert_eq!(router.resolve_or_provision("ORD9").await.unwrap(), "555");
    }

    #[tokio::test]
    async fn test_outbound_fails_without_policy_or_pool() {
        let router = reject_router();
        let err = router
            .route_outbound("ORD1", "hi", SenderRole::Customer)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::NotProvisionable { .. }));

        let router = pool_router(&[]);
        assert!(router.resolve_or_provision("ORD1").await.is_err());
    }

    #[tokio::test]
    async fn test_inbound_recovery_heuristic_binds() {
        let router = reject_router();
        let (job_id, message) = router
            .route_inbound("+49 170 9999", "please check #ORD77")
            .await
            .unwrap();
        assert_eq!(job_id, "ORD77");
        assert_eq!(message.direction, Direction::Received);

        // The implicit binding is now current.
        assert_eq!(router.resolve_or_provision("ORD77").await.unwrap(), "491709999");
    }

    #[tokio::test]
    async fn test_existing_binding_wins_over_heuristic() {
        let router = reject_router();
        router.bind("ORD1", "111").await;

        // Body references another job, but the reverse binding wins.
        let (job_id, _) = router.route_inbound("111", "about #ORD2").await.unwrap();
        assert_eq!(job_id, "ORD1");
        assert!(router.resolve_or_provision("ORD2").await.is_err());
    }

    #[tokio::test]
    async fn test_unroutable_inbound_is_dropped() {
        let router = reject_router();
        assert!(router.route_inbound("999", "no token here").await.is_none());
        assert!(router.bindings().await.is_empty());
        assert!(router.get_history("999").await.is_empty());
    }

    #[tokio::test]
    async fn test_mark_delivery_updates_status() {
        let router = pool_router(&["555"]);
        let routed = router
            .route_outbound("ORD1", "hello", SenderRole::Customer)
            .await
            .unwrap();

        let updated = router
            .mark_delivery("ORD1", routed.message.id, DeliveryStatus::Delivered)
            .await
            .unwrap();
        assert_eq!(updated.delivery, Some(DeliveryStatus::Delivered));

        let history = router.get_history("ORD1").await;
        assert_eq!(history[0].delivery, Some(DeliveryStatus::Delivered));
    }

    #[tokio::test]
    async fn test_mark_delivery_unknown_message_is_none() {
        let router = reject_router();
        let missing = router
            .mark_delivery("ORD1", Uuid::new_v4(), DeliveryStatus::Failed)
            .await;
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_reset_clears_and_reseeds() {
        let router = reject_router();
        router.bind("old", "111").await;
        router.route_inbound("111", "hi").await;

        let seeds = vec![("ORD1".to_string(), "+62 812-1".to_string())];
        router.reset(&seeds).await;

        assert!(router.get_history("old").await.is_empty());
        assert_eq!(router.resolve_or_provision("ORD1").await.unwrap(), "628121");

        // Idempotent.
        router.reset(&seeds).await;
        assert_eq!(router.bindings().await.len(), 1);
    }

    #[tokio::test]
    async fn test_reset_empty_clears_all_history() {
        let router = reject_router();
        router.bind("ORD1", "111").await;
        router.route_inbound("111", "hello").await;

        router.reset(&[]).await;
        assert!(router.get_history("ORD1").await.is_empty());
        assert!(router.bindings().await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_outbound_no_pool_cross_talk() {
        use std::sync::Arc;
        let router = Arc::new(pool_router(&["111", "222"]));

        let a = {
            let router = router.clone();
            tokio::spawn(async move {
                router
                    .route_outbound("jobA", "to A", SenderRole::Customer)
                    .await
                    .unwrap()
            })
        };
        let b = {
            let router = router.clone();
            tokio::spawn(async move {
                router
                    .route_outbound("jobB", "to B", SenderRole::Customer)
                    .await
                    .unwrap()
            })
        };
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        // Sequential selection hands each job its own pool phone; neither
        // binding is corrupted by the other's provisioning.
        assert_ne!(
            a.instruction.destination_phone,
            b.instruction.destination_phone
        );
        assert_eq!(
            router.resolve_or_provision("jobA").await.unwrap(),
            a.instruction.destination_phone
        );
        assert_eq!(
            router.resolve_or_provision("jobB").await.unwrap(),
            b.instruction.destination_phone
        );
        assert_eq!(router.get_history("jobA").await.len(), 1);
        assert_eq!(router.get_history("jobB").await.len(), 1);
    }

    struct FixedLookup;

    #[async_trait]
    impl ContactLookup for FixedLookup {
        async fn contact_for(&self, job_id: &str) -> Option<String> {
            (job_id == "ORD1").then(|| "+62 811 000".to_string())
        }
    }

    #[tokio::test]
    async fn test_job_store_lookup_policy() {
        let router = ContactRouter::new(ProvisionPolicy::JobStoreLookup)
            .with_lookup(Arc::new(FixedLookup));

        assert_eq!(router.resolve_or_provision("ORD1").await.unwrap(), "62811000");
        assert!(router.resolve_or_provision("ORD2").await.is_err());
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+62 812-3456"), "628123456");
        assert_eq!(normalize_phone("628123456"), "628123456");
        assert_eq!(normalize_phone("letters only"), "");
    }
}
