//! TTL cache over the engine's capability discovery endpoints.
//!
//! Node and credential type lists change rarely; callers read through this
//! cache instead of hitting the engine on every pipeline run. A failed
//! credential-type refresh yields `None` rather than an error so the
//! validator can downgrade its credential rule instead of false-failing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use clixen_core::spec::NodeKind;
use tokio::sync::RwLock;

use crate::api::EngineApi;

/// Default time-to-live for cached capability lists.
pub const DEFAULT_CAPABILITY_TTL: Duration = Duration::from_secs(300);

struct CachedList {
    values: Vec<String>,
    fetched_at: Instant,
}

/// Read-through cache for node and credential type discovery.
pub struct CapabilityCache {
    api: Arc<dyn EngineApi>,
    ttl: Duration,
    node_types: RwLock<Option<CachedList>>,
    credential_types: RwLock<Option<CachedList>>,
}

impl CapabilityCache {
    pub fn new(api: Arc<dyn EngineApi>) -> Self {
        Self::with_ttl(api, DEFAULT_CAPABILITY_TTL)
    }

    pub fn with_ttl(api: Arc<dyn EngineApi>, ttl: Duration) -> Self {
        Self {
            api,
            ttl,
            node_types: RwLock::new(None),
            credential_types: RwLock::new(None),
        }
    }

    /// Node kinds deployable right now: the intersection of the closed
    /// [`NodeKind`] set with what the engine reports installed.
    ///
    /// Falls back to the full closed set when discovery fails, so a flaky
    /// discovery endpoint degrades to optimistic generation rather than a
    /// hard outage; validation still gates deployment.
    pub async fn allowed_kinds(&self) -> Vec<NodeKind> {
        match self.node_type_names().await {
            Some(names) => {
                let allowed: Vec<NodeKind> = NodeKind::all()
                    .iter()
                    .copied()
                    .filter(|kind| names.iter().any(|n| n == kind.engine_type()))
                    .collect();
                if allowed.is_empty() {
                    NodeKind::all().to_vec()
                } else {
                    allowed
                }
            }
            None => NodeKind::all().to_vec(),
        }
    }

    /// Engine node type strings, refreshed when stale. `None` when the
    /// engine could not be reached and no fresh value is cached.
    pub async fn node_type_names(&self) -> Option<Vec<String>> {
        read_through(&self.node_types, self.ttl, || self.api.list_node_types()).await
    }

    /// Engine credential type strings, refreshed when stale.
    pub async fn credential_type_names(&self) -> Option<Vec<String>> {
        read_through(&self.credential_types, self.ttl, || {
            self.api.list_credential_types()
        })
        .await
    }
}

/// Return the cached list when fresh; otherwise fetch and cache. A fetch
/// failure with a stale cache entry serves the stale value.
async fn read_through<F, Fut>(
    slot: &RwLock<Option<CachedList>>,
    ttl: Duration,
    fetch: F,
) -> Option<Vec<String>>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<Vec<String>, crate::api::EngineApiError>>,
{
    {
        let guard = slot.read().await;
        if let Some(cached) = guard.as_ref() {
            if cached.fetched_at.elapsed() < ttl {
                return Some(cached.values.clone());
            }
        }
    }

    match fetch().await {
        Ok(values) => {
            let mut guard = slot.write().await;
            *guard = Some(CachedList {
                values: values.clone(),
                fetched_at: Instant::now(),
            });
            Some(values)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Capability discovery failed");
            let guard = slot.read().await;
            guard.as_ref().map(|cached| cached.values.clone())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::api::{CreatedWorkflow, EngineApiError};

    /// Engine stub that counts discovery calls and can be told to fail.
    struct StubEngine {
        node_calls: AtomicUsize,
        cred_calls: AtomicUsize,
        fail: bool,
    }

    impl StubEngine {
        fn new(fail: bool) -> Self {
            Self {
                node_calls: AtomicUsize::new(0),
                cred_calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait::async_trait]
    impl EngineApi for StubEngine {
        async fn create_workflow(
            &self,
            _workflow: &serde_json::Value,
        ) -> Result<CreatedWorkflow, EngineApiError> {
            unimplemented!("not used in capability tests")
        }

        async fn activate_workflow(&self, _workflow_id: &str) -> Result<(), EngineApiError> {
            unimplemented!("not used in capability tests")
        }

        async fn list_node_types(&self) -> Result<Vec<String>, EngineApiError> {
            self.node_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EngineApiError::Shape("down".into()));
            }
            Ok(vec![
                "n8n-nodes-base.webhook".into(),
                "n8n-nodes-base.scheduleTrigger".into(),
                "n8n-nodes-base.httpRequest".into(),
                "some-community-node.custom".into(),
            ])
        }

        async fn list_credential_types(&self) -> Result<Vec<String>, EngineApiError> {
            self.cred_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EngineApiError::Shape("down".into()));
            }
            Ok(vec!["smtp".into(), "slackApi".into()])
        }
    }

    #[tokio::test]
    async fn second_read_within_ttl_hits_cache() {
        let engine = Arc::new(StubEngine::new(false));
        let cache = CapabilityCache::new(engine.clone());

        cache.node_type_names().await;
        cache.node_type_names().await;
        assert_eq!(engine.node_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_ttl_refetches() {
        let engine = Arc::new(StubEngine::new(false));
        let cache = CapabilityCache::with_ttl(engine.clone(), Duration::ZERO);

        cache.credential_type_names().await;
        cache.credential_type_names().await;
        assert_eq!(engine.cred_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn allowed_kinds_intersects_with_engine_types() {
        let engine = Arc::new(StubEngine::new(false));
        let cache = CapabilityCache::new(engine);

        let kinds = cache.allowed_kinds().await;
        assert!(kinds.contains(&NodeKind::WebhookTrigger));
        assert!(kinds.contains(&NodeKind::HttpRequest));
        assert!(!kinds.contains(&NodeKind::Slack));
    }

    #[tokio::test]
    async fn discovery_failure_falls_back_to_full_kind_set() {
        let engine = Arc::new(StubEngine::new(true));
        let cache = CapabilityCache::new(engine);

        assert_eq!(cache.allowed_kinds().await, NodeKind::all().to_vec());
        assert_eq!(cache.credential_type_names().await, None);
    }
}
