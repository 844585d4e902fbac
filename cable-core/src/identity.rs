// ABOUTME: Short-lived identity cache used by adapters to resolve user ids to display names
// ABOUTME: Whole-map swaps behind a mutex, cleared by a one-shot timer after a fixed TTL

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// How long a fetched identity map is served before it is cleared
pub const DEFAULT_IDENTITY_TTL: Duration = Duration::from_secs(60);

/// Display identity of a backend user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Full display name (e.g., "Will Smith")
    pub name: String,
    /// Handle or username (e.g., "freshprince")
    pub handle: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handle: handle.into(),
        }
    }
}

/// Identities indexed by backend user id
pub type IdentityMap = HashMap<String, Identity>;

/// Backend call that lists the identities the cache serves
#[async_trait]
pub trait IdentitySource: Send + Sync + 'static {
    async fn fetch_identities(&self) -> Result<IdentityMap>;
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    map: Option<Arc<IdentityMap>>,
}

/// Lazily populated, TTL-bound identity cache owned by one adapter.
///
/// Concurrent misses may both fetch; the last one wins. Readers always get a
/// complete map because the map is replaced as a whole.
pub struct IdentityCache<S> {
    source: S,
    ttl: Duration,
    slot: Arc<Mutex<Slot>>,
}

impl<S: IdentitySource> IdentityCache<S> {
    pub fn new(source: S) -> Self {
        Self::with_ttl(source, DEFAULT_IDENTITY_TTL)
    }

    pub fn with_ttl(source: S, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached identities, fetching them from the source on a miss.
    ///
    /// A failed fetch is logged and yields an empty map that is not cached, so
    /// the next call tries again.
    pub async fn get_identities(&self) -> Arc<IdentityMap> {
        if let Some(map) = self.cached() {
            return map;
        }

        tracing::debug!("Populating identity cache");
        let map = match self.source.fetch_identities().await {
            Ok(map) => Arc::new(map),
            Err(e) => {
                tracing::error!(error = %e, "Cannot fetch user identities");
                return Arc::new(IdentityMap::new());
            }
        };

        let generation = {
            let mut slot = lock(&self.slot);
            slot.generation += 1;
            slot.map = Some(Arc::clone(&map));
            slot.generation
        };
        self.schedule_clear(generation);

        map
    }

    /// Look up one user id
    pub async fn resolve(&self, user_id: &str) -> Option<Identity> {
        self.get_identities().await.get(user_id).cloned()
    }

    /// Whether a map is currently cached
    pub fn is_cached(&self) -> bool {
        lock(&self.slot).map.is_some()
    }

    /// Drop the cached map now
    pub fn invalidate(&self) {
        lock(&self.slot).map = None;
    }

    fn cached(&self) -> Option<Arc<IdentityMap>> {
        lock(&self.slot).map.clone()
    }

    /// Clear `generation` after the TTL. A newer generation is left alone.
    fn schedule_clear(&self, generation: u64) {
        let slot = Arc::downgrade(&self.slot);
        let ttl = self.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let Some(slot) = slot.upgrade() else {
                return;
            };
            let mut slot = lock(&slot);
            if slot.generation == generation {
                tracing::debug!("Clearing identity cache");
                slot.map = None;
            }
        });
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
