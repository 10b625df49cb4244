//! Two-tier client cache.
//!
//! Keys are either a provider kind (in-process implementations are process
//! singletons, so there is one slot per kind) or a provider resource identity
//! (one slot per remote backend). Each slot has its own async lock; lookup,
//! staleness check, eviction, creation and insertion for a key run under it,
//! while distinct keys proceed in parallel.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::errors::{CloseFailure, Error, Result};
use crate::observability::MetricsRecorder;
use crate::provider::{FindQuery, PushRemoteRef, RemoteRef, SecretMap, SecretsClient, ValidationResult};
use crate::resources::{GenericStore, ProviderKind, StoreKind};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// In-process implementation kind.
    Provider(ProviderKind),
    /// Provider resource identity.
    Remote { name: String, namespace: String },
}

impl CacheKey {
    pub fn remote(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self::Remote { name: name.into(), namespace: namespace.into() }
    }

    /// Metrics label of the tier this key belongs to.
    pub fn tier(&self) -> &'static str {
        match self {
            Self::Provider(_) => "kind",
            Self::Remote { .. } => "remote",
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider(kind) => write!(f, "provider/{}", kind),
            Self::Remote { name, namespace } => write!(f, "remote/{}/{}", namespace, name),
        }
    }
}

/// Identity of the store a kind-keyed client was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub kind: StoreKind,
    pub name: String,
    pub namespace: Option<String>,
    pub generation: i64,
    pub provider: ProviderKind,
}

impl From<&GenericStore> for StoreSnapshot {
    fn from(store: &GenericStore) -> Self {
        Self {
            kind: store.kind,
            name: store.name().to_string(),
            namespace: store.namespace().map(str::to_string),
            generation: store.generation(),
            provider: store.provider_kind(),
        }
    }
}

/// What a cached client was built from; decides reuse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    /// Kind tier: every identity field must be equal.
    Store(StoreSnapshot),
    /// Remote tier: generation only.
    Generation(i64),
}

impl Snapshot {
    pub fn store(store: &GenericStore) -> Self {
        Self::Store(store.into())
    }

    /// Whether a client cached under `self` may serve a request for `fresh`.
    pub fn matches(&self, fresh: &Snapshot) -> bool {
        match (self, fresh) {
            (Self::Store(cached), Self::Store(fresh)) => cached == fresh,
            (Self::Generation(cached), Self::Generation(fresh)) => cached == fresh,
            _ => false,
        }
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(s) => write!(
                f,
                "{} {}/{}@{} ({})",
                s.kind,
                s.namespace.as_deref().unwrap_or("-"),
                s.name,
                s.generation,
                s.provider
            ),
            Self::Generation(generation) => write!(f, "generation {}", generation),
        }
    }
}

/// Shared handle to a cached client.
///
/// Callers get full use of the client but cannot close it: the cache owns
/// teardown, so [`SecretsClient::close`] on a handle is a no-op.
#[derive(Clone)]
pub struct ClientHandle(Arc<dyn SecretsClient>);

impl ClientHandle {
    pub fn new(client: Arc<dyn SecretsClient>) -> Self {
        Self(client)
    }

    /// Whether both handles refer to the same client instance.
    pub fn ptr_eq(&self, other: &ClientHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) async fn close_inner(&self) -> Result<()> {
        self.0.close().await
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClientHandle").field(&self.0).finish()
    }
}

#[async_trait]
impl SecretsClient for ClientHandle {
    async fn get_secret(&self, remote_ref: &RemoteRef) -> Result<Vec<u8>> {
        self.0.get_secret(remote_ref).await
    }

    async fn push_secret(&self, value: &[u8], remote_ref: &PushRemoteRef) -> Result<()> {
        self.0.push_secret(value, remote_ref).await
    }

    async fn delete_secret(&self, remote_ref: &PushRemoteRef) -> Result<()> {
        self.0.delete_secret(remote_ref).await
    }

    async fn secret_exists(&self, remote_ref: &PushRemoteRef) -> Result<bool> {
        self.0.secret_exists(remote_ref).await
    }

    async fn get_all_secrets(&self, find: &FindQuery) -> Result<SecretMap> {
        self.0.get_all_secrets(find).await
    }

    async fn validate(&self) -> Result<ValidationResult> {
        self.0.validate().await
    }

    async fn close(&self) -> Result<()> {
        debug!("Ignoring close on a cached client handle");
        Ok(())
    }
}

#[derive(Debug)]
struct CacheEntry {
    client: ClientHandle,
    snapshot: Snapshot,
}

#[derive(Debug, Default)]
struct Slot {
    entry: Option<CacheEntry>,
    /// Removed from the map by a shutdown sweep; waiters must start over.
    retired: bool,
}

/// Per-key cache of live provider clients.
pub struct ClientCache {
    slots: DashMap<CacheKey, Arc<Mutex<Slot>>>,
    /// Eviction close failures not yet reported by [`ClientCache::close_all`].
    eviction_failures: Mutex<Vec<CloseFailure>>,
    close_timeout: Duration,
    metrics: MetricsRecorder,
}

impl fmt::Debug for ClientCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCache")
            .field("keys", &self.slots.len())
            .field("close_timeout", &self.close_timeout)
            .finish()
    }
}

impl ClientCache {
    pub fn new(close_timeout: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            eviction_failures: Mutex::new(Vec::new()),
            close_timeout,
            metrics: MetricsRecorder::new(),
        }
    }

    /// Number of keys with a slot, including slots left empty by a failed
    /// creation.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether a live client is cached under `key`.
    pub async fn contains(&self, key: &CacheKey) -> bool {
        let slot = match self.slots.get(key) {
            Some(slot) => slot.value().clone(),
            None => return false,
        };
        let guard = slot.lock().await;
        guard.entry.is_some()
    }

    /// Return the client cached under `key` if its snapshot matches, or
    /// close the stale one and build a replacement with `create`.
    ///
    /// A failed `create` leaves the slot empty.
    pub async fn get_or_create<F, Fut>(
        &self,
        key: CacheKey,
        snapshot: Snapshot,
        create: F,
    ) -> Result<ClientHandle>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn SecretsClient>>>,
    {
        let tier = key.tier();
        let mut create = Some(create);

        loop {
            let slot = self.slots.entry(key.clone()).or_default().value().clone();
            let mut guard = slot.lock().await;
            if guard.retired {
                continue;
            }

            if let Some(entry) = guard.entry.as_ref() {
                if entry.snapshot.matches(&snapshot) {
                    debug!(key = %key, snapshot = %entry.snapshot, "Reusing cached provider client");
                    self.metrics.record_cache_hit(tier);
                    return Ok(entry.client.clone());
                }
            }

            if let Some(stale) = guard.entry.take() {
                info!(key = %key, cached = %stale.snapshot, fresh = %snapshot, "Evicting stale provider client");
                self.metrics.record_eviction(tier);
                if let Err(failure) = self.close_entry(&key, &stale.client).await {
                    self.eviction_failures.lock().await.push(failure);
                }
            }

            self.metrics.record_cache_miss(tier);
            let create = match create.take() {
                Some(create) => create,
                None => return Err(Error::internal(format!("client factory for {} already consumed", key))),
            };
            let client = ClientHandle::new(create().await?);

            info!(key = %key, snapshot = %snapshot, "Cached new provider client");
            self.metrics.record_client_created(tier);
            guard.entry = Some(CacheEntry { client: client.clone(), snapshot });
            return Ok(client);
        }
    }

    /// Close one client within the configured timeout.
    async fn close_entry(&self, key: &CacheKey, client: &ClientHandle) -> std::result::Result<(), CloseFailure> {
        let error = match tokio::time::timeout(self.close_timeout, client.close_inner()).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e,
            Err(_) => Error::timeout(format!("closing {}", key), self.close_timeout.as_millis() as u64),
        };
        warn!(key = %key, error = %error, "Failed to close provider client");
        self.metrics.record_close_failure(key.tier());
        Err(CloseFailure { key: key.to_string(), error: error.to_string() })
    }

    /// Close and evict every cached client. Each close runs independently
    /// under the close timeout; every failure, including ones from earlier
    /// evictions, is reported in one [`Error::Shutdown`].
    pub async fn close_all(&self) -> Result<()> {
        let keys: Vec<CacheKey> = self.slots.iter().map(|slot| slot.key().clone()).collect();
        let slots: Vec<(CacheKey, Arc<Mutex<Slot>>)> =
            keys.into_iter().filter_map(|key| self.slots.remove(&key)).collect();

        let closes = slots.into_iter().map(|(key, slot)| async move {
            let mut guard = slot.lock().await;
            guard.retired = true;
            match guard.entry.take() {
                Some(entry) => self.close_entry(&key, &entry.client).await.err(),
                None => None,
            }
        });
        let results = join_all(closes).await;
        let closed = results.len();

        let mut failures = std::mem::take(&mut *self.eviction_failures.lock().await);
        failures.extend(results.into_iter().flatten());

        if failures.is_empty() {
            info!(slots = closed, "Closed all provider clients");
            Ok(())
        } else {
            warn!(slots = closed, failures = failures.len(), "Provider client shutdown finished with errors");
            Err(Error::Shutdown { failures })
        }
    }
}
