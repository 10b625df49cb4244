//! # Provider Factory
//!
//! In-process backend implementations are a closed set selected by
//! [`ProviderKind`]: the tag of the store's provider union picks the
//! registered [`Provider`], which builds a [`SecretsClient`].

pub mod client;
pub mod fake;
pub mod generator;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::errors::{Error, Result};
use crate::resources::{Capabilities, GenericStore, ProviderKind};
use crate::store::ObjectStore;

pub use client::{FindQuery, PushRemoteRef, RemoteRef, SecretMap, SecretsClient, ValidationResult};
pub use fake::FakeProvider;
pub use generator::{FakeGenerator, GeneratedSecret, Generator};

/// One in-process backend implementation.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Kind this implementation serves.
    fn kind(&self) -> ProviderKind;

    fn capabilities(&self, store: &GenericStore) -> Capabilities;

    /// Reject configurations this implementation cannot use.
    fn validate_store(&self, store: &GenericStore) -> Result<()>;

    async fn new_client(
        &self,
        store: &GenericStore,
        object_store: Arc<dyn ObjectStore>,
        namespace: &str,
    ) -> Result<Arc<dyn SecretsClient>>;
}

/// Registry of in-process implementations.
#[derive(Clone)]
pub struct ProviderFactory {
    providers: HashMap<ProviderKind, Arc<dyn Provider>>,
    object_store: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds = self.registered_kinds();
        kinds.sort();
        f.debug_struct("ProviderFactory").field("providers", &kinds).finish()
    }
}

impl ProviderFactory {
    pub fn new(object_store: Arc<dyn ObjectStore>) -> Self {
        Self { providers: HashMap::new(), object_store }
    }

    /// Register an implementation, replacing any previous one of the same kind.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        let kind = provider.kind();
        info!(provider = %kind, "Registering provider implementation");
        self.providers.insert(kind, provider);
    }

    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.register(provider);
        self
    }

    pub fn has_provider(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    pub fn registered_kinds(&self) -> Vec<ProviderKind> {
        self.providers.keys().copied().collect()
    }

    pub fn object_store(&self) -> Arc<dyn ObjectStore> {
        self.object_store.clone()
    }

    pub fn provider(&self, kind: ProviderKind) -> Result<Arc<dyn Provider>> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::config(format!("no provider implementation registered for kind {}", kind)))
    }

    /// Build a client for `store` on behalf of a consumer in `namespace`.
    pub async fn new_client(&self, store: &GenericStore, namespace: &str) -> Result<Arc<dyn SecretsClient>> {
        let provider = self.provider(store.provider_kind())?;
        provider.validate_store(store)?;
        debug!(
            provider = %store.provider_kind(),
            store = %store.name(),
            namespace = %namespace,
            "Constructing provider client"
        );
        provider.new_client(store, self.object_store.clone(), namespace).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{FakeProviderSpec, ObjectMeta, SecretStoreSpec, StoreKind, StoreProvider};
    use crate::store::InMemoryObjectStore;

    fn store(provider: StoreProvider) -> GenericStore {
        GenericStore::new(StoreKind::SecretStore, ObjectMeta::namespaced("s", "ns"), SecretStoreSpec::new(provider))
    }

    #[tokio::test]
    async fn test_dispatch_by_kind() {
        let factory = ProviderFactory::new(Arc::new(InMemoryObjectStore::new()))
            .with_provider(Arc::new(FakeProvider::new()));
        assert!(factory.has_provider(ProviderKind::Fake));

        let client = factory
            .new_client(&store(StoreProvider::Fake(FakeProviderSpec::default())), "ns")
            .await
            .unwrap();
        assert_eq!(client.validate().await.unwrap(), ValidationResult::Ready);
    }

    #[tokio::test]
    async fn test_unregistered_kind_is_config_error() {
        let factory = ProviderFactory::new(Arc::new(InMemoryObjectStore::new()));
        let err = factory
            .new_client(&store(StoreProvider::Vault(serde_json::json!({}))), "ns")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("vault"));
    }
}
