//! # Provider Client Manager
//!
//! Entry point the reconciliation workers call into: resolve the store a
//! request refers to, run the access gate, then hand out a cached client or
//! build one. The manager alone closes clients.

pub mod cache;

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::access::AccessGate;
use crate::adapter::{GrpcConnector, RemoteConnector};
use crate::config::ManagerConfig;
use crate::errors::{Error, Result};
use crate::provider::ProviderFactory;
use crate::resources::{GenericStore, StoreRef, StoreRefKind};
use crate::store::{ObjectStore, StoreResolver};
use crate::transport::TransportBootstrap;

pub use cache::{CacheKey, ClientCache, ClientHandle, Snapshot, StoreSnapshot};

pub struct ClientManager {
    object_store: Arc<dyn ObjectStore>,
    resolver: StoreResolver,
    gate: AccessGate,
    factory: ProviderFactory,
    connector: Arc<dyn RemoteConnector>,
    cache: ClientCache,
}

impl std::fmt::Debug for ClientManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientManager")
            .field("gate", &self.gate)
            .field("factory", &self.factory)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl ClientManager {
    /// Manager that dials out-of-process providers over gRPC with the
    /// transport and timeouts from `config`.
    pub fn from_config(
        object_store: Arc<dyn ObjectStore>,
        factory: ProviderFactory,
        config: &ManagerConfig,
    ) -> Self {
        let bootstrap = TransportBootstrap::new(object_store.clone(), config.transport_settings());
        let connector = GrpcConnector::new(bootstrap, config.request_timeout());
        Self::new(object_store, factory, Arc::new(connector), config)
    }

    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        factory: ProviderFactory,
        connector: Arc<dyn RemoteConnector>,
        config: &ManagerConfig,
    ) -> Self {
        Self {
            resolver: StoreResolver::new(object_store.clone()),
            gate: AccessGate::new(
                object_store.clone(),
                config.controller_class.clone(),
                config.enable_floodgate,
            ),
            object_store,
            factory,
            connector,
            cache: ClientCache::new(config.close_timeout()),
        }
    }

    pub fn cache(&self) -> &ClientCache {
        &self.cache
    }

    /// Client for the store (or provider resource) `store_ref` names, used on
    /// behalf of a consumer in `namespace`. `source_ref` overrides `store_ref`.
    #[instrument(skip(self))]
    pub async fn get_client(
        &self,
        store_ref: &StoreRef,
        namespace: &str,
        source_ref: Option<&StoreRef>,
    ) -> Result<ClientHandle> {
        if store_ref.kind == StoreRefKind::Provider {
            return self.get_provider_client(&store_ref.name, namespace).await;
        }

        let effective = source_ref.unwrap_or(store_ref);
        if effective.kind == StoreRefKind::Provider {
            return self.get_provider_client(&effective.name, namespace).await;
        }

        let store = self.resolver.resolve(effective, namespace).await?;
        self.gate.check_ownership(&store)?;
        self.gate.authorize(&store, namespace).await?;
        self.get_from_store(&store, namespace).await
    }

    /// Cache lookup and construction for an already resolved and authorized
    /// store. Clients are keyed by provider kind, so at most one in-process
    /// client per kind is ever live.
    pub async fn get_from_store(&self, store: &GenericStore, namespace: &str) -> Result<ClientHandle> {
        let key = CacheKey::Provider(store.provider_kind());
        self.cache
            .get_or_create(key, Snapshot::store(store), || self.factory.new_client(store, namespace))
            .await
    }

    /// Client for a provider resource served out of process. Reused while the
    /// resource generation is unchanged.
    #[instrument(skip(self))]
    pub async fn get_provider_client(&self, name: &str, namespace: &str) -> Result<ClientHandle> {
        let provider = self
            .object_store
            .get_provider(name, namespace)
            .await?
            .ok_or_else(|| Error::not_found("Provider", format!("{}/{}", namespace, name)))?;

        let key = CacheKey::remote(name, namespace);
        let connector = self.connector.clone();
        self.cache
            .get_or_create(key, Snapshot::Generation(provider.generation()), || async move {
                let address = provider.address();
                if address.is_empty() {
                    return Err(Error::config(format!(
                        "provider {}/{} has no address",
                        namespace,
                        provider.name()
                    )));
                }
                debug!(
                    provider = %provider.name(),
                    address = %address,
                    generation = provider.generation(),
                    "Connecting to out-of-process provider"
                );
                connector.connect(address, provider.provider_ref(), namespace).await
            })
            .await
    }

    /// Close every cached client. See [`ClientCache::close_all`].
    pub async fn close_all(&self) -> Result<()> {
        self.cache.close_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{FakeProvider, RemoteRef, SecretsClient};
    use crate::resources::{
        FakeProviderData, FakeProviderSpec, ObjectMeta, ProviderKind, ProviderRef, ProviderResource,
        SecretStoreSpec, StoreKind, StoreProvider,
    };
    use crate::store::InMemoryObjectStore;
    use async_trait::async_trait;

    struct NoRemote;

    #[async_trait]
    impl RemoteConnector for NoRemote {
        async fn connect(
            &self,
            address: &str,
            _provider_ref: &ProviderRef,
            _source_namespace: &str,
        ) -> Result<Arc<dyn SecretsClient>> {
            Err(Error::connection(format!("cannot dial {}", address)))
        }
    }

    fn fake_store(name: &str, namespace: &str) -> GenericStore {
        GenericStore::new(
            StoreKind::SecretStore,
            ObjectMeta::namespaced(name, namespace),
            SecretStoreSpec::new(StoreProvider::Fake(FakeProviderSpec {
                data: vec![FakeProviderData { key: "db".into(), value: "hunter2".into(), version: None }],
            })),
        )
    }

    fn manager(objects: Arc<InMemoryObjectStore>) -> ClientManager {
        let factory = ProviderFactory::new(objects.clone()).with_provider(Arc::new(FakeProvider));
        ClientManager::new(objects, factory, Arc::new(NoRemote), &ManagerConfig::default())
    }

    #[tokio::test]
    async fn test_get_client_reads_through_fake() {
        let objects = Arc::new(InMemoryObjectStore::new());
        objects.apply_store(fake_store("fake", "default"));
        let manager = manager(objects);

        let client = manager.get_client(&StoreRef::secret_store("fake"), "default", None).await.unwrap();
        assert_eq!(client.get_secret(&RemoteRef::new("db")).await.unwrap(), b"hunter2");
        assert!(manager.cache().contains(&CacheKey::Provider(ProviderKind::Fake)).await);
    }

    #[tokio::test]
    async fn test_source_ref_overrides_store_ref() {
        let objects = Arc::new(InMemoryObjectStore::new());
        objects.apply_store(fake_store("override", "default"));
        let manager = manager(objects);

        let client = manager
            .get_client(
                &StoreRef::secret_store("missing"),
                "default",
                Some(&StoreRef::secret_store("override")),
            )
            .await
            .unwrap();
        assert!(client.validate().await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_store_is_not_found() {
        let manager = manager(Arc::new(InMemoryObjectStore::new()));
        let err = manager.get_client(&StoreRef::secret_store("nope"), "default", None).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert!(manager.cache().is_empty());
    }

    #[tokio::test]
    async fn test_provider_ref_with_failed_dial_is_not_cached() {
        let objects = Arc::new(InMemoryObjectStore::new());
        objects.apply_provider(ProviderResource::new(
            ObjectMeta::namespaced("aws", "default"),
            "aws-provider:8080",
            ProviderRef {
                api_version: "provider.secretlink.io/v1alpha1".into(),
                kind: "Fake".into(),
                name: "aws".into(),
                namespace: String::new(),
            },
        ));
        let manager = manager(objects);

        let err = manager.get_client(&StoreRef::provider("aws"), "default", None).await.unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
        assert!(!manager.cache().contains(&CacheKey::remote("aws", "default")).await);
    }
}
