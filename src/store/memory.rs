//! In-memory object store.
//!
//! Backs the adapter binary (loaded from manifests) and the tests. Writes go
//! through `apply_*`, which maintain generations the way the control plane
//! does: a new object starts at generation 1 and every spec change bumps it.

use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

use super::manifest::{parse_manifests, Manifest};
use super::{DynamicObject, ObjectStore};
use crate::errors::{Error, Result};
use crate::resources::{
    GenericStore, Namespace, ProviderResource, SecretObject, SecretStoreStatus, StoreKind,
    NAMESPACE_NAME_LABEL,
};

type NamespacedKey = (String, String);

#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    stores: DashMap<(StoreKind, String, String), GenericStore>,
    namespaces: DashMap<String, Namespace>,
    providers: DashMap<NamespacedKey, ProviderResource>,
    secrets: DashMap<NamespacedKey, SecretObject>,
    resources: DashMap<(String, String, String, String), DynamicObject>,
}

fn next_generation(previous: Option<i64>, requested: i64, changed: bool) -> i64 {
    match previous {
        None => requested.max(1),
        Some(generation) if changed => generation + 1,
        Some(generation) => generation,
    }
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from every `*.yaml`/`*.yml` file in `dir`, in file name order.
    pub async fn from_manifest_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let store = Self::new();
        store.load_manifests(dir).await?;
        Ok(store)
    }

    /// Apply every manifest found in `dir`. Returns the number of objects applied.
    pub async fn load_manifests(&self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| Error::Io {
            source: e,
            context: format!("Failed to read manifest directory {}", dir.display()),
        })?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_yaml = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "yaml" || ext == "yml");
            if is_yaml {
                paths.push(path);
            }
        }
        paths.sort();

        let mut applied = 0;
        for path in paths {
            let text = tokio::fs::read_to_string(&path).await.map_err(|e| Error::Io {
                source: e,
                context: format!("Failed to read manifest {}", path.display()),
            })?;
            let manifests = parse_manifests(&text, &path.display().to_string())?;
            debug!(path = %path.display(), objects = manifests.len(), "Parsed manifest file");
            applied += manifests.len();
            for manifest in manifests {
                self.apply(manifest);
            }
        }

        info!(dir = %dir.display(), objects = applied, "Loaded manifests into object store");
        Ok(applied)
    }

    pub fn apply(&self, manifest: Manifest) {
        match manifest {
            Manifest::Store(store) => {
                self.apply_store(store);
            }
            Manifest::Namespace(namespace) => {
                self.apply_namespace(namespace);
            }
            Manifest::Provider(provider) => {
                self.apply_provider(provider);
            }
            Manifest::Secret(secret) => self.apply_secret(secret),
            Manifest::Resource(object) => self.apply_resource(object),
        }
    }

    /// Create or update a backend configuration; returns the stored copy.
    /// Status is replaced as given and never bumps the generation.
    pub fn apply_store(&self, mut store: GenericStore) -> GenericStore {
        if store.kind.is_cluster_scoped() {
            store.metadata.namespace = None;
        }
        let key = (
            store.kind,
            store.metadata.namespace.clone().unwrap_or_default(),
            store.metadata.name.clone(),
        );
        let previous = self.stores.get(&key);
        let changed = previous.as_ref().is_some_and(|p| p.spec != store.spec);
        store.metadata.generation = next_generation(
            previous.as_ref().map(|p| p.metadata.generation),
            store.metadata.generation,
            changed,
        );
        drop(previous);

        self.stores.insert(key, store.clone());
        store
    }

    /// Replace only the status of an existing configuration.
    pub fn set_store_status(
        &self,
        kind: StoreKind,
        name: &str,
        namespace: Option<&str>,
        status: SecretStoreStatus,
    ) -> Result<()> {
        let key = store_key(kind, name, namespace);
        let mut entry = self
            .stores
            .get_mut(&key)
            .ok_or_else(|| Error::not_found(kind.as_str(), name))?;
        entry.status = status;
        Ok(())
    }

    /// Create or update a namespace. The name label is always kept in sync.
    pub fn apply_namespace(&self, mut namespace: Namespace) -> Namespace {
        namespace
            .metadata
            .labels
            .insert(NAMESPACE_NAME_LABEL.to_string(), namespace.metadata.name.clone());
        self.namespaces.insert(namespace.metadata.name.clone(), namespace.clone());
        namespace
    }

    pub fn apply_provider(&self, mut provider: ProviderResource) -> ProviderResource {
        let key = (
            provider.metadata.namespace.clone().unwrap_or_default(),
            provider.metadata.name.clone(),
        );
        let previous = self.providers.get(&key);
        let changed = previous.as_ref().is_some_and(|p| p.spec != provider.spec);
        provider.metadata.generation = next_generation(
            previous.as_ref().map(|p| p.metadata.generation),
            provider.metadata.generation,
            changed,
        );
        drop(previous);

        self.providers.insert(key, provider.clone());
        provider
    }

    pub fn apply_secret(&self, secret: SecretObject) {
        let key = (
            secret.metadata.namespace.clone().unwrap_or_default(),
            secret.metadata.name.clone(),
        );
        self.secrets.insert(key, secret);
    }

    pub fn apply_resource(&self, object: DynamicObject) {
        let key = (
            object.api_version.clone(),
            object.kind.clone(),
            object.metadata.namespace.clone().unwrap_or_default(),
            object.metadata.name.clone(),
        );
        self.resources.insert(key, object);
    }

    pub fn delete_store(&self, kind: StoreKind, name: &str, namespace: Option<&str>) -> bool {
        self.stores.remove(&store_key(kind, name, namespace)).is_some()
    }

    pub fn delete_provider(&self, name: &str, namespace: &str) -> bool {
        self.providers.remove(&(namespace.to_string(), name.to_string())).is_some()
    }
}

fn store_key(kind: StoreKind, name: &str, namespace: Option<&str>) -> (StoreKind, String, String) {
    let namespace = if kind.is_cluster_scoped() { "" } else { namespace.unwrap_or_default() };
    (kind, namespace.to_string(), name.to_string())
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get_store(
        &self,
        kind: StoreKind,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<Option<GenericStore>> {
        Ok(self.stores.get(&store_key(kind, name, namespace)).map(|s| s.clone()))
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>> {
        Ok(self.namespaces.get(name).map(|n| n.clone()))
    }

    async fn get_provider(&self, name: &str, namespace: &str) -> Result<Option<ProviderResource>> {
        Ok(self.providers.get(&(namespace.to_string(), name.to_string())).map(|p| p.clone()))
    }

    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Option<SecretObject>> {
        Ok(self.secrets.get(&(namespace.to_string(), name.to_string())).map(|s| s.clone()))
    }

    async fn get_resource(
        &self,
        api_version: &str,
        kind: &str,
        name: &str,
        namespace: &str,
    ) -> Result<Option<DynamicObject>> {
        let key = (
            api_version.to_string(),
            kind.to_string(),
            namespace.to_string(),
            name.to_string(),
        );
        Ok(self.resources.get(&key).map(|o| o.clone()))
    }
}
