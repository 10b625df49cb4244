//! Store Resolver.

use std::sync::Arc;

use tracing::debug;

use super::ObjectStore;
use crate::errors::{Error, Result};
use crate::resources::{GenericStore, StoreRef};

/// Fetches the configuration a [`StoreRef`] points at. Never caches, so a
/// resolution always reflects the latest generation.
#[derive(Clone)]
pub struct StoreResolver {
    object_store: Arc<dyn ObjectStore>,
}

impl StoreResolver {
    pub fn new(object_store: Arc<dyn ObjectStore>) -> Self {
        Self { object_store }
    }

    /// Resolve `store_ref` on behalf of a consumer in `namespace`.
    ///
    /// Namespaced references always resolve inside the caller's namespace;
    /// cluster-scoped references carry none.
    pub async fn resolve(&self, store_ref: &StoreRef, namespace: &str) -> Result<GenericStore> {
        let kind = store_ref.kind.store_kind().ok_or_else(|| {
            Error::config(format!(
                "reference {:?} designates a provider resource, not a store",
                store_ref.name
            ))
        })?;
        let scope = (!kind.is_cluster_scoped()).then_some(namespace);

        let store = self
            .object_store
            .get_store(kind, &store_ref.name, scope)
            .await
            .map_err(|e| match e {
                e @ Error::Internal { .. } => e,
                other => Error::internal_with_source(
                    format!("failed to fetch {} {:?}", kind, store_ref.name),
                    Box::new(other),
                ),
            })?
            .ok_or_else(|| {
                let id = match scope {
                    Some(ns) => format!("{}/{}", ns, store_ref.name),
                    None => store_ref.name.clone(),
                };
                Error::not_found(kind.as_str(), id)
            })?;

        debug!(
            store = %store.name(),
            kind = %store.kind,
            namespace = %namespace,
            generation = store.generation(),
            "Resolved store"
        );
        Ok(store)
    }
}

impl std::fmt::Debug for StoreResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreResolver").finish_non_exhaustive()
    }
}
