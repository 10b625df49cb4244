//! # Access Gate
//!
//! Checks that run between resolving a configuration and handing out a
//! client for it:
//!
//! - ownership: the configuration is claimed by this controller class,
//! - namespace authorization: cluster-scoped configurations may restrict
//!   which namespaces use them,
//! - readiness (the "floodgate"): optionally require `Ready=True`.

pub mod conditions;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::{Error, Result};
use crate::resources::{GenericStore, StoreKind};
use crate::store::ObjectStore;

pub use conditions::{condition_admits, NamespacePredicate};

/// Whether a controller running as `controller_class` should act on `store`.
/// An empty class on the store means any controller may.
pub fn should_process_store(store: &GenericStore, controller_class: &str) -> bool {
    store.spec.controller.is_empty() || store.spec.controller == controller_class
}

#[derive(Clone)]
pub struct AccessGate {
    object_store: Arc<dyn ObjectStore>,
    controller_class: String,
    enable_floodgate: bool,
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("controller_class", &self.controller_class)
            .field("enable_floodgate", &self.enable_floodgate)
            .finish()
    }
}

impl AccessGate {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        controller_class: impl Into<String>,
        enable_floodgate: bool,
    ) -> Self {
        Self { object_store, controller_class: controller_class.into(), enable_floodgate }
    }

    pub fn controller_class(&self) -> &str {
        &self.controller_class
    }

    /// Ownership check. Not part of [`AccessGate::authorize`] because it runs
    /// before the gate proper.
    pub fn check_ownership(&self, store: &GenericStore) -> Result<()> {
        if should_process_store(store, &self.controller_class) {
            return Ok(());
        }
        warn!(
            store = %store.name(),
            kind = %store.kind,
            store_controller = %store.spec.controller,
            controller_class = %self.controller_class,
            "Refusing store owned by another controller"
        );
        Err(Error::access_denied("cannot reference unmanaged store"))
    }

    /// Namespace authorization followed by the readiness gate when enabled.
    pub async fn authorize(&self, store: &GenericStore, namespace: &str) -> Result<()> {
        self.authorize_namespace(store, namespace).await?;
        if self.enable_floodgate {
            check_readiness(store)?;
        }
        Ok(())
    }

    /// Evaluate the access conditions of a cluster-scoped configuration for
    /// a consumer in `namespace`. Any predicate of any condition admits it;
    /// conditions and their predicates are tried in order.
    pub async fn authorize_namespace(&self, store: &GenericStore, namespace: &str) -> Result<()> {
        if store.kind != StoreKind::ClusterSecretStore || store.access_conditions().is_empty() {
            return Ok(());
        }

        let ns = self
            .object_store
            .get_namespace(namespace)
            .await?
            .ok_or_else(|| Error::not_found("Namespace", namespace))?;

        for condition in store.access_conditions() {
            if condition_admits(condition, &ns)? {
                debug!(store = %store.name(), namespace = %namespace, "Namespace admitted by store condition");
                return Ok(());
            }
        }

        debug!(store = %store.name(), namespace = %namespace, "No store condition admits namespace");
        Err(Error::access_denied(format!(
            "using cluster store {:?} is not allowed from namespace {:?}: denied by spec.condition",
            store.name(),
            namespace
        )))
    }
}

/// Require the store's `Ready` condition to be `True`.
pub fn check_readiness(store: &GenericStore) -> Result<()> {
    if store.is_ready() {
        Ok(())
    } else {
        Err(Error::not_ready(store.kind.as_str(), store.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{
        ClusterSecretStoreCondition, ConditionStatus, FakeProviderSpec, LabelSelector, Namespace,
        ObjectMeta, SecretStoreSpec, StoreProvider, StoreStatusCondition,
    };
    use crate::store::InMemoryObjectStore;

    fn cluster_store(conditions: Vec<ClusterSecretStoreCondition>) -> GenericStore {
        let mut spec = SecretStoreSpec::new(StoreProvider::Fake(FakeProviderSpec::default()));
        spec.conditions = conditions;
        GenericStore::new(StoreKind::ClusterSecretStore, ObjectMeta::new("shared"), spec)
    }

    fn gate(floodgate: bool) -> AccessGate {
        let objects = Arc::new(InMemoryObjectStore::new());
        objects.apply_namespace(Namespace::new("payments").with_labels([("team", "payments")]));
        objects.apply_namespace(Namespace::new("search"));
        objects.apply_namespace(Namespace::new("prod-a"));
        objects.apply_namespace(Namespace::new("staging"));
        AccessGate::new(objects, "team-a", floodgate)
    }

    #[test]
    fn test_ownership() {
        let gate = gate(false);
        let mut store = cluster_store(vec![]);
        assert!(gate.check_ownership(&store).is_ok());

        store.spec.controller = "team-a".into();
        assert!(gate.check_ownership(&store).is_ok());

        store.spec.controller = "team-b".into();
        let err = gate.check_ownership(&store).unwrap_err();
        assert!(matches!(err, Error::AccessDenied { .. }));
        assert!(err.to_string().contains("cannot reference unmanaged store"));
    }

    #[tokio::test]
    async fn test_no_conditions_allows_everyone() {
        let gate = gate(false);
        let store = cluster_store(vec![]);
        for ns in ["payments", "search", "does-not-exist"] {
            assert!(gate.authorize(&store, ns).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_any_condition_admits() {
        let gate = gate(false);
        let store = cluster_store(vec![
            ClusterSecretStoreCondition {
                namespace_selector: Some(LabelSelector::matching_labels([("team", "payments")])),
                ..Default::default()
            },
            ClusterSecretStoreCondition {
                namespaces: vec!["search".into()],
                ..Default::default()
            },
        ]);
        assert!(gate.authorize(&store, "payments").await.is_ok());
        assert!(gate.authorize(&store, "search").await.is_ok());
        let err = gate.authorize(&store, "staging").await.unwrap_err();
        assert!(matches!(err, Error::AccessDenied { .. }));
    }

    #[tokio::test]
    async fn test_namespaced_store_skips_conditions() {
        let gate = gate(false);
        let mut store = cluster_store(vec![ClusterSecretStoreCondition {
            namespaces: vec!["nobody".into()],
            ..Default::default()
        }]);
        store.kind = StoreKind::SecretStore;
        assert!(gate.authorize(&store, "payments").await.is_ok());
    }

    #[tokio::test]
    async fn test_malformed_regex_is_internal() {
        let gate = gate(false);
        let store = cluster_store(vec![ClusterSecretStoreCondition {
            namespace_regexes: vec!["([".into()],
            ..Default::default()
        }]);
        let err = gate.authorize(&store, "payments").await.unwrap_err();
        assert!(matches!(err, Error::Internal { .. }));
    }

    #[tokio::test]
    async fn test_selector_match_admits_despite_later_malformed_regex() {
        let gate = gate(false);
        let store = cluster_store(vec![ClusterSecretStoreCondition {
            namespace_selector: Some(LabelSelector::matching_labels([("team", "payments")])),
            namespace_regexes: vec!["([".into()],
            ..Default::default()
        }]);
        assert!(gate.authorize(&store, "payments").await.is_ok());
        assert!(matches!(gate.authorize(&store, "search").await.unwrap_err(), Error::Internal { .. }));
    }

    #[tokio::test]
    async fn test_floodgate() {
        let mut store = cluster_store(vec![]);
        assert!(gate(false).authorize(&store, "payments").await.is_ok());

        let err = gate(true).authorize(&store, "payments").await.unwrap_err();
        assert!(matches!(err, Error::NotReady { .. }));
        assert!(err.to_string().contains("ClusterSecretStore \"shared\""));

        store.status.conditions.push(StoreStatusCondition::ready(ConditionStatus::True));
        assert!(gate(true).authorize(&store, "payments").await.is_ok());
    }
}
