//! Control-plane object model.
//!
//! These are the shapes this crate reads from the object store: backend
//! configurations ("stores"), provider resources for out-of-process backends,
//! namespaces with their labels, and secrets holding transport material.
//! Field names follow the manifest format (`camelCase`), so the same types
//! deserialize straight from YAML.

pub mod provider;
pub mod selector;
pub mod store;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use provider::{
    Capabilities, ProviderConfig, ProviderRef, ProviderResource, ProviderResourceSpec,
    ProviderResourceStatus,
};
pub use selector::{LabelSelector, LabelSelectorRequirement, Selector, SelectorOperator};
pub use store::{
    ClusterSecretStoreCondition, ConditionStatus, FakeProviderData, FakeProviderSpec,
    GenericStore, ProviderKind, SecretStoreSpec, SecretStoreStatus, StoreKind, StoreProvider,
    StoreRef, StoreRefKind, StoreStatusCondition,
};

/// Label the object store maintains on every namespace, carrying its name.
pub const NAMESPACE_NAME_LABEL: &str = "kubernetes.io/metadata.name";

/// Metadata shared by every object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub generation: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl ObjectMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn namespaced(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self { name: name.into(), namespace: Some(namespace.into()), ..Default::default() }
    }

    pub fn with_labels<I, K, V>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.labels.extend(labels.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// `namespace/name`, or just `name` for cluster-scoped objects.
    pub fn key(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}", ns, self.name),
            None => self.name.clone(),
        }
    }
}

/// A namespace and its labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub metadata: ObjectMeta,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self { metadata: ObjectMeta::new(name) }
    }

    pub fn with_labels<I, K, V>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.metadata = self.metadata.with_labels(labels);
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.metadata.labels
    }
}

/// A secret as stored in the object store. Values are raw bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretObject {
    pub metadata: ObjectMeta,
    pub data: BTreeMap<String, Vec<u8>>,
}

impl SecretObject {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self { metadata: ObjectMeta::namespaced(name, namespace), data: BTreeMap::new() }
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }
}
