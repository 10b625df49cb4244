//! Backend configurations ("stores").

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::selector::LabelSelector;
use super::{Capabilities, ObjectMeta};

/// Condition type reporting store readiness.
pub const STORE_READY_CONDITION: &str = "Ready";

/// Scope of a backend configuration object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreKind {
    SecretStore,
    ClusterSecretStore,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SecretStore => "SecretStore",
            Self::ClusterSecretStore => "ClusterSecretStore",
        }
    }

    pub fn is_cluster_scoped(&self) -> bool {
        matches!(self, Self::ClusterSecretStore)
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds a store reference may point at. `Provider` designates an
/// out-of-process provider resource directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreRefKind {
    #[default]
    SecretStore,
    ClusterSecretStore,
    Provider,
}

impl StoreRefKind {
    pub fn store_kind(&self) -> Option<StoreKind> {
        match self {
            Self::SecretStore => Some(StoreKind::SecretStore),
            Self::ClusterSecretStore => Some(StoreKind::ClusterSecretStore),
            Self::Provider => None,
        }
    }
}

/// Reference to a backend configuration, as carried by a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreRef {
    pub name: String,
    #[serde(default)]
    pub kind: StoreRefKind,
}

impl StoreRef {
    pub fn secret_store(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: StoreRefKind::SecretStore }
    }

    pub fn cluster_secret_store(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: StoreRefKind::ClusterSecretStore }
    }

    pub fn provider(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: StoreRefKind::Provider }
    }
}

/// Implementation kinds of in-process backends. Closed set; the tag of
/// [`StoreProvider`] selects one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Fake,
    Kubernetes,
    Aws,
    Gcpsm,
    Vault,
    Azurekv,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fake => "fake",
            Self::Kubernetes => "kubernetes",
            Self::Aws => "aws",
            Self::Gcpsm => "gcpsm",
            Self::Vault => "vault",
            Self::Azurekv => "azurekv",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "fake" => Ok(Self::Fake),
            "kubernetes" => Ok(Self::Kubernetes),
            "aws" => Ok(Self::Aws),
            "gcpsm" => Ok(Self::Gcpsm),
            "vault" => Ok(Self::Vault),
            "azurekv" => Ok(Self::Azurekv),
            _ => Err(format!("Unknown provider kind: {}", s)),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend-specific configuration union. Exactly one variant is set per
/// store; payloads of backends without a built-in implementation stay opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreProvider {
    Fake(FakeProviderSpec),
    Kubernetes(serde_json::Value),
    Aws(serde_json::Value),
    Gcpsm(serde_json::Value),
    Vault(serde_json::Value),
    Azurekv(serde_json::Value),
}

impl StoreProvider {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Fake(_) => ProviderKind::Fake,
            Self::Kubernetes(_) => ProviderKind::Kubernetes,
            Self::Aws(_) => ProviderKind::Aws,
            Self::Gcpsm(_) => ProviderKind::Gcpsm,
            Self::Vault(_) => ProviderKind::Vault,
            Self::Azurekv(_) => ProviderKind::Azurekv,
        }
    }

    /// Rebuild the union from a kind and the raw `spec` of a
    /// backend-specific resource.
    pub fn from_kind_spec(
        kind: ProviderKind,
        spec: serde_json::Value,
    ) -> std::result::Result<Self, serde_json::Error> {
        Ok(match kind {
            ProviderKind::Fake => Self::Fake(serde_json::from_value(spec)?),
            ProviderKind::Kubernetes => Self::Kubernetes(spec),
            ProviderKind::Aws => Self::Aws(spec),
            ProviderKind::Gcpsm => Self::Gcpsm(spec),
            ProviderKind::Vault => Self::Vault(spec),
            ProviderKind::Azurekv => Self::Azurekv(spec),
        })
    }
}

/// Static data served by the fake backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FakeProviderSpec {
    #[serde(default)]
    pub data: Vec<FakeProviderData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FakeProviderData {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Access predicate for cluster-scoped stores. Any one matching predicate
/// admits the namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSecretStoreCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_selector: Option<LabelSelector>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespace_regexes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretStoreSpec {
    /// Controller class that owns this store; empty means any controller.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub controller: String,
    pub provider: StoreProvider,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ClusterSecretStoreCondition>,
}

impl SecretStoreSpec {
    pub fn new(provider: StoreProvider) -> Self {
        Self { controller: String::new(), provider, conditions: Vec::new() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStatusCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl StoreStatusCondition {
    pub fn ready(status: ConditionStatus) -> Self {
        Self {
            type_: STORE_READY_CONDITION.to_string(),
            status,
            reason: None,
            message: None,
            last_transition_time: Some(Utc::now()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretStoreStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<StoreStatusCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Capabilities>,
}

impl SecretStoreStatus {
    pub fn condition(&self, type_: &str) -> Option<&StoreStatusCondition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }
}

/// A resolved backend configuration, namespaced or cluster-scoped.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericStore {
    pub kind: StoreKind,
    pub metadata: ObjectMeta,
    pub spec: SecretStoreSpec,
    pub status: SecretStoreStatus,
}

impl GenericStore {
    pub fn new(kind: StoreKind, metadata: ObjectMeta, spec: SecretStoreSpec) -> Self {
        Self { kind, metadata, spec, status: SecretStoreStatus::default() }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref()
    }

    pub fn generation(&self) -> i64 {
        self.metadata.generation
    }

    pub fn provider_kind(&self) -> ProviderKind {
        self.spec.provider.kind()
    }

    pub fn access_conditions(&self) -> &[ClusterSecretStoreCondition] {
        &self.spec.conditions
    }

    pub fn is_ready(&self) -> bool {
        self.status
            .condition(STORE_READY_CONDITION)
            .is_some_and(|c| c.status == ConditionStatus::True)
    }

    /// `kind namespace/name`, used in log fields.
    pub fn display_key(&self) -> String {
        format!("{} {}", self.kind, self.metadata.key())
    }
}
