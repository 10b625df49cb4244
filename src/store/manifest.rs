//! Multi-document YAML manifests.
//!
//! Recognised kinds are `SecretStore`, `ClusterSecretStore`, `Namespace`,
//! `Provider` and `Secret`. Anything else is kept as a [`DynamicObject`] so
//! that backend-specific resources can be looked up by a spec mapper.

use std::collections::BTreeMap;

use base64::Engine;
use serde::Deserialize;

use super::DynamicObject;
use crate::errors::{Error, Result};
use crate::resources::{
    GenericStore, Namespace, ObjectMeta, ProviderResource, ProviderResourceSpec,
    ProviderResourceStatus, SecretObject,
    SecretStoreSpec, SecretStoreStatus, StoreKind,
};

/// Namespace assigned to namespaced objects that omit one.
pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Clone, PartialEq)]
pub enum Manifest {
    Store(GenericStore),
    Namespace(Namespace),
    Provider(ProviderResource),
    Secret(SecretObject),
    Resource(DynamicObject),
}

#[derive(Deserialize)]
struct StoreDocument {
    metadata: ObjectMeta,
    spec: SecretStoreSpec,
    #[serde(default)]
    status: SecretStoreStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretDocument {
    metadata: ObjectMeta,
    #[serde(default)]
    data: BTreeMap<String, String>,
    #[serde(default)]
    string_data: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct ProviderDocument {
    metadata: ObjectMeta,
    spec: ProviderResourceSpec,
    #[serde(default)]
    status: ProviderResourceStatus,
}

/// Parse every document in `text`. `origin` names the source in errors.
pub fn parse_manifests(text: &str, origin: &str) -> Result<Vec<Manifest>> {
    let mut manifests = Vec::new();

    for (index, document) in serde_yaml::Deserializer::from_str(text).enumerate() {
        let value = serde_yaml::Value::deserialize(document)
            .map_err(|e| yaml_error(e, origin, index))?;
        if value.is_null() {
            continue;
        }

        let kind = value
            .get("kind")
            .and_then(serde_yaml::Value::as_str)
            .ok_or_else(|| Error::config(format!("{}: document {} has no kind", origin, index)))?
            .to_string();

        let manifest = match kind.as_str() {
            "SecretStore" | "ClusterSecretStore" => {
                let store_kind = if kind == "SecretStore" {
                    StoreKind::SecretStore
                } else {
                    StoreKind::ClusterSecretStore
                };
                let doc: StoreDocument =
                    serde_yaml::from_value(value).map_err(|e| yaml_error(e, origin, index))?;
                let mut metadata = doc.metadata;
                if store_kind.is_cluster_scoped() {
                    metadata.namespace = None;
                } else {
                    default_namespace(&mut metadata);
                }
                let mut store = GenericStore::new(store_kind, metadata, doc.spec);
                store.status = doc.status;
                Manifest::Store(store)
            }
            "Namespace" => {
                let mut namespace: Namespace =
                    serde_yaml::from_value(value).map_err(|e| yaml_error(e, origin, index))?;
                namespace.metadata.namespace = None;
                Manifest::Namespace(namespace)
            }
            "Provider" => {
                let doc: ProviderDocument =
                    serde_yaml::from_value(value).map_err(|e| yaml_error(e, origin, index))?;
                let mut metadata = doc.metadata;
                default_namespace(&mut metadata);
                Manifest::Provider(ProviderResource { metadata, spec: doc.spec, status: doc.status })
            }
            "Secret" => {
                let doc: SecretDocument =
                    serde_yaml::from_value(value).map_err(|e| yaml_error(e, origin, index))?;
                let mut metadata = doc.metadata;
                default_namespace(&mut metadata);
                let mut data = BTreeMap::new();
                for (key, encoded) in doc.data {
                    let decoded = base64::engine::general_purpose::STANDARD
                        .decode(encoded.trim())
                        .map_err(|e| Error::Serialization {
                            source: Box::new(e),
                            context: format!("{}: secret {} key {:?} is not base64", origin, metadata.name, key),
                        })?;
                    data.insert(key, decoded);
                }
                for (key, plain) in doc.string_data {
                    data.insert(key, plain.into_bytes());
                }
                Manifest::Secret(SecretObject { metadata, data })
            }
            _ => {
                let mut object: DynamicObject =
                    serde_yaml::from_value(value).map_err(|e| yaml_error(e, origin, index))?;
                default_namespace(&mut object.metadata);
                Manifest::Resource(object)
            }
        };
        manifests.push(manifest);
    }

    Ok(manifests)
}

fn default_namespace(metadata: &mut ObjectMeta) {
    if metadata.namespace.as_deref().map_or(true, str::is_empty) {
        metadata.namespace = Some(DEFAULT_NAMESPACE.to_string());
    }
}

fn yaml_error(error: serde_yaml::Error, origin: &str, index: usize) -> Error {
    Error::Serialization {
        source: Box::new(error),
        context: format!("{}: document {} is not a valid manifest", origin, index),
    }
}
