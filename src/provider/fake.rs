//! Fake backend serving static data from the store configuration.
//!
//! Writes land in a per-client copy; nothing is shared between clients.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::RwLock;
use tonic::Code;
use tracing::debug;

use super::client::{FindQuery, PushRemoteRef, RemoteRef, SecretMap, SecretsClient, ValidationResult};
use super::Provider;
use crate::errors::{Error, Result};
use crate::resources::{Capabilities, FakeProviderSpec, GenericStore, ProviderKind, StoreProvider};
use crate::store::ObjectStore;

#[derive(Debug, Default, Clone, Copy)]
pub struct FakeProvider;

impl FakeProvider {
    pub fn new() -> Self {
        Self
    }

    fn spec(store: &GenericStore) -> Result<&FakeProviderSpec> {
        match &store.spec.provider {
            StoreProvider::Fake(spec) => Ok(spec),
            other => Err(Error::config(format!(
                "store {} configures provider {}, expected fake",
                store.name(),
                other.kind()
            ))),
        }
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Fake
    }

    fn capabilities(&self, _store: &GenericStore) -> Capabilities {
        Capabilities::ReadWrite
    }

    fn validate_store(&self, store: &GenericStore) -> Result<()> {
        let spec = Self::spec(store)?;
        if let Some(entry) = spec.data.iter().find(|d| d.key.is_empty()) {
            return Err(Error::config(format!(
                "fake store {} has an entry with an empty key (value {:?})",
                store.name(),
                entry.value
            )));
        }
        Ok(())
    }

    async fn new_client(
        &self,
        store: &GenericStore,
        _object_store: Arc<dyn ObjectStore>,
        _namespace: &str,
    ) -> Result<Arc<dyn SecretsClient>> {
        let spec = Self::spec(store)?;
        Ok(Arc::new(FakeClient::from_spec(spec)))
    }
}

type VersionedKey = (String, String);

#[derive(Debug, Default)]
pub struct FakeClient {
    data: RwLock<BTreeMap<VersionedKey, Vec<u8>>>,
    closed: AtomicBool,
}

impl FakeClient {
    pub fn from_spec(spec: &FakeProviderSpec) -> Self {
        let data = spec
            .data
            .iter()
            .map(|d| ((d.key.clone(), d.version.clone().unwrap_or_default()), d.value.clone().into_bytes()))
            .collect();
        Self { data: RwLock::new(data), closed: AtomicBool::new(false) }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::upstream(Code::FailedPrecondition, "fake client is closed"));
        }
        Ok(())
    }
}

fn not_found(key: &str) -> Error {
    Error::upstream(Code::NotFound, format!("secret {:?} not found", key))
}

/// Walk a dotted property path through a JSON document.
fn extract_property(raw: &[u8], property: &str, key: &str) -> Result<Vec<u8>> {
    let document: serde_json::Value = serde_json::from_slice(raw).map_err(|_| {
        Error::upstream(Code::InvalidArgument, format!("secret {:?} is not a JSON document", key))
    })?;
    let value = property
        .split('.')
        .try_fold(&document, |node, segment| node.get(segment))
        .ok_or_else(|| {
            Error::upstream(Code::NotFound, format!("property {:?} not found in secret {:?}", property, key))
        })?;
    Ok(match value {
        serde_json::Value::String(s) => s.clone().into_bytes(),
        other => other.to_string().into_bytes(),
    })
}

#[async_trait]
impl SecretsClient for FakeClient {
    async fn get_secret(&self, remote_ref: &RemoteRef) -> Result<Vec<u8>> {
        self.ensure_open()?;
        let data = self.data.read().await;
        let raw = data
            .get(&(remote_ref.key.clone(), remote_ref.version.clone()))
            .ok_or_else(|| not_found(&remote_ref.key))?;
        if remote_ref.property.is_empty() {
            Ok(raw.clone())
        } else {
            extract_property(raw, &remote_ref.property, &remote_ref.key)
        }
    }

    async fn push_secret(&self, value: &[u8], remote_ref: &PushRemoteRef) -> Result<()> {
        self.ensure_open()?;
        let mut data = self.data.write().await;
        let key = (remote_ref.remote_key.clone(), String::new());

        if remote_ref.property.is_empty() {
            data.insert(key, value.to_vec());
        } else {
            let mut document = match data.get(&key) {
                Some(raw) => serde_json::from_slice::<serde_json::Value>(raw).map_err(|_| {
                    Error::upstream(
                        Code::InvalidArgument,
                        format!("secret {:?} is not a JSON document", remote_ref.remote_key),
                    )
                })?,
                None => serde_json::json!({}),
            };
            let object = document.as_object_mut().ok_or_else(|| {
                Error::upstream(
                    Code::InvalidArgument,
                    format!("secret {:?} is not a JSON object", remote_ref.remote_key),
                )
            })?;
            object.insert(
                remote_ref.property.clone(),
                serde_json::Value::String(String::from_utf8_lossy(value).into_owned()),
            );
            data.insert(key, serde_json::to_vec(&document)?);
        }
        debug!(key = %remote_ref.remote_key, "Fake secret pushed");
        Ok(())
    }

    async fn delete_secret(&self, remote_ref: &PushRemoteRef) -> Result<()> {
        self.ensure_open()?;
        let mut data = self.data.write().await;

        if remote_ref.property.is_empty() {
            data.retain(|(key, _), _| key != &remote_ref.remote_key);
            return Ok(());
        }

        let key = (remote_ref.remote_key.clone(), String::new());
        let document = data.get(&key).and_then(|raw| serde_json::from_slice::<serde_json::Value>(raw).ok());
        if let Some(mut document) = document {
            if let Some(object) = document.as_object_mut() {
                object.remove(&remote_ref.property);
                data.insert(key, serde_json::to_vec(&document)?);
            }
        }
        Ok(())
    }

    async fn secret_exists(&self, remote_ref: &PushRemoteRef) -> Result<bool> {
        self.ensure_open()?;
        let data = self.data.read().await;
        Ok(data.keys().any(|(key, _)| key == &remote_ref.remote_key))
    }

    async fn get_all_secrets(&self, find: &FindQuery) -> Result<SecretMap> {
        self.ensure_open()?;
        let regex = if find.name_regex.is_empty() {
            None
        } else {
            Some(Regex::new(&find.name_regex).map_err(|e| {
                Error::upstream(Code::InvalidArgument, format!("invalid name regex {:?}: {}", find.name_regex, e))
            })?)
        };

        // unversioned entries sort first and win over versioned ones
        let data = self.data.read().await;
        let mut secrets = SecretMap::new();
        for ((key, _), value) in data.iter() {
            if regex.as_ref().map_or(true, |r| r.is_match(key)) {
                secrets.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        Ok(secrets)
    }

    async fn validate(&self) -> Result<ValidationResult> {
        self.ensure_open()?;
        Ok(ValidationResult::Ready)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::FakeProviderData;

    fn client() -> FakeClient {
        FakeClient::from_spec(&FakeProviderSpec {
            data: vec![
                FakeProviderData { key: "db".into(), value: r#"{"user":"app","pass":"hunter2"}"#.into(), version: None },
                FakeProviderData { key: "db".into(), value: "old".into(), version: Some("v1".into()) },
                FakeProviderData { key: "api-token".into(), value: "abc".into(), version: None },
            ],
        })
    }

    #[tokio::test]
    async fn test_get_secret_with_version_and_property() {
        let client = client();
        assert_eq!(client.get_secret(&RemoteRef::new("db").with_version("v1")).await.unwrap(), b"old");
        assert_eq!(client.get_secret(&RemoteRef::new("db").with_property("pass")).await.unwrap(), b"hunter2");

        let err = client.get_secret(&RemoteRef::new("missing")).await.unwrap_err();
        assert!(matches!(err, Error::Upstream { code: Code::NotFound, .. }));
    }

    #[tokio::test]
    async fn test_push_exists_delete() {
        let client = client();
        let target = PushRemoteRef::new("new");
        assert!(!client.secret_exists(&target).await.unwrap());

        client.push_secret(b"value", &target).await.unwrap();
        assert!(client.secret_exists(&target).await.unwrap());

        let with_property = PushRemoteRef { remote_key: "new-json".into(), property: "field".into() };
        client.push_secret(b"x", &with_property).await.unwrap();
        assert_eq!(client.get_secret(&RemoteRef::new("new-json").with_property("field")).await.unwrap(), b"x");

        client.delete_secret(&target).await.unwrap();
        assert!(!client.secret_exists(&target).await.unwrap());
    }

    #[tokio::test]
    async fn test_get_all_secrets_filters_by_name() {
        let client = client();
        let all = client
            .get_all_secrets(&FindQuery { name_regex: "^api-".into(), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all.get("api-token").map(Vec::as_slice), Some(&b"abc"[..]));
    }

    #[tokio::test]
    async fn test_closed_client_rejects_calls() {
        let client = client();
        client.close().await.unwrap();
        assert!(client.validate().await.is_err());
    }
}
