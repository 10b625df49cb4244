//! The client contract every backend implementation satisfies, in-process or
//! remote.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Secret values keyed by name.
pub type SecretMap = BTreeMap<String, Vec<u8>>;

/// Which secret to read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRef {
    pub key: String,
    /// JSON property to extract from the value; empty means the whole value.
    #[serde(default)]
    pub property: String,
    #[serde(default)]
    pub version: String,
}

impl RemoteRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), ..Default::default() }
    }

    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = property.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}

/// Where to write (or delete) a secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRemoteRef {
    pub remote_key: String,
    #[serde(default)]
    pub property: String,
}

impl PushRemoteRef {
    pub fn new(remote_key: impl Into<String>) -> Self {
        Self { remote_key: remote_key.into(), property: String::new() }
    }
}

/// Bulk lookup filter for `get_all_secrets`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindQuery {
    /// Regex matched against secret names.
    #[serde(default)]
    pub name_regex: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationResult {
    Ready,
    Unknown,
    Error,
}

/// A live connection to one backend.
///
/// Handles are shared; only the client manager calls [`SecretsClient::close`].
#[async_trait]
pub trait SecretsClient: Send + Sync + fmt::Debug {
    async fn get_secret(&self, remote_ref: &RemoteRef) -> Result<Vec<u8>>;

    async fn push_secret(&self, value: &[u8], remote_ref: &PushRemoteRef) -> Result<()>;

    async fn delete_secret(&self, remote_ref: &PushRemoteRef) -> Result<()>;

    async fn secret_exists(&self, remote_ref: &PushRemoteRef) -> Result<bool>;

    async fn get_all_secrets(&self, find: &FindQuery) -> Result<SecretMap>;

    async fn validate(&self) -> Result<ValidationResult>;

    /// Release the underlying session. Called at most once per handle.
    async fn close(&self) -> Result<()>;
}
