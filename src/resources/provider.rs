//! Provider resources describing out-of-process backends.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::store::StoreStatusCondition;
use super::ObjectMeta;

/// Operation set a backend supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capabilities {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Capabilities {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "ReadOnly",
            Self::WriteOnly => "WriteOnly",
            Self::ReadWrite => "ReadWrite",
        }
    }

    pub fn can_read(&self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    pub fn can_write(&self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }
}

impl FromStr for Capabilities {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ReadOnly" => Ok(Self::ReadOnly),
            "WriteOnly" => Ok(Self::WriteOnly),
            "ReadWrite" => Ok(Self::ReadWrite),
            _ => Err(format!("Unknown capabilities: {}", s)),
        }
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a backend-specific configuration resource. Opaque to the
/// manager; forwarded verbatim to the out-of-process backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRef {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    /// Empty means the namespace of the requesting consumer.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// `host:port` of the provider process.
    #[serde(default)]
    pub address: String,
    pub provider_ref: ProviderRef,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResourceSpec {
    pub config: ProviderConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResourceStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<StoreStatusCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Capabilities>,
}

/// How to reach an out-of-process backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderResource {
    pub metadata: ObjectMeta,
    pub spec: ProviderResourceSpec,
    #[serde(default)]
    pub status: ProviderResourceStatus,
}

impl ProviderResource {
    pub fn new(metadata: ObjectMeta, address: impl Into<String>, provider_ref: ProviderRef) -> Self {
        Self {
            metadata,
            spec: ProviderResourceSpec {
                config: ProviderConfig { address: address.into(), provider_ref },
            },
            status: ProviderResourceStatus::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn generation(&self) -> i64 {
        self.metadata.generation
    }

    pub fn address(&self) -> &str {
        &self.spec.config.address
    }

    pub fn provider_ref(&self) -> &ProviderRef {
        &self.spec.config.provider_ref
    }

    pub fn capabilities(&self) -> Option<Capabilities> {
        self.status.capabilities
    }
}
