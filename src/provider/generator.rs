//! Generator contract and the fake generator.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::client::SecretMap;
use crate::errors::{Error, Result};

/// Output of one generation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedSecret {
    pub data: SecretMap,
    /// Opaque state handed back to [`Generator::cleanup`].
    pub state: Option<serde_json::Value>,
}

/// Produces secret values from a generator resource instead of reading them
/// from a backend.
#[async_trait]
pub trait Generator: Send + Sync {
    /// `resource` is the generator object as JSON, either the whole object or
    /// just its `spec`.
    async fn generate(&self, resource: &serde_json::Value, namespace: &str) -> Result<GeneratedSecret>;

    async fn cleanup(
        &self,
        resource: &serde_json::Value,
        state: Option<&serde_json::Value>,
        namespace: &str,
    ) -> Result<()>;
}

#[derive(Debug, Default, Deserialize)]
struct FakeGeneratorSpec {
    #[serde(default)]
    data: BTreeMap<String, String>,
}

/// Returns the `data` map of its spec verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct FakeGenerator;

impl FakeGenerator {
    pub fn new() -> Self {
        Self
    }
}

fn spec_of(resource: &serde_json::Value) -> Result<FakeGeneratorSpec> {
    if resource.is_null() {
        return Err(Error::config("no config spec provided"));
    }
    let spec = resource.get("spec").unwrap_or(resource);
    serde_json::from_value(spec.clone()).map_err(|e| Error::Serialization {
        source: Box::new(e),
        context: "invalid fake generator spec".to_string(),
    })
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn generate(&self, resource: &serde_json::Value, _namespace: &str) -> Result<GeneratedSecret> {
        let spec = spec_of(resource)?;
        Ok(GeneratedSecret {
            data: spec.data.into_iter().map(|(k, v)| (k, v.into_bytes())).collect(),
            state: None,
        })
    }

    async fn cleanup(
        &self,
        _resource: &serde_json::Value,
        _state: Option<&serde_json::Value>,
        _namespace: &str,
    ) -> Result<()> {
        Ok(())
    }
}
