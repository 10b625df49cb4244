//! Generator sub-server.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tonic::{Request, Response, Status};
use tracing::{debug, Instrument};

use super::proto::{
    generator_provider_server::GeneratorProvider, CleanupRequest, CleanupResponse, GenerateRequest,
    GenerateResponse, ProviderReference, GENERATOR_SERVICE_NAME,
};
use super::store::ResourceKind;
use crate::errors::{Error, Result};
use crate::observability::MetricsRecorder;
use crate::provider::Generator;
use crate::rpc_span;
use crate::store::ObjectStore;

/// Which generator implementation serves each generator resource kind.
pub type GeneratorMapping = HashMap<ResourceKind, Arc<dyn Generator>>;

pub struct GeneratorServer {
    object_store: Arc<dyn ObjectStore>,
    mapping: GeneratorMapping,
    metrics: MetricsRecorder,
}

impl fmt::Debug for GeneratorServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<String> = self.mapping.keys().map(ToString::to_string).collect();
        f.debug_struct("GeneratorServer").field("kinds", &kinds).finish_non_exhaustive()
    }
}

fn decode_json(bytes: &[u8], what: &str) -> Result<Value> {
    serde_json::from_slice(bytes)
        .map_err(|e| Error::Serialization { source: Box::new(e), context: format!("invalid {} JSON", what) })
}

impl GeneratorServer {
    pub fn new(object_store: Arc<dyn ObjectStore>, mapping: GeneratorMapping) -> Self {
        Self { object_store, mapping, metrics: MetricsRecorder::new() }
    }

    /// The generator resource and its implementation. Inline JSON wins over
    /// the reference; the kind comes from the JSON when it carries one.
    async fn resolve(
        &self,
        reference: Option<ProviderReference>,
        generator_json: &[u8],
        namespace: &str,
    ) -> Result<(Arc<dyn Generator>, Value)> {
        let resource = if !generator_json.is_empty() {
            decode_json(generator_json, "generator")?
        } else {
            let reference = reference
                .ok_or_else(|| Error::config("request carries neither generator_json nor generator_ref"))?;
            let ns = if reference.namespace.is_empty() { namespace } else { reference.namespace.as_str() };
            let object = self
                .object_store
                .get_resource(&reference.api_version, &reference.kind, &reference.name, ns)
                .await?
                .ok_or_else(|| Error::not_found(reference.kind.clone(), format!("{}/{}", ns, reference.name)))?;
            serde_json::to_value(object)?
        };

        let kind = match (
            resource.get("apiVersion").and_then(Value::as_str),
            resource.get("kind").and_then(Value::as_str),
        ) {
            (Some(api_version), Some(kind)) => ResourceKind::new(api_version, kind),
            _ => return Err(Error::config("generator resource has no apiVersion/kind")),
        };

        let generator = self
            .mapping
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::config(format!("unsupported generator kind {}", kind)))?;
        tracing::Span::current().record("provider", tracing::field::display(&kind));
        Ok((generator, resource))
    }

    fn finish<T>(&self, method: &str, result: Result<T>) -> std::result::Result<Response<T>, Status> {
        self.metrics.record_rpc(GENERATOR_SERVICE_NAME, method, result.is_ok());
        match result {
            Ok(response) => Ok(Response::new(response)),
            Err(e) => {
                debug!(method = %method, error = %e, "Generator request failed");
                Err(e.into())
            }
        }
    }

    async fn do_generate(&self, req: GenerateRequest) -> Result<GenerateResponse> {
        let (generator, resource) = self.resolve(req.generator_ref, &req.generator_json, &req.namespace).await?;
        let generated = generator.generate(&resource, &req.namespace).await?;
        let state = match generated.state {
            Some(state) => serde_json::to_vec(&state)?,
            None => Vec::new(),
        };
        Ok(GenerateResponse { data: generated.data.into_iter().collect(), state })
    }

    async fn do_cleanup(&self, req: CleanupRequest) -> Result<CleanupResponse> {
        let (generator, resource) = self.resolve(req.generator_ref, &req.generator_json, &req.namespace).await?;
        let state = if req.state.is_empty() { None } else { Some(decode_json(&req.state, "generator state")?) };
        generator.cleanup(&resource, state.as_ref(), &req.namespace).await?;
        Ok(CleanupResponse {})
    }
}

#[async_trait]
impl GeneratorProvider for GeneratorServer {
    async fn generate(
        &self,
        request: Request<GenerateRequest>,
    ) -> std::result::Result<Response<GenerateResponse>, Status> {
        let req = request.into_inner();
        let span = rpc_span!("Generate", req.namespace);
        let result = self.do_generate(req).instrument(span).await;
        self.finish("Generate", result)
    }

    async fn cleanup(
        &self,
        request: Request<CleanupRequest>,
    ) -> std::result::Result<Response<CleanupResponse>, Status> {
        let req = request.into_inner();
        let span = rpc_span!("Cleanup", req.namespace);
        let result = self.do_cleanup(req).instrument(span).await;
        self.finish("Cleanup", result)
    }
}
