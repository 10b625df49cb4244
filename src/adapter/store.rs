//! Secret-store sub-server: serves the provider contract by rebuilding an
//! in-process store configuration from each request's provider reference and
//! delegating to the mapped implementation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tonic::{Request, Response, Status};
use tracing::{debug, warn, Instrument};

use super::proto::{
    self, secret_store_provider_server::SecretStoreProvider, CapabilitiesRequest,
    CapabilitiesResponse, DeleteSecretRequest, DeleteSecretResponse, GetAllSecretsRequest,
    GetAllSecretsResponse, GetSecretRequest, GetSecretResponse, ProviderReference,
    PushSecretRequest, PushSecretResponse, SecretExistsRequest, SecretExistsResponse,
    SecretStoreCapabilities, ValidateRequest, ValidateResponse, ValidationStatus,
    STORE_SERVICE_NAME,
};
use crate::errors::{Error, Result};
use crate::observability::MetricsRecorder;
use crate::provider::{Provider, SecretsClient};
use crate::resources::{
    GenericStore, ObjectMeta, ProviderKind, ProviderRef, SecretStoreSpec, StoreKind, StoreProvider,
};
use crate::rpc_span;
use crate::store::ObjectStore;

/// API group/version plus kind of a backend-specific resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKind {
    pub api_version: String,
    pub kind: String,
}

impl ResourceKind {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { api_version: api_version.into(), kind: kind.into() }
    }
}

impl From<&ProviderRef> for ResourceKind {
    fn from(reference: &ProviderRef) -> Self {
        Self::new(reference.api_version.clone(), reference.kind.clone())
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version, self.kind)
    }
}

/// Which in-process implementation serves each resource kind.
pub type ProviderMapping = HashMap<ResourceKind, Arc<dyn Provider>>;

/// Rebuilds the in-process store configuration a provider reference stands for.
#[async_trait]
pub trait SpecMapper: Send + Sync {
    /// `reference.namespace` is already defaulted to the request's source
    /// namespace.
    async fn map(&self, reference: &ProviderRef) -> Result<SecretStoreSpec>;
}

/// Fetches the referenced resource from the object store and projects its
/// `spec` into the provider union variant registered for its kind.
pub struct ObjectStoreSpecMapper {
    object_store: Arc<dyn ObjectStore>,
    kinds: HashMap<ResourceKind, ProviderKind>,
}

impl ObjectStoreSpecMapper {
    pub fn new(object_store: Arc<dyn ObjectStore>) -> Self {
        Self { object_store, kinds: HashMap::new() }
    }

    pub fn with_kind(mut self, resource: ResourceKind, provider: ProviderKind) -> Self {
        self.kinds.insert(resource, provider);
        self
    }
}

#[async_trait]
impl SpecMapper for ObjectStoreSpecMapper {
    async fn map(&self, reference: &ProviderRef) -> Result<SecretStoreSpec> {
        let resource_kind = ResourceKind::from(reference);
        let provider_kind = *self
            .kinds
            .get(&resource_kind)
            .ok_or_else(|| Error::config(format!("no store configuration mapping for {}", resource_kind)))?;

        let object = self
            .object_store
            .get_resource(&reference.api_version, &reference.kind, &reference.name, &reference.namespace)
            .await?
            .ok_or_else(|| {
                Error::not_found(
                    reference.kind.clone(),
                    format!("{}/{}", reference.namespace, reference.name),
                )
            })?;

        let provider = StoreProvider::from_kind_spec(provider_kind, object.spec).map_err(|e| {
            Error::Serialization {
                source: Box::new(e),
                context: format!("invalid {} spec in {}/{}", resource_kind, reference.namespace, reference.name),
            }
        })?;
        Ok(SecretStoreSpec::new(provider))
    }
}

pub struct StoreServer {
    object_store: Arc<dyn ObjectStore>,
    mapping: ProviderMapping,
    spec_mapper: Arc<dyn SpecMapper>,
    metrics: MetricsRecorder,
}

impl fmt::Debug for StoreServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<String> = self.mapping.keys().map(ToString::to_string).collect();
        f.debug_struct("StoreServer").field("kinds", &kinds).finish_non_exhaustive()
    }
}

/// A request's provider, its synthetic store and the namespace it acts for.
struct Target {
    provider: Arc<dyn Provider>,
    store: GenericStore,
    source_namespace: String,
}

impl StoreServer {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        mapping: ProviderMapping,
        spec_mapper: Arc<dyn SpecMapper>,
    ) -> Self {
        Self { object_store, mapping, spec_mapper, metrics: MetricsRecorder::new() }
    }

    async fn target(&self, reference: Option<ProviderReference>, source_namespace: &str) -> Result<Target> {
        let mut reference = ProviderRef::from(proto::required(reference, "provider_ref")?);
        if reference.namespace.is_empty() {
            reference.namespace = source_namespace.to_string();
        }

        let resource_kind = ResourceKind::from(&reference);
        let provider = self
            .mapping
            .get(&resource_kind)
            .cloned()
            .ok_or_else(|| Error::config(format!("unsupported provider kind {}", resource_kind)))?;

        let spec = self.spec_mapper.map(&reference).await?;
        let store = GenericStore::new(
            StoreKind::SecretStore,
            ObjectMeta::namespaced(reference.name.clone(), reference.namespace.clone()),
            spec,
        );
        provider.validate_store(&store)?;

        tracing::Span::current().record("provider", tracing::field::display(&resource_kind));
        Ok(Target { provider, store, source_namespace: source_namespace.to_string() })
    }

    async fn open(&self, reference: Option<ProviderReference>, source_namespace: &str) -> Result<Arc<dyn SecretsClient>> {
        let target = self.target(reference, source_namespace).await?;
        target
            .provider
            .new_client(&target.store, self.object_store.clone(), &target.source_namespace)
            .await
    }

    /// Every request gets its own client; close it once the call is done.
    async fn release(&self, client: Arc<dyn SecretsClient>) {
        if let Err(e) = client.close().await {
            warn!(error = %e, "Failed to close per-request provider client");
        }
    }

    fn finish<T>(&self, method: &str, result: Result<T>) -> std::result::Result<Response<T>, Status> {
        self.metrics.record_rpc(STORE_SERVICE_NAME, method, result.is_ok());
        match result {
            Ok(response) => Ok(Response::new(response)),
            Err(e) => {
                debug!(method = %method, error = %e, "Store request failed");
                Err(e.into())
            }
        }
    }

    async fn do_get_secret(&self, req: GetSecretRequest) -> Result<GetSecretResponse> {
        let remote_ref = proto::required(req.remote_ref, "remote_ref")?.into();
        let client = self.open(req.provider_ref, &req.source_namespace).await?;
        let result = client.get_secret(&remote_ref).await;
        self.release(client).await;
        Ok(GetSecretResponse { value: result? })
    }

    async fn do_push_secret(&self, req: PushSecretRequest) -> Result<PushSecretResponse> {
        let push_ref = proto::required(req.push_ref, "push_ref")?.into();
        let client = self.open(req.provider_ref, &req.source_namespace).await?;
        let result = client.push_secret(&req.value, &push_ref).await;
        self.release(client).await;
        result?;
        Ok(PushSecretResponse {})
    }

    async fn do_delete_secret(&self, req: DeleteSecretRequest) -> Result<DeleteSecretResponse> {
        let push_ref = proto::required(req.push_ref, "push_ref")?.into();
        let client = self.open(req.provider_ref, &req.source_namespace).await?;
        let result = client.delete_secret(&push_ref).await;
        self.release(client).await;
        result?;
        Ok(DeleteSecretResponse {})
    }

    async fn do_secret_exists(&self, req: SecretExistsRequest) -> Result<SecretExistsResponse> {
        let push_ref = proto::required(req.push_ref, "push_ref")?.into();
        let client = self.open(req.provider_ref, &req.source_namespace).await?;
        let result = client.secret_exists(&push_ref).await;
        self.release(client).await;
        Ok(SecretExistsResponse { exists: result? })
    }

    async fn do_get_all_secrets(&self, req: GetAllSecretsRequest) -> Result<GetAllSecretsResponse> {
        let find = proto::required(req.find, "find")?.into();
        let client = self.open(req.provider_ref, &req.source_namespace).await?;
        let result = client.get_all_secrets(&find).await;
        self.release(client).await;
        Ok(GetAllSecretsResponse { secrets: result?.into_iter().collect() })
    }

    async fn do_validate(&self, req: ValidateRequest) -> Result<ValidateResponse> {
        let client = self.open(req.provider_ref, &req.source_namespace).await?;
        let result = client.validate().await;
        self.release(client).await;

        Ok(match result {
            Ok(status) => ValidateResponse { status: ValidationStatus::from(status) as i32, message: String::new() },
            Err(e) => ValidateResponse { status: ValidationStatus::Error as i32, message: e.to_string() },
        })
    }

    async fn do_capabilities(&self, req: CapabilitiesRequest) -> Result<CapabilitiesResponse> {
        let target = self.target(req.provider_ref, &req.source_namespace).await?;
        let capabilities = target.provider.capabilities(&target.store);
        Ok(CapabilitiesResponse { capabilities: SecretStoreCapabilities::from(capabilities) as i32 })
    }
}

#[async_trait]
impl SecretStoreProvider for StoreServer {
    async fn get_secret(
        &self,
        request: Request<GetSecretRequest>,
    ) -> std::result::Result<Response<GetSecretResponse>, Status> {
        let req = request.into_inner();
        let span = rpc_span!("GetSecret", req.source_namespace);
        let result = self.do_get_secret(req).instrument(span).await;
        self.finish("GetSecret", result)
    }

    async fn push_secret(
        &self,
        request: Request<PushSecretRequest>,
    ) -> std::result::Result<Response<PushSecretResponse>, Status> {
        let req = request.into_inner();
        let span = rpc_span!("PushSecret", req.source_namespace);
        let result = self.do_push_secret(req).instrument(span).await;
        self.finish("PushSecret", result)
    }

    async fn delete_secret(
        &self,
        request: Request<DeleteSecretRequest>,
    ) -> std::result::Result<Response<DeleteSecretResponse>, Status> {
        let req = request.into_inner();
        let span = rpc_span!("DeleteSecret", req.source_namespace);
        let result = self.do_delete_secret(req).instrument(span).await;
        self.finish("DeleteSecret", result)
    }

    async fn secret_exists(
        &self,
        request: Request<SecretExistsRequest>,
    ) -> std::result::Result<Response<SecretExistsResponse>, Status> {
        let req = request.into_inner();
        let span = rpc_span!("SecretExists", req.source_namespace);
        let result = self.do_secret_exists(req).instrument(span).await;
        self.finish("SecretExists", result)
    }

    async fn get_all_secrets(
        &self,
        request: Request<GetAllSecretsRequest>,
    ) -> std::result::Result<Response<GetAllSecretsResponse>, Status> {
        let req = request.into_inner();
        let span = rpc_span!("GetAllSecrets", req.source_namespace);
        let result = self.do_get_all_secrets(req).instrument(span).await;
        self.finish("GetAllSecrets", result)
    }

    async fn validate(
        &self,
        request: Request<ValidateRequest>,
    ) -> std::result::Result<Response<ValidateResponse>, Status> {
        let req = request.into_inner();
        let span = rpc_span!("Validate", req.source_namespace);
        let result = self.do_validate(req).instrument(span).await;
        self.finish("Validate", result)
    }

    async fn capabilities(
        &self,
        request: Request<CapabilitiesRequest>,
    ) -> std::result::Result<Response<CapabilitiesResponse>, Status> {
        let req = request.into_inner();
        let span = rpc_span!("Capabilities", req.source_namespace);
        let result = self.do_capabilities(req).instrument(span).await;
        self.finish("Capabilities", result)
    }
}
