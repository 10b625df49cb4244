//! Unified dispatcher and the gRPC server around it.
//!
//! [`AdapterServer`] owns one sub-server per contract and forwards each call,
//! unchanged, to the one that owns it.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Server, ServerTlsConfig};
use tonic::{Request, Response, Status};
use tonic_health::ServingStatus;
use tracing::info;

use super::generator::{GeneratorMapping, GeneratorServer};
use super::proto::{
    generator_provider_server::{GeneratorProvider, GeneratorProviderServer},
    secret_store_provider_server::{SecretStoreProvider, SecretStoreProviderServer},
    CapabilitiesRequest, CapabilitiesResponse, CleanupRequest, CleanupResponse,
    DeleteSecretRequest, DeleteSecretResponse, GenerateRequest, GenerateResponse,
    GetAllSecretsRequest, GetAllSecretsResponse, GetSecretRequest, GetSecretResponse,
    PushSecretRequest, PushSecretResponse, SecretExistsRequest, SecretExistsResponse,
    ValidateRequest, ValidateResponse, FILE_DESCRIPTOR_SET, GENERATOR_SERVICE_NAME, STORE_SERVICE_NAME,
};
use super::store::{ProviderMapping, SpecMapper, StoreServer};
use crate::config::AdapterServerConfig;
use crate::errors::{Error, Result};
use crate::observability::MetricsRecorder;
use crate::store::ObjectStore;

type RpcResult<T> = std::result::Result<Response<T>, Status>;

#[derive(Debug)]
pub struct AdapterServer {
    store: StoreServer,
    generator: GeneratorServer,
}

impl AdapterServer {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        provider_mapping: ProviderMapping,
        spec_mapper: Arc<dyn SpecMapper>,
        generator_mapping: GeneratorMapping,
    ) -> Self {
        Self {
            store: StoreServer::new(object_store.clone(), provider_mapping, spec_mapper),
            generator: GeneratorServer::new(object_store, generator_mapping),
        }
    }

    pub fn from_parts(store: StoreServer, generator: GeneratorServer) -> Self {
        Self { store, generator }
    }
}

#[async_trait]
impl SecretStoreProvider for AdapterServer {
    async fn get_secret(&self, request: Request<GetSecretRequest>) -> RpcResult<GetSecretResponse> {
        self.store.get_secret(request).await
    }

    async fn push_secret(&self, request: Request<PushSecretRequest>) -> RpcResult<PushSecretResponse> {
        self.store.push_secret(request).await
    }

    async fn delete_secret(&self, request: Request<DeleteSecretRequest>) -> RpcResult<DeleteSecretResponse> {
        self.store.delete_secret(request).await
    }

    async fn secret_exists(&self, request: Request<SecretExistsRequest>) -> RpcResult<SecretExistsResponse> {
        self.store.secret_exists(request).await
    }

    async fn get_all_secrets(&self, request: Request<GetAllSecretsRequest>) -> RpcResult<GetAllSecretsResponse> {
        self.store.get_all_secrets(request).await
    }

    async fn validate(&self, request: Request<ValidateRequest>) -> RpcResult<ValidateResponse> {
        self.store.validate(request).await
    }

    async fn capabilities(&self, request: Request<CapabilitiesRequest>) -> RpcResult<CapabilitiesResponse> {
        self.store.capabilities(request).await
    }
}

#[async_trait]
impl GeneratorProvider for AdapterServer {
    async fn generate(&self, request: Request<GenerateRequest>) -> RpcResult<GenerateResponse> {
        self.generator.generate(request).await
    }

    async fn cleanup(&self, request: Request<CleanupRequest>) -> RpcResult<CleanupResponse> {
        self.generator.cleanup(request).await
    }
}

/// Load the server's mTLS configuration when TLS is enabled.
pub async fn server_tls(config: &AdapterServerConfig) -> Result<Option<ServerTlsConfig>> {
    if !config.enable_tls {
        return Ok(None);
    }
    let material = config.tls_paths().load().await?;
    info!(
        subject = %material.leaf.subject,
        not_after = %material.leaf.not_after,
        "Loaded adapter server certificate"
    );
    Ok(Some(material.server_config()))
}

/// Bind the configured address.
pub async fn bind(config: &AdapterServerConfig) -> Result<TcpListener> {
    let address = config.bind_address();
    TcpListener::bind(&address).await.map_err(|e| Error::Io {
        source: e,
        context: format!("failed to bind adapter server to {}", address),
    })
}

/// Serve both contracts on `listener` until `shutdown` resolves, alongside
/// health (the empty name and both service names report `SERVING`) and
/// reflection.
pub async fn serve<F>(
    adapter: AdapterServer,
    listener: TcpListener,
    tls: Option<ServerTlsConfig>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send,
{
    let local_addr: Option<SocketAddr> = listener.local_addr().ok();
    let adapter = Arc::new(adapter);

    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    for service in ["", STORE_SERVICE_NAME, GENERATOR_SERVICE_NAME] {
        health_reporter.set_service_status(service, ServingStatus::Serving).await;
    }

    let reflection = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()
        .map_err(|e| Error::internal_with_source("failed to build reflection service", Box::new(e)))?;

    let tls_enabled = tls.is_some();
    let mut builder = Server::builder();
    if let Some(tls) = tls {
        builder = builder
            .tls_config(tls)
            .map_err(|e| Error::config_with_source("invalid adapter server TLS configuration", Box::new(e)))?;
    }

    let recorder = MetricsRecorder::new();
    recorder.register_adapter_metrics();

    info!(address = ?local_addr, tls = tls_enabled, "Provider adapter listening");

    builder
        .add_service(health_service)
        .add_service(reflection)
        .add_service(SecretStoreProviderServer::from_arc(adapter.clone()))
        .add_service(GeneratorProviderServer::from_arc(adapter))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await
        .map_err(|e| Error::connection_with_source("adapter server failed", Box::new(e)))?;

    info!("Provider adapter stopped");
    Ok(())
}
