//! Cross-process client: the in-process client contract over a gRPC channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::Channel;
use tracing::debug;

use super::proto::{
    self, secret_store_provider_client::SecretStoreProviderClient, CapabilitiesRequest,
    DeleteSecretRequest, GetAllSecretsRequest, GetSecretRequest, ProviderReference,
    PushSecretRequest, SecretExistsRequest, ValidateRequest,
};
use crate::errors::{Error, Result};
use crate::provider::{FindQuery, PushRemoteRef, RemoteRef, SecretMap, SecretsClient, ValidationResult};
use crate::resources::{Capabilities, ProviderRef};
use crate::transport::TransportBootstrap;

/// Builds clients for out-of-process providers.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(
        &self,
        address: &str,
        provider_ref: &ProviderRef,
        source_namespace: &str,
    ) -> Result<Arc<dyn SecretsClient>>;
}

/// Dials providers over (m)TLS gRPC.
#[derive(Debug, Clone)]
pub struct GrpcConnector {
    bootstrap: TransportBootstrap,
    request_timeout: Duration,
}

impl GrpcConnector {
    pub fn new(bootstrap: TransportBootstrap, request_timeout: Duration) -> Self {
        Self { bootstrap, request_timeout }
    }
}

#[async_trait]
impl RemoteConnector for GrpcConnector {
    async fn connect(
        &self,
        address: &str,
        provider_ref: &ProviderRef,
        source_namespace: &str,
    ) -> Result<Arc<dyn SecretsClient>> {
        let channel = self.bootstrap.connect(address).await?;
        Ok(Arc::new(RemoteSecretsClient::new(
            channel,
            address,
            ProviderReference::from(provider_ref),
            source_namespace,
            self.request_timeout,
        )))
    }
}

pub struct RemoteSecretsClient {
    client: SecretStoreProviderClient<Channel>,
    address: String,
    provider_ref: ProviderReference,
    source_namespace: String,
    request_timeout: Duration,
    closed: AtomicBool,
}

impl std::fmt::Debug for RemoteSecretsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSecretsClient")
            .field("address", &self.address)
            .field("provider_ref", &self.provider_ref)
            .field("source_namespace", &self.source_namespace)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl RemoteSecretsClient {
    pub fn new(
        channel: Channel,
        address: impl Into<String>,
        provider_ref: ProviderReference,
        source_namespace: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            client: SecretStoreProviderClient::new(channel),
            address: address.into(),
            provider_ref,
            source_namespace: source_namespace.into(),
            request_timeout,
            closed: AtomicBool::new(false),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Fresh client handle plus a request carrying the deadline.
    fn call<T>(&self, message: T) -> Result<(SecretStoreProviderClient<Channel>, tonic::Request<T>)> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::connection(format!("client for provider at {} is closed", self.address)));
        }
        let mut request = tonic::Request::new(message);
        request.set_timeout(self.request_timeout);
        Ok((self.client.clone(), request))
    }

    fn reference(&self) -> Option<ProviderReference> {
        Some(self.provider_ref.clone())
    }

    pub async fn capabilities(&self) -> Result<Capabilities> {
        let (mut client, request) = self.call(CapabilitiesRequest {
            provider_ref: self.reference(),
            source_namespace: self.source_namespace.clone(),
        })?;
        let response = client.capabilities(request).await.map_err(Error::from_status)?.into_inner();
        Ok(proto::store_capabilities(response.capabilities)?.into())
    }
}

#[async_trait]
impl SecretsClient for RemoteSecretsClient {
    async fn get_secret(&self, remote_ref: &RemoteRef) -> Result<Vec<u8>> {
        let (mut client, request) = self.call(GetSecretRequest {
            provider_ref: self.reference(),
            remote_ref: Some(remote_ref.into()),
            source_namespace: self.source_namespace.clone(),
        })?;
        let response = client.get_secret(request).await.map_err(Error::from_status)?;
        Ok(response.into_inner().value)
    }

    async fn push_secret(&self, value: &[u8], remote_ref: &PushRemoteRef) -> Result<()> {
        let (mut client, request) = self.call(PushSecretRequest {
            provider_ref: self.reference(),
            value: value.to_vec(),
            push_ref: Some(remote_ref.into()),
            source_namespace: self.source_namespace.clone(),
        })?;
        client.push_secret(request).await.map_err(Error::from_status)?;
        Ok(())
    }

    async fn delete_secret(&self, remote_ref: &PushRemoteRef) -> Result<()> {
        let (mut client, request) = self.call(DeleteSecretRequest {
            provider_ref: self.reference(),
            push_ref: Some(remote_ref.into()),
            source_namespace: self.source_namespace.clone(),
        })?;
        client.delete_secret(request).await.map_err(Error::from_status)?;
        Ok(())
    }

    async fn secret_exists(&self, remote_ref: &PushRemoteRef) -> Result<bool> {
        let (mut client, request) = self.call(SecretExistsRequest {
            provider_ref: self.reference(),
            push_ref: Some(remote_ref.into()),
            source_namespace: self.source_namespace.clone(),
        })?;
        let response = client.secret_exists(request).await.map_err(Error::from_status)?;
        Ok(response.into_inner().exists)
    }

    async fn get_all_secrets(&self, find: &FindQuery) -> Result<SecretMap> {
        let (mut client, request) = self.call(GetAllSecretsRequest {
            provider_ref: self.reference(),
            find: Some(find.into()),
            source_namespace: self.source_namespace.clone(),
        })?;
        let response = client.get_all_secrets(request).await.map_err(Error::from_status)?;
        Ok(response.into_inner().secrets.into_iter().collect())
    }

    async fn validate(&self) -> Result<ValidationResult> {
        let (mut client, request) = self.call(ValidateRequest {
            provider_ref: self.reference(),
            source_namespace: self.source_namespace.clone(),
        })?;
        let response = client.validate(request).await.map_err(Error::from_status)?.into_inner();
        let status = proto::validation_status(response.status)?;
        if !response.message.is_empty() {
            debug!(address = %self.address, message = %response.message, "Provider validation message");
        }
        Ok(status.into())
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(address = %self.address, provider = %self.provider_ref.name, "Closed remote provider client");
        }
        Ok(())
    }
}
