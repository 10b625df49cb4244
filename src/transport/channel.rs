//! Secure Transport Bootstrap: TLS material plus a connected channel.

use std::sync::Arc;
use std::time::Duration;

use tonic::transport::{Channel, Endpoint};
use tracing::{info, warn};

use super::tls::ClientTlsMaterial;
use crate::errors::{Error, Result};
use crate::store::ObjectStore;

/// Where client TLS material lives and how to dial.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub trust_namespace: String,
    pub client_tls_secret: String,
    /// Dial without TLS. Never the default.
    pub insecure_plaintext: bool,
    pub connect_timeout: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            trust_namespace: "secretlink-system".to_string(),
            client_tls_secret: "secretlink-provider-client-tls".to_string(),
            insecure_plaintext: false,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Clone)]
pub struct TransportBootstrap {
    object_store: Arc<dyn ObjectStore>,
    settings: TransportSettings,
}

impl std::fmt::Debug for TransportBootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportBootstrap").field("settings", &self.settings).finish()
    }
}

/// Host part of `host:port`, without IPv6 brackets.
pub fn host_of(address: &str) -> &str {
    let host = match address.rsplit_once(':') {
        Some((host, port)) if !port.contains(']') => host,
        _ => address,
    };
    host.trim_start_matches('[').trim_end_matches(']')
}

impl TransportBootstrap {
    pub fn new(object_store: Arc<dyn ObjectStore>, settings: TransportSettings) -> Self {
        Self { object_store, settings }
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    /// Load TLS material and dial `address`. Every failure surfaces as a
    /// connection error.
    pub async fn connect(&self, address: &str) -> Result<Channel> {
        let endpoint = self.endpoint(address).await.map_err(|e| match e {
            e @ Error::Connection { .. } => e,
            other => Error::connection_with_source(
                format!("failed to prepare transport to {}", address),
                Box::new(other),
            ),
        })?;

        let channel = endpoint.connect().await.map_err(|e| {
            Error::connection_with_source(format!("failed to connect to {}", address), Box::new(e))
        })?;

        info!(
            address = %address,
            tls = !self.settings.insecure_plaintext,
            "Connected to provider"
        );
        Ok(channel)
    }

    async fn endpoint(&self, address: &str) -> Result<Endpoint> {
        if self.settings.insecure_plaintext {
            warn!(address = %address, "Dialing provider without TLS");
            let endpoint = Endpoint::from_shared(format!("http://{}", address)).map_err(|e| {
                Error::connection_with_source(format!("invalid provider address {:?}", address), Box::new(e))
            })?;
            return Ok(endpoint.connect_timeout(self.settings.connect_timeout));
        }

        let material = ClientTlsMaterial::load_from_secret(
            self.object_store.as_ref(),
            &self.settings.client_tls_secret,
            &self.settings.trust_namespace,
        )
        .await?;

        Endpoint::from_shared(format!("https://{}", address))
            .map_err(|e| {
                Error::connection_with_source(format!("invalid provider address {:?}", address), Box::new(e))
            })?
            .connect_timeout(self.settings.connect_timeout)
            .tls_config(material.client_config(host_of(address)))
            .map_err(|e| {
                Error::connection_with_source(format!("invalid TLS configuration for {}", address), Box::new(e))
            })
    }
}
