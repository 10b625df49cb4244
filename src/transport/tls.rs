//! TLS material for provider connections.
//!
//! Clients read theirs from a secret in the trust namespace; the adapter
//! server reads its from PEM files.

use std::path::{Path, PathBuf};

use tonic::transport::{Certificate, ClientTlsConfig, Identity, ServerTlsConfig};
use tracing::debug;

use super::certificates::{parse_certificates, validate_key_material, CertificateInfo};
use crate::errors::{Error, Result, TlsError};
use crate::resources::SecretObject;
use crate::store::ObjectStore;

pub const CA_CERT_KEY: &str = "ca.crt";
pub const TLS_CERT_KEY: &str = "tls.crt";
pub const TLS_KEY_KEY: &str = "tls.key";

/// mTLS material a provider client presents.
#[derive(Clone)]
pub struct ClientTlsMaterial {
    ca_pem: Vec<u8>,
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
    pub leaf: CertificateInfo,
}

impl std::fmt::Debug for ClientTlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientTlsMaterial").field("leaf", &self.leaf).finish_non_exhaustive()
    }
}

fn secret_entry(secret: &SecretObject, key: &str) -> std::result::Result<Vec<u8>, TlsError> {
    secret
        .get(key)
        .filter(|value| !value.is_empty())
        .map(<[u8]>::to_vec)
        .ok_or_else(|| TlsError::MissingSecretKey { secret: secret.metadata.key(), key: key.to_string() })
}

impl ClientTlsMaterial {
    pub fn from_pem(ca_pem: Vec<u8>, cert_pem: Vec<u8>, key_pem: Vec<u8>, origin: &str) -> Result<Self> {
        parse_certificates(&ca_pem, &format!("{} {}", origin, CA_CERT_KEY))?;
        let leaf = validate_key_material(&cert_pem, &key_pem, &format!("{} {}", origin, TLS_CERT_KEY))?;
        Ok(Self { ca_pem, cert_pem, key_pem, leaf })
    }

    /// Load and validate `ca.crt`, `tls.crt` and `tls.key` from `namespace/secret_name`.
    pub async fn load_from_secret(
        object_store: &dyn ObjectStore,
        secret_name: &str,
        namespace: &str,
    ) -> Result<Self> {
        let secret = object_store
            .get_secret(secret_name, namespace)
            .await?
            .ok_or_else(|| Error::not_found("Secret", format!("{}/{}", namespace, secret_name)))?;

        let origin = format!("secret {}", secret.metadata.key());
        let material = Self::from_pem(
            secret_entry(&secret, CA_CERT_KEY)?,
            secret_entry(&secret, TLS_CERT_KEY)?,
            secret_entry(&secret, TLS_KEY_KEY)?,
            &origin,
        )?;
        debug!(
            secret = %secret.metadata.key(),
            subject = %material.leaf.subject,
            not_after = %material.leaf.not_after,
            "Loaded provider client TLS material"
        );
        Ok(material)
    }

    /// Client TLS configuration verifying the server as `domain`.
    pub fn client_config(&self, domain: &str) -> ClientTlsConfig {
        ClientTlsConfig::new()
            .ca_certificate(Certificate::from_pem(&self.ca_pem))
            .identity(Identity::from_pem(&self.cert_pem, &self.key_pem))
            .domain_name(domain.to_string())
    }
}

/// Server-side mTLS material: an identity plus the CA that client
/// certificates must chain to.
#[derive(Clone)]
pub struct ServerTlsMaterial {
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
    client_ca_pem: Vec<u8>,
    pub leaf: CertificateInfo,
}

impl std::fmt::Debug for ServerTlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerTlsMaterial").field("leaf", &self.leaf).finish_non_exhaustive()
    }
}

async fn read_pem(path: &Path) -> std::result::Result<Vec<u8>, TlsError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| TlsError::FileReadError { path: path.to_path_buf(), source: e })
}

impl ServerTlsMaterial {
    pub async fn load_from_files(
        cert_path: Option<&Path>,
        key_path: Option<&Path>,
        client_ca_path: Option<&Path>,
    ) -> Result<Self> {
        let cert_path = cert_path.ok_or(TlsError::MissingCertificatePath)?;
        let key_path = key_path.ok_or(TlsError::MissingPrivateKeyPath)?;
        let client_ca_path = client_ca_path.ok_or(TlsError::MissingClientCaPath)?;

        let cert_pem = read_pem(cert_path).await?;
        let key_pem = read_pem(key_path).await?;
        let client_ca_pem = read_pem(client_ca_path).await?;

        parse_certificates(&client_ca_pem, &client_ca_path.display().to_string())?;
        let leaf = validate_key_material(&cert_pem, &key_pem, &cert_path.display().to_string())?;

        Ok(Self { cert_pem, key_pem, client_ca_pem, leaf })
    }

    pub fn server_config(&self) -> ServerTlsConfig {
        ServerTlsConfig::new()
            .identity(Identity::from_pem(&self.cert_pem, &self.key_pem))
            .client_ca_root(Certificate::from_pem(&self.client_ca_pem))
    }
}

/// Paths the adapter server reads its TLS material from.
#[derive(Debug, Clone, Default)]
pub struct ServerTlsPaths {
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub client_ca_file: Option<PathBuf>,
}

impl ServerTlsPaths {
    pub async fn load(&self) -> Result<ServerTlsMaterial> {
        ServerTlsMaterial::load_from_files(
            self.cert_file.as_deref(),
            self.key_file.as_deref(),
            self.client_ca_file.as_deref(),
        )
        .await
    }
}
