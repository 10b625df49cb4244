use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// TLS-specific error variants surfaced while loading transport material.
#[derive(Debug, Error)]
pub enum TlsError {
    /// TLS has been enabled but the certificate path was not provided.
    #[error("TLS is enabled but certificate path is not configured")]
    MissingCertificatePath,

    /// TLS has been enabled but the private key path was not provided.
    #[error("TLS is enabled but private key path is not configured")]
    MissingPrivateKeyPath,

    /// mTLS requires a CA bundle to verify the peer.
    #[error("TLS is enabled but client CA path is not configured")]
    MissingClientCaPath,

    /// A PEM file could not be read.
    #[error("Failed to read {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The secret holding transport material lacks a required key.
    #[error("Secret {secret} is missing key {key:?}")]
    MissingSecretKey { secret: String, key: String },

    /// No certificates were found in the supplied PEM.
    #[error("{origin} does not contain any certificates")]
    EmptyCertificateChain { origin: String },

    /// The certificate PEM contents were invalid or unreadable.
    #[error("{origin} is not a valid certificate PEM: {source}")]
    InvalidCertificatePem {
        origin: String,
        #[source]
        source: anyhow::Error,
    },

    /// The private key PEM contents were invalid or unsupported.
    #[error("{origin} does not contain a supported private key")]
    InvalidPrivateKey {
        origin: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// The certificate is not yet valid.
    #[error("Certificate {origin} is not valid before {not_before}")]
    CertificateNotYetValid { origin: String, not_before: DateTime<Utc> },

    /// The certificate is expired.
    #[error("Certificate {origin} expired at {not_after}")]
    CertificateExpired { origin: String, not_after: DateTime<Utc> },

    /// Generic metadata extraction failure.
    #[error("Failed to extract certificate metadata from {origin}: {source}")]
    CertificateMetadata {
        origin: String,
        #[source]
        source: anyhow::Error,
    },
}
