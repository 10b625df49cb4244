use anyhow::anyhow;
use chrono::{DateTime, TimeZone, Utc};
use rustls::pki_types::{pem::PemObject, CertificateDer, PrivateKeyDer};
use x509_parser::prelude::*;

use crate::errors::TlsError;

/// Metadata extracted from a leaf certificate for logging and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

/// Parse every certificate in a PEM blob. `origin` names the source in errors.
pub fn parse_certificates(pem: &[u8], origin: &str) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let certs: Vec<CertificateDer<'static>> = CertificateDer::pem_slice_iter(pem)
        .map(|result| {
            result.map_err(|err| TlsError::InvalidCertificatePem {
                origin: origin.to_string(),
                source: anyhow!(err),
            })
        })
        .collect::<Result<_, _>>()?;

    if certs.is_empty() {
        return Err(TlsError::EmptyCertificateChain { origin: origin.to_string() });
    }
    Ok(certs)
}

pub fn parse_private_key(pem: &[u8], origin: &str) -> Result<PrivateKeyDer<'static>, TlsError> {
    PrivateKeyDer::from_pem_slice(pem).map_err(|err| TlsError::InvalidPrivateKey {
        origin: origin.to_string(),
        source: Some(anyhow!(err)),
    })
}

pub fn certificate_info(cert: &CertificateDer<'_>, origin: &str) -> Result<CertificateInfo, TlsError> {
    let (_, parsed) = X509Certificate::from_der(cert.as_ref()).map_err(|err| {
        TlsError::CertificateMetadata { origin: origin.to_string(), source: anyhow!(err) }
    })?;

    let validity = parsed.validity();
    let not_before = to_datetime(validity.not_before.timestamp(), origin)?;
    let not_after = to_datetime(validity.not_after.timestamp(), origin)?;

    Ok(CertificateInfo {
        subject: parsed.subject().to_string(),
        issuer: parsed.issuer().to_string(),
        not_before,
        not_after,
    })
}

fn to_datetime(timestamp: i64, origin: &str) -> Result<DateTime<Utc>, TlsError> {
    Utc.timestamp_opt(timestamp, 0).single().ok_or_else(|| TlsError::CertificateMetadata {
        origin: origin.to_string(),
        source: anyhow!("certificate timestamp {} out of range", timestamp),
    })
}

pub fn validate_certificate_dates(info: &CertificateInfo, origin: &str) -> Result<(), TlsError> {
    let now = Utc::now();
    if now < info.not_before {
        return Err(TlsError::CertificateNotYetValid {
            origin: origin.to_string(),
            not_before: info.not_before,
        });
    }
    if now > info.not_after {
        return Err(TlsError::CertificateExpired { origin: origin.to_string(), not_after: info.not_after });
    }
    Ok(())
}

/// Parse and check a certificate chain plus its private key. Returns the
/// leaf metadata.
pub fn validate_key_material(
    cert_pem: &[u8],
    key_pem: &[u8],
    origin: &str,
) -> Result<CertificateInfo, TlsError> {
    let chain = parse_certificates(cert_pem, origin)?;
    parse_private_key(key_pem, origin)?;
    let info = certificate_info(&chain[0], origin)?;
    validate_certificate_dates(&info, origin)?;
    Ok(info)
}
