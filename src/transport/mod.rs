//! # Secure Transport
//!
//! Certificate parsing and validation, loading of mTLS material, and dialing
//! of provider channels.

pub mod certificates;
pub mod channel;
pub mod tls;

pub use certificates::{CertificateInfo, validate_key_material};
pub use channel::{host_of, TransportBootstrap, TransportSettings};
pub use tls::{ClientTlsMaterial, ServerTlsMaterial, ServerTlsPaths};

/// Install the ring crypto provider as the process default. Safe to call
/// more than once.
pub fn install_rustls_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}
