//! # Error Handling
//!
//! Error taxonomy for the provider client manager and the adapter layer,
//! built on `thiserror`. Resolution and authorization failures are returned
//! as-is; remote backend failures are carried as [`Error::Upstream`] with the
//! backend-supplied detail.

pub mod tls;
pub mod types;

pub use tls::TlsError;
pub use types::{CloseFailure, Error, Result};
