//! Generated messages and client/server glue of the provider and generator
//! contracts (`proto/secretlink`), plus conversions to the crate's types.

use crate::errors::{Error, Result};
use crate::provider::{FindQuery, PushRemoteRef, RemoteRef, ValidationResult};
use crate::resources::{Capabilities, ProviderRef};

pub mod secretlink {
    pub mod provider {
        pub mod v1 {
            tonic::include_proto!("secretlink.provider.v1");
        }
    }

    pub mod generator {
        pub mod v1 {
            tonic::include_proto!("secretlink.generator.v1");
        }
    }
}

pub use secretlink::generator::v1::*;
pub use secretlink::provider::v1::*;

pub const STORE_SERVICE_NAME: &str = "secretlink.provider.v1.SecretStoreProvider";
pub const GENERATOR_SERVICE_NAME: &str = "secretlink.generator.v1.GeneratorProvider";

/// Encoded descriptors of both contracts, served by reflection.
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("secretlink_descriptor");

impl From<&ProviderRef> for ProviderReference {
    fn from(reference: &ProviderRef) -> Self {
        Self {
            api_version: reference.api_version.clone(),
            kind: reference.kind.clone(),
            name: reference.name.clone(),
            namespace: reference.namespace.clone(),
        }
    }
}

impl From<ProviderReference> for ProviderRef {
    fn from(reference: ProviderReference) -> Self {
        Self {
            api_version: reference.api_version,
            kind: reference.kind,
            name: reference.name,
            namespace: reference.namespace,
        }
    }
}

impl From<&RemoteRef> for RemoteReference {
    fn from(r: &RemoteRef) -> Self {
        Self { key: r.key.clone(), property: r.property.clone(), version: r.version.clone() }
    }
}

impl From<RemoteReference> for RemoteRef {
    fn from(r: RemoteReference) -> Self {
        Self { key: r.key, property: r.property, version: r.version }
    }
}

impl From<&PushRemoteRef> for PushReference {
    fn from(r: &PushRemoteRef) -> Self {
        Self { remote_key: r.remote_key.clone(), property: r.property.clone() }
    }
}

impl From<PushReference> for PushRemoteRef {
    fn from(r: PushReference) -> Self {
        Self { remote_key: r.remote_key, property: r.property }
    }
}

impl From<&FindQuery> for FindRequest {
    fn from(f: &FindQuery) -> Self {
        Self {
            name_regex: f.name_regex.clone(),
            path: f.path.clone(),
            tags: f.tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }
}

impl From<FindRequest> for FindQuery {
    fn from(f: FindRequest) -> Self {
        Self { name_regex: f.name_regex, path: f.path, tags: f.tags.into_iter().collect() }
    }
}

impl From<ValidationResult> for ValidationStatus {
    fn from(result: ValidationResult) -> Self {
        match result {
            ValidationResult::Ready => Self::Ready,
            ValidationResult::Unknown => Self::Unknown,
            ValidationResult::Error => Self::Error,
        }
    }
}

impl From<ValidationStatus> for ValidationResult {
    fn from(status: ValidationStatus) -> Self {
        match status {
            ValidationStatus::Ready => Self::Ready,
            ValidationStatus::Unknown => Self::Unknown,
            ValidationStatus::Error => Self::Error,
        }
    }
}

impl From<Capabilities> for SecretStoreCapabilities {
    fn from(capabilities: Capabilities) -> Self {
        match capabilities {
            Capabilities::ReadOnly => Self::ReadOnly,
            Capabilities::WriteOnly => Self::WriteOnly,
            Capabilities::ReadWrite => Self::ReadWrite,
        }
    }
}

impl From<SecretStoreCapabilities> for Capabilities {
    fn from(capabilities: SecretStoreCapabilities) -> Self {
        match capabilities {
            SecretStoreCapabilities::ReadOnly => Self::ReadOnly,
            SecretStoreCapabilities::WriteOnly => Self::WriteOnly,
            SecretStoreCapabilities::ReadWrite => Self::ReadWrite,
        }
    }
}

/// Unwrap a required message field.
pub fn required<T>(field: Option<T>, name: &str) -> Result<T> {
    field.ok_or_else(|| Error::config(format!("request is missing {}", name)))
}

/// Decode a wire enum, rejecting unknown values.
pub fn validation_status(value: i32) -> Result<ValidationStatus> {
    ValidationStatus::try_from(value)
        .map_err(|_| Error::internal(format!("unknown validation status {}", value)))
}

pub fn store_capabilities(value: i32) -> Result<SecretStoreCapabilities> {
    SecretStoreCapabilities::try_from(value)
        .map_err(|_| Error::internal(format!("unknown capabilities value {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_provider_reference_conversion() {
        let reference = ProviderRef {
            api_version: "provider.secretlink.io/v1alpha1".into(),
            kind: "Fake".into(),
            name: "backend".into(),
            namespace: String::new(),
        };
        let wire = ProviderReference::from(&reference);
        assert_eq!(ProviderRef::from(wire), reference);
    }

    #[test]
    fn test_request_encoding_keeps_map_fields() {
        let mut request = GetAllSecretsRequest {
            provider_ref: Some(ProviderReference { name: "b".into(), ..Default::default() }),
            find: Some(FindRequest { name_regex: "^db".into(), ..Default::default() }),
            source_namespace: "payments".into(),
        };
        request.find.as_mut().unwrap().tags.insert("team".into(), "payments".into());

        let decoded = GetAllSecretsRequest::decode(request.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_descriptor_set_describes_both_services() {
        let set = prost_types::FileDescriptorSet::decode(FILE_DESCRIPTOR_SET).unwrap();
        let services: Vec<String> = set
            .file
            .iter()
            .flat_map(|file| {
                let package = file.package().to_string();
                file.service.iter().map(move |service| format!("{}.{}", package, service.name()))
            })
            .collect();
        assert!(services.contains(&STORE_SERVICE_NAME.to_string()));
        assert!(services.contains(&GENERATOR_SERVICE_NAME.to_string()));

        let store = set.file.iter().flat_map(|f| &f.service).find(|s| s.name() == "SecretStoreProvider").unwrap();
        assert_eq!(store.method.len(), 7);
    }

    #[test]
    fn test_unknown_enum_values_are_rejected() {
        assert!(validation_status(1).is_ok());
        assert!(validation_status(42).is_err());
        assert_eq!(Capabilities::from(store_capabilities(2).unwrap()), Capabilities::ReadWrite);
    }
}
