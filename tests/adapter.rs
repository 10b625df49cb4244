//! The adapter server over a real loopback connection, driven by the
//! remote client and by the manager.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tonic::transport::{Channel, Endpoint};
use tonic::Code;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;

use common::*;
use secretlink::adapter::proto::{
    generator_provider_client::GeneratorProviderClient, CleanupRequest, GenerateRequest, ProviderReference,
    GENERATOR_SERVICE_NAME, STORE_SERVICE_NAME,
};
use secretlink::adapter::RemoteSecretsClient;
use secretlink::config::ManagerConfig;
use secretlink::provider::{FindQuery, PushRemoteRef, RemoteRef, SecretsClient, ValidationResult};
use secretlink::resources::{Capabilities, ProviderRef, StoreRef};
use secretlink::store::InMemoryObjectStore;
use secretlink::Error;

fn backend_objects() -> Arc<InMemoryObjectStore> {
    let objects = Arc::new(InMemoryObjectStore::new());
    objects.apply_resource(fake_backend(
        "backend",
        "default",
        &[("db", "hunter2"), ("db-json", r#"{"user":"admin","pass":"s3cret"}"#), ("api", "token")],
    ));
    objects
}

async fn channel(server: &RunningAdapter) -> Channel {
    Endpoint::from_shared(format!("http://{}", server.address()))
        .unwrap()
        .connect_timeout(Duration::from_secs(2))
        .connect()
        .await
        .unwrap()
}

fn remote_client(channel: Channel, reference: ProviderRef) -> RemoteSecretsClient {
    RemoteSecretsClient::new(
        channel,
        "adapter-under-test",
        ProviderReference::from(&reference),
        "default",
        Duration::from_secs(5),
    )
}

#[tokio::test]
async fn test_remote_client_reads_through_adapter() {
    let server = RunningAdapter::start(fake_adapter(backend_objects()), None).await;
    let client = remote_client(channel(&server).await, provider_ref("backend"));

    assert_eq!(client.get_secret(&RemoteRef::new("db")).await.unwrap(), b"hunter2");
    assert_eq!(
        client.get_secret(&RemoteRef::new("db-json").with_property("pass")).await.unwrap(),
        b"s3cret"
    );
    assert!(client.secret_exists(&PushRemoteRef::new("api")).await.unwrap());
    assert!(!client.secret_exists(&PushRemoteRef::new("absent")).await.unwrap());

    let all = client
        .get_all_secrets(&FindQuery { name_regex: "^db".to_string(), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(all.keys().map(String::as_str).collect::<Vec<_>>(), vec!["db", "db-json"]);

    assert_eq!(client.validate().await.unwrap(), ValidationResult::Ready);
    assert_eq!(client.capabilities().await.unwrap(), Capabilities::ReadWrite);

    server.stop().await;
}

#[tokio::test]
async fn test_backend_errors_keep_their_code() {
    let server = RunningAdapter::start(fake_adapter(backend_objects()), None).await;
    let client = remote_client(channel(&server).await, provider_ref("backend"));

    match client.get_secret(&RemoteRef::new("absent")).await.unwrap_err() {
        Error::Upstream { code, message } => {
            assert_eq!(code, Code::NotFound);
            assert!(message.contains("absent"));
        }
        other => panic!("unexpected error: {other}"),
    }

    server.stop().await;
}

#[tokio::test]
async fn test_unknown_resources_are_rejected() {
    let server = RunningAdapter::start(fake_adapter(backend_objects()), None).await;
    let channel = channel(&server).await;

    let missing = remote_client(channel.clone(), provider_ref("nope"));
    match missing.get_secret(&RemoteRef::new("db")).await.unwrap_err() {
        Error::Upstream { code, .. } => assert_eq!(code, Code::NotFound),
        other => panic!("unexpected error: {other}"),
    }

    let mut reference = provider_ref("backend");
    reference.kind = "Vault".to_string();
    let unmapped = remote_client(channel, reference);
    match unmapped.get_secret(&RemoteRef::new("db")).await.unwrap_err() {
        Error::Upstream { code, .. } => assert_eq!(code, Code::InvalidArgument),
        other => panic!("unexpected error: {other}"),
    }

    server.stop().await;
}

#[tokio::test]
async fn test_closed_remote_client_rejects_calls() {
    let server = RunningAdapter::start(fake_adapter(backend_objects()), None).await;
    let client = remote_client(channel(&server).await, provider_ref("backend"));

    client.close().await.unwrap();
    client.close().await.unwrap();
    let err = client.get_secret(&RemoteRef::new("db")).await.unwrap_err();
    assert!(matches!(err, Error::Connection { .. }));

    server.stop().await;
}

#[tokio::test]
async fn test_health_reports_both_services() {
    let server = RunningAdapter::start(fake_adapter(backend_objects()), None).await;
    let mut health = HealthClient::new(channel(&server).await);

    for service in ["", STORE_SERVICE_NAME, GENERATOR_SERVICE_NAME] {
        let response = health
            .check(HealthCheckRequest { service: service.to_string() })
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.status, ServingStatus::Serving as i32, "service {:?}", service);
    }

    server.stop().await;
}

#[tokio::test]
async fn test_generator_round_trip() {
    let server = RunningAdapter::start(fake_adapter(backend_objects()), None).await;
    let mut generators = GeneratorProviderClient::new(channel(&server).await);

    let generator_json = serde_json::to_vec(&json!({
        "apiVersion": FAKE_GENERATOR_API_VERSION,
        "kind": "Fake",
        "spec": { "data": { "password": "generated" } },
    }))
    .unwrap();

    let response = generators
        .generate(GenerateRequest {
            generator_ref: None,
            generator_json: generator_json.clone(),
            namespace: "default".to_string(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.data.get("password").map(Vec::as_slice), Some(&b"generated"[..]));
    assert!(response.state.is_empty());

    generators
        .cleanup(CleanupRequest {
            generator_ref: None,
            generator_json,
            state: Vec::new(),
            namespace: "default".to_string(),
        })
        .await
        .unwrap();

    let status = generators
        .generate(GenerateRequest {
            generator_ref: None,
            generator_json: br#"{"kind":"Fake"}"#.to_vec(),
            namespace: "default".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    server.stop().await;
}

#[tokio::test]
async fn test_manager_reaches_provider_over_plaintext() {
    let adapter_objects = backend_objects();
    let server = RunningAdapter::start(fake_adapter(adapter_objects), None).await;

    let objects = Arc::new(InMemoryObjectStore::new());
    objects.apply_provider(provider_resource("backend", "default", &server.address()));
    let config = ManagerConfig { insecure_plaintext: true, request_timeout_seconds: 5, ..manager_config("") };
    let manager = grpc_manager(objects, &config);

    let client = manager.get_client(&StoreRef::provider("backend"), "default", None).await.unwrap();
    assert_eq!(client.get_secret(&RemoteRef::new("db")).await.unwrap(), b"hunter2");

    let again = manager.get_client(&StoreRef::provider("backend"), "default", None).await.unwrap();
    assert!(client.ptr_eq(&again));

    manager.close_all().await.unwrap();
    assert!(matches!(
        client.get_secret(&RemoteRef::new("db")).await.unwrap_err(),
        Error::Connection { .. }
    ));

    server.stop().await;
}
