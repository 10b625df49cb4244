//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tonic::transport::ServerTlsConfig;
use tonic::Code;

use secretlink::adapter::{
    serve, AdapterServer, GeneratorMapping, ObjectStoreSpecMapper, ProviderMapping, RemoteConnector, ResourceKind,
};
use secretlink::config::ManagerConfig;
use secretlink::provider::{
    FakeGenerator, FakeProvider, FindQuery, Generator, Provider, ProviderFactory, PushRemoteRef, RemoteRef, SecretMap,
    SecretsClient, ValidationResult,
};
use secretlink::resources::{
    Capabilities, ClusterSecretStoreCondition, FakeProviderData, FakeProviderSpec, GenericStore,
    ObjectMeta, ProviderKind, ProviderRef, ProviderResource, SecretStoreSpec, StoreKind,
    StoreProvider,
};
use secretlink::store::{DynamicObject, InMemoryObjectStore, ObjectStore};
use secretlink::{ClientManager, Error, Result};

pub const FAKE_API_VERSION: &str = "provider.secretlink.io/v1alpha1";
pub const FAKE_GENERATOR_API_VERSION: &str = "generators.secretlink.io/v1alpha1";

pub fn fake_spec(entries: &[(&str, &str)]) -> SecretStoreSpec {
    SecretStoreSpec::new(StoreProvider::Fake(FakeProviderSpec {
        data: entries
            .iter()
            .map(|(key, value)| FakeProviderData { key: key.to_string(), value: value.to_string(), version: None })
            .collect(),
    }))
}

pub fn secret_store(name: &str, namespace: &str, entries: &[(&str, &str)]) -> GenericStore {
    GenericStore::new(StoreKind::SecretStore, ObjectMeta::namespaced(name, namespace), fake_spec(entries))
}

pub fn cluster_store(
    name: &str,
    entries: &[(&str, &str)],
    conditions: Vec<ClusterSecretStoreCondition>,
) -> GenericStore {
    let mut spec = fake_spec(entries);
    spec.conditions = conditions;
    GenericStore::new(StoreKind::ClusterSecretStore, ObjectMeta::new(name), spec)
}

pub fn provider_ref(name: &str) -> ProviderRef {
    ProviderRef {
        api_version: FAKE_API_VERSION.to_string(),
        kind: "Fake".to_string(),
        name: name.to_string(),
        namespace: String::new(),
    }
}

pub fn provider_resource(name: &str, namespace: &str, address: &str) -> ProviderResource {
    ProviderResource::new(ObjectMeta::namespaced(name, namespace), address, provider_ref(name))
}

/// In-memory client that records closes and can be told to fail them.
#[derive(Debug, Default)]
pub struct RecordingClient {
    pub address: String,
    pub fail_close: bool,
    pub closed: AtomicBool,
    pub closes: AtomicUsize,
}

impl RecordingClient {
    pub fn new(address: &str, fail_close: bool) -> Self {
        Self { address: address.to_string(), fail_close, ..Default::default() }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::upstream(Code::FailedPrecondition, "client is closed"));
        }
        Ok(())
    }
}

#[async_trait]
impl SecretsClient for RecordingClient {
    async fn get_secret(&self, remote_ref: &RemoteRef) -> Result<Vec<u8>> {
        self.ensure_open()?;
        Ok(format!("{}@{}", remote_ref.key, self.address).into_bytes())
    }

    async fn push_secret(&self, _value: &[u8], _remote_ref: &PushRemoteRef) -> Result<()> {
        self.ensure_open()
    }

    async fn delete_secret(&self, _remote_ref: &PushRemoteRef) -> Result<()> {
        self.ensure_open()
    }

    async fn secret_exists(&self, _remote_ref: &PushRemoteRef) -> Result<bool> {
        self.ensure_open()?;
        Ok(false)
    }

    async fn get_all_secrets(&self, _find: &FindQuery) -> Result<SecretMap> {
        self.ensure_open()?;
        Ok(SecretMap::new())
    }

    async fn validate(&self) -> Result<ValidationResult> {
        self.ensure_open()?;
        Ok(ValidationResult::Ready)
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::Release);
        if self.fail_close {
            return Err(Error::connection(format!("close of {} failed", self.address)));
        }
        Ok(())
    }
}

/// Connector that hands out [`RecordingClient`]s and remembers them.
#[derive(Debug, Default)]
pub struct CountingConnector {
    pub connects: AtomicUsize,
    /// Addresses whose clients fail to close.
    pub failing: Vec<String>,
    pub delay: Duration,
    pub clients: std::sync::Mutex<Vec<Arc<RecordingClient>>>,
}

impl CountingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failing(addresses: &[&str]) -> Self {
        Self { failing: addresses.iter().map(|a| a.to_string()).collect(), ..Default::default() }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay, ..Default::default() }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn clients(&self) -> Vec<Arc<RecordingClient>> {
        self.clients.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteConnector for CountingConnector {
    async fn connect(
        &self,
        address: &str,
        _provider_ref: &ProviderRef,
        _source_namespace: &str,
    ) -> Result<Arc<dyn SecretsClient>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let client = Arc::new(RecordingClient::new(address, self.failing.iter().any(|a| a == address)));
        self.clients.lock().unwrap().push(client.clone());
        Ok(client)
    }
}

/// Fake provider that counts constructions and can slow them down.
#[derive(Debug, Default)]
pub struct CountingProvider {
    pub constructions: AtomicUsize,
    pub delay: Duration,
}

impl CountingProvider {
    pub fn with_delay(delay: Duration) -> Self {
        Self { constructions: AtomicUsize::new(0), delay }
    }

    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for CountingProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Fake
    }

    fn capabilities(&self, store: &GenericStore) -> Capabilities {
        FakeProvider.capabilities(store)
    }

    fn validate_store(&self, store: &GenericStore) -> Result<()> {
        FakeProvider.validate_store(store)
    }

    async fn new_client(
        &self,
        store: &GenericStore,
        object_store: Arc<dyn ObjectStore>,
        namespace: &str,
    ) -> Result<Arc<dyn SecretsClient>> {
        self.constructions.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        FakeProvider.new_client(store, object_store, namespace).await
    }
}

pub fn manager_config(controller_class: &str) -> ManagerConfig {
    ManagerConfig {
        controller_class: controller_class.to_string(),
        close_timeout_seconds: 1,
        ..Default::default()
    }
}

/// Manager over `objects` with the given in-process provider and connector.
pub fn manager_with(
    objects: Arc<InMemoryObjectStore>,
    provider: Arc<dyn Provider>,
    connector: Arc<dyn RemoteConnector>,
    config: &ManagerConfig,
) -> ClientManager {
    let factory = ProviderFactory::new(objects.clone()).with_provider(provider);
    ClientManager::new(objects, factory, connector, config)
}

pub fn manager(objects: Arc<InMemoryObjectStore>, connector: Arc<dyn RemoteConnector>) -> ClientManager {
    manager_with(objects, Arc::new(FakeProvider), connector, &manager_config(""))
}

/// Manager that reaches providers over gRPC, wired from `config`.
pub fn grpc_manager(objects: Arc<InMemoryObjectStore>, config: &ManagerConfig) -> ClientManager {
    let factory = ProviderFactory::new(objects.clone()).with_provider(Arc::new(FakeProvider));
    ClientManager::from_config(objects, factory, config)
}

/// Backend configuration object the adapter's `Fake` kind reads.
pub fn fake_backend(name: &str, namespace: &str, entries: &[(&str, &str)]) -> DynamicObject {
    let data: Vec<_> = entries.iter().map(|(key, value)| json!({ "key": key, "value": value })).collect();
    DynamicObject {
        api_version: FAKE_API_VERSION.to_string(),
        kind: "Fake".to_string(),
        metadata: ObjectMeta::namespaced(name, namespace),
        spec: json!({ "data": data }),
    }
}

/// Adapter serving the fake provider and the fake generator.
pub fn fake_adapter(objects: Arc<InMemoryObjectStore>) -> AdapterServer {
    let fake_kind = ResourceKind::new(FAKE_API_VERSION, "Fake");
    let mut providers = ProviderMapping::new();
    providers.insert(fake_kind.clone(), Arc::new(FakeProvider) as Arc<dyn Provider>);
    let spec_mapper = ObjectStoreSpecMapper::new(objects.clone()).with_kind(fake_kind, ProviderKind::Fake);

    let mut generators = GeneratorMapping::new();
    generators.insert(
        ResourceKind::new(FAKE_GENERATOR_API_VERSION, "Fake"),
        Arc::new(FakeGenerator) as Arc<dyn Generator>,
    );

    AdapterServer::new(objects, providers, Arc::new(spec_mapper), generators)
}

/// An adapter server on an ephemeral loopback port.
pub struct RunningAdapter {
    pub port: u16,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl RunningAdapter {
    pub async fn start(adapter: AdapterServer, tls: Option<ServerTlsConfig>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(serve(adapter, listener, tls, async move {
            let _ = rx.await;
        }));
        Self { port, shutdown: Some(tx), task }
    }

    /// `host:port` as a provider resource would carry it.
    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task.await.unwrap().unwrap();
    }
}
