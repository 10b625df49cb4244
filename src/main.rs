use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use secretlink::{
    adapter::{
        bind, serve, server_tls, AdapterServer, GeneratorMapping, ObjectStoreSpecMapper,
        ProviderMapping, ResourceKind,
    },
    cli::Cli,
    observability::{init_observability, log_config_info},
    provider::{FakeGenerator, FakeProvider, Generator, Provider},
    resources::ProviderKind,
    store::InMemoryObjectStore,
    transport::install_rustls_provider,
    AppConfig, APP_NAME, VERSION,
};

const FAKE_PROVIDER_API_VERSION: &str = "provider.secretlink.io/v1alpha1";
const FAKE_GENERATOR_API_VERSION: &str = "generators.secretlink.io/v1alpha1";

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down gracefully"),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    install_rustls_provider();

    // Optional; a missing .env is fine.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    cli.apply(&mut config);
    config.validate().context("validating configuration")?;

    init_observability(&config.observability, config.adapter.verbose)?;
    info!(app_name = APP_NAME, version = VERSION, "Starting provider adapter");
    log_config_info(&config);

    let objects = Arc::new(InMemoryObjectStore::new());
    if let Some(dir) = &cli.manifests {
        let count = objects
            .load_manifests(dir)
            .await
            .with_context(|| format!("loading manifests from {}", dir.display()))?;
        info!(manifests = %dir.display(), objects = count, "Seeded object store");
    }

    let fake_kind = ResourceKind::new(FAKE_PROVIDER_API_VERSION, "Fake");
    let mut provider_mapping = ProviderMapping::new();
    provider_mapping.insert(fake_kind.clone(), Arc::new(FakeProvider::new()) as Arc<dyn Provider>);
    let spec_mapper = ObjectStoreSpecMapper::new(objects.clone()).with_kind(fake_kind, ProviderKind::Fake);

    let mut generator_mapping = GeneratorMapping::new();
    generator_mapping.insert(
        ResourceKind::new(FAKE_GENERATOR_API_VERSION, "Fake"),
        Arc::new(FakeGenerator::new()) as Arc<dyn Generator>,
    );

    let adapter = AdapterServer::new(objects, provider_mapping, Arc::new(spec_mapper), generator_mapping);
    info!("Using in-process Fake provider wrapped with the provider adapter");

    let tls = server_tls(&config.adapter).await?;
    let listener = bind(&config.adapter).await?;
    serve(adapter, listener, tls, shutdown_signal()).await?;

    info!("Provider adapter shutdown completed");
    Ok(())
}
