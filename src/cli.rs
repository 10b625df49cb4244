//! # Command Line Interface
//!
//! Flags of the `secretlink-adapter` binary. Flags given on the command line
//! override the file and environment layers of [`AppConfig`].

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "secretlink-adapter")]
#[command(about = "Serves in-process secret providers over the provider gRPC contract")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// The server port
    #[arg(long, env = "SECRETLINK_PORT")]
    pub port: Option<u16>,

    /// Enable TLS/mTLS for the gRPC server (`--enable-tls=false` to disable)
    #[arg(long, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set)]
    pub enable_tls: Option<bool>,

    /// Enable verbose connection-level debugging
    #[arg(short, long)]
    pub verbose: bool,

    /// Directory of YAML manifests to seed the object store with
    #[arg(long, env = "SECRETLINK_MANIFESTS")]
    pub manifests: Option<PathBuf>,

    /// Configuration file path (YAML or TOML)
    #[arg(short, long, env = "SECRETLINK_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Apply explicit flags on top of the loaded configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.adapter.port = port;
        }
        if let Some(enable_tls) = self.enable_tls {
            config.adapter.enable_tls = enable_tls;
        }
        if self.verbose {
            config.adapter.verbose = true;
        }
    }
}
