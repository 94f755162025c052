//! Tapwire server entry point: load config, set up logging, run the tap.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use tapwire_config::{CliArgs, Config};
use tapwire_log::init_logging;
use tapwire_registry::InjectorRegistry;
use tapwire_server::{PendingInjectorFactory, ServerConfig, ServerTap};
use tapwire_stream::StreamResolver;

fn config_dir(args: &CliArgs) -> PathBuf {
    args.config.clone().unwrap_or_else(|| {
        dirs::config_dir()
            .map(|dir| dir.join("tapwire"))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = CliArgs::parse();

    let mut config = match Config::load_or_create(&config_dir(&args)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("config error: {err}, using defaults");
            Config::default()
        }
    };
    config.apply_cli_overrides(&args);

    init_logging(None, cfg!(debug_assertions), Some(&config));

    let resolver = Arc::new(StreamResolver::with_max_depth(
        config.intercept.max_unwrap_depth,
    ));
    let registry = Arc::new(InjectorRegistry::new(resolver));

    let server_config = ServerConfig::from_config(&config)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;
    let tap = ServerTap::new(server_config, registry, Arc::new(PendingInjectorFactory));

    tap.run().await
}
