use anyhow::{Context, Result};
use kidfind_core::routing::RoutingConfig;
use kidfind_core::{ArcFaceProvider, ClassifierStore, LocalClassifierIdentity};
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;

const BUS_NAME: &str = "org.kidfind.Finder1";
const OBJECT_PATH: &str = "/org/kidfind/Finder1";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("kidfindd starting");
    let config = config::Config::from_env();

    let routing = RoutingConfig::load(&config.routing_path)
        .with_context(|| format!("loading routing from {}", config.routing_path.display()))?;

    // Fail fast on missing models rather than on the first request.
    let provider = ArcFaceProvider::load(&config.model_dir)
        .with_context(|| format!("loading models from {}", config.model_dir.display()))?;
    let store = ClassifierStore::open(&config.classifier_dir)?;
    std::fs::create_dir_all(&config.training_dir)?;

    tracing::info!(
        training_dir = %config.training_dir.display(),
        classifier_dir = %config.classifier_dir.display(),
        threshold = config.match_threshold,
        "local classifier strategy ready"
    );

    let identity = LocalClassifierIdentity::new(provider, store, &config.training_dir, config.match_threshold);
    let engine = engine::spawn_engine(Box::new(identity), config.queue_depth)?;
    let service = dbus_interface::FinderService::new(engine, routing, config.match_threshold);

    let builder = if config.system_bus {
        zbus::connection::Builder::system()?
    } else {
        zbus::connection::Builder::session()?
    };
    let _connection = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await?;

    tracing::info!(bus_name = BUS_NAME, system_bus = config.system_bus, "kidfindd ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("kidfindd shutting down");

    Ok(())
}
