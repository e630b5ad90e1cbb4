use bindkit::binding::BindingError;
use bindkit::config::{default_settings_path, Settings};
use bindkit::input::GilrsBackend;
use bindkit::persistence::PersistenceError;
use bindkit::BindingManager;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let settings_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(default_settings_path);
    let settings = Settings::load(&settings_path)?;

    let backend = GilrsBackend::new().map_err(|e| eyre!("Failed to open input backend: {}", e))?;
    let manager = BindingManager::new(settings.clone(), Box::new(backend));

    open_profile(&manager, &settings.default_profile).await?;

    if let Ok(profiles) = manager.list_profiles().await {
        info!("Available profiles: {:?}", profiles);
    }

    let mut changes = manager.subscribe_bindings();
    manager
        .start()
        .await
        .map_err(|e| eyre!("Failed to start binding manager: {}", e))?;

    info!("Listening for bindings, press Ctrl-C to exit");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                break;
            }

            received = changes.recv() => match received {
                Ok(batch) => {
                    for transition in &batch.transitions {
                        info!(
                            "[{}] command {} {}",
                            batch.timestamp.format("%H:%M:%S%.3f"),
                            transition.binding.command,
                            if transition.active { "pressed" } else { "released" }
                        );
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Fell behind, skipped {} notification batches", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    manager
        .stop()
        .await
        .map_err(|e| eyre!("Failed to stop binding manager: {}", e))?;
    Ok(())
}

/// Loads `name`, creating an empty profile on first run.
async fn open_profile(manager: &BindingManager, name: &str) -> Result<()> {
    match manager.load_profile(name).await {
        Ok(()) => Ok(()),
        Err(BindingError::Persistence(PersistenceError::NotFound(_))) => {
            warn!("Profile '{}' not found, creating it", name);
            manager
                .create_profile(name)
                .await
                .map_err(|e| eyre!("Failed to create profile {}: {}", name, e))
        }
        Err(e) => Err(eyre!("Failed to load profile {}: {}", name, e)),
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
