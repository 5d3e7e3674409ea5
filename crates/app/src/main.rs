use std::sync::Arc;

use engine::{AuthProvider, Identity, MemoryStore, RecordStore};
use rest_store::RestStore;
use uuid::Uuid;

use crate::{
    commands::Command,
    config::{AppConfig, Backend},
    error::Result,
};

mod commands;
mod config;
mod error;
mod export;
mod render;

#[tokio::main]
async fn main() {
    let (config, command) = match config::load() {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(format!(
            "gestio={level},engine={level},rest_store={level}",
            level = config.level
        ))
        .init();

    if let Err(err) = start(config, command).await {
        tracing::error!("{err}");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn start(config: AppConfig, command: Command) -> Result<()> {
    match config.backend {
        Backend::Memory => {
            tracing::info!("using the in-process store");
            let store = Arc::new(MemoryStore::signed_in(Identity {
                id: Uuid::new_v4(),
                email: (!config.email.is_empty()).then(|| config.email.clone()),
            }));
            commands::run(store, &config, command).await
        }
        Backend::Rest => {
            let store = Arc::new(RestStore::new(&config.base_url, config.api_key.clone())?);
            if !matches!(command, Command::SignUp(_)) {
                sign_in(store.as_ref(), &config).await?;
            }
            commands::run(store, &config, command).await
        }
    }
}

/// Signs in when both email and password are available; otherwise the
/// commands run anonymously and see no rows.
async fn sign_in<S: AuthProvider + RecordStore>(store: &S, config: &AppConfig) -> Result<()> {
    let Some(password) = config::password() else {
        tracing::debug!("no password in {}, staying anonymous", config::PASSWORD_ENV);
        return Ok(());
    };
    if config.email.is_empty() {
        tracing::debug!("no email configured, staying anonymous");
        return Ok(());
    }
    let session = store.sign_in(&config.email, &password).await?;
    tracing::info!(user = %session.user.id, "session established");
    Ok(())
}
