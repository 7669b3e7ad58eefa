use std::{
    io::ErrorKind,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use dashboard_common::{Action, DashboardConfig};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::{bootstrap::bootstrap, http, render, session::DashboardSession, store::StateStore};

#[derive(Clone)]
pub struct AppState {
    pub store: StateStore,
    /// `None` when bootstrap failed; the store then carries the error.
    pub session: Option<Arc<DashboardSession>>,
}

impl AppState {
    /// Returns whether a write was issued.
    pub fn toggle_led(&self) -> bool {
        match &self.session {
            Some(session) => {
                session.toggle_led();
                true
            }
            None => {
                warn!("LED toggle ignored: database unavailable");
                false
            }
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config_path = std::env::var("DASHBOARD_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.dashboard/config.json"));
    let config = load_config(&config_path, |name| std::env::var(name).ok()).await;
    let store = StateStore::new(config.error_propagation);

    let session = match bootstrap(&config) {
        Ok(database) => Some(Arc::new(DashboardSession::open(&database, store.clone()))),
        Err(err) => {
            error!("database bootstrap failed: {err}");
            store.dispatch(Action::BootstrapFailed(err));
            None
        }
    };
    let app = AppState { store, session };

    let web_root = std::env::var("DASHBOARD_WEB_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/web")));
    let router = http::router(app.clone(), web_root);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind dashboard server at {addr}"))?;
    info!("dashboard listening on http://{addr}");

    let mut server = tokio::spawn(async move { axum::serve(listener, router).await });
    let terminal = config
        .terminal
        .then(|| tokio::spawn(render::run_terminal(app.store.clone())));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for ctrl-c")?;
            info!("signal received, shutting down");
        }
        result = render::read_commands(app.clone()), if config.terminal => {
            result?;
            info!("quit requested, shutting down");
        }
        result = &mut server => {
            result
                .context("dashboard server task panicked")?
                .context("dashboard server failed")?;
        }
    }

    server.abort();
    if let Some(terminal) = terminal {
        terminal.abort();
    }
    drop(app);
    Ok(())
}

async fn load_config<F>(path: &Path, lookup: F) -> DashboardConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match read_config_file(path).await {
        Ok(config) => config,
        Err(err) => {
            warn!("failed to load config from {}: {err:#}", path.display());
            DashboardConfig::default()
        }
    };
    if let Err(err) = config.apply_env(lookup) {
        warn!("ignoring environment override: {err}");
    }
    config
}

async fn read_config_file(path: &Path) -> anyhow::Result<DashboardConfig> {
    match tokio::fs::read(path).await {
        Ok(raw) => Ok(DashboardConfig::from_json_slice(&raw)?),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(DashboardConfig::default()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bad_port_override_falls_back_instead_of_failing() {
        let path = std::env::temp_dir().join("sensor-dashboard-missing/config.json");
        let config = load_config(&path, |name| match name {
            "MQTT_PORT" => Some("eighty".to_string()),
            "MQTT_HOST" => Some("broker.lan".to_string()),
            _ => None,
        })
        .await;

        assert_eq!(config.backend.port, 1883);
        assert_eq!(config.backend.host, "broker.lan");
    }

    #[tokio::test]
    async fn unparsable_config_file_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join(format!("sensor-dashboard-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("config.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let config = load_config(&path, |_| None).await;

        assert_eq!(config, DashboardConfig::default());
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
