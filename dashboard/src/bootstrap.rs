use std::sync::Arc;

use dashboard_common::{BootstrapError, DashboardConfig, TransportKind};
use tokio::sync::mpsc;
use tracing::info;

use crate::database::{memory::MemoryTransport, mqtt, Database};

/// Builds the database handle for the configured endpoint and starts its
/// transport. Must run inside the tokio runtime.
pub fn bootstrap(config: &DashboardConfig) -> Result<Database, BootstrapError> {
    let backend = &config.backend;
    backend.validate()?;

    let database = match backend.transport {
        TransportKind::Mqtt => {
            let (transport, eventloop) = mqtt::connect(backend);
            let (events_tx, events_rx) = mpsc::unbounded_channel();
            tokio::spawn(eventloop.run(events_tx));
            let database = Database::new(Arc::new(transport), config.persistence_enabled);
            database.attach(events_rx);
            database
        }
        TransportKind::Memory => {
            let (transport, events_rx) = MemoryTransport::new();
            let database = Database::new(Arc::new(transport), config.persistence_enabled);
            database.attach(events_rx);
            database
        }
    };

    info!(
        "database ready at {} (local cache {})",
        backend.endpoint(),
        if config.persistence_enabled { "on" } else { "off" }
    );
    Ok(database)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dashboard_common::{BackendConfig, RemoteValue};

    use super::*;

    #[tokio::test]
    async fn invalid_endpoint_is_reported_not_panicked() {
        let config = DashboardConfig {
            backend: BackendConfig {
                host: String::new(),
                ..BackendConfig::default()
            },
            ..DashboardConfig::default()
        };

        assert!(matches!(
            bootstrap(&config),
            Err(BootstrapError::InvalidEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn memory_backend_round_trips_writes() {
        let config = DashboardConfig {
            backend: BackendConfig {
                transport: TransportKind::Memory,
                ..BackendConfig::default()
            },
            ..DashboardConfig::default()
        };
        let database = bootstrap(&config).unwrap();

        database
            .reference("Led/status")
            .set_value(true.into())
            .unwrap();

        assert_eq!(database.cached("Led/status"), None);
        let (sender, mut received) = tokio::sync::mpsc::unbounded_channel();
        let _registration = database
            .reference("Led/status")
            .add_listener(std::sync::Arc::new(Forward(sender)));

        let delivered = tokio::time::timeout(Duration::from_secs(1), received.recv())
            .await
            .unwrap();
        assert_eq!(delivered, Some(true.into()));
        assert_eq!(database.cached("Led/status"), Some(true.into()));
    }

    struct Forward(tokio::sync::mpsc::UnboundedSender<RemoteValue>);

    impl crate::database::ValueListener for Forward {
        fn on_data_change(&self, value: &RemoteValue) {
            let _ = self.0.send(value.clone());
        }
        fn on_cancelled(&self, _error: &dashboard_common::DatabaseError) {}
    }
}
