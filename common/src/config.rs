use serde::{Deserialize, Serialize};

use crate::{error::BootstrapError, paths::is_valid_path, state::Field, ConfigError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    #[default]
    Mqtt,
    /// Local loopback store; writes echo straight back to listeners.
    Memory,
}

/// Which listener failures are allowed to overwrite the connection status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPropagation {
    #[default]
    TemperatureOnly,
    AllPaths,
}

impl ErrorPropagation {
    pub fn propagates(self, field: Field) -> bool {
        match self {
            Self::TemperatureOnly => field == Field::Temperature,
            Self::AllPaths => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub transport: TransportKind,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub namespace: String,
    pub client_id: String,
    pub keep_alive_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Mqtt,
            host: "127.0.0.1".to_string(),
            port: 1883,
            user: String::new(),
            pass: String::new(),
            namespace: "esp32sensorproject".to_string(),
            client_id: "sensor-dashboard".to_string(),
            keep_alive_secs: 30,
        }
    }
}

impl BackendConfig {
    pub fn sanitize(&mut self) {
        self.host = self.host.trim().to_string();
        self.namespace = self.namespace.trim().trim_matches('/').to_string();
        if self.client_id.trim().is_empty() {
            self.client_id = Self::default().client_id;
        }
        self.keep_alive_secs = self.keep_alive_secs.clamp(5, 3_600);
    }

    pub fn validate(&self) -> Result<(), BootstrapError> {
        if self.transport == TransportKind::Memory {
            return Ok(());
        }
        if self.host.is_empty() {
            return Err(BootstrapError::InvalidEndpoint("empty host".to_string()));
        }
        if self.port == 0 {
            return Err(BootstrapError::InvalidEndpoint(format!(
                "{}:0 has no port",
                self.host
            )));
        }
        if !self.namespace.is_empty() && !is_valid_path(&self.namespace) {
            return Err(BootstrapError::InvalidNamespace(self.namespace.clone()));
        }
        Ok(())
    }

    pub fn endpoint(&self) -> String {
        match self.transport {
            TransportKind::Mqtt => format!("mqtt://{}:{}/{}", self.host, self.port, self.namespace),
            TransportKind::Memory => format!("memory:///{}", self.namespace),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub backend: BackendConfig,
    /// Keep the last value of every path so listeners are served while offline.
    pub persistence_enabled: bool,
    pub error_propagation: ErrorPropagation,
    pub http_port: u16,
    pub terminal: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            persistence_enabled: true,
            error_propagation: ErrorPropagation::TemperatureOnly,
            http_port: 8080,
            terminal: true,
        }
    }
}

impl DashboardConfig {
    pub fn from_json_slice(raw: &[u8]) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_slice(raw)?;
        config.sanitize();
        Ok(config)
    }

    pub fn sanitize(&mut self) {
        self.backend.sanitize();
    }

    /// Applies `MQTT_*` and `DASHBOARD_*` overrides from `lookup`. Invalid
    /// values are skipped and keep their previous setting; the first one is
    /// returned so the caller can report it.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut first_error = None;

        if let Some(host) = lookup("MQTT_HOST") {
            self.backend.host = host;
        }
        if let Some(port) = lookup("MQTT_PORT") {
            match parse_port("MQTT_PORT", port) {
                Ok(port) => self.backend.port = port,
                Err(err) => first_error = first_error.or(Some(err)),
            }
        }
        if let Some(user) = lookup("MQTT_USER") {
            self.backend.user = user;
            self.backend.pass = lookup("MQTT_PASS").unwrap_or_default();
        }
        if let Some(namespace) = lookup("DASHBOARD_NAMESPACE") {
            self.backend.namespace = namespace;
        }
        if let Some(port) = lookup("DASHBOARD_HTTP_PORT") {
            match parse_port("DASHBOARD_HTTP_PORT", port) {
                Ok(port) => self.http_port = port,
                Err(err) => first_error = first_error.or(Some(err)),
            }
        }
        self.sanitize();

        first_error.map_or(Ok(()), Err)
    }
}

fn parse_port(name: &'static str, value: String) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}
