use std::fmt;

use serde::{Serialize, Serializer};

use crate::{
    config::ErrorPropagation,
    error::{BootstrapError, DatabaseError},
    paths::{PATH_LED_STATUS, PATH_SENSOR_HUMIDITY, PATH_SENSOR_TEMPERATURE},
    value::{RemoteValue, PLACEHOLDER},
};

/// The three database paths the dashboard mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Temperature,
    Humidity,
    Led,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::Temperature, Field::Humidity, Field::Led];

    pub fn path(self) -> &'static str {
        match self {
            Self::Temperature => PATH_SENSOR_TEMPERATURE,
            Self::Humidity => PATH_SENSOR_HUMIDITY,
            Self::Led => PATH_LED_STATUS,
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.path() == path)
    }
}

/// A sensor readout as the dashboard shows it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Reading {
    /// Nothing delivered yet.
    #[default]
    Waiting,
    Value(String),
    Error,
}

impl Reading {
    pub fn from_value(value: &RemoteValue) -> Self {
        Self::Value(value.display_text())
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Waiting => PLACEHOLDER,
            Self::Value(text) => text,
            Self::Error => "Error",
        }
    }
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.text())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Connected,
    Error(String),
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => f.write_str("Connecting…"),
            Self::Connected => f.write_str("Connected"),
            Self::Error(message) => write!(f, "Error: {message}"),
        }
    }
}

impl Serialize for ConnectionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Every state change goes through one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ValueChanged { field: Field, value: RemoteValue },
    DeliveryFailed { field: Field, error: DatabaseError },
    BootstrapFailed(BootstrapError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardState {
    pub temperature: Reading,
    pub humidity: Reading,
    pub led_on: bool,
    pub led_fault: Option<String>,
    pub status: ConnectionStatus,
}

impl DashboardState {
    pub fn apply(&mut self, action: Action, propagation: ErrorPropagation) {
        match action {
            Action::ValueChanged { field, value } => match field {
                Field::Temperature => {
                    self.temperature = Reading::from_value(&value);
                    self.status = ConnectionStatus::Connected;
                }
                Field::Humidity => self.humidity = Reading::from_value(&value),
                Field::Led => {
                    self.led_on = value.as_switch();
                    self.led_fault = None;
                }
            },
            Action::DeliveryFailed { field, error } => {
                match field {
                    Field::Temperature => self.temperature = Reading::Error,
                    Field::Humidity => self.humidity = Reading::Error,
                    Field::Led => self.led_fault = Some(error.to_string()),
                }
                if propagation.propagates(field) {
                    self.status = ConnectionStatus::Error(error.to_string());
                }
            }
            Action::BootstrapFailed(error) => {
                self.status = ConnectionStatus::Error(error.to_string());
            }
        }
    }

    /// The value a toggle writes: the negation of what is displayed.
    pub fn toggle_target(&self) -> bool {
        !self.led_on
    }
}
