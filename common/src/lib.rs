pub mod config;
pub mod error;
pub mod paths;
pub mod state;
pub mod value;
pub mod view;

pub use config::{BackendConfig, DashboardConfig, ErrorPropagation, TransportKind};
pub use error::{BootstrapError, ConfigError, DatabaseError};
pub use paths::*;
pub use state::{Action, ConnectionStatus, DashboardState, Field, Reading};
pub use value::RemoteValue;
pub use view::{Color, ColorTween, DashboardView};
