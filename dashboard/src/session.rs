use std::sync::Arc;

use dashboard_common::{Action, DatabaseError, Field, RemoteValue};
use tracing::{debug, info, warn};

use crate::{
    database::{Database, DatabaseRef, ListenerRegistration, ValueListener},
    store::StateStore,
};

/// Feeds one path's deliveries into the store.
struct FieldListener {
    field: Field,
    store: StateStore,
}

impl ValueListener for FieldListener {
    fn on_data_change(&self, value: &RemoteValue) {
        self.store.dispatch(Action::ValueChanged {
            field: self.field,
            value: value.clone(),
        });
    }

    fn on_cancelled(&self, error: &DatabaseError) {
        warn!("{:?} listener failed: {error}", self.field);
        self.store.dispatch(Action::DeliveryFailed {
            field: self.field,
            error: error.clone(),
        });
    }
}

/// The dashboard's subscriptions for as long as the view is shown. All three
/// listeners are registered by [`DashboardSession::open`] and released when
/// the session is dropped.
pub struct DashboardSession {
    registrations: Vec<ListenerRegistration>,
    led: DatabaseRef,
    store: StateStore,
}

impl DashboardSession {
    pub fn open(database: &Database, store: StateStore) -> Self {
        let registrations = Field::ALL
            .into_iter()
            .map(|field| {
                let listener = Arc::new(FieldListener {
                    field,
                    store: store.clone(),
                });
                database.reference(field.path()).add_listener(listener)
            })
            .collect();
        info!("dashboard listeners registered");

        Self {
            registrations,
            led: database.reference(Field::Led.path()),
            store,
        }
    }

    /// Writes the negation of the displayed LED state. The view only changes
    /// once the write comes back through the LED listener.
    pub fn toggle_led(&self) {
        let target = self.store.snapshot().toggle_target();
        info!("toggling LED to {target}");
        if let Err(err) = self.led.set_value(RemoteValue::Bool(target)) {
            warn!("LED write failed: {err}");
        }
    }
}

impl Drop for DashboardSession {
    fn drop(&mut self) {
        debug!(
            "releasing {} dashboard listeners",
            self.registrations.len()
        );
    }
}
