//! Client side of the realtime database: path-addressed values, persistent
//! listeners and writes, over a pluggable [`Transport`].

pub mod memory;
pub mod mqtt;

use std::{collections::HashMap, sync::Arc};

use dashboard_common::{DatabaseError, RemoteValue};
use parking_lot::{Mutex, ReentrantMutex};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};

/// Wire side of the database. Implementations report what the backend sends
/// through a [`TransportEvent`] channel handed to [`Database::attach`].
pub trait Transport: Send + Sync + 'static {
    fn subscribe(&self, path: &str) -> Result<(), DatabaseError>;
    fn unsubscribe(&self, path: &str) -> Result<(), DatabaseError>;
    fn publish(&self, path: &str, payload: Vec<u8>) -> Result<(), DatabaseError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Value { path: String, payload: Vec<u8> },
    Rejected { path: String, error: DatabaseError },
}

/// Receives the current value right after registration (when one is known)
/// and every change after that, until the registration is dropped.
pub trait ValueListener: Send + Sync + 'static {
    fn on_data_change(&self, value: &RemoteValue);
    fn on_cancelled(&self, error: &DatabaseError);
}

#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    persistence_enabled: bool,
    /// Held while values reach listeners, so a cached value handed to a new
    /// listener can never arrive after a newer push. Reentrant because a
    /// listener may register or cancel from inside its callback.
    dispatch: ReentrantMutex<()>,
    registry: Mutex<Registry>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<String, Vec<(u64, Arc<dyn ValueListener>)>>,
    values: HashMap<String, RemoteValue>,
}

impl Database {
    pub fn new(transport: Arc<dyn Transport>, persistence_enabled: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                persistence_enabled,
                dispatch: ReentrantMutex::new(()),
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    /// Pumps transport events into listeners until the sender side closes.
    pub fn attach(&self, mut events: mpsc::UnboundedReceiver<TransportEvent>) -> JoinHandle<()> {
        let database = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                database.handle_event(event);
            }
            debug!("database event stream closed");
        })
    }

    pub fn reference(&self, path: &str) -> DatabaseRef {
        DatabaseRef {
            database: self.clone(),
            path: path.to_string(),
        }
    }

    /// Last value seen at `path`, if one is held.
    #[cfg(test)]
    pub fn cached(&self, path: &str) -> Option<RemoteValue> {
        self.inner.registry.lock().values.get(path).cloned()
    }

    #[cfg(test)]
    pub fn listener_count(&self, path: &str) -> usize {
        self.inner
            .registry
            .lock()
            .listeners
            .get(path)
            .map_or(0, Vec::len)
    }

    pub fn handle_event(&self, event: TransportEvent) {
        let _dispatch = self.inner.dispatch.lock();
        match event {
            TransportEvent::Value { path, payload } => {
                let value = RemoteValue::decode(&payload);
                let listeners = {
                    let mut registry = self.inner.registry.lock();
                    let listeners = registry.listeners_for(&path);
                    if self.inner.persistence_enabled || !listeners.is_empty() {
                        registry.values.insert(path.clone(), value.clone());
                    }
                    listeners
                };
                debug!("value at {path}: {value:?} ({} listeners)", listeners.len());
                for listener in listeners {
                    listener.on_data_change(&value);
                }
            }
            TransportEvent::Rejected { path, error } => {
                let listeners = {
                    let mut registry = self.inner.registry.lock();
                    registry
                        .listeners
                        .remove(&path)
                        .unwrap_or_default()
                        .into_iter()
                        .map(|(_, listener)| listener)
                        .collect::<Vec<_>>()
                };
                warn!("listeners at {path} cancelled: {error}");
                for listener in listeners {
                    listener.on_cancelled(&error);
                }
            }
        }
    }

    fn add_listener(&self, path: &str, listener: Arc<dyn ValueListener>) -> ListenerRegistration {
        let _dispatch = self.inner.dispatch.lock();
        let (id, first, known) = {
            let mut registry = self.inner.registry.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            let entries = registry.listeners.entry(path.to_string()).or_default();
            let first = entries.is_empty();
            entries.push((id, Arc::clone(&listener)));
            (id, first, registry.values.get(path).cloned())
        };

        let registration = ListenerRegistration {
            database: self.clone(),
            path: path.to_string(),
            id,
        };

        if let Some(value) = known {
            listener.on_data_change(&value);
        }

        if first {
            if let Err(err) = self.inner.transport.subscribe(path) {
                self.handle_event(TransportEvent::Rejected {
                    path: path.to_string(),
                    error: err,
                });
            }
        }

        registration
    }

    fn remove_listener(&self, path: &str, id: u64) {
        let now_unused = {
            let mut registry = self.inner.registry.lock();
            let Some(entries) = registry.listeners.get_mut(path) else {
                return;
            };
            let before = entries.len();
            entries.retain(|(entry_id, _)| *entry_id != id);
            if entries.len() == before {
                return;
            }
            let now_unused = entries.is_empty();
            if now_unused {
                registry.listeners.remove(path);
                if !self.inner.persistence_enabled {
                    registry.values.remove(path);
                }
            }
            now_unused
        };

        if now_unused {
            if let Err(err) = self.inner.transport.unsubscribe(path) {
                warn!("failed to unsubscribe from {path}: {err}");
            }
        }
    }
}

impl Registry {
    fn listeners_for(&self, path: &str) -> Vec<Arc<dyn ValueListener>> {
        self.listeners
            .get(path)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(_, listener)| Arc::clone(listener))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Handle to one database path.
#[derive(Clone)]
pub struct DatabaseRef {
    database: Database,
    path: String,
}

impl DatabaseRef {
    pub fn add_listener(&self, listener: Arc<dyn ValueListener>) -> ListenerRegistration {
        self.database.add_listener(&self.path, listener)
    }

    /// Sends `value` to the backend. Completion is only observable through
    /// listeners on the same path.
    pub fn set_value(&self, value: RemoteValue) -> Result<(), DatabaseError> {
        self.database
            .inner
            .transport
            .publish(&self.path, value.encode())
    }
}

/// Keeps a listener registered. Dropping it releases the listener and, for
/// the last listener on a path, the backend subscription.
#[must_use = "dropping the registration removes the listener"]
pub struct ListenerRegistration {
    database: Database,
    path: String,
    id: u64,
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.database.remove_listener(&self.path, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryTransport;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Result<RemoteValue, DatabaseError>>>,
    }

    impl Recorder {
        fn seen(&self) -> Vec<Result<RemoteValue, DatabaseError>> {
            self.seen.lock().clone()
        }
    }

    impl ValueListener for Recorder {
        fn on_data_change(&self, value: &RemoteValue) {
            self.seen.lock().push(Ok(value.clone()));
        }

        fn on_cancelled(&self, error: &DatabaseError) {
            self.seen.lock().push(Err(error.clone()));
        }
    }

    fn value(path: &str, payload: &str) -> TransportEvent {
        TransportEvent::Value {
            path: path.to_string(),
            payload: payload.as_bytes().to_vec(),
        }
    }

    #[test]
    fn listener_sees_every_change_until_dropped() {
        let (transport, _events) = MemoryTransport::new();
        let database = Database::new(Arc::new(transport.clone()), true);
        let recorder = Arc::new(Recorder::default());

        let registration = database
            .reference("Sensor/temperature")
            .add_listener(recorder.clone());
        assert_eq!(transport.subscriptions(), vec!["Sensor/temperature"]);

        database.handle_event(value("Sensor/temperature", "21.5"));
        database.handle_event(value("Sensor/temperature", "22"));
        drop(registration);
        database.handle_event(value("Sensor/temperature", "23.1"));

        assert_eq!(
            recorder.seen(),
            vec![Ok(RemoteValue::Float(21.5)), Ok(RemoteValue::Integer(22))]
        );
        assert!(transport.subscriptions().is_empty());
        assert_eq!(database.listener_count("Sensor/temperature"), 0);
    }

    #[test]
    fn cached_value_is_served_on_registration() {
        let (transport, _events) = MemoryTransport::new();
        let database = Database::new(Arc::new(transport), true);
        database.handle_event(value("Sensor/humidity", "48"));

        let recorder = Arc::new(Recorder::default());
        let _registration = database
            .reference("Sensor/humidity")
            .add_listener(recorder.clone());

        assert_eq!(recorder.seen(), vec![Ok(RemoteValue::Integer(48))]);
    }

    #[test]
    fn without_persistence_values_are_dropped_with_the_last_listener() {
        let (transport, _events) = MemoryTransport::new();
        let database = Database::new(Arc::new(transport), false);

        database.handle_event(value("Sensor/humidity", "48"));
        assert_eq!(database.cached("Sensor/humidity"), None);

        let first = database
            .reference("Sensor/humidity")
            .add_listener(Arc::new(Recorder::default()));
        database.handle_event(value("Sensor/humidity", "49"));
        assert_eq!(
            database.cached("Sensor/humidity"),
            Some(RemoteValue::Integer(49))
        );

        drop(first);
        assert_eq!(database.cached("Sensor/humidity"), None);
    }

    #[test]
    fn second_listener_shares_the_backend_subscription() {
        let (transport, _events) = MemoryTransport::new();
        let database = Database::new(Arc::new(transport.clone()), true);
        let reference = database.reference("Led/status");

        let first = reference.add_listener(Arc::new(Recorder::default()));
        let second = reference.add_listener(Arc::new(Recorder::default()));
        assert_eq!(transport.subscriptions(), vec!["Led/status"]);
        assert_eq!(database.listener_count("Led/status"), 2);

        drop(first);
        assert_eq!(transport.subscriptions(), vec!["Led/status"]);
        drop(second);
        assert!(transport.subscriptions().is_empty());
    }

    #[test]
    fn rejection_cancels_all_listeners_on_the_path() {
        let (transport, _events) = MemoryTransport::new();
        let database = Database::new(Arc::new(transport), true);
        let recorder = Arc::new(Recorder::default());
        let registration = database
            .reference("Sensor/temperature")
            .add_listener(recorder.clone());

        let error = DatabaseError::PermissionDenied {
            path: "Sensor/temperature".to_string(),
        };
        database.handle_event(TransportEvent::Rejected {
            path: "Sensor/temperature".to_string(),
            error: error.clone(),
        });
        database.handle_event(value("Sensor/temperature", "20.0"));

        assert_eq!(recorder.seen(), vec![Err(error)]);
        assert_eq!(database.listener_count("Sensor/temperature"), 0);
        drop(registration);
    }

    #[test]
    fn failed_subscribe_is_delivered_as_cancellation() {
        let (transport, _events) = MemoryTransport::new();
        transport.close();
        let database = Database::new(Arc::new(transport), true);
        let recorder = Arc::new(Recorder::default());

        let _registration = database
            .reference("Led/status")
            .add_listener(recorder.clone());

        assert!(matches!(
            recorder.seen().as_slice(),
            [Err(DatabaseError::Transport(_))]
        ));
    }

    #[test]
    fn set_value_publishes_encoded_json() {
        let (transport, _events) = MemoryTransport::new();
        let database = Database::new(Arc::new(transport.clone()), true);

        database
            .reference("Led/status")
            .set_value(RemoteValue::Bool(true))
            .unwrap();

        assert_eq!(
            transport.writes(),
            vec![("Led/status".to_string(), b"true".to_vec())]
        );
    }

    #[test]
    fn cached_value_never_arrives_after_a_newer_push() {
        for _ in 0..50 {
            let (transport, _events) = MemoryTransport::new();
            let database = Database::new(Arc::new(transport), true);
            database.handle_event(value("Sensor/humidity", "0"));
            let recorder = Arc::new(Recorder::default());

            let registration = std::thread::scope(|scope| {
                scope.spawn(|| {
                    for reading in 1..200 {
                        database.handle_event(value("Sensor/humidity", &reading.to_string()));
                    }
                });
                database
                    .reference("Sensor/humidity")
                    .add_listener(recorder.clone())
            });

            let seen: Vec<i64> = recorder
                .seen()
                .into_iter()
                .map(|delivery| match delivery {
                    Ok(RemoteValue::Integer(reading)) => reading,
                    other => panic!("unexpected delivery {other:?}"),
                })
                .collect();
            assert!(!seen.is_empty());
            assert!(seen.windows(2).all(|pair| pair[0] < pair[1]), "{seen:?}");
            assert_eq!(seen.last(), Some(&199));
            drop(registration);
        }
    }
}
