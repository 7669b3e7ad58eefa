//! Loopback transport: a retained value store living in the process.
//! Writes are echoed to subscribers exactly as a broker would.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use dashboard_common::DatabaseError;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{Transport, TransportEvent};

#[derive(Clone)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

#[derive(Default)]
struct MemoryState {
    retained: HashMap<String, Vec<u8>>,
    subscribed: BTreeSet<String>,
    denied: HashSet<String>,
    writes: Vec<(String, Vec<u8>)>,
    closed: bool,
}

impl MemoryTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let transport = Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            events,
        };
        (transport, receiver)
    }

    #[cfg(test)]
    /// Subscriptions to `path` will be refused with a permission error.
    pub fn deny(&self, path: &str) {
        self.state.lock().denied.insert(path.to_string());
    }

    /// Stores a value as a remote writer would, notifying subscribers.
    pub fn push(&self, path: &str, payload: Vec<u8>) {
        let notify = {
            let mut state = self.state.lock();
            state.retained.insert(path.to_string(), payload.clone());
            state.subscribed.contains(path)
        };
        if notify {
            self.emit(TransportEvent::Value {
                path: path.to_string(),
                payload,
            });
        }
    }

    #[cfg(test)]
    /// Refuses every further request, as a dead connection would.
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    #[cfg(test)]
    pub fn subscriptions(&self) -> Vec<String> {
        self.state.lock().subscribed.iter().cloned().collect()
    }

    #[cfg(test)]
    /// Every publish that went through [`Transport::publish`], in order.
    pub fn writes(&self) -> Vec<(String, Vec<u8>)> {
        self.state.lock().writes.clone()
    }

    fn emit(&self, event: TransportEvent) {
        // The receiver only goes away when the database is shutting down.
        let _ = self.events.send(event);
    }

    fn check_open(state: &MemoryState) -> Result<(), DatabaseError> {
        if state.closed {
            Err(DatabaseError::Transport("memory transport closed".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Transport for MemoryTransport {
    fn subscribe(&self, path: &str) -> Result<(), DatabaseError> {
        let event = {
            let mut state = self.state.lock();
            Self::check_open(&state)?;
            if state.denied.contains(path) {
                TransportEvent::Rejected {
                    path: path.to_string(),
                    error: DatabaseError::PermissionDenied {
                        path: path.to_string(),
                    },
                }
            } else {
                state.subscribed.insert(path.to_string());
                match state.retained.get(path) {
                    Some(payload) => TransportEvent::Value {
                        path: path.to_string(),
                        payload: payload.clone(),
                    },
                    None => return Ok(()),
                }
            }
        };
        self.emit(event);
        Ok(())
    }

    fn unsubscribe(&self, path: &str) -> Result<(), DatabaseError> {
        let mut state = self.state.lock();
        Self::check_open(&state)?;
        state.subscribed.remove(path);
        Ok(())
    }

    fn publish(&self, path: &str, payload: Vec<u8>) -> Result<(), DatabaseError> {
        {
            let mut state = self.state.lock();
            Self::check_open(&state).map_err(|err| DatabaseError::WriteFailed {
                path: path.to_string(),
                reason: err.to_string(),
            })?;
            state.writes.push((path.to_string(), payload.clone()));
        }
        self.push(path, payload);
        Ok(())
    }
}
