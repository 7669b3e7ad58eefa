//! MQTT rendition of the realtime database. Each path is a retained topic
//! under the configured namespace, so subscribers get the current value on
//! subscribe and every change after it.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};

use dashboard_common::{path_for, topic_for, BackendConfig, DatabaseError};
use parking_lot::Mutex;
use rumqttc::{
    AsyncClient, Event, EventLoop, Incoming, MqttOptions, Outgoing, QoS, SubscribeReasonCode,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{Transport, TransportEvent};

pub struct MqttTransport {
    client: AsyncClient,
    namespace: String,
    pending: Arc<Mutex<PendingSubscriptions>>,
}

/// Pairs subscribe requests with the packet ids the event loop assigns them,
/// so a refused SUBACK can be traced back to its path.
#[derive(Debug, Default)]
pub struct PendingSubscriptions {
    queued: VecDeque<String>,
    in_flight: HashMap<u16, String>,
}

impl PendingSubscriptions {
    pub fn queue(&mut self, path: &str) {
        self.queued.push_back(path.to_string());
    }

    pub fn sent(&mut self, pkid: u16) {
        if let Some(path) = self.queued.pop_front() {
            self.in_flight.insert(pkid, path);
        }
    }

    pub fn acknowledged(&mut self, pkid: u16) -> Option<String> {
        self.in_flight.remove(&pkid)
    }
}

pub fn connect(config: &BackendConfig) -> (MqttTransport, MqttEventLoop) {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    // The broker keeps our subscriptions across reconnects.
    options.set_clean_session(false);
    if !config.user.is_empty() {
        options.set_credentials(&config.user, &config.pass);
    }

    let (client, eventloop) = AsyncClient::new(options, 64);
    let pending = Arc::new(Mutex::new(PendingSubscriptions::default()));

    let transport = MqttTransport {
        client,
        namespace: config.namespace.clone(),
        pending: Arc::clone(&pending),
    };
    let eventloop = MqttEventLoop {
        eventloop,
        namespace: config.namespace.clone(),
        pending,
    };
    (transport, eventloop)
}

impl Transport for MqttTransport {
    fn subscribe(&self, path: &str) -> Result<(), DatabaseError> {
        let topic = topic_for(&self.namespace, path);
        let mut pending = self.pending.lock();
        self.client
            .try_subscribe(topic, QoS::AtLeastOnce)
            .map_err(|err| DatabaseError::Transport(err.to_string()))?;
        pending.queue(path);
        Ok(())
    }

    fn unsubscribe(&self, path: &str) -> Result<(), DatabaseError> {
        self.client
            .try_unsubscribe(topic_for(&self.namespace, path))
            .map_err(|err| DatabaseError::Transport(err.to_string()))
    }

    fn publish(&self, path: &str, payload: Vec<u8>) -> Result<(), DatabaseError> {
        self.client
            .try_publish(
                topic_for(&self.namespace, path),
                QoS::AtLeastOnce,
                true,
                payload,
            )
            .map_err(|err| DatabaseError::WriteFailed {
                path: path.to_string(),
                reason: err.to_string(),
            })
    }
}

pub struct MqttEventLoop {
    eventloop: EventLoop,
    namespace: String,
    pending: Arc<Mutex<PendingSubscriptions>>,
}

impl MqttEventLoop {
    /// Polls the connection forever, forwarding values and refusals.
    /// rumqttc reconnects on the next poll after an error.
    pub async fn run(mut self, events: mpsc::UnboundedSender<TransportEvent>) {
        loop {
            let event = match self.eventloop.poll().await {
                Ok(event) => event,
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    continue;
                }
            };

            let Some(forward) = self.translate(event) else {
                continue;
            };
            if events.send(forward).is_err() {
                debug!("database dropped, stopping mqtt loop");
                return;
            }
        }
    }

    fn translate(&self, event: Event) -> Option<TransportEvent> {
        match event {
            Event::Incoming(Incoming::Publish(message)) => {
                let Some(path) = path_for(&self.namespace, &message.topic) else {
                    debug!("ignoring message on foreign topic {}", message.topic);
                    return None;
                };
                Some(TransportEvent::Value {
                    path: path.to_string(),
                    payload: message.payload.to_vec(),
                })
            }
            Event::Outgoing(Outgoing::Subscribe(pkid)) => {
                self.pending.lock().sent(pkid);
                None
            }
            Event::Incoming(Incoming::SubAck(ack)) => {
                let path = self.pending.lock().acknowledged(ack.pkid)?;
                let refused = ack
                    .return_codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure));
                refused.then(|| TransportEvent::Rejected {
                    error: DatabaseError::PermissionDenied { path: path.clone() },
                    path,
                })
            }
            Event::Incoming(Incoming::ConnAck(_)) => {
                info!("mqtt connected");
                None
            }
            _ => None,
        }
    }
}
