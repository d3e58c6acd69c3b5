//! Process-local registry of connected WebSocket viewers.
//!
//! Each connection owns a bounded outbound queue. Broadcasting never waits on a
//! viewer: full queues are skipped for that event and closed ones are dropped
//! from the registry. Nothing is persisted or replayed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

const CLIENT_QUEUE: usize = 32;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    Connected {
        message: String,
    },
    BigWin {
        username: String,
        amount: f64,
        timestamp: DateTime<Utc>,
    },
    Pong {
        timestamp: i64,
    },
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Ping,
}

/// Answer to a raw client frame, if it warrants one.
pub fn reply_to(frame: &str) -> Option<ServerEvent> {
    match serde_json::from_str::<ClientMessage>(frame) {
        Ok(ClientMessage::Ping) => Some(ServerEvent::Pong {
            timestamp: Utc::now().timestamp_millis(),
        }),
        Err(e) => {
            log::warn!("Ignoring WebSocket message: {}", e);
            None
        }
    }
}

#[derive(Clone, Default)]
pub struct Notifier {
    clients: Arc<DashMap<Uuid, mpsc::Sender<String>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> (Uuid, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE);
        let client_id = Uuid::new_v4();
        self.clients.insert(client_id, tx);

        log::info!(
            "WebSocket client {} connected ({} total)",
            client_id,
            self.clients.len()
        );
        (client_id, rx)
    }

    pub fn unregister(&self, client_id: &Uuid) {
        if self.clients.remove(client_id).is_some() {
            log::info!(
                "WebSocket client {} disconnected ({} remaining)",
                client_id,
                self.clients.len()
            );
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Queues `event` for one client. Returns false if it could not be queued.
    pub fn send_to(&self, client_id: &Uuid, event: &ServerEvent) -> bool {
        let Some(payload) = encode(event) else {
            return false;
        };
        let Some(client) = self.clients.get(client_id) else {
            return false;
        };
        client.try_send(payload).is_ok()
    }

    /// Queues `event` for every connected client and returns how many accepted it.
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        let Some(payload) = encode(event) else {
            return 0;
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for client in self.clients.iter() {
            match client.value().try_send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    log::warn!("WebSocket client {} is lagging, skipping event", client.key());
                }
                Err(TrySendError::Closed(_)) => closed.push(*client.key()),
            }
        }

        for client_id in closed {
            self.unregister(&client_id);
        }

        delivered
    }
}

fn encode(event: &ServerEvent) -> Option<String> {
    serde_json::to_string(event)
        .map_err(|e| log::error!("Could not encode WebSocket event: {}", e))
        .ok()
}
