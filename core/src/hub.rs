//! Live Broadcast Hub
//!
//! Tracks which connections are watching which poll and pushes updated
//! tallies to them. Each connection is represented by the sending half of an
//! unbounded channel; the transport drains the other half in order, so events
//! published for one poll reach every member in publish order.
//!
//! Membership lives behind a single lock. A publish therefore sees either the
//! membership before a join/leave or after it, never a half-applied move.

use crate::tally::Tally;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Events a client may send over the live channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Subscribe to a poll's updates, leaving any previous poll
    JoinPoll(String),
    LeavePoll,
    Ping,
}

/// Events pushed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    UpdateResults { poll_id: String, votes: Tally },
    Pong,
    Error { message: String },
}

struct Subscriber {
    sender: mpsc::UnboundedSender<ServerEvent>,
    poll: Option<String>,
}

#[derive(Default)]
struct Membership {
    clients: HashMap<ConnectionId, Subscriber>,
    groups: HashMap<String, HashSet<ConnectionId>>,
}

impl Membership {
    fn detach(&mut self, id: ConnectionId, poll_id: &str) {
        if let Some(members) = self.groups.get_mut(poll_id) {
            members.remove(&id);
            if members.is_empty() {
                self.groups.remove(poll_id);
            }
        }
    }
}

/// Process-wide registry of live connections grouped by poll id.
#[derive(Default)]
pub struct BroadcastHub {
    membership: RwLock<Membership>,
    closed: AtomicBool,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection. The receiver yields every event addressed
    /// to it and ends when the connection is dropped from the hub.
    pub async fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut membership = self.membership.write().await;
        // Checked under the lock so a concurrent shutdown cannot miss us
        if self.closed.load(Ordering::Acquire) {
            // Sender dropped here; the receiver ends immediately
            return (id, rx);
        }
        membership.clients.insert(
            id,
            Subscriber {
                sender: tx,
                poll: None,
            },
        );
        tracing::info!(connection = %id, clients = membership.clients.len(), "client_connected");
        (id, rx)
    }

    /// Move a connection into `poll_id`'s group. Unknown poll ids are accepted.
    pub async fn join(&self, id: ConnectionId, poll_id: &str) {
        let mut membership = self.membership.write().await;
        let previous = match membership.clients.get_mut(&id) {
            Some(subscriber) => subscriber.poll.replace(poll_id.to_string()),
            None => return,
        };
        if let Some(previous) = previous {
            membership.detach(id, &previous);
        }
        membership
            .groups
            .entry(poll_id.to_string())
            .or_default()
            .insert(id);
        tracing::info!(connection = %id, poll_id = %poll_id, "joined_poll");
    }

    /// Drop a connection's group membership but keep it connected.
    pub async fn leave(&self, id: ConnectionId) {
        let mut membership = self.membership.write().await;
        let previous = membership
            .clients
            .get_mut(&id)
            .and_then(|subscriber| subscriber.poll.take());
        if let Some(previous) = previous {
            membership.detach(id, &previous);
            tracing::info!(connection = %id, poll_id = %previous, "left_poll");
        }
    }

    /// Remove a connection and all of its memberships.
    pub async fn disconnect(&self, id: ConnectionId) {
        let mut membership = self.membership.write().await;
        if let Some(subscriber) = membership.clients.remove(&id) {
            if let Some(poll) = subscriber.poll {
                membership.detach(id, &poll);
            }
        }
        tracing::info!(connection = %id, remaining = membership.clients.len(), "client_disconnected");
    }

    /// Direct reply to one connection.
    pub async fn send_to(&self, id: ConnectionId, event: ServerEvent) {
        let membership = self.membership.read().await;
        if let Some(subscriber) = membership.clients.get(&id) {
            let _ = subscriber.sender.send(event);
        }
    }

    /// Push an `update_results` event to every member of `poll_id`'s group.
    /// Best effort; returns the number of members the event was handed to.
    pub async fn publish(&self, poll_id: &str, tally: &Tally) -> usize {
        let membership = self.membership.read().await;
        let Some(members) = membership.groups.get(poll_id) else {
            return 0;
        };

        let event = ServerEvent::UpdateResults {
            poll_id: poll_id.to_string(),
            votes: tally.clone(),
        };
        let mut delivered = 0;
        for id in members {
            if let Some(subscriber) = membership.clients.get(id) {
                match subscriber.sender.send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(e) => tracing::warn!(connection = %id, error = %e, "publish_failed"),
                }
            }
        }
        tracing::debug!(poll_id = %poll_id, delivered = delivered, "results_published");
        delivered
    }

    /// `(connections, groups)`
    pub async fn stats(&self) -> (usize, usize) {
        let membership = self.membership.read().await;
        (membership.clients.len(), membership.groups.len())
    }

    /// Drop every subscriber handle. Transports see their receivers end and
    /// close; later connections are refused the same way.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let mut membership = self.membership.write().await;
        let count = membership.clients.len();
        membership.clients.clear();
        membership.groups.clear();
        tracing::info!(closed = count, "broadcast_hub_shutdown");
    }
}
