//! Shared types for the coordination service contract

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Identifier of a client session
pub type SessionId = u64;

/// How a node is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreateMode {
    /// Lives until explicitly deleted
    Persistent,
    /// Persistent, with a service-assigned counter appended to the name
    PersistentSequential,
    /// Deleted when the creating session ends
    Ephemeral,
    /// Ephemeral, with a service-assigned counter appended to the name
    EphemeralSequential,
}

impl CreateMode {
    pub fn is_ephemeral(self) -> bool {
        matches!(self, CreateMode::Ephemeral | CreateMode::EphemeralSequential)
    }

    pub fn is_sequential(self) -> bool {
        matches!(self, CreateMode::PersistentSequential | CreateMode::EphemeralSequential)
    }
}

/// Kind of change a watch reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    NodeCreated,
    NodeDeleted,
    /// The session itself lapsed; delivered to the session watcher only
    SessionExpired,
}

/// Notification delivered to a watcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedEvent {
    pub kind: EventKind,
    pub path: String,
}

impl WatchedEvent {
    pub fn new(kind: EventKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// Session-level notification; it names no node, so the path is empty
    pub fn session_expired() -> Self {
        Self::new(EventKind::SessionExpired, "")
    }

    pub fn is_session_event(&self) -> bool {
        self.kind == EventKind::SessionExpired
    }
}

/// Receiving end of one-shot watch notifications
///
/// The service pushes into the channel and never waits on the consumer.
pub type Watcher = mpsc::UnboundedSender<WatchedEvent>;
