//! The coordination service contract consumed by clients

use async_trait::async_trait;

use crate::error::CoordError;
use crate::types::{CreateMode, SessionId, Watcher};

/// A client session on a strongly-consistent hierarchical coordination service
///
/// Every call is made on behalf of one session. Ephemeral nodes created
/// through the session are removed when it ends, and watches it installed
/// are dropped.
///
/// Implementations must guarantee:
/// - `get_children` returns a linearizable snapshot
/// - sequential counters are unique and monotonically increasing per parent
/// - a watch fires at most once
#[async_trait]
pub trait CoordinationService: Send + Sync {
    /// Identifier of the session this handle speaks for
    fn session_id(&self) -> SessionId;

    /// Create a node, returning its full path
    ///
    /// For sequential modes the returned path carries the assigned counter.
    async fn create(&self, path: &str, mode: CreateMode) -> Result<String, CoordError>;

    /// Names (not paths) of the children of `path`, in no particular order
    async fn get_children(&self, path: &str) -> Result<Vec<String>, CoordError>;

    /// Whether `path` exists, optionally leaving a one-shot watch on it
    ///
    /// The watch fires `NodeDeleted` if the node existed and goes away, or
    /// `NodeCreated` if it was absent and appears.
    async fn exists(&self, path: &str, watcher: Option<Watcher>) -> Result<bool, CoordError>;

    /// Cancel the watch this session left on `path`, if any
    ///
    /// Removing a watch that is not there is not an error.
    async fn remove_watch(&self, path: &str) -> Result<(), CoordError>;

    /// Register the watcher that hears about the session itself
    ///
    /// It receives `SessionExpired` if the session lapses. An orderly
    /// `close` sends nothing. A later call replaces the earlier watcher.
    async fn watch_session(&self, watcher: Watcher) -> Result<(), CoordError>;

    /// Delete a node that has no children
    async fn delete(&self, path: &str) -> Result<(), CoordError>;

    /// End the session, removing its ephemeral nodes and pending watches
    ///
    /// Calling this more than once is harmless.
    async fn close(&self);
}
