//! In-memory coordination service
//!
//! `MemoryCoordinator` plays the server: it owns the node tree, tracks
//! sessions and holds pending watches. Each `connect()` hands out a
//! `MemorySession` that implements [`CoordinationService`] for one session.
//!
//! All operations take a single lock over the whole tree, which is what
//! makes child listings linearizable and sequential counters unique.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::CoordError;
use crate::path;
use crate::service::CoordinationService;
use crate::types::{CreateMode, EventKind, SessionId, WatchedEvent, Watcher};

struct Node {
    ephemeral_owner: Option<SessionId>,
    /// Bumped on every child creation; sequential children take the current value
    child_counter: u64,
}

impl Node {
    fn new(ephemeral_owner: Option<SessionId>) -> Self {
        Self {
            ephemeral_owner,
            child_counter: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionStatus {
    Open,
    Expired,
    Closed,
}

struct PendingWatch {
    session: SessionId,
    watcher: Watcher,
}

struct Tree {
    nodes: BTreeMap<String, Node>,
    sessions: HashMap<SessionId, SessionStatus>,
    watches: HashMap<String, Vec<PendingWatch>>,
    session_watchers: HashMap<SessionId, Watcher>,
    next_session: SessionId,
    available: bool,
}

impl Default for Tree {
    fn default() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(path::ROOT.to_string(), Node::new(None));
        Self {
            nodes,
            sessions: HashMap::new(),
            watches: HashMap::new(),
            session_watchers: HashMap::new(),
            next_session: 1,
            available: true,
        }
    }
}

impl Tree {
    fn check(&self, session: SessionId) -> Result<(), CoordError> {
        if !self.available {
            return Err(CoordError::ConnectionLoss);
        }
        match self.sessions.get(&session) {
            Some(SessionStatus::Open) => Ok(()),
            _ => Err(CoordError::SessionExpired(session)),
        }
    }

    /// Deliver and consume every watch pending on `path`
    fn fire(&mut self, path: &str, kind: EventKind) {
        if let Some(pending) = self.watches.remove(path) {
            debug!(%path, ?kind, watchers = pending.len(), "Tree::fire: delivering");
            for watch in pending {
                // A dropped receiver just means nobody is listening any more
                let _ = watch.watcher.send(WatchedEvent::new(kind, path));
            }
        }
    }

    /// Register a watch, replacing any earlier one the same session left on `path`
    fn add_watch(&mut self, path: &str, session: SessionId, watcher: Watcher) {
        let pending = self.watches.entry(path.to_string()).or_default();
        pending.retain(|w| w.session != session);
        pending.push(PendingWatch { session, watcher });
    }

    fn remove_watch(&mut self, path: &str, session: SessionId) {
        if let Some(pending) = self.watches.get_mut(path) {
            pending.retain(|w| w.session != session);
            if pending.is_empty() {
                self.watches.remove(path);
            }
        }
    }

    fn children_of(&self, parent: &str) -> Vec<String> {
        self.nodes
            .keys()
            .filter(|k| path::parent(k) == Some(parent))
            .map(|k| path::basename(k).to_string())
            .collect()
    }

    fn create(&mut self, session: SessionId, path: &str, mode: CreateMode) -> Result<String, CoordError> {
        self.check(session)?;
        path::validate(path)?;
        let parent_path = path::parent(path).ok_or_else(|| CoordError::InvalidPath {
            path: path.to_string(),
            reason: "cannot create the root".to_string(),
        })?;

        let counter = {
            let parent = self.nodes.get(parent_path).ok_or_else(|| CoordError::NoNode {
                path: parent_path.to_string(),
            })?;
            if parent.ephemeral_owner.is_some() {
                return Err(CoordError::NoChildrenForEphemerals {
                    path: parent_path.to_string(),
                });
            }
            parent.child_counter
        };

        let full_path = if mode.is_sequential() {
            path::with_sequence(path, counter)
        } else {
            path.to_string()
        };
        if self.nodes.contains_key(&full_path) {
            return Err(CoordError::NodeExists { path: full_path });
        }

        if let Some(parent) = self.nodes.get_mut(parent_path) {
            parent.child_counter += 1;
        }
        let owner = mode.is_ephemeral().then_some(session);
        self.nodes.insert(full_path.clone(), Node::new(owner));
        debug!(%full_path, ?mode, session, "Tree::create: created");

        self.fire(&full_path, EventKind::NodeCreated);
        Ok(full_path)
    }

    fn delete(&mut self, session: SessionId, path: &str) -> Result<(), CoordError> {
        self.check(session)?;
        path::validate(path)?;
        if path == path::ROOT {
            return Err(CoordError::InvalidPath {
                path: path.to_string(),
                reason: "cannot delete the root".to_string(),
            });
        }
        if !self.nodes.contains_key(path) {
            return Err(CoordError::NoNode { path: path.to_string() });
        }
        if !self.children_of(path).is_empty() {
            return Err(CoordError::NotEmpty { path: path.to_string() });
        }
        self.nodes.remove(path);
        debug!(%path, session, "Tree::delete: deleted");
        self.fire(path, EventKind::NodeDeleted);
        Ok(())
    }

    /// Tear down a session: drop its watches, then remove its ephemeral nodes
    fn end_session(&mut self, session: SessionId, status: SessionStatus) {
        match self.sessions.get(&session) {
            Some(SessionStatus::Open) => {}
            _ => return,
        }
        self.sessions.insert(session, status);

        for pending in self.watches.values_mut() {
            pending.retain(|w| w.session != session);
        }
        self.watches.retain(|_, pending| !pending.is_empty());

        if let Some(watcher) = self.session_watchers.remove(&session) {
            if status == SessionStatus::Expired {
                let _ = watcher.send(WatchedEvent::session_expired());
            }
        }

        let owned: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.ephemeral_owner == Some(session))
            .map(|(path, _)| path.clone())
            .collect();
        for path in owned {
            self.nodes.remove(&path);
            self.fire(&path, EventKind::NodeDeleted);
        }
        info!(session, ?status, "Session ended");
    }
}

/// In-memory stand-in for a coordination service ensemble
#[derive(Clone, Default)]
pub struct MemoryCoordinator {
    tree: Arc<Mutex<Tree>>,
}

impl MemoryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new session
    pub async fn connect(&self) -> Result<MemorySession, CoordError> {
        let mut tree = self.tree.lock().await;
        if !tree.available {
            return Err(CoordError::ConnectionLoss);
        }
        let id = tree.next_session;
        tree.next_session += 1;
        tree.sessions.insert(id, SessionStatus::Open);
        debug!(session = id, "MemoryCoordinator::connect: session opened");
        Ok(MemorySession {
            id,
            tree: Arc::clone(&self.tree),
        })
    }

    /// Expire a session as if its lease had lapsed
    pub async fn expire_session(&self, session: SessionId) {
        debug!(session, "MemoryCoordinator::expire_session: called");
        self.tree.lock().await.end_session(session, SessionStatus::Expired);
    }

    /// Simulate the service becoming unreachable (or reachable again)
    pub async fn set_available(&self, available: bool) {
        debug!(available, "MemoryCoordinator::set_available: called");
        self.tree.lock().await.available = available;
    }

    /// Sorted child names of `path`, bypassing sessions; empty if absent
    pub async fn children(&self, path: &str) -> Vec<String> {
        let tree = self.tree.lock().await;
        let mut names = tree.children_of(path);
        names.sort();
        names
    }

    /// Whether a node exists, bypassing sessions
    pub async fn node_exists(&self, path: &str) -> bool {
        self.tree.lock().await.nodes.contains_key(path)
    }

    /// Number of watches pending on `path`
    pub async fn watch_count(&self, path: &str) -> usize {
        self.tree.lock().await.watches.get(path).map_or(0, Vec::len)
    }

    /// Whether a session is still open
    pub async fn is_session_open(&self, session: SessionId) -> bool {
        matches!(
            self.tree.lock().await.sessions.get(&session),
            Some(SessionStatus::Open)
        )
    }
}

/// One client session on a [`MemoryCoordinator`]
pub struct MemorySession {
    id: SessionId,
    tree: Arc<Mutex<Tree>>,
}

#[async_trait]
impl CoordinationService for MemorySession {
    fn session_id(&self) -> SessionId {
        self.id
    }

    async fn create(&self, path: &str, mode: CreateMode) -> Result<String, CoordError> {
        debug!(session = self.id, %path, ?mode, "MemorySession::create: called");
        self.tree.lock().await.create(self.id, path, mode)
    }

    async fn get_children(&self, path: &str) -> Result<Vec<String>, CoordError> {
        debug!(session = self.id, %path, "MemorySession::get_children: called");
        let tree = self.tree.lock().await;
        tree.check(self.id)?;
        path::validate(path)?;
        if !tree.nodes.contains_key(path) {
            return Err(CoordError::NoNode { path: path.to_string() });
        }
        Ok(tree.children_of(path))
    }

    async fn exists(&self, path: &str, watcher: Option<Watcher>) -> Result<bool, CoordError> {
        debug!(session = self.id, %path, watch = watcher.is_some(), "MemorySession::exists: called");
        let mut tree = self.tree.lock().await;
        tree.check(self.id)?;
        path::validate(path)?;
        let present = tree.nodes.contains_key(path);
        if let Some(watcher) = watcher {
            tree.add_watch(path, self.id, watcher);
        }
        Ok(present)
    }

    async fn remove_watch(&self, path: &str) -> Result<(), CoordError> {
        debug!(session = self.id, %path, "MemorySession::remove_watch: called");
        let mut tree = self.tree.lock().await;
        tree.check(self.id)?;
        path::validate(path)?;
        tree.remove_watch(path, self.id);
        Ok(())
    }

    async fn watch_session(&self, watcher: Watcher) -> Result<(), CoordError> {
        debug!(session = self.id, "MemorySession::watch_session: called");
        let mut tree = self.tree.lock().await;
        tree.check(self.id)?;
        tree.session_watchers.insert(self.id, watcher);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), CoordError> {
        debug!(session = self.id, %path, "MemorySession::delete: called");
        self.tree.lock().await.delete(self.id, path)
    }

    async fn close(&self) {
        debug!(session = self.id, "MemorySession::close: called");
        self.tree.lock().await.end_session(self.id, SessionStatus::Closed);
    }
}
