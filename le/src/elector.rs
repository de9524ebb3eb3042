//! Elector - decides leadership from a fresh namespace snapshot
//!
//! Each `re_elect` call reads the full set of candidacy markers, sorts them
//! numerically and either declares leadership or arms a one-shot watch on
//! the marker immediately ahead of ours. A predecessor that disappears
//! between the listing and the watch sends us back to the listing; we never
//! assume leadership without a read that shows it.

use std::sync::Arc;

use coordstore::{CoordinationService, EventKind, SessionId, WatchedEvent, Watcher, path};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::callback::ElectionCallback;
use crate::election::ElectionMetrics;
use crate::error::ElectionError;
use crate::marker::{self, Standing};
use crate::state::LeadershipState;

/// Election state machine for one candidacy marker
///
/// Not safe to drive concurrently; the election actor owns it and feeds it
/// one command or watch event at a time.
pub struct Elector {
    service: Arc<dyn CoordinationService>,
    namespace: String,
    marker: String,
    callback: Arc<dyn ElectionCallback>,
    /// Sender half of the watch-event queue handed to the service
    watcher: Watcher,
    /// Full path of the predecessor whose watch is armed
    watched: Option<String>,
    state_tx: watch::Sender<LeadershipState>,
    closed: watch::Receiver<bool>,
    metrics: ElectionMetrics,
}

impl Elector {
    pub fn new(
        service: Arc<dyn CoordinationService>,
        namespace: impl Into<String>,
        marker: impl Into<String>,
        callback: Arc<dyn ElectionCallback>,
        watcher: Watcher,
        closed: watch::Receiver<bool>,
    ) -> Self {
        let (state_tx, _) = watch::channel(LeadershipState::Undetermined);
        Self {
            service,
            namespace: namespace.into(),
            marker: marker.into(),
            callback,
            watcher,
            watched: None,
            state_tx,
            closed,
            metrics: ElectionMetrics::default(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn session_id(&self) -> SessionId {
        self.service.session_id()
    }

    pub fn state(&self) -> LeadershipState {
        self.state_tx.borrow().clone()
    }

    /// Observe state changes
    pub fn subscribe(&self) -> watch::Receiver<LeadershipState> {
        self.state_tx.subscribe()
    }

    /// Full path of the predecessor currently being watched
    pub fn watched(&self) -> Option<&str> {
        self.watched.as_deref()
    }

    pub fn metrics(&self) -> ElectionMetrics {
        self.metrics.clone()
    }

    pub(crate) fn metrics_mut(&mut self) -> &mut ElectionMetrics {
        &mut self.metrics
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    pub(crate) fn closed_signal(&self) -> watch::Receiver<bool> {
        self.closed.clone()
    }

    /// Sender half of the event queue, for session-level notifications
    pub(crate) fn watcher(&self) -> Watcher {
        self.watcher.clone()
    }

    fn ensure_open(&self) -> Result<(), ElectionError> {
        if self.is_closed() {
            return Err(ElectionError::Closed);
        }
        Ok(())
    }

    /// Whether a watch notification should trigger re-election
    ///
    /// Only the deletion of the predecessor we are currently watching counts.
    pub fn is_relevant(&self, event: &WatchedEvent) -> bool {
        event.kind == EventKind::NodeDeleted && self.watched.as_deref() == Some(event.path.as_str())
    }

    /// Forget our standing without telling the application
    pub fn mark_undetermined(&mut self) {
        debug!(marker = %self.marker, "Elector::mark_undetermined: called");
        self.watched = None;
        self.state_tx.send_replace(LeadershipState::Undetermined);
    }

    /// Run the election against a fresh snapshot
    ///
    /// Returns once this process is leader or a predecessor watch is armed;
    /// it never waits for the watch to fire. On error the state is left
    /// `Undetermined`. An election overtaken by `close` fails with `Closed`
    /// whatever the service said.
    pub async fn re_elect(&mut self) -> Result<LeadershipState, ElectionError> {
        debug!(marker = %self.marker, "Elector::re_elect: called");
        self.metrics.reelections += 1;
        match self.run_election().await {
            Ok(state) => Ok(state),
            Err(e) => {
                self.mark_undetermined();
                if self.is_closed() {
                    debug!(marker = %self.marker, error = %e, "Elector::re_elect: closed mid-election");
                    return Err(ElectionError::Closed);
                }
                Err(e)
            }
        }
    }

    async fn run_election(&mut self) -> Result<LeadershipState, ElectionError> {
        loop {
            self.ensure_open()?;
            let children = self.service.get_children(&self.namespace).await?;
            self.ensure_open()?;

            let sorted = marker::sort_markers(&children);
            debug!(marker = %self.marker, candidates = sorted.len(), "Elector::run_election: snapshot");

            let predecessor = match marker::standing(&sorted, &self.marker) {
                Standing::Absent => {
                    return Err(ElectionError::MarkerMissing {
                        marker: self.marker.clone(),
                    });
                }
                Standing::Leader => return Ok(self.become_leader()),
                Standing::Follower { predecessor } => predecessor.name().to_string(),
            };

            let predecessor_path = path::join(&self.namespace, &predecessor);
            if let Some(old) = self.watched.take().filter(|old| *old != predecessor_path) {
                debug!(%old, "Elector::run_election: dropping watch on former predecessor");
                self.service.remove_watch(&old).await?;
            }

            let present = self
                .service
                .exists(&predecessor_path, Some(self.watcher.clone()))
                .await?;
            self.ensure_open()?;
            if present {
                self.watched = Some(predecessor_path);
                self.metrics.watches_armed += 1;
                return Ok(self.become_follower(predecessor));
            }

            // An exists watch on an absent node waits for its creation
            self.service.remove_watch(&predecessor_path).await?;
            self.metrics.stale_watch_races += 1;
            let race = ElectionError::StaleWatchRace { predecessor };
            debug!(marker = %self.marker, error = %race, "Elector::run_election: reading again");
        }
    }

    fn become_leader(&mut self) -> LeadershipState {
        self.watched = None;
        let previous = self.state_tx.send_replace(LeadershipState::Leader);
        if !previous.is_leader() {
            info!(marker = %self.marker, "Elected leader");
            self.metrics.leadership_acquired += 1;
            if !self.is_closed() {
                self.callback.on_elected_leader();
            }
        }
        LeadershipState::Leader
    }

    fn become_follower(&mut self, predecessor: String) -> LeadershipState {
        let state = LeadershipState::Follower {
            predecessor: predecessor.clone(),
        };
        self.state_tx.send_replace(state.clone());
        info!(marker = %self.marker, %predecessor, "Following predecessor");
        if !self.is_closed() {
            self.callback.on_follower();
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use coordstore::{CoordError, CreateMode, MemoryCoordinator, MemorySession};
    use tokio::sync::mpsc;

    use crate::registrar::Registrar;

    #[derive(Default)]
    struct Counter {
        elected: AtomicUsize,
        follower: AtomicUsize,
    }

    impl ElectionCallback for Counter {
        fn on_elected_leader(&self) {
            self.elected.fetch_add(1, Ordering::SeqCst);
        }

        fn on_follower(&self) {
            self.follower.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Participant {
        elector: Elector,
        events: mpsc::UnboundedReceiver<WatchedEvent>,
        counter: Arc<Counter>,
        closed_tx: watch::Sender<bool>,
    }

    async fn participant(server: &MemoryCoordinator) -> Participant {
        let session: Arc<dyn CoordinationService> = Arc::new(server.connect().await.unwrap());
        let marker = Registrar::new(Arc::clone(&session), "/election", "c_")
            .volunteer()
            .await
            .unwrap();
        let (tx, events) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(false);
        let counter = Arc::new(Counter::default());
        let elector = Elector::new(session, "/election", marker, counter.clone(), tx, closed_rx);
        Participant {
            elector,
            events,
            counter,
            closed_tx,
        }
    }

    #[tokio::test]
    async fn test_first_volunteer_leads() {
        let server = MemoryCoordinator::new();
        let mut first = participant(&server).await;
        let mut second = participant(&server).await;

        assert_eq!(first.elector.re_elect().await.unwrap(), LeadershipState::Leader);
        assert_eq!(
            second.elector.re_elect().await.unwrap(),
            LeadershipState::Follower {
                predecessor: first.elector.marker().to_string()
            }
        );
        assert_eq!(first.counter.elected.load(Ordering::SeqCst), 1);
        assert_eq!(second.counter.follower.load(Ordering::SeqCst), 1);
        assert_eq!(second.elector.watched(), Some("/election/c_0000000000"));
    }

    #[tokio::test]
    async fn test_leader_callback_once_per_acquisition() {
        let server = MemoryCoordinator::new();
        let mut leader = participant(&server).await;

        leader.elector.re_elect().await.unwrap();
        leader.elector.re_elect().await.unwrap();

        assert_eq!(leader.elector.state(), LeadershipState::Leader);
        assert_eq!(leader.counter.elected.load(Ordering::SeqCst), 1);
        assert_eq!(leader.elector.metrics().leadership_acquired, 1);
    }

    #[tokio::test]
    async fn test_repeated_re_elect_keeps_one_watch() {
        let server = MemoryCoordinator::new();
        let mut leader = participant(&server).await;
        let mut follower = participant(&server).await;
        leader.elector.re_elect().await.unwrap();

        let once = follower.elector.re_elect().await.unwrap();
        let twice = follower.elector.re_elect().await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(server.watch_count("/election/c_0000000000").await, 1);
    }

    #[tokio::test]
    async fn test_deleted_predecessor_event_is_relevant() {
        let server = MemoryCoordinator::new();
        let mut leader = participant(&server).await;
        let mut follower = participant(&server).await;
        leader.elector.re_elect().await.unwrap();
        follower.elector.re_elect().await.unwrap();

        leader.elector.service.close().await;
        let event = follower.events.recv().await.unwrap();

        assert!(follower.elector.is_relevant(&event));
        assert_eq!(follower.elector.re_elect().await.unwrap(), LeadershipState::Leader);
        assert_eq!(follower.counter.elected.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_other_events_are_not_relevant() {
        let server = MemoryCoordinator::new();
        let mut leader = participant(&server).await;
        let mut follower = participant(&server).await;
        leader.elector.re_elect().await.unwrap();
        follower.elector.re_elect().await.unwrap();

        let created = WatchedEvent::new(EventKind::NodeCreated, "/election/c_0000000000");
        let elsewhere = WatchedEvent::new(EventKind::NodeDeleted, "/election/c_0000000042");
        assert!(!follower.elector.is_relevant(&created));
        assert!(!follower.elector.is_relevant(&elsewhere));
        assert!(!leader.elector.is_relevant(&elsewhere));
    }

    #[tokio::test]
    async fn test_recreated_predecessor_read_fresh() {
        let server = MemoryCoordinator::new();
        let third_party: MemorySession = server.connect().await.unwrap();
        let mut leader = participant(&server).await;
        let mut follower = participant(&server).await;
        leader.elector.re_elect().await.unwrap();
        follower.elector.re_elect().await.unwrap();
        let predecessor = "/election/c_0000000000";

        // Predecessor goes away and comes back before we handle the event
        leader.elector.service.close().await;
        third_party.create(predecessor, CreateMode::Persistent).await.unwrap();
        let event = follower.events.recv().await.unwrap();
        assert!(follower.elector.is_relevant(&event));

        let state = follower.elector.re_elect().await.unwrap();

        assert_eq!(
            state,
            LeadershipState::Follower {
                predecessor: "c_0000000000".to_string()
            }
        );
        assert_eq!(follower.counter.elected.load(Ordering::SeqCst), 0);
        assert_eq!(server.watch_count(predecessor).await, 1);
    }

    /// Deletes the node it is asked about on the first `exists` call
    struct RacingService {
        inner: MemorySession,
        admin: MemorySession,
        raced: AtomicBool,
    }

    #[async_trait]
    impl CoordinationService for RacingService {
        fn session_id(&self) -> SessionId {
            self.inner.session_id()
        }

        async fn create(&self, path: &str, mode: CreateMode) -> Result<String, CoordError> {
            self.inner.create(path, mode).await
        }

        async fn get_children(&self, path: &str) -> Result<Vec<String>, CoordError> {
            self.inner.get_children(path).await
        }

        async fn exists(&self, path: &str, watcher: Option<Watcher>) -> Result<bool, CoordError> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                self.admin.delete(path).await?;
            }
            self.inner.exists(path, watcher).await
        }

        async fn remove_watch(&self, path: &str) -> Result<(), CoordError> {
            self.inner.remove_watch(path).await
        }

        async fn watch_session(&self, watcher: Watcher) -> Result<(), CoordError> {
            self.inner.watch_session(watcher).await
        }

        async fn delete(&self, path: &str) -> Result<(), CoordError> {
            self.inner.delete(path).await
        }

        async fn close(&self) {
            self.inner.close().await
        }
    }

    #[tokio::test]
    async fn test_vanished_predecessor_reads_again() {
        let server = MemoryCoordinator::new();
        let admin = server.connect().await.unwrap();
        admin.create("/election", CreateMode::Persistent).await.unwrap();
        admin
            .create("/election/c_", CreateMode::PersistentSequential)
            .await
            .unwrap();
        admin
            .create("/election/c_", CreateMode::PersistentSequential)
            .await
            .unwrap();

        let service: Arc<dyn CoordinationService> = Arc::new(RacingService {
            inner: server.connect().await.unwrap(),
            admin: server.connect().await.unwrap(),
            raced: AtomicBool::new(false),
        });
        let marker = Registrar::new(Arc::clone(&service), "/election", "c_")
            .volunteer()
            .await
            .unwrap();
        assert_eq!(marker, "c_0000000002");

        let (tx, _events) = mpsc::unbounded_channel();
        let (_closed_tx, closed_rx) = watch::channel(false);
        let counter = Arc::new(Counter::default());
        let mut elector = Elector::new(service, "/election", marker, counter.clone(), tx, closed_rx);

        let state = elector.re_elect().await.unwrap();

        assert_eq!(
            state,
            LeadershipState::Follower {
                predecessor: "c_0000000000".to_string()
            }
        );
        assert_eq!(elector.metrics().stale_watch_races, 1);
        assert_eq!(elector.watched(), Some("/election/c_0000000000"));
        assert_eq!(server.watch_count("/election/c_0000000001").await, 0);
        assert_eq!(server.watch_count("/election/c_0000000000").await, 1);
        assert_eq!(counter.follower.load(Ordering::SeqCst), 1);
        assert_eq!(counter.elected.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_new_predecessor_replaces_old_watch() {
        let server = MemoryCoordinator::new();
        let admin = server.connect().await.unwrap();
        let mut leader = participant(&server).await;
        let mut follower = participant(&server).await;
        leader.elector.re_elect().await.unwrap();
        follower.elector.re_elect().await.unwrap();
        assert_eq!(follower.elector.watched(), Some("/election/c_0000000000"));

        // A marker slipped in between us and the one we watch
        admin.create("/election/x_0000000000", CreateMode::Persistent).await.unwrap();
        follower.elector.re_elect().await.unwrap();

        assert_eq!(follower.elector.watched(), Some("/election/x_0000000000"));
        assert_eq!(server.watch_count("/election/x_0000000000").await, 1);
        assert_eq!(server.watch_count("/election/c_0000000000").await, 0);
    }

    #[tokio::test]
    async fn test_missing_marker() {
        let server = MemoryCoordinator::new();
        let admin = server.connect().await.unwrap();
        let mut p = participant(&server).await;

        admin.delete("/election/c_0000000000").await.unwrap();
        let err = p.elector.re_elect().await.unwrap_err();

        assert!(err.requires_revolunteer());
        assert_eq!(p.elector.state(), LeadershipState::Undetermined);
    }

    #[tokio::test]
    async fn test_failure_leaves_undetermined() {
        let server = MemoryCoordinator::new();
        let mut p = participant(&server).await;
        p.elector.re_elect().await.unwrap();

        server.set_available(false).await;
        let err = p.elector.re_elect().await.unwrap_err();

        assert_eq!(err, ElectionError::CoordinationUnavailable);
        assert_eq!(p.elector.state(), LeadershipState::Undetermined);
        assert_eq!(p.elector.watched(), None);
    }

    #[tokio::test]
    async fn test_closed_elector_refuses_to_run() {
        let server = MemoryCoordinator::new();
        let mut p = participant(&server).await;
        p.closed_tx.send_replace(true);

        assert_eq!(p.elector.re_elect().await.unwrap_err(), ElectionError::Closed);
        assert_eq!(p.counter.elected.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_foreign_children_ignored() {
        let server = MemoryCoordinator::new();
        let admin = server.connect().await.unwrap();
        admin.create("/election", CreateMode::Persistent).await.unwrap();
        admin.create("/election/config", CreateMode::Persistent).await.unwrap();
        let mut p = participant(&server).await;

        assert_eq!(p.elector.re_elect().await.unwrap(), LeadershipState::Leader);
    }
}
