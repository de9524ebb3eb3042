//! LeaderElection - client interface to a running election

use std::sync::Arc;

use coordstore::{CoordinationService, SessionId};
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::core;
use super::messages::{ElectionCommand, ElectionMetrics};
use crate::callback::ElectionCallback;
use crate::config::ElectionConfig;
use crate::elector::Elector;
use crate::error::ElectionError;
use crate::registrar::Registrar;
use crate::state::LeadershipState;

/// Handle to this process's participation in an election
///
/// Cloneable; all clones talk to the same election task.
#[derive(Clone)]
pub struct LeaderElection {
    tx: mpsc::Sender<ElectionCommand>,
    state_rx: watch::Receiver<LeadershipState>,
    closed_tx: Arc<watch::Sender<bool>>,
    service: Arc<dyn CoordinationService>,
    marker: String,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl LeaderElection {
    /// Volunteer, start the election task and run the first election
    pub async fn start(
        service: Arc<dyn CoordinationService>,
        config: &ElectionConfig,
        callback: Arc<dyn ElectionCallback>,
    ) -> Result<Self, ElectionError> {
        debug!(namespace = %config.namespace, "LeaderElection::start: called");
        let marker = Registrar::new(Arc::clone(&service), &config.namespace, &config.prefix)
            .volunteer()
            .await?;

        let election = Self::spawn(service, config, callback, marker);
        if let Err(e) = election.re_elect().await {
            election.close().await;
            return Err(e);
        }
        Ok(election)
    }

    /// Start the election task for a marker that has already been created
    ///
    /// No election runs until [`re_elect`](Self::re_elect) is called.
    pub fn spawn(
        service: Arc<dyn CoordinationService>,
        config: &ElectionConfig,
        callback: Arc<dyn ElectionCallback>,
        marker: impl Into<String>,
    ) -> Self {
        let marker = marker.into();
        debug!(%marker, "LeaderElection::spawn: called");

        let (tx, rx) = mpsc::channel(config.command_buffer.max(1));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(false);

        let elector = Elector::new(
            Arc::clone(&service),
            config.namespace.clone(),
            marker.clone(),
            callback,
            event_tx,
            closed_rx,
        );
        let state_rx = elector.subscribe();

        let task = tokio::spawn(core::run(
            elector,
            Arc::clone(&service),
            rx,
            event_rx,
            config.dispatch_failure.clone(),
        ));

        Self {
            tx,
            state_rx,
            closed_tx: Arc::new(closed_tx),
            service,
            marker,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    /// Bare name of this process's candidacy marker
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Session backing the candidacy
    pub fn session_id(&self) -> SessionId {
        self.service.session_id()
    }

    /// Current leadership state
    pub fn state(&self) -> LeadershipState {
        self.state_rx.borrow().clone()
    }

    /// Watch leadership state changes
    pub fn subscribe(&self) -> watch::Receiver<LeadershipState> {
        self.state_rx.clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed_tx.borrow()
    }

    /// Run the election now and wait for its outcome
    ///
    /// Queued behind any election already in progress.
    pub async fn re_elect(&self) -> Result<LeadershipState, ElectionError> {
        debug!(marker = %self.marker, "LeaderElection::re_elect: called");
        if self.is_closed() {
            return Err(ElectionError::Closed);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ElectionCommand::ReElect { reply: reply_tx })
            .await
            .map_err(|_| ElectionError::ChannelError)?;
        reply_rx.await.map_err(|_| ElectionError::ChannelError)?
    }

    /// Get current election metrics
    pub async fn metrics(&self) -> Result<ElectionMetrics, ElectionError> {
        debug!(marker = %self.marker, "LeaderElection::metrics: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ElectionCommand::GetMetrics { reply: reply_tx })
            .await
            .map_err(|_| ElectionError::ChannelError)?;
        reply_rx.await.map_err(|_| ElectionError::ChannelError)
    }

    /// Leave the election
    ///
    /// Wakes [`run`](Self::run) immediately, ends the session (which deletes
    /// our marker) and waits for the election task to stop. No callback
    /// fires after this begins. Safe to call more than once.
    pub async fn close(&self) {
        debug!(marker = %self.marker, "LeaderElection::close: called");
        self.closed_tx.send_replace(true);
        self.service.close().await;
        let _ = self.tx.send(ElectionCommand::Shutdown).await;

        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
            info!(marker = %self.marker, "Left election");
        }
    }

    /// Wait until [`close`](Self::close) is called
    pub async fn run(&self) {
        debug!(marker = %self.marker, "LeaderElection::run: called");
        let mut closed = self.closed_tx.subscribe();
        let _ = closed.wait_for(|c| *c).await;
        debug!("LeaderElection::run: released");
    }
}
