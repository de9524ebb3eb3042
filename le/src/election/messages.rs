//! Message types for the election actor

use serde::Serialize;
use tokio::sync::oneshot;

use crate::error::ElectionError;
use crate::state::LeadershipState;

/// Requests to the election task
#[derive(Debug)]
pub enum ElectionCommand {
    /// Run the election now
    ReElect {
        reply: oneshot::Sender<Result<LeadershipState, ElectionError>>,
    },

    /// Get current metrics
    GetMetrics {
        reply: oneshot::Sender<ElectionMetrics>,
    },

    /// Stop the election task and end the session
    Shutdown,
}

/// Election counters for observability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ElectionMetrics {
    pub reelections: u64,
    pub watches_armed: u64,
    pub stale_watch_races: u64,
    pub leadership_acquired: u64,
    pub ignored_events: u64,
    pub dispatch_failures: u64,
    pub session_expirations: u64,
}
