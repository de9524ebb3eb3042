//! Election outcome callbacks
//!
//! The application learns about election results through this trait. It is
//! deliberately free of coordination-service types so it can be faked.

use tracing::info;

/// Receives the outcome of each election cycle
///
/// Both methods run synchronously on the election task; they must return
/// promptly and must not call back into the election handle and wait on it.
pub trait ElectionCallback: Send + Sync {
    /// Called once each time this process acquires leadership
    fn on_elected_leader(&self);

    /// Called once per election cycle in which this process is not leader
    fn on_follower(&self);
}

/// Callback that only logs the outcome
#[derive(Debug, Clone)]
pub struct LoggingCallback {
    participant: String,
}

impl LoggingCallback {
    pub fn new(participant: impl Into<String>) -> Self {
        Self {
            participant: participant.into(),
        }
    }
}

impl ElectionCallback for LoggingCallback {
    fn on_elected_leader(&self) {
        info!(participant = %self.participant, "I am the leader");
    }

    fn on_follower(&self) {
        info!(participant = %self.participant, "I am not the leader");
    }
}
