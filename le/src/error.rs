//! Election error types

use coordstore::{CoordError, SessionId};
use thiserror::Error;

/// Errors that can occur while volunteering or electing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ElectionError {
    #[error("Coordination service unavailable")]
    CoordinationUnavailable,

    #[error("Election namespace {namespace} is missing and could not be created: {reason}")]
    NamespaceMissing { namespace: String, reason: String },

    /// The predecessor vanished between listing and arming its watch.
    /// Recovered inside the elector by re-reading; never returned to callers.
    #[error("Predecessor {predecessor} vanished before its watch was armed")]
    StaleWatchRace { predecessor: String },

    #[error("Session {0} expired")]
    SessionExpired(SessionId),

    #[error("Candidacy marker {marker} is no longer in the election namespace")]
    MarkerMissing { marker: String },

    #[error("Election closed")]
    Closed,

    #[error("Election channel error")]
    ChannelError,

    #[error("Coordination error: {0}")]
    Coordination(CoordError),
}

impl ElectionError {
    /// Check if this error ends participation in the election
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ElectionError::NamespaceMissing { .. }
                | ElectionError::SessionExpired(_)
                | ElectionError::MarkerMissing { .. }
                | ElectionError::Closed
                | ElectionError::ChannelError
        )
    }

    /// Check if the process has lost its candidacy and must volunteer again
    pub fn requires_revolunteer(&self) -> bool {
        matches!(self, ElectionError::SessionExpired(_) | ElectionError::MarkerMissing { .. })
    }

    /// Check if running the election again might succeed
    pub fn is_retryable(&self) -> bool {
        !self.is_fatal()
    }
}

impl From<CoordError> for ElectionError {
    fn from(err: CoordError) -> Self {
        match err {
            CoordError::ConnectionLoss => ElectionError::CoordinationUnavailable,
            CoordError::SessionExpired(id) => ElectionError::SessionExpired(id),
            other => ElectionError::Coordination(other),
        }
    }
}
