//! Coordination service error types

use thiserror::Error;

/// Errors returned by a coordination service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordError {
    #[error("No node at {path}")]
    NoNode { path: String },

    #[error("Node already exists at {path}")]
    NodeExists { path: String },

    #[error("Node {path} has children")]
    NotEmpty { path: String },

    #[error("Ephemeral node {path} cannot have children")]
    NoChildrenForEphemerals { path: String },

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Connection to coordination service lost")]
    ConnectionLoss,

    #[error("Session {0} expired")]
    SessionExpired(u64),
}

impl CoordError {
    /// Check if this error means the service could not be reached
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, CoordError::ConnectionLoss)
    }

    /// Check if this error means the calling session is gone for good
    pub fn is_session_expired(&self) -> bool {
        matches!(self, CoordError::SessionExpired(_))
    }
}
