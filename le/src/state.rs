//! Leadership state

use std::fmt;

/// Where this process currently stands, as of its last re-election
///
/// Derived from a namespace snapshot; never authoritative on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LeadershipState {
    /// No successful election yet, or the last one failed
    #[default]
    Undetermined,
    /// Holds the smallest marker
    Leader,
    /// Watching the marker immediately ahead
    Follower { predecessor: String },
}

impl LeadershipState {
    pub fn is_leader(&self) -> bool {
        matches!(self, LeadershipState::Leader)
    }

    pub fn is_follower(&self) -> bool {
        matches!(self, LeadershipState::Follower { .. })
    }

    /// The watched predecessor's bare name, if following
    pub fn predecessor(&self) -> Option<&str> {
        match self {
            LeadershipState::Follower { predecessor } => Some(predecessor),
            _ => None,
        }
    }
}

impl fmt::Display for LeadershipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeadershipState::Undetermined => write!(f, "undetermined"),
            LeadershipState::Leader => write!(f, "leader"),
            LeadershipState::Follower { predecessor } => write!(f, "follower (watching {})", predecessor),
        }
    }
}
