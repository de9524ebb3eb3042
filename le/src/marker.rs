//! Candidacy markers and their ordering
//!
//! Pure functions: given the child names of the election namespace, decide
//! where this process stands. No I/O happens here.

use std::cmp::Ordering;
use std::fmt;

use coordstore::path::SEQUENCE_WIDTH;
use tracing::debug;

/// A candidacy marker: prefix plus service-assigned sequence number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    name: String,
    sequence: u64,
}

impl Marker {
    /// Parse a child name, returning `None` if it carries no numeric suffix
    ///
    /// The suffix is the trailing run of ASCII digits, limited to the width
    /// the service pads sequence numbers to, so a prefix ending in a digit
    /// does not leak into the number.
    pub fn parse(name: &str) -> Option<Self> {
        let digits = name.bytes().rev().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return None;
        }
        let digits = digits.min(SEQUENCE_WIDTH);
        let sequence = name[name.len() - digits..].parse().ok()?;
        Some(Self {
            name: name.to_string(),
            sequence,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Ord for Marker {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sequence
            .cmp(&other.sequence)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for Marker {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Parse and sort child names by sequence number (numerically)
///
/// Children without a numeric suffix are not candidacy markers and are dropped.
pub fn sort_markers<S: AsRef<str>>(children: &[S]) -> Vec<Marker> {
    let mut markers: Vec<Marker> = children
        .iter()
        .filter_map(|child| {
            let child = child.as_ref();
            let marker = Marker::parse(child);
            if marker.is_none() {
                debug!(%child, "sort_markers: ignoring non-marker child");
            }
            marker
        })
        .collect();
    markers.sort();
    markers
}

/// Where a marker stands within a sorted snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Standing<'a> {
    /// Holds the smallest sequence number
    Leader,
    /// Somebody is ahead; `predecessor` is immediately before us
    Follower { predecessor: &'a Marker },
    /// Our marker is not in the snapshot
    Absent,
}

/// Locate `own` in `sorted` (as produced by [`sort_markers`])
pub fn standing<'a>(sorted: &'a [Marker], own: &str) -> Standing<'a> {
    match sorted.iter().position(|m| m.name() == own) {
        None => Standing::Absent,
        Some(0) => Standing::Leader,
        Some(idx) => Standing::Follower {
            predecessor: &sorted[idx - 1],
        },
    }
}
