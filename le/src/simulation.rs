//! Failover simulation over the in-memory coordination service
//!
//! Starts a group of participants, waits for the group to settle, then
//! repeatedly expires the leader's session and records who takes over.

use std::sync::Arc;
use std::time::Duration;

use coordstore::MemoryCoordinator;
use eyre::{Context, Result, eyre};
use tracing::{debug, info};

use crate::callback::LoggingCallback;
use crate::config::ElectionConfig;
use crate::election::{ElectionMetrics, LeaderElection};
use crate::marker::Marker;
use crate::state::LeadershipState;

/// How long to wait for a participant to reach its expected state
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of one settled round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    pub leader: String,
    /// `(marker, predecessor)` for every follower, in marker order
    pub followers: Vec<(String, String)>,
}

/// Result of a whole simulation
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub rounds: Vec<Round>,
    /// Metrics of the participants still running at the end, by marker
    pub metrics: Vec<(String, ElectionMetrics)>,
}

/// Run `participants` elections and force `failovers` leader failures
pub async fn simulate(config: &ElectionConfig, participants: usize, failovers: usize) -> Result<SimulationReport> {
    debug!(participants, failovers, "simulate: called");
    if participants == 0 {
        return Err(eyre!("Need at least one participant"));
    }
    if failovers >= participants {
        return Err(eyre!(
            "Cannot fail over {} times with only {} participants",
            failovers,
            participants
        ));
    }

    let server = MemoryCoordinator::new();
    let mut group = Vec::with_capacity(participants);
    for idx in 0..participants {
        let session = server.connect().await.context("Failed to open session")?;
        let callback = Arc::new(LoggingCallback::new(format!("participant-{}", idx)));
        let election = LeaderElection::start(Arc::new(session), config, callback)
            .await
            .with_context(|| format!("Participant {} failed to join", idx))?;
        group.push(election);
    }
    group.sort_by_key(|e| Marker::parse(e.marker()).map(|m| m.sequence()));

    let mut rounds = Vec::with_capacity(failovers + 1);
    rounds.push(settle(&group).await?);

    for _ in 0..failovers {
        let leader = group.remove(0);
        info!(marker = %leader.marker(), "Expiring leader session");
        server.expire_session(leader.session_id()).await;
        leader.close().await;
        rounds.push(settle(&group).await?);
    }

    let mut metrics = Vec::with_capacity(group.len());
    for election in &group {
        metrics.push((election.marker().to_string(), election.metrics().await?));
    }
    for election in &group {
        election.close().await;
    }

    Ok(SimulationReport { rounds, metrics })
}

/// Wait until `group` (sorted by marker) shows one leader and a follower chain
async fn settle(group: &[LeaderElection]) -> Result<Round> {
    let mut followers = Vec::new();
    for (idx, election) in group.iter().enumerate() {
        let expected = match idx {
            0 => LeadershipState::Leader,
            _ => LeadershipState::Follower {
                predecessor: group[idx - 1].marker().to_string(),
            },
        };

        let mut rx = election.subscribe();
        tokio::time::timeout(SETTLE_TIMEOUT, rx.wait_for(|state| *state == expected))
            .await
            .map_err(|_| eyre!("{} did not become {} in time", election.marker(), expected))?
            .context("Election task stopped")?;

        if let Some(predecessor) = expected.predecessor() {
            followers.push((election.marker().to_string(), predecessor.to_string()));
        }
    }

    let leader = group.first().map(|e| e.marker().to_string()).unwrap_or_default();
    info!(%leader, followers = followers.len(), "Group settled");
    Ok(Round { leader, followers })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulate_without_failover() {
        let report = simulate(&ElectionConfig::default(), 3, 0).await.unwrap();

        assert_eq!(report.rounds.len(), 1);
        assert_eq!(report.rounds[0].leader, "c_0000000000");
        assert_eq!(
            report.rounds[0].followers,
            vec![
                ("c_0000000001".to_string(), "c_0000000000".to_string()),
                ("c_0000000002".to_string(), "c_0000000001".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_simulate_failovers_promote_in_order() {
        let report = simulate(&ElectionConfig::default(), 4, 2).await.unwrap();

        let leaders: Vec<&str> = report.rounds.iter().map(|r| r.leader.as_str()).collect();
        assert_eq!(leaders, vec!["c_0000000000", "c_0000000001", "c_0000000002"]);
        assert_eq!(report.rounds[2].followers.len(), 1);
        assert_eq!(report.metrics.len(), 2);
        assert_eq!(report.metrics[0].1.leadership_acquired, 1);
    }

    #[tokio::test]
    async fn test_simulate_rejects_bad_counts() {
        assert!(simulate(&ElectionConfig::default(), 0, 0).await.is_err());
        assert!(simulate(&ElectionConfig::default(), 2, 2).await.is_err());
    }
}
