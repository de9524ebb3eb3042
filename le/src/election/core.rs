//! Election task: one consumer for commands and watch notifications
//!
//! Every `re_elect` - whether asked for through the handle or triggered by a
//! watch - runs on this task, so two elections can never interleave.

use std::sync::Arc;

use coordstore::{CoordinationService, WatchedEvent};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::messages::ElectionCommand;
use crate::config::DispatchFailurePolicy;
use crate::elector::Elector;
use crate::error::ElectionError;

/// Run the election task until shutdown or until every handle is gone
pub(crate) async fn run(
    mut elector: Elector,
    service: Arc<dyn CoordinationService>,
    mut commands: mpsc::Receiver<ElectionCommand>,
    mut events: mpsc::UnboundedReceiver<WatchedEvent>,
    policy: DispatchFailurePolicy,
) {
    info!(marker = %elector.marker(), "Election task started");
    if let Err(e) = service.watch_session(elector.watcher()).await {
        warn!(marker = %elector.marker(), error = %e, "Session watcher not registered; expiry will surface on the next call");
    }

    loop {
        tokio::select! {
            biased;

            cmd = commands.recv() => match cmd {
                Some(ElectionCommand::ReElect { reply }) => {
                    debug!("run: ReElect");
                    let result = elector.re_elect().await;
                    let _ = reply.send(result);
                }
                Some(ElectionCommand::GetMetrics { reply }) => {
                    let _ = reply.send(elector.metrics());
                }
                Some(ElectionCommand::Shutdown) => {
                    debug!("run: Shutdown");
                    break;
                }
                None => {
                    debug!("run: all handles dropped");
                    break;
                }
            },

            Some(event) = events.recv() => {
                dispatch(&mut elector, event, &policy).await;
            }
        }
    }

    service.close().await;
    elector.mark_undetermined();
    info!(marker = %elector.marker(), "Election task stopped");
}

/// Handle one watch notification
///
/// Only the deletion of the watched predecessor re-runs the election. An
/// expired session ends the candidacy and leaves the state `Undetermined`.
///
/// Failures stop here: they are logged, leave the elector undetermined and
/// are retried only if the policy says so.
pub(crate) async fn dispatch(elector: &mut Elector, event: WatchedEvent, policy: &DispatchFailurePolicy) {
    if elector.is_closed() {
        debug!(?event, "dispatch: closed, discarding event");
        return;
    }
    if event.is_session_event() {
        let err = ElectionError::SessionExpired(elector.session_id());
        warn!(marker = %elector.marker(), error = %err, "Candidacy lost; re-volunteer to compete again");
        elector.metrics_mut().session_expirations += 1;
        elector.mark_undetermined();
        return;
    }
    if !elector.is_relevant(&event) {
        debug!(?event, watched = ?elector.watched(), "dispatch: ignoring event");
        elector.metrics_mut().ignored_events += 1;
        return;
    }

    info!(path = %event.path, "Predecessor gone, re-electing");
    if let Err(e) = elector.re_elect().await {
        recover(elector, e, policy).await;
    }
}

async fn recover(elector: &mut Elector, err: ElectionError, policy: &DispatchFailurePolicy) {
    warn!(marker = %elector.marker(), error = %err, "Watch-triggered re-election failed; state undetermined");
    elector.metrics_mut().dispatch_failures += 1;

    let DispatchFailurePolicy::Retry { max_attempts, .. } = policy else {
        return;
    };
    let Some(delay) = policy.retry_delay() else {
        return;
    };

    let mut closed = elector.closed_signal();
    let mut last = err;
    for attempt in 1..=*max_attempts {
        if !last.is_retryable() {
            debug!(error = %last, "recover: not retryable");
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = closed.wait_for(|c| *c) => {
                debug!("recover: closed while waiting to retry");
                return;
            }
        }

        match elector.re_elect().await {
            Ok(state) => {
                info!(attempt, %state, "Re-election succeeded on retry");
                return;
            }
            Err(e) => {
                warn!(attempt, error = %e, "Re-election retry failed");
                elector.metrics_mut().dispatch_failures += 1;
                last = e;
            }
        }
    }
    warn!(marker = %elector.marker(), "Retries exhausted; state undetermined");
}
