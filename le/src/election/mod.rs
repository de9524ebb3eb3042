//! Election task and its handle
//!
//! The election runs as an actor: the `Elector` is owned by a single task
//! that drains two queues:
//! - **Commands** from any number of [`LeaderElection`] handles
//! - **Watch events** pushed by the coordination service
//!
//! Serialising both through one task is what keeps re-elections from
//! interleaving.

mod core;
mod handle;
mod messages;

pub use handle::LeaderElection;
pub use messages::{ElectionCommand, ElectionMetrics};
