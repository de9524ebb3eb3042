//! LeaderElect - watch-based leader election
//!
//! Every participant creates an ephemeral sequential candidacy marker under
//! a shared namespace. The participant holding the smallest marker leads;
//! everyone else watches only the marker immediately ahead of theirs, so a
//! departure wakes exactly one successor.
//!
//! # Flow
//!
//! ```text
//! volunteer() ──► re_elect() ──► smallest? ── yes ──► Leader
//!                     ▲              │
//!                     │              no
//!                     │              ▼
//!                     │      watch predecessor ──► Follower
//!                     │              │
//!                     └── deleted ◄──┘
//! ```
//!
//! # Modules
//!
//! - [`registrar`] - creates the candidacy marker
//! - [`elector`] - the re-election algorithm
//! - [`election`] - the task that serialises elections and dispatches watches
//! - [`marker`] - marker parsing and numeric ordering
//! - [`config`] - configuration types and loading
//! - [`simulation`] - in-memory failover simulation used by the CLI
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use coordstore::MemoryCoordinator;
//! use leaderelect::{ElectionConfig, LeaderElection, LoggingCallback};
//!
//! let server = MemoryCoordinator::new();
//! let session = Arc::new(server.connect().await?);
//! let election = LeaderElection::start(session, &ElectionConfig::default(), Arc::new(LoggingCallback::new("me"))).await?;
//! election.run().await;
//! ```

pub mod callback;
pub mod cli;
pub mod config;
pub mod election;
pub mod elector;
pub mod error;
pub mod marker;
pub mod registrar;
pub mod simulation;
pub mod state;

pub use callback::{ElectionCallback, LoggingCallback};
pub use config::{DispatchFailurePolicy, ElectionConfig};
pub use election::{ElectionCommand, ElectionMetrics, LeaderElection};
pub use elector::Elector;
pub use error::ElectionError;
pub use marker::{Marker, Standing, sort_markers, standing};
pub use registrar::Registrar;
pub use simulation::{Round, SimulationReport, simulate};
pub use state::LeadershipState;
