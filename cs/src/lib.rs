//! CoordStore - hierarchical coordination service contract
//!
//! Describes the small slice of a ZooKeeper-style coordination service that
//! leader election needs, and ships an in-memory implementation of it.
//!
//! # Model
//!
//! ```text
//! /                         persistent root
//! └── election/             persistent namespace
//!     ├── c_0000000000      ephemeral-sequential, owned by session 1
//!     ├── c_0000000001      ephemeral-sequential, owned by session 2
//!     └── ...
//! ```
//!
//! - **Sessions** own ephemeral nodes; when a session closes or expires its
//!   nodes disappear.
//! - **Sequential** creates append a per-parent counter that never repeats.
//! - **Watches** are one-shot and delivered through an unbounded channel.
//!   A session can cancel its own watch, and may register one session
//!   watcher that hears `SessionExpired`.
//!
//! # Example
//!
//! ```ignore
//! use coordstore::{CoordinationService, CreateMode, MemoryCoordinator};
//!
//! let server = MemoryCoordinator::new();
//! let session = server.connect().await?;
//! session.create("/election", CreateMode::Persistent).await?;
//! let marker = session.create("/election/c_", CreateMode::EphemeralSequential).await?;
//! ```

mod error;
mod memory;
pub mod path;
mod service;
mod types;

pub use error::CoordError;
pub use memory::{MemoryCoordinator, MemorySession};
pub use service::CoordinationService;
pub use types::{CreateMode, EventKind, SessionId, WatchedEvent, Watcher};
