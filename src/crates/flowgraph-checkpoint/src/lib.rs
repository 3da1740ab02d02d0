//! # flowgraph-checkpoint - Run Persistence for Graph Workflows
//!
//! Data model and storage abstractions used by `flowgraph-core` to persist an
//! in-flight run and pick it up again later, either after a failure or after a
//! pause for human input.
//!
//! ## Core Concepts
//!
//! - [`Checkpoint`] - snapshot of a run taken just before a node executes
//! - [`CheckpointStore`] - async persistence boundary (`save` / `get` / `delete`)
//! - [`HumanInteraction`] / [`HumanResponse`] - the question a paused run is
//!   waiting on, and the answer that resumes it
//! - [`ExternalContext`] - caller identity carried across pause and resume
//!
//! ## Backends
//!
//! | Store | Use |
//! |-------|-----|
//! | [`InMemoryCheckpointStore`] | tests, single-process runs |
//! | [`FileCheckpointStore`] | one JSON document per checkpoint on local disk |
//!
//! Other backends (SQL, Redis, object storage) implement [`CheckpointStore`]
//! directly; documents are keyed by checkpoint id only.
//!
//! ## Quick Start
//!
//! ```rust
//! use flowgraph_checkpoint::{
//!     Checkpoint, CheckpointReason, CheckpointStore, HumanInteraction, InMemoryCheckpointStore,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryCheckpointStore::new();
//!
//! let checkpoint = Checkpoint::new("run-42", "approval-flow", "review", CheckpointReason::Interrupt)
//!     .with_pending_interaction(
//!         HumanInteraction::new("review", "Approve the draft?").with_options(["yes", "no"]),
//!     );
//! store.save(&checkpoint).await?;
//!
//! let loaded = store.get(&checkpoint.id).await?.expect("just saved");
//! assert!(loaded.is_paused());
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod error;
pub mod file;
pub mod interaction;
pub mod memory;
pub mod serializer;
pub mod traits;

pub use checkpoint::{Checkpoint, CheckpointId, CheckpointReason};
pub use error::{CheckpointError, Result};
pub use file::FileCheckpointStore;
pub use interaction::{ExternalContext, HumanInteraction, HumanResponse};
pub use memory::InMemoryCheckpointStore;
pub use serializer::{JsonSerializer, SerializerProtocol};
pub use traits::CheckpointStore;
