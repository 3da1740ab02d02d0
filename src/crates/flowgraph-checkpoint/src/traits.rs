//! Checkpoint store trait
//!
//! [`CheckpointStore`] is the persistence boundary of the engine. The runner
//! writes checkpoints during a run, reads one back on resume, and deletes it
//! when the run completes. Backends only need to key documents by checkpoint
//! id; ids are unique per run and pause event, so concurrent `save`/`get` on
//! distinct ids must work without extra coordination.
//!
//! # Implementing a backend
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use flowgraph_checkpoint::{Checkpoint, CheckpointStore, Result};
//!
//! struct RedisCheckpointStore { /* connection pool */ }
//!
//! #[async_trait]
//! impl CheckpointStore for RedisCheckpointStore {
//!     async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
//!         // SET checkpoint:{id} <json>
//!         Ok(())
//!     }
//!
//!     async fn get(&self, id: &str) -> Result<Option<Checkpoint>> {
//!         // GET checkpoint:{id}
//!         Ok(None)
//!     }
//!
//!     async fn delete(&self, id: &str) -> Result<()> {
//!         // DEL checkpoint:{id}
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::checkpoint::Checkpoint;
use crate::error::Result;

/// Durable storage for run checkpoints
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist a checkpoint, replacing any stored checkpoint with the same id
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// Fetch a checkpoint by id
    ///
    /// Returns `Ok(None)` when no checkpoint with that id exists.
    async fn get(&self, id: &str) -> Result<Option<Checkpoint>>;

    /// Delete a checkpoint; deleting an unknown id is not an error
    async fn delete(&self, id: &str) -> Result<()>;

    /// The most recently written checkpoint of a run, if any
    ///
    /// The default returns `None`; backends that can index by run id should
    /// override it.
    async fn latest_for_run(&self, _run_id: &str) -> Result<Option<Checkpoint>> {
        Ok(None)
    }
}
