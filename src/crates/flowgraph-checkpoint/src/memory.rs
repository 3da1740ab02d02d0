//! In-memory checkpoint store
//!
//! Reference [`CheckpointStore`] for single-process use and tests. All
//! checkpoints live in a `HashMap` behind a `tokio` `RwLock`, so the store can
//! be cloned and shared between runs cheaply.
//!
//! ```rust
//! use flowgraph_checkpoint::{Checkpoint, CheckpointReason, CheckpointStore, InMemoryCheckpointStore};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryCheckpointStore::new();
//! let checkpoint = Checkpoint::new("run-1", "graph", "step", CheckpointReason::Cadence);
//!
//! store.save(&checkpoint).await?;
//! assert!(store.get(&checkpoint.id).await?.is_some());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::checkpoint::Checkpoint;
use crate::error::Result;
use crate::traits::CheckpointStore;

type CheckpointStorage = Arc<RwLock<HashMap<String, Checkpoint>>>;

/// Checkpoint store kept entirely in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckpointStore {
    storage: CheckpointStorage,
}

impl InMemoryCheckpointStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored checkpoints
    pub async fn len(&self) -> usize {
        self.storage.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.storage.read().await.is_empty()
    }

    /// Ids of all checkpoints written for a run
    pub async fn ids_for_run(&self, run_id: &str) -> Vec<String> {
        self.storage
            .read()
            .await
            .values()
            .filter(|c| c.run_id == run_id)
            .map(|c| c.id.clone())
            .collect()
    }

    /// Clear all checkpoints (useful for testing)
    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.storage
            .write()
            .await
            .insert(checkpoint.id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Checkpoint>> {
        Ok(self.storage.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.storage.write().await.remove(id);
        Ok(())
    }

    async fn latest_for_run(&self, run_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self
            .storage
            .read()
            .await
            .values()
            .filter(|c| c.run_id == run_id)
            .max_by_key(|c| c.ts)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointReason;

    #[tokio::test]
    async fn test_save_and_load_checkpoint() {
        let store = InMemoryCheckpointStore::new();
        let checkpoint = Checkpoint::new("run-1", "graph", "a", CheckpointReason::Cadence);

        store.save(&checkpoint).await.unwrap();

        let loaded = store.get(&checkpoint.id).await.unwrap();
        assert_eq!(loaded.unwrap().current_node_id, "a");
    }

    #[tokio::test]
    async fn test_get_unknown_returns_none() {
        let store = InMemoryCheckpointStore::new();
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryCheckpointStore::new();
        let checkpoint = Checkpoint::new("run-1", "graph", "a", CheckpointReason::Error);
        store.save(&checkpoint).await.unwrap();
        assert_eq!(store.len().await, 1);

        store.delete(&checkpoint.id).await.unwrap();
        assert!(store.is_empty().await);

        // Deleting twice is fine
        store.delete(&checkpoint.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_latest_for_run() {
        let store = InMemoryCheckpointStore::new();
        let first = Checkpoint::new("run-1", "graph", "a", CheckpointReason::Cadence);
        let mut second = Checkpoint::new("run-1", "graph", "b", CheckpointReason::Cadence);
        second.ts = first.ts + chrono::Duration::seconds(1);
        let other = Checkpoint::new("run-2", "graph", "z", CheckpointReason::Cadence);

        store.save(&first).await.unwrap();
        store.save(&second).await.unwrap();
        store.save(&other).await.unwrap();

        let latest = store.latest_for_run("run-1").await.unwrap().unwrap();
        assert_eq!(latest.current_node_id, "b");
        assert_eq!(store.ids_for_run("run-1").await.len(), 2);
        assert!(store.latest_for_run("run-3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_saves_on_distinct_ids() {
        let store = InMemoryCheckpointStore::new();
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let checkpoint = Checkpoint::new(
                    format!("run-{}", i),
                    "graph",
                    "a",
                    CheckpointReason::Cadence,
                );
                store.save(&checkpoint).await.unwrap();
                store.get(&checkpoint.id).await.unwrap().is_some()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert_eq!(store.len().await, 16);
    }
}
