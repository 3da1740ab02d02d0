//! Checkpoint bookkeeping for one run invocation

use flowgraph_checkpoint::{Checkpoint, CheckpointId, CheckpointReason, CheckpointStore, HumanInteraction};
use std::sync::Arc;

use crate::config::CheckpointPolicy;
use crate::error::Result;
use crate::state::NodeContext;

/// Writes checkpoints for a run and keeps exactly one of them alive
pub(crate) struct Checkpointer {
    store: Option<Arc<dyn CheckpointStore>>,
    policy: CheckpointPolicy,
    active: Option<CheckpointId>,
}

impl Checkpointer {
    /// No store: pauses are reported but not persisted
    pub(crate) fn disabled() -> Self {
        Self {
            store: None,
            policy: CheckpointPolicy::none(),
            active: None,
        }
    }

    pub(crate) fn new(
        store: Arc<dyn CheckpointStore>,
        policy: CheckpointPolicy,
        active: Option<CheckpointId>,
    ) -> Self {
        Self {
            store: Some(store),
            policy,
            active,
        }
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub(crate) fn cadence_due(&self, steps_completed: usize) -> bool {
        self.is_enabled() && self.policy.cadence_due(steps_completed)
    }

    pub(crate) fn on_error(&self) -> bool {
        self.is_enabled() && self.policy.on_error
    }

    /// Snapshot `ctx` as "about to run `node_id`" and make it the active checkpoint
    ///
    /// Returns `None` when no store is attached.
    pub(crate) async fn save(
        &mut self,
        ctx: &NodeContext,
        node_id: &str,
        reason: CheckpointReason,
        steps_completed: usize,
        interaction: Option<HumanInteraction>,
    ) -> Result<Option<CheckpointId>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };

        let mut checkpoint = Checkpoint::new(&ctx.run_id, &ctx.graph_id, node_id, reason)
            .with_state(ctx.state.snapshot(), ctx.state.version())
            .with_metadata(ctx.metadata.clone())
            .with_external_context(ctx.external_context.clone())
            .with_steps_completed(steps_completed);
        if let Some(interaction) = interaction {
            checkpoint = checkpoint.with_pending_interaction(interaction);
        }

        store.save(&checkpoint).await?;
        tracing::debug!(
            run_id = %ctx.run_id,
            checkpoint_id = %checkpoint.id,
            node = %node_id,
            reason = ?reason,
            "Checkpoint saved"
        );

        if let Some(superseded) = self.active.replace(checkpoint.id.clone()) {
            if let Err(e) = store.delete(&superseded).await {
                tracing::warn!(checkpoint_id = %superseded, error = %e, "Failed to delete superseded checkpoint");
            }
        }

        Ok(Some(checkpoint.id))
    }

    /// Delete the active checkpoint once the run no longer needs it
    pub(crate) async fn clear(&mut self) {
        let (Some(store), Some(active)) = (&self.store, self.active.take()) else {
            return;
        };
        if let Err(e) = store.delete(&active).await {
            tracing::warn!(checkpoint_id = %active, error = %e, "Failed to delete completed run checkpoint");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgraph_checkpoint::InMemoryCheckpointStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_supersedes_previous_checkpoint() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let mut checkpointer = Checkpointer::new(store.clone(), CheckpointPolicy::none(), None);

        let mut ctx = NodeContext::new("g", "r");
        ctx.state.set("k", json!(1));

        let first = checkpointer
            .save(&ctx, "a", CheckpointReason::Cadence, 1, None)
            .await
            .unwrap()
            .unwrap();
        let second = checkpointer
            .save(&ctx, "b", CheckpointReason::Cadence, 2, None)
            .await
            .unwrap()
            .unwrap();

        assert!(store.get(&first).await.unwrap().is_none());
        let saved = store.get(&second).await.unwrap().unwrap();
        assert_eq!(saved.current_node_id, "b");
        assert_eq!(saved.state_version, 1);
        assert_eq!(saved.steps_completed, 2);

        checkpointer.clear().await;
        assert!(store.get(&second).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disabled_checkpointer_saves_nothing() {
        let mut checkpointer = Checkpointer::disabled();
        let ctx = NodeContext::new("g", "r");
        let saved = checkpointer
            .save(&ctx, "a", CheckpointReason::Error, 0, None)
            .await
            .unwrap();
        assert!(saved.is_none());
        assert!(!checkpointer.on_error());
    }
}
