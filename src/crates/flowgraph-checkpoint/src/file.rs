//! File-backed checkpoint store
//!
//! Stores one document per checkpoint in a directory:
//!
//! ```text
//! checkpoints/
//! ├── 6f1c...e2.json
//! ├── 9a04...7b.json
//! └── ...
//! ```
//!
//! Writes go to a temporary file that is renamed into place, so a reader never
//! observes a half-written checkpoint and saves of distinct ids never contend.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::checkpoint::Checkpoint;
use crate::error::{CheckpointError, Result};
use crate::serializer::{JsonSerializer, SerializerProtocol};
use crate::traits::CheckpointStore;

/// Checkpoint store writing one file per checkpoint
#[derive(Debug, Clone)]
pub struct FileCheckpointStore<S = JsonSerializer> {
    dir: PathBuf,
    serializer: S,
}

impl FileCheckpointStore<JsonSerializer> {
    /// Create a JSON file store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_serializer(dir, JsonSerializer::pretty())
    }
}

impl<S: SerializerProtocol> FileCheckpointStore<S> {
    /// Create a store with a custom serializer
    pub fn with_serializer(dir: impl Into<PathBuf>, serializer: S) -> Self {
        Self {
            dir: dir.into(),
            serializer,
        }
    }

    /// Directory the checkpoints are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn checkpoint_path(&self, id: &str) -> Result<PathBuf> {
        validate_id(id)?;
        Ok(self
            .dir
            .join(format!("{}.{}", id, self.serializer.extension())))
    }

    async fn read_checkpoint(&self, path: &Path) -> Result<Checkpoint> {
        let data = fs::read(path).await?;
        self.serializer.loads(&data).map_err(|e| {
            CheckpointError::Invalid(format!("{}: {}", path.display(), e))
        })
    }
}

/// Ids become file names, so reject anything that could escape the directory
fn validate_id(id: &str) -> Result<()> {
    let ok = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(CheckpointError::Invalid(format!("illegal checkpoint id '{}'", id)))
    }
}

#[async_trait]
impl<S: SerializerProtocol> CheckpointStore for FileCheckpointStore<S> {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let final_path = self.checkpoint_path(&checkpoint.id)?;
        fs::create_dir_all(&self.dir).await?;

        let data = self.serializer.dumps(checkpoint)?;
        let temp_path = self.dir.join(format!("{}.tmp", checkpoint.id));

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &final_path).await?;
        tracing::debug!(
            checkpoint_id = %checkpoint.id,
            path = %final_path.display(),
            "Checkpoint written"
        );
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Checkpoint>> {
        // no file can exist under an id this store would refuse to write
        if validate_id(id).is_err() {
            return Ok(None);
        }
        let path = self.checkpoint_path(id)?;
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        self.read_checkpoint(&path).await.map(Some)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = self.checkpoint_path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn latest_for_run(&self, run_id: &str) -> Result<Option<Checkpoint>> {
        if !fs::try_exists(&self.dir).await? {
            return Ok(None);
        }

        let extension = self.serializer.extension();
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut latest: Option<Checkpoint> = None;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(extension) {
                continue;
            }
            let checkpoint = match self.read_checkpoint(&path).await {
                Ok(checkpoint) => checkpoint,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable checkpoint");
                    continue;
                }
            };
            if checkpoint.run_id != run_id {
                continue;
            }
            if latest.as_ref().map_or(true, |l| checkpoint.ts > l.ts) {
                latest = Some(checkpoint);
            }
        }

        Ok(latest)
    }
}
