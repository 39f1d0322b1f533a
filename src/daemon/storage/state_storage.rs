use std::{
    future::Future,
    ops::Deref,
    path::{Path, PathBuf},
};

use anyhow::Result;
use fs4::tokio::AsyncFileExt;
use tokio::fs::File;
use tracing::debug;

use crate::fs::operations::{read_if_exists, write_atomically};

use super::entities::StateEntity;

/// Interface for abstracting storage of the tracker state.
pub trait StateStorage {
    /// Loads the stored state, upgrading older layouts. `None` means nothing was stored yet.
    fn load(&self) -> impl Future<Output = Result<Option<StateEntity>>>;

    /// Replaces the stored state as a whole.
    fn save(&self, state: &StateEntity) -> impl Future<Output = Result<()>>;
}

impl<T: Deref> StateStorage for T
where
    T::Target: StateStorage,
{
    fn load(&self) -> impl Future<Output = Result<Option<StateEntity>>> {
        self.deref().load()
    }

    fn save(&self, state: &StateEntity) -> impl Future<Output = Result<()>> {
        self.deref().save(state)
    }
}

/// The main realization of [StateStorage]. The state is a single json document that is
/// rewritten atomically. Access from several processes (the tracker and the cli) is coordinated
/// through a lock on a sibling `.lock` file, since the document itself is replaced on every
/// write.
pub struct FileStateStorage {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileStateStorage {
    pub fn new(path: PathBuf) -> Result<Self, std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let lock_path = path.with_extension("lock");
        Ok(Self { path, lock_path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open_lock(&self) -> Result<File, std::io::Error> {
        File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .await
    }

    async fn load_inner(&self) -> Result<Option<StateEntity>> {
        let Some(bytes) = read_if_exists(&self.path).await? else {
            return Ok(None);
        };
        let value = serde_json::from_slice::<serde_json::Value>(&bytes)?;
        Ok(Some(StateEntity::migrate(value)?))
    }

    /// Loads, modifies and stores the state while holding the exclusive lock, so that no other
    /// writer can slip in between.
    pub async fn update(&self, change: impl FnOnce(&mut StateEntity)) -> Result<StateEntity> {
        let lock = self.open_lock().await?;
        lock.lock_exclusive()?;
        let result: Result<StateEntity> = async {
            let mut state = self.load_inner().await?.unwrap_or_default();
            change(&mut state);
            write_atomically(&self.path, &serde_json::to_vec_pretty(&state)?).await?;
            Ok(state)
        }
        .await;
        lock.unlock_async().await?;
        result
    }
}

impl StateStorage for FileStateStorage {
    async fn load(&self) -> Result<Option<StateEntity>> {
        debug!("Loading state from {:?}", self.path);
        let lock = self.open_lock().await?;
        lock.lock_shared()?;
        let result = self.load_inner().await;
        lock.unlock_async().await?;
        result
    }

    async fn save(&self, state: &StateEntity) -> Result<()> {
        debug!("Saving state to {:?}", self.path);
        let lock = self.open_lock().await?;
        // Semi-safe acquire-release for a file
        lock.lock_exclusive()?;
        let result = match serde_json::to_vec_pretty(state) {
            Ok(bytes) => write_atomically(&self.path, &bytes).await.map_err(Into::into),
            Err(e) => Err(e.into()),
        };
        lock.unlock_async().await?;
        result
    }
}
