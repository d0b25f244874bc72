//! Durable holder of the single admin credential.
//!
//! The credential lives in memory for fast reads and is mirrored to a
//! [`CredentialSlot`] so it survives process restarts.

use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

use crate::error::{ConsoleError, ConsoleResult};
use crate::models::Credential;

/// Fixed key of the persisted session slot.
pub const SESSION_SLOT: &str = "admin_session";

/// A durable key-value slot holding one serialized credential.
pub trait CredentialSlot: Send + Sync {
    fn load(&self) -> io::Result<Option<String>>;
    fn save(&self, value: &str) -> io::Result<()>;
    fn remove(&self) -> io::Result<()>;
}

/// Slot stored as `<dir>/admin_session.json`.
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", SESSION_SLOT)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialSlot for FileSlot {
    fn load(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, value: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Write-then-rename so a crash never leaves a half-written slot.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &self.path)
    }

    fn remove(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Process-local slot, used when persistence is not wanted.
#[derive(Default)]
pub struct MemorySlot {
    value: Mutex<Option<String>>,
}

impl MemorySlot {
    fn with_value<T>(&self, f: impl FnOnce(&mut Option<String>) -> T) -> io::Result<T> {
        let mut guard = self
            .value
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory slot lock poisoned"))?;
        Ok(f(&mut guard))
    }
}

impl CredentialSlot for MemorySlot {
    fn load(&self) -> io::Result<Option<String>> {
        self.with_value(|value| value.clone())
    }

    fn save(&self, value: &str) -> io::Result<()> {
        self.with_value(|slot| *slot = Some(value.to_string()))
    }

    fn remove(&self) -> io::Result<()> {
        self.with_value(|slot| *slot = None)
    }
}

#[derive(Clone)]
pub struct CredentialStore {
    slot: Arc<dyn CredentialSlot>,
    current: Arc<RwLock<Option<Credential>>>,
}

impl CredentialStore {
    /// Open the store, restoring whatever credential the slot holds.
    ///
    /// A slot that cannot be read back as a well-formed credential is
    /// discarded: a credential is either fully present or absent.
    pub fn open(slot: Arc<dyn CredentialSlot>) -> Self {
        let restored = match slot.load() {
            Ok(Some(raw)) => match serde_json::from_str::<Credential>(&raw) {
                Ok(credential) if credential.is_well_formed() => {
                    tracing::debug!(admin_id = %credential.admin.id, "Restored persisted session");
                    Some(credential)
                }
                Ok(_) | Err(_) => {
                    tracing::warn!("Discarding malformed persisted session");
                    if let Err(e) = slot.remove() {
                        tracing::warn!(error = %e, "Failed to remove malformed session slot");
                    }
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read persisted session");
                None
            }
        };

        Self {
            slot,
            current: Arc::new(RwLock::new(restored)),
        }
    }

    pub fn in_memory() -> Self {
        Self::open(Arc::new(MemorySlot::default()))
    }

    pub async fn get(&self) -> Option<Credential> {
        self.current.read().await.clone()
    }

    /// Persist and install `credential`. Nothing changes if persisting fails.
    pub async fn set(&self, credential: Credential) -> ConsoleResult<()> {
        let mut current = self.current.write().await;
        self.persist(&credential).await?;
        *current = Some(credential);
        Ok(())
    }

    /// Drop the credential. The in-memory copy is always cleared; an error is
    /// returned only if the persisted slot could not be removed.
    pub async fn clear(&self) -> ConsoleResult<()> {
        let mut current = self.current.write().await;
        *current = None;
        self.remove_slot().await
    }

    /// True iff a credential is present and `now < expires_at`.
    pub async fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.current
            .read()
            .await
            .as_ref()
            .is_some_and(|credential| credential.is_valid_at(now))
    }

    /// Install `replacement` only if the store still holds the credential
    /// identified by `expected_token`. Returns whether the swap happened.
    pub async fn replace_if_current(
        &self,
        expected_token: &str,
        replacement: Credential,
    ) -> ConsoleResult<bool> {
        let mut current = self.current.write().await;
        if !holds_token(current.as_ref(), expected_token) {
            return Ok(false);
        }
        self.persist(&replacement).await?;
        *current = Some(replacement);
        Ok(true)
    }

    /// Clear the store only if it still holds the credential identified by
    /// `expected_token`. Returns whether anything was cleared.
    pub async fn clear_if_current(&self, expected_token: &str) -> ConsoleResult<bool> {
        let mut current = self.current.write().await;
        if !holds_token(current.as_ref(), expected_token) {
            return Ok(false);
        }
        *current = None;
        self.remove_slot().await?;
        Ok(true)
    }

    async fn persist(&self, credential: &Credential) -> ConsoleResult<()> {
        let raw = serde_json::to_string(credential)
            .map_err(|e| ConsoleError::Storage(format!("serialize session: {}", e)))?;
        let slot = self.slot.clone();
        on_blocking_pool(move || slot.save(&raw))
            .await
            .map_err(|e| ConsoleError::Storage(format!("write session slot: {}", e)))
    }

    async fn remove_slot(&self) -> ConsoleResult<()> {
        let slot = self.slot.clone();
        on_blocking_pool(move || slot.remove())
            .await
            .map_err(|e| ConsoleError::Storage(format!("remove session slot: {}", e)))
    }
}

/// Slot I/O may touch the filesystem; keep it off the async workers.
async fn on_blocking_pool<T, F>(op: F) -> io::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

fn holds_token(current: Option<&Credential>, token: &str) -> bool {
    current.is_some_and(|credential| credential.access_token == token)
}
