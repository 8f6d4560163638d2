//! Filesystem lock marker with staleness recovery
//!
//! A run is "in progress" while the marker file exists and is younger than
//! the staleness threshold. Older markers are left behind by runs that were
//! killed and get reclaimed by the next invocation.
//!
//! The marker is created with `create_new`, which maps to `O_CREAT|O_EXCL`.
//! Two runs that both see a free lock cannot both acquire it.
//!
//! Removal is conditional on the marker's identity (device, inode and
//! modification time). The marker is first renamed to a private sibling
//! name and inspected there; a marker that turns out to be someone else's
//! is linked back into place. Stale reclaims are serialized through a
//! short-lived `<marker>.reclaim` file, so at most one run judges and
//! removes a given stale marker.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, warn};

use crate::LOG_PREFIX;
use crate::error::{Error, Result};

const LOCK_TIMEOUT_MESSAGE: &str = "Lock timeout reached, clear previous locks.";

static ASIDE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Result of inspecting the lock marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// No marker present
    Free,
    /// Marker present and within the staleness threshold, or another run
    /// is reclaiming it right now
    Active { age: Duration },
    /// Marker was older than the threshold and has been removed
    Reclaimed { age: Duration },
}

impl LockState {
    /// Whether another run should be considered in progress
    pub fn is_active(&self) -> bool {
        matches!(self, LockState::Active { .. })
    }
}

/// Identity of one marker file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MarkerId {
    dev: u64,
    ino: u64,
    modified: SystemTime,
}

impl MarkerId {
    fn of(meta: &std::fs::Metadata) -> std::io::Result<Self> {
        #[cfg(unix)]
        let (dev, ino) = {
            use std::os::unix::fs::MetadataExt;
            (meta.dev(), meta.ino())
        };
        #[cfg(not(unix))]
        let (dev, ino) = (0, 0);

        Ok(Self {
            dev,
            ino,
            modified: meta.modified()?,
        })
    }
}

/// What a conditional removal found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Removed,
    Missing,
    Replaced,
}

/// Lock marker at a fixed path
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    stale_after: Duration,
    /// Marker created by this guard, if it currently holds the lock
    owned: Mutex<Option<MarkerId>>,
}

impl LockGuard {
    /// Default staleness threshold
    pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(600);

    /// Create a guard for `path` with the given staleness threshold
    pub fn new(path: impl Into<PathBuf>, stale_after: Duration) -> Self {
        Self {
            path: path.into(),
            stale_after,
            owned: Mutex::new(None),
        }
    }

    /// Marker path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Staleness threshold
    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Whether this guard created the marker and has not released it
    pub fn is_held(&self) -> bool {
        self.owned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Whether another run holds the lock
    ///
    /// A stale marker is removed as a side effect and reported as free.
    pub async fn is_active(&self) -> Result<bool> {
        Ok(self.probe().await?.is_active())
    }

    /// Inspect the marker, reclaiming it if stale
    pub async fn probe(&self) -> Result<LockState> {
        let Some((_, age)) = self.inspect(&self.path).await? else {
            return Ok(LockState::Free);
        };

        if age <= self.stale_after {
            return Ok(LockState::Active { age });
        }

        self.reclaim(age).await
    }

    /// Create the marker
    ///
    /// Fails with [`Error::LockHeld`] if the marker already exists.
    pub async fn acquire(&self) -> Result<()> {
        let file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(Error::lock_held(format!(
                    "Lock marker {} already exists",
                    self.path.display()
                )));
            }
            Err(e) => {
                return Err(Error::lock(format!(
                    "Failed to create lock marker {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let id = match file.metadata().await.and_then(|meta| MarkerId::of(&meta)) {
            Ok(id) => id,
            Err(e) => {
                // Nobody else can own it yet, so the plain unlink is safe
                let _ = fs::remove_file(&self.path).await;
                return Err(Error::lock(format!(
                    "Failed to inspect new lock marker {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        *self.owned.lock().unwrap_or_else(PoisonError::into_inner) = Some(id);
        debug!(marker = %self.path.display(), "Lock acquired");
        Ok(())
    }

    /// Remove the marker created by [`LockGuard::acquire`]
    ///
    /// A marker that was reclaimed and re-created by another run in the
    /// meantime is left in place. Without a prior acquire this does nothing.
    pub async fn release(&self) -> Result<()> {
        let owned = self
            .owned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(id) = owned else {
            debug!(marker = %self.path.display(), "No lock held, nothing to release");
            return Ok(());
        };

        match self.remove_if(&self.path, id).await? {
            Removal::Removed => debug!(marker = %self.path.display(), "Lock released"),
            Removal::Missing => warn!(
                marker = %self.path.display(),
                "Lock marker was already removed by another run"
            ),
            Removal::Replaced => warn!(
                marker = %self.path.display(),
                "Lock marker now belongs to another run, leaving it in place"
            ),
        }
        Ok(())
    }

    /// Identity and age of the file at `path`, if any
    async fn inspect(&self, path: &Path) -> Result<Option<(MarkerId, Duration)>> {
        let meta = match fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::lock(format!(
                    "Failed to inspect lock marker {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let id = MarkerId::of(&meta).map_err(|e| {
            Error::lock(format!(
                "Failed to read modification time of {}: {}",
                path.display(),
                e
            ))
        })?;

        // A marker from the future (clock step) counts as fresh
        let age = SystemTime::now()
            .duration_since(id.modified)
            .unwrap_or(Duration::ZERO);

        let modified_at: DateTime<Utc> = id.modified.into();
        debug!(
            marker = %path.display(),
            modified = %modified_at.format("%B %d %Y %H:%M:%S"),
            age_secs = age.as_secs(),
            "Lock marker present"
        );

        Ok(Some((id, age)))
    }

    async fn reclaim(&self, age: Duration) -> Result<LockState> {
        let claim = self.claim_path();

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&claim)
            .await
        {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                self.clear_abandoned_claim(&claim).await?;
                debug!(claim = %claim.display(), "Stale lock is being reclaimed by another run");
                return Ok(LockState::Active { age });
            }
            Err(e) => {
                return Err(Error::lock(format!(
                    "Failed to create reclaim marker {}: {}",
                    claim.display(),
                    e
                )));
            }
        }

        let state = self.reclaim_claimed().await;

        if let Err(e) = fs::remove_file(&claim).await
            && e.kind() != ErrorKind::NotFound
        {
            warn!(claim = %claim.display(), "Failed to remove reclaim marker: {}", e);
        }

        state
    }

    /// Reclaim while holding the reclaim marker
    async fn reclaim_claimed(&self) -> Result<LockState> {
        // The marker may have changed since it was first judged stale
        let Some((id, age)) = self.inspect(&self.path).await? else {
            return Ok(LockState::Free);
        };
        if age <= self.stale_after {
            return Ok(LockState::Active { age });
        }

        warn!(
            marker = %self.path.display(),
            age_secs = age.as_secs(),
            "{}{}",
            LOG_PREFIX,
            LOCK_TIMEOUT_MESSAGE
        );

        match self.remove_if(&self.path, id).await? {
            Removal::Removed | Removal::Missing => Ok(LockState::Reclaimed { age }),
            Removal::Replaced => Ok(LockState::Active {
                age: Duration::ZERO,
            }),
        }
    }

    /// Remove a reclaim marker left behind by a run that died mid-reclaim
    async fn clear_abandoned_claim(&self, claim: &Path) -> Result<()> {
        let Some((id, age)) = self.inspect(claim).await? else {
            return Ok(());
        };
        if age > self.stale_after {
            warn!(claim = %claim.display(), "Removing abandoned reclaim marker");
            self.remove_if(claim, id).await?;
        }
        Ok(())
    }

    /// Remove the file at `path` only if it is still `expected`
    async fn remove_if(&self, path: &Path, expected: MarkerId) -> Result<Removal> {
        let aside = aside_path(path);

        match fs::rename(path, &aside).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Removal::Missing),
            Err(e) => {
                return Err(Error::lock(format!(
                    "Failed to move aside lock marker {}: {}",
                    path.display(),
                    e
                )));
            }
        }

        let taken = fs::metadata(&aside)
            .await
            .and_then(|meta| MarkerId::of(&meta));

        if matches!(taken, Ok(id) if id == expected) {
            fs::remove_file(&aside).await.map_err(|e| {
                Error::lock(format!(
                    "Failed to remove lock marker {}: {}",
                    aside.display(),
                    e
                ))
            })?;
            return Ok(Removal::Removed);
        }

        // Not the expected marker: put it back unless a newer one took its place
        match fs::hard_link(&aside, path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(_) => {
                fs::rename(&aside, path).await.map_err(|e| {
                    Error::lock(format!(
                        "Failed to restore lock marker {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                return Ok(Removal::Replaced);
            }
        }

        if let Err(e) = fs::remove_file(&aside).await
            && e.kind() != ErrorKind::NotFound
        {
            warn!(marker = %aside.display(), "Failed to remove moved-aside marker: {}", e);
        }
        Ok(Removal::Replaced)
    }

    fn claim_path(&self) -> PathBuf {
        sibling(&self.path, ".reclaim")
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

/// Private name a marker is moved to before it is checked and unlinked
fn aside_path(path: &Path) -> PathBuf {
    let seq = ASIDE_SEQ.fetch_add(1, Ordering::Relaxed);
    sibling(path, &format!(".{}.{}.gone", std::process::id(), seq))
}
