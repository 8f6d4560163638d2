// # File State Store
//
// File-based implementation of StateStore.
//
// ## File Format
//
// The file holds exactly one normalized address and nothing else: no
// trailing newline, no version header. It is overwritten in full on every
// update and never deleted by the tool.
//
// ## Crash Safety
//
// New contents are written to a sibling `.tmp` file, flushed and synced,
// then renamed over the state file. A failure at any step leaves the
// previous address in place.
//
// A missing parent directory is created on write, so a directory that
// cannot be created is reported like any other write failure.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;
use crate::traits::state_store::StateStore;

/// File-based state store
///
/// # Example
///
/// ```rust,no_run
/// use ccw_core::state::FileStateStore;
/// use ccw_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/tmp/_current_wan_ipv6.txt");
///
///     store.write("2001:db8::5").await?;
///     assert_eq!(store.read().await?, Some("2001:db8::5".to_string()));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Create a file state store
    ///
    /// Nothing is touched on disk until the first write.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn ensure_parent(&self) -> Result<(), Error> {
        let Some(parent) = self.path.parent() else {
            return Ok(());
        };
        if parent.as_os_str().is_empty() {
            return Ok(());
        }

        fs::create_dir_all(parent).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to create state directory {}: {}",
                parent.display(),
                e
            ))
        })
    }

    async fn write_temp(&self, temp_path: &Path, address: &str) -> Result<(), Error> {
        let mut file = fs::File::create(temp_path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to create temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;

        file.write_all(address.as_bytes()).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to write to temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;

        file.flush().await.map_err(|e| {
            Error::state_store(format!(
                "Failed to flush temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;

        file.sync_all().await.map_err(|e| {
            Error::state_store(format!(
                "Failed to sync temp file {}: {}",
                temp_path.display(),
                e
            ))
        })
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn read(&self) -> Result<Option<String>, Error> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => {
                tracing::debug!("Read previous address from {}: {}", self.path.display(), content);
                Ok(Some(content))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("State file does not exist: {}", self.path.display());
                Ok(None)
            }
            Err(e) => Err(Error::state_store(format!(
                "Failed to read state file {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn write(&self, address: &str) -> Result<(), Error> {
        self.ensure_parent().await?;
        let temp_path = self.temp_path();

        if let Err(e) = self.write_temp(&temp_path, address).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        // Atomic rename (temp -> actual)
        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            )));
        }

        tracing::trace!("State written to file: {}", self.path.display());
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("current_wan_ipv6.txt");

        let store = FileStateStore::new(&path);

        // Initially absent
        assert_eq!(store.read().await.unwrap(), None);

        store.write("2001:db8::5").await.unwrap();
        assert_eq!(store.read().await.unwrap(), Some("2001:db8::5".to_string()));

        // Exactly the address, no delimiter
        let raw = std::fs::read(&path).unwrap();
        assert_eq!(raw, b"2001:db8::5");

        // A second instance sees the same value
        let store2 = FileStateStore::new(&path);
        assert_eq!(store2.read().await.unwrap(), Some("2001:db8::5".to_string()));
    }

    #[tokio::test]
    async fn test_file_store_overwrites_in_full() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.txt");
        let store = FileStateStore::new(&path);

        store.write("2001:db8:aaaa:bbbb:cccc:dddd:eeee:1").await.unwrap();
        store.write("2001:db8::9").await.unwrap();

        assert_eq!(store.read().await.unwrap(), Some("2001:db8::9".to_string()));
        assert!(!store.temp_path().exists(), "temp file must not linger");
    }

    #[tokio::test]
    async fn test_file_store_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("dir").join("state.txt");

        let store = FileStateStore::new(&path);
        store.write("2001:db8::1").await.unwrap();

        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.txt");
        let store = FileStateStore::new(&path);
        store.write("2001:db8::5").await.unwrap();

        // A directory in place of the temp file makes the write fail
        std::fs::create_dir(store.temp_path()).unwrap();

        let result = store.write("2001:db8::9").await;
        assert!(matches!(result, Err(Error::StateStore(_))));
        assert_eq!(store.read().await.unwrap(), Some("2001:db8::5".to_string()));
    }

    #[tokio::test]
    async fn test_read_error_is_distinct_from_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.txt");
        // Reading a directory is an I/O error, not "absent"
        std::fs::create_dir(&path).unwrap();

        let store = FileStateStore::new(&path);
        let result = store.read().await;
        assert!(matches!(result, Err(Error::StateStore(_))));
    }

    #[tokio::test]
    async fn test_uncreatable_directory_is_write_failure() {
        let dir = tempdir().unwrap();
        // A regular file where the state directory should go
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();

        let store = FileStateStore::new(blocker.join("state.txt"));
        let result = store.write("2001:db8::5").await;
        assert!(matches!(result, Err(Error::StateStore(_))));
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let store = FileStateStore {
            path: PathBuf::from("/tmp/_current_wan_ipv6.txt"),
        };
        assert_eq!(store.temp_path(), PathBuf::from("/tmp/_current_wan_ipv6.txt.tmp"));
    }
}
