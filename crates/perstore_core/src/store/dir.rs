//! Store directory management.
//!
//! File system layout:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK     # Advisory lock for single-process access
//! └─ STORE    # CBOR snapshot of committed state
//! ```
//!
//! The LOCK file ensures only one process opens a store at a time. The
//! STORE file is rewritten atomically (temp file + rename) on every
//! checkpoint.

use crate::error::{CoreError, CoreResult};
use crate::store::snapshot::SnapshotFile;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const STORE_FILE: &str = "STORE";
/// Temporary file for atomic snapshot writes.
const STORE_TEMP: &str = "STORE.tmp";

/// Manages the store directory structure and file locking.
///
/// Holds an exclusive advisory lock on the directory for its lifetime;
/// only one `StoreDir` instance can exist per directory at a time.
#[derive(Debug)]
pub struct StoreDir {
    /// Root directory path.
    path: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl StoreDir {
    /// Opens or creates a store directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (`StoreLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_snapshot(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_snapshot(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::StoreLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checks if this directory has no snapshot yet.
    #[must_use]
    pub fn is_new_store(&self) -> bool {
        !self.path.join(STORE_FILE).exists()
    }

    /// Loads the snapshot, if one exists.
    pub fn load_snapshot(&self) -> CoreResult<Option<SnapshotFile>> {
        let store_path = self.path.join(STORE_FILE);
        if !store_path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&store_path)?;
        let snapshot: SnapshotFile = ciborium::de::from_reader(bytes.as_slice())
            .map_err(|e| CoreError::invalid_snapshot(e.to_string()))?;
        Ok(Some(snapshot))
    }

    /// Saves a snapshot atomically via temp file + rename.
    pub fn save_snapshot(&self, snapshot: &SnapshotFile) -> CoreResult<()> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(snapshot, &mut bytes)
            .map_err(|e| CoreError::codec(e.to_string()))?;

        let temp_path = self.path.join(STORE_TEMP);
        fs::write(&temp_path, &bytes)?;
        fs::rename(&temp_path, self.path.join(STORE_FILE))?;
        Ok(())
    }
}
