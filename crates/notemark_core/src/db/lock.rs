//! Process-lifetime ownership of a data directory.

use crate::constants::DB_OWNER_LOCK_FILE_NAME;
use crate::error::AppError;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Keeping this value alive holds an exclusive OS lock on the owner lock file.
pub struct OwnerLockGuard {
    file: File,
    lock_path: PathBuf,
}

impl OwnerLockGuard {
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for OwnerLockGuard {
    fn drop(&mut self) {
        if let Err(err) = self.file.unlock() {
            tracing::warn!(
                "Failed to release owner lock {:?} during drop: {}",
                self.lock_path,
                err
            );
        }
    }
}

/// Return the owner lock file path for a database root.
///
/// # Returns
/// Fully-qualified owner lock path (`<db_path>/notemark.owner.lock`).
pub fn owner_lock_path(db_path: &str) -> PathBuf {
    PathBuf::from(db_path).join(DB_OWNER_LOCK_FILE_NAME)
}

/// Acquire and hold an exclusive owner lock for the process lifetime.
///
/// Only one tree controller may own a data directory at a time.
///
/// # Returns
/// [`OwnerLockGuard`] that keeps the owner lock held until dropped.
///
/// # Errors
/// Returns [`AppError::Locked`] when another process holds the lock, or
/// [`AppError::StorageMessage`] when the lock file cannot be opened.
pub fn acquire_owner_lock_for_lifetime(db_path: &str) -> Result<OwnerLockGuard, AppError> {
    let lock_path = owner_lock_path(db_path);
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            AppError::StorageMessage(format!(
                "Failed to prepare owner lock parent '{}': {}",
                parent.display(),
                err
            ))
        })?;
    }
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|err| {
            AppError::StorageMessage(format!(
                "Failed to open owner lock '{}': {}",
                lock_path.display(),
                err
            ))
        })?;

    match file.try_lock_exclusive() {
        Ok(()) => Ok(OwnerLockGuard { file, lock_path }),
        Err(err)
            if matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::PermissionDenied
            ) || err.raw_os_error() == fs2::lock_contended_error().raw_os_error() =>
        {
            Err(AppError::Locked(format!(
                "Data directory owner lock '{}' is already held by another notemark process",
                lock_path.display()
            )))
        }
        Err(err) => Err(AppError::StorageMessage(format!(
            "Failed to acquire owner lock '{}': {}",
            lock_path.display(),
            err
        ))),
    }
}
