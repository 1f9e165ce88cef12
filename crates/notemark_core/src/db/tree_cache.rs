//! Tree snapshot rows backed by redb.

use super::tables::TREE_CACHE;
use crate::error::AppError;
use crate::models::Username;
use crate::tree::cache::TreeCacheEntry;
use redb::{ReadableDatabase, ReadableTable};
use std::sync::Arc;

/// Accessor for the `tree_cache` table.
pub struct TreeCacheDb {
    db: Arc<redb::Database>,
}

impl TreeCacheDb {
    /// Create the `tree_cache` table if it does not exist yet.
    ///
    /// # Errors
    /// Returns an error when redb transaction/table initialization fails.
    pub fn new(db: Arc<redb::Database>) -> Result<Self, AppError> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(TREE_CACHE)?;
        write_txn.commit()?;
        Ok(Self { db })
    }

    /// Fetch the stored snapshot for a user.
    ///
    /// # Returns
    /// `Ok(None)` when no snapshot has been stored.
    ///
    /// # Errors
    /// Returns an error when storage access or row decoding fails.
    pub fn get(&self, username: &Username) -> Result<Option<TreeCacheEntry>, AppError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TREE_CACHE)?;
        match table.get(username.as_str())? {
            Some(value) => Ok(Some(bincode::deserialize(value.value())?)),
            None => Ok(None),
        }
    }

    /// Insert a snapshot for a user that has none.
    ///
    /// # Errors
    /// Returns [`AppError::Conflict`] when a row already exists.
    pub fn insert(&self, username: &Username, entry: &TreeCacheEntry) -> Result<(), AppError> {
        let encoded = bincode::serialize(entry)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TREE_CACHE)?;
            if table.get(username.as_str())?.is_some() {
                return Err(AppError::Conflict);
            }
            table.insert(username.as_str(), encoded.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Replace an existing snapshot.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] when no row exists for the user.
    pub fn update(&self, username: &Username, entry: &TreeCacheEntry) -> Result<(), AppError> {
        let encoded = bincode::serialize(entry)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TREE_CACHE)?;
            if table.get(username.as_str())?.is_none() {
                return Err(AppError::NotFound);
            }
            table.insert(username.as_str(), encoded.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Delete one user's snapshot.
    ///
    /// # Returns
    /// `true` if a row was removed.
    pub fn delete(&self, username: &Username) -> Result<bool, AppError> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(TREE_CACHE)?;
            let removed = table.remove(username.as_str())?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(removed)
    }

    /// Drop every stored snapshot.
    pub fn delete_all(&self) -> Result<(), AppError> {
        let write_txn = self.db.begin_write()?;
        write_txn.delete_table(TREE_CACHE)?;
        write_txn.open_table(TREE_CACHE)?;
        write_txn.commit()?;
        Ok(())
    }
}
