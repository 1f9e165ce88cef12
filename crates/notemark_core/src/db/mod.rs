//! Database layer: persisted tree snapshots and the user registry.

/// Data directory owner lock.
pub mod lock;
/// redb table definitions.
pub mod tables;
/// Tree snapshot storage.
pub mod tree_cache;
/// User registry storage.
pub mod user;

use crate::error::AppError;
use crate::models::{User, Username};
use crate::tree::cache::TreeCacheEntry;
use std::path::Path;
use std::sync::Arc;

/// Keyed store of per-user tree snapshots.
pub trait TreeCacheStore: Send + Sync {
    fn get_tree_cache_entry(&self, username: &Username)
        -> Result<Option<TreeCacheEntry>, AppError>;

    /// # Errors
    /// Returns [`AppError::Conflict`] when the user already has a snapshot.
    fn insert_tree_cache(&self, username: &Username, entry: &TreeCacheEntry)
        -> Result<(), AppError>;

    /// # Errors
    /// Returns [`AppError::NotFound`] when the user has no snapshot.
    fn update_tree_cache(&self, username: &Username, entry: &TreeCacheEntry)
        -> Result<(), AppError>;

    fn delete_tree_cache_entry(&self, username: &Username) -> Result<(), AppError>;

    fn delete_tree_cache_entries(&self) -> Result<(), AppError>;
}

/// Identity records that other tables reference by username.
pub trait UserRegistry: Send + Sync {
    /// # Errors
    /// Returns [`AppError::Conflict`] when the username is already registered.
    fn insert_user(&self, user: &User) -> Result<(), AppError>;

    fn get_user(&self, username: &Username) -> Result<Option<User>, AppError>;
}

/// Database handle with access to the underlying redb tables.
pub struct Database {
    pub db: Arc<redb::Database>,
    pub tree_cache: tree_cache::TreeCacheDb,
    pub users: user::UserDb,
}

impl Database {
    /// Build a database handle from an existing shared redb instance.
    ///
    /// # Errors
    /// Returns an error if the required tables cannot be opened.
    pub fn from_shared(db: Arc<redb::Database>) -> Result<Self, AppError> {
        Ok(Self {
            tree_cache: tree_cache::TreeCacheDb::new(db.clone())?,
            users: user::UserDb::new(db.clone())?,
            db,
        })
    }

    /// Clone this handle for another subsystem in the same process.
    ///
    /// # Errors
    /// Returns an error if table initialization fails.
    pub fn share(&self) -> Result<Self, AppError> {
        Self::from_shared(self.db.clone())
    }

    /// Open the database directory and initialize tables.
    ///
    /// # Arguments
    /// - `path`: Directory holding the redb file.
    ///
    /// # Errors
    /// Returns [`AppError::StorageMessage`] when `path` is not a directory,
    /// [`AppError::Locked`] when the file is open elsewhere, or a database
    /// error when redb cannot open it.
    pub fn new(path: &str) -> Result<Self, AppError> {
        let dir = Path::new(path);
        if dir.exists() && !dir.is_dir() {
            return Err(AppError::StorageMessage(format!(
                "DB_PATH '{}' exists but is not a directory",
                path
            )));
        }
        std::fs::create_dir_all(dir).map_err(|err| {
            AppError::StorageMessage(format!(
                "Failed to create database directory '{}': {}",
                path, err
            ))
        })?;

        let file = dir.join(tables::REDB_FILE_NAME);
        let db = match redb::Database::create(&file) {
            Ok(db) => Arc::new(db),
            Err(redb::DatabaseError::DatabaseAlreadyOpen) => {
                return Err(AppError::Locked(format!(
                    "Database '{}' is already open in another process",
                    file.display()
                )));
            }
            Err(err) => return Err(err.into()),
        };
        Self::from_shared(db)
    }
}

impl TreeCacheStore for Database {
    fn get_tree_cache_entry(
        &self,
        username: &Username,
    ) -> Result<Option<TreeCacheEntry>, AppError> {
        self.tree_cache.get(username)
    }

    fn insert_tree_cache(
        &self,
        username: &Username,
        entry: &TreeCacheEntry,
    ) -> Result<(), AppError> {
        self.tree_cache.insert(username, entry)
    }

    fn update_tree_cache(
        &self,
        username: &Username,
        entry: &TreeCacheEntry,
    ) -> Result<(), AppError> {
        self.tree_cache.update(username, entry)
    }

    fn delete_tree_cache_entry(&self, username: &Username) -> Result<(), AppError> {
        self.tree_cache.delete(username)?;
        Ok(())
    }

    fn delete_tree_cache_entries(&self) -> Result<(), AppError> {
        self.tree_cache.delete_all()
    }
}

impl UserRegistry for Database {
    fn insert_user(&self, user: &User) -> Result<(), AppError> {
        self.users.create(user)
    }

    fn get_user(&self, username: &Username) -> Result<Option<User>, AppError> {
        self.users.get(username)
    }
}
