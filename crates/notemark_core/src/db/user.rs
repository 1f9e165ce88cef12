//! User registry rows backed by redb.

use super::tables::USERS;
use crate::error::AppError;
use crate::models::{User, Username};
use redb::{ReadableDatabase, ReadableTable};
use std::sync::Arc;

/// Accessor for the `users` table.
pub struct UserDb {
    db: Arc<redb::Database>,
}

impl UserDb {
    /// Create the `users` table if it does not exist yet.
    ///
    /// # Errors
    /// Returns an error when redb transaction/table initialization fails.
    pub fn new(db: Arc<redb::Database>) -> Result<Self, AppError> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(USERS)?;
        write_txn.commit()?;
        Ok(Self { db })
    }

    /// Register a user.
    ///
    /// # Errors
    /// Returns [`AppError::Conflict`] when the username is already registered.
    pub fn create(&self, user: &User) -> Result<(), AppError> {
        let encoded = bincode::serialize(user)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut users = write_txn.open_table(USERS)?;
            if users.get(user.username.as_str())?.is_some() {
                return Err(AppError::Conflict);
            }
            users.insert(user.username.as_str(), encoded.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Fetch a user by username.
    pub fn get(&self, username: &Username) -> Result<Option<User>, AppError> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS)?;
        match users.get(username.as_str())? {
            Some(value) => Ok(Some(bincode::deserialize(value.value())?)),
            None => Ok(None),
        }
    }
}
