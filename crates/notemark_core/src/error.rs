//! Application error types for the note tree, storage backend and cache store.
use thiserror::Error;

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] redb::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    StorageMessage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Front matter error: {0}")]
    FrontMatter(#[from] serde_yaml::Error),

    #[error("Tree cache encoding failed: {0}")]
    CacheCodec(serde_json::Error),

    #[error("Tree cache is corrupt: {0}")]
    CorruptCache(serde_json::Error),

    #[error("Tree cache version {found} is incompatible (expected {expected})")]
    VersionIncompatible { found: i64, expected: i64 },

    #[error("Tree not in fresh state")]
    NotFreshState,

    #[error("Not found")]
    NotFound,

    #[error("Conflict")]
    Conflict,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Locked: {0}")]
    Locked(String),
}

impl AppError {
    /// Whether a stored tree cache entry should be ignored and rebuilt from storage.
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Self::VersionIncompatible { .. } | Self::CorruptCache(_))
    }
}

impl From<redb::DatabaseError> for AppError {
    fn from(value: redb::DatabaseError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::TransactionError> for AppError {
    fn from(value: redb::TransactionError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::TableError> for AppError {
    fn from(value: redb::TableError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::StorageError> for AppError {
    fn from(value: redb::StorageError) -> Self {
        Self::Database(value.into())
    }
}

impl From<redb::CommitError> for AppError {
    fn from(value: redb::CommitError) -> Self {
        Self::Database(value.into())
    }
}

impl From<walkdir::Error> for AppError {
    fn from(value: walkdir::Error) -> Self {
        Self::Storage(value.into())
    }
}
