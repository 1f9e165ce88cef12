//! Core domain library for notemark (node trees, storage, tree cache).

/// Configuration loading and defaults.
pub mod config;
/// Shared constants.
pub mod constants;
/// Tree cache and user registry persistence.
pub mod db;
/// Application error types (storage/domain).
pub mod error;
/// Node tree and user data models.
pub mod models;
/// Node content storage backends.
pub mod storage;
/// Tree controller and snapshot codec.
pub mod tree;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use db::Database;
pub use error::AppError;
pub use storage::DiskStorage;
pub use tree::TreeController;
