//! redb table definitions shared by storage modules.

use redb::TableDefinition;

/// File name for the redb database within the configured DB directory.
pub const REDB_FILE_NAME: &str = "data.redb";

/// Persisted tree snapshots keyed by username (`TreeCacheEntry`, bincode-encoded).
pub const TREE_CACHE: TableDefinition<&str, &[u8]> = TableDefinition::new("tree_cache");
/// Registered users keyed by username (`User`, bincode-encoded).
pub const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");
