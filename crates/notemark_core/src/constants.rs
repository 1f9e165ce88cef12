//! Shared constants used across notemark crates.

/// Version stamped on every persisted tree snapshot.
///
/// Bump whenever the serialized shape of [`crate::models::Node`] changes.
pub const CURRENT_TREE_CACHE_VERSION: i64 = 1;

/// File extension appended to a note slug on disk.
pub const NOTE_FILE_EXTENSION: &str = "md";

/// Fence line delimiting a YAML front matter block.
pub const FRONT_MATTER_FENCE: &str = "---";

/// Owner lock file held for the process lifetime inside the DB directory.
pub const DB_OWNER_LOCK_FILE_NAME: &str = "notemark.owner.lock";

/// Application directory name used for default data locations.
pub const APP_DIR_NAME: &str = "notemark";
