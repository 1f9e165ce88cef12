//! Versioned encoding of node trees for the persisted cache.

use crate::constants::CURRENT_TREE_CACHE_VERSION;
use crate::error::AppError;
use crate::models::NodeTree;
use serde::{Deserialize, Serialize};

/// Serialized tree snapshot plus the codec version that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeCacheEntry {
    pub cache: Vec<u8>,
    pub version: i64,
}

/// Whether a stored snapshot version can be decoded by this build.
pub fn is_tree_cache_compatible(version: i64) -> bool {
    version == CURRENT_TREE_CACHE_VERSION
}

/// Encode a tree and stamp it with the current cache version.
///
/// # Errors
/// Returns [`AppError::CacheCodec`] if JSON encoding fails.
pub fn marshal_tree_cache(tree: &NodeTree) -> Result<TreeCacheEntry, AppError> {
    let cache = serde_json::to_vec(tree).map_err(AppError::CacheCodec)?;
    Ok(TreeCacheEntry {
        cache,
        version: CURRENT_TREE_CACHE_VERSION,
    })
}

/// Decode a stored snapshot.
///
/// The version is checked before the bytes are looked at.
///
/// # Errors
/// - [`AppError::VersionIncompatible`] when the entry was written by another codec version.
/// - [`AppError::CorruptCache`] when the bytes do not decode as a tree.
pub fn unmarshal_tree_cache(entry: &TreeCacheEntry) -> Result<NodeTree, AppError> {
    if !is_tree_cache_compatible(entry.version) {
        return Err(AppError::VersionIncompatible {
            found: entry.version,
            expected: CURRENT_TREE_CACHE_VERSION,
        });
    }
    serde_json::from_slice(&entry.cache).map_err(AppError::CorruptCache)
}
