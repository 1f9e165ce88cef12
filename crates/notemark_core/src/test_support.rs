//! Fixtures and storage/database doubles shared by unit tests.

use crate::db::{Database, TreeCacheStore, UserRegistry};
use crate::error::AppError;
use crate::models::{NodeEntry, NodeSlug, User, Username};
use crate::storage::{DiscoveredNodes, DiskStorage, NodeReader, NodeStorage};
use crate::tree::cache::TreeCacheEntry;
use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tempfile::TempDir;

/// Creates an isolated temporary database and returns it with the temp dir.
///
/// Keep the [`TempDir`] alive for the full test to preserve the backing files.
pub(crate) fn setup_temp_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("db");
    let db = Database::new(db_path.to_str().expect("db path")).expect("open db");
    (db, temp_dir)
}

pub(crate) fn setup_temp_storage() -> (DiskStorage, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let storage = DiskStorage::new(temp_dir.path().join("data")).expect("storage");
    (storage, temp_dir)
}

/// Write a file below `root`, creating parents.
pub(crate) fn seed_file(root: &Path, relative: &str, content: &[u8]) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("seed parent");
    }
    std::fs::write(path, content).expect("seed file");
}

fn injected(operation: &str) -> AppError {
    AppError::Storage(io::Error::other(format!("injected {} failure", operation)))
}

/// Wraps a real backend, counting discovery calls and optionally failing writes.
pub(crate) struct ProbeStorage<S> {
    inner: S,
    discover_user_calls: AtomicUsize,
    discover_node_calls: AtomicUsize,
    fail_writes: AtomicBool,
}

impl<S> ProbeStorage<S> {
    pub(crate) fn new(inner: S) -> Self {
        Self {
            inner,
            discover_user_calls: AtomicUsize::new(0),
            discover_node_calls: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub(crate) fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn discover_user_calls(&self) -> usize {
        self.discover_user_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn discover_node_calls(&self) -> usize {
        self.discover_node_calls.load(Ordering::SeqCst)
    }

    fn check_write(&self, operation: &str) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected(operation));
        }
        Ok(())
    }
}

impl<S: NodeStorage> NodeStorage for ProbeStorage<S> {
    fn write_note_node(
        &self,
        username: &Username,
        slug: &NodeSlug,
        content: &mut dyn Read,
    ) -> Result<(), AppError> {
        self.check_write("write")?;
        self.inner.write_note_node(username, slug, content)
    }

    fn read_note_node(
        &self,
        username: &Username,
        slug: &NodeSlug,
    ) -> Result<NodeReader, AppError> {
        self.inner.read_note_node(username, slug)
    }

    fn rename_note_node(
        &self,
        username: &Username,
        slug: &NodeSlug,
        new_slug: &NodeSlug,
    ) -> Result<(), AppError> {
        self.check_write("rename")?;
        self.inner.rename_note_node(username, slug, new_slug)
    }

    fn delete_note_node(&self, username: &Username, slug: &NodeSlug) -> Result<(), AppError> {
        self.check_write("delete")?;
        self.inner.delete_note_node(username, slug)
    }

    fn write_asset_node(
        &self,
        username: &Username,
        slug: &NodeSlug,
        content: &mut dyn Read,
    ) -> Result<(), AppError> {
        self.check_write("write")?;
        self.inner.write_asset_node(username, slug, content)
    }

    fn read_asset_node(
        &self,
        username: &Username,
        slug: &NodeSlug,
    ) -> Result<NodeReader, AppError> {
        self.inner.read_asset_node(username, slug)
    }

    fn rename_asset_node(
        &self,
        username: &Username,
        slug: &NodeSlug,
        new_slug: &NodeSlug,
    ) -> Result<(), AppError> {
        self.check_write("rename")?;
        self.inner.rename_asset_node(username, slug, new_slug)
    }

    fn delete_asset_node(&self, username: &Username, slug: &NodeSlug) -> Result<(), AppError> {
        self.check_write("delete")?;
        self.inner.delete_asset_node(username, slug)
    }

    fn discover_users(&self) -> Result<Vec<Username>, AppError> {
        self.discover_user_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.discover_users()
    }

    fn discover_nodes_for_user(
        &self,
        username: &Username,
    ) -> Result<DiscoveredNodes<'_>, AppError> {
        self.discover_node_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.discover_nodes_for_user(username)
    }

    fn delete_user(&self, username: &Username) -> Result<(), AppError> {
        self.check_write("delete")?;
        self.inner.delete_user(username)
    }
}

/// Read-only backend that replays a fixed discovery sequence.
///
/// Notes without seeded content read as blank.
pub(crate) struct CannedStorage {
    users: Vec<Username>,
    entries: Vec<NodeEntry>,
    notes: HashMap<String, Vec<u8>>,
}

impl CannedStorage {
    pub(crate) fn new(users: Vec<Username>, entries: Vec<NodeEntry>) -> Self {
        Self {
            users,
            entries,
            notes: HashMap::new(),
        }
    }

    pub(crate) fn with_note(mut self, slug: &str, content: &[u8]) -> Self {
        self.notes.insert(slug.to_string(), content.to_vec());
        self
    }

    fn read_only() -> AppError {
        AppError::StorageMessage("canned storage is read-only".to_string())
    }
}

impl NodeStorage for CannedStorage {
    fn write_note_node(&self, _: &Username, _: &NodeSlug, _: &mut dyn Read) -> Result<(), AppError> {
        Err(Self::read_only())
    }

    fn read_note_node(&self, _: &Username, slug: &NodeSlug) -> Result<NodeReader, AppError> {
        let content = self.notes.get(slug.as_str()).cloned().unwrap_or_default();
        Ok(Box::new(Cursor::new(content)))
    }

    fn rename_note_node(&self, _: &Username, _: &NodeSlug, _: &NodeSlug) -> Result<(), AppError> {
        Err(Self::read_only())
    }

    fn delete_note_node(&self, _: &Username, _: &NodeSlug) -> Result<(), AppError> {
        Err(Self::read_only())
    }

    fn write_asset_node(&self, _: &Username, _: &NodeSlug, _: &mut dyn Read) -> Result<(), AppError> {
        Err(Self::read_only())
    }

    fn read_asset_node(&self, _: &Username, _: &NodeSlug) -> Result<NodeReader, AppError> {
        Err(AppError::NotFound)
    }

    fn rename_asset_node(&self, _: &Username, _: &NodeSlug, _: &NodeSlug) -> Result<(), AppError> {
        Err(Self::read_only())
    }

    fn delete_asset_node(&self, _: &Username, _: &NodeSlug) -> Result<(), AppError> {
        Err(Self::read_only())
    }

    fn discover_users(&self) -> Result<Vec<Username>, AppError> {
        Ok(self.users.clone())
    }

    fn discover_nodes_for_user(&self, _: &Username) -> Result<DiscoveredNodes<'_>, AppError> {
        Ok(Box::new(self.entries.iter().cloned().map(Ok)))
    }

    fn delete_user(&self, _: &Username) -> Result<(), AppError> {
        Err(Self::read_only())
    }
}

/// Real database whose snapshot writes can be made to fail.
pub(crate) struct FlakyDb {
    inner: Database,
    fail_cache_writes: AtomicBool,
}

impl FlakyDb {
    pub(crate) fn new(inner: Database) -> Self {
        Self {
            inner,
            fail_cache_writes: AtomicBool::new(false),
        }
    }

    pub(crate) fn set_fail_cache_writes(&self, fail: bool) {
        self.fail_cache_writes.store(fail, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<(), AppError> {
        if self.fail_cache_writes.load(Ordering::SeqCst) {
            return Err(AppError::StorageMessage(
                "injected tree cache failure".to_string(),
            ));
        }
        Ok(())
    }
}

impl TreeCacheStore for FlakyDb {
    fn get_tree_cache_entry(
        &self,
        username: &Username,
    ) -> Result<Option<TreeCacheEntry>, AppError> {
        self.inner.get_tree_cache_entry(username)
    }

    fn insert_tree_cache(
        &self,
        username: &Username,
        entry: &TreeCacheEntry,
    ) -> Result<(), AppError> {
        self.check_write()?;
        self.inner.insert_tree_cache(username, entry)
    }

    fn update_tree_cache(
        &self,
        username: &Username,
        entry: &TreeCacheEntry,
    ) -> Result<(), AppError> {
        self.check_write()?;
        self.inner.update_tree_cache(username, entry)
    }

    fn delete_tree_cache_entry(&self, username: &Username) -> Result<(), AppError> {
        self.inner.delete_tree_cache_entry(username)
    }

    fn delete_tree_cache_entries(&self) -> Result<(), AppError> {
        self.inner.delete_tree_cache_entries()
    }
}

impl UserRegistry for FlakyDb {
    fn insert_user(&self, user: &User) -> Result<(), AppError> {
        self.inner.insert_user(user)
    }

    fn get_user(&self, username: &Username) -> Result<Option<User>, AppError> {
        self.inner.get_user(username)
    }
}
