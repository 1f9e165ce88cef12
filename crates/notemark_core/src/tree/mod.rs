//! In-memory authority over every user's node tree.
//!
//! The controller keeps three stores in step: node content in a
//! [`NodeStorage`] backend, the tree shape in memory, and a versioned snapshot
//! per user in a [`TreeCacheStore`]. Every mutation holds the writer lock for
//! its full duration, storage and cache I/O included. Reads take the reader
//! lock.

/// Versioned snapshot codec.
pub mod cache;

use self::cache::{marshal_tree_cache, unmarshal_tree_cache};
use crate::db::{TreeCacheStore, UserRegistry};
use crate::error::AppError;
use crate::models::{FrontMatter, NodeEntry, NodeSlug, NodeTree, NodeType, User, Username};
use crate::storage::front_matter::{render_with_front_matter, split_front_matter};
use crate::storage::{NodeReader, NodeStorage};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::io::Read;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type UserTrees = HashMap<Username, NodeTree>;

fn ensure_well_formed(slug: &NodeSlug) -> Result<(), AppError> {
    if !slug.is_well_formed() {
        return Err(AppError::BadRequest(format!("Malformed slug '{}'", slug)));
    }
    Ok(())
}

fn ensure_node_type(slug: &NodeSlug, expected: NodeType) -> Result<(), AppError> {
    ensure_well_formed(slug)?;
    if slug.node_type() != expected {
        return Err(AppError::BadRequest(format!(
            "Slug '{}' does not name a {} node",
            slug, expected
        )));
    }
    Ok(())
}

fn is_descendant(slug: &NodeSlug, ancestor: &NodeSlug) -> bool {
    slug.as_str()
        .strip_prefix(ancestor.as_str())
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}

/// Owns the node tree of every user.
///
/// Construct once per process and share it (e.g. behind an `Arc`). Call
/// [`TreeController::load`] before serving anything else.
pub struct TreeController<S, D> {
    storage: S,
    db: D,
    trees: RwLock<UserTrees>,
}

impl<S, D> TreeController<S, D>
where
    S: NodeStorage,
    D: TreeCacheStore + UserRegistry,
{
    pub fn new(storage: S, db: D) -> Self {
        Self {
            storage,
            db,
            trees: RwLock::new(HashMap::new()),
        }
    }

    fn read_trees(&self) -> Result<RwLockReadGuard<'_, UserTrees>, AppError> {
        self.trees
            .read()
            .map_err(|_| AppError::Locked("Tree lock poisoned".to_string()))
    }

    fn write_trees(&self) -> Result<RwLockWriteGuard<'_, UserTrees>, AppError> {
        self.trees
            .write()
            .map_err(|_| AppError::Locked("Tree lock poisoned".to_string()))
    }

    /// Load the tree of every user found in storage.
    ///
    /// Each user is registered, then restored from its cached snapshot when a
    /// compatible one exists, otherwise ingested from storage and cached.
    ///
    /// # Errors
    /// - [`AppError::NotFreshState`] when trees are already loaded.
    /// - Any storage, registry or cache error for any user. The controller is
    ///   left empty so a corrected load can be retried.
    pub fn load(&self) -> Result<(), AppError> {
        let mut trees = self.write_trees()?;
        if !trees.is_empty() {
            return Err(AppError::NotFreshState);
        }
        let result = self
            .storage
            .discover_users()
            .and_then(|users| {
                users
                    .iter()
                    .try_for_each(|username| self.load_user(&mut trees, username))
            });
        if let Err(err) = result {
            trees.clear();
            return Err(err);
        }
        tracing::info!("Loaded node trees for {} user(s)", trees.len());
        Ok(())
    }

    fn load_user(&self, trees: &mut UserTrees, username: &Username) -> Result<(), AppError> {
        match self.db.insert_user(&User::new(username.clone())) {
            Ok(()) => tracing::info!("Registered user '{}'", username),
            Err(AppError::Conflict) => {}
            Err(err) => return Err(err),
        }

        let tree = trees.entry(username.clone()).or_default();
        if let Some(cached) = self.load_cached_tree(username)? {
            tracing::info!("Found cached tree for user '{}'", username);
            *tree = cached;
            return Ok(());
        }

        self.ingest_from_storage(username, tree)?;
        self.update_cache_from_memory(username, tree)
    }

    /// `Ok(None)` when there is no usable snapshot.
    fn load_cached_tree(&self, username: &Username) -> Result<Option<NodeTree>, AppError> {
        let Some(entry) = self.db.get_tree_cache_entry(username)? else {
            return Ok(None);
        };
        match unmarshal_tree_cache(&entry) {
            Ok(tree) => Ok(Some(tree)),
            Err(err) if err.is_cache_miss() => {
                tracing::warn!("Ignoring cached tree for user '{}': {}", username, err);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Rebuild `tree` from the storage backend's discovery walk.
    fn ingest_from_storage(&self, username: &Username, tree: &mut NodeTree) -> Result<(), AppError> {
        let mut ingested = 0usize;
        for entry in self.storage.discover_nodes_for_user(username)? {
            let entry = entry?;
            tracing::debug!("ingest: {}/{}", username, entry.full_slug);
            let front_matter = match entry.node_type {
                NodeType::Note => self
                    .storage
                    .read_note_node_front_matter(username, &entry.full_slug)?,
                NodeType::Asset => FrontMatter::default(),
            };
            tree.insert_entry(&entry, front_matter);
            ingested += 1;
        }
        tracing::info!("Ingested {} node(s) for user '{}'", ingested, username);
        Ok(())
    }

    /// Insert or update the cached snapshot for one user.
    fn update_cache_from_memory(&self, username: &Username, tree: &NodeTree) -> Result<(), AppError> {
        tracing::debug!("Saving tree to cache for user '{}'", username);
        let entry = marshal_tree_cache(tree)?;
        match self.db.insert_tree_cache(username, &entry) {
            Ok(()) => Ok(()),
            Err(AppError::Conflict) => self.db.update_tree_cache(username, &entry),
            Err(err) => Err(err),
        }
    }

    /// Persist the snapshot after storage and memory were already changed.
    fn persist_after_mutation(&self, trees: &UserTrees, username: &Username) -> Result<(), AppError> {
        let Some(tree) = trees.get(username) else {
            return Ok(());
        };
        self.update_cache_from_memory(username, tree).map_err(|err| {
            tracing::error!(
                "Cached tree for user '{}' is stale after a storage change: {}",
                username,
                err
            );
            err
        })
    }

    fn write_note_locked(
        &self,
        trees: &mut UserTrees,
        username: &Username,
        slug: &NodeSlug,
        content: &mut dyn Read,
    ) -> Result<(), AppError> {
        // a header that cannot be parsed must never reach storage
        let mut buffer = Vec::new();
        content.read_to_end(&mut buffer)?;
        split_front_matter(&buffer)?;

        self.storage
            .write_note_node(username, slug, &mut buffer.as_slice())?;
        let front_matter = self.storage.read_note_node_front_matter(username, slug)?;
        let entry = NodeEntry::new(slug.clone(), NodeType::Note, Utc::now());
        trees
            .entry(username.clone())
            .or_default()
            .insert_entry(&entry, front_matter);
        self.persist_after_mutation(trees, username)
    }

    /// Write a new or replace an existing note.
    ///
    /// # Errors
    /// Returns [`AppError::BadRequest`] for malformed or asset-shaped slugs and
    /// [`AppError::FrontMatter`] when the header is not valid YAML; nothing is
    /// written in either case. A storage failure leaves memory and cache
    /// untouched; a cache failure is returned after storage and memory were
    /// updated.
    pub fn write_note_node(
        &self,
        username: &Username,
        slug: &NodeSlug,
        content: &mut dyn Read,
    ) -> Result<(), AppError> {
        ensure_node_type(slug, NodeType::Note)?;
        let mut trees = self.write_trees()?;
        self.write_note_locked(&mut trees, username, slug, content)
    }

    /// Write a new or replace an existing asset.
    ///
    /// # Errors
    /// Same contract as [`TreeController::write_note_node`], for asset-shaped slugs.
    pub fn write_asset_node(
        &self,
        username: &Username,
        slug: &NodeSlug,
        content: &mut dyn Read,
    ) -> Result<(), AppError> {
        ensure_node_type(slug, NodeType::Asset)?;
        let mut trees = self.write_trees()?;
        self.storage.write_asset_node(username, slug, content)?;
        let entry = NodeEntry::new(slug.clone(), NodeType::Asset, Utc::now());
        trees
            .entry(username.clone())
            .or_default()
            .insert_entry(&entry, FrontMatter::default());
        self.persist_after_mutation(&trees, username)
    }

    /// Write content to the note or asset named by `slug`.
    pub fn update_node_content(
        &self,
        username: &Username,
        slug: &NodeSlug,
        content: &mut dyn Read,
    ) -> Result<(), AppError> {
        match slug.node_type() {
            NodeType::Note => self.write_note_node(username, slug, content),
            NodeType::Asset => self.write_asset_node(username, slug, content),
        }
    }

    /// Replace a note's front matter, keeping its body.
    ///
    /// The note is rewritten in full through the note write path.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] for missing notes and
    /// [`AppError::FrontMatter`] when the existing header cannot be parsed.
    pub fn update_note_node_front_matter(
        &self,
        username: &Username,
        slug: &NodeSlug,
        front_matter: &FrontMatter,
    ) -> Result<(), AppError> {
        ensure_node_type(slug, NodeType::Note)?;
        let mut trees = self.write_trees()?;
        let mut current = Vec::new();
        self.storage
            .read_note_node(username, slug)?
            .read_to_end(&mut current)?;
        let (_, body) = split_front_matter(&current)?;
        let rendered = render_with_front_matter(front_matter, body)?;
        self.write_note_locked(&mut trees, username, slug, &mut rendered.as_slice())
    }

    /// Move a node and its subtree to `new_slug`.
    ///
    /// # Errors
    /// - [`AppError::BadRequest`] for malformed slugs, when the node kind
    ///   would change, or when a node would move beneath itself.
    /// - [`AppError::Conflict`] when `new_slug` already exists.
    /// - [`AppError::NotFound`] when storage has nothing at `slug`.
    pub fn rename_node(
        &self,
        username: &Username,
        slug: &NodeSlug,
        new_slug: &NodeSlug,
    ) -> Result<(), AppError> {
        ensure_well_formed(slug)?;
        let node_type = slug.node_type();
        ensure_node_type(new_slug, node_type)?;
        if slug == new_slug {
            return Ok(());
        }
        if is_descendant(new_slug, slug) {
            return Err(AppError::BadRequest(format!(
                "Cannot move '{}' beneath itself",
                slug
            )));
        }

        let mut trees = self.write_trees()?;
        if trees
            .get(username)
            .and_then(|tree| tree.get(new_slug))
            .is_some()
        {
            return Err(AppError::Conflict);
        }

        match node_type {
            NodeType::Note => self.storage.rename_note_node(username, slug, new_slug)?,
            NodeType::Asset => self.storage.rename_asset_node(username, slug, new_slug)?,
        }

        let now = Utc::now();
        let tree = trees.entry(username.clone()).or_default();
        match tree.remove(slug) {
            Some(mut node) => {
                node.mod_time = now;
                tree.graft(new_slug, node);
            }
            None => {
                // storage knew the node even though memory did not
                let front_matter = match node_type {
                    NodeType::Note => self.storage.read_note_node_front_matter(username, new_slug)?,
                    NodeType::Asset => FrontMatter::default(),
                };
                tree.insert_entry(&NodeEntry::new(new_slug.clone(), node_type, now), front_matter);
            }
        }
        self.persist_after_mutation(&trees, username)
    }

    /// Delete a node and its subtree.
    ///
    /// # Errors
    /// Returns [`AppError::BadRequest`] for malformed slugs and
    /// [`AppError::NotFound`] when storage has nothing at `slug`.
    pub fn delete_node(&self, username: &Username, slug: &NodeSlug) -> Result<(), AppError> {
        ensure_well_formed(slug)?;
        let mut trees = self.write_trees()?;
        match slug.node_type() {
            NodeType::Note => self.storage.delete_note_node(username, slug)?,
            NodeType::Asset => self.storage.delete_asset_node(username, slug)?,
        }
        if let Some(tree) = trees.get_mut(username) {
            tree.remove(slug);
        }
        self.persist_after_mutation(&trees, username)
    }

    /// Stream a note's content from storage.
    pub fn get_note_node_content(
        &self,
        username: &Username,
        slug: &NodeSlug,
    ) -> Result<NodeReader, AppError> {
        ensure_well_formed(slug)?;
        let _trees = self.read_trees()?;
        self.storage.read_note_node(username, slug)
    }

    /// Stream an asset's content from storage.
    pub fn get_asset_node_content(
        &self,
        username: &Username,
        slug: &NodeSlug,
    ) -> Result<NodeReader, AppError> {
        ensure_well_formed(slug)?;
        let _trees = self.read_trees()?;
        self.storage.read_asset_node(username, slug)
    }

    /// Stream the content of the note or asset named by `slug`.
    pub fn get_node_content(
        &self,
        username: &Username,
        slug: &NodeSlug,
    ) -> Result<NodeReader, AppError> {
        ensure_well_formed(slug)?;
        match slug.node_type() {
            NodeType::Note => self.get_note_node_content(username, slug),
            NodeType::Asset => self.get_asset_node_content(username, slug),
        }
    }

    /// Snapshot of one user's tree, `None` when the user is unknown.
    pub fn try_get_node_tree_for_user(
        &self,
        username: &Username,
    ) -> Result<Option<NodeTree>, AppError> {
        Ok(self.read_trees()?.get(username).cloned())
    }

    /// One user's tree together with its newest modification time.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] when the user is unknown.
    pub fn get_tree_for_user(
        &self,
        username: &Username,
    ) -> Result<(NodeTree, DateTime<Utc>), AppError> {
        let trees = self.read_trees()?;
        let tree = trees.get(username).ok_or(AppError::NotFound)?;
        let mod_time = tree.latest_mod_time().unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Ok((tree.clone(), mod_time))
    }

    /// Newest modification time in a user's tree (epoch for an empty tree).
    pub fn get_tree_mod_time_for_user(
        &self,
        username: &Username,
    ) -> Result<DateTime<Utc>, AppError> {
        let trees = self.read_trees()?;
        let tree = trees.get(username).ok_or(AppError::NotFound)?;
        Ok(tree.latest_mod_time().unwrap_or(DateTime::<Utc>::UNIX_EPOCH))
    }

    /// Last observed modification time of one node.
    pub fn get_node_mod_time(
        &self,
        username: &Username,
        slug: &NodeSlug,
    ) -> Result<DateTime<Utc>, AppError> {
        let trees = self.read_trees()?;
        trees
            .get(username)
            .and_then(|tree| tree.get(slug))
            .map(|node| node.mod_time)
            .ok_or(AppError::NotFound)
    }

    /// Users currently held in memory, sorted.
    pub fn usernames(&self) -> Result<Vec<Username>, AppError> {
        let mut users: Vec<Username> = self.read_trees()?.keys().cloned().collect();
        users.sort();
        Ok(users)
    }

    /// Drop every in-memory tree and every cached snapshot.
    ///
    /// Use after content changed on disk behind the controller's back; call
    /// [`TreeController::load`] afterwards to rebuild.
    pub fn reset(&self) -> Result<(), AppError> {
        let mut trees = self.write_trees()?;
        self.db.delete_tree_cache_entries()?;
        trees.clear();
        tracing::info!("Reset node trees and tree cache");
        Ok(())
    }

    /// Evict one user's tree and cached snapshot.
    pub fn forget_user(&self, username: &Username) -> Result<(), AppError> {
        let mut trees = self.write_trees()?;
        self.db.delete_tree_cache_entry(username)?;
        trees.remove(username);
        tracing::info!("Evicted node tree for user '{}'", username);
        Ok(())
    }

    /// Pretty JSON dump of every tree, for debugging.
    pub fn debug_json(&self) -> Result<String, AppError> {
        let trees = self.read_trees()?;
        serde_json::to_string_pretty(&*trees).map_err(AppError::CacheCodec)
    }
}
