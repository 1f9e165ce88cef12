//! Node storage backends: the byte-level home of notes and assets.

/// Filesystem-backed storage.
pub mod disk;
/// Front matter parsing and rendering.
pub mod front_matter;
/// Slug validation rules.
pub mod validation;

use crate::error::AppError;
use crate::models::{FrontMatter, NodeEntry, NodeSlug, Username};
use std::io::Read;

pub use disk::DiskStorage;

/// Lazy, one-shot stream of nodes found while walking a user's storage.
pub type DiscoveredNodes<'a> = Box<dyn Iterator<Item = Result<NodeEntry, AppError>> + 'a>;

/// Readable node content.
pub type NodeReader = Box<dyn Read + Send>;

/// Byte-level storage for notes and assets addressed by `(username, slug)`.
///
/// Write, rename and delete on a missing target return [`AppError::NotFound`].
/// Reading a note whose directory exists without a note file returns empty
/// content.
pub trait NodeStorage: Send + Sync {
    fn write_note_node(
        &self,
        username: &Username,
        slug: &NodeSlug,
        content: &mut dyn Read,
    ) -> Result<(), AppError>;

    fn read_note_node(&self, username: &Username, slug: &NodeSlug)
        -> Result<NodeReader, AppError>;

    /// Read only the front matter of a note.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] for missing notes or
    /// [`AppError::FrontMatter`] for malformed front matter.
    fn read_note_node_front_matter(
        &self,
        username: &Username,
        slug: &NodeSlug,
    ) -> Result<FrontMatter, AppError> {
        let mut content = Vec::new();
        self.read_note_node(username, slug)?
            .read_to_end(&mut content)?;
        let (front_matter, _) = front_matter::split_front_matter(&content)?;
        Ok(front_matter)
    }

    /// Move a note, its child directory and its note file.
    fn rename_note_node(
        &self,
        username: &Username,
        slug: &NodeSlug,
        new_slug: &NodeSlug,
    ) -> Result<(), AppError>;

    /// Remove a note, its note file and everything beneath it.
    fn delete_note_node(&self, username: &Username, slug: &NodeSlug) -> Result<(), AppError>;

    fn write_asset_node(
        &self,
        username: &Username,
        slug: &NodeSlug,
        content: &mut dyn Read,
    ) -> Result<(), AppError>;

    fn read_asset_node(
        &self,
        username: &Username,
        slug: &NodeSlug,
    ) -> Result<NodeReader, AppError>;

    fn rename_asset_node(
        &self,
        username: &Username,
        slug: &NodeSlug,
        new_slug: &NodeSlug,
    ) -> Result<(), AppError>;

    fn delete_asset_node(&self, username: &Username, slug: &NodeSlug) -> Result<(), AppError>;

    /// Every user that has storage.
    fn discover_users(&self) -> Result<Vec<Username>, AppError>;

    /// Walk a user's storage. Order is backend defined.
    fn discover_nodes_for_user(&self, username: &Username)
        -> Result<DiscoveredNodes<'_>, AppError>;

    /// Remove all of a user's stored content.
    fn delete_user(&self, username: &Username) -> Result<(), AppError>;
}
