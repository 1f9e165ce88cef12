//! Node storage on the local filesystem.
//!
//! Layout under the root directory:
//! - notes: `<root>/<username>/<slug>.md`
//! - assets: `<root>/<username>/<slug>`
//!
//! A note's children live in the directory `<root>/<username>/<slug>/`. A
//! directory without a sibling `.md` file is a blank note.

use super::validation::is_valid_node_slug;
use super::{DiscoveredNodes, NodeReader, NodeStorage};
use crate::constants::NOTE_FILE_EXTENSION;
use crate::error::AppError;
use crate::models::{NodeEntry, NodeSlug, NodeType, Username};
use chrono::{DateTime, Utc};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

fn is_system_file(file_name: &str) -> bool {
    file_name.eq_ignore_ascii_case("thumbs.db")
        || file_name.ends_with(".DS_Store")
        || file_name.starts_with("~$")
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

fn map_not_found(err: io::Error) -> AppError {
    if err.kind() == io::ErrorKind::NotFound {
        AppError::NotFound
    } else {
        AppError::Storage(err)
    }
}

/// `Ok(false)` when the path did not exist.
fn tolerate_not_found(result: io::Result<()>) -> Result<bool, AppError> {
    match result {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(AppError::Storage(err)),
    }
}

fn with_note_extension(path: &Path) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(".");
    raw.push(NOTE_FILE_EXTENSION);
    PathBuf::from(raw)
}

fn relative_slug(user_root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(user_root).ok()?;
    let mut segments = Vec::new();
    for component in relative.components() {
        segments.push(component.as_os_str().to_str()?);
    }
    Some(segments.join("/"))
}

/// Filesystem-backed [`NodeStorage`].
#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    /// Open (and create if needed) a storage root.
    ///
    /// # Errors
    /// Returns [`AppError::BadRequest`] for relative roots, or a storage error
    /// when the directory cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let root = root.into();
        if !root.is_absolute() {
            return Err(AppError::BadRequest(format!(
                "Storage root '{}' must be an absolute path",
                root.display()
            )));
        }
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn user_root(&self, username: &Username) -> PathBuf {
        self.root.join(username.as_str())
    }

    fn node_path(&self, username: &Username, relative: &str) -> Result<PathBuf, AppError> {
        let mut path = self.user_root(username);
        for segment in relative.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(AppError::BadRequest(format!(
                    "Invalid path segment in slug '{}'",
                    relative
                )));
            }
            path.push(segment);
        }
        Ok(path)
    }

    fn write_file(
        &self,
        username: &Username,
        relative: &str,
        content: &mut dyn Read,
    ) -> Result<(), AppError> {
        let path = self.node_path(username, relative)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&path)?;
        io::copy(content, &mut file)?;
        Ok(())
    }

    fn read_file(&self, username: &Username, relative: &str) -> Result<File, AppError> {
        let path = self.node_path(username, relative)?;
        File::open(&path).map_err(map_not_found)
    }

    fn rename_path(&self, from: &Path, to: &Path) -> io::Result<()> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(from, to)
    }

    fn classify(
        &self,
        username: &Username,
        user_root: &Path,
        item: Result<DirEntry, walkdir::Error>,
    ) -> Result<Option<NodeEntry>, AppError> {
        let entry = item?;
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            return Ok(None);
        }
        let Some(relative) = relative_slug(user_root, entry.path()) else {
            tracing::debug!("Skipping non UTF-8 path {}", entry.path().display());
            return Ok(None);
        };

        let (slug, node_type) = if file_type.is_dir() {
            // the note file, when present, is reported instead
            if with_note_extension(entry.path()).exists() {
                return Ok(None);
            }
            (relative, NodeType::Note)
        } else {
            let file_name = entry.file_name().to_string_lossy();
            if is_system_file(&file_name) {
                return Ok(None);
            }
            let note_suffix = format!(".{}", NOTE_FILE_EXTENSION);
            match relative.strip_suffix(note_suffix.as_str()) {
                Some(note_slug) => (note_slug.to_string(), NodeType::Note),
                None => (relative, NodeType::Asset),
            }
        };

        if !is_valid_node_slug(&format!("{}/{}", username, slug), node_type) {
            tracing::debug!("Skipping invalid {} node '{}/{}'", node_type, username, slug);
            return Ok(None);
        }

        let modified = entry.metadata()?.modified()?;
        Ok(Some(NodeEntry::new(
            NodeSlug::new(slug),
            node_type,
            DateTime::<Utc>::from(modified),
        )))
    }
}

impl NodeStorage for DiskStorage {
    fn write_note_node(
        &self,
        username: &Username,
        slug: &NodeSlug,
        content: &mut dyn Read,
    ) -> Result<(), AppError> {
        self.write_file(username, &slug.note_file_path(), content)
    }

    fn read_note_node(
        &self,
        username: &Username,
        slug: &NodeSlug,
    ) -> Result<NodeReader, AppError> {
        match self.read_file(username, &slug.note_file_path()) {
            Ok(file) => Ok(Box::new(file)),
            Err(AppError::NotFound) => {
                let dir = self.node_path(username, slug.as_str())?;
                match fs::metadata(&dir) {
                    Ok(meta) if meta.is_dir() => Ok(Box::new(io::empty())),
                    Ok(_) => Err(AppError::NotFound),
                    Err(err) => Err(map_not_found(err)),
                }
            }
            Err(err) => Err(err),
        }
    }

    fn rename_note_node(
        &self,
        username: &Username,
        slug: &NodeSlug,
        new_slug: &NodeSlug,
    ) -> Result<(), AppError> {
        let dir = self.node_path(username, slug.as_str())?;
        let new_dir = self.node_path(username, new_slug.as_str())?;
        let moved_dir = tolerate_not_found(self.rename_path(&dir, &new_dir))?;
        let moved_file = tolerate_not_found(
            self.rename_path(&with_note_extension(&dir), &with_note_extension(&new_dir)),
        )?;
        if !moved_dir && !moved_file {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    fn delete_note_node(&self, username: &Username, slug: &NodeSlug) -> Result<(), AppError> {
        let dir = self.node_path(username, slug.as_str())?;
        let removed_dir = tolerate_not_found(fs::remove_dir_all(&dir))?;
        let removed_file = tolerate_not_found(fs::remove_file(with_note_extension(&dir)))?;
        if !removed_dir && !removed_file {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    fn write_asset_node(
        &self,
        username: &Username,
        slug: &NodeSlug,
        content: &mut dyn Read,
    ) -> Result<(), AppError> {
        self.write_file(username, slug.as_str(), content)
    }

    fn read_asset_node(
        &self,
        username: &Username,
        slug: &NodeSlug,
    ) -> Result<NodeReader, AppError> {
        Ok(Box::new(self.read_file(username, slug.as_str())?))
    }

    fn rename_asset_node(
        &self,
        username: &Username,
        slug: &NodeSlug,
        new_slug: &NodeSlug,
    ) -> Result<(), AppError> {
        let from = self.node_path(username, slug.as_str())?;
        let to = self.node_path(username, new_slug.as_str())?;
        self.rename_path(&from, &to).map_err(map_not_found)
    }

    fn delete_asset_node(&self, username: &Username, slug: &NodeSlug) -> Result<(), AppError> {
        let path = self.node_path(username, slug.as_str())?;
        fs::remove_file(path).map_err(map_not_found)
    }

    fn discover_users(&self) -> Result<Vec<Username>, AppError> {
        let mut users = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) if !name.starts_with('.') => users.push(Username::new(name)),
                Ok(_) => {}
                Err(name) => tracing::debug!("Skipping non UTF-8 user directory {:?}", name),
            }
        }
        users.sort();
        Ok(users)
    }

    fn discover_nodes_for_user(
        &self,
        username: &Username,
    ) -> Result<DiscoveredNodes<'_>, AppError> {
        let user_root = self.user_root(username);
        if !user_root.is_dir() {
            return Err(AppError::NotFound);
        }
        let walker = WalkDir::new(&user_root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| !is_hidden(entry));
        let username = username.clone();
        Ok(Box::new(walker.filter_map(move |item| {
            self.classify(&username, &user_root, item).transpose()
        })))
    }

    fn delete_user(&self, username: &Username) -> Result<(), AppError> {
        fs::remove_dir_all(self.user_root(username)).map_err(map_not_found)
    }
}
