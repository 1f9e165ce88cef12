//! Node tree data model and traversal helpers.

use crate::constants::NOTE_FILE_EXTENSION;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;

/// Owner of a node tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Username {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Username {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A `/`-delimited relative path identifying a node inside a user's tree.
///
/// Within a [`Node`] the slug holds only that node's own segment; everywhere
/// else (entries, controller calls) it is the full path from the tree root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeSlug(String);

impl NodeSlug {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for relative slugs made only of real segments: no leading or
    /// trailing `/`, no empty, `.` or `..` segment.
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty()
            && self
                .segments()
                .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
    }

    /// Path segments in root-to-leaf order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Final path segment.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Slug of the containing node, `None` for top-level slugs.
    pub fn parent(&self) -> Option<NodeSlug> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| NodeSlug::new(parent))
    }

    /// Append a child segment.
    pub fn join(&self, child: &str) -> NodeSlug {
        if self.0.is_empty() {
            return NodeSlug::new(child);
        }
        NodeSlug::new(format!("{}/{}", self.0, child))
    }

    /// Extension of the final segment, when it has a non-empty one.
    pub fn extension(&self) -> Option<&str> {
        let (_, ext) = self.file_name().rsplit_once('.')?;
        (!ext.is_empty()).then_some(ext)
    }

    /// Node kind implied by the slug shape: assets carry an extension, notes do not.
    pub fn node_type(&self) -> NodeType {
        if self.extension().is_some() {
            NodeType::Asset
        } else {
            NodeType::Note
        }
    }

    /// Relative file path of a note's markdown file.
    pub fn note_file_path(&self) -> String {
        format!("{}.{}", self.0, NOTE_FILE_EXTENSION)
    }
}

impl fmt::Display for NodeSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeSlug {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NodeSlug {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Kind of content a node holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Markdown file with optional YAML front matter.
    Note,
    /// Opaque binary file.
    Asset,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Note => f.write_str("note"),
            NodeType::Asset => f.write_str("asset"),
        }
    }
}

/// Metadata header at the top of a note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontMatter {
    #[serde(default)]
    pub title: String,
}

/// One addressable unit in a user's tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub slug: NodeSlug,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub mod_time: DateTime<Utc>,
    #[serde(default)]
    pub front_matter: FrontMatter,
    #[serde(default)]
    pub children: NodeTree,
}

impl Node {
    /// Stand-in for a path segment that has no content of its own (yet).
    pub fn placeholder(segment: &str) -> Self {
        Self {
            slug: NodeSlug::new(segment),
            node_type: NodeType::Note,
            mod_time: DateTime::<Utc>::UNIX_EPOCH,
            front_matter: FrontMatter::default(),
            children: NodeTree::default(),
        }
    }

    fn latest_mod_time(&self) -> DateTime<Utc> {
        self.children
            .latest_mod_time()
            .map_or(self.mod_time, |child| child.max(self.mod_time))
    }

    fn node_count(&self) -> usize {
        1 + self.children.node_count()
    }
}

/// A node discovered in storage or produced by a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEntry {
    pub full_slug: NodeSlug,
    pub node_type: NodeType,
    pub mod_time: DateTime<Utc>,
}

impl NodeEntry {
    pub fn new(full_slug: NodeSlug, node_type: NodeType, mod_time: DateTime<Utc>) -> Self {
        Self {
            full_slug,
            node_type,
            mod_time,
        }
    }
}

/// Mapping from path segment to the node that owns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeTree(BTreeMap<String, Node>);

impl Deref for NodeTree {
    type Target = BTreeMap<String, Node>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl NodeTree {
    /// Insert a discovered or written entry, synthesizing missing intermediate nodes.
    ///
    /// The final node takes the entry's type and mod time. Front matter is only
    /// applied for notes; existing children are always kept.
    ///
    /// # Returns
    /// The node at `entry.full_slug`.
    pub fn insert_entry(&mut self, entry: &NodeEntry, front_matter: FrontMatter) -> &mut Node {
        let node = self.walk_or_create(&entry.full_slug);
        node.mod_time = entry.mod_time;
        node.node_type = entry.node_type;
        if entry.node_type == NodeType::Note {
            node.front_matter = front_matter;
        }
        node
    }

    /// Look up a node by its full slug.
    pub fn get(&self, slug: &NodeSlug) -> Option<&Node> {
        let mut segments = slug.segments();
        let mut node = self.0.get(segments.next()?)?;
        for segment in segments {
            node = node.children.0.get(segment)?;
        }
        Some(node)
    }

    /// Look up a node mutably by its full slug.
    pub fn get_mut(&mut self, slug: &NodeSlug) -> Option<&mut Node> {
        let mut segments = slug.segments();
        let mut node = self.0.get_mut(segments.next()?)?;
        for segment in segments {
            node = node.children.0.get_mut(segment)?;
        }
        Some(node)
    }

    /// Detach the subtree rooted at `slug`.
    pub fn remove(&mut self, slug: &NodeSlug) -> Option<Node> {
        match slug.parent() {
            Some(parent) => self.get_mut(&parent)?.children.0.remove(slug.file_name()),
            None => self.0.remove(slug.as_str()),
        }
    }

    /// Attach a detached subtree at `slug`, replacing anything already there.
    ///
    /// The node's own slug is rewritten to the final segment of `slug`.
    pub fn graft(&mut self, slug: &NodeSlug, mut node: Node) {
        let segment = slug.file_name().to_string();
        node.slug = NodeSlug::new(segment.as_str());
        let siblings = match slug.parent() {
            Some(parent) => &mut self.walk_or_create(&parent).children,
            None => self,
        };
        siblings.0.insert(segment, node);
    }

    /// Newest modification time of any node in the tree.
    pub fn latest_mod_time(&self) -> Option<DateTime<Utc>> {
        self.0.values().map(Node::latest_mod_time).max()
    }

    /// Total number of nodes, placeholders included.
    pub fn node_count(&self) -> usize {
        self.0.values().map(Node::node_count).sum()
    }

    fn walk_or_create(&mut self, slug: &NodeSlug) -> &mut Node {
        let mut segments = slug.segments();
        // split always yields at least one (possibly empty) segment
        let first = segments.next().unwrap_or_default();
        let mut node = self
            .0
            .entry(first.to_string())
            .or_insert_with(|| Node::placeholder(first));
        for segment in segments {
            node = node
                .children
                .0
                .entry(segment.to_string())
                .or_insert_with(|| Node::placeholder(segment));
        }
        node
    }
}

impl FromIterator<(String, Node)> for NodeTree {
    fn from_iter<T: IntoIterator<Item = (String, Node)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
