//! Data models for the node tree and user records.

/// Node tree, slugs and front matter.
pub mod node;
/// User identity records.
pub mod user;

pub use node::{FrontMatter, Node, NodeEntry, NodeSlug, NodeTree, NodeType, Username};
pub use user::User;
