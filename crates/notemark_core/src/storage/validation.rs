//! Slug shape validation shared by discovery and callers of the controller.

use crate::models::{NodeSlug, NodeType};
use regex::Regex;
use std::sync::OnceLock;

fn full_slug_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^[a-z0-9-]+(?:/[a-z0-9-]+)*(?:\.[a-z0-9-]+)*$").expect("valid slug regex")
    })
}

/// Whether `slug` only uses the characters accepted for user-supplied slugs.
pub fn is_valid_full_slug(slug: &str) -> bool {
    full_slug_regex().is_match(slug)
}

/// Whether `username/slug` is a well-formed path for a node of `node_type`.
///
/// Notes need at least two segments (user plus note) and no extension.
/// Assets always live under a note, so they need at least three segments and
/// an extension on the final one.
pub fn is_valid_node_slug(user_slug: &str, node_type: NodeType) -> bool {
    if user_slug.is_empty() || user_slug.starts_with('/') || user_slug.ends_with('/') {
        return false;
    }
    let segments: Vec<&str> = user_slug.split('/').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return false;
    }
    let has_extension = NodeSlug::from(user_slug).extension().is_some();
    match node_type {
        NodeType::Note => segments.len() >= 2 && !has_extension,
        NodeType::Asset => segments.len() >= 3 && has_extension,
    }
}
