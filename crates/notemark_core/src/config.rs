//! Configuration loading from environment variables.

use crate::constants::APP_DIR_NAME;
use std::env;
use std::path::PathBuf;

/// Runtime configuration for notemark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Storage root holding one directory per user.
    pub data_path: String,
    /// Directory holding the redb file and the owner lock.
    pub db_path: String,
    /// Drop every cached tree snapshot before loading.
    pub reset_tree_cache: bool,
}

/// Expand tilde (~) in paths to the user's home directory
fn expand_tilde(path: String, lookup: &impl Fn(&str) -> Option<String>) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = resolve_home_dir(lookup) {
            return home.join(rest).to_string_lossy().to_string();
        }
    }
    path
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn resolve_home_dir(lookup: &impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(home) = non_blank(lookup("HOME")) {
        return Some(PathBuf::from(home));
    }

    // Windows
    if let Some(profile) = non_blank(lookup("USERPROFILE")) {
        return Some(PathBuf::from(profile));
    }

    std::env::current_dir().ok()
}

/// Parse a boolean-like environment flag value.
///
/// # Supported Values
/// - Truthy: `1`, `true`, `yes`, `on`
/// - Falsy: `0`, `false`, `no`, `off`, empty string
///
/// Matching is case-insensitive and ignores surrounding whitespace.
///
/// # Returns
/// `Some(bool)` when the value is recognized, otherwise `None`.
pub fn parse_env_flag(value: &str) -> Option<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Returns
    /// A populated [`Config`] with defaults applied when env vars are missing.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Arguments
    /// - `lookup`: Returns the value of a variable, or `None` when unset.
    ///
    /// # Returns
    /// A populated [`Config`]. Unrecognized `RESET_TREE_CACHE` values count as `false`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let app_dir = || {
            let home = resolve_home_dir(&lookup).unwrap_or_else(|| PathBuf::from("."));
            home.join(".local").join("share").join(APP_DIR_NAME)
        };
        let path_var = |name: &str, default_leaf: &str| {
            non_blank(lookup(name))
                .map(|value| expand_tilde(value, &lookup))
                .unwrap_or_else(|| app_dir().join(default_leaf).to_string_lossy().to_string())
        };

        Self {
            data_path: path_var("DATA_PATH", "data"),
            db_path: path_var("DB_PATH", "db"),
            reset_tree_cache: lookup("RESET_TREE_CACHE")
                .and_then(|value| parse_env_flag(&value))
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn parse_env_flag_accepts_truthy_values() {
        for value in ["1", "true", "TRUE", " yes ", "on"] {
            assert_eq!(parse_env_flag(value), Some(true), "value: {}", value);
        }
    }

    #[test]
    fn parse_env_flag_accepts_falsy_values() {
        for value in ["", "0", "false", "FALSE", " no ", "off"] {
            assert_eq!(parse_env_flag(value), Some(false), "value: {}", value);
        }
    }

    #[test]
    fn parse_env_flag_rejects_unknown_values() {
        assert_eq!(parse_env_flag("maybe"), None);
    }

    #[test]
    fn defaults_live_under_home_share_dir() {
        let config = Config::from_lookup(lookup_from(&[("HOME", "/home/leo")]));
        let base = PathBuf::from("/home/leo/.local/share").join(APP_DIR_NAME);
        assert_eq!(config.data_path, base.join("data").to_string_lossy());
        assert_eq!(config.db_path, base.join("db").to_string_lossy());
        assert!(!config.reset_tree_cache);
    }

    #[test]
    fn explicit_paths_are_tilde_expanded() {
        let config = Config::from_lookup(lookup_from(&[
            ("HOME", "/home/leo"),
            ("DATA_PATH", "~/notes"),
            ("DB_PATH", "/var/lib/notemark"),
            ("RESET_TREE_CACHE", "yes"),
        ]));
        assert_eq!(
            config.data_path,
            PathBuf::from("/home/leo").join("notes").to_string_lossy()
        );
        assert_eq!(config.db_path, "/var/lib/notemark");
        assert!(config.reset_tree_cache);
    }

    #[test]
    fn unknown_reset_flag_is_false() {
        let config = Config::from_lookup(lookup_from(&[
            ("HOME", "/home/leo"),
            ("RESET_TREE_CACHE", "sometimes"),
        ]));
        assert!(!config.reset_tree_cache);
    }
}
