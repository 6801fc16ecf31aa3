//! Reverse lookup of entry hashes to readable names
//!
//! Archives only store hashes. A [`NameResolver`] maps the name part and
//! the extension part of a hash back to text; [`NameMap`] is the dictionary
//! backed implementation.

use crate::hash::path::{
    extension_key, file_name_key, hash_path, hash_path_without_extension, normalize_path,
    EXTENSION_MASK,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Maps hash keys back to names
pub trait NameResolver {
    /// Name for the 50-bit name key of an entry hash
    fn file_name(&self, key: u64) -> Option<&str>;

    /// Extension for the 13-bit extension key of an entry hash
    fn extension(&self, key: u64) -> Option<&str>;
}

impl<T: NameResolver + ?Sized> NameResolver for Box<T> {
    fn file_name(&self, key: u64) -> Option<&str> {
        (**self).file_name(key)
    }

    fn extension(&self, key: u64) -> Option<&str> {
        (**self).extension(key)
    }
}

impl<T: NameResolver + ?Sized> NameResolver for Arc<T> {
    fn file_name(&self, key: u64) -> Option<&str> {
        (**self).file_name(key)
    }

    fn extension(&self, key: u64) -> Option<&str> {
        (**self).extension(key)
    }
}

/// Dictionary of known file names and extensions
#[derive(Debug, Clone, Default)]
pub struct NameMap {
    file_names: HashMap<u64, String>,
    extensions: HashMap<u64, String>,
}

impl NameMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from a dictionary with one path per line
    ///
    /// Blank lines and lines starting with `#` are skipped. Each path
    /// registers its extension-less name and its extension, see
    /// [`add_path`](Self::add_path).
    pub fn from_dictionary(text: &str) -> Self {
        let mut map = Self::new();
        for line in text.lines() {
            let line = line.trim();
            if !line.is_empty() && !line.starts_with('#') {
                map.add_path(line);
            }
        }
        log::debug!(
            "Loaded dictionary: {} names, {} extensions",
            map.file_names.len(),
            map.extensions.len()
        );
        map
    }

    /// Register a name, keyed by the hash of the whole text
    ///
    /// The first name registered for a key wins.
    pub fn add_file_name(&mut self, name: &str) {
        let key = file_name_key(hash_path(name));
        self.file_names
            .entry(key)
            .or_insert_with(|| name.to_string());
    }

    /// Register an extension such as `fpk`, without the dot
    pub fn add_extension(&mut self, extension: &str) {
        let key = hash_path(extension) & EXTENSION_MASK;
        self.extensions
            .entry(key)
            .or_insert_with(|| extension.to_string());
    }

    /// Register a full asset path
    ///
    /// The path up to its first `.` is keyed the way entry hashes key their
    /// name part, and the remainder is registered as an extension.
    pub fn add_path(&mut self, path: &str) {
        let normalized = normalize_path(path);
        let (stem, extension) = match normalized.find('.') {
            Some(index) => (
                &path[..path.len() - (normalized.len() - index)],
                Some(&normalized[index + 1..]),
            ),
            None => (path, None),
        };

        let key = file_name_key(hash_path_without_extension(path));
        self.file_names
            .entry(key)
            .or_insert_with(|| stem.to_string());

        if let Some(extension) = extension.filter(|e| !e.is_empty()) {
            self.add_extension(extension);
        }
    }

    /// Number of registered names
    pub fn file_name_count(&self) -> usize {
        self.file_names.len()
    }

    /// Number of registered extensions
    pub fn extension_count(&self) -> usize {
        self.extensions.len()
    }
}

impl NameResolver for NameMap {
    fn file_name(&self, key: u64) -> Option<&str> {
        self.file_names.get(&key).map(String::as_str)
    }

    fn extension(&self, key: u64) -> Option<&str> {
        self.extensions.get(&key).map(String::as_str)
    }
}

/// Display name of an entry hash: `name.extension`
///
/// Unknown parts are shown as lowercase hex of their key.
pub fn display_name(resolver: &dyn NameResolver, hash: u64) -> String {
    let name_key = file_name_key(hash);
    let ext_key = extension_key(hash);

    let name = match resolver.file_name(name_key) {
        Some(name) => name.to_string(),
        None => format!("{name_key:x}"),
    };
    match resolver.extension(ext_key) {
        Some(ext) => format!("{name}.{ext}"),
        None => format!("{name}.{ext_key:x}"),
    }
}

/// Final component of a display name
pub fn base_name(full_name: &str) -> &str {
    full_name.rsplit('/').next().unwrap_or(full_name)
}
