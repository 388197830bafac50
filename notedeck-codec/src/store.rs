//! Storage collaborator interfaces.
//!
//! The codec and tracker never touch disk themselves. A [`NoteStore`] reads
//! and writes note text, stores uploaded assets and deletes them again.
//! [`MemoryStore`] is an in-process implementation used by tests and by
//! embedders that keep notes elsewhere.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::StoreError;

/// Deletes stored assets by URL.
pub trait AssetStore {
    /// Delete the asset behind `url`. Deleting an asset that is already gone
    /// is not an error.
    fn delete_asset(&mut self, url: &str) -> Result<(), StoreError>;
}

/// Full storage collaborator for a note session.
pub trait NoteStore: AssetStore {
    /// Read a note's text. A note that does not exist reads as empty text.
    fn read_note(&self, path: &str) -> Result<String, StoreError>;

    fn write_note(&mut self, path: &str, text: &str) -> Result<(), StoreError>;

    /// Store `bytes` as an asset owned by the note at `owner`; returns the
    /// stored path.
    fn upload_asset(&mut self, bytes: &[u8], suggested_name: &str, owner: &str) -> Result<String, StoreError>;

    /// Map a stored path to the URL a renderer (and the document) uses.
    fn resolve_display_url(&self, stored_path: &str) -> String;

    /// Remove a note (or a folder of notes) from the tree.
    fn delete_item(&mut self, path: &str, is_dir: bool) -> Result<(), StoreError>;
}

impl<S: AssetStore + ?Sized> AssetStore for &mut S {
    fn delete_asset(&mut self, url: &str) -> Result<(), StoreError> {
        (**self).delete_asset(url)
    }
}

impl<S: NoteStore + ?Sized> NoteStore for &mut S {
    fn read_note(&self, path: &str) -> Result<String, StoreError> {
        (**self).read_note(path)
    }

    fn write_note(&mut self, path: &str, text: &str) -> Result<(), StoreError> {
        (**self).write_note(path, text)
    }

    fn upload_asset(&mut self, bytes: &[u8], suggested_name: &str, owner: &str) -> Result<String, StoreError> {
        (**self).upload_asset(bytes, suggested_name, owner)
    }

    fn resolve_display_url(&self, stored_path: &str) -> String {
        (**self).resolve_display_url(stored_path)
    }

    fn delete_item(&mut self, path: &str, is_dir: bool) -> Result<(), StoreError> {
        (**self).delete_item(path, is_dir)
    }
}

const MEMORY_SCHEME: &str = "mem://";

/// In-memory [`NoteStore`].
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    pub notes: BTreeMap<String, String>,
    pub assets: BTreeMap<String, Vec<u8>>,
    /// URLs passed to `delete_asset`, in call order.
    pub deleted: Vec<String>,
    /// URLs whose deletion fails.
    pub failing: BTreeSet<String>,
    /// When set, every `write_note` fails.
    pub read_only: bool,
    uploads: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_note(mut self, path: &str, text: &str) -> Self {
        self.notes.insert(path.to_string(), text.to_string());
        self
    }

    /// Insert an empty asset at `stored_path`.
    pub fn with_asset(mut self, stored_path: &str) -> Self {
        self.assets.insert(stored_path.to_string(), Vec::new());
        self
    }

    pub fn has_asset(&self, url: &str) -> bool {
        self.assets.contains_key(url.strip_prefix(MEMORY_SCHEME).unwrap_or(url))
    }
}

impl AssetStore for MemoryStore {
    fn delete_asset(&mut self, url: &str) -> Result<(), StoreError> {
        self.deleted.push(url.to_string());
        if self.failing.contains(url) {
            return Err(StoreError::io(
                url,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "asset is locked"),
            ));
        }
        self.assets.remove(url.strip_prefix(MEMORY_SCHEME).unwrap_or(url));
        Ok(())
    }
}

impl NoteStore for MemoryStore {
    fn read_note(&self, path: &str) -> Result<String, StoreError> {
        Ok(self.notes.get(path).cloned().unwrap_or_default())
    }

    fn write_note(&mut self, path: &str, text: &str) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "store is read-only"),
            ));
        }
        self.notes.insert(path.to_string(), text.to_string());
        Ok(())
    }

    fn upload_asset(&mut self, bytes: &[u8], suggested_name: &str, owner: &str) -> Result<String, StoreError> {
        self.uploads += 1;
        let stored = format!("assets/{owner}/{}_{suggested_name}", self.uploads);
        self.assets.insert(stored.clone(), bytes.to_vec());
        Ok(stored)
    }

    fn resolve_display_url(&self, stored_path: &str) -> String {
        format!("{MEMORY_SCHEME}{stored_path}")
    }

    fn delete_item(&mut self, path: &str, is_dir: bool) -> Result<(), StoreError> {
        let removed = if is_dir {
            let prefix = format!("{path}/");
            let before = self.notes.len();
            self.notes.retain(|k, _| !k.starts_with(&prefix));
            before != self.notes.len()
        } else {
            self.notes.remove(path).is_some()
        };
        if removed {
            Ok(())
        } else {
            Err(StoreError::NotFound {
                path: path.to_string(),
            })
        }
    }
}
