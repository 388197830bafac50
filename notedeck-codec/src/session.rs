//! Editor session for one open note.
//!
//! A [`NoteSession`] ties the codec, the asset tracker and a [`NoteStore`]
//! together the way an editing surface uses them: load a note, apply edits,
//! upload attachments, save. Storage failures are returned as
//! [`SessionError`] and reflected in [`NoteSession::status`]; the in-memory
//! document is never thrown away because of one.

use crate::codec::Codec;
use crate::error::SessionError;
use crate::store::NoteStore;
use crate::tracker::{AssetTracker, Reconciliation};
use crate::transcoder::{CommonMarkTranscoder, MarkdownTranscoder};
use crate::types::{Block, BlockId, DEFAULT_IMAGE_WIDTH, Document, Placement};

/// How an uploaded attachment is shown in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    File,
}

impl AttachmentKind {
    /// Guess from the file name's extension.
    pub fn from_name(name: &str) -> Self {
        let ext = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" | "bmp") => AttachmentKind::Image,
            _ => AttachmentKind::File,
        }
    }
}

pub struct NoteSession<S: NoteStore, T: MarkdownTranscoder = CommonMarkTranscoder> {
    store: S,
    codec: Codec<T>,
    path: Option<String>,
    doc: Document,
    tracker: AssetTracker,
    dirty: bool,
    loading: bool,
    status: String,
    placement: Placement,
}

impl<S: NoteStore> NoteSession<S> {
    pub fn new(store: S) -> Self {
        Self::with_codec(store, Codec::default())
    }
}

impl<S: NoteStore, T: MarkdownTranscoder> NoteSession<S, T> {
    pub fn with_codec(store: S, codec: Codec<T>) -> Self {
        Self {
            store,
            codec,
            path: None,
            doc: Document::empty(),
            tracker: AssetTracker::new(),
            dirty: false,
            loading: false,
            status: String::new(),
            placement: Placement::default(),
        }
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn tracker(&self) -> &AssetTracker {
        &self.tracker
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Open the note at `path`, saving the current one first if it has
    /// unsaved changes. If that save fails the current note stays open.
    pub fn load(&mut self, path: &str) -> Result<(), SessionError> {
        if self.dirty {
            self.save()?;
        }

        self.loading = true;
        let text = match self.store.read_note(path) {
            Ok(text) => text,
            Err(source) => {
                self.loading = false;
                self.status = format!("load failed: {source}");
                return Err(SessionError::Load {
                    path: path.to_string(),
                    source,
                });
            }
        };

        self.doc = self.codec.deserialize(&text);
        self.tracker = AssetTracker::from_document(&self.doc);
        self.path = Some(path.to_string());
        self.dirty = false;
        self.loading = false;
        self.status = format!("opened {path}");
        tracing::debug!(path, assets = self.tracker.baseline().len(), "loaded note");
        Ok(())
    }

    /// Record that the document changed. Ignored while a load is in
    /// progress or when no note is open.
    pub fn mark_edited(&mut self) {
        if self.loading || self.path.is_none() {
            return;
        }
        self.dirty = true;
        self.status = "unsaved changes".into();
    }

    /// Apply an edit to the document and mark the session dirty.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut Document) -> R) -> R {
        let result = f(&mut self.doc);
        self.mark_edited();
        result
    }

    /// Reconcile assets, then write the serialized document.
    ///
    /// Does nothing when no note is open. Asset deletion failures are
    /// reported in the returned [`Reconciliation`] but do not fail the save.
    pub fn save(&mut self) -> Result<Reconciliation, SessionError> {
        let Some(path) = self.path.clone() else {
            return Ok(Reconciliation::default());
        };

        let outcome = self.tracker.reconcile(&self.doc, &mut self.store);
        let text = self.codec.serialize(&self.doc);

        if let Err(source) = self.store.write_note(&path, &text) {
            tracing::warn!(path = %path, error = %source, "save failed");
            self.status = "save failed".into();
            return Err(SessionError::Save { path, source });
        }

        self.dirty = false;
        self.status = if outcome.is_clean() {
            format!("saved {path}")
        } else {
            format!("saved {path} ({} asset(s) could not be deleted)", outcome.failed.len())
        };
        Ok(outcome)
    }

    /// Store an asset under the open note and return its display URL. The
    /// URL is tracked immediately, so removing its block before the next
    /// save still deletes it.
    pub fn upload(&mut self, bytes: &[u8], name: &str) -> Result<String, SessionError> {
        let Some(path) = self.path.as_deref() else {
            return Err(SessionError::NoOpenNote);
        };

        let stored = self.store.upload_asset(bytes, name, path).map_err(|source| {
            SessionError::Upload {
                name: name.to_string(),
                source,
            }
        })?;
        let url = self.store.resolve_display_url(&stored);
        self.tracker.record_upload(url.clone());
        tracing::debug!(url = %url, "uploaded asset");
        Ok(url)
    }

    /// Upload `bytes` and insert an image or file block for it next to
    /// `anchor` using the session's placement policy.
    pub fn insert_attachment(
        &mut self,
        bytes: &[u8],
        name: &str,
        kind: AttachmentKind,
        anchor: Option<&BlockId>,
    ) -> Result<BlockId, SessionError> {
        let url = self.upload(bytes, name)?;
        let block = match kind {
            AttachmentKind::Image => Block::image(url, name, DEFAULT_IMAGE_WIDTH),
            AttachmentKind::File => Block::file(name, url),
        };
        let id = block.id.clone();
        let placement = self.placement;
        self.edit(|doc| doc.insert_block(anchor, block, placement));
        Ok(id)
    }

    /// Delete a note or folder. If the open note is affected the editor is
    /// cleared first and its pending edits are dropped.
    pub fn delete_note(&mut self, path: &str, is_dir: bool) -> Result<(), SessionError> {
        let affects_open = self.path.as_deref().is_some_and(|open| {
            open == path || (is_dir && open.starts_with(&format!("{path}/")))
        });
        if affects_open {
            self.clear();
        }

        self.store.delete_item(path, is_dir).map_err(|source| {
            self.status = format!("delete failed: {source}");
            SessionError::Delete {
                path: path.to_string(),
                source,
            }
        })?;
        self.status = format!("deleted {path}");
        Ok(())
    }

    /// Flush pending edits and close the note.
    pub fn close(&mut self) -> Result<(), SessionError> {
        if self.dirty {
            self.save()?;
        }
        self.clear();
        Ok(())
    }

    fn clear(&mut self) {
        self.path = None;
        self.doc = Document::empty();
        self.tracker.reset();
        self.dirty = false;
        self.loading = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{BlockKind, Width};
    use pretty_assertions::assert_eq;

    const NOTE: &str = "![a|w=500](mem://assets/n/a.png)\n\n![b|w=500](mem://assets/n/b.png)\n";

    fn session() -> NoteSession<MemoryStore> {
        let store = MemoryStore::new()
            .with_note("n", NOTE)
            .with_asset("assets/n/a.png")
            .with_asset("assets/n/b.png");
        NoteSession::new(store)
    }

    #[test]
    fn load_sets_baseline_and_clears_flags() {
        let mut s = session();
        s.load("n").unwrap();
        assert_eq!(s.path(), Some("n"));
        assert_eq!(s.document().blocks.len(), 2);
        assert_eq!(s.tracker().baseline().len(), 2);
        assert!(!s.is_dirty());
        assert!(!s.is_loading());
    }

    #[test]
    fn missing_note_loads_as_empty_document() {
        let mut s = session();
        s.load("new").unwrap();
        assert_eq!(s.document().blocks.len(), 1);
        assert!(s.document().blocks[0].is_empty_generic());
    }

    #[test]
    fn edits_without_open_note_are_ignored() {
        let mut s = session();
        s.mark_edited();
        assert!(!s.is_dirty());
        assert!(s.save().unwrap().deleted.is_empty());
        assert!(matches!(s.upload(b"x", "x.png"), Err(SessionError::NoOpenNote)));
    }

    #[test]
    fn save_collects_removed_and_uploaded_assets() {
        let mut s = session();
        s.load("n").unwrap();

        s.edit(|doc| doc.remove_asset_blocks("mem://assets/n/b.png"));
        let c = s.upload(b"png", "c.png").unwrap();
        let anchor = s.document().blocks[0].id.clone();
        s.edit(|doc| doc.insert_block(Some(&anchor), Block::image(c.clone(), "c", Width::Pixels(500)), Placement::After));
        let d = s.upload(b"tmp", "d.txt").unwrap();
        assert!(s.is_dirty());

        let outcome = s.save().unwrap();
        let mut deleted = outcome.deleted.clone();
        deleted.sort();
        assert_eq!(deleted, vec![d.clone(), "mem://assets/n/b.png".to_string()]);
        assert!(!s.is_dirty());
        assert!(s.store().has_asset("mem://assets/n/a.png"));
        assert!(s.store().has_asset(&c));
        assert!(!s.store().has_asset(&d));

        let saved = &s.store().notes["n"];
        assert!(saved.contains("![c|w=500](mem://assets/n/1_c.png)"));
        assert!(!saved.contains("b.png"));
    }

    #[test]
    fn failed_write_keeps_document_and_dirty_flag() {
        let mut s = session();
        s.load("n").unwrap();
        s.edit(|doc| doc.blocks.push(Block::paragraph("more")));
        s.store_mut().read_only = true;

        assert!(matches!(s.save(), Err(SessionError::Save { .. })));
        assert_eq!(s.status(), "save failed");
        assert!(s.is_dirty());
        assert_eq!(s.document().blocks.len(), 3);
    }

    #[test]
    fn load_saves_dirty_note_first() {
        let mut s = session().with_placement(Placement::After);
        s.store_mut().notes.insert("other".into(), "# Other\n".into());
        s.load("n").unwrap();
        s.edit(|doc| doc.blocks.truncate(1));

        s.load("other").unwrap();
        assert_eq!(s.store().notes["n"], "![a|w=500](mem://assets/n/a.png)\n");
        assert!(!s.store().has_asset("mem://assets/n/b.png"));
        assert_eq!(s.path(), Some("other"));
    }

    #[test]
    fn failed_save_aborts_load() {
        let mut s = session();
        s.load("n").unwrap();
        s.mark_edited();
        s.store_mut().read_only = true;

        assert!(s.load("other").is_err());
        assert_eq!(s.path(), Some("n"));
        assert!(s.is_dirty());
    }

    #[test]
    fn insert_attachment_replaces_empty_paragraph() {
        let mut s = session();
        s.load("fresh").unwrap();
        let id = s.insert_attachment(b"pdf", "report.pdf", AttachmentKind::File, None).unwrap();
        assert_eq!(s.document().blocks.len(), 1);
        assert_eq!(s.document().blocks[0].id, id);
        match &s.document().blocks[0].kind {
            BlockKind::File { name, url } => {
                assert_eq!(name, "report.pdf");
                assert_eq!(url, "mem://assets/fresh/1_report.pdf");
            }
            other => panic!("expected file, got {other:?}"),
        }
        assert!(s.is_dirty());
    }

    #[test]
    fn deleting_open_note_clears_editor() {
        let mut s = session();
        s.load("n").unwrap();
        s.mark_edited();
        s.delete_note("n", false).unwrap();

        assert_eq!(s.path(), None);
        assert!(!s.is_dirty());
        assert!(s.tracker().baseline().is_empty());
        assert!(!s.store().notes.contains_key("n"));
        // Nothing was written back for the deleted note.
        assert!(s.store().deleted.is_empty());
    }

    #[test]
    fn deleting_parent_folder_clears_editor() {
        let mut s = NoteSession::new(MemoryStore::new().with_note("work/a", "x"));
        s.load("work/a").unwrap();
        s.delete_note("work", true).unwrap();
        assert_eq!(s.path(), None);
    }

    #[test]
    fn close_flushes_pending_save() {
        let mut s = session();
        s.load("n").unwrap();
        s.edit(|doc| doc.blocks.clear());
        s.close().unwrap();
        assert_eq!(s.store().notes["n"], "");
        assert_eq!(s.path(), None);
    }

    #[test]
    fn attachment_kind_from_extension() {
        assert_eq!(AttachmentKind::from_name("a.PNG"), AttachmentKind::Image);
        assert_eq!(AttachmentKind::from_name("a.pdf"), AttachmentKind::File);
        assert_eq!(AttachmentKind::from_name("README"), AttachmentKind::File);
    }
}
