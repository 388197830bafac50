//! `notedeck gc`: store-wide sweep for assets no note references.
//!
//! The per-note tracker only cleans up what a note dropped while it was open.
//! Assets left behind by notes deleted or edited elsewhere are found here by
//! reading every note, including notes in the trash.

use anyhow::Result;
use colored::Colorize;
use notedeck_codec::{AssetStore, NoteStore};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::store::FsStore;

#[derive(Debug, Default)]
pub struct GcReport {
    pub notes: usize,
    /// Notes in the trash, scanned like live ones.
    pub trashed: usize,
    pub kept: usize,
    /// Orphans deleted (or, on a dry run, that would be).
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    pub pruned_dirs: usize,
}

impl GcReport {
    pub fn print_summary(&self, dry_run: bool) {
        let verb = if dry_run { "Would remove" } else { "Removed" };
        for path in &self.removed {
            println!("  {} {}", verb.yellow(), path.display());
        }
        for (path, error) in &self.failed {
            println!("  {} {}: {}", "Failed".red(), path.display(), error);
        }
        println!(
            "{} {} note(s) and {} trashed note(s) scanned, {} asset(s) kept, {} orphan(s) {}, {} empty dir(s) pruned",
            "GC complete:".green().bold(),
            self.notes,
            self.trashed,
            self.kept,
            self.removed.len(),
            if dry_run { "found" } else { "removed" },
            self.pruned_dirs,
        );
    }
}

/// Delete every asset file no note references, then prune empty asset
/// directories. Individual delete failures are logged and reported.
pub fn collect_garbage(store: &mut FsStore, dry_run: bool) -> Result<GcReport> {
    let notes = store.list_notes()?;
    let mut texts = Vec::with_capacity(notes.len());
    for note in &notes {
        texts.push(store.read_note(note)?);
    }
    // Trashed notes can be restored, so their assets are still in use.
    let trashed = store.trashed_note_texts()?;
    let trashed_count = trashed.len();
    texts.extend(trashed);

    let mut referenced: HashSet<PathBuf> = HashSet::new();
    for text in &texts {
        for url in notedeck_codec::deserialize(text).referenced_assets() {
            match store.asset_path(&url) {
                Ok(path) => {
                    referenced.insert(path.canonicalize().unwrap_or(path));
                }
                Err(error) => {
                    tracing::warn!(url = %url, error = %error, "unreadable asset url");
                }
            }
        }
    }

    let mut report = GcReport {
        notes: notes.len(),
        trashed: trashed_count,
        ..GcReport::default()
    };

    for asset in store.list_assets()? {
        let canonical = asset.canonicalize().unwrap_or_else(|_| asset.clone());
        if referenced.contains(&canonical) || mentioned(store, &asset, &texts) {
            report.kept += 1;
            continue;
        }
        if dry_run {
            report.removed.push(asset);
            continue;
        }

        let url = store.resolve_display_url(&asset.to_string_lossy());
        match store.delete_asset(&url) {
            Ok(()) => report.removed.push(asset),
            Err(error) => {
                tracing::warn!(path = %asset.display(), error = %error, "failed to delete orphaned asset");
                report.failed.push((asset, error.to_string()));
            }
        }
    }

    if !dry_run {
        report.pruned_dirs = store.prune_empty_asset_dirs()?;
    }

    Ok(report)
}

/// Inline images inside paragraphs are not blocks, so the document scan does
/// not see them. Keep anything whose path or display URL appears in a note.
fn mentioned(store: &FsStore, asset: &Path, texts: &[String]) -> bool {
    let raw = asset.to_string_lossy();
    let url = store.resolve_display_url(&raw);
    let relative = asset
        .strip_prefix(store.root())
        .ok()
        .map(|p| p.to_string_lossy().replace('\\', "/"));

    texts.iter().any(|text| {
        text.contains(url.as_str())
            || text.contains(&*raw)
            || relative.as_deref().is_some_and(|r| text.contains(r))
    })
}

pub fn handle_gc(store: &mut FsStore, dry_run: bool, quiet: bool) -> Result<()> {
    let report = collect_garbage(store, dry_run)?;
    if !quiet {
        report.print_summary(dry_run);
    }
    if !report.failed.is_empty() {
        anyhow::bail!("{} asset(s) could not be deleted", report.failed.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotedeckConfig;
    use notedeck_codec::{Block, Document, Width};
    use pretty_assertions::assert_eq;

    fn upload(store: &mut FsStore, name: &str, owner: &str) -> (PathBuf, String) {
        let stored = store.upload_asset(name.as_bytes(), name, owner).unwrap();
        let url = store.resolve_display_url(&stored);
        (PathBuf::from(stored), url)
    }

    #[test]
    fn sweeps_only_unreferenced_assets() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsStore::open(dir.path(), &NotedeckConfig::default()).unwrap();

        let (kept_block, block_url) = upload(&mut store, "a.png", "one");
        let (kept_inline, inline_url) = upload(&mut store, "b.png", "two");
        let (orphan, _) = upload(&mut store, "c.png", "gone");

        let doc = Document::new(vec![Block::image(block_url, "a", Width::Pixels(500))]);
        store.write_note("one", &doc.to_markdown()).unwrap();
        store
            .write_note("two", &format!("Inline ![b|w=16]({inline_url}) here.\n"))
            .unwrap();

        let dry = collect_garbage(&mut store, true).unwrap();
        assert_eq!(dry.removed, vec![orphan.clone()]);
        assert!(orphan.exists());

        let report = collect_garbage(&mut store, false).unwrap();
        assert_eq!(report.notes, 2);
        assert_eq!(report.kept, 2);
        assert_eq!(report.removed, vec![orphan.clone()]);
        assert_eq!(report.pruned_dirs, 1);
        assert!(!orphan.exists());
        assert!(kept_block.exists());
        assert!(kept_inline.exists());
        assert!(!store.assets_root().join("gone").exists());
    }

    #[test]
    fn trashed_notes_keep_their_assets_until_restored() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FsStore::open(dir.path(), &NotedeckConfig::default()).unwrap();

        let (block_asset, block_url) = upload(&mut store, "a.png", "diary");
        let (inline_asset, inline_url) = upload(&mut store, "b.png", "diary");
        let doc = Document::new(vec![
            Block::paragraph(format!("Inline ![b|w=16]({inline_url}) here.")),
            Block::image(block_url, "a", Width::Pixels(500)),
        ]);
        store.write_note("diary", &doc.to_markdown()).unwrap();
        store.delete_item("diary", false).unwrap();

        let report = collect_garbage(&mut store, false).unwrap();
        assert_eq!(report.notes, 0);
        assert_eq!(report.trashed, 1);
        assert!(report.removed.is_empty());
        assert!(block_asset.exists());
        assert!(inline_asset.exists());

        let name = store.trash_items().unwrap()[0].name.clone();
        store.restore_trash_item(&name).unwrap();
        let restored = notedeck_codec::deserialize(&store.read_note("diary").unwrap());
        for url in restored.referenced_assets() {
            assert!(store.asset_path(&url).unwrap().exists());
        }

        // Once the trash is emptied the assets are orphans again.
        store.delete_item("diary", false).unwrap();
        store.empty_trash().unwrap();
        let report = collect_garbage(&mut store, false).unwrap();
        assert_eq!(report.removed.len(), 2);
        assert!(!block_asset.exists());
    }
}
