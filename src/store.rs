//! Filesystem-backed note store.
//!
//! Layout under the data directory:
//!
//! - `<path>.md` for each note (folders are plain directories)
//! - `assets/<note path>/<sha256 prefix>_<name>` for uploaded assets
//! - `.trash/<stem>_<unix secs><ext>` for deleted notes and folders
//!
//! Asset URLs in notes are `asset://localhost/<percent-encoded absolute
//! path>`, the form a webview asset protocol serves.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use notedeck_codec::payload::encode_payload;
use notedeck_codec::{AssetStore, NoteStore, StoreError};
use percent_encoding::percent_decode_str;
use serde::Serialize;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::config::NotedeckConfig;

const NOTE_EXT: &str = ".md";
const NEW_NOTE_TEXT: &str = "# ";
const DISPLAY_PREFIX: &str = "asset://localhost/";
/// Checked in order; `asset://localhost/` must come before bare `asset://`.
const ASSET_URL_PREFIXES: [&str; 4] = [
    "http://asset.localhost/",
    "https://asset.localhost/",
    "asset://localhost/",
    "asset://",
];
const HASH_PREFIX_LEN: usize = 12;
const RESTORED_PREFIX: &str = "restored_";

/// A folder or note in the note tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Display name: folder name, or note name without `.md`.
    pub name: String,
    /// Path relative to the data directory, `/`-separated, without `.md`.
    pub path: String,
    pub is_dir: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrashItem {
    pub name: String,
    pub is_dir: bool,
}

pub struct FsStore {
    root: PathBuf,
    assets: PathBuf,
    trash: PathBuf,
    assets_name: String,
    trash_name: String,
}

impl FsStore {
    /// Open (creating if needed) the data directory and its asset and trash
    /// directories.
    pub fn open(data_dir: &Path, config: &NotedeckConfig) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir).map_err(|e| StoreError::io(data_dir, e))?;
        let root = data_dir.canonicalize().map_err(|e| StoreError::io(data_dir, e))?;

        let assets = root.join(&config.assets_dir);
        let trash = root.join(&config.trash_dir);
        for dir in [&assets, &trash] {
            fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        }
        let assets = assets.canonicalize().map_err(|e| StoreError::io(&assets, e))?;
        let trash = trash.canonicalize().map_err(|e| StoreError::io(&trash, e))?;

        Ok(Self {
            root,
            assets,
            trash,
            assets_name: config.assets_dir.clone(),
            trash_name: config.trash_dir.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn assets_root(&self) -> &Path {
        &self.assets
    }

    /// Reject empty, absolute and `..` paths.
    fn relative(&self, path: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(path);
        let normal = !path.is_empty() && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if normal {
            Ok(rel.to_path_buf())
        } else {
            Err(StoreError::OutsideDataDir {
                path: rel.to_path_buf(),
            })
        }
    }

    /// File backing the note at `path`.
    pub fn note_file(&self, path: &str) -> Result<PathBuf, StoreError> {
        let mut file = self.root.join(self.relative(path)?);
        file.as_mut_os_string().push(NOTE_EXT);
        Ok(file)
    }

    fn item_path(&self, path: &str, is_dir: bool) -> Result<PathBuf, StoreError> {
        if is_dir {
            Ok(self.root.join(self.relative(path)?))
        } else {
            self.note_file(path)
        }
    }

    /// Create a note containing an empty heading. Refuses to overwrite.
    pub fn create_note(&mut self, path: &str) -> Result<PathBuf, StoreError> {
        let file = self.note_file(path)?;
        if file.exists() {
            return Err(StoreError::AlreadyExists {
                path: path.to_string(),
            });
        }
        self.write_note(path, NEW_NOTE_TEXT)?;
        Ok(file)
    }

    pub fn create_folder(&mut self, path: &str) -> Result<PathBuf, StoreError> {
        let dir = self.root.join(self.relative(path)?);
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(dir)
    }

    /// Resolve an asset URL (or raw path) to a filesystem path. Relative
    /// paths are taken against the data directory.
    pub fn asset_path(&self, url: &str) -> Result<PathBuf, StoreError> {
        let decoded = parse_asset_url(url)?;
        let path = PathBuf::from(decoded);
        Ok(if path.is_absolute() {
            path
        } else {
            self.root.join(path)
        })
    }

    /// Rename a note or folder. The note's asset directory moves with it and
    /// asset links in the moved notes are rewritten. Returns the number of
    /// rewritten links.
    pub fn rename_item(&mut self, old: &str, new: &str, is_dir: bool) -> Result<usize, StoreError> {
        let from = self.item_path(old, is_dir)?;
        let to = self.item_path(new, is_dir)?;
        if !from.exists() {
            return Err(StoreError::NotFound {
                path: old.to_string(),
            });
        }
        if to.exists() {
            return Err(StoreError::AlreadyExists {
                path: new.to_string(),
            });
        }
        move_path(&from, &to)?;

        let old_assets = self.assets.join(self.relative(old)?);
        let new_assets = self.assets.join(self.relative(new)?);
        if !old_assets.exists() {
            return Ok(0);
        }
        move_path(&old_assets, &new_assets)?;

        let notes = if is_dir {
            let prefix = format!("{new}/");
            self.list_notes()?
                .into_iter()
                .filter(|n| n.starts_with(&prefix))
                .collect()
        } else {
            vec![new.to_string()]
        };

        let mut rewritten = 0;
        for note in notes {
            rewritten += self.relink_note(&note, &old_assets, &new_assets)?;
        }
        tracing::info!(old, new, rewritten, "renamed item");
        Ok(rewritten)
    }

    fn relink_note(&mut self, note: &str, from: &Path, to: &Path) -> Result<usize, StoreError> {
        let text = self.read_note(note)?;
        let (relinked, count) = relink_text(&text, &self.link_prefixes(from), &self.link_prefixes(to));
        if count > 0 {
            self.write_note(note, &relinked)?;
        }
        Ok(count)
    }

    /// Every way a note can spell a link into `dir`: the webview URL forms
    /// (percent-encoded), the raw absolute path, and the data-dir relative
    /// path as a link target. Inline images are plain markdown, so links are
    /// rewritten in the text rather than through the block model.
    fn link_prefixes(&self, dir: &Path) -> Vec<String> {
        let encoded = encode_payload(&format!("{}/", dir.to_string_lossy()));
        let mut prefixes: Vec<String> = ASSET_URL_PREFIXES
            .iter()
            .map(|prefix| format!("{prefix}{encoded}"))
            .collect();
        prefixes.push(format!("{}/", dir.to_string_lossy()));
        if let Ok(rel) = dir.strip_prefix(&self.root) {
            let rel = slash_path(rel);
            prefixes.push(format!("({rel}/"));
            prefixes.push(format!("<{rel}/"));
        }
        prefixes
    }

    fn is_hidden(&self, name: &str) -> bool {
        name.starts_with('.') || name == self.assets_name || name == self.trash_name
    }

    /// Folders and notes, folders first, each level sorted by name.
    pub fn tree(&self) -> Result<Vec<TreeNode>, StoreError> {
        self.scan_dir(Path::new(""))
    }

    fn scan_dir(&self, rel: &Path) -> Result<Vec<TreeNode>, StoreError> {
        let full = self.root.join(rel);
        let entries = fs::read_dir(&full).map_err(|e| StoreError::io(&full, e))?;
        let mut nodes = Vec::new();

        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.is_hidden(&name) {
                continue;
            }
            let is_dir = entry.path().is_dir();
            let display = if is_dir {
                name.clone()
            } else if let Some(stem) = name.strip_suffix(NOTE_EXT) {
                stem.to_string()
            } else {
                continue;
            };

            let next_rel = rel.join(&display);
            nodes.push(TreeNode {
                name: display,
                path: slash_path(&next_rel),
                is_dir,
                children: if is_dir {
                    self.scan_dir(&rel.join(&name))?
                } else {
                    Vec::new()
                },
            });
        }

        nodes.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then(a.name.cmp(&b.name)));
        Ok(nodes)
    }

    /// Every note path in the store, sorted.
    pub fn list_notes(&self) -> Result<Vec<String>, StoreError> {
        let mut notes = Vec::new();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.is_hidden(&e.file_name().to_string_lossy()));

        for entry in walker {
            let entry = entry.map_err(|e| StoreError::io(&self.root, e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            if let Some(note) = slash_path(rel).strip_suffix(NOTE_EXT) {
                notes.push(note.to_string());
            }
        }
        Ok(notes)
    }

    /// Every file under the asset root.
    pub fn list_assets(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.assets).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| StoreError::io(&self.assets, e.into()))?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    /// Remove empty directories under the asset root, deepest first. Returns
    /// how many were removed.
    pub fn prune_empty_asset_dirs(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        for entry in WalkDir::new(&self.assets).min_depth(1).contents_first(true) {
            let entry = entry.map_err(|e| StoreError::io(&self.assets, e.into()))?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let path = entry.path();
            let empty = fs::read_dir(path)
                .map_err(|e| StoreError::io(path, e))?
                .next()
                .is_none();
            if empty {
                fs::remove_dir(path).map_err(|e| StoreError::io(path, e))?;
                tracing::debug!(path = %path.display(), "removed empty asset directory");
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn trash_items(&self) -> Result<Vec<TrashItem>, StoreError> {
        let entries = fs::read_dir(&self.trash).map_err(|e| StoreError::io(&self.trash, e))?;
        let mut items: Vec<TrashItem> = entries
            .flatten()
            .map(|entry| TrashItem {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: entry.path().is_dir(),
            })
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    /// Text of every note in the trash, including notes inside trashed
    /// folders. Their assets stay in place until the trash is emptied.
    pub fn trashed_note_texts(&self) -> Result<Vec<String>, StoreError> {
        let mut texts = Vec::new();
        for entry in WalkDir::new(&self.trash).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| StoreError::io(&self.trash, e.into()))?;
            let is_note = entry.file_name().to_string_lossy().ends_with(NOTE_EXT);
            if entry.file_type().is_file() && is_note {
                let text = fs::read_to_string(entry.path()).map_err(|e| StoreError::io(entry.path(), e))?;
                texts.push(text);
            }
        }
        Ok(texts)
    }

    fn trash_entry(&self, name: &str) -> Result<PathBuf, StoreError> {
        let rel = self.relative(name)?;
        if rel.components().count() != 1 {
            return Err(StoreError::OutsideDataDir { path: rel });
        }
        let path = self.trash.join(rel);
        if !path.exists() {
            return Err(StoreError::NotFound {
                path: name.to_string(),
            });
        }
        Ok(path)
    }

    /// Move a trash entry back to the top of the data directory, dropping
    /// its timestamp suffix. Returns where it landed.
    pub fn restore_trash_item(&mut self, name: &str) -> Result<PathBuf, StoreError> {
        let src = self.trash_entry(name)?;
        let original = restored_name(name);
        let mut target = self.root.join(&original);
        if target.exists() {
            target = self.root.join(format!("{RESTORED_PREFIX}{original}"));
        }
        move_path(&src, &target)?;
        tracing::info!(name, target = %target.display(), "restored from trash");
        Ok(target)
    }

    /// Permanently delete one trash entry.
    pub fn purge_trash_item(&mut self, name: &str) -> Result<(), StoreError> {
        let path = self.trash_entry(name)?;
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(|e| StoreError::io(&path, e))
    }

    /// Permanently delete everything in the trash. Returns the entry count.
    pub fn empty_trash(&mut self) -> Result<usize, StoreError> {
        let count = self.trash_items()?.len();
        fs::remove_dir_all(&self.trash).map_err(|e| StoreError::io(&self.trash, e))?;
        fs::create_dir_all(&self.trash).map_err(|e| StoreError::io(&self.trash, e))?;
        Ok(count)
    }
}

impl AssetStore for FsStore {
    /// Delete a stored asset file. A file that is already gone is fine;
    /// anything outside the asset root is refused.
    fn delete_asset(&mut self, url: &str) -> Result<(), StoreError> {
        let path = self.asset_path(url)?;
        let resolved = match path.canonicalize() {
            Ok(resolved) => resolved,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(url, "asset already gone");
                return Ok(());
            }
            Err(e) => return Err(StoreError::io(path, e)),
        };

        if !resolved.starts_with(&self.root) {
            return Err(StoreError::OutsideDataDir { path: resolved });
        }
        if !resolved.starts_with(&self.assets) || !resolved.is_file() {
            return Err(StoreError::NotAnAsset { path: resolved });
        }

        fs::remove_file(&resolved).map_err(|e| StoreError::io(&resolved, e))?;
        tracing::info!(path = %resolved.display(), "deleted asset");
        Ok(())
    }
}

impl NoteStore for FsStore {
    fn read_note(&self, path: &str) -> Result<String, StoreError> {
        let file = self.note_file(path)?;
        match fs::read_to_string(&file) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(StoreError::io(file, e)),
        }
    }

    fn write_note(&mut self, path: &str, text: &str) -> Result<(), StoreError> {
        let file = self.note_file(path)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        fs::write(&file, text).map_err(|e| StoreError::io(file, e))
    }

    fn upload_asset(&mut self, bytes: &[u8], suggested_name: &str, owner: &str) -> Result<String, StoreError> {
        let dir = self.assets.join(self.relative(owner)?);
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let hash = format!("{:x}", hasher.finalize());
        let file = dir.join(format!("{}_{}", &hash[..HASH_PREFIX_LEN], safe_file_name(suggested_name)));

        fs::write(&file, bytes).map_err(|e| StoreError::io(&file, e))?;
        Ok(file.to_string_lossy().into_owned())
    }

    fn resolve_display_url(&self, stored_path: &str) -> String {
        format!("{DISPLAY_PREFIX}{}", encode_payload(stored_path))
    }

    /// Move a note or folder to the trash as `<stem>_<unix secs><ext>`.
    fn delete_item(&mut self, path: &str, is_dir: bool) -> Result<(), StoreError> {
        let src = self.item_path(path, is_dir)?;
        if !src.exists() {
            return Err(StoreError::NotFound {
                path: path.to_string(),
            });
        }

        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let name = trash_name(&src, is_dir, secs, |candidate| self.trash.join(candidate).exists());
        let target = self.trash.join(&name);
        move_path(&src, &target)?;
        tracing::info!(path, trash = %name, "moved to trash");
        Ok(())
    }
}

/// Strip the URL forms a webview uses for local files, then percent-decode.
/// Raw paths pass through.
pub fn parse_asset_url(url: &str) -> Result<String, StoreError> {
    let raw = ASSET_URL_PREFIXES
        .iter()
        .find_map(|prefix| url.strip_prefix(prefix))
        .unwrap_or(url);
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|e| StoreError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;
    if decoded.is_empty() {
        return Err(StoreError::InvalidUrl {
            url: url.to_string(),
            message: "empty path".into(),
        });
    }
    Ok(decoded.into_owned())
}

/// Normalize a user-supplied note path: `/` separators, no `.md` suffix.
pub fn normalize_note_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let path = path.trim_matches('/');
    path.strip_suffix(NOTE_EXT).unwrap_or(path).to_string()
}

fn trash_name(src: &Path, is_dir: bool, mut secs: u64, taken: impl Fn(&str) -> bool) -> String {
    let lossy = |s: Option<&std::ffi::OsStr>| s.map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let (stem, ext) = if is_dir {
        (lossy(src.file_name()), String::new())
    } else {
        let ext = lossy(src.extension());
        (lossy(src.file_stem()), if ext.is_empty() { ext } else { format!(".{ext}") })
    };
    loop {
        let name = format!("{stem}_{secs}{ext}");
        if !taken(&name) {
            return name;
        }
        secs += 1;
    }
}

/// `todo_1700000000.md` -> `todo.md`, `work_1700000000` -> `work`.
fn restored_name(trash_name: &str) -> String {
    match trash_name.rfind('_') {
        Some(idx) => {
            let (stem, rest) = trash_name.split_at(idx);
            let ext = rest.find('.').map_or("", |dot| &rest[dot..]);
            format!("{stem}{ext}")
        }
        None => trash_name.to_string(),
    }
}

fn safe_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if base.is_empty() { "asset".to_string() } else { base }
}

/// Replace each `from[i]` prefix with `to[i]`. Returns the new text and how
/// many links changed.
fn relink_text(text: &str, from: &[String], to: &[String]) -> (String, usize) {
    let mut text = text.to_string();
    let mut count = 0;
    for (old, new) in from.iter().zip(to) {
        let hits = text.matches(old.as_str()).count();
        if hits > 0 {
            text = text.replace(old.as_str(), new);
            count += hits;
        }
    }
    (text, count)
}

fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn move_path(from: &Path, to: &Path) -> Result<(), StoreError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    fs::rename(from, to).map_err(|e| StoreError::io(from, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notedeck_codec::{Block, Width};
    use pretty_assertions::assert_eq;

    fn open(dir: &tempfile::TempDir) -> FsStore {
        FsStore::open(dir.path(), &NotedeckConfig::default()).unwrap()
    }

    #[test]
    fn missing_note_reads_empty_and_create_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        assert_eq!(store.read_note("nope").unwrap(), "");

        let file = store.create_note("work/todo").unwrap();
        assert!(file.ends_with("work/todo.md"));
        assert_eq!(store.read_note("work/todo").unwrap(), "# ");
        assert!(matches!(
            store.create_note("work/todo"),
            Err(StoreError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn rejects_paths_escaping_the_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        assert!(matches!(store.read_note("../x"), Err(StoreError::OutsideDataDir { .. })));
        assert!(matches!(store.write_note("/etc/x", ""), Err(StoreError::OutsideDataDir { .. })));
        assert!(matches!(store.read_note(""), Err(StoreError::OutsideDataDir { .. })));
    }

    #[test]
    fn upload_resolve_and_delete_asset() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        let stored = store.upload_asset(b"png bytes", "../shot.png", "daily/mon").unwrap();
        assert!(stored.ends_with("_shot.png"));
        assert!(Path::new(&stored).starts_with(store.assets_root().join("daily/mon")));

        let url = store.resolve_display_url(&stored);
        assert!(url.starts_with("asset://localhost/"));
        assert_eq!(store.asset_path(&url).unwrap(), PathBuf::from(&stored));

        store.delete_asset(&url).unwrap();
        assert!(!Path::new(&stored).exists());
        // Already gone is fine.
        store.delete_asset(&url).unwrap();
    }

    #[test]
    fn same_bytes_get_same_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        let a = store.upload_asset(b"same", "a.png", "n").unwrap();
        let b = store.upload_asset(b"same", "a.png", "n").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn delete_asset_refuses_notes_and_outside_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        let note = store.create_note("keep").unwrap();
        assert!(matches!(
            store.delete_asset(&note.to_string_lossy()),
            Err(StoreError::NotAnAsset { .. })
        ));
        assert!(note.exists());

        let outside = tempfile::NamedTempFile::new().unwrap();
        let url = store.resolve_display_url(&outside.path().to_string_lossy());
        assert!(matches!(
            store.delete_asset(&url),
            Err(StoreError::OutsideDataDir { .. })
        ));
        assert!(outside.path().exists());
    }

    #[test]
    fn parse_asset_url_prefixes() {
        assert_eq!(parse_asset_url("asset://localhost/%2Fa%20b.png").unwrap(), "/a b.png");
        assert_eq!(parse_asset_url("http://asset.localhost/%2Fx").unwrap(), "/x");
        assert_eq!(parse_asset_url("https://asset.localhost/%2Fx").unwrap(), "/x");
        assert_eq!(parse_asset_url("asset://%2Fy").unwrap(), "/y");
        assert_eq!(parse_asset_url("assets/raw.png").unwrap(), "assets/raw.png");
        assert!(parse_asset_url("asset://localhost/").is_err());
        assert!(parse_asset_url("asset://localhost/%FF").is_err());
    }

    #[test]
    fn delete_item_moves_to_trash_and_restore_strips_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        store.create_note("todo").unwrap();
        store.delete_item("todo", false).unwrap();
        assert!(!store.note_file("todo").unwrap().exists());

        let items = store.trash_items().unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].name.starts_with("todo_"));
        assert!(items[0].name.ends_with(".md"));

        // A new note took the name meanwhile.
        store.create_note("todo").unwrap();
        let target = store.restore_trash_item(&items[0].name).unwrap();
        assert!(target.ends_with("restored_todo.md"));
        assert!(store.trash_items().unwrap().is_empty());
    }

    #[test]
    fn trash_names_do_not_collide() {
        let taken = |name: &str| name == "a_100.md";
        assert_eq!(trash_name(Path::new("/d/a.md"), false, 100, taken), "a_101.md");
        assert_eq!(trash_name(Path::new("/d/dir.v2"), true, 5, |_| false), "dir.v2_5");
    }

    #[test]
    fn restored_names() {
        assert_eq!(restored_name("todo_1700000000.md"), "todo.md");
        assert_eq!(restored_name("work_1700000000"), "work");
        assert_eq!(restored_name("my_note_17.md"), "my_note.md");
        assert_eq!(restored_name("plain"), "plain");
    }

    #[test]
    fn purge_and_empty_trash() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        store.create_note("a").unwrap();
        store.create_folder("f").unwrap();
        store.delete_item("a", false).unwrap();
        store.delete_item("f", true).unwrap();

        let first = store.trash_items().unwrap()[0].name.clone();
        store.purge_trash_item(&first).unwrap();
        assert_eq!(store.trash_items().unwrap().len(), 1);
        assert!(matches!(store.purge_trash_item("nope"), Err(StoreError::NotFound { .. })));
        assert!(matches!(store.purge_trash_item("../x"), Err(StoreError::OutsideDataDir { .. })));

        assert_eq!(store.empty_trash().unwrap(), 1);
        assert!(store.trash_items().unwrap().is_empty());
    }

    #[test]
    fn rename_moves_assets_and_relinks() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        let stored = store.upload_asset(b"img", "a.png", "old").unwrap();
        let url = store.resolve_display_url(&stored);
        let doc = notedeck_codec::Document::new(vec![Block::image(url.clone(), "a", Width::Pixels(500))]);
        store.write_note("old", &doc.to_markdown()).unwrap();

        let rewritten = store.rename_item("old", "archive/new", false).unwrap();
        assert_eq!(rewritten, 1);
        assert!(!Path::new(&stored).exists());

        let text = store.read_note("archive/new").unwrap();
        assert!(!text.contains(&url));
        let moved = notedeck_codec::deserialize(&text);
        let new_url = moved.referenced_assets().into_iter().next().unwrap();
        let new_path = store.asset_path(&new_url).unwrap();
        assert!(new_path.starts_with(store.assets_root().join("archive/new")));
        assert!(new_path.exists());
    }

    #[test]
    fn rename_relinks_inline_images_in_every_form() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        let stored = store.upload_asset(b"img", "b.png", "old").unwrap();
        let url = store.resolve_display_url(&stored);
        let relative = slash_path(Path::new(&stored).strip_prefix(store.root()).unwrap());
        let text = format!("See ![b|w=16]({url}) inline.\n\nRaw ![b]({stored}) and ![b]({relative}).\n");
        store.write_note("old", &text).unwrap();

        let rewritten = store.rename_item("old", "new", false).unwrap();
        assert_eq!(rewritten, 3);

        let text = store.read_note("new").unwrap();
        assert!(!text.contains(&url));
        assert!(!text.contains(&stored));
        let moved = store.assets_root().join("new").join(Path::new(&stored).file_name().unwrap());
        assert!(moved.exists());
        assert!(text.contains(&store.resolve_display_url(&moved.to_string_lossy())));
        assert!(text.contains(&*moved.to_string_lossy()));
        assert!(text.contains("](assets/new/"));
    }

    #[test]
    fn rename_leaves_sibling_prefixes_alone() {
        let (from, to) = (vec!["/a/old/".to_string()], vec!["/a/new/".to_string()]);
        let (text, count) = relink_text("![x](/a/old/x.png) ![y](/a/old2/y.png)", &from, &to);
        assert_eq!(count, 1);
        assert_eq!(text, "![x](/a/new/x.png) ![y](/a/old2/y.png)");
    }

    #[test]
    fn trashed_notes_are_readable() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        store.write_note("work/a", "alpha").unwrap();
        store.write_note("b", "beta").unwrap();
        store.delete_item("work", true).unwrap();
        store.delete_item("b", false).unwrap();

        let mut texts = store.trashed_note_texts().unwrap();
        texts.sort();
        assert_eq!(texts, vec!["alpha", "beta"]);
    }

    #[test]
    fn rename_refuses_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        store.create_note("a").unwrap();
        store.create_note("b").unwrap();
        assert!(matches!(store.rename_item("a", "b", false), Err(StoreError::AlreadyExists { .. })));
        assert!(matches!(store.rename_item("zz", "c", false), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn tree_lists_folders_first_and_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(&dir);
        store.create_note("zeta").unwrap();
        store.create_note("alpha").unwrap();
        store.create_note("work/plan").unwrap();
        store.upload_asset(b"x", "x.png", "zeta").unwrap();
        fs::write(dir.path().join("readme.txt"), "not a note").unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();

        let tree = store.tree().unwrap();
        let names: Vec<_> = tree.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["work", "alpha", "zeta"]);
        assert_eq!(tree[0].children[0].path, "work/plan");
        assert!(!tree[0].children[0].is_dir);

        assert_eq!(store.list_notes().unwrap(), vec!["alpha", "work/plan", "zeta"]);
    }

    #[test]
    fn prune_removes_nested_empty_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        fs::create_dir_all(store.assets_root().join("a/b/c")).unwrap();
        fs::create_dir_all(store.assets_root().join("keep")).unwrap();
        fs::write(store.assets_root().join("keep/f.png"), "x").unwrap();

        assert_eq!(store.prune_empty_asset_dirs().unwrap(), 3);
        assert!(!store.assets_root().join("a").exists());
        assert!(store.assets_root().join("keep/f.png").exists());
    }

    #[test]
    fn normalizes_note_paths() {
        assert_eq!(normalize_note_path("work\\todo.md"), "work/todo");
        assert_eq!(normalize_note_path("/daily/"), "daily");
    }
}
