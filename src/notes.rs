//! Note-tree commands: create, list, show, attach, detach, move, delete and
//! the trash.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use notedeck_codec::{AttachmentKind, Block, BlockKind, NoteSession, NoteStore, Placement};
use std::path::Path;

use crate::store::{FsStore, TreeNode, normalize_note_path};

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum AttachAs {
    Image,
    File,
}

impl From<AttachAs> for AttachmentKind {
    fn from(kind: AttachAs) -> Self {
        match kind {
            AttachAs::Image => AttachmentKind::Image,
            AttachAs::File => AttachmentKind::File,
        }
    }
}

#[derive(clap::Subcommand)]
pub enum TrashCommand {
    /// List trashed notes and folders
    List,
    /// Move a trash entry back into the data directory
    Restore {
        /// Entry name as shown by `trash list`
        name: String,
    },
    /// Permanently delete one trash entry
    Purge { name: String },
    /// Permanently delete everything in the trash
    Empty,
}

pub fn handle_tree(store: &FsStore, json: bool) -> Result<()> {
    let tree = store.tree()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
        return Ok(());
    }
    if tree.is_empty() {
        println!("{}", "(no notes)".dimmed());
    }
    print_tree(&tree, 0);
    Ok(())
}

fn print_tree(nodes: &[TreeNode], depth: usize) {
    let indent = "  ".repeat(depth);
    for node in nodes {
        if node.is_dir {
            println!("{indent}{}/", node.name.blue().bold());
            print_tree(&node.children, depth + 1);
        } else {
            println!("{indent}{}", node.name);
        }
    }
}

pub fn handle_new(store: &mut FsStore, path: &str, quiet: bool) -> Result<()> {
    let path = normalize_note_path(path);
    let file = store.create_note(&path)?;
    if !quiet {
        println!("{} {}", "Created".green().bold(), file.display());
    }
    Ok(())
}

pub fn handle_mkdir(store: &mut FsStore, path: &str, quiet: bool) -> Result<()> {
    let dir = store.create_folder(&normalize_note_path(path))?;
    if !quiet {
        println!("{} {}", "Created".green().bold(), dir.display());
    }
    Ok(())
}

pub fn handle_show(store: &FsStore, note: &str) -> Result<()> {
    let note = normalize_note_path(note);
    let file = require_note(store, &note)?;
    let text = store.read_note(&note)?;

    let result = notedeck_codec::deserialize_with_diagnostics(&text);
    for diag in &result.diagnostics {
        let block_info = match diag.block {
            Some(idx) => format!("{}: block {}", file.display(), idx),
            None => file.display().to_string(),
        };
        eprintln!("{}: {}", block_info, diag.message);
    }

    println!("{}", result.doc.to_terminal());
    Ok(())
}

pub fn handle_assets(store: &FsStore, note: &str) -> Result<()> {
    let note = normalize_note_path(note);
    require_note(store, &note)?;
    let doc = notedeck_codec::deserialize(&store.read_note(&note)?);

    let urls = doc.referenced_assets();
    if urls.is_empty() {
        println!("{}", "(no assets)".dimmed());
    }
    for url in urls {
        let exists = store.asset_path(&url).is_ok_and(|p| p.is_file());
        let status = if exists { "ok".green() } else { "missing".red() };
        println!("{url}  {status}");
    }
    Ok(())
}

pub fn handle_attach(
    store: &mut FsStore,
    placement: Placement,
    note: &str,
    file: &Path,
    kind: Option<AttachAs>,
    quiet: bool,
) -> Result<()> {
    let note = normalize_note_path(note);
    require_note(store, &note)?;

    let bytes = std::fs::read(file)
        .map_err(|e| anyhow::anyhow!("Failed to read '{}': {}", file.display(), e))?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("'{}' has no file name", file.display()))?;
    let kind = kind.map_or_else(|| AttachmentKind::from_name(&name), AttachmentKind::from);

    let mut session = NoteSession::new(&mut *store).with_placement(placement);
    session.load(&note)?;
    let id = session.insert_attachment(&bytes, &name, kind, None)?;
    session.save()?;

    let url = session
        .document()
        .blocks
        .iter()
        .find(|b| b.id == id)
        .and_then(|b| b.kind.url())
        .unwrap_or_default()
        .to_string();
    if quiet {
        println!("{url}");
    } else {
        println!("{} {} -> {}", "Attached".green().bold(), name, url);
    }
    Ok(())
}

/// Remove the blocks showing an asset (matched by URL or by name) and let
/// the save reconcile delete the stored file.
pub fn handle_detach(store: &mut FsStore, note: &str, target: &str, quiet: bool) -> Result<()> {
    let note = normalize_note_path(note);
    require_note(store, &note)?;

    let mut session = NoteSession::new(&mut *store);
    session.load(&note)?;

    let Some(url) = find_asset(&session.document().blocks, target) else {
        bail!("No asset '{}' in note '{}'", target, note);
    };
    let removed = session.edit(|doc| doc.remove_asset_blocks(&url));
    let outcome = session.save()?;

    if !quiet {
        println!(
            "{} {} block(s) referencing {}",
            "Removed".green().bold(),
            removed,
            url
        );
        for deleted in &outcome.deleted {
            println!("  {} {}", "Deleted".yellow(), deleted);
        }
    }
    for (url, error) in &outcome.failed {
        eprintln!("  {} {}: {}", "Failed to delete".red(), url, error);
    }
    Ok(())
}

fn find_asset(blocks: &[Block], target: &str) -> Option<String> {
    blocks.iter().find_map(|block| {
        let hit = match &block.kind {
            BlockKind::Image { url, name, .. } | BlockKind::File { url, name } => {
                (url == target || name == target).then(|| url.clone())
            }
            _ => None,
        };
        hit.or_else(|| find_asset(&block.children, target))
    })
}

pub fn handle_mv(store: &mut FsStore, from: &str, to: &str, is_dir: bool, quiet: bool) -> Result<()> {
    let from = normalize_note_path(from);
    let to = normalize_note_path(to);
    let relinked = store.rename_item(&from, &to, is_dir)?;
    if !quiet {
        println!("{} {} -> {}", "Moved".green().bold(), from, to);
        if relinked > 0 {
            println!("  {} {} asset link(s)", "Updated".cyan(), relinked);
        }
    }
    Ok(())
}

pub fn handle_rm(store: &mut FsStore, path: &str, is_dir: bool, quiet: bool) -> Result<()> {
    let path = normalize_note_path(path);
    let mut session = NoteSession::new(&mut *store);
    session.delete_note(&path, is_dir)?;
    if !quiet {
        println!("{} {} to trash", "Moved".green().bold(), path);
    }
    Ok(())
}

pub fn handle_trash(store: &mut FsStore, command: TrashCommand, quiet: bool) -> Result<()> {
    match command {
        TrashCommand::List => {
            let items = store.trash_items()?;
            if items.is_empty() {
                println!("{}", "(trash is empty)".dimmed());
            }
            for item in items {
                let suffix = if item.is_dir { "/" } else { "" };
                println!("{}{}", item.name, suffix);
            }
        }
        TrashCommand::Restore { name } => {
            let target = store.restore_trash_item(&name)?;
            if !quiet {
                println!("{} {}", "Restored".green().bold(), target.display());
            }
        }
        TrashCommand::Purge { name } => {
            store.purge_trash_item(&name)?;
            if !quiet {
                println!("{} {}", "Purged".green().bold(), name);
            }
        }
        TrashCommand::Empty => {
            let count = store.empty_trash()?;
            if !quiet {
                println!("{} {} item(s)", "Purged".green().bold(), count);
            }
        }
    }
    Ok(())
}

fn require_note(store: &FsStore, note: &str) -> Result<std::path::PathBuf> {
    let file = store.note_file(note)?;
    if !file.is_file() {
        bail!("Note '{}' does not exist", note);
    }
    Ok(file)
}
