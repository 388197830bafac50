use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use notedeck_codec::{Diagnostic, Severity};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod gc;
mod notes;
mod store;
mod watch;

use store::FsStore;

#[derive(Parser)]
#[command(name = "notedeck", version, about = "Markdown notes with embedded code, formulas, diagrams and attachments")]
struct Cli {
    /// Data directory holding notes, assets and trash
    #[arg(long, global = true, env = "NOTEDECK_DATA")]
    data_dir: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum RenderFormat {
    Terminal,
    Markdown,
    Html,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the note tree
    Tree {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a note
    New {
        /// Note path relative to the data directory, e.g. `work/standup`
        path: String,
    },

    /// Create a folder
    Mkdir { path: String },

    /// Show a note in the terminal
    Show { note: String },

    /// Render a markdown file
    Render {
        /// Path to the .md file
        file: String,

        /// Output format
        #[arg(long, value_enum, default_value = "terminal")]
        format: RenderFormat,

        /// Write to a file instead of stdout (HTML becomes a full page)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Re-render whenever the file changes
        #[arg(long)]
        watch: bool,
    },

    /// Validate markdown file(s)
    Validate {
        /// Path to the .md file(s)
        files: Vec<String>,
    },

    /// List the assets a note references
    Assets { note: String },

    /// Upload a file into a note as an image or file block
    Attach {
        note: String,
        file: PathBuf,

        /// Block kind (default: guessed from the extension)
        #[arg(long = "as", value_enum)]
        kind: Option<notes::AttachAs>,
    },

    /// Remove an attachment from a note and delete its stored file
    Detach {
        note: String,
        /// Asset URL or attachment name
        target: String,
    },

    /// Rename or move a note or folder
    Mv {
        from: String,
        to: String,
        /// Treat the paths as folders
        #[arg(long)]
        dir: bool,
    },

    /// Move a note or folder to the trash
    Rm {
        path: String,
        /// Treat the path as a folder
        #[arg(long)]
        dir: bool,
    },

    /// Manage the trash
    Trash {
        #[command(subcommand)]
        command: notes::TrashCommand,
    },

    /// Delete stored assets no note references
    Gc {
        /// Show what would be removed without deleting
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let quiet = cli.quiet;
    let data_dir = config::resolve_data_dir(cli.data_dir.as_deref());

    match cli.command {
        Commands::Render {
            file,
            format,
            out,
            watch,
        } => {
            handle_render(&file, format, out.as_deref())?;
            if watch {
                watch::watch_file(&file, || handle_render(&file, format, out.as_deref()))?;
            }
        }
        Commands::Validate { files } => {
            handle_validate(&files)?;
        }
        command => run_store_command(&data_dir, command, quiet)?,
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_store_command(data_dir: &Path, command: Commands, quiet: bool) -> Result<()> {
    let config = config::load_config(data_dir)?;
    let mut store = FsStore::open(data_dir, &config)?;
    tracing::debug!(root = %store.root().display(), "opened data directory");

    match command {
        Commands::Tree { json } => notes::handle_tree(&store, json),
        Commands::New { path } => notes::handle_new(&mut store, &path, quiet),
        Commands::Mkdir { path } => notes::handle_mkdir(&mut store, &path, quiet),
        Commands::Show { note } => notes::handle_show(&store, &note),
        Commands::Assets { note } => notes::handle_assets(&store, &note),
        Commands::Attach { note, file, kind } => {
            notes::handle_attach(&mut store, config.placement, &note, &file, kind, quiet)
        }
        Commands::Detach { note, target } => notes::handle_detach(&mut store, &note, &target, quiet),
        Commands::Mv { from, to, dir } => notes::handle_mv(&mut store, &from, &to, dir, quiet),
        Commands::Rm { path, dir } => notes::handle_rm(&mut store, &path, dir, quiet),
        Commands::Trash { command } => notes::handle_trash(&mut store, command, quiet),
        Commands::Gc { dry_run } => gc::handle_gc(&mut store, dry_run, quiet),
        Commands::Render { .. } | Commands::Validate { .. } => Ok(()),
    }
}

fn handle_render(file: &str, format: RenderFormat, out: Option<&Path>) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("Failed to read '{}': {}", file, e))?;

    let result = notedeck_codec::deserialize_with_diagnostics(&content);

    // Print decode diagnostics to stderr
    for diag in &result.diagnostics {
        eprintln!("{}: {}", location(file, diag), diag.message);
    }

    let output = match format {
        RenderFormat::Terminal => result.doc.to_terminal(),
        RenderFormat::Markdown => result.doc.to_markdown(),
        RenderFormat::Html if out.is_some() => {
            let title = Path::new(file)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "note".to_string());
            result.doc.to_html_page(&title)
        }
        RenderFormat::Html => result.doc.to_html(),
        RenderFormat::Json => serde_json::to_string_pretty(&result.doc)?,
    };

    match out {
        Some(path) => {
            std::fs::write(path, &output)
                .map_err(|e| anyhow::anyhow!("Failed to write '{}': {}", path.display(), e))?;
            eprintln!("{} {}", "Wrote".green().bold(), path.display());
        }
        None if output.ends_with('\n') => print!("{output}"),
        None => println!("{output}"),
    }
    Ok(())
}

fn handle_validate(files: &[String]) -> Result<()> {
    let mut has_errors = false;

    for file in files {
        let content = std::fs::read_to_string(file)
            .map_err(|e| anyhow::anyhow!("Failed to read '{}': {}", file, e))?;

        let result = notedeck_codec::deserialize_with_diagnostics(&content);

        // Combine decode diagnostics with validation diagnostics
        let mut all_diagnostics = result.diagnostics;
        all_diagnostics.extend(result.doc.validate());

        if all_diagnostics.is_empty() {
            println!("{}: {}", file, "OK".green());
            continue;
        }

        for diag in &all_diagnostics {
            let severity_str = match diag.severity {
                Severity::Error => {
                    has_errors = true;
                    format!("{}", "error".red().bold())
                }
                Severity::Warning => format!("{}", "warning".yellow().bold()),
                Severity::Info => format!("{}", "info".cyan().bold()),
            };

            let code_str = match &diag.code {
                Some(c) => format!("[{}] ", c),
                None => String::new(),
            };

            println!("{}: {severity_str}: {code_str}{}", location(file, diag), diag.message);
        }
    }

    if has_errors {
        std::process::exit(1);
    }

    Ok(())
}

fn location(file: &str, diag: &Diagnostic) -> String {
    match diag.block {
        Some(idx) => format!("{}: block {}", file, idx),
        None => file.to_string(),
    }
}
