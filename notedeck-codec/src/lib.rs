//! `notedeck-codec`: block documents for the notedeck note editor.
//!
//! A note is a sequence of typed blocks: ordinary markdown plus code,
//! formula, diagram, image and file-attachment blocks. This crate converts
//! between that block model and the markdown dialect notes are stored in,
//! and tracks which stored assets a note still references so orphaned ones
//! can be deleted on save.
//!
//! # Quick start
//!
//! ```
//! use notedeck_codec::{Block, Document, Width};
//!
//! let doc = notedeck_codec::deserialize("# Hello\n\n$$\nx^2\n$$\n");
//! assert_eq!(doc.blocks.len(), 2);
//! assert_eq!(doc.blocks[1].kind.tag(), "formula");
//!
//! let mut doc = doc;
//! doc.blocks.push(Block::image("asset://localhost/cat.png", "cat", Width::Pixels(320)));
//! assert!(doc.to_markdown().ends_with("![cat|w=320](asset://localhost/cat.png)\n"));
//! ```

pub mod codec;
pub mod error;
pub mod payload;
pub mod render_html;
#[cfg(feature = "terminal")]
pub mod render_term;
pub mod session;
pub mod store;
pub mod tracker;
pub mod transcoder;
pub mod types;
pub mod validate;

pub use codec::{Codec, DecodeResult, deserialize, deserialize_with_diagnostics, serialize};
pub use error::*;
pub use session::{AttachmentKind, NoteSession};
pub use store::{AssetStore, MemoryStore, NoteStore};
pub use tracker::{AssetTracker, Reconciliation, referenced_assets};
pub use transcoder::{CommonMarkTranscoder, MarkdownTranscoder};
pub use types::*;

impl Document {
    /// Serialize this document to note text with the default transcoder.
    pub fn to_markdown(&self) -> String {
        codec::serialize(self)
    }

    /// Render this document as an HTML fragment with `notedeck-*` CSS classes.
    pub fn to_html(&self) -> String {
        render_html::to_html(self)
    }

    /// Render this document as a complete HTML page.
    pub fn to_html_page(&self, title: &str) -> String {
        render_html::to_html_page(self, title)
    }

    /// Render this document as ANSI-colored terminal text.
    #[cfg(feature = "terminal")]
    pub fn to_terminal(&self) -> String {
        render_term::to_terminal(self)
    }

    /// Validate this document and return any diagnostics.
    pub fn validate(&self) -> Vec<crate::error::Diagnostic> {
        validate::validate(self)
    }
}
