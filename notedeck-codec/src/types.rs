use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::payload::encode_payload;

/// Default width of a code block when the fence carries no `|w=` suffix.
pub const DEFAULT_CODE_WIDTH: Width = Width::Full;
/// Default width of a diagram block when the fence carries no `|w=` suffix.
pub const DEFAULT_DIAGRAM_WIDTH: Width = Width::Pixels(500);
/// Default width of an image whose label carries no `|w=` suffix.
pub const DEFAULT_IMAGE_WIDTH: Width = Width::Pixels(500);
/// Default height of code and diagram blocks.
pub const DEFAULT_BLOCK_HEIGHT: u32 = 300;
/// Language assigned to a fenced code block without an info string.
pub const DEFAULT_LANGUAGE: &str = "text";
/// Fence language that turns a code block into a diagram block.
pub const DIAGRAM_LANGUAGE: &str = "mermaid";

/// A note held in memory: an ordered sequence of top-level blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<Block>,
}

/// Opaque block identifier. Assigned by whoever creates the block; the codec
/// never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub String);

impl BlockId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A node in the document's block sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    #[serde(flatten)]
    pub kind: BlockKind,
    /// Nested blocks attached by the editing surface. Passed through opaquely.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Block>,
}

/// Kind-specific block content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlockKind {
    /// Anything the generic markdown transcoder owns (paragraphs, headings,
    /// lists, quotes, tables...). `markdown` is the block's source text.
    Generic { style: GenericKind, markdown: String },
    /// Source code. `text` is percent-encoded.
    Code {
        text: String,
        language: String,
        width: Width,
        height: u32,
    },
    /// LaTeX formula. `text` is percent-encoded.
    Formula { text: String },
    /// Mermaid diagram. `code` is stored raw.
    Diagram { code: String, width: Width, height: u32 },
    /// Reference to a stored image asset.
    Image { url: String, name: String, width: Width },
    /// Reference to a stored file attachment.
    File { name: String, url: String },
}

/// Shape of a generic block, as reported by the transcoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenericKind {
    Paragraph,
    Heading(u8),
    List { ordered: bool },
    Quote,
    Table,
    Rule,
    Html,
    /// A fenced or indented code block the codec did not claim.
    CodeListing,
    Other,
}

/// Display width of a sized block: the full column or a pixel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Width {
    Full,
    Pixels(u32),
}

/// Error returned when a width literal is neither `100%` nor an integer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid width '{0}': expected '100%' or an integer pixel count")]
pub struct InvalidWidth(pub String);

impl FromStr for Width {
    type Err = InvalidWidth;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "100%" {
            return Ok(Width::Full);
        }
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidWidth(s.to_string()));
        }
        s.parse::<u32>()
            .map(Width::Pixels)
            .map_err(|_| InvalidWidth(s.to_string()))
    }
}

impl TryFrom<String> for Width {
    type Error = InvalidWidth;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Width> for String {
    fn from(width: Width) -> Self {
        width.to_string()
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Width::Full => f.write_str("100%"),
            Width::Pixels(px) => write!(f, "{px}"),
        }
    }
}

impl BlockKind {
    /// Short tag naming the kind, as used in serialized JSON.
    pub fn tag(&self) -> &'static str {
        match self {
            BlockKind::Generic { .. } => "generic",
            BlockKind::Code { .. } => "code",
            BlockKind::Formula { .. } => "formula",
            BlockKind::Diagram { .. } => "diagram",
            BlockKind::Image { .. } => "image",
            BlockKind::File { .. } => "file",
        }
    }

    /// The asset URL this block references, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            BlockKind::Image { url, .. } | BlockKind::File { url, .. } => Some(url),
            _ => None,
        }
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, BlockKind::Generic { .. })
    }
}

impl Block {
    pub fn new(kind: BlockKind) -> Self {
        Self {
            id: BlockId::generate(),
            kind,
            children: Vec::new(),
        }
    }

    /// A generic block with the given style and markdown source.
    pub fn generic(style: GenericKind, markdown: impl Into<String>) -> Self {
        Self::new(BlockKind::Generic {
            style,
            markdown: markdown.into(),
        })
    }

    pub fn paragraph(markdown: impl Into<String>) -> Self {
        Self::generic(GenericKind::Paragraph, markdown)
    }

    /// A code block from plain source; the text is percent-encoded here.
    pub fn code(source: &str, language: impl Into<String>, width: Width, height: u32) -> Self {
        Self::new(BlockKind::Code {
            text: encode_payload(source),
            language: language.into(),
            width,
            height,
        })
    }

    /// A formula block from plain LaTeX; the text is percent-encoded here.
    pub fn formula(latex: &str) -> Self {
        Self::new(BlockKind::Formula {
            text: encode_payload(latex),
        })
    }

    pub fn diagram(code: impl Into<String>, width: Width, height: u32) -> Self {
        Self::new(BlockKind::Diagram {
            code: code.into(),
            width,
            height,
        })
    }

    pub fn image(url: impl Into<String>, name: impl Into<String>, width: Width) -> Self {
        Self::new(BlockKind::Image {
            url: url.into(),
            name: name.into(),
            width,
        })
    }

    pub fn file(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(BlockKind::File {
            name: name.into(),
            url: url.into(),
        })
    }

    pub fn with_children(mut self, children: Vec<Block>) -> Self {
        self.children = children;
        self
    }

    /// True for a generic block with no visible content.
    pub fn is_empty_generic(&self) -> bool {
        matches!(&self.kind, BlockKind::Generic { markdown, .. } if markdown.trim().is_empty())
    }
}

/// Where a new block goes relative to an anchor block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Placement {
    /// Replace the anchor when it is an empty generic block, otherwise insert
    /// after it.
    #[default]
    ReplaceIfEmpty,
    After,
    Before,
}

impl Document {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// The single-empty-paragraph document editors start from.
    pub fn empty() -> Self {
        Self {
            blocks: vec![Block::paragraph("")],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn position(&self, id: &BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| &b.id == id)
    }

    /// Insert `block` next to the top-level block `anchor`.
    ///
    /// With no anchor (or an anchor that is not in the document) the block is
    /// appended, replacing a trailing empty paragraph under
    /// [`Placement::ReplaceIfEmpty`]. Returns the index the block landed at.
    pub fn insert_block(&mut self, anchor: Option<&BlockId>, block: Block, placement: Placement) -> usize {
        let anchor_idx = anchor
            .and_then(|id| self.position(id))
            .or_else(|| self.blocks.len().checked_sub(1));

        let Some(idx) = anchor_idx else {
            self.blocks.push(block);
            return 0;
        };

        match placement {
            Placement::ReplaceIfEmpty if self.blocks[idx].is_empty_generic() => {
                self.blocks[idx] = block;
                idx
            }
            Placement::ReplaceIfEmpty | Placement::After => {
                self.blocks.insert(idx + 1, block);
                idx + 1
            }
            Placement::Before => {
                self.blocks.insert(idx, block);
                idx
            }
        }
    }

    /// Remove every block (at any depth) referencing `url`. Returns how many
    /// were removed.
    pub fn remove_asset_blocks(&mut self, url: &str) -> usize {
        remove_matching(&mut self.blocks, url)
    }

    /// Set of non-empty asset URLs referenced anywhere in the document.
    pub fn referenced_assets(&self) -> BTreeSet<String> {
        crate::tracker::referenced_assets(self)
    }
}

fn remove_matching(blocks: &mut Vec<Block>, url: &str) -> usize {
    let before = blocks.len();
    blocks.retain(|b| b.kind.url() != Some(url));
    let mut removed = before - blocks.len();
    for block in blocks.iter_mut() {
        removed += remove_matching(&mut block.children, url);
    }
    removed
}

// ------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------
