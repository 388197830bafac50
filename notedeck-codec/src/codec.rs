//! Document codec: `Document` <-> notedeck markdown dialect.
//!
//! Custom blocks are written with fixed templates:
//!
//! - code: a fence opened with `` ```rust|w=100%|h=300 ``
//! - diagram: a fence opened with `` ```mermaid|w=500|h=300 ``
//! - formula: `$$` lines around the LaTeX source
//! - image: `![name|w=500](url)`
//! - file attachment: `[FILE:name](url)`
//!
//! Loading runs in two phases. First every custom span is cut out of the text
//! and replaced by an opaque token (`@@CODE_BLOCK_ID_0@@`, `@@LATEX_ID_1@@`,
//! ...) recorded in a side table; the token alphabet (`@`, ASCII letters,
//! digits, `_` inside a word) carries no markdown meaning. Then the generic
//! transcoder parses what is left, and every paragraph consisting of exactly
//! one token is swapped for the block recorded under it. Tokens that land
//! anywhere else are put back as their original source text.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::{Diagnostic, Severity};
use crate::payload::{decode_payload_lossy, encode_payload};
use crate::transcoder::{CommonMarkTranscoder, MarkdownTranscoder};
use crate::types::{
    Block, BlockKind, DEFAULT_BLOCK_HEIGHT, DEFAULT_CODE_WIDTH, DEFAULT_DIAGRAM_WIDTH,
    DEFAULT_IMAGE_WIDTH, DEFAULT_LANGUAGE, DIAGRAM_LANGUAGE, Document, GenericKind, Width,
};

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^```([^\s|`]*)(?:\|w=(100%|\d+))?(?:\|h=(\d+))?[ \t]*\n(?:([\s\S]*?)\n)?```[ \t]*$",
    )
    .expect("code fence pattern is valid")
});

static FORMULA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\$\$[ \t]*\n(?:([\s\S]*?)\n)?\$\$[ \t]*$").expect("formula pattern is valid")
});

static IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[([^\]\n]*)\]\((?:<([^>\n]*)>|([^)\s]*))\)").expect("image pattern is valid")
});

static FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[FILE:([^\]\n]*)\]\((?:<([^>\n]*)>|([^)\s]*))\)").expect("file pattern is valid")
});

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\n\n)?(@@(?:CODE_BLOCK|LATEX|IMAGE|FILE)_ID_\d+@@)(\n\n)?")
        .expect("token pattern is valid")
});

/// Leftover fence or formula syntax the decoder could not claim.
static STRAY_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^```[^\s`]*\|[^\n]*$").expect("stray fence pattern is valid")
});
static STRAY_FORMULA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\$\$[ \t]*$").expect("stray formula pattern is valid"));

/// Result of decoding note text.
#[derive(Debug, Clone)]
pub struct DecodeResult {
    /// The decoded document. Never empty.
    pub doc: Document,
    /// Non-fatal notes about custom syntax that was kept as plain markdown.
    pub diagnostics: Vec<Diagnostic>,
}

/// Converts documents to and from the notedeck markdown dialect, delegating
/// ordinary blocks to a [`MarkdownTranscoder`].
#[derive(Debug, Clone, Default)]
pub struct Codec<T = CommonMarkTranscoder> {
    transcoder: T,
}

impl<T: MarkdownTranscoder> Codec<T> {
    pub fn new(transcoder: T) -> Self {
        Self { transcoder }
    }

    pub fn transcoder(&self) -> &T {
        &self.transcoder
    }

    /// Serialize a document to note text.
    ///
    /// Deterministic and total. Runs of generic blocks go through the
    /// transcoder; custom blocks use their fixed templates. Segments are
    /// separated by one blank line and the text ends with a newline.
    pub fn serialize(&self, doc: &Document) -> String {
        let segments = self.serialize_blocks(&doc.blocks);
        if segments.is_empty() {
            return String::new();
        }
        let mut out = segments.join("\n\n");
        out.push('\n');
        out
    }

    fn serialize_blocks(&self, blocks: &[Block]) -> Vec<String> {
        let mut segments = Vec::new();
        let mut pending: Vec<Block> = Vec::new();

        for block in blocks {
            if block.kind.is_generic() {
                pending.push(Block {
                    children: Vec::new(),
                    ..block.clone()
                });
                if block.children.is_empty() {
                    continue;
                }
                self.flush(&mut pending, &mut segments);
            } else {
                self.flush(&mut pending, &mut segments);
                segments.push(render_custom(&block.kind));
            }

            if !block.children.is_empty() {
                let nested = self.serialize_blocks(&block.children).join("\n\n");
                if !nested.is_empty() {
                    segments.push(indent(&nested, "  "));
                }
            }
        }
        self.flush(&mut pending, &mut segments);

        segments
    }

    fn flush(&self, pending: &mut Vec<Block>, segments: &mut Vec<String>) {
        if pending.is_empty() {
            return;
        }
        let text = self.transcoder.blocks_to_text(pending);
        pending.clear();
        if !text.trim().is_empty() {
            segments.push(text);
        }
    }

    /// Deserialize note text into a document.
    pub fn deserialize(&self, text: &str) -> Document {
        self.deserialize_with_diagnostics(text).doc
    }

    /// Deserialize note text, also reporting custom syntax that was not
    /// recognised and fell through to plain markdown.
    pub fn deserialize_with_diagnostics(&self, text: &str) -> DecodeResult {
        let normalised = text.replace("\r\n", "\n");
        let mut table = TokenTable::default();

        // Order matters: fenced code first so nothing inside a fence is
        // mistaken for a formula, image or attachment.
        let protected = CODE_FENCE.replace_all(&normalised, |caps: &Captures| {
            let source = caps[0].to_string();
            let kind = code_block_kind(caps);
            table.insert("CODE_BLOCK", source, kind, true)
        });

        let protected = FORMULA.replace_all(&protected, |caps: &Captures| {
            let body = table.restore(caps.get(1).map_or("", |m| m.as_str()));
            let source = table.restore(&caps[0]);
            let kind = BlockKind::Formula {
                text: encode_payload(&body),
            };
            table.insert("LATEX", source, kind, true)
        });

        let protected = IMAGE.replace_all(&protected, |caps: &Captures| {
            let (name, width) = split_image_label(&caps[1]);
            let kind = BlockKind::Image {
                url: captured_url(caps).to_string(),
                name,
                width,
            };
            table.insert("IMAGE", caps[0].to_string(), kind, false)
        });

        let protected = FILE.replace_all(&protected, |caps: &Captures| {
            let kind = BlockKind::File {
                name: caps[1].to_string(),
                url: captured_url(caps).to_string(),
            };
            table.insert("FILE", caps[0].to_string(), kind, false)
        });

        let diagnostics = stray_syntax(&protected);

        let mut blocks: Vec<Block> = self
            .transcoder
            .text_to_blocks(&protected)
            .into_iter()
            .map(|block| table.materialise(block))
            .collect();

        if blocks.is_empty() {
            blocks.push(Block::paragraph(""));
        }

        DecodeResult {
            doc: Document::new(blocks),
            diagnostics,
        }
    }
}

/// Serialize with the default CommonMark transcoder.
pub fn serialize(doc: &Document) -> String {
    Codec::<CommonMarkTranscoder>::default().serialize(doc)
}

/// Deserialize with the default CommonMark transcoder.
pub fn deserialize(text: &str) -> Document {
    Codec::<CommonMarkTranscoder>::default().deserialize(text)
}

/// Deserialize with the default CommonMark transcoder, keeping diagnostics.
pub fn deserialize_with_diagnostics(text: &str) -> DecodeResult {
    Codec::<CommonMarkTranscoder>::default().deserialize_with_diagnostics(text)
}

// ------------------------------------------------------------------
// Templates
// ------------------------------------------------------------------

fn render_custom(kind: &BlockKind) -> String {
    match kind {
        BlockKind::Code {
            text,
            language,
            width,
            height,
        } => {
            let body = decode_payload_lossy(text);
            let language = fence_language(language);
            format!("```{language}|w={width}|h={height}\n{body}\n```")
        }
        BlockKind::Diagram { code, width, height } => {
            format!("```{DIAGRAM_LANGUAGE}|w={width}|h={height}\n{code}\n```")
        }
        BlockKind::Formula { text } => {
            let body = decode_payload_lossy(text);
            format!("$$\n{body}\n$$")
        }
        BlockKind::Image { url, name, width } => {
            format!("![{}|w={width}]({})", sanitize_label(name), link_target(url))
        }
        BlockKind::File { name, url } => {
            format!("[FILE:{}]({})", sanitize_label(name), link_target(url))
        }
        BlockKind::Generic { markdown, .. } => markdown.clone(),
    }
}

/// The language tag as it can appear in a fence header. An empty tag is
/// written as the default language (what a bare fence decodes to); spaces,
/// backticks and pipes would end the tag early and become `-`.
pub fn fence_language(language: &str) -> Cow<'_, str> {
    if language.is_empty() {
        return Cow::Borrowed(DEFAULT_LANGUAGE);
    }
    if language.chars().any(|c| c.is_whitespace() || c == '|' || c == '`') {
        return Cow::Owned(
            language
                .chars()
                .map(|c| if c.is_whitespace() || c == '|' || c == '`' { '-' } else { c })
                .collect(),
        );
    }
    Cow::Borrowed(language)
}

/// Make a display label safe inside `[...]`: pipes would split off a bogus
/// width field, brackets and newlines would end the label early.
pub fn sanitize_label(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '|' | '[' | ']' => '_',
            '\n' | '\r' => ' ',
            other => other,
        })
        .collect()
}

/// Link destinations with spaces or parentheses use the `<...>` form.
fn link_target(url: &str) -> String {
    if url.chars().any(|c| c.is_whitespace() || c == '(' || c == ')') {
        format!("<{url}>")
    } else {
        url.to_string()
    }
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ------------------------------------------------------------------
// Decoding helpers
// ------------------------------------------------------------------

fn code_block_kind(caps: &Captures) -> BlockKind {
    let language = caps.get(1).map_or("", |m| m.as_str());
    let explicit_width = caps.get(2).and_then(|m| m.as_str().parse::<Width>().ok());
    let height = caps
        .get(3)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .unwrap_or(DEFAULT_BLOCK_HEIGHT);
    let body = caps.get(4).map_or("", |m| m.as_str());

    if language == DIAGRAM_LANGUAGE {
        BlockKind::Diagram {
            code: body.to_string(),
            width: explicit_width.unwrap_or(DEFAULT_DIAGRAM_WIDTH),
            height,
        }
    } else {
        BlockKind::Code {
            text: encode_payload(body),
            language: if language.is_empty() {
                DEFAULT_LANGUAGE.to_string()
            } else {
                language.to_string()
            },
            width: explicit_width.unwrap_or(DEFAULT_CODE_WIDTH),
            height,
        }
    }
}

/// Split `name|w=320` into the name and its width override.
fn split_image_label(label: &str) -> (String, Width) {
    match label.rsplit_once("|w=") {
        Some((name, width)) => match width.parse::<Width>() {
            Ok(width) => (name.to_string(), width),
            Err(_) => (label.to_string(), DEFAULT_IMAGE_WIDTH),
        },
        None => (label.to_string(), DEFAULT_IMAGE_WIDTH),
    }
}

fn captured_url<'t>(caps: &Captures<'t>) -> &'t str {
    caps.get(2)
        .or_else(|| caps.get(3))
        .map_or("", |m| m.as_str())
}

fn stray_syntax(protected: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for m in STRAY_FENCE.find_iter(protected) {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            message: format!(
                "Code fence '{}' has an unrecognised suffix; kept as plain markdown",
                m.as_str().trim()
            ),
            block: None,
            code: Some("D001".into()),
        });
    }
    if STRAY_FORMULA.is_match(protected) {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            message: "Unmatched '$$' formula delimiter; kept as plain markdown".into(),
            block: None,
            code: Some("D002".into()),
        });
    }
    diagnostics
}

// ------------------------------------------------------------------
// Token side table
// ------------------------------------------------------------------

struct Captured {
    /// Original source text the token replaced.
    source: String,
    kind: BlockKind,
    /// Block-level tokens are padded with blank lines so the transcoder sees
    /// them as paragraphs of their own.
    padded: bool,
}

/// Tokens issued during one decode call. The counter is scoped to the call.
#[derive(Default)]
struct TokenTable {
    next: usize,
    entries: HashMap<String, Captured>,
}

impl TokenTable {
    fn insert(&mut self, prefix: &str, source: String, kind: BlockKind, padded: bool) -> String {
        let token = format!("@@{prefix}_ID_{}@@", self.next);
        self.next += 1;
        let replacement = if padded {
            format!("\n\n{token}\n\n")
        } else {
            token.clone()
        };
        self.entries.insert(
            token,
            Captured {
                source,
                kind,
                padded,
            },
        );
        replacement
    }

    /// Put original source text back in place of any known token.
    fn restore(&self, text: &str) -> String {
        if !text.contains("@@") {
            return text.to_string();
        }
        TOKEN
            .replace_all(text, |caps: &Captures| {
                let before = caps.get(1).map_or("", |m| m.as_str());
                let after = caps.get(3).map_or("", |m| m.as_str());
                match self.entries.get(&caps[2]) {
                    Some(entry) if entry.padded => entry.source.clone(),
                    Some(entry) => format!("{before}{}{after}", entry.source),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Swap a token-only paragraph for its recorded block; restore tokens
    /// anywhere else.
    fn materialise(&mut self, mut block: Block) -> Block {
        let recorded = match &block.kind {
            BlockKind::Generic {
                style: GenericKind::Paragraph,
                markdown,
            } => self.entries.remove(markdown.trim()),
            BlockKind::Generic { .. } => None,
            _ => return block,
        };

        if let Some(entry) = recorded {
            block.kind = entry.kind;
        } else if let BlockKind::Generic { markdown, .. } = &mut block.kind {
            *markdown = self.restore(markdown);
        }
        block
    }
}

// ------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------
