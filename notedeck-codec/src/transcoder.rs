//! Generic markdown transcoder.
//!
//! Ordinary blocks (paragraphs, headings, lists, quotes, tables...) are owned
//! by a [`MarkdownTranscoder`]. The codec hands it contiguous runs of generic
//! blocks on save and the placeholder-protected text on load.
//!
//! [`CommonMarkTranscoder`] is the default implementation. It splits text
//! into top-level blocks with `pulldown-cmark`'s offset iterator and keeps
//! each block's source markdown verbatim, so unchanged blocks round-trip
//! byte for byte.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};

use crate::types::{Block, BlockKind, GenericKind};

/// Converts between generic blocks and markdown text.
pub trait MarkdownTranscoder {
    /// Render generic blocks as markdown. Non-generic blocks are skipped.
    fn blocks_to_text(&self, blocks: &[Block]) -> String;

    /// Split markdown into generic blocks.
    fn text_to_blocks(&self, text: &str) -> Vec<Block>;
}

/// CommonMark + GFM tables/strikethrough/task lists, via `pulldown-cmark`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonMarkTranscoder;

pub(crate) fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

impl MarkdownTranscoder for CommonMarkTranscoder {
    fn blocks_to_text(&self, blocks: &[Block]) -> String {
        let mut out = String::new();
        let mut previous: Option<(GenericKind, &str)> = None;

        for block in blocks {
            let BlockKind::Generic { style, markdown } = &block.kind else {
                continue;
            };
            let markdown = trim_newlines(markdown);
            if let Some((prev_style, prev_markdown)) = previous {
                out.push_str("\n\n");
                if lists_would_merge(prev_style, prev_markdown, *style, markdown) {
                    out.push_str(LIST_SEPARATOR);
                    out.push_str("\n\n");
                }
            }
            out.push_str(markdown);
            previous = Some((*style, markdown));
        }
        out
    }

    fn text_to_blocks(&self, text: &str) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut depth = 0usize;
        // End of the last top-level block; text between blocks that is not
        // whitespace (link reference definitions) is kept as an `Other` block.
        let mut cursor = 0usize;

        for (event, range) in Parser::new_ext(text, markdown_options()).into_offset_iter() {
            match event {
                Event::Start(tag) => {
                    if depth == 0 {
                        let start = line_start(text, cursor, range.start);
                        push_gap(text, cursor, start, &mut blocks);
                        let source = trim_newlines(&text[start..range.end]);
                        if !is_list_separator(&tag, source, &blocks) {
                            blocks.push(Block::generic(generic_kind(&tag), source));
                        }
                        cursor = range.end;
                    }
                    depth += 1;
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                }
                Event::Rule if depth == 0 => {
                    let start = line_start(text, cursor, range.start);
                    push_gap(text, cursor, start, &mut blocks);
                    blocks.push(Block::generic(GenericKind::Rule, trim_newlines(&text[start..range.end])));
                    cursor = range.end;
                }
                Event::Html(_) if depth == 0 => {
                    let start = line_start(text, cursor, range.start);
                    push_gap(text, cursor, start, &mut blocks);
                    blocks.push(Block::generic(GenericKind::Html, trim_newlines(&text[start..range.end])));
                    cursor = range.end;
                }
                _ => {}
            }
        }
        push_gap(text, cursor, text.len(), &mut blocks);

        blocks
    }
}

/// Written between two adjacent lists that CommonMark would otherwise read
/// back as one list.
const LIST_SEPARATOR: &str = "<!-- -->";

/// Two lists separated only by a blank line continue each other when they
/// share a type and marker (`-`, `*`, `+`, or `.`/`)` after a number).
fn lists_would_merge(prev: GenericKind, prev_src: &str, next: GenericKind, next_src: &str) -> bool {
    match (prev, next) {
        (GenericKind::List { ordered: a }, GenericKind::List { ordered: b }) if a == b => {
            list_marker(prev_src).is_some() && list_marker(prev_src) == list_marker(next_src)
        }
        _ => false,
    }
}

fn list_marker(source: &str) -> Option<char> {
    let item = source.trim_start();
    let after_digits = item.trim_start_matches(|c: char| c.is_ascii_digit());
    if after_digits.len() != item.len() {
        after_digits.chars().next().filter(|c| matches!(c, '.' | ')'))
    } else {
        item.chars().next().filter(|c| matches!(c, '-' | '*' | '+'))
    }
}

/// An empty comment right after a list is the separator `blocks_to_text`
/// writes; it is not a block of its own.
fn is_list_separator(tag: &Tag<'_>, source: &str, blocks: &[Block]) -> bool {
    matches!(tag, Tag::HtmlBlock)
        && source.trim() == LIST_SEPARATOR
        && matches!(
            blocks.last().map(|b| &b.kind),
            Some(BlockKind::Generic { style: GenericKind::List { .. }, .. })
        )
}

/// Widen `start` back to the beginning of its line when only indentation
/// precedes it, so leading spaces stay with the block.
fn line_start(text: &str, floor: usize, start: usize) -> usize {
    if start <= floor {
        return start;
    }
    let line_begin = text[..start].rfind('\n').map_or(0, |i| i + 1).max(floor);
    if text[line_begin..start].bytes().all(|b| b == b' ' || b == b'\t') {
        line_begin
    } else {
        start
    }
}

fn push_gap(text: &str, start: usize, end: usize, blocks: &mut Vec<Block>) {
    if start >= end {
        return;
    }
    let gap = text[start..end].trim();
    if !gap.is_empty() {
        blocks.push(Block::generic(GenericKind::Other, gap));
    }
}

fn generic_kind(tag: &Tag<'_>) -> GenericKind {
    match tag {
        Tag::Paragraph => GenericKind::Paragraph,
        Tag::Heading { level, .. } => GenericKind::Heading(heading_level(*level)),
        Tag::List(start) => GenericKind::List {
            ordered: start.is_some(),
        },
        Tag::BlockQuote(_) => GenericKind::Quote,
        Tag::Table(_) => GenericKind::Table,
        Tag::HtmlBlock => GenericKind::Html,
        Tag::CodeBlock(CodeBlockKind::Fenced(_) | CodeBlockKind::Indented) => GenericKind::CodeListing,
        _ => GenericKind::Other,
    }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn trim_newlines(s: &str) -> &str {
    s.trim_end_matches(['\n', '\r'])
}

// ------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------
