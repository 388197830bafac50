//! Consistency checks for in-memory documents.
//!
//! Flags block fields that would not survive a save/load cycle unchanged, or
//! that an editing surface cannot render. Returns a list of `Diagnostic`
//! items (non-fatal).

use crate::codec::{fence_language, sanitize_label};
use crate::error::{Diagnostic, Severity};
use crate::payload::{decode_payload_lossy, is_canonical};
use crate::types::{Block, BlockKind, Document, Width};

/// Validate a document and return any diagnostics.
///
/// Nested children are checked too; their diagnostics point at the index of
/// the top-level block they belong to. It never modifies the document.
pub fn validate(doc: &Document) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for (index, block) in doc.blocks.iter().enumerate() {
        validate_tree(block, index, &mut diagnostics);
    }
    diagnostics
}

fn validate_tree(block: &Block, index: usize, diagnostics: &mut Vec<Diagnostic>) {
    validate_block(&block.kind, index, diagnostics);
    for child in &block.children {
        validate_tree(child, index, diagnostics);
    }
}

fn validate_block(kind: &BlockKind, index: usize, diagnostics: &mut Vec<Diagnostic>) {
    let mut push = |severity: Severity, code: &str, message: String| {
        diagnostics.push(Diagnostic {
            severity,
            message,
            block: Some(index),
            code: Some(code.into()),
        });
    };

    match kind {
        BlockKind::Image { url, name, width } => {
            if url.is_empty() {
                push(Severity::Error, "V010", "Image block has no URL".into());
            }
            if sanitize_label(name) != *name {
                push(
                    Severity::Warning,
                    "V011",
                    format!("Image name '{name}' contains '|', brackets or a newline; they are replaced with '_' on save"),
                );
            }
            check_width(*width, "Image", &mut push);
        }
        BlockKind::File { name, url } => {
            if url.is_empty() {
                push(Severity::Error, "V010", format!("File block '{name}' has no URL"));
            }
            if sanitize_label(name) != *name {
                push(
                    Severity::Warning,
                    "V011",
                    format!("File name '{name}' contains '|', brackets or a newline; they are replaced with '_' on save"),
                );
            }
        }
        BlockKind::Code {
            text,
            language,
            width,
            height,
        } => {
            let written = fence_language(language);
            if !language.is_empty() && written != language.as_str() {
                push(
                    Severity::Warning,
                    "V031",
                    format!("Code language '{language}' cannot appear in a fence; it is saved as '{written}'"),
                );
            }
            if !is_canonical(text) {
                push(
                    Severity::Info,
                    "V040",
                    "Code block text is not percent-encoded; it is written as-is".into(),
                );
            }
            if decode_payload_lossy(text).trim().is_empty() {
                push(Severity::Warning, "V030", "Code block is empty".into());
            }
            check_width(*width, "Code", &mut push);
            check_height(*height, "Code", &mut push);
        }
        BlockKind::Formula { text } => {
            if !is_canonical(text) {
                push(
                    Severity::Info,
                    "V040",
                    "Formula text is not percent-encoded; it is written as-is".into(),
                );
            }
            if decode_payload_lossy(text).trim().is_empty() {
                push(Severity::Warning, "V030", "Formula block is empty".into());
            }
        }
        BlockKind::Diagram { code, width, height } => {
            if code.trim().is_empty() {
                push(Severity::Warning, "V030", "Diagram block is empty".into());
            }
            check_width(*width, "Diagram", &mut push);
            check_height(*height, "Diagram", &mut push);
        }
        BlockKind::Generic { .. } => {}
    }
}

fn check_width(width: Width, what: &str, push: &mut impl FnMut(Severity, &str, String)) {
    if width == Width::Pixels(0) {
        push(Severity::Warning, "V020", format!("{what} block has zero width"));
    }
}

fn check_height(height: u32, what: &str, push: &mut impl FnMut(Severity, &str, String)) {
    if height == 0 {
        push(Severity::Warning, "V020", format!("{what} block has zero height"));
    }
}
