//! ANSI terminal renderer.
//!
//! Produces colored terminal output using the `colored` crate. Generic
//! blocks are printed as their markdown source; custom blocks get a framed
//! treatment so they stand out in `notedeck show`.

use colored::Colorize;

use crate::payload::decode_payload_lossy;
use crate::types::{Block, BlockKind, Document, GenericKind};

/// Render a document as ANSI-colored terminal text.
pub fn to_terminal(doc: &Document) -> String {
    let mut parts: Vec<String> = Vec::new();
    render_blocks(&doc.blocks, 0, &mut parts);
    parts.join("\n\n")
}

fn render_blocks(blocks: &[Block], depth: usize, parts: &mut Vec<String>) {
    let pad = "  ".repeat(depth);
    for block in blocks {
        let rendered = render_block(&block.kind);
        parts.push(
            rendered
                .lines()
                .map(|line| format!("{pad}{line}"))
                .collect::<Vec<_>>()
                .join("\n"),
        );
        render_blocks(&block.children, depth + 1, parts);
    }
}

fn render_block(kind: &BlockKind) -> String {
    match kind {
        BlockKind::Generic { style, markdown } => match style {
            GenericKind::Heading(_) => format!("{}", markdown.bold()),
            GenericKind::Quote => format!("{}", markdown.italic()),
            GenericKind::Rule => "\u{2500}".repeat(40), // ─
            _ => markdown.clone(),
        },

        BlockKind::Code {
            text,
            language,
            width,
            height,
        } => {
            let header = format!("{} {}", language.cyan().bold(), format!("w={width} h={height}").dimmed());
            framed(&header, &decode_payload_lossy(text))
        }

        BlockKind::Diagram { code, width, height } => {
            let header = format!("{} {}", "mermaid".magenta().bold(), format!("w={width} h={height}").dimmed());
            framed(&header, code)
        }

        BlockKind::Formula { text } => framed(&format!("{}", "formula".yellow().bold()), &decode_payload_lossy(text)),

        BlockKind::Image { url, name, width } => format!(
            "{} {} {}",
            "\u{1F5BC}".green(), // 🖼
            name.bold(),
            format!("({url}, w={width})").dimmed()
        ),

        BlockKind::File { name, url } => format!(
            "{} {} {}",
            "\u{1F4CE}".blue(), // 📎
            name.bold(),
            format!("({url})").dimmed()
        ),
    }
}

fn framed(header: &str, body: &str) -> String {
    let border = format!("{}", "\u{2502}".dimmed()); // │
    let mut lines = vec![format!("{} {header}", "\u{250C}".dimmed())]; // ┌
    for line in body.lines() {
        lines.push(format!("{border} {line}"));
    }
    lines.push(format!("{}", "\u{2514}".dimmed())); // └
    lines.join("\n")
}
