//! HTML fragment renderer.
//!
//! Produces semantic HTML with `notedeck-*` CSS classes. Generic blocks are
//! rendered through `pulldown-cmark`. All other content is HTML-escaped.

use crate::payload::decode_payload_lossy;
use crate::transcoder::markdown_options;
use crate::types::{Block, BlockKind, Document, Width};

/// Render a markdown string to HTML with the same extensions the transcoder
/// parses with.
fn render_markdown(content: &str) -> String {
    let parser = pulldown_cmark::Parser::new_ext(content, markdown_options());
    let mut html_output = String::new();
    pulldown_cmark::html::push_html(&mut html_output, parser);
    html_output
}

/// Render a document as an HTML fragment.
///
/// No `<html>`, `<head>`, or `<body>` wrapper is added. Children are rendered
/// inside a `notedeck-children` container after their parent.
pub fn to_html(doc: &Document) -> String {
    let mut parts = Vec::new();
    render_blocks(&doc.blocks, &mut parts);
    parts.join("\n")
}

/// Render a standalone HTML page around [`to_html`].
///
/// Formulas and diagrams are left as markup for client-side renderers
/// (`\[...\]` for a TeX typesetter, `<pre class="mermaid">` for Mermaid).
pub fn to_html_page(doc: &Document, title: &str) -> String {
    let body = to_html(doc);
    let title = escape_html(title);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <style>{PAGE_CSS}</style>
</head>
<body>
<article class="notedeck">
{body}
</article>
</body>
</html>
"#
    )
}

const PAGE_CSS: &str = r#"
    body { max-width: 860px; margin: 2rem auto; padding: 0 1rem; font-family: system-ui, sans-serif; line-height: 1.6; }
    .notedeck-code { overflow: auto; background: #f5f5f5; padding: 0.75rem; border-radius: 4px; }
    .notedeck-math { overflow-x: auto; text-align: center; }
    .notedeck-image img { max-width: 100%; }
    .notedeck-file a::before { content: "📎 "; }
    .notedeck-children { margin-left: 1.5rem; }
"#;

/// Escape HTML special characters.
fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_blocks(blocks: &[Block], parts: &mut Vec<String>) {
    for block in blocks {
        parts.push(render_block(&block.kind));
        if !block.children.is_empty() {
            let mut nested = Vec::new();
            render_blocks(&block.children, &mut nested);
            parts.push(format!(
                "<div class=\"notedeck-children\">\n{}\n</div>",
                nested.join("\n")
            ));
        }
    }
}

fn render_block(kind: &BlockKind) -> String {
    match kind {
        BlockKind::Generic { markdown, .. } => render_markdown(markdown),

        BlockKind::Code {
            text,
            language,
            width,
            height,
        } => format!(
            "<pre class=\"notedeck-code\" style=\"{}\"><code class=\"language-{}\">{}</code></pre>",
            size_style(*width, *height),
            escape_html(language),
            escape_html(&decode_payload_lossy(text)),
        ),

        BlockKind::Diagram { code, width, height } => format!(
            "<pre class=\"mermaid notedeck-diagram\" style=\"{}\">{}</pre>",
            size_style(*width, *height),
            escape_html(code),
        ),

        BlockKind::Formula { text } => format!(
            "<div class=\"math notedeck-math\">\\[{}\\]</div>",
            escape_html(&decode_payload_lossy(text)),
        ),

        BlockKind::Image { url, name, width } => {
            let width_attr = match width {
                Width::Full => "width=\"100%\"".to_string(),
                Width::Pixels(px) => format!("width=\"{px}\""),
            };
            format!(
                "<figure class=\"notedeck-image\"><img src=\"{}\" alt=\"{}\" {width_attr}></figure>",
                escape_html(url),
                escape_html(name),
            )
        }

        BlockKind::File { name, url } => format!(
            "<p class=\"notedeck-file\"><a href=\"{}\" download=\"{}\">{}</a></p>",
            escape_html(url),
            escape_html(name),
            escape_html(name),
        ),
    }
}

fn size_style(width: Width, height: u32) -> String {
    match width {
        Width::Full => format!("width: 100%; max-height: {height}px;"),
        Width::Pixels(px) => format!("width: {px}px; max-height: {height}px;"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;

    fn doc_with(blocks: Vec<Block>) -> Document {
        Document::new(blocks)
    }

    #[test]
    fn html_generic_markdown() {
        let html = to_html(&doc_with(vec![Block::generic(GenericKind::Heading(1), "# Hello *there*")]));
        assert_eq!(html, "<h1>Hello <em>there</em></h1>\n");
    }

    #[test]
    fn html_code_is_decoded_and_escaped() {
        let html = to_html(&doc_with(vec![Block::code("a < b && c", "rust", Width::Full, 300)]));
        assert!(html.contains("<code class=\"language-rust\">a &lt; b &amp;&amp; c</code>"));
        assert!(html.contains("width: 100%; max-height: 300px;"));
    }

    #[test]
    fn html_diagram_uses_mermaid_class() {
        let html = to_html(&doc_with(vec![Block::diagram("graph TD\nA-->B", Width::Pixels(500), 300)]));
        assert!(html.starts_with("<pre class=\"mermaid notedeck-diagram\""));
        assert!(html.contains("A--&gt;B"));
    }

    #[test]
    fn html_formula() {
        let html = to_html(&doc_with(vec![Block::formula("a<b")]));
        assert_eq!(html, "<div class=\"math notedeck-math\">\\[a&lt;b\\]</div>");
    }

    #[test]
    fn html_image_and_file() {
        let html = to_html(&doc_with(vec![
            Block::image("asset://localhost/a.png", "a \"quoted\"", Width::Pixels(320)),
            Block::file("r.pdf", "asset://localhost/r.pdf"),
        ]));
        assert!(html.contains("alt=\"a &quot;quoted&quot;\" width=\"320\""));
        assert!(html.contains("<a href=\"asset://localhost/r.pdf\" download=\"r.pdf\">r.pdf</a>"));
    }

    #[test]
    fn html_children_are_nested() {
        let html = to_html(&doc_with(vec![
            Block::paragraph("parent").with_children(vec![Block::formula("x")]),
        ]));
        assert!(html.contains("<div class=\"notedeck-children\">\n<div class=\"math notedeck-math\">"));
    }

    #[test]
    fn html_page_escapes_title() {
        let page = to_html_page(&Document::empty(), "<script>");
        assert!(page.contains("<title>&lt;script&gt;</title>"));
        assert!(page.contains("<article class=\"notedeck\">"));
    }
}
