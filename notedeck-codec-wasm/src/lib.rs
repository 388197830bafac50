//! WASM bindings for `notedeck-codec`.
//!
//! Exposes the note codec to a browser-hosted editing surface via
//! wasm-bindgen. `deserialize()` turns note text into the block JSON the
//! editor consumes, `serialize()` turns the editor's blocks back into note
//! text.

use notedeck_codec::Document;
use wasm_bindgen::prelude::*;

/// Decode note text and return `{ doc, diagnostics }` as JSON.
///
/// `doc.blocks` is the block array; each block carries `id`, `type`, its
/// kind-specific fields and, when present, `children`.
#[wasm_bindgen]
pub fn deserialize(input: &str) -> String {
    let result = notedeck_codec::deserialize_with_diagnostics(input);
    serde_json::json!({
        "doc": result.doc,
        "diagnostics": result.diagnostics,
    })
    .to_string()
}

/// Encode a document (a `{ blocks: [...] }` object) as note text.
#[wasm_bindgen]
pub fn serialize(doc: JsValue) -> Result<String, JsError> {
    let doc: Document = serde_wasm_bindgen::from_value(doc)?;
    Ok(doc.to_markdown())
}

/// Decode note text and return an HTML fragment with `notedeck-*` classes.
#[wasm_bindgen]
pub fn render_html(input: &str) -> String {
    notedeck_codec::deserialize(input).to_html()
}

/// Decode note text and return a complete HTML page.
#[wasm_bindgen]
pub fn render_html_page(input: &str, title: Option<String>) -> String {
    let doc = notedeck_codec::deserialize(input);
    doc.to_html_page(title.as_deref().unwrap_or("notedeck"))
}

/// Decode and validate note text, returning all diagnostics as JSON.
///
/// An empty array means the note is clean.
#[wasm_bindgen]
pub fn validate(input: &str) -> String {
    let result = notedeck_codec::deserialize_with_diagnostics(input);
    let mut all = result.diagnostics;
    all.extend(result.doc.validate());
    serde_json::to_string(&all).unwrap_or_else(|_| "[]".to_string())
}

/// Asset URLs a note references, as a JSON array.
#[wasm_bindgen]
pub fn referenced_assets(input: &str) -> String {
    let urls: Vec<String> = notedeck_codec::deserialize(input).referenced_assets().into_iter().collect();
    serde_json::to_string(&urls).unwrap_or_else(|_| "[]".to_string())
}
