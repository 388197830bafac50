//! Property-based tests using proptest.
//!
//! These tests verify that the codec never panics on arbitrary input and that
//! documents survive a serialize/deserialize cycle.

use notedeck_codec::{Block, BlockKind, Document, Width, deserialize, serialize};
use proptest::prelude::*;

fn width() -> impl Strategy<Value = Width> {
    prop_oneof![Just(Width::Full), (1u32..2000).prop_map(Width::Pixels)]
}

fn paragraph() -> impl Strategy<Value = Block> {
    "[A-Za-z][A-Za-z0-9]{0,9}( [A-Za-z0-9]{1,10}){0,4}".prop_map(Block::paragraph)
}

fn code() -> impl Strategy<Value = Block> {
    (
        "[a-z0-9 =;(){}%|\n]{0,60}",
        "[a-z]{1,8}".prop_filter("mermaid selects a diagram", |l| l != "mermaid"),
        width(),
        1u32..1000,
    )
        .prop_map(|(body, lang, w, h)| Block::code(&body, lang, w, h))
}

/// Code blocks whose language an editor may leave empty or fill with text a
/// fence header cannot hold.
fn code_any_language() -> impl Strategy<Value = Block> {
    (
        "[a-z0-9 =;]{1,30}",
        prop_oneof![Just(String::new()), "[a-z |`+#]{1,8}"]
            .prop_filter("mermaid selects a diagram", |l| l != "mermaid"),
        width(),
    )
        .prop_map(|(body, lang, w)| Block::code(&body, lang, w, 300))
}

fn formula() -> impl Strategy<Value = Block> {
    "[a-z0-9 +^_{}\\\\=]{1,30}".prop_map(|latex| Block::formula(&latex))
}

fn diagram() -> impl Strategy<Value = Block> {
    ("[A-Za-z0-9 >-]{1,30}", width(), 1u32..1000).prop_map(|(code, w, h)| Block::diagram(code, w, h))
}

fn image() -> impl Strategy<Value = Block> {
    ("[a-z0-9]{1,12}", "[a-z0-9 ]{1,12}", width())
        .prop_map(|(file, name, w)| Block::image(format!("asset://localhost/{file}.png"), name, w))
}

fn attachment() -> impl Strategy<Value = Block> {
    ("[a-z0-9]{1,12}", "[a-z0-9.]{1,12}")
        .prop_map(|(file, name)| Block::file(name, format!("/data/assets/My Notes/{file}")))
}

fn document() -> impl Strategy<Value = Document> {
    prop::collection::vec(
        prop_oneof![paragraph(), code(), formula(), diagram(), image(), attachment()],
        1..8,
    )
    .prop_map(Document::new)
}

fn kinds(doc: &Document) -> Vec<BlockKind> {
    doc.blocks.iter().map(|b| b.kind.clone()).collect()
}

proptest! {
    /// Any random string fed to the decoder should never cause a panic.
    #[test]
    fn any_text_no_panic(input in "\\PC{0,500}") {
        let doc = deserialize(&input);
        prop_assert!(!doc.blocks.is_empty());
        let _ = serialize(&doc);
    }

    /// Fence-heavy input should never cause a panic either.
    #[test]
    fn fence_soup_no_panic(input in "(```[a-z|=0-9%]{0,10}\n|\\$\\$\n|!\\[[a-z|=0-9]{0,6}\\]\\([a-z]{0,4}\\)|[a-z ]{0,8}\n|@@LATEX_ID_[0-9]@@\n){0,20}") {
        let doc = deserialize(&input);
        prop_assert!(!doc.blocks.is_empty());
        let _ = serialize(&doc);
    }

    /// Deserialize(Serialize(D)) has the same blocks as D, ids aside.
    #[test]
    fn document_round_trip(doc in document()) {
        let back = deserialize(&serialize(&doc));
        prop_assert_eq!(kinds(&back), kinds(&doc));
    }

    /// Serialize(Deserialize(Serialize(D))) == Serialize(D).
    #[test]
    fn serialize_is_idempotent(doc in document()) {
        let once = serialize(&doc);
        let twice = serialize(&deserialize(&once));
        prop_assert_eq!(twice, once);
    }

    /// Idempotence holds for code languages the fence has to normalize.
    #[test]
    fn code_language_normalization_is_idempotent(
        blocks in prop::collection::vec(prop_oneof![paragraph(), code_any_language()], 1..6)
    ) {
        let doc = Document::new(blocks);
        let once = serialize(&doc);
        let back = deserialize(&once);
        let code_count = |d: &Document| d.blocks.iter().filter(|b| b.kind.tag() == "code").count();
        prop_assert_eq!(code_count(&back), code_count(&doc));
        prop_assert_eq!(serialize(&back), once);
    }

    /// Token-shaped text in a note without custom blocks comes back verbatim.
    #[test]
    fn token_lookalikes_pass_through(n in 0usize..50, word in "[a-z]{1,8}") {
        let text = format!("{word} @@LATEX_ID_{n}@@ {word}\n\n@@IMAGE_ID_{n}@@\n");
        prop_assert_eq!(serialize(&deserialize(&text)), text);
    }
}
