use blockdoc_core::{Block, BlockContent, BlockType, Editor, IdAllocator, ListType, normalize};
use serde_json::json;

#[test]
fn normalize_coerces_fields_of_the_wrong_shape() {
    let mut ids = IdAllocator::new();
    let block = normalize(
        &json!({
            "id": "seven",
            "type": "li",
            "listType": "weird",
            "indentLevel": "deep",
            "html": 3
        }),
        &mut ids,
    );

    assert_eq!(block.id, 1);
    assert_eq!(
        block.content,
        BlockContent::ListItem {
            list_type: ListType::Unordered,
            html: String::new(),
            indent_level: 0,
        }
    );
}

#[test]
fn normalize_unknown_type_falls_back_to_paragraph() {
    let mut ids = IdAllocator::new();
    let block = normalize(&json!({"type": "table", "html": "x"}), &mut ids);
    assert_eq!(block.block_type(), BlockType::Paragraph);
    assert_eq!(block.html(), Some("x"));
}

#[test]
fn normalize_gives_containers_a_default_child() {
    let mut ids = IdAllocator::new();
    let block = normalize(&json!({"type": "toggle", "titleHtml": "T"}), &mut ids);

    let BlockContent::Toggle {
        title_html,
        is_open,
        children,
    } = &block.content
    else {
        panic!("expected toggle");
    };
    assert_eq!(title_html, "T");
    assert!(!is_open);
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].block_type(), BlockType::Paragraph);
    assert!(children[0].is_blank());
}

#[test]
fn normalize_keeps_only_fields_of_the_variant() {
    let mut ids = IdAllocator::new();
    let block = normalize(
        &json!({"type": "h2", "html": "t", "indentLevel": 3, "checked": true, "listType": "ol"}),
        &mut ids,
    );
    assert_eq!(block.indent_level(), 0);
    assert_eq!(block.list_type(), None);
    assert_eq!(block.html(), Some("t"));
}

#[test]
fn ids_stay_unique_across_documents() {
    let mut editor = Editor::default();
    editor.load_document(&[json!({"id": 10, "type": "p", "html": "a"})]);
    editor.load_document(&[json!({"type": "p"}), json!({"type": "p"})]);

    let ids: Vec<u64> = editor.blocks().iter().map(|b| b.id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.iter().all(|id| *id > 10));
    assert_ne!(ids[0], ids[1]);
}

#[test]
fn load_repairs_mark_the_document_dirty() {
    let mut editor = Editor::default();
    let outcome = editor.load_document(&[
        json!({"id": 3, "type": "p", "html": "a"}),
        json!({"id": 3, "type": "p", "html": "b"}),
    ]);
    assert!(outcome.repaired);
    assert!(!outcome.healed_empty);
    assert!(editor.is_dirty());

    let outcome = editor.load_document(&[json!({"id": 20, "type": "h1", "html": "Title"})]);
    assert!(!outcome.repaired);
    assert!(!editor.is_dirty());
}

#[test]
fn empty_document_is_healed_with_a_placeholder_paragraph() {
    let mut editor = Editor::default();
    let outcome = editor.load_document(&[]);

    assert!(outcome.healed_empty);
    assert!(editor.is_dirty());
    assert_eq!(editor.blocks().len(), 1);
    let only = &editor.blocks()[0];
    assert_eq!(only.block_type(), BlockType::Paragraph);
    assert_eq!(editor.initial_placeholder(), Some(only.id));
    assert!(editor.decoration(only.id).show_placeholder);
}

#[test]
fn block_types_use_short_wire_names() {
    assert_eq!(BlockType::parse("li"), Some(BlockType::ListItem));
    assert_eq!(BlockType::parse("bogus"), None);
    assert_eq!(
        serde_json::to_value(BlockType::Callout).unwrap(),
        json!("callout")
    );
    assert_eq!(serde_json::to_value(ListType::Ordered).unwrap(), json!("ol"));
}

#[test]
fn only_paragraphs_carry_quote_membership() {
    let grouped = Block::new(
        1,
        BlockContent::Paragraph {
            html: "x".into(),
            indent_level: 0,
            in_quote: true,
        },
    );
    assert!(grouped.is_quote());
    assert!(Block::quote(2, "q").is_quote());
    assert!(!Block::heading(3, blockdoc_core::HeadingLevel::One, "h").is_quote());
}
