use blockdoc_core::{
    Block, BlockContent, BlockType, Caret, Editor, HeadingLevel, ListType,
};

fn indented(mut block: Block, level: u8) -> Block {
    block.set_indent_level(level);
    block
}

#[test]
fn split_paragraph_at_cursor() {
    let mut editor = Editor::with_blocks(vec![indented(Block::paragraph(1, "helloworld"), 2)]);

    let new_id = editor.split_at_cursor(1, 5).unwrap().unwrap();

    assert_eq!(
        editor.blocks(),
        &[
            indented(Block::paragraph(1, "hello"), 2),
            indented(Block::paragraph(new_id, "world"), 2),
        ]
    );
    assert_eq!(editor.caret(), Some(Caret::start(new_id)));
}

#[test]
fn split_keeps_formatting_balanced() {
    let mut editor = Editor::with_blocks(vec![Block::paragraph(1, "a<b>bold</b>c")]);
    let new_id = editor.split_at_cursor(1, 3).unwrap().unwrap();

    assert_eq!(editor.block(1).unwrap().html(), Some("a<b>bo</b>"));
    assert_eq!(editor.block(new_id).unwrap().html(), Some("<b>ld</b>c"));
}

#[test]
fn split_list_item_continues_the_list() {
    let mut editor = Editor::with_blocks(vec![
        Block::list_item(1, ListType::Ordered, 0, "a"),
        Block::list_item(2, ListType::Ordered, 1, "bc"),
    ]);
    let new_id = editor.split_at_cursor(2, 1).unwrap().unwrap();

    assert_eq!(
        editor.block(new_id).unwrap().content,
        BlockContent::ListItem {
            list_type: ListType::Ordered,
            html: "c".into(),
            indent_level: 1,
        }
    );
    assert_eq!(editor.decorations().list_marker(new_id), Some("b"));
}

#[test]
fn split_todo_starts_unchecked() {
    let mut editor = Editor::with_blocks(vec![Block::todo(1, true, "ab")]);
    let new_id = editor.split_at_cursor(1, 2).unwrap().unwrap();

    assert_eq!(
        editor.block(new_id).unwrap().content,
        BlockContent::Todo {
            html: String::new(),
            checked: false,
            indent_level: 0,
        }
    );
}

#[test]
fn split_heading_continues_as_paragraph() {
    let mut editor = Editor::with_blocks(vec![Block::heading(1, HeadingLevel::One, "Title")]);
    let new_id = editor.split_at_cursor(1, 5).unwrap().unwrap();

    assert_eq!(editor.block(new_id).unwrap().block_type(), BlockType::Paragraph);
    assert_eq!(editor.block(1).unwrap().html(), Some("Title"));
}

#[test]
fn enter_on_empty_list_item_leaves_the_list() {
    let mut editor = Editor::with_blocks(vec![
        Block::list_item(1, ListType::Unordered, 0, "a"),
        Block::list_item(2, ListType::Unordered, 1, ""),
    ]);

    assert_eq!(editor.split_at_cursor(2, 0).unwrap(), None);
    assert_eq!(editor.block(2).unwrap().indent_level(), 0);
    assert_eq!(editor.block(2).unwrap().block_type(), BlockType::ListItem);

    assert_eq!(editor.split_at_cursor(2, 0).unwrap(), None);
    assert_eq!(editor.block(2).unwrap().block_type(), BlockType::Paragraph);
    assert_eq!(editor.blocks().len(), 2);
}

#[test]
fn enter_on_empty_quote_line_leaves_the_quote() {
    let mut editor = Editor::with_blocks(vec![Block::quote(1, "said"), Block::quote(2, "")]);

    assert_eq!(editor.split_at_cursor(2, 0).unwrap(), None);
    let block = editor.block(2).unwrap();
    assert_eq!(block.block_type(), BlockType::Paragraph);
    assert!(!block.is_quote());
}

#[test]
fn enter_in_toggle_title_opens_it_and_focuses_a_child() {
    let mut editor = Editor::with_blocks(vec![Block::toggle(
        1,
        "Title",
        vec![Block::paragraph(2, "body")],
    )]);

    let target = editor.split_at_cursor(1, 5).unwrap().unwrap();

    let BlockContent::Toggle {
        is_open, children, ..
    } = &editor.block(1).unwrap().content
    else {
        panic!("expected toggle");
    };
    assert!(is_open);
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].id, target);
    assert!(children[0].is_blank());
    assert_eq!(editor.caret(), Some(Caret::start(target)));
}

#[test]
fn enter_in_toggle_title_reuses_empty_first_child() {
    let mut editor = Editor::with_blocks(vec![Block::toggle(1, "T", vec![Block::paragraph(2, "")])]);

    assert_eq!(editor.split_at_cursor(1, 1).unwrap(), Some(2));
    assert_eq!(editor.block(1).unwrap().children().unwrap().len(), 1);
}

#[test]
fn empty_last_paragraph_exits_the_container() {
    let mut editor = Editor::with_blocks(vec![Block::callout(
        1,
        vec![Block::paragraph(2, "a"), Block::paragraph(3, "")],
    )]);

    let new_id = editor.split_at_cursor(3, 0).unwrap().unwrap();

    assert_eq!(
        editor.blocks(),
        &[
            Block::callout(1, vec![Block::paragraph(2, "a")]),
            Block::paragraph(new_id, ""),
        ]
    );
}

#[test]
fn empty_sole_child_stays_when_exiting() {
    let mut editor = Editor::with_blocks(vec![Block::toggle(1, "T", vec![Block::paragraph(2, "")])]);

    let new_id = editor.split_at_cursor(2, 0).unwrap().unwrap();

    assert_eq!(editor.block(1).unwrap().children().unwrap().len(), 1);
    assert_eq!(editor.blocks()[1].id, new_id);
}

#[test]
fn enter_on_image_adds_paragraph_after() {
    let mut editor = Editor::with_blocks(vec![Block::image(1, Some("a.png".into()))]);
    let new_id = editor.split_at_cursor(1, 0).unwrap().unwrap();

    assert_eq!(editor.blocks()[1], Block::paragraph(new_id, ""));
}

#[test]
fn merge_joins_text_into_previous_block() {
    let mut editor = Editor::with_blocks(vec![
        Block::heading(1, HeadingLevel::Two, "ab"),
        Block::paragraph(2, "cd"),
    ]);
    editor.merge_with_previous(2).unwrap();

    assert_eq!(editor.blocks(), &[Block::heading(1, HeadingLevel::Two, "abcd")]);
    assert_eq!(editor.caret(), Some(Caret::at(1, 2)));
}

#[test]
fn merge_into_blank_previous_takes_the_text() {
    let mut editor = Editor::with_blocks(vec![Block::paragraph(1, "<br>"), Block::paragraph(2, "x")]);
    editor.merge_with_previous(2).unwrap();
    assert_eq!(editor.blocks(), &[Block::paragraph(1, "x")]);
}

#[test]
fn merge_on_empty_indented_block_outdents() {
    let mut editor = Editor::with_blocks(vec![
        Block::paragraph(1, "a"),
        indented(Block::paragraph(2, ""), 1),
    ]);
    editor.merge_with_previous(2).unwrap();

    assert_eq!(editor.blocks().len(), 2);
    assert_eq!(editor.block(2).unwrap().indent_level(), 0);
}

#[test]
fn merge_at_document_start_does_nothing() {
    let mut editor = Editor::with_blocks(vec![Block::paragraph(1, "a")]);
    editor.merge_with_previous(1).unwrap();
    assert_eq!(editor.blocks(), &[Block::paragraph(1, "a")]);
    assert!(!editor.can_undo());
}

#[test]
fn merge_into_previous_toggle_extends_its_title() {
    let mut editor = Editor::with_blocks(vec![
        Block::toggle(1, "T", vec![Block::paragraph(2, "")]),
        Block::paragraph(3, "z"),
    ]);
    editor.merge_with_previous(3).unwrap();

    assert_eq!(editor.blocks().len(), 1);
    assert_eq!(editor.block(1).unwrap().html(), Some("Tz"));
}

#[test]
fn merge_into_previous_callout_extends_its_first_child() {
    let mut editor = Editor::with_blocks(vec![
        Block::callout(1, vec![Block::paragraph(2, "in")]),
        Block::paragraph(3, "out"),
    ]);
    editor.merge_with_previous(3).unwrap();

    assert_eq!(
        editor.blocks(),
        &[Block::callout(1, vec![Block::paragraph(2, "inout")])]
    );
    assert_eq!(editor.caret(), Some(Caret::at(2, 2)));
}

#[test]
fn first_toggle_child_joins_the_title() {
    let mut editor = Editor::with_blocks(vec![Block::toggle(
        1,
        "T",
        vec![Block::paragraph(2, "x"), Block::paragraph(3, "y")],
    )]);
    editor.merge_with_previous(2).unwrap();

    assert_eq!(
        editor.blocks(),
        &[Block::toggle(1, "Tx", vec![Block::paragraph(3, "y")])]
    );
}

#[test]
fn empty_sole_toggle_child_dissolves_the_toggle() {
    let mut editor = Editor::with_blocks(vec![Block::toggle(1, "T", vec![Block::paragraph(2, "")])]);
    editor.merge_with_previous(2).unwrap();

    assert_eq!(editor.blocks(), &[Block::paragraph(1, "T")]);
    assert_eq!(editor.caret(), Some(Caret::at(1, 1)));
}

#[test]
fn sole_callout_child_dissolves_the_callout() {
    let mut editor = Editor::with_blocks(vec![Block::callout(1, vec![Block::paragraph(2, "hi")])]);
    editor.merge_with_previous(2).unwrap();

    assert_eq!(editor.blocks(), &[Block::paragraph(1, "hi")]);
}

#[test]
fn first_of_several_callout_children_moves_out() {
    let mut editor = Editor::with_blocks(vec![Block::callout(
        1,
        vec![Block::paragraph(2, "a"), Block::paragraph(3, "b")],
    )]);
    editor.merge_with_previous(2).unwrap();

    assert_eq!(
        editor.blocks(),
        &[
            Block::paragraph(2, "a"),
            Block::callout(1, vec![Block::paragraph(3, "b")]),
        ]
    );
}

#[test]
fn backspace_on_toggle_lifts_its_children() {
    let mut editor = Editor::with_blocks(vec![Block::toggle(
        1,
        "T",
        vec![Block::paragraph(2, "x"), Block::paragraph(3, "y")],
    )]);
    editor.merge_with_previous(1).unwrap();

    assert_eq!(
        editor.blocks(),
        &[
            Block::paragraph(1, "T"),
            Block::paragraph(2, "x"),
            Block::paragraph(3, "y"),
        ]
    );
}

#[test]
fn empty_block_after_image_is_removed() {
    let mut editor = Editor::with_blocks(vec![Block::image(1, None), Block::paragraph(2, "")]);
    editor.merge_with_previous(2).unwrap();
    assert_eq!(editor.blocks(), &[Block::image(1, None)]);
}
