use blockdoc_core::{
    Block, BlockType, Caret, Editor, EditorConfig, ListType, Op, Transaction, TypeOptions,
};

#[test]
fn split_undo_redo_restores_text_and_caret() -> anyhow::Result<()> {
    let mut editor = Editor::with_blocks(vec![Block::paragraph(1, "helloworld")]);
    editor.set_caret(Some(Caret::at(1, 5)));

    let new_id = editor.split_at_cursor(1, 5)?.unwrap();
    let after = editor.blocks().to_vec();

    assert!(editor.undo());
    assert_eq!(editor.blocks(), &[Block::paragraph(1, "helloworld")]);
    assert_eq!(editor.caret(), Some(Caret::at(1, 5)));

    assert!(editor.redo());
    assert_eq!(editor.blocks(), after.as_slice());
    assert_eq!(editor.caret(), Some(Caret::start(new_id)));
    Ok(())
}

#[test]
fn type_change_undo_restores_variant() -> anyhow::Result<()> {
    let mut editor = Editor::with_blocks(vec![Block::list_item(1, ListType::Ordered, 0, "x")]);
    editor.change_type(1, BlockType::Callout, None, TypeOptions::default())?;
    assert_eq!(editor.block(1).unwrap().block_type(), BlockType::Callout);

    assert!(editor.undo());
    assert_eq!(editor.blocks(), &[Block::list_item(1, ListType::Ordered, 0, "x")]);
    Ok(())
}

#[test]
fn refused_edit_leaves_history_alone() {
    let mut editor = Editor::with_blocks(vec![Block::paragraph(1, "a")]);
    assert!(editor.indent(1, 1).is_err());
    assert!(!editor.can_undo());
    assert!(!editor.undo());
}

#[test]
fn new_edit_clears_redo() -> anyhow::Result<()> {
    let mut editor = Editor::with_blocks(vec![Block::paragraph(1, "a")]);
    editor.set_html(1, "ab")?;
    assert!(editor.undo());
    assert!(editor.can_redo());

    editor.set_html(1, "ac")?;
    assert!(!editor.can_redo());
    Ok(())
}

#[test]
fn history_is_bounded() -> anyhow::Result<()> {
    let config = EditorConfig::from_json_str(r#"{"maxUndo": 2}"#)?;
    let mut editor = Editor::new(config);
    let id = editor.blocks()[0].id;

    editor.set_html(id, "a")?;
    editor.set_html(id, "ab")?;
    editor.set_html(id, "abc")?;

    assert!(editor.undo());
    assert!(editor.undo());
    assert!(!editor.undo());
    assert_eq!(editor.block(id).unwrap().html(), Some("a"));
    Ok(())
}

#[test]
fn deleting_the_last_block_heals_and_undoes_cleanly() -> anyhow::Result<()> {
    let mut editor = Editor::with_blocks(vec![Block::paragraph(1, "only")]);
    editor.delete_block(1)?;

    assert_eq!(editor.blocks().len(), 1);
    assert_ne!(editor.blocks()[0].id, 1);
    assert!(editor.blocks()[0].is_blank());

    assert!(editor.undo());
    assert_eq!(editor.blocks(), &[Block::paragraph(1, "only")]);
    Ok(())
}

#[test]
fn failed_transaction_rolls_back_every_op() {
    let mut editor = Editor::with_blocks(vec![Block::paragraph(1, "a")]);
    let tx = Transaction::new(vec![
        Op::InsertBlock {
            path: vec![1],
            block: Block::paragraph(2, "b"),
        },
        Op::RemoveBlock { path: vec![7] },
    ]);

    assert!(editor.apply(tx).is_err());
    assert_eq!(editor.blocks(), &[Block::paragraph(1, "a")]);
    assert!(!editor.can_undo());
}

#[test]
fn config_defaults_fill_zero_and_missing_fields() -> anyhow::Result<()> {
    let config = EditorConfig::from_json_str(r#"{"maxIndent": 4, "maxUndo": 0}"#)?;
    assert_eq!(config.max_indent, 4);
    assert_eq!(config.max_undo, 200);
    assert_eq!(config.max_ordered_list_indent, 2);
    Ok(())
}
