use std::time::{Duration, Instant};

use blockdoc_core::{
    Debounce, DocumentRecord, DocumentRepository, EditorConfig, Immediate, MemoryRepository,
    Session, SessionError,
};
use serde_json::json;

fn debounced() -> Session<MemoryRepository> {
    Session::with_parts(
        MemoryRepository::new(),
        Box::new(Debounce::new(Duration::from_millis(300))),
        EditorConfig::default(),
    )
}

#[test]
fn new_document_is_healed_and_persisted() -> anyhow::Result<()> {
    let mut session = Session::new(MemoryRepository::new());
    let id = session.create_document("Notes")?;

    assert_eq!(id, 1);
    assert_eq!(session.current_document(), Some(1));
    assert_eq!(session.repository().list(), vec![(1, "Notes".to_string())]);

    let stored = session.repository().get(1).unwrap();
    assert_eq!(stored.content_blocks.len(), 1);
    assert_eq!(stored.content_blocks[0]["type"], json!("p"));
    assert!(!session.editor().is_dirty());
    Ok(())
}

#[test]
fn edits_commit_after_quiet_window() -> anyhow::Result<()> {
    let mut session = debounced();
    session.create_document("Draft")?;
    let block = session.editor().blocks()[0].id;

    let t0 = Instant::now();
    session.editor_mut().set_html(block, "hi")?;
    session.note_edit(t0);

    assert!(!session.tick(t0 + Duration::from_millis(100)));
    assert!(session.tick(t0 + Duration::from_millis(300)));
    assert_eq!(
        session.repository().get(1).unwrap().content_blocks[0]["html"],
        json!("hi")
    );
    assert!(!session.tick(t0 + Duration::from_millis(900)));
    Ok(())
}

#[test]
fn each_edit_restarts_the_window() -> anyhow::Result<()> {
    let mut session = debounced();
    session.create_document("Draft")?;
    let block = session.editor().blocks()[0].id;
    let t0 = Instant::now();

    session.editor_mut().set_html(block, "a")?;
    session.note_edit(t0);
    session.editor_mut().set_html(block, "ab")?;
    session.note_edit(t0 + Duration::from_millis(200));

    assert!(!session.tick(t0 + Duration::from_millis(350)));
    assert!(session.tick(t0 + Duration::from_millis(500)));
    Ok(())
}

#[test]
fn immediate_scheduler_commits_on_next_tick() -> anyhow::Result<()> {
    let mut session = Session::with_parts(
        MemoryRepository::new(),
        Box::new(Immediate::default()),
        EditorConfig::default(),
    );
    session.create_document("Quick")?;
    let block = session.editor().blocks()[0].id;
    let now = Instant::now();

    assert!(!session.tick(now));
    session.editor_mut().set_html(block, "x")?;
    session.note_edit(now);
    assert!(session.tick(now));
    Ok(())
}

#[test]
fn switching_documents_flushes_pending_edits() -> anyhow::Result<()> {
    let mut session = debounced();
    let first = session.create_document("One")?;
    let block = session.editor().blocks()[0].id;
    session.editor_mut().set_html(block, "unsaved")?;
    session.note_edit(Instant::now());

    let second = session.create_document("Two")?;

    assert_eq!(session.current_document(), Some(second));
    assert_eq!(
        session.repository().get(first).unwrap().content_blocks[0]["html"],
        json!("unsaved")
    );
    let next_block = session.editor().blocks()[0].id;
    assert!(next_block > block);
    Ok(())
}

#[test]
fn opening_a_stored_document_loads_its_blocks() -> anyhow::Result<()> {
    let mut record = DocumentRecord::new(4, "Stored");
    record.content_blocks = vec![json!({"id": 9, "type": "h1", "html": "Hello"})];
    let mut session = Session::new(MemoryRepository::with_documents([record]));

    let outcome = session.open(4)?;

    assert!(!outcome.healed_empty);
    assert_eq!(session.editor().blocks()[0].id, 9);
    assert!(!session.flush());
    Ok(())
}

#[test]
fn repaired_document_is_written_back_on_open() -> anyhow::Result<()> {
    let mut record = DocumentRecord::new(5, "Dupes");
    record.content_blocks = vec![
        json!({"id": 2, "type": "p", "html": "a"}),
        json!({"id": 2, "type": "p", "html": "b"}),
    ];
    let mut session = Session::new(MemoryRepository::with_documents([record]));

    let outcome = session.open(5)?;
    assert!(outcome.repaired);
    assert!(!session.editor().is_dirty());

    let stored = session.repository().get(5).unwrap();
    let ids: Vec<u64> = stored
        .content_blocks
        .iter()
        .filter_map(|block| block["id"].as_u64())
        .collect();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);

    let reopened = session.open(5)?;
    assert!(!reopened.repaired);
    let live: Vec<u64> = session.editor().blocks().iter().map(|b| b.id).collect();
    assert_eq!(live, ids);
    Ok(())
}

#[test]
fn missing_document_is_an_error() {
    let mut session = Session::new(MemoryRepository::new());
    assert!(matches!(
        session.open(3),
        Err(SessionError::DocumentNotFound(3))
    ));
    assert!(session.rename(3, "x").is_err());
}

#[test]
fn rename_updates_the_title() -> anyhow::Result<()> {
    let mut session = Session::new(MemoryRepository::new());
    let id = session.create_document("Old")?;
    session.rename(id, "New")?;
    assert_eq!(session.repository().get(id).unwrap().title, "New");
    Ok(())
}

#[test]
fn debounce_defaults_to_three_hundred_millis() {
    assert_eq!(Debounce::default().window(), Duration::from_millis(300));
}
