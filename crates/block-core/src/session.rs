//! Ties an [`Editor`] to document storage and a commit policy.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::core::{Editor, EditorConfig, LoadOutcome};
use crate::error::SessionError;
use crate::serde_value::DocumentRecord;

pub trait DocumentRepository {
    fn get(&self, id: u64) -> Option<DocumentRecord>;
    fn put(&mut self, record: DocumentRecord);
    /// `(id, title)` of every stored document, in id order.
    fn list(&self) -> Vec<(u64, String)>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    documents: Vec<DocumentRecord>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: impl IntoIterator<Item = DocumentRecord>) -> Self {
        let mut repo = Self::new();
        for record in documents {
            repo.put(record);
        }
        repo
    }
}

impl DocumentRepository for MemoryRepository {
    fn get(&self, id: u64) -> Option<DocumentRecord> {
        self.documents.iter().find(|doc| doc.id == id).cloned()
    }

    fn put(&mut self, record: DocumentRecord) {
        match self.documents.iter_mut().find(|doc| doc.id == record.id) {
            Some(slot) => *slot = record,
            None => {
                self.documents.push(record);
                self.documents.sort_by_key(|doc| doc.id);
            }
        }
    }

    fn list(&self) -> Vec<(u64, String)> {
        self.documents
            .iter()
            .map(|doc| (doc.id, doc.title.clone()))
            .collect()
    }
}

/// Decides when pending edits are written back.
pub trait CommitScheduler {
    /// Notes an edit made at `now`.
    fn request(&mut self, now: Instant);
    fn is_due(&self, now: Instant) -> bool;
    fn clear(&mut self);
}

/// Commits once no edit has arrived for `window`.
#[derive(Debug, Clone)]
pub struct Debounce {
    window: Duration,
    deadline: Option<Instant>,
}

impl Default for Debounce {
    fn default() -> Self {
        Self::new(Duration::from_millis(300))
    }
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl CommitScheduler for Debounce {
    fn request(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    fn clear(&mut self) {
        self.deadline = None;
    }
}

/// Commits on the first tick after any edit.
#[derive(Debug, Clone, Default)]
pub struct Immediate {
    pending: bool,
}

impl CommitScheduler for Immediate {
    fn request(&mut self, _now: Instant) {
        self.pending = true;
    }

    fn is_due(&self, _now: Instant) -> bool {
        self.pending
    }

    fn clear(&mut self) {
        self.pending = false;
    }
}

pub struct Session<R: DocumentRepository> {
    editor: Editor,
    repository: R,
    scheduler: Box<dyn CommitScheduler>,
    current: Option<u64>,
}

impl<R: DocumentRepository> Session<R> {
    pub fn new(repository: R) -> Self {
        Self::with_parts(repository, Box::new(Debounce::default()), EditorConfig::default())
    }

    pub fn with_parts(
        repository: R,
        scheduler: Box<dyn CommitScheduler>,
        config: EditorConfig,
    ) -> Self {
        Self {
            editor: Editor::new(config),
            repository,
            scheduler,
            current: None,
        }
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut Editor {
        &mut self.editor
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn current_document(&self) -> Option<u64> {
        self.current
    }

    /// Switches to another document, committing the current one first. A stored
    /// document that was empty or needed repair is written back at once.
    pub fn open(&mut self, id: u64) -> Result<LoadOutcome, SessionError> {
        let record = self
            .repository
            .get(id)
            .ok_or(SessionError::DocumentNotFound(id))?;
        self.flush();

        let outcome = self.editor.load_document(&record.content_blocks);
        self.current = Some(id);
        self.scheduler.clear();
        if outcome.needs_write_back() {
            debug!(id, "persisting document healed on load");
            self.flush();
        }
        Ok(outcome)
    }

    /// Stores a new, empty document under the next free id and opens it.
    pub fn create_document(&mut self, title: impl Into<String>) -> Result<u64, SessionError> {
        let id = self
            .repository
            .list()
            .iter()
            .map(|(id, _)| *id)
            .max()
            .unwrap_or(0)
            + 1;
        self.repository.put(DocumentRecord::new(id, title));
        self.open(id)?;
        Ok(id)
    }

    pub fn rename(&mut self, id: u64, title: impl Into<String>) -> Result<(), SessionError> {
        let mut record = self
            .repository
            .get(id)
            .ok_or(SessionError::DocumentNotFound(id))?;
        record.title = title.into();
        self.repository.put(record);
        Ok(())
    }

    /// Call after each edit; schedules a commit when the document changed.
    pub fn note_edit(&mut self, now: Instant) {
        if self.editor.is_dirty() {
            self.scheduler.request(now);
        }
    }

    /// Commits if the scheduler says so. Returns true when something was written.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.scheduler.is_due(now) {
            self.flush()
        } else {
            false
        }
    }

    /// Writes the open document back if it has unsaved changes.
    pub fn flush(&mut self) -> bool {
        self.scheduler.clear();
        let Some(id) = self.current else {
            return false;
        };
        if !self.editor.is_dirty() {
            return false;
        }
        let mut record = self
            .repository
            .get(id)
            .unwrap_or_else(|| DocumentRecord::new(id, ""));
        record.set_blocks(&self.editor.serialize_document());
        self.repository.put(record);
        self.editor.mark_clean();
        debug!(id, "committed document");
        true
    }
}
