use anyhow::Result;

use crate::hierarchy::FolderPath;
use crate::storage::{NoteRecord, StorageHandle};

/// Thin profile-scoped wrapper over storage CRUD, so the key handlers stay
/// free of connection plumbing.
pub struct ActionDispatcher<'a> {
    storage: &'a StorageHandle,
    profile_id: &'a str,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(storage: &'a StorageHandle, profile_id: &'a str) -> Self {
        Self {
            storage,
            profile_id,
        }
    }

    pub fn create_note(&self, title: &str, folder: &FolderPath) -> Result<NoteRecord> {
        self.storage.create_note(self.profile_id, title, folder)
    }

    pub fn rename_note(&self, note_id: &str, title: &str) -> Result<()> {
        let note = self
            .storage
            .fetch_note(self.profile_id, note_id)?
            .ok_or_else(|| anyhow::anyhow!("note {note_id} not found"))?;
        self.storage
            .update_note(self.profile_id, note_id, title, &note.content)
    }

    pub fn save_content(&self, note_id: &str, title: &str, content: &str) -> Result<()> {
        self.storage
            .update_note(self.profile_id, note_id, title, content)
    }

    pub fn delete_note(&self, note_id: &str) -> Result<()> {
        self.storage.delete_note(self.profile_id, note_id)
    }
}
