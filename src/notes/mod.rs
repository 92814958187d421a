//! Per-user note storage.
//!
//! A note is a metadata record plus a text file on disk. Creation writes the
//! file first and only then inserts the record, so a failed write leaves
//! nothing behind. Deletion is the mirror image with a softer policy: the
//! file removal is best-effort (logged on failure), the record delete is
//! authoritative.

use crate::auth::verifier::Identity;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A stored note's metadata. The content lives in the file at `file_name`
/// under the service's notes directory.
#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata record storage, scoped by owner on every read.
#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn insert(&self, note: Note) -> Result<()>;
    async fn list_for(&self, owner_id: &str) -> Result<Vec<Note>>;
    /// Only returns the note if `owner_id` owns it.
    async fn find(&self, owner_id: &str, note_id: &str) -> Result<Option<Note>>;
    async fn delete(&self, owner_id: &str, note_id: &str) -> Result<()>;
}

/// Note lifecycle: record store plus file I/O.
pub struct NoteService<S> {
    store: S,
    notes_dir: PathBuf,
}

impl<S: NoteStore> NoteService<S> {
    pub fn new(store: S, notes_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            notes_dir: notes_dir.into(),
        }
    }

    /// Create a note: write the content file, then insert the record.
    pub async fn create(&self, owner: &Identity, title: &str, content: &str) -> Result<Note> {
        let title = title.trim();
        let content = content.trim();
        if title.is_empty() {
            return Err(Error::invalid_input("Title is required"));
        }
        if content.is_empty() {
            return Err(Error::invalid_input("Content is required"));
        }

        tokio::fs::create_dir_all(&self.notes_dir).await?;

        let now = Utc::now();
        let file_name = format!(
            "{}_{}_{}.txt",
            owner.id,
            now.format("%Y%m%d_%H%M%S"),
            sanitize_title(title),
        );

        // File first; a write failure aborts before any record exists.
        tokio::fs::write(self.notes_dir.join(&file_name), content).await?;

        let note = Note {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner.id.clone(),
            title: title.to_string(),
            file_name,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(note.clone()).await?;

        tracing::info!(note_id = %note.id, owner_id = %owner.id, "note created");
        Ok(note)
    }

    pub async fn list(&self, owner: &Identity) -> Result<Vec<Note>> {
        self.store.list_for(&owner.id).await
    }

    /// Load a note and its file content. Owner-scoped.
    pub async fn download(&self, owner: &Identity, note_id: &str) -> Result<(Note, String)> {
        let note = self
            .store
            .find(&owner.id, note_id)
            .await?
            .ok_or_else(|| Error::not_found("Note not found"))?;

        let path = self.notes_dir.join(&note.file_name);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::not_found("File not found"),
                _ => Error::storage(format!("Failed to read note file: {}", e)),
            })?;

        Ok((note, content))
    }

    /// Delete a note. The record delete proceeds even if the file removal
    /// fails; the record is authoritative.
    pub async fn delete(&self, owner: &Identity, note_id: &str) -> Result<()> {
        let note = self
            .store
            .find(&owner.id, note_id)
            .await?
            .ok_or_else(|| Error::not_found("Note not found"))?;

        let path = self.notes_dir.join(&note.file_name);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    note_id = %note.id,
                    path = %path.display(),
                    error = %e,
                    "failed to delete note file, removing record anyway"
                );
            }
        }

        self.store.delete(&owner.id, note_id).await?;
        tracing::info!(note_id = %note_id, owner_id = %owner.id, "note deleted");
        Ok(())
    }

    pub fn notes_dir(&self) -> &Path {
        &self.notes_dir
    }
}

/// Filesystem-safe slug of a note title: alphanumerics kept, spaces turned
/// into underscores, everything else dropped, capped at 50 characters.
fn sanitize_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-' || *c == '_')
        .collect();
    kept.trim_end()
        .replace(' ', "_")
        .chars()
        .take(50)
        .collect()
}
