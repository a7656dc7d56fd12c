//! Persistence facade over file and user records.
//!
//! Backends expose simple key-value semantics with optimistic
//! find-and-update writes; the in-memory implementation in [`memory`] is the
//! default and an external document store can be swapped in behind the same
//! traits.

use crate::model::{EditMode, FileId, FileRecord, UserRecord, Visibility};
use anyhow::Result;
use async_trait::async_trait;

pub mod memory;

/// Partial update applied atomically by `update_by_id`. Absent fields are
/// left untouched; `updated_at` is refreshed on every applied write.
#[derive(Clone, Debug, Default)]
pub struct FileChanges {
    pub title: Option<String>,
    pub language: Option<String>,
    pub content: Option<String>,
    pub visibility: Option<Visibility>,
    pub edit_mode: Option<EditMode>,
}

impl FileChanges {
    pub fn content(content: String) -> Self {
        Self {
            content: Some(content),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.language.is_none()
            && self.content.is_none()
            && self.visibility.is_none()
            && self.edit_mode.is_none()
    }
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn find_by_id(&self, id: &FileId) -> Result<Option<FileRecord>>;

    /// Owned files, most recently updated first (dashboard order).
    async fn find_by_owner(&self, owner: &str) -> Result<Vec<FileRecord>>;

    async fn count_by_owner(&self, owner: &str) -> Result<usize>;

    async fn insert(&self, record: FileRecord) -> Result<()>;

    /// Find-and-update: returns the updated record, or `None` when the id is
    /// absent.
    async fn update_by_id(&self, id: &FileId, changes: FileChanges) -> Result<Option<FileRecord>>;

    /// Returns whether a record was removed.
    async fn delete_by_id(&self, id: &FileId) -> Result<bool>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>>;
    async fn insert(&self, record: UserRecord) -> Result<()>;
}
