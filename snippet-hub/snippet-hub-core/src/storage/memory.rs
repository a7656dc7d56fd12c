use super::{FileChanges, FileStore, UserStore};
use crate::model::{FileId, FileRecord, UserRecord};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Process-local file store. Good for a single-instance deployment and for
/// tests; records do not survive a restart.
#[derive(Default)]
pub struct MemoryFileStore {
    files: RwLock<HashMap<FileId, FileRecord>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn find_by_id(&self, id: &FileId) -> Result<Option<FileRecord>> {
        Ok(self.files.read().get(id).cloned())
    }

    async fn find_by_owner(&self, owner: &str) -> Result<Vec<FileRecord>> {
        let mut owned: Vec<FileRecord> = self
            .files
            .read()
            .values()
            .filter(|f| f.created_by == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(owned)
    }

    async fn count_by_owner(&self, owner: &str) -> Result<usize> {
        Ok(self
            .files
            .read()
            .values()
            .filter(|f| f.created_by == owner)
            .count())
    }

    async fn insert(&self, record: FileRecord) -> Result<()> {
        self.files.write().insert(record.id.clone(), record);
        Ok(())
    }

    async fn update_by_id(&self, id: &FileId, changes: FileChanges) -> Result<Option<FileRecord>> {
        let mut files = self.files.write();
        let Some(record) = files.get_mut(id) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            record.title = title;
        }
        if let Some(language) = changes.language {
            record.language = language;
        }
        if let Some(content) = changes.content {
            record.content = content;
        }
        if let Some(visibility) = changes.visibility {
            record.visibility = visibility;
        }
        if let Some(edit_mode) = changes.edit_mode {
            record.edit_mode = edit_mode;
        }
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn delete_by_id(&self, id: &FileId) -> Result<bool> {
        Ok(self.files.write().remove(id).is_some())
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.read().get(id).cloned())
    }

    async fn insert(&self, record: UserRecord) -> Result<()> {
        self.users.write().insert(record.id.clone(), record);
        Ok(())
    }
}
