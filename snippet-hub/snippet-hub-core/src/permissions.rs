//! Authorization predicates over `(user, file)`. Pure functions; callers
//! supply whatever counts or records the decision needs.
//!
//! Visibility and edit mode are independent axes: a private file in
//! collaborative mode is editable by any authenticated user who can name its
//! id, but still only readable by its owner.

use crate::model::{EditMode, FileRecord, Role, Visibility, MAX_FILES_PER_USER};

/// Admins are exempt from the per-user file quota.
pub fn can_create(role: Role, owned_count: usize) -> bool {
    role == Role::Admin || owned_count < MAX_FILES_PER_USER
}

pub fn can_edit(user_id: &str, file: &FileRecord) -> bool {
    file.created_by == user_id || file.edit_mode == EditMode::Collaborative
}

/// Collaborators may edit but never delete.
pub fn can_delete(user_id: &str, file: &FileRecord) -> bool {
    file.created_by == user_id
}

pub fn can_read(user_id: Option<&str>, file: &FileRecord) -> bool {
    file.visibility == Visibility::Public || user_id == Some(file.created_by.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileId, NewFile};

    fn file(owner: &str, visibility: Visibility, edit_mode: EditMode) -> FileRecord {
        let mut record = FileRecord::new(
            NewFile {
                title: "t".into(),
                language: "rust".into(),
                content: String::new(),
                visibility,
                edit_mode,
            },
            owner.into(),
        );
        record.id = FileId::parse("0123456789abcdef01234567").unwrap();
        record
    }

    #[test]
    fn quota_boundary() {
        assert!(can_create(Role::User, MAX_FILES_PER_USER - 1));
        assert!(!can_create(Role::User, MAX_FILES_PER_USER));
        assert!(can_create(Role::Admin, MAX_FILES_PER_USER));
        assert!(can_create(Role::Admin, 100));
    }

    #[test]
    fn edit_owner_mode() {
        let f = file("alice", Visibility::Public, EditMode::Owner);
        assert!(can_edit("alice", &f));
        assert!(!can_edit("bob", &f));
    }

    #[test]
    fn edit_collaborative_mode_ignores_visibility() {
        let f = file("alice", Visibility::Private, EditMode::Collaborative);
        assert!(can_edit("bob", &f));
    }

    #[test]
    fn delete_is_owner_only() {
        let f = file("alice", Visibility::Public, EditMode::Collaborative);
        assert!(can_delete("alice", &f));
        assert!(!can_delete("bob", &f));
    }

    #[test]
    fn read_private_files() {
        let f = file("alice", Visibility::Private, EditMode::Owner);
        assert!(can_read(Some("alice"), &f));
        assert!(!can_read(Some("bob"), &f));
        assert!(!can_read(None, &f));

        let p = file("alice", Visibility::Public, EditMode::Owner);
        assert!(can_read(None, &p));
    }
}
