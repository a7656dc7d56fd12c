//! Records for shared code files and their owners.
//! Ids are opaque 24-hex-char strings so an external document store can be
//! swapped in without changing the wire shape.

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_CONTENT_LENGTH: usize = 500_000;
pub const MIN_TITLE_LENGTH: usize = 1;
pub const MAX_TITLE_LENGTH: usize = 100;
pub const MAX_FILES_PER_USER: usize = 5;

/// Canonical editor language choices. The stored `language` field is a free
/// string; this list only drives pickers.
pub const LANGUAGE_OPTIONS: [&str; 8] = [
    "javascript",
    "typescript",
    "python",
    "html",
    "css",
    "json",
    "markdown",
    "plaintext",
];

const FILE_ID_LEN: usize = 24;

/// Opaque file identifier: 24 lowercase hex characters.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    pub fn generate() -> Self {
        let mut bytes = [0u8; FILE_ID_LEN / 2];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Accepts exactly 24 hex characters, normalizing to lowercase.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() == FILE_ID_LEN && raw.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(Self(raw.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EditMode {
    Owner,
    Collaborative,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: FileId,
    pub title: String,
    pub language: String,
    pub content: String,
    pub visibility: Visibility,
    pub edit_mode: EditMode,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn new(input: NewFile, created_by: String) -> Self {
        let now = Utc::now();
        Self {
            id: FileId::generate(),
            title: input.title,
            language: input.language,
            content: input.content,
            visibility: input.visibility,
            edit_mode: input.edit_mode,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Input for `create_file`. Content defaults to empty so a bare editor
/// session can be created first and filled by autosave.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFile {
    pub title: String,
    pub language: String,
    #[serde(default)]
    pub content: String,
    pub visibility: Visibility,
    pub edit_mode: EditMode,
}

/// Partial settings update; only supplied fields are validated and applied.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSettingsUpdate {
    pub title: Option<String>,
    pub language: Option<String>,
    pub visibility: Option<Visibility>,
    pub edit_mode: Option<EditMode>,
}

impl FileSettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.language.is_none()
            && self.visibility.is_none()
            && self.edit_mode.is_none()
    }
}
