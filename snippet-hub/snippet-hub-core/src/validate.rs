//! Input validation for file mutations. Violations are collected and joined
//! into a single human-readable message.

use crate::error::CoreError;
use crate::model::{
    FileId, FileSettingsUpdate, NewFile, MAX_CONTENT_LENGTH, MAX_TITLE_LENGTH, MIN_TITLE_LENGTH,
};

pub fn parse_file_id(raw: &str) -> Result<FileId, CoreError> {
    FileId::parse(raw).ok_or_else(|| CoreError::ValidationFailed("Invalid file ID format".into()))
}

/// NUL bytes are stripped; they survive some editor paste paths and break
/// downstream stores.
fn sanitize_content(content: &str) -> String {
    content.replace('\0', "")
}

fn check_title(raw: &str, violations: &mut Vec<String>) -> String {
    let title = raw.trim().to_string();
    if title.len() < MIN_TITLE_LENGTH {
        violations.push("Title is required".into());
    } else if title.len() > MAX_TITLE_LENGTH {
        violations.push(format!("Title must be {MAX_TITLE_LENGTH} characters or less"));
    }
    title
}

fn check_language(raw: &str, violations: &mut Vec<String>) -> String {
    let language = raw.trim().to_string();
    if language.is_empty() {
        violations.push("Language is required".into());
    }
    language
}

fn check_content(raw: &str, violations: &mut Vec<String>) -> String {
    if raw.len() > MAX_CONTENT_LENGTH {
        violations.push(format!(
            "Content exceeds maximum length of {MAX_CONTENT_LENGTH} characters"
        ));
    }
    sanitize_content(raw)
}

fn fail(violations: Vec<String>) -> CoreError {
    CoreError::ValidationFailed(violations.join(", "))
}

/// Full-schema validation for create. Returns the normalized input.
pub fn validate_new_file(input: NewFile) -> Result<NewFile, CoreError> {
    let mut violations = Vec::new();
    let title = check_title(&input.title, &mut violations);
    let language = check_language(&input.language, &mut violations);
    let content = check_content(&input.content, &mut violations);
    if !violations.is_empty() {
        return Err(fail(violations));
    }
    Ok(NewFile {
        title,
        language,
        content,
        visibility: input.visibility,
        edit_mode: input.edit_mode,
    })
}

/// Content-only validation for the autosave path.
pub fn validate_content(raw: &str) -> Result<String, CoreError> {
    let mut violations = Vec::new();
    let content = check_content(raw, &mut violations);
    if !violations.is_empty() {
        return Err(fail(violations));
    }
    Ok(content)
}

/// Optional title carried alongside a content update.
pub fn validate_title(raw: &str) -> Result<String, CoreError> {
    let mut violations = Vec::new();
    let title = check_title(raw, &mut violations);
    if !violations.is_empty() {
        return Err(fail(violations));
    }
    Ok(title)
}

/// Partial validation: only supplied fields are checked.
pub fn validate_settings(update: FileSettingsUpdate) -> Result<FileSettingsUpdate, CoreError> {
    let mut violations = Vec::new();
    let title = update.title.map(|t| check_title(&t, &mut violations));
    let language = update.language.map(|l| check_language(&l, &mut violations));
    if !violations.is_empty() {
        return Err(fail(violations));
    }
    Ok(FileSettingsUpdate {
        title,
        language,
        visibility: update.visibility,
        edit_mode: update.edit_mode,
    })
}
