//! Input validation for prompt operations.

use verso_core::{AppError, AppResult};

use crate::template;
use crate::types::PromptKind;

/// Maximum length for a prompt name in characters.
pub const MAX_NAME_LENGTH: usize = 200;

/// Maximum length for a label name in characters.
pub const MAX_LABEL_LENGTH: usize = 100;

/// Maximum number of tags on a prompt.
pub const MAX_TAGS_COUNT: usize = 20;

/// Maximum length for a version commit message in characters.
pub const MAX_COMMIT_MESSAGE_LENGTH: usize = 1_000;

/// Validate a prompt name: non-empty and within the length limit.
pub fn validate_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation(
            "Prompt name must not be empty".to_string(),
        ));
    }
    let len = name.chars().count();
    if len > MAX_NAME_LENGTH {
        return Err(AppError::Validation(format!(
            "Prompt name exceeds maximum length of {MAX_NAME_LENGTH} characters (got {len})"
        )));
    }
    Ok(())
}

/// Validate version content for the given prompt kind.
pub fn validate_content(kind: PromptKind, content: &str) -> AppResult<()> {
    if content.is_empty() {
        return Err(AppError::Validation(
            "Prompt content must not be empty".to_string(),
        ));
    }
    if kind == PromptKind::Chat {
        template::parse_chat_messages(content)?;
    }
    Ok(())
}

/// Validate a label name: non-empty, no whitespace, within the length limit.
pub fn validate_label(label: &str) -> AppResult<()> {
    if label.is_empty() {
        return Err(AppError::Validation(
            "Label name must not be empty".to_string(),
        ));
    }
    if label.chars().any(char::is_whitespace) {
        return Err(AppError::Validation(format!(
            "Label name '{label}' must not contain whitespace"
        )));
    }
    let len = label.chars().count();
    if len > MAX_LABEL_LENGTH {
        return Err(AppError::Validation(format!(
            "Label name exceeds maximum length of {MAX_LABEL_LENGTH} characters (got {len})"
        )));
    }
    Ok(())
}

/// Validate a caller-supplied version number: must be positive.
pub fn validate_version_number(version: i64) -> AppResult<()> {
    if version <= 0 {
        return Err(AppError::Validation(format!(
            "Version number must be positive (got {version})"
        )));
    }
    Ok(())
}

/// Validate tags: count limit and no empty entries.
pub fn validate_tags(tags: &[String]) -> AppResult<()> {
    if tags.len() > MAX_TAGS_COUNT {
        return Err(AppError::Validation(format!(
            "Tag count exceeds maximum of {MAX_TAGS_COUNT} (got {})",
            tags.len()
        )));
    }
    if tags.iter().any(|t| t.trim().is_empty()) {
        return Err(AppError::Validation("Tags must not be empty".to_string()));
    }
    Ok(())
}

/// Validate a commit message: length check only.
pub fn validate_commit_message(message: Option<&str>) -> AppResult<()> {
    if let Some(message) = message {
        let len = message.chars().count();
        if len > MAX_COMMIT_MESSAGE_LENGTH {
            return Err(AppError::Validation(format!(
                "Commit message exceeds maximum length of {MAX_COMMIT_MESSAGE_LENGTH} characters (got {len})"
            )));
        }
    }
    Ok(())
}
