//! Flat variable substitution for prompt content.
//!
//! Placeholders are `{{name}}` where `name` matches `[A-Za-z_][A-Za-z0-9_]*`.
//! There is no other template syntax: no conditionals, loops, escapes or
//! partials. Substituted values are inserted verbatim and never rescanned.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;
use verso_core::{AppError, AppResult};

use crate::types::ChatMessage;

/// Regex pattern matching `{{placeholder}}` tokens.
pub const PLACEHOLDER_PATTERN: &str = r"\{\{([A-Za-z_][A-Za-z0-9_]*)\}\}";

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PLACEHOLDER_PATTERN).expect("valid regex"));

/// Placeholder names referenced by `content`, deduplicated, in first-seen order.
pub fn extract_variables(content: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(content) {
        push_unique(&mut names, &caps[1]);
    }
    names
}

/// Substitute `variables` into `content`.
///
/// The whole content is scanned once. If any referenced name has no binding,
/// nothing is returned except a single [`AppError::MissingVariables`] naming
/// every missing placeholder. Unreferenced variables are ignored.
///
/// # Example
/// ```
/// use std::collections::HashMap;
/// use verso_prompt::template::compile;
///
/// let vars = HashMap::from([("name".to_string(), "World".to_string())]);
/// assert_eq!(compile("Hello {{name}}", &vars).unwrap(), "Hello World");
/// ```
pub fn compile(content: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut missing = Vec::new();
    let compiled = substitute(content, variables, &mut missing);

    if !missing.is_empty() {
        return Err(AppError::MissingVariables(missing));
    }

    Ok(compiled)
}

/// Substitute `variables` into every message of a chat prompt.
///
/// Missing names are collected across all messages into one error.
pub fn compile_chat(
    messages: &[ChatMessage],
    variables: &HashMap<String, String>,
) -> AppResult<Vec<ChatMessage>> {
    let mut missing = Vec::new();

    let compiled: Vec<ChatMessage> = messages
        .iter()
        .map(|msg| ChatMessage {
            role: msg.role.clone(),
            content: substitute(&msg.content, variables, &mut missing),
        })
        .collect();

    if !missing.is_empty() {
        return Err(AppError::MissingVariables(missing));
    }

    Ok(compiled)
}

/// Parse chat prompt content: a non-empty JSON array of `{role, content}`.
pub fn parse_chat_messages(content: &str) -> AppResult<Vec<ChatMessage>> {
    let messages: Vec<ChatMessage> = serde_json::from_str(content).map_err(|e| {
        AppError::Validation(format!(
            "Chat prompt content must be a JSON array of {{role, content}} messages: {}",
            e
        ))
    })?;

    if messages.is_empty() {
        return Err(AppError::Validation(
            "Chat prompt must contain at least one message".to_string(),
        ));
    }

    if let Some(pos) = messages.iter().position(|m| m.role.trim().is_empty()) {
        return Err(AppError::Validation(format!(
            "Chat message {} has an empty role",
            pos
        )));
    }

    Ok(messages)
}

/// Placeholder names referenced anywhere in a chat prompt.
pub fn extract_chat_variables(messages: &[ChatMessage]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for msg in messages {
        for caps in PLACEHOLDER_RE.captures_iter(&msg.content) {
            push_unique(&mut names, &caps[1]);
        }
    }
    names
}

fn substitute(
    content: &str,
    variables: &HashMap<String, String>,
    missing: &mut Vec<String>,
) -> String {
    PLACEHOLDER_RE
        .replace_all(content, |caps: &Captures| {
            let name = &caps[1];
            match variables.get(name) {
                Some(value) => value.clone(),
                None => {
                    push_unique(missing, name);
                    String::new()
                }
            }
        })
        .into_owned()
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}
