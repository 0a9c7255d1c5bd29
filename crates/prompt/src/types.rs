//! Prompt types for Verso.
//!
//! This module defines the domain entities of the prompt engine: prompts,
//! their immutable versions, the labels that point at versions, and the
//! inputs and outputs of the service operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use verso_core::{AppError, AppResult};

/// Identifier of a prompt.
pub type PromptId = Uuid;

/// Identifier of the project owning a prompt.
pub type ProjectId = Uuid;

/// Opaque key/value metadata attached to a version.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// The user on whose behalf a mutating call runs.
///
/// Callers that cannot identify a user (for example key-based automation)
/// pass [`ActorId::system`] explicitly; the engine never invents one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(Uuid);

impl ActorId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// The system sentinel (the nil UUID).
    pub fn system() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_system(&self) -> bool {
        self.0.is_nil()
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_system() {
            f.write_str("system")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Shape of a prompt's content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    /// Plain text template
    #[default]
    Text,
    /// JSON array of `{role, content}` messages
    Chat,
}

impl PromptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptKind::Text => "text",
            PromptKind::Chat => "chat",
        }
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptKind {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "text" => Ok(PromptKind::Text),
            "chat" => Ok(PromptKind::Chat),
            other => Err(AppError::Validation(format!(
                "Unknown prompt kind '{}'. Supported: text, chat",
                other
            ))),
        }
    }
}

/// A named, versioned template owned by a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id: PromptId,
    pub project_id: ProjectId,
    /// Unique within the project
    pub name: String,
    pub kind: PromptKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One immutable snapshot of a prompt's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptVersion {
    pub id: Uuid,
    pub prompt_id: PromptId,
    /// Positive, gapless from 1, never reused
    pub version: i64,
    pub content: String,
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_message: Option<String>,
    /// Placeholder names referenced by the content, first-seen order
    pub variables: Vec<String>,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
}

/// A mutable named pointer from a prompt to one of its versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub prompt_id: PromptId,
    pub name: String,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

/// A version that has been validated but not yet numbered.
///
/// Storage assigns the version number when it appends the draft.
#[derive(Debug, Clone)]
pub struct VersionDraft {
    pub id: Uuid,
    pub content: String,
    pub metadata: Metadata,
    pub commit_message: Option<String>,
    pub variables: Vec<String>,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
}

impl VersionDraft {
    /// Attach the allocated number, producing the stored version.
    pub fn into_version(self, prompt_id: PromptId, version: i64) -> PromptVersion {
        PromptVersion {
            id: self.id,
            prompt_id,
            version,
            content: self.content,
            metadata: self.metadata,
            commit_message: self.commit_message,
            variables: self.variables,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

/// Input for creating a prompt together with its first version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPrompt {
    pub name: String,
    #[serde(default)]
    pub kind: PromptKind,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub commit_message: Option<String>,
}

impl NewPrompt {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: PromptKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Input for appending a version to an existing prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVersion {
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub commit_message: Option<String>,
}

impl NewVersion {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_commit_message(mut self, message: impl Into<String>) -> Self {
        self.commit_message = Some(message.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Prompt-level fields that may change after creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptPatch {
    /// Rename; must stay unique within the project
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind: Option<PromptKind>,
    pub tags: Option<Vec<String>>,
}

impl PromptPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.kind.is_none() && self.tags.is_none()
    }

    /// Apply the set fields onto `prompt`. Storage calls this inside the
    /// prompt's critical section so concurrent patches never overwrite
    /// each other's fields.
    ///
    /// The kind is frozen once the prompt has a version: stored content was
    /// validated against the old kind and is never rewritten.
    pub fn apply(
        &self,
        prompt: &mut Prompt,
        has_versions: bool,
        updated_at: DateTime<Utc>,
    ) -> AppResult<()> {
        if let Some(kind) = self.kind {
            if kind != prompt.kind && has_versions {
                return Err(AppError::Validation(format!(
                    "Cannot change kind of prompt '{}' from {} to {}: it already has versions",
                    prompt.name, prompt.kind, kind
                )));
            }
            prompt.kind = kind;
        }
        if let Some(ref name) = self.name {
            prompt.name = name.clone();
        }
        if let Some(ref description) = self.description {
            prompt.description = Some(description.clone()).filter(|d| !d.is_empty());
        }
        if let Some(ref tags) = self.tags {
            prompt.tags = tags.clone();
        }
        prompt.updated_at = updated_at;
        Ok(())
    }
}

/// Filter options for listing prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFilter {
    pub project_id: ProjectId,
    /// Case-insensitive substring of the name
    pub name: Option<String>,
    /// Match prompts carrying any of these tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Match prompts that have a label with this name
    pub label: Option<String>,
}

impl PromptFilter {
    pub fn project(project_id: ProjectId) -> Self {
        Self {
            project_id,
            name: None,
            tags: Vec::new(),
            label: None,
        }
    }
}

/// A page of prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptList {
    pub prompts: Vec<Prompt>,
    pub total_count: u64,
    pub has_more: bool,
}

/// A prompt with its newest version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptDetail {
    pub prompt: Prompt,
    pub latest_version: Option<PromptVersion>,
}

/// How a version was picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "by", content = "value")]
pub enum Resolution {
    /// Exact version number was requested
    Version(i64),
    /// A label pointed at the version
    Label(String),
    /// Highest version number, used when the default label is absent
    Latest,
}

/// A prompt together with the version a lookup resolved to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPrompt {
    pub prompt: Prompt,
    pub version: PromptVersion,
    pub resolution: Resolution,
}

/// Which version a read or compile should use.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VersionSelector {
    /// Default label, then latest
    #[default]
    Default,
    Version(i64),
    Label(String),
}

/// Optional pins for `compile`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompileOptions {
    pub version: Option<i64>,
    pub label: Option<String>,
}

impl CompileOptions {
    /// An explicit version wins over a label.
    pub fn selector(&self) -> VersionSelector {
        match (self.version, self.label.as_deref()) {
            (Some(version), _) => VersionSelector::Version(version),
            (None, Some(label)) if !label.is_empty() => VersionSelector::Label(label.to_string()),
            _ => VersionSelector::Default,
        }
    }
}

/// A message of a chat prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// A compiled prompt ready for use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledPrompt {
    pub prompt: Prompt,
    pub version: i64,
    pub resolution: Resolution,
    /// Final text; for chat prompts the compiled messages as JSON
    pub compiled: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ChatMessage>>,
    pub variables: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_display() {
        assert_eq!(ActorId::system().to_string(), "system");
        assert!(ActorId::system().is_system());

        let id = Uuid::new_v4();
        assert_eq!(ActorId::new(id).to_string(), id.to_string());
        assert!(!ActorId::new(id).is_system());
    }

    #[test]
    fn test_prompt_kind_parse() {
        assert_eq!("chat".parse::<PromptKind>().unwrap(), PromptKind::Chat);
        assert_eq!("text".parse::<PromptKind>().unwrap(), PromptKind::Text);
        assert!("html".parse::<PromptKind>().is_err());
    }

    #[test]
    fn test_compile_options_selector() {
        let opts = CompileOptions {
            version: Some(3),
            label: Some("staging".to_string()),
        };
        assert_eq!(opts.selector(), VersionSelector::Version(3));

        let opts = CompileOptions {
            version: None,
            label: Some("staging".to_string()),
        };
        assert_eq!(opts.selector(), VersionSelector::Label("staging".to_string()));

        assert_eq!(CompileOptions::default().selector(), VersionSelector::Default);
    }

    #[test]
    fn test_new_prompt_deserialization_defaults() {
        let input: NewPrompt =
            serde_json::from_str(r#"{"name": "greeting", "content": "Hi {{user}}"}"#).unwrap();
        assert_eq!(input.kind, PromptKind::Text);
        assert!(input.tags.is_empty());
        assert!(input.metadata.is_empty());
    }

    #[test]
    fn test_resolution_serialization() {
        let json = serde_json::to_value(Resolution::Label("production".into())).unwrap();
        assert_eq!(json, serde_json::json!({"by": "label", "value": "production"}));
        let json = serde_json::to_value(Resolution::Latest).unwrap();
        assert_eq!(json, serde_json::json!({"by": "latest"}));
    }
}
