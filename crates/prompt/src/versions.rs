//! Immutable content versions of a prompt.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use verso_core::{AppError, AppResult};

use crate::storage::PromptStorage;
use crate::template;
use crate::types::{ActorId, NewVersion, Prompt, PromptId, PromptKind, PromptVersion, VersionDraft};
use crate::validation::{validate_commit_message, validate_content, validate_version_number};

/// Appends and reads versions. Number allocation is delegated to storage,
/// which does it under the prompt's own critical section.
pub struct VersionStore<S> {
    storage: Arc<S>,
}

impl<S> Clone for VersionStore<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: PromptStorage> VersionStore<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Append a version with the next free number.
    ///
    /// Never moves a label; promotion is a separate `set_label` call.
    pub async fn create_version(
        &self,
        prompt_id: PromptId,
        input: NewVersion,
        author: ActorId,
    ) -> AppResult<PromptVersion> {
        tracing::debug!("Creating version for prompt {}", prompt_id);

        let prompt = self.require_prompt(prompt_id).await?;
        let draft = draft_version(prompt.kind, input, author)?;
        let version = self.storage.append_version(prompt_id, draft).await?;

        tracing::info!(
            prompt = %prompt.name,
            version = version.version,
            author = %author,
            "Created prompt version"
        );
        Ok(version)
    }

    /// Versions of the prompt, newest first.
    pub async fn list_versions(&self, prompt_id: PromptId) -> AppResult<Vec<PromptVersion>> {
        self.require_prompt(prompt_id).await?;
        self.storage.list_versions(prompt_id).await
    }

    pub async fn get_version(&self, prompt_id: PromptId, version: i64) -> AppResult<PromptVersion> {
        validate_version_number(version)?;
        self.storage
            .get_version(prompt_id, version)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("version {} of prompt {}", version, prompt_id))
            })
    }

    /// Highest-numbered version, `None` if the prompt has none.
    pub async fn latest_version(&self, prompt_id: PromptId) -> AppResult<Option<PromptVersion>> {
        self.storage.latest_version(prompt_id).await
    }

    async fn require_prompt(&self, prompt_id: PromptId) -> AppResult<Prompt> {
        self.storage
            .get_prompt(prompt_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("prompt {}", prompt_id)))
    }
}

/// Validate `input` against the prompt kind and turn it into an unnumbered draft.
pub(crate) fn draft_version(
    kind: PromptKind,
    input: NewVersion,
    author: ActorId,
) -> AppResult<VersionDraft> {
    validate_content(kind, &input.content)?;
    validate_commit_message(input.commit_message.as_deref())?;

    let variables = match kind {
        PromptKind::Text => template::extract_variables(&input.content),
        PromptKind::Chat => {
            template::extract_chat_variables(&template::parse_chat_messages(&input.content)?)
        }
    };

    Ok(VersionDraft {
        id: Uuid::new_v4(),
        content: input.content,
        metadata: input.metadata,
        commit_message: input.commit_message,
        variables,
        created_by: author,
        created_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    async fn seeded(kind: PromptKind) -> (VersionStore<MemoryStorage>, PromptId) {
        let storage = Arc::new(MemoryStorage::new());
        let now = Utc::now();
        let prompt = Prompt {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: "summarize".to_string(),
            kind,
            description: None,
            tags: Vec::new(),
            created_by: ActorId::system(),
            created_at: now,
            updated_at: now,
        };
        let id = prompt.id;
        let content = match kind {
            PromptKind::Text => "v1 {{doc}}",
            PromptKind::Chat => r#"[{"role":"user","content":"{{doc}}"}]"#,
        };
        let first = draft_version(kind, NewVersion::new(content), ActorId::system()).unwrap();
        storage.insert_prompt(prompt, first).await.unwrap();
        (VersionStore::new(storage), id)
    }

    #[tokio::test]
    async fn test_create_version_allocates_next_number() {
        let (store, id) = seeded(PromptKind::Text).await;
        let author = ActorId::new(Uuid::new_v4());

        let v2 = store
            .create_version(id, NewVersion::new("v2 {{doc}} {{style}}"), author)
            .await
            .unwrap();
        assert_eq!(v2.version, 2);
        assert_eq!(v2.variables, vec!["doc", "style"]);
        assert_eq!(v2.created_by, author);

        let listed: Vec<i64> = store
            .list_versions(id)
            .await
            .unwrap()
            .iter()
            .map(|v| v.version)
            .collect();
        assert_eq!(listed, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_create_version_rejects_empty_content() {
        let (store, id) = seeded(PromptKind::Text).await;
        let err = store
            .create_version(id, NewVersion::new(""), ActorId::system())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.latest_version(id).await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_chat_versions_validated_and_scanned() {
        let (store, id) = seeded(PromptKind::Chat).await;

        let err = store
            .create_version(id, NewVersion::new("plain text"), ActorId::system())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let v2 = store
            .create_version(
                id,
                NewVersion::new(
                    r#"[{"role":"system","content":"{{tone}}"},{"role":"user","content":"{{doc}}"}]"#,
                ),
                ActorId::system(),
            )
            .await
            .unwrap();
        assert_eq!(v2.variables, vec!["tone", "doc"]);
    }

    #[tokio::test]
    async fn test_unknown_prompt_and_version() {
        let (store, id) = seeded(PromptKind::Text).await;

        let err = store
            .create_version(Uuid::new_v4(), NewVersion::new("x"), ActorId::system())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(store.list_versions(Uuid::new_v4()).await.unwrap_err().is_not_found());

        assert!(store.get_version(id, 7).await.unwrap_err().is_not_found());
        assert!(matches!(
            store.get_version(id, 0).await,
            Err(AppError::Validation(_))
        ));
    }
}
