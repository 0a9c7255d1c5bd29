//! Mutable named pointers to versions.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use verso_core::{AppError, AppResult};

use crate::storage::PromptStorage;
use crate::types::{Label, PromptId};
use crate::validation::{validate_label, validate_version_number};

/// Outcome of [`LabelRegistry::set_label`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "action")]
pub enum LabelChange {
    /// Label created or repointed
    Assigned { label: Label },
    /// Label removed
    Removed { prompt_id: PromptId, name: String },
}

/// Sets, removes and reads labels. Each label is singly-valued per prompt;
/// storage applies a repoint as one atomic upsert.
pub struct LabelRegistry<S> {
    storage: Arc<S>,
}

impl<S> Clone for LabelRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: PromptStorage> LabelRegistry<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Point `name` at `version` (`active`), or remove it (`!active`).
    ///
    /// When removing, `version` is not consulted. Concurrent repoints of the
    /// same label end in exactly one of the requested versions.
    pub async fn set_label(
        &self,
        prompt_id: PromptId,
        version: i64,
        name: &str,
        active: bool,
    ) -> AppResult<LabelChange> {
        validate_label(name)?;

        if active {
            validate_version_number(version)?;
            tracing::debug!("Pointing label '{}' of {} at version {}", name, prompt_id, version);

            let label = self.storage.put_label(prompt_id, name, version).await?;
            tracing::info!(prompt_id = %prompt_id, label = name, version, "Label assigned");
            Ok(LabelChange::Assigned { label })
        } else {
            tracing::debug!("Removing label '{}' from {}", name, prompt_id);

            self.storage.delete_label(prompt_id, name).await?;
            tracing::info!(prompt_id = %prompt_id, label = name, "Label removed");
            Ok(LabelChange::Removed {
                prompt_id,
                name: name.to_string(),
            })
        }
    }

    /// Version number the label points at.
    pub async fn get_label(&self, prompt_id: PromptId, name: &str) -> AppResult<i64> {
        validate_label(name)?;
        self.lookup(prompt_id, name)
            .await?
            .map(|label| label.version)
            .ok_or_else(|| label_not_found(prompt_id, name))
    }

    /// The label if it exists; absence is not an error here.
    pub async fn lookup(&self, prompt_id: PromptId, name: &str) -> AppResult<Option<Label>> {
        self.storage.get_label(prompt_id, name).await
    }

    /// All labels of the prompt, ordered by name.
    pub async fn list_labels(&self, prompt_id: PromptId) -> AppResult<Vec<Label>> {
        if self.storage.get_prompt(prompt_id).await?.is_none() {
            return Err(AppError::NotFound(format!("prompt {}", prompt_id)));
        }
        self.storage.list_labels(prompt_id).await
    }
}

pub(crate) fn label_not_found(prompt_id: PromptId, name: &str) -> AppError {
    AppError::NotFound(format!("label '{}' on prompt {}", name, prompt_id))
}
