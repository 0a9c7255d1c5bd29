//! Persistence interface for prompts, versions and labels.
//!
//! The engine never holds state of its own; everything lives behind
//! [`PromptStorage`]. Each method is atomic: it either applies completely or
//! not at all, including when the calling future is dropped mid-flight.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use verso_core::AppResult;

use crate::types::{
    Label, Prompt, PromptFilter, PromptId, PromptList, PromptPatch, PromptVersion, ProjectId,
    VersionDraft,
};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

/// Trait for prompt storage backends.
///
/// Implementations must guarantee:
/// - Version numbers per prompt are allocated from a per-prompt counter
///   under a per-prompt critical section: strictly increasing from 1, no
///   gaps, never reused. Different prompts must not serialize on each other.
/// - `put_label` checks the target version and writes the pointer in the
///   same critical section, so a label never references a missing version
///   and readers never see a partial update.
/// - Storage errors surface as `Internal`, uniqueness violations as `Conflict`.
#[async_trait]
pub trait PromptStorage: Send + Sync {
    /// Insert a prompt and its version 1 in one step.
    ///
    /// Fails with `Conflict` if the project already has a prompt with the same name.
    async fn insert_prompt(&self, prompt: Prompt, first: VersionDraft) -> AppResult<PromptVersion>;

    async fn get_prompt(&self, id: PromptId) -> AppResult<Option<Prompt>>;

    async fn find_prompt(&self, project_id: ProjectId, name: &str) -> AppResult<Option<Prompt>>;

    /// Read the prompt, apply `patch` with [`PromptPatch::apply`] and write it
    /// back, all in the prompt's critical section. Returns the stored result.
    ///
    /// `NotFound` if absent, `Conflict` on a rename collision, `Validation`
    /// on a kind change once versions exist.
    async fn update_prompt(
        &self,
        id: PromptId,
        patch: &PromptPatch,
        updated_at: DateTime<Utc>,
    ) -> AppResult<Prompt>;

    /// Delete a prompt with all of its versions and labels. `NotFound` if absent.
    async fn delete_prompt(&self, id: PromptId) -> AppResult<()>;

    /// Page through prompts matching `filter`, ordered by name.
    async fn list_prompts(
        &self,
        filter: &PromptFilter,
        limit: usize,
        offset: usize,
    ) -> AppResult<PromptList>;

    /// Allocate the next version number and store the draft under it.
    ///
    /// `NotFound` if the prompt does not exist.
    async fn append_version(&self, prompt_id: PromptId, draft: VersionDraft)
        -> AppResult<PromptVersion>;

    async fn get_version(&self, prompt_id: PromptId, version: i64)
        -> AppResult<Option<PromptVersion>>;

    /// Highest-numbered version of the prompt.
    async fn latest_version(&self, prompt_id: PromptId) -> AppResult<Option<PromptVersion>>;

    /// All versions of the prompt, newest first.
    async fn list_versions(&self, prompt_id: PromptId) -> AppResult<Vec<PromptVersion>>;

    /// Create or repoint a label. `NotFound` if the prompt or version does not exist.
    async fn put_label(&self, prompt_id: PromptId, name: &str, version: i64) -> AppResult<Label>;

    /// Remove a label. `NotFound` if it does not exist.
    async fn delete_label(&self, prompt_id: PromptId, name: &str) -> AppResult<()>;

    async fn get_label(&self, prompt_id: PromptId, name: &str) -> AppResult<Option<Label>>;

    /// All labels of the prompt, ordered by name.
    async fn list_labels(&self, prompt_id: PromptId) -> AppResult<Vec<Label>>;
}
