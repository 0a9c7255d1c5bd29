//! The public contract of the prompt engine.
//!
//! [`PromptService`] composes the version store, label registry, resolver
//! and template compiler. It owns the invariants that span more than one of
//! them: name uniqueness, author attribution and input validation. Errors
//! from the components pass through with their kind intact; at most a
//! context prefix is added.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use verso_core::config::{AppConfig, DEFAULT_LABEL, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use verso_core::{AppError, AppResult};

use crate::labels::{LabelChange, LabelRegistry};
use crate::resolver::Resolver;
use crate::storage::PromptStorage;
use crate::template;
use crate::types::{
    ActorId, CompileOptions, CompiledPrompt, Label, NewPrompt, NewVersion, ProjectId, Prompt,
    PromptDetail, PromptFilter, PromptId, PromptKind, PromptList, PromptPatch, PromptVersion,
    ResolvedPrompt,
};
use crate::validation::{validate_label, validate_name, validate_tags};
use crate::versions::{draft_version, VersionStore};

/// Commit message given to version 1 when the caller supplies none.
pub const INITIAL_COMMIT_MESSAGE: &str = "Initial version";

/// Engine settings taken from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Label tried before falling back to the latest version
    pub default_label: String,
    /// Page size when the caller does not pass a limit
    pub list_limit: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_label: DEFAULT_LABEL.to_string(),
            list_limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl From<&AppConfig> for ServiceConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            default_label: config.default_label.clone(),
            list_limit: config.list_limit.clamp(1, MAX_LIST_LIMIT),
        }
    }
}

pub struct PromptService<S> {
    storage: Arc<S>,
    versions: VersionStore<S>,
    labels: LabelRegistry<S>,
    resolver: Resolver<S>,
    config: ServiceConfig,
}

impl<S> Clone for PromptService<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            versions: self.versions.clone(),
            labels: self.labels.clone(),
            resolver: self.resolver.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: PromptStorage> PromptService<S> {
    pub fn new(storage: Arc<S>, config: ServiceConfig) -> Self {
        Self {
            versions: VersionStore::new(Arc::clone(&storage)),
            labels: LabelRegistry::new(Arc::clone(&storage)),
            resolver: Resolver::with_default_label(Arc::clone(&storage), &config.default_label),
            storage,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Create a prompt and its version 1 atomically.
    ///
    /// Fails with `Conflict` if the project already has a prompt named `input.name`.
    pub async fn create(
        &self,
        project_id: ProjectId,
        input: NewPrompt,
        author: ActorId,
    ) -> AppResult<PromptDetail> {
        tracing::debug!("Creating prompt '{}' in project {}", input.name, project_id);

        validate_name(&input.name)?;
        validate_tags(&input.tags)?;

        let first = draft_version(
            input.kind,
            NewVersion {
                content: input.content,
                metadata: input.metadata,
                commit_message: Some(
                    input
                        .commit_message
                        .unwrap_or_else(|| INITIAL_COMMIT_MESSAGE.to_string()),
                ),
            },
            author,
        )?;

        let now = Utc::now();
        let prompt = Prompt {
            id: Uuid::new_v4(),
            project_id,
            name: input.name,
            kind: input.kind,
            description: input.description.filter(|d| !d.is_empty()),
            tags: input.tags,
            created_by: author,
            created_at: now,
            updated_at: now,
        };

        let version = self.storage.insert_prompt(prompt.clone(), first).await?;

        tracing::info!(
            prompt_id = %prompt.id,
            prompt = %prompt.name,
            author = %author,
            "Created prompt"
        );

        Ok(PromptDetail {
            prompt,
            latest_version: Some(version),
        })
    }

    /// A prompt by id, with its latest version.
    pub async fn get(&self, prompt_id: PromptId) -> AppResult<PromptDetail> {
        let prompt = self.require_prompt(prompt_id).await?;
        let latest_version = self.versions.latest_version(prompt_id).await?;
        Ok(PromptDetail {
            prompt,
            latest_version,
        })
    }

    /// The prompt record alone, without resolving a version.
    pub async fn find_by_name(&self, project_id: ProjectId, name: &str) -> AppResult<Prompt> {
        self.storage
            .find_prompt(project_id, name)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("prompt '{}' in project {}", name, project_id))
            })
    }

    /// Resolve through the default chain: default label, then latest.
    pub async fn get_by_name(&self, project_id: ProjectId, name: &str) -> AppResult<ResolvedPrompt> {
        self.resolver.resolve_default(project_id, name).await
    }

    pub async fn get_by_name_and_version(
        &self,
        project_id: ProjectId,
        name: &str,
        version: i64,
    ) -> AppResult<ResolvedPrompt> {
        self.resolver.by_version(project_id, name, version).await
    }

    pub async fn get_by_name_and_label(
        &self,
        project_id: ProjectId,
        name: &str,
        label: &str,
    ) -> AppResult<ResolvedPrompt> {
        self.resolver.by_label(project_id, name, label).await
    }

    /// Page through a project's prompts, ordered by name.
    ///
    /// `limit` falls back to the configured page size and is capped at 100.
    pub async fn list(
        &self,
        filter: &PromptFilter,
        limit: Option<usize>,
        offset: usize,
    ) -> AppResult<PromptList> {
        if let Some(ref label) = filter.label {
            validate_label(label)?;
        }

        let limit = match limit {
            Some(0) | None => self.config.list_limit,
            Some(limit) => limit,
        }
        .min(MAX_LIST_LIMIT);

        self.storage.list_prompts(filter, limit, offset).await
    }

    /// Change prompt-level fields. Version content is never touched.
    pub async fn update(
        &self,
        prompt_id: PromptId,
        patch: PromptPatch,
        actor: ActorId,
    ) -> AppResult<Prompt> {
        if patch.is_empty() {
            return Err(AppError::Validation("Nothing to update".to_string()));
        }

        if let Some(ref name) = patch.name {
            validate_name(name)?;
        }
        if let Some(ref tags) = patch.tags {
            validate_tags(tags)?;
        }

        let prompt = self
            .storage
            .update_prompt(prompt_id, &patch, Utc::now())
            .await?;

        tracing::info!(prompt_id = %prompt.id, prompt = %prompt.name, actor = %actor, "Updated prompt");
        Ok(prompt)
    }

    /// Delete a prompt together with every version and label. Irreversible.
    pub async fn delete(&self, prompt_id: PromptId, actor: ActorId) -> AppResult<()> {
        tracing::debug!("Deleting prompt {}", prompt_id);
        self.storage.delete_prompt(prompt_id).await?;
        tracing::info!(prompt_id = %prompt_id, actor = %actor, "Deleted prompt");
        Ok(())
    }

    pub async fn list_versions(&self, prompt_id: PromptId) -> AppResult<Vec<PromptVersion>> {
        self.versions.list_versions(prompt_id).await
    }

    pub async fn get_version(&self, prompt_id: PromptId, version: i64) -> AppResult<PromptVersion> {
        self.versions.get_version(prompt_id, version).await
    }

    /// Append a version. Labels stay where they are.
    pub async fn create_version(
        &self,
        prompt_id: PromptId,
        input: NewVersion,
        author: ActorId,
    ) -> AppResult<PromptVersion> {
        self.versions.create_version(prompt_id, input, author).await
    }

    pub async fn set_version_label(
        &self,
        prompt_id: PromptId,
        version: i64,
        label: &str,
        active: bool,
        actor: ActorId,
    ) -> AppResult<LabelChange> {
        tracing::debug!(actor = %actor, "Setting label '{}' on {}", label, prompt_id);
        self.labels.set_label(prompt_id, version, label, active).await
    }

    pub async fn get_label(&self, prompt_id: PromptId, label: &str) -> AppResult<i64> {
        self.labels.get_label(prompt_id, label).await
    }

    pub async fn list_labels(&self, prompt_id: PromptId) -> AppResult<Vec<Label>> {
        self.labels.list_labels(prompt_id).await
    }

    /// Resolve a version and substitute `variables` into it.
    ///
    /// A pinned version wins over a label; with neither, the default chain
    /// applies. Every missing placeholder is reported in one error.
    pub async fn compile(
        &self,
        project_id: ProjectId,
        name: &str,
        variables: &HashMap<String, String>,
        options: &CompileOptions,
    ) -> AppResult<CompiledPrompt> {
        let resolved = self
            .resolver
            .resolve(project_id, name, &options.selector())
            .await?;
        let number = resolved.version.version;
        tracing::debug!("Compiling '{}' version {}", name, number);

        let (compiled, messages) = match resolved.prompt.kind {
            PromptKind::Text => (template::compile(&resolved.version.content, variables)?, None),
            PromptKind::Chat => {
                let messages = template::parse_chat_messages(&resolved.version.content)
                    .map_err(|e| e.context(format!("prompt '{}' version {}", name, number)))?;
                let messages = template::compile_chat(&messages, variables)?;
                (serde_json::to_string(&messages)?, Some(messages))
            }
        };

        Ok(CompiledPrompt {
            prompt: resolved.prompt,
            version: number,
            resolution: resolved.resolution,
            compiled,
            messages,
            variables: variables.clone(),
        })
    }

    async fn require_prompt(&self, prompt_id: PromptId) -> AppResult<Prompt> {
        self.storage
            .get_prompt(prompt_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("prompt {}", prompt_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, SqliteStorage};
    use crate::types::Resolution;
    use std::collections::HashSet;

    fn memory() -> PromptService<MemoryStorage> {
        PromptService::new(Arc::new(MemoryStorage::new()), ServiceConfig::default())
    }

    fn sqlite() -> PromptService<SqliteStorage> {
        PromptService::new(
            Arc::new(SqliteStorage::in_memory().unwrap()),
            ServiceConfig::default(),
        )
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn author() -> ActorId {
        ActorId::new(Uuid::new_v4())
    }

    async fn concurrent_versions_are_gapless<S: PromptStorage + 'static>(svc: PromptService<S>) {
        let project = Uuid::new_v4();
        let created = svc
            .create(project, NewPrompt::new("busy", "v1"), author())
            .await
            .unwrap();
        let id = created.prompt.id;

        const N: usize = 24;
        let tasks: Vec<_> = (0..N)
            .map(|i| {
                let svc = svc.clone();
                tokio::spawn(async move {
                    svc.create_version(id, NewVersion::new(format!("c{}", i)), ActorId::system())
                        .await
                })
            })
            .collect();

        let numbers: HashSet<i64> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap().unwrap().version)
            .collect();

        let expected: HashSet<i64> = (2..=(N as i64 + 1)).collect();
        assert_eq!(numbers, expected);

        let listed: Vec<i64> = svc
            .list_versions(id)
            .await
            .unwrap()
            .iter()
            .map(|v| v.version)
            .collect();
        let descending: Vec<i64> = (1..=(N as i64 + 1)).rev().collect();
        assert_eq!(listed, descending);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_versions_are_gapless() {
        concurrent_versions_are_gapless(memory()).await;
        concurrent_versions_are_gapless(sqlite()).await;
    }

    async fn concurrent_fresh_prompts_do_not_interfere<S: PromptStorage + 'static>(
        svc: PromptService<S>,
    ) {
        let project = Uuid::new_v4();
        let mut ids = Vec::new();
        for i in 0..4 {
            let created = svc
                .create(project, NewPrompt::new(format!("p{}", i), "v1"), author())
                .await
                .unwrap();
            ids.push(created.prompt.id);
        }

        let tasks: Vec<_> = ids
            .iter()
            .flat_map(|&id| (0..5).map(move |i| (id, i)))
            .map(|(id, i)| {
                let svc = svc.clone();
                tokio::spawn(async move {
                    svc.create_version(id, NewVersion::new(format!("x{}", i)), ActorId::system())
                        .await
                })
            })
            .collect();
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        for id in ids {
            let latest = svc.get(id).await.unwrap().latest_version.unwrap();
            assert_eq!(latest.version, 6);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_fresh_prompts_do_not_interfere() {
        concurrent_fresh_prompts_do_not_interfere(memory()).await;
        concurrent_fresh_prompts_do_not_interfere(sqlite()).await;
    }

    async fn label_set_and_remove<S: PromptStorage>(svc: PromptService<S>) {
        let project = Uuid::new_v4();
        let id = svc
            .create(project, NewPrompt::new("greeting", "first"), author())
            .await
            .unwrap()
            .prompt
            .id;
        svc.create_version(id, NewVersion::new("second"), author())
            .await
            .unwrap();

        svc.set_version_label(id, 2, "staging", true, author())
            .await
            .unwrap();
        let resolved = svc
            .get_by_name_and_label(project, "greeting", "staging")
            .await
            .unwrap();
        assert_eq!(resolved.version.content, "second");
        assert_eq!(svc.get_label(id, "staging").await.unwrap(), 2);

        svc.set_version_label(id, 2, "staging", false, author())
            .await
            .unwrap();
        let err = svc
            .get_by_name_and_label(project, "greeting", "staging")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_label_set_and_remove() {
        label_set_and_remove(memory()).await;
        label_set_and_remove(sqlite()).await;
    }

    async fn default_resolution<S: PromptStorage>(svc: PromptService<S>) {
        let project = Uuid::new_v4();
        let id = svc
            .create(project, NewPrompt::new("greeting", "one"), author())
            .await
            .unwrap()
            .prompt
            .id;
        svc.create_version(id, NewVersion::new("two"), author())
            .await
            .unwrap();

        // No labels: latest wins.
        let resolved = svc.get_by_name(project, "greeting").await.unwrap();
        assert_eq!(resolved.version.version, 2);
        assert_eq!(resolved.resolution, Resolution::Latest);

        // production pins version 1 even after version 3 exists.
        svc.set_version_label(id, 1, "production", true, author())
            .await
            .unwrap();
        svc.create_version(id, NewVersion::new("three"), author())
            .await
            .unwrap();
        let resolved = svc.get_by_name(project, "greeting").await.unwrap();
        assert_eq!(resolved.version.content, "one");

        // Moving the label is what changes the answer.
        svc.set_version_label(id, 3, "production", true, author())
            .await
            .unwrap();
        let resolved = svc.get_by_name(project, "greeting").await.unwrap();
        assert_eq!(resolved.version.content, "three");

        let resolved = svc
            .get_by_name_and_version(project, "greeting", 2)
            .await
            .unwrap();
        assert_eq!(resolved.version.content, "two");

        assert!(svc
            .get_by_name(project, "missing")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_default_resolution() {
        default_resolution(memory()).await;
        default_resolution(sqlite()).await;
    }

    async fn end_to_end_greeting<S: PromptStorage>(svc: PromptService<S>) {
        let project = Uuid::new_v4();
        let created = svc
            .create(project, NewPrompt::new("greeting", "Hi {{user}}"), author())
            .await
            .unwrap();
        let id = created.prompt.id;
        let first = created.latest_version.unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(first.commit_message.as_deref(), Some(INITIAL_COMMIT_MESSAGE));
        assert_eq!(first.variables, vec!["user"]);

        svc.set_version_label(id, 1, "production", true, author())
            .await
            .unwrap();
        let second = svc
            .create_version(id, NewVersion::new("Hello {{user}}!"), author())
            .await
            .unwrap();
        assert_eq!(second.version, 2);

        let compiled = svc
            .compile(
                project,
                "greeting",
                &vars(&[("user", "Ann")]),
                &CompileOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(compiled.compiled, "Hi Ann");
        assert_eq!(compiled.version, 1);

        let pinned = svc
            .compile(
                project,
                "greeting",
                &vars(&[("user", "Ann")]),
                &CompileOptions {
                    version: Some(2),
                    label: Some("production".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(pinned.compiled, "Hello Ann!");

        let err = svc
            .compile(project, "greeting", &HashMap::new(), &CompileOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MissingVariables(ref names) if names == &["user"]));
    }

    #[tokio::test]
    async fn test_end_to_end_greeting() {
        end_to_end_greeting(memory()).await;
        end_to_end_greeting(sqlite()).await;
    }

    async fn name_uniqueness_per_project<S: PromptStorage>(svc: PromptService<S>) {
        let project = Uuid::new_v4();
        svc.create(project, NewPrompt::new("dup", "a"), author())
            .await
            .unwrap();

        let err = svc
            .create(project, NewPrompt::new("dup", "b"), author())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        svc.create(Uuid::new_v4(), NewPrompt::new("dup", "c"), author())
            .await
            .unwrap();

        let resolved = svc.get_by_name(project, "dup").await.unwrap();
        assert_eq!(resolved.version.content, "a");
    }

    #[tokio::test]
    async fn test_name_uniqueness_per_project() {
        name_uniqueness_per_project(memory()).await;
        name_uniqueness_per_project(sqlite()).await;
    }

    async fn update_and_delete<S: PromptStorage>(svc: PromptService<S>) {
        let project = Uuid::new_v4();
        let a = svc
            .create(project, NewPrompt::new("a", "{{x}}"), author())
            .await
            .unwrap()
            .prompt;
        svc.create(project, NewPrompt::new("b", "b"), author())
            .await
            .unwrap();

        let patch = PromptPatch {
            tags: Some(vec!["nlp".into()]),
            description: Some("summaries".into()),
            ..PromptPatch::default()
        };
        let updated = svc.update(a.id, patch, author()).await.unwrap();
        assert_eq!(updated.tags, vec!["nlp"]);
        assert_eq!(updated.description.as_deref(), Some("summaries"));
        assert_eq!(updated.created_at, a.created_at);

        let rename = PromptPatch {
            name: Some("b".into()),
            ..PromptPatch::default()
        };
        let err = svc.update(a.id, rename, author()).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let rename = PromptPatch {
            name: Some("a2".into()),
            ..PromptPatch::default()
        };
        svc.update(a.id, rename, author()).await.unwrap();
        assert!(svc.get_by_name(project, "a").await.unwrap_err().is_not_found());
        assert_eq!(
            svc.get_by_name(project, "a2").await.unwrap().version.content,
            "{{x}}"
        );

        assert!(matches!(
            svc.update(a.id, PromptPatch::default(), author()).await,
            Err(AppError::Validation(_))
        ));

        svc.set_version_label(a.id, 1, "production", true, author())
            .await
            .unwrap();
        svc.delete(a.id, author()).await.unwrap();
        assert!(svc.get(a.id).await.unwrap_err().is_not_found());
        assert!(svc.list_versions(a.id).await.unwrap_err().is_not_found());
        assert!(svc.list_labels(a.id).await.unwrap_err().is_not_found());
        assert!(svc.delete(a.id, author()).await.unwrap_err().is_not_found());

        // The freed name can be reused.
        svc.create(project, NewPrompt::new("a2", "again"), author())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        update_and_delete(memory()).await;
        update_and_delete(sqlite()).await;
    }

    async fn kind_is_frozen_once_versioned<S: PromptStorage>(svc: PromptService<S>) {
        let project = Uuid::new_v4();
        let id = svc
            .create(project, NewPrompt::new("greeting", "Hi {{user}}"), author())
            .await
            .unwrap()
            .prompt
            .id;

        let to_chat = PromptPatch {
            kind: Some(PromptKind::Chat),
            ..PromptPatch::default()
        };
        let err = svc.update(id, to_chat, author()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // Nothing from the rejected patch was applied.
        let to_chat_with_tags = PromptPatch {
            kind: Some(PromptKind::Chat),
            tags: Some(vec!["x".into()]),
            ..PromptPatch::default()
        };
        assert!(svc.update(id, to_chat_with_tags, author()).await.is_err());
        let prompt = svc.get(id).await.unwrap().prompt;
        assert_eq!(prompt.kind, PromptKind::Text);
        assert!(prompt.tags.is_empty());

        // Restating the current kind is allowed.
        let same = PromptPatch {
            kind: Some(PromptKind::Text),
            ..PromptPatch::default()
        };
        svc.update(id, same, author()).await.unwrap();

        let compiled = svc
            .compile(
                project,
                "greeting",
                &vars(&[("user", "Ann")]),
                &CompileOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(compiled.compiled, "Hi Ann");
    }

    #[tokio::test]
    async fn test_kind_is_frozen_once_versioned() {
        kind_is_frozen_once_versioned(memory()).await;
        kind_is_frozen_once_versioned(sqlite()).await;
    }

    async fn concurrent_disjoint_patches_all_land<S: PromptStorage + 'static>(
        svc: PromptService<S>,
    ) {
        let project = Uuid::new_v4();

        for round in 0..10 {
            let id = svc
                .create(project, NewPrompt::new(format!("p{}", round), "v1"), author())
                .await
                .unwrap()
                .prompt
                .id;

            let tags = PromptPatch {
                tags: Some(vec![format!("t{}", round)]),
                ..PromptPatch::default()
            };
            let description = PromptPatch {
                description: Some(format!("d{}", round)),
                ..PromptPatch::default()
            };
            let tasks: Vec<_> = [tags, description]
                .into_iter()
                .map(|patch| {
                    let svc = svc.clone();
                    tokio::spawn(async move { svc.update(id, patch, ActorId::system()).await })
                })
                .collect();
            for result in futures::future::join_all(tasks).await {
                result.unwrap().unwrap();
            }

            let prompt = svc.get(id).await.unwrap().prompt;
            assert_eq!(prompt.tags, vec![format!("t{}", round)]);
            assert_eq!(prompt.description, Some(format!("d{}", round)));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_disjoint_patches_all_land() {
        concurrent_disjoint_patches_all_land(memory()).await;
        concurrent_disjoint_patches_all_land(sqlite()).await;
    }

    async fn list_with_filters<S: PromptStorage>(svc: PromptService<S>) {
        let project = Uuid::new_v4();
        for (name, tags) in [
            ("summarize", vec!["nlp"]),
            ("classify", vec!["nlp", "ml"]),
            ("caption", vec!["vision"]),
        ] {
            let tags = tags.into_iter().map(String::from).collect();
            svc.create(
                project,
                NewPrompt::new(name, "x").with_tags(tags),
                author(),
            )
            .await
            .unwrap();
        }

        let all = svc
            .list(&PromptFilter::project(project), None, 0)
            .await
            .unwrap();
        let names: Vec<_> = all.prompts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["caption", "classify", "summarize"]);
        assert_eq!(all.total_count, 3);
        assert!(!all.has_more);

        let mut filter = PromptFilter::project(project);
        filter.tags = vec!["nlp".into()];
        assert_eq!(svc.list(&filter, None, 0).await.unwrap().total_count, 2);

        let mut filter = PromptFilter::project(project);
        filter.name = Some("S".into());
        let page = svc.list(&filter, Some(1), 0).await.unwrap();
        assert_eq!(page.prompts[0].name, "classify");
        assert_eq!(page.total_count, 2);
        assert!(page.has_more);

        let mut filter = PromptFilter::project(project);
        filter.label = Some("has space".into());
        assert!(matches!(
            svc.list(&filter, None, 0).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_list_with_filters() {
        list_with_filters(memory()).await;
        list_with_filters(sqlite()).await;
    }

    #[tokio::test]
    async fn test_create_validation() {
        let svc = memory();
        let project = Uuid::new_v4();

        for input in [
            NewPrompt::new("", "x"),
            NewPrompt::new("n", ""),
            NewPrompt::new("n".repeat(201), "x"),
            NewPrompt::new("chatty", "not json").with_kind(PromptKind::Chat),
        ] {
            let err = svc.create(project, input, author()).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{:?}", err);
        }

        let list = svc
            .list(&PromptFilter::project(project), None, 0)
            .await
            .unwrap();
        assert_eq!(list.total_count, 0);
    }

    #[tokio::test]
    async fn test_compile_chat_prompt() {
        let svc = sqlite();
        let project = Uuid::new_v4();
        let content = r#"[{"role":"system","content":"You are {{persona}}."},{"role":"user","content":"{{question}}"}]"#;
        svc.create(
            project,
            NewPrompt::new("assistant", content).with_kind(PromptKind::Chat),
            ActorId::system(),
        )
        .await
        .unwrap();

        let compiled = svc
            .compile(
                project,
                "assistant",
                &vars(&[("persona", "terse"), ("question", "Why?")]),
                &CompileOptions::default(),
            )
            .await
            .unwrap();
        let messages = compiled.messages.unwrap();
        assert_eq!(messages[0].content, "You are terse.");
        assert_eq!(messages[1].content, "Why?");
        assert!(compiled.compiled.contains("You are terse."));

        let err = svc
            .compile(project, "assistant", &HashMap::new(), &CompileOptions::default())
            .await
            .unwrap_err();
        assert!(
            matches!(err, AppError::MissingVariables(ref names) if names == &["persona", "question"])
        );
    }

    #[tokio::test]
    async fn test_system_actor_is_recorded() {
        let svc = memory();
        let created = svc
            .create(Uuid::new_v4(), NewPrompt::new("auto", "x"), ActorId::system())
            .await
            .unwrap();
        assert!(created.prompt.created_by.is_system());
        assert!(created.latest_version.unwrap().created_by.is_system());
    }
}
