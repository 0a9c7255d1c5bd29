//! Turning (project, name, selector) into a concrete version.
//!
//! The default chain is an ordered list of steps. Each step reports
//! [`Lookup::Found`] or [`Lookup::Missing`] and the first hit wins:
//!
//! 1. the default label (`production` unless configured otherwise)
//! 2. the highest version number
//!
//! The prompt itself is looked up before the chain runs, so an unknown
//! prompt is `NotFound` regardless of the steps.

use std::sync::Arc;
use verso_core::config::DEFAULT_LABEL;
use verso_core::{AppError, AppResult};

use crate::labels::{label_not_found, LabelRegistry};
use crate::storage::PromptStorage;
use crate::types::{
    Label, ProjectId, Prompt, PromptVersion, Resolution, ResolvedPrompt, VersionSelector,
};
use crate::validation::{validate_label, validate_version_number};
use crate::versions::VersionStore;

/// Result of a single resolution step.
#[derive(Debug)]
pub enum Lookup<T> {
    Found(T),
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    DefaultLabel,
    Latest,
}

const DEFAULT_CHAIN: [Step; 2] = [Step::DefaultLabel, Step::Latest];

pub struct Resolver<S> {
    storage: Arc<S>,
    versions: VersionStore<S>,
    labels: LabelRegistry<S>,
    default_label: String,
}

impl<S> Clone for Resolver<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            versions: self.versions.clone(),
            labels: self.labels.clone(),
            default_label: self.default_label.clone(),
        }
    }
}

impl<S: PromptStorage> Resolver<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self::with_default_label(storage, DEFAULT_LABEL)
    }

    pub fn with_default_label(storage: Arc<S>, default_label: impl Into<String>) -> Self {
        Self {
            versions: VersionStore::new(Arc::clone(&storage)),
            labels: LabelRegistry::new(Arc::clone(&storage)),
            storage,
            default_label: default_label.into(),
        }
    }

    pub fn default_label(&self) -> &str {
        &self.default_label
    }

    /// Dispatch on the selector.
    pub async fn resolve(
        &self,
        project_id: ProjectId,
        name: &str,
        selector: &VersionSelector,
    ) -> AppResult<ResolvedPrompt> {
        match selector {
            VersionSelector::Default => self.resolve_default(project_id, name).await,
            VersionSelector::Version(version) => self.by_version(project_id, name, *version).await,
            VersionSelector::Label(label) => self.by_label(project_id, name, label).await,
        }
    }

    /// Exact version number.
    pub async fn by_version(
        &self,
        project_id: ProjectId,
        name: &str,
        version: i64,
    ) -> AppResult<ResolvedPrompt> {
        validate_version_number(version)?;
        let prompt = self.find_prompt(project_id, name).await?;
        let version = self
            .versions
            .get_version(prompt.id, version)
            .await
            .map_err(|e| e.context(format!("prompt '{}'", name)))?;

        Ok(ResolvedPrompt {
            resolution: Resolution::Version(version.version),
            prompt,
            version,
        })
    }

    /// Whatever version the label currently points at.
    pub async fn by_label(
        &self,
        project_id: ProjectId,
        name: &str,
        label: &str,
    ) -> AppResult<ResolvedPrompt> {
        validate_label(label)?;
        let prompt = self.find_prompt(project_id, name).await?;

        match self.try_label(&prompt, label).await? {
            Lookup::Found(version) => Ok(ResolvedPrompt {
                prompt,
                version,
                resolution: Resolution::Label(label.to_string()),
            }),
            Lookup::Missing => Err(label_not_found(prompt.id, label)),
        }
    }

    /// Default label first, then latest.
    pub async fn resolve_default(
        &self,
        project_id: ProjectId,
        name: &str,
    ) -> AppResult<ResolvedPrompt> {
        tracing::debug!("Resolving default version of '{}' in {}", name, project_id);
        let prompt = self.find_prompt(project_id, name).await?;

        for step in DEFAULT_CHAIN {
            let (found, resolution) = match step {
                Step::DefaultLabel => (
                    self.try_label(&prompt, &self.default_label).await?,
                    Resolution::Label(self.default_label.clone()),
                ),
                Step::Latest => (self.try_latest(&prompt).await?, Resolution::Latest),
            };

            match found {
                Lookup::Found(version) => {
                    return Ok(ResolvedPrompt {
                        prompt,
                        version,
                        resolution,
                    })
                }
                Lookup::Missing if step == Step::DefaultLabel => {
                    tracing::warn!(
                        prompt = %prompt.name,
                        label = %self.default_label,
                        "Default label not set, falling back to latest version"
                    );
                }
                Lookup::Missing => {}
            }
        }

        Err(AppError::NotFound(format!(
            "prompt '{}' has no versions",
            prompt.name
        )))
    }

    async fn find_prompt(&self, project_id: ProjectId, name: &str) -> AppResult<Prompt> {
        self.storage
            .find_prompt(project_id, name)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("prompt '{}' in project {}", name, project_id))
            })
    }

    async fn try_label(&self, prompt: &Prompt, label: &str) -> AppResult<Lookup<PromptVersion>> {
        match self.labels.lookup(prompt.id, label).await? {
            Some(label) => self.pointed_version(prompt, &label).await.map(Lookup::Found),
            None => Ok(Lookup::Missing),
        }
    }

    async fn try_latest(&self, prompt: &Prompt) -> AppResult<Lookup<PromptVersion>> {
        Ok(match self.versions.latest_version(prompt.id).await? {
            Some(version) => Lookup::Found(version),
            None => Lookup::Missing,
        })
    }

    /// Follow a label. A dangling pointer on a live prompt is a storage fault.
    async fn pointed_version(&self, prompt: &Prompt, label: &Label) -> AppResult<PromptVersion> {
        if let Some(version) = self.storage.get_version(prompt.id, label.version).await? {
            return Ok(version);
        }

        if self.storage.get_prompt(prompt.id).await?.is_none() {
            return Err(AppError::NotFound(format!("prompt '{}'", prompt.name)));
        }

        Err(AppError::Internal(format!(
            "label '{}' of prompt '{}' points at missing version {}",
            label.name, prompt.name, label.version
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::types::{ActorId, NewVersion, PromptKind};
    use crate::versions::draft_version;
    use chrono::Utc;
    use uuid::Uuid;

    struct Fixture {
        storage: Arc<MemoryStorage>,
        resolver: Resolver<MemoryStorage>,
        project: ProjectId,
        prompt: Prompt,
    }

    async fn fixture(contents: &[&str]) -> Fixture {
        let storage = Arc::new(MemoryStorage::new());
        let project = Uuid::new_v4();
        let now = Utc::now();
        let prompt = Prompt {
            id: Uuid::new_v4(),
            project_id: project,
            name: "greeting".to_string(),
            kind: PromptKind::Text,
            description: None,
            tags: Vec::new(),
            created_by: ActorId::system(),
            created_at: now,
            updated_at: now,
        };
        let draft = |c: &str| {
            draft_version(PromptKind::Text, NewVersion::new(c), ActorId::system()).unwrap()
        };

        storage
            .insert_prompt(prompt.clone(), draft(contents[0]))
            .await
            .unwrap();
        for content in &contents[1..] {
            storage.append_version(prompt.id, draft(*content)).await.unwrap();
        }

        Fixture {
            resolver: Resolver::new(Arc::clone(&storage)),
            storage,
            project,
            prompt,
        }
    }

    #[tokio::test]
    async fn test_default_without_labels_is_latest() {
        let f = fixture(&["one", "two", "three"]).await;
        let resolved = f.resolver.resolve_default(f.project, "greeting").await.unwrap();
        assert_eq!(resolved.version.version, 3);
        assert_eq!(resolved.resolution, Resolution::Latest);
    }

    #[tokio::test]
    async fn test_default_label_beats_newer_versions() {
        let f = fixture(&["one"]).await;
        f.storage.put_label(f.prompt.id, "production", 1).await.unwrap();
        f.storage
            .append_version(
                f.prompt.id,
                draft_version(PromptKind::Text, NewVersion::new("two"), ActorId::system())
                    .unwrap(),
            )
            .await
            .unwrap();

        let resolved = f.resolver.resolve_default(f.project, "greeting").await.unwrap();
        assert_eq!(resolved.version.content, "one");
        assert_eq!(resolved.resolution, Resolution::Label("production".into()));
    }

    #[tokio::test]
    async fn test_configured_default_label() {
        let f = fixture(&["one", "two"]).await;
        f.storage.put_label(f.prompt.id, "stable", 1).await.unwrap();
        f.storage.put_label(f.prompt.id, "production", 2).await.unwrap();

        let resolver = Resolver::with_default_label(Arc::clone(&f.storage), "stable");
        let resolved = resolver.resolve_default(f.project, "greeting").await.unwrap();
        assert_eq!(resolved.version.version, 1);
    }

    #[tokio::test]
    async fn test_unknown_prompt_is_not_found_on_every_path() {
        let f = fixture(&["one"]).await;
        let other_project = Uuid::new_v4();

        for selector in [
            VersionSelector::Default,
            VersionSelector::Version(1),
            VersionSelector::Label("production".into()),
        ] {
            let err = f
                .resolver
                .resolve(other_project, "greeting", &selector)
                .await
                .unwrap_err();
            assert!(err.is_not_found(), "{:?}", selector);
        }
    }

    #[tokio::test]
    async fn test_pinned_lookups() {
        let f = fixture(&["one", "two"]).await;
        f.storage.put_label(f.prompt.id, "canary", 2).await.unwrap();

        let resolved = f.resolver.by_version(f.project, "greeting", 1).await.unwrap();
        assert_eq!(resolved.version.content, "one");
        assert_eq!(resolved.resolution, Resolution::Version(1));

        let resolved = f.resolver.by_label(f.project, "greeting", "canary").await.unwrap();
        assert_eq!(resolved.version.content, "two");

        assert!(f
            .resolver
            .by_version(f.project, "greeting", 3)
            .await
            .unwrap_err()
            .is_not_found());
        assert!(f
            .resolver
            .by_label(f.project, "greeting", "production")
            .await
            .unwrap_err()
            .is_not_found());
        assert!(matches!(
            f.resolver.by_version(f.project, "greeting", 0).await,
            Err(AppError::Validation(_))
        ));
    }
}
