//! In-process storage backend.
//!
//! Prompts are indexed under one `RwLock`; each prompt's versions and labels
//! sit behind their own `RwLock`, which is the per-prompt critical section.
//! Version and label mutations only take the index lock for reading, so
//! writers on different prompts never wait on each other.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use verso_core::{AppError, AppResult};

use super::PromptStorage;
use crate::types::{
    Label, Prompt, PromptFilter, PromptId, PromptList, PromptPatch, PromptVersion, ProjectId,
    VersionDraft,
};

/// Storage kept entirely in memory; used by tests and embedded callers.
#[derive(Default)]
pub struct MemoryStorage {
    index: RwLock<Index>,
}

#[derive(Default)]
struct Index {
    by_id: HashMap<PromptId, Arc<RwLock<Entry>>>,
    by_name: HashMap<(ProjectId, String), PromptId>,
}

struct Entry {
    prompt: Prompt,
    /// Ascending by version number
    versions: Vec<PromptVersion>,
    next_version: i64,
    labels: BTreeMap<String, Label>,
    /// Set under the entry lock by `delete_prompt` so in-flight writers see it
    deleted: bool,
}

impl Entry {
    fn version(&self, version: i64) -> Option<&PromptVersion> {
        self.versions
            .binary_search_by_key(&version, |v| v.version)
            .ok()
            .map(|idx| &self.versions[idx])
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: PromptId) -> Option<Arc<RwLock<Entry>>> {
        self.index.read().by_id.get(&id).cloned()
    }

    fn entry_or_not_found(&self, id: PromptId) -> AppResult<Arc<RwLock<Entry>>> {
        self.entry(id)
            .ok_or_else(|| AppError::NotFound(format!("prompt {}", id)))
    }
}

fn matches_filter(entry: &Entry, filter: &PromptFilter) -> bool {
    let prompt = &entry.prompt;

    if prompt.project_id != filter.project_id {
        return false;
    }

    if let Some(ref needle) = filter.name {
        if !prompt.name.to_lowercase().contains(&needle.to_lowercase()) {
            return false;
        }
    }

    if !filter.tags.is_empty() && !prompt.tags.iter().any(|t| filter.tags.contains(t)) {
        return false;
    }

    if let Some(ref label) = filter.label {
        if !entry.labels.contains_key(label) {
            return false;
        }
    }

    true
}

#[async_trait]
impl PromptStorage for MemoryStorage {
    async fn insert_prompt(&self, prompt: Prompt, first: VersionDraft) -> AppResult<PromptVersion> {
        let mut index = self.index.write();

        let key = (prompt.project_id, prompt.name.clone());
        if index.by_name.contains_key(&key) {
            return Err(AppError::Conflict(format!(
                "prompt name '{}' already exists in project {}",
                prompt.name, prompt.project_id
            )));
        }

        let version = first.into_version(prompt.id, 1);
        let id = prompt.id;
        let entry = Entry {
            prompt,
            versions: vec![version.clone()],
            next_version: 2,
            labels: BTreeMap::new(),
            deleted: false,
        };

        index.by_name.insert(key, id);
        index.by_id.insert(id, Arc::new(RwLock::new(entry)));

        Ok(version)
    }

    async fn get_prompt(&self, id: PromptId) -> AppResult<Option<Prompt>> {
        Ok(self.entry(id).map(|entry| entry.read().prompt.clone()))
    }

    async fn find_prompt(&self, project_id: ProjectId, name: &str) -> AppResult<Option<Prompt>> {
        let entry = {
            let index = self.index.read();
            index
                .by_name
                .get(&(project_id, name.to_string()))
                .and_then(|id| index.by_id.get(id).cloned())
        };
        Ok(entry.map(|entry| entry.read().prompt.clone()))
    }

    async fn update_prompt(
        &self,
        id: PromptId,
        patch: &PromptPatch,
        updated_at: DateTime<Utc>,
    ) -> AppResult<Prompt> {
        // Index before entry: the only lock order used anywhere in this file.
        let mut index = self.index.write();
        let entry = index
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("prompt {}", id)))?;
        let mut entry = entry.write();

        let mut patched = entry.prompt.clone();
        patch.apply(&mut patched, !entry.versions.is_empty(), updated_at)?;

        let old_key = (entry.prompt.project_id, entry.prompt.name.clone());
        let new_key = (patched.project_id, patched.name.clone());

        if old_key != new_key {
            if index.by_name.contains_key(&new_key) {
                return Err(AppError::Conflict(format!(
                    "prompt name '{}' already exists in project {}",
                    patched.name, patched.project_id
                )));
            }
            index.by_name.remove(&old_key);
            index.by_name.insert(new_key, id);
        }

        entry.prompt = patched.clone();
        Ok(patched)
    }

    async fn delete_prompt(&self, id: PromptId) -> AppResult<()> {
        let mut index = self.index.write();
        let entry = index
            .by_id
            .remove(&id)
            .ok_or_else(|| AppError::NotFound(format!("prompt {}", id)))?;

        let mut entry = entry.write();
        index
            .by_name
            .remove(&(entry.prompt.project_id, entry.prompt.name.clone()));
        entry.deleted = true;
        entry.versions.clear();
        entry.labels.clear();

        Ok(())
    }

    async fn list_prompts(
        &self,
        filter: &PromptFilter,
        limit: usize,
        offset: usize,
    ) -> AppResult<PromptList> {
        let mut matched: Vec<Prompt> = {
            let index = self.index.read();
            index
                .by_id
                .values()
                .filter_map(|entry| {
                    let entry = entry.read();
                    matches_filter(&entry, filter).then(|| entry.prompt.clone())
                })
                .collect()
        };

        matched.sort_by(|a, b| a.name.cmp(&b.name));

        let total_count = matched.len() as u64;
        let prompts: Vec<Prompt> = matched.into_iter().skip(offset).take(limit).collect();
        let has_more = ((offset + prompts.len()) as u64) < total_count;

        Ok(PromptList {
            prompts,
            total_count,
            has_more,
        })
    }

    async fn append_version(
        &self,
        prompt_id: PromptId,
        draft: VersionDraft,
    ) -> AppResult<PromptVersion> {
        let entry = self.entry_or_not_found(prompt_id)?;
        let mut entry = entry.write();

        if entry.deleted {
            return Err(AppError::NotFound(format!("prompt {}", prompt_id)));
        }

        let number = entry.next_version;
        let version = draft.into_version(prompt_id, number);
        entry.versions.push(version.clone());
        entry.next_version = number + 1;

        Ok(version)
    }

    async fn get_version(
        &self,
        prompt_id: PromptId,
        version: i64,
    ) -> AppResult<Option<PromptVersion>> {
        Ok(self
            .entry(prompt_id)
            .and_then(|entry| entry.read().version(version).cloned()))
    }

    async fn latest_version(&self, prompt_id: PromptId) -> AppResult<Option<PromptVersion>> {
        Ok(self
            .entry(prompt_id)
            .and_then(|entry| entry.read().versions.last().cloned()))
    }

    async fn list_versions(&self, prompt_id: PromptId) -> AppResult<Vec<PromptVersion>> {
        Ok(self
            .entry(prompt_id)
            .map(|entry| entry.read().versions.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn put_label(&self, prompt_id: PromptId, name: &str, version: i64) -> AppResult<Label> {
        let entry = self.entry_or_not_found(prompt_id)?;
        let mut entry = entry.write();

        if entry.deleted {
            return Err(AppError::NotFound(format!("prompt {}", prompt_id)));
        }
        if entry.version(version).is_none() {
            return Err(AppError::NotFound(format!(
                "version {} of prompt {}",
                version, prompt_id
            )));
        }

        let label = Label {
            prompt_id,
            name: name.to_string(),
            version,
            updated_at: Utc::now(),
        };
        entry.labels.insert(name.to_string(), label.clone());

        Ok(label)
    }

    async fn delete_label(&self, prompt_id: PromptId, name: &str) -> AppResult<()> {
        let entry = self.entry_or_not_found(prompt_id)?;
        let mut entry = entry.write();

        entry
            .labels
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("label '{}' on prompt {}", name, prompt_id)))
    }

    async fn get_label(&self, prompt_id: PromptId, name: &str) -> AppResult<Option<Label>> {
        Ok(self
            .entry(prompt_id)
            .and_then(|entry| entry.read().labels.get(name).cloned()))
    }

    async fn list_labels(&self, prompt_id: PromptId) -> AppResult<Vec<Label>> {
        Ok(self
            .entry(prompt_id)
            .map(|entry| entry.read().labels.values().cloned().collect())
            .unwrap_or_default())
    }
}
