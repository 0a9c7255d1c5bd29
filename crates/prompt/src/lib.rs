//! Prompt engine for Verso.
//!
//! This crate manages named prompt templates that evolve through immutable,
//! sequentially numbered versions:
//! - Version allocation per prompt, gapless from 1 under concurrent writers
//! - Labels: mutable named pointers to versions (e.g. `production`)
//! - Deterministic resolution: exact version, label, or the default chain
//! - Flat `{{variable}}` substitution that reports every missing name at once
//! - Pluggable persistence through [`PromptStorage`]

pub mod labels;
pub mod resolver;
pub mod service;
pub mod storage;
pub mod template;
pub mod types;
pub mod validation;
pub mod versions;

// Re-export main types
pub use labels::{LabelChange, LabelRegistry};
pub use resolver::{Lookup, Resolver};
pub use service::{PromptService, ServiceConfig, INITIAL_COMMIT_MESSAGE};
pub use storage::{MemoryStorage, PromptStorage, SqliteStorage};
pub use template::{compile, extract_variables};
pub use types::{
    ActorId, ChatMessage, CompileOptions, CompiledPrompt, Label, Metadata, NewPrompt, NewVersion,
    ProjectId, Prompt, PromptDetail, PromptFilter, PromptId, PromptKind, PromptList, PromptPatch,
    PromptVersion, Resolution, ResolvedPrompt, VersionSelector,
};
pub use versions::VersionStore;
