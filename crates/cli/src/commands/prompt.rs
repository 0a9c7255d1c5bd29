//! Prompt command handler.
//!
//! Handles creating, inspecting, listing, updating and deleting prompts.

use clap::{Args, Subcommand};
use std::path::PathBuf;
use verso_core::{config::AppConfig, AppError, AppResult};
use verso_prompt::{
    NewPrompt, PromptFilter, PromptKind, PromptPatch, ResolvedPrompt, VersionSelector,
};

use super::{
    open_service, parse_metadata, print_json, read_content, require_actor, resolve_prompt_id,
};

/// Prompt management
#[derive(Args, Debug)]
pub struct PromptCommand {
    #[command(subcommand)]
    pub action: PromptAction,
}

#[derive(Subcommand, Debug)]
pub enum PromptAction {
    /// Create a prompt with its first version
    Create(PromptCreateCommand),
    /// Show a prompt, its latest version and labels
    Show(PromptShowCommand),
    /// Resolve a prompt by name (default label, then latest)
    Get(PromptGetCommand),
    /// List prompts in the project
    List(PromptListCommand),
    /// Rename or change prompt-level fields
    Update(PromptUpdateCommand),
    /// Delete a prompt with all versions and labels
    Delete(PromptDeleteCommand),
}

impl PromptCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            PromptAction::Create(cmd) => cmd.execute(config).await,
            PromptAction::Show(cmd) => cmd.execute(config).await,
            PromptAction::Get(cmd) => cmd.execute(config).await,
            PromptAction::List(cmd) => cmd.execute(config).await,
            PromptAction::Update(cmd) => cmd.execute(config).await,
            PromptAction::Delete(cmd) => cmd.execute(config).await,
        }
    }
}

/// Create a prompt
#[derive(Args, Debug)]
pub struct PromptCreateCommand {
    /// Prompt name, unique within the project
    pub name: String,

    /// Content of version 1 (alternative to --file)
    pub content: Option<String>,

    /// Read content from file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Prompt kind (text, chat)
    #[arg(short, long, default_value = "text")]
    pub kind: PromptKind,

    /// Description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Tag (repeatable)
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    /// Commit message for version 1
    #[arg(short, long)]
    pub message: Option<String>,

    /// Version metadata as a JSON object
    #[arg(long)]
    pub metadata: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl PromptCreateCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing prompt create command for '{}'", self.name);

        let project = config.require_project()?;
        let author = require_actor(config)?;
        let content = read_content(self.content.as_deref(), self.file.as_deref())?;

        let input = NewPrompt {
            name: self.name.clone(),
            kind: self.kind,
            description: self.description.clone(),
            tags: self.tags.clone(),
            content,
            metadata: parse_metadata(self.metadata.as_deref())?,
            commit_message: self.message.clone(),
        };

        let service = open_service(config)?;
        let created = service.create(project, input, author).await?;

        if self.json {
            print_json(&created)?;
        } else {
            println!(
                "Created prompt '{}' ({}) at version 1",
                created.prompt.name, created.prompt.id
            );
        }

        Ok(())
    }
}

/// Show a prompt
#[derive(Args, Debug)]
pub struct PromptShowCommand {
    /// Prompt name or UUID
    pub prompt: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl PromptShowCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing prompt show command for '{}'", self.prompt);

        let service = open_service(config)?;
        let id = resolve_prompt_id(&service, config, &self.prompt).await?;
        let detail = service.get(id).await?;
        let labels = service.list_labels(id).await?;

        if self.json {
            let output = serde_json::json!({
                "prompt": detail.prompt,
                "latestVersion": detail.latest_version,
                "labels": labels,
            });
            print_json(&output)?;
            return Ok(());
        }

        let prompt = &detail.prompt;
        println!("{} ({})", prompt.name, prompt.id);
        println!("Kind:    {}", prompt.kind);
        if let Some(ref description) = prompt.description {
            println!("About:   {}", description);
        }
        if !prompt.tags.is_empty() {
            println!("Tags:    {}", prompt.tags.join(", "));
        }
        println!("Created: {} by {}", prompt.created_at, prompt.created_by);
        if let Some(ref latest) = detail.latest_version {
            println!("Latest:  version {}", latest.version);
        }
        if !labels.is_empty() {
            println!("Labels:");
            for label in &labels {
                println!("- {} -> {}", label.name, label.version);
            }
        }

        Ok(())
    }
}

/// Resolve a prompt by name
#[derive(Args, Debug)]
pub struct PromptGetCommand {
    /// Prompt name
    pub name: String,

    /// Exact version number
    #[arg(long, conflicts_with = "label")]
    pub version: Option<i64>,

    /// Label to follow
    #[arg(short, long)]
    pub label: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl PromptGetCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing prompt get command for '{}'", self.name);

        let project = config.require_project()?;
        let service = open_service(config)?;

        let selector = match (self.version, &self.label) {
            (Some(version), _) => VersionSelector::Version(version),
            (None, Some(label)) => VersionSelector::Label(label.clone()),
            (None, None) => VersionSelector::Default,
        };

        let resolved = match selector {
            VersionSelector::Default => service.get_by_name(project, &self.name).await?,
            VersionSelector::Version(version) => {
                service
                    .get_by_name_and_version(project, &self.name, version)
                    .await?
            }
            VersionSelector::Label(ref label) => {
                service.get_by_name_and_label(project, &self.name, label).await?
            }
        };

        if self.json {
            print_json(&resolved)?;
        } else {
            print_resolved(&resolved);
        }

        Ok(())
    }
}

fn print_resolved(resolved: &ResolvedPrompt) {
    println!(
        "{} version {} ({:?})",
        resolved.prompt.name, resolved.version.version, resolved.resolution
    );
    if !resolved.version.variables.is_empty() {
        println!("Variables: {}", resolved.version.variables.join(", "));
    }
    println!();
    println!("{}", resolved.version.content);
}

/// List prompts
#[derive(Args, Debug)]
pub struct PromptListCommand {
    /// Case-insensitive name substring
    #[arg(short, long)]
    pub name: Option<String>,

    /// Tag filter, matches any (repeatable)
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    /// Only prompts that carry this label
    #[arg(short, long)]
    pub label: Option<String>,

    /// Page size (max 100)
    #[arg(long)]
    pub limit: Option<usize>,

    /// Number of prompts to skip
    #[arg(long, default_value = "0")]
    pub offset: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl PromptListCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing prompt list command");
        tracing::debug!("List options: {:?}", self);

        let project = config.require_project()?;
        let service = open_service(config)?;

        let filter = PromptFilter {
            project_id: project,
            name: self.name.clone(),
            tags: self.tags.clone(),
            label: self.label.clone(),
        };
        let page = service.list(&filter, self.limit, self.offset).await?;

        if self.json {
            print_json(&page)?;
            return Ok(());
        }

        if page.prompts.is_empty() {
            println!("No prompts found");
            return Ok(());
        }

        for prompt in &page.prompts {
            if prompt.tags.is_empty() {
                println!("{}  {}  [{}]", prompt.id, prompt.name, prompt.kind);
            } else {
                println!(
                    "{}  {}  [{}]  {}",
                    prompt.id,
                    prompt.name,
                    prompt.kind,
                    prompt.tags.join(", ")
                );
            }
        }
        println!(
            "Showing {} of {} prompts{}",
            page.prompts.len(),
            page.total_count,
            if page.has_more { " (more available)" } else { "" }
        );

        Ok(())
    }
}

/// Update prompt-level fields
#[derive(Args, Debug)]
pub struct PromptUpdateCommand {
    /// Prompt name or UUID
    pub prompt: String,

    /// New name
    #[arg(long)]
    pub rename: Option<String>,

    /// New description (empty string clears it)
    #[arg(short, long)]
    pub description: Option<String>,

    /// New kind (text, chat); rejected once the prompt has versions
    #[arg(short, long)]
    pub kind: Option<PromptKind>,

    /// Replace tags (repeatable)
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    /// Remove all tags
    #[arg(long, conflicts_with = "tags")]
    pub clear_tags: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl PromptUpdateCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing prompt update command for '{}'", self.prompt);

        let actor = require_actor(config)?;
        let service = open_service(config)?;
        let id = resolve_prompt_id(&service, config, &self.prompt).await?;

        let tags = if self.clear_tags {
            Some(Vec::new())
        } else if self.tags.is_empty() {
            None
        } else {
            Some(self.tags.clone())
        };

        let patch = PromptPatch {
            name: self.rename.clone(),
            description: self.description.clone(),
            kind: self.kind,
            tags,
        };

        let prompt = service.update(id, patch, actor).await?;

        if self.json {
            print_json(&prompt)?;
        } else {
            println!("Updated prompt '{}' ({})", prompt.name, prompt.id);
        }

        Ok(())
    }
}

/// Delete a prompt
#[derive(Args, Debug)]
pub struct PromptDeleteCommand {
    /// Prompt name or UUID
    pub prompt: String,

    /// Confirm deletion of every version and label
    #[arg(short, long)]
    pub yes: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl PromptDeleteCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing prompt delete command for '{}'", self.prompt);

        if !self.yes {
            return Err(AppError::Validation(
                "Deleting a prompt removes all of its versions and labels; pass --yes to confirm"
                    .to_string(),
            ));
        }

        let actor = require_actor(config)?;
        let service = open_service(config)?;
        let id = resolve_prompt_id(&service, config, &self.prompt).await?;

        service.delete(id, actor).await?;

        if self.json {
            print_json(&serde_json::json!({ "deleted": id }))?;
        } else {
            println!("Deleted prompt {}", id);
        }

        Ok(())
    }
}
