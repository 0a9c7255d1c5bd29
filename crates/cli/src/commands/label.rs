//! Label command handler.

use clap::{Args, Subcommand};
use verso_core::{config::AppConfig, AppResult};
use verso_prompt::LabelChange;

use super::{open_service, print_json, require_actor, resolve_prompt_id};

/// Version labels
#[derive(Args, Debug)]
pub struct LabelCommand {
    #[command(subcommand)]
    pub action: LabelAction,
}

#[derive(Subcommand, Debug)]
pub enum LabelAction {
    /// Point a label at a version, creating or moving it
    Set(LabelSetCommand),
    /// Remove a label
    Remove(LabelRemoveCommand),
    /// List a prompt's labels
    List(LabelListCommand),
}

impl LabelCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            LabelAction::Set(cmd) => cmd.execute(config).await,
            LabelAction::Remove(cmd) => cmd.execute(config).await,
            LabelAction::List(cmd) => cmd.execute(config).await,
        }
    }
}

/// Set a label
#[derive(Args, Debug)]
pub struct LabelSetCommand {
    /// Prompt name or UUID
    pub prompt: String,

    /// Label name (e.g. production)
    pub label: String,

    /// Version number the label should point at
    pub version: i64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl LabelSetCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!(
            "Executing label set command: {} {} -> v{}",
            self.prompt,
            self.label,
            self.version
        );

        let actor = require_actor(config)?;
        let service = open_service(config)?;
        let id = resolve_prompt_id(&service, config, &self.prompt).await?;

        let change = service
            .set_version_label(id, self.version, &self.label, true, actor)
            .await?;
        print_change(&change, self.json)
    }
}

/// Remove a label
#[derive(Args, Debug)]
pub struct LabelRemoveCommand {
    /// Prompt name or UUID
    pub prompt: String,

    /// Label name
    pub label: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl LabelRemoveCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!(
            "Executing label remove command: {} {}",
            self.prompt,
            self.label
        );

        let actor = require_actor(config)?;
        let service = open_service(config)?;
        let id = resolve_prompt_id(&service, config, &self.prompt).await?;

        // The version argument is ignored on removal.
        let change = service
            .set_version_label(id, 0, &self.label, false, actor)
            .await?;
        print_change(&change, self.json)
    }
}

fn print_change(change: &LabelChange, json: bool) -> AppResult<()> {
    if json {
        return print_json(change);
    }
    match change {
        LabelChange::Assigned { label } => {
            println!("Label '{}' -> version {}", label.name, label.version)
        }
        LabelChange::Removed { name, .. } => println!("Label '{}' removed", name),
    }
    Ok(())
}

/// List labels
#[derive(Args, Debug)]
pub struct LabelListCommand {
    /// Prompt name or UUID
    pub prompt: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl LabelListCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing label list command for '{}'", self.prompt);

        let service = open_service(config)?;
        let id = resolve_prompt_id(&service, config, &self.prompt).await?;
        let labels = service.list_labels(id).await?;

        if self.json {
            return print_json(&labels);
        }

        if labels.is_empty() {
            println!("No labels");
        }
        for label in &labels {
            println!(
                "{}  -> v{}  (updated {})",
                label.name,
                label.version,
                label.updated_at.format("%Y-%m-%d %H:%M:%S")
            );
        }

        Ok(())
    }
}
