//! Version command handler.

use clap::{Args, Subcommand};
use std::path::PathBuf;
use verso_core::{config::AppConfig, AppResult};
use verso_prompt::NewVersion;

use super::{
    open_service, parse_metadata, print_json, read_content, require_actor, resolve_prompt_id,
};

/// Prompt versions
#[derive(Args, Debug)]
pub struct VersionCommand {
    #[command(subcommand)]
    pub action: VersionAction,
}

#[derive(Subcommand, Debug)]
pub enum VersionAction {
    /// Append a new version (labels are not moved)
    Create(VersionCreateCommand),
    /// List versions, newest first
    List(VersionListCommand),
    /// Show one version
    Show(VersionShowCommand),
}

impl VersionCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            VersionAction::Create(cmd) => cmd.execute(config).await,
            VersionAction::List(cmd) => cmd.execute(config).await,
            VersionAction::Show(cmd) => cmd.execute(config).await,
        }
    }
}

/// Append a version
#[derive(Args, Debug)]
pub struct VersionCreateCommand {
    /// Prompt name or UUID
    pub prompt: String,

    /// Version content (alternative to --file)
    pub content: Option<String>,

    /// Read content from file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Commit message
    #[arg(short, long)]
    pub message: Option<String>,

    /// Version metadata as a JSON object
    #[arg(long)]
    pub metadata: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl VersionCreateCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing version create command for '{}'", self.prompt);

        let author = require_actor(config)?;
        let input = NewVersion {
            content: read_content(self.content.as_deref(), self.file.as_deref())?,
            metadata: parse_metadata(self.metadata.as_deref())?,
            commit_message: self.message.clone(),
        };

        let service = open_service(config)?;
        let id = resolve_prompt_id(&service, config, &self.prompt).await?;
        let version = service.create_version(id, input, author).await?;

        if self.json {
            print_json(&version)?;
        } else {
            println!("Created version {} of {}", version.version, self.prompt);
        }

        Ok(())
    }
}

/// List versions
#[derive(Args, Debug)]
pub struct VersionListCommand {
    /// Prompt name or UUID
    pub prompt: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl VersionListCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing version list command for '{}'", self.prompt);

        let service = open_service(config)?;
        let id = resolve_prompt_id(&service, config, &self.prompt).await?;
        let versions = service.list_versions(id).await?;

        if self.json {
            print_json(&versions)?;
            return Ok(());
        }

        for version in &versions {
            println!(
                "v{}  {}  {}  {}",
                version.version,
                version.created_at.format("%Y-%m-%d %H:%M:%S"),
                version.created_by,
                version.commit_message.as_deref().unwrap_or("-")
            );
        }

        Ok(())
    }
}

/// Show a version
#[derive(Args, Debug)]
pub struct VersionShowCommand {
    /// Prompt name or UUID
    pub prompt: String,

    /// Version number
    pub version: i64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl VersionShowCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!(
            "Executing version show command for '{}' v{}",
            self.prompt,
            self.version
        );

        let service = open_service(config)?;
        let id = resolve_prompt_id(&service, config, &self.prompt).await?;
        let version = service.get_version(id, self.version).await?;

        if self.json {
            print_json(&version)?;
            return Ok(());
        }

        println!("Version {} ({})", version.version, version.id);
        println!("Created: {} by {}", version.created_at, version.created_by);
        if let Some(ref message) = version.commit_message {
            println!("Message: {}", message);
        }
        if !version.variables.is_empty() {
            println!("Variables: {}", version.variables.join(", "));
        }
        if !version.metadata.is_empty() {
            println!(
                "Metadata: {}",
                serde_json::Value::Object(version.metadata.clone())
            );
        }
        println!();
        println!("{}", version.content);

        Ok(())
    }
}
