//! Compile command handler.
//!
//! Resolves a prompt version and substitutes variables into it.

use clap::Args;
use std::path::PathBuf;
use verso_core::{config::AppConfig, AppResult};
use verso_prompt::CompileOptions;

use super::{collect_variables, open_service, print_json};

/// Compile a prompt
#[derive(Args, Debug)]
pub struct CompileCommand {
    /// Prompt name
    pub name: String,

    /// Variable binding key=value (repeatable)
    #[arg(long = "var")]
    pub vars: Vec<String>,

    /// JSON file with an object of variable bindings
    #[arg(long)]
    pub vars_file: Option<PathBuf>,

    /// Pin an exact version (wins over --label)
    #[arg(long)]
    pub version: Option<i64>,

    /// Follow a label instead of the default chain
    #[arg(short, long)]
    pub label: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl CompileCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing compile command for '{}'", self.name);
        tracing::debug!("Compile options: {:?}", self);

        let project = config.require_project()?;
        let variables = collect_variables(&self.vars, self.vars_file.as_ref())?;
        let options = CompileOptions {
            version: self.version,
            label: self.label.clone(),
        };

        let service = open_service(config)?;
        let compiled = service
            .compile(project, &self.name, &variables, &options)
            .await?;

        if self.json {
            print_json(&compiled)?;
        } else {
            println!("{}", compiled.compiled);
        }

        Ok(())
    }
}
