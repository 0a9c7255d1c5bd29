//! Command handlers for the Verso CLI.
//!
//! This module organizes all CLI commands into separate submodules and holds
//! the plumbing they share: opening the engine, resolving the acting user,
//! reading content and printing results.

pub mod compile;
pub mod label;
pub mod prompt;
pub mod version;

// Re-export command types for convenience
pub use compile::CompileCommand;
pub use label::LabelCommand;
pub use prompt::PromptCommand;
pub use version::VersionCommand;

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use verso_core::{config::AppConfig, AppError, AppResult};
use verso_prompt::{ActorId, Metadata, PromptId, PromptService, ServiceConfig, SqliteStorage};

pub(crate) type Service = PromptService<SqliteStorage>;

/// Open the workspace database and build the engine on top of it.
pub(crate) fn open_service(config: &AppConfig) -> AppResult<Service> {
    let storage = SqliteStorage::open(&config.database_path(), &config.storage)?;
    Ok(PromptService::new(
        std::sync::Arc::new(storage),
        ServiceConfig::from(config),
    ))
}

/// The acting user for a mutating command. Never defaulted silently.
pub(crate) fn require_actor(config: &AppConfig) -> AppResult<ActorId> {
    config.actor.map(ActorId::new).ok_or_else(|| {
        AppError::Config(
            "No acting user; pass --actor <uuid>, --system, or set VERSO_ACTOR".to_string(),
        )
    })
}

/// Accept either a prompt name in the selected project or a prompt UUID.
///
/// The name is tried first, so a prompt whose name happens to look like a
/// UUID stays addressable by name.
pub(crate) async fn resolve_prompt_id(
    service: &Service,
    config: &AppConfig,
    prompt: &str,
) -> AppResult<PromptId> {
    let as_id = Uuid::parse_str(prompt).ok();

    let project = match (config.project, as_id) {
        (Some(project), _) => project,
        (None, Some(id)) => return Ok(id),
        (None, None) => config.require_project()?,
    };

    match service.find_by_name(project, prompt).await {
        Ok(found) => Ok(found.id),
        Err(e) if e.is_not_found() => as_id.ok_or(e),
        Err(e) => Err(e),
    }
}

/// Content from the positional argument or `--file`, exactly one of them.
pub(crate) fn read_content(inline: Option<&str>, file: Option<&Path>) -> AppResult<String> {
    match (inline, file) {
        (Some(content), None) => Ok(content.to_string()),
        (None, Some(path)) => Ok(std::fs::read_to_string(path)?),
        (Some(_), Some(_)) => Err(AppError::Validation(
            "Pass content either inline or with --file, not both".to_string(),
        )),
        (None, None) => Err(AppError::Validation(
            "No content provided; pass it inline or with --file".to_string(),
        )),
    }
}

/// Parse `--metadata` as a JSON object.
pub(crate) fn parse_metadata(raw: Option<&str>) -> AppResult<Metadata> {
    match raw {
        None => Ok(Metadata::new()),
        Some(raw) => serde_json::from_str(raw).map_err(|e| {
            AppError::Validation(format!("--metadata must be a JSON object: {}", e))
        }),
    }
}

/// Split a `key=value` pair. The value may itself contain `=`.
pub(crate) fn parse_var(raw: &str) -> AppResult<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(AppError::Validation(format!(
            "Invalid variable '{}', expected key=value",
            raw
        ))),
    }
}

/// Merge a JSON object file of string values with repeated `--var` pairs.
/// Pairs given on the command line win.
pub(crate) fn collect_variables(
    pairs: &[String],
    file: Option<&PathBuf>,
) -> AppResult<HashMap<String, String>> {
    let mut variables: HashMap<String, String> = match file {
        Some(path) => {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str(&contents).map_err(|e| {
                AppError::Validation(format!(
                    "Variables file {:?} must be a JSON object of strings: {}",
                    path, e
                ))
            })?
        }
        None => HashMap::new(),
    };

    for raw in pairs {
        let (key, value) = parse_var(raw)?;
        variables.insert(key, value);
    }

    Ok(variables)
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use verso_prompt::NewPrompt;

    #[test]
    fn test_parse_var() {
        assert_eq!(
            parse_var("user=Ann").unwrap(),
            ("user".to_string(), "Ann".to_string())
        );
        assert_eq!(parse_var("q=a=b").unwrap().1, "a=b");
        assert_eq!(parse_var("empty=").unwrap().1, "");
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn test_collect_variables_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"user": "file", "topic": "rust"}}"#).unwrap();
        let path = file.path().to_path_buf();

        let vars = collect_variables(&["user=flag".to_string()], Some(&path)).unwrap();
        assert_eq!(vars["user"], "flag");
        assert_eq!(vars["topic"], "rust");
    }

    #[test]
    fn test_read_content_requires_exactly_one_source() {
        assert_eq!(read_content(Some("hi"), None).unwrap(), "hi");
        assert!(read_content(None, None).is_err());
        assert!(read_content(Some("hi"), Some(Path::new("x"))).is_err());
    }

    #[test]
    fn test_require_actor() {
        let mut config = AppConfig::default();
        assert!(matches!(require_actor(&config), Err(AppError::Config(_))));

        config.actor = Some(Uuid::nil());
        assert!(require_actor(&config).unwrap().is_system());
    }

    #[test]
    fn test_parse_metadata() {
        assert!(parse_metadata(None).unwrap().is_empty());
        let meta = parse_metadata(Some(r#"{"model": "small", "temperature": 0.2}"#)).unwrap();
        assert_eq!(meta["model"], "small");
        assert!(parse_metadata(Some("[1, 2]")).is_err());
    }

    #[tokio::test]
    async fn test_resolve_prompt_prefers_name_over_id() {
        let service: Service = PromptService::new(
            std::sync::Arc::new(SqliteStorage::in_memory().unwrap()),
            ServiceConfig::default(),
        );
        let project = Uuid::new_v4();
        let config = AppConfig {
            project: Some(project),
            ..AppConfig::default()
        };

        let other = service
            .create(project, NewPrompt::new("other", "x"), ActorId::system())
            .await
            .unwrap()
            .prompt
            .id;
        // Named after the other prompt's id, which must not shadow the name.
        let uuid_named = service
            .create(project, NewPrompt::new(other.to_string(), "y"), ActorId::system())
            .await
            .unwrap()
            .prompt
            .id;

        let by_name = resolve_prompt_id(&service, &config, &other.to_string())
            .await
            .unwrap();
        assert_eq!(by_name, uuid_named);

        // A UUID that names nothing falls back to being an id.
        let by_id = resolve_prompt_id(&service, &config, &uuid_named.to_string())
            .await
            .unwrap();
        assert_eq!(by_id, uuid_named);

        assert!(resolve_prompt_id(&service, &config, "missing")
            .await
            .unwrap_err()
            .is_not_found());

        let no_project = AppConfig::default();
        assert_eq!(
            resolve_prompt_id(&service, &no_project, &other.to_string())
                .await
                .unwrap(),
            other
        );
        assert!(matches!(
            resolve_prompt_id(&service, &no_project, "other").await,
            Err(AppError::Config(_))
        ));
    }
}
