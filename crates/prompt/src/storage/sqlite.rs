//! SQLite-backed storage.
//!
//! rusqlite is synchronous, so every call runs on the blocking pool behind a
//! shared connection. Each mutation is one IMMEDIATE transaction: the write
//! lock is taken before the first read, so the read-check-write sequences
//! (version allocation, label repointing) cannot interleave. A blocking task
//! runs to completion even if the awaiting future is dropped, so a cancelled
//! caller leaves either the whole change or none of it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use verso_core::config::StorageConfig;
use verso_core::{AppError, AppResult};

use super::PromptStorage;
use crate::types::{
    ActorId, Label, Metadata, Prompt, PromptFilter, PromptId, PromptList, PromptPatch,
    PromptVersion, ProjectId, VersionDraft,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS prompts (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    description TEXT,
    tags TEXT NOT NULL,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    next_version INTEGER NOT NULL,
    UNIQUE (project_id, name)
);

CREATE TABLE IF NOT EXISTS prompt_versions (
    prompt_id TEXT NOT NULL REFERENCES prompts(id) ON DELETE CASCADE,
    version INTEGER NOT NULL CHECK (version > 0),
    id TEXT NOT NULL UNIQUE,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL,
    commit_message TEXT,
    variables TEXT NOT NULL,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (prompt_id, version)
);

CREATE TABLE IF NOT EXISTS prompt_labels (
    prompt_id TEXT NOT NULL,
    name TEXT NOT NULL,
    version INTEGER NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (prompt_id, name),
    FOREIGN KEY (prompt_id, version)
        REFERENCES prompt_versions(prompt_id, version) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_prompts_project ON prompts(project_id, name);
"#;

const PROMPT_COLUMNS: &str =
    "id, project_id, name, kind, description, tags, created_by, created_at, updated_at";

const VERSION_COLUMNS: &str =
    "prompt_id, version, id, content, metadata, commit_message, variables, created_by, created_at";

/// Prompt storage in a SQLite database file.
///
/// Every call, reads included, goes through one connection behind a mutex,
/// so calls on different prompts run one at a time. This is the known gap
/// against cross-prompt parallelism; [`MemoryStorage`](super::MemoryStorage)
/// is the backend where independent prompts proceed in parallel. Per-prompt
/// correctness here comes from IMMEDIATE transactions, not from the mutex.
#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open (or create) the database at `db_path` and apply the schema.
    pub fn open(db_path: &Path, config: &StorageConfig) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::Internal(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Internal(format!("Failed to open SQLite database: {}", e)))?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")
                .map_err(db_err)?;
        }

        let storage = Self::initialize(conn, config)?;
        tracing::debug!("Opened prompt database at {:?}", db_path);
        Ok(storage)
    }

    /// A private in-memory database, mostly for tests.
    pub fn in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Internal(format!("Failed to open SQLite database: {}", e)))?;
        Self::initialize(conn, &StorageConfig::default())
    }

    fn initialize(conn: Connection, config: &StorageConfig) -> AppResult<Self> {
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(db_err)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| AppError::Internal(format!("Failed to create tables: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock();
            f(&mut conn)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Storage task failed: {}", e)))?
    }
}

/// Constraint violations become `Conflict`; everything else is `Internal`.
fn db_err(err: rusqlite::Error) -> AppError {
    match err {
        rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
            AppError::Conflict(msg.unwrap_or_else(|| e.to_string()))
        }
        other => AppError::Internal(format!("SQLite error: {}", other)),
    }
}

fn name_conflict(err: rusqlite::Error, name: &str, project_id: &str) -> AppError {
    match db_err(err) {
        AppError::Conflict(_) => AppError::Conflict(format!(
            "prompt name '{}' already exists in project {}",
            name, project_id
        )),
        other => other,
    }
}

fn parse_uuid(value: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| AppError::Internal(format!("Corrupt UUID '{}' in database: {}", value, e)))
}

fn parse_time(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AppError::Internal(format!("Corrupt timestamp '{}' in database: {}", value, e)))
}

fn parse_json<T: serde::de::DeserializeOwned>(value: &str) -> AppResult<T> {
    serde_json::from_str(value)
        .map_err(|e| AppError::Internal(format!("Corrupt JSON column in database: {}", e)))
}

fn to_json<T: serde::Serialize>(value: &T) -> AppResult<String> {
    serde_json::to_string(value).map_err(|e| AppError::Internal(format!("{}", e)))
}

struct PromptRow {
    id: String,
    project_id: String,
    name: String,
    kind: String,
    description: Option<String>,
    tags: String,
    created_by: String,
    created_at: String,
    updated_at: String,
}

impl PromptRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            name: row.get(2)?,
            kind: row.get(3)?,
            description: row.get(4)?,
            tags: row.get(5)?,
            created_by: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_prompt(self) -> AppResult<Prompt> {
        Ok(Prompt {
            id: parse_uuid(&self.id)?,
            project_id: parse_uuid(&self.project_id)?,
            name: self.name,
            kind: self
                .kind
                .parse()
                .map_err(|e| AppError::Internal(format!("Corrupt prompt kind: {}", e)))?,
            description: self.description,
            tags: parse_json(&self.tags)?,
            created_by: ActorId::new(parse_uuid(&self.created_by)?),
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
        })
    }
}

struct VersionRow {
    prompt_id: String,
    version: i64,
    id: String,
    content: String,
    metadata: String,
    commit_message: Option<String>,
    variables: String,
    created_by: String,
    created_at: String,
}

impl VersionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            prompt_id: row.get(0)?,
            version: row.get(1)?,
            id: row.get(2)?,
            content: row.get(3)?,
            metadata: row.get(4)?,
            commit_message: row.get(5)?,
            variables: row.get(6)?,
            created_by: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_version(self) -> AppResult<PromptVersion> {
        Ok(PromptVersion {
            id: parse_uuid(&self.id)?,
            prompt_id: parse_uuid(&self.prompt_id)?,
            version: self.version,
            content: self.content,
            metadata: parse_json::<Metadata>(&self.metadata)?,
            commit_message: self.commit_message,
            variables: parse_json(&self.variables)?,
            created_by: ActorId::new(parse_uuid(&self.created_by)?),
            created_at: parse_time(&self.created_at)?,
        })
    }
}

fn label_from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, i64, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_label(raw: (String, String, i64, String)) -> AppResult<Label> {
    let (prompt_id, name, version, updated_at) = raw;
    Ok(Label {
        prompt_id: parse_uuid(&prompt_id)?,
        name,
        version,
        updated_at: parse_time(&updated_at)?,
    })
}

fn insert_version_row(conn: &Connection, version: &PromptVersion) -> AppResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO prompt_versions ({VERSION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ),
        params![
            version.prompt_id.to_string(),
            version.version,
            version.id.to_string(),
            version.content,
            to_json(&version.metadata)?,
            version.commit_message,
            to_json(&version.variables)?,
            version.created_by.as_uuid().to_string(),
            version.created_at.to_rfc3339(),
        ],
    )
    .map_err(db_err)?;
    Ok(())
}

fn prompt_exists(conn: &Connection, id: &str) -> AppResult<bool> {
    conn.query_row("SELECT 1 FROM prompts WHERE id = ?1", [id], |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
        .map_err(db_err)
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[async_trait]
impl PromptStorage for SqliteStorage {
    async fn insert_prompt(&self, prompt: Prompt, first: VersionDraft) -> AppResult<PromptVersion> {
        self.run(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(db_err)?;

            let project_id = prompt.project_id.to_string();
            tx.execute(
                &format!(
                    "INSERT INTO prompts ({PROMPT_COLUMNS}, next_version) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 2)"
                ),
                params![
                    prompt.id.to_string(),
                    project_id,
                    prompt.name,
                    prompt.kind.as_str(),
                    prompt.description,
                    to_json(&prompt.tags)?,
                    prompt.created_by.as_uuid().to_string(),
                    prompt.created_at.to_rfc3339(),
                    prompt.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| name_conflict(e, &prompt.name, &project_id))?;

            let version = first.into_version(prompt.id, 1);
            insert_version_row(&tx, &version)?;

            tx.commit().map_err(db_err)?;
            Ok(version)
        })
        .await
    }

    async fn get_prompt(&self, id: PromptId) -> AppResult<Option<Prompt>> {
        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {PROMPT_COLUMNS} FROM prompts WHERE id = ?1"),
                [id.to_string()],
                PromptRow::from_row,
            )
            .optional()
            .map_err(db_err)?
            .map(PromptRow::into_prompt)
            .transpose()
        })
        .await
    }

    async fn find_prompt(&self, project_id: ProjectId, name: &str) -> AppResult<Option<Prompt>> {
        let name = name.to_string();
        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {PROMPT_COLUMNS} FROM prompts WHERE project_id = ?1 AND name = ?2"),
                params![project_id.to_string(), name],
                PromptRow::from_row,
            )
            .optional()
            .map_err(db_err)?
            .map(PromptRow::into_prompt)
            .transpose()
        })
        .await
    }

    async fn update_prompt(
        &self,
        id: PromptId,
        patch: &PromptPatch,
        updated_at: DateTime<Utc>,
    ) -> AppResult<Prompt> {
        let patch = patch.clone();
        self.run(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(db_err)?;
            let key = id.to_string();

            let mut prompt = tx
                .query_row(
                    &format!("SELECT {PROMPT_COLUMNS} FROM prompts WHERE id = ?1"),
                    [&key],
                    PromptRow::from_row,
                )
                .optional()
                .map_err(db_err)?
                .ok_or_else(|| AppError::NotFound(format!("prompt {}", id)))?
                .into_prompt()?;

            let has_versions = tx
                .query_row(
                    "SELECT 1 FROM prompt_versions WHERE prompt_id = ?1 LIMIT 1",
                    [&key],
                    |_| Ok(()),
                )
                .optional()
                .map_err(db_err)?
                .is_some();

            patch.apply(&mut prompt, has_versions, updated_at)?;
            let tags = to_json(&prompt.tags)?;

            tx.execute(
                "UPDATE prompts SET name = ?2, kind = ?3, description = ?4, tags = ?5, updated_at = ?6 \
                 WHERE id = ?1",
                params![
                    key,
                    prompt.name,
                    prompt.kind.as_str(),
                    prompt.description,
                    tags,
                    prompt.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| name_conflict(e, &prompt.name, &prompt.project_id.to_string()))?;

            tx.commit().map_err(db_err)?;
            Ok(prompt)
        })
        .await
    }

    async fn delete_prompt(&self, id: PromptId) -> AppResult<()> {
        self.run(move |conn| {
            let deleted = conn
                .execute("DELETE FROM prompts WHERE id = ?1", [id.to_string()])
                .map_err(db_err)?;
            if deleted == 0 {
                return Err(AppError::NotFound(format!("prompt {}", id)));
            }
            Ok(())
        })
        .await
    }

    async fn list_prompts(
        &self,
        filter: &PromptFilter,
        limit: usize,
        offset: usize,
    ) -> AppResult<PromptList> {
        let filter = filter.clone();
        self.run(move |conn| {
            let mut clauses = vec!["project_id = ?".to_string()];
            let mut args: Vec<Value> = vec![Value::Text(filter.project_id.to_string())];

            if let Some(ref name) = filter.name {
                clauses.push("LOWER(name) LIKE '%' || LOWER(?) || '%' ESCAPE '\\'".to_string());
                args.push(Value::Text(escape_like(name)));
            }

            if !filter.tags.is_empty() {
                let placeholders = vec!["?"; filter.tags.len()].join(", ");
                clauses.push(format!(
                    "EXISTS (SELECT 1 FROM json_each(prompts.tags) WHERE json_each.value IN ({placeholders}))"
                ));
                args.extend(filter.tags.iter().cloned().map(Value::Text));
            }

            if let Some(ref label) = filter.label {
                clauses.push(
                    "EXISTS (SELECT 1 FROM prompt_labels l WHERE l.prompt_id = prompts.id AND l.name = ?)"
                        .to_string(),
                );
                args.push(Value::Text(label.clone()));
            }

            let where_clause = clauses.join(" AND ");

            // One read transaction so the count and the page agree.
            let tx = conn.transaction().map_err(db_err)?;

            let total_count: i64 = tx
                .query_row(
                    &format!("SELECT COUNT(*) FROM prompts WHERE {where_clause}"),
                    params_from_iter(args.iter()),
                    |row| row.get(0),
                )
                .map_err(db_err)?;

            let mut page_args = args;
            page_args.push(Value::Integer(limit as i64));
            page_args.push(Value::Integer(offset as i64));

            let rows = {
                let mut stmt = tx
                    .prepare(&format!(
                        "SELECT {PROMPT_COLUMNS} FROM prompts WHERE {where_clause} \
                         ORDER BY name LIMIT ? OFFSET ?"
                    ))
                    .map_err(db_err)?;
                let rows = stmt
                    .query_map(params_from_iter(page_args.iter()), PromptRow::from_row)
                    .map_err(db_err)?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(db_err)?;
                rows
            };
            tx.commit().map_err(db_err)?;

            let prompts = rows
                .into_iter()
                .map(PromptRow::into_prompt)
                .collect::<AppResult<Vec<_>>>()?;

            let total_count = total_count.max(0) as u64;
            let has_more = ((offset + prompts.len()) as u64) < total_count;

            Ok(PromptList {
                prompts,
                total_count,
                has_more,
            })
        })
        .await
    }

    async fn append_version(
        &self,
        prompt_id: PromptId,
        draft: VersionDraft,
    ) -> AppResult<PromptVersion> {
        self.run(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(db_err)?;
            let id = prompt_id.to_string();

            let next: i64 = tx
                .query_row(
                    "SELECT next_version FROM prompts WHERE id = ?1",
                    [&id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?
                .ok_or_else(|| AppError::NotFound(format!("prompt {}", prompt_id)))?;

            let version = draft.into_version(prompt_id, next);
            insert_version_row(&tx, &version)?;

            tx.execute(
                "UPDATE prompts SET next_version = ?2 WHERE id = ?1",
                params![id, next + 1],
            )
            .map_err(db_err)?;

            tx.commit().map_err(db_err)?;
            Ok(version)
        })
        .await
    }

    async fn get_version(
        &self,
        prompt_id: PromptId,
        version: i64,
    ) -> AppResult<Option<PromptVersion>> {
        self.run(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {VERSION_COLUMNS} FROM prompt_versions WHERE prompt_id = ?1 AND version = ?2"
                ),
                params![prompt_id.to_string(), version],
                VersionRow::from_row,
            )
            .optional()
            .map_err(db_err)?
            .map(VersionRow::into_version)
            .transpose()
        })
        .await
    }

    async fn latest_version(&self, prompt_id: PromptId) -> AppResult<Option<PromptVersion>> {
        self.run(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {VERSION_COLUMNS} FROM prompt_versions WHERE prompt_id = ?1 \
                     ORDER BY version DESC LIMIT 1"
                ),
                [prompt_id.to_string()],
                VersionRow::from_row,
            )
            .optional()
            .map_err(db_err)?
            .map(VersionRow::into_version)
            .transpose()
        })
        .await
    }

    async fn list_versions(&self, prompt_id: PromptId) -> AppResult<Vec<PromptVersion>> {
        self.run(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {VERSION_COLUMNS} FROM prompt_versions WHERE prompt_id = ?1 \
                     ORDER BY version DESC"
                ))
                .map_err(db_err)?;
            let rows = stmt
                .query_map([prompt_id.to_string()], VersionRow::from_row)
                .map_err(db_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err)?;
            rows.into_iter().map(VersionRow::into_version).collect()
        })
        .await
    }

    async fn put_label(&self, prompt_id: PromptId, name: &str, version: i64) -> AppResult<Label> {
        let name = name.to_string();
        self.run(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(db_err)?;
            let id = prompt_id.to_string();

            let exists = tx
                .query_row(
                    "SELECT 1 FROM prompt_versions WHERE prompt_id = ?1 AND version = ?2",
                    params![id, version],
                    |_| Ok(()),
                )
                .optional()
                .map_err(db_err)?
                .is_some();

            if !exists {
                let what = if prompt_exists(&tx, &id)? {
                    format!("version {} of prompt {}", version, prompt_id)
                } else {
                    format!("prompt {}", prompt_id)
                };
                return Err(AppError::NotFound(what));
            }

            let label = Label {
                prompt_id,
                name,
                version,
                updated_at: Utc::now(),
            };

            tx.execute(
                "INSERT INTO prompt_labels (prompt_id, name, version, updated_at) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT (prompt_id, name) DO UPDATE SET \
                     version = excluded.version, \
                     updated_at = excluded.updated_at",
                params![id, label.name, label.version, label.updated_at.to_rfc3339()],
            )
            .map_err(db_err)?;

            tx.commit().map_err(db_err)?;
            Ok(label)
        })
        .await
    }

    async fn delete_label(&self, prompt_id: PromptId, name: &str) -> AppResult<()> {
        let name = name.to_string();
        self.run(move |conn| {
            let deleted = conn
                .execute(
                    "DELETE FROM prompt_labels WHERE prompt_id = ?1 AND name = ?2",
                    params![prompt_id.to_string(), name],
                )
                .map_err(db_err)?;
            if deleted == 0 {
                return Err(AppError::NotFound(format!(
                    "label '{}' on prompt {}",
                    name, prompt_id
                )));
            }
            Ok(())
        })
        .await
    }

    async fn get_label(&self, prompt_id: PromptId, name: &str) -> AppResult<Option<Label>> {
        let name = name.to_string();
        self.run(move |conn| {
            conn.query_row(
                "SELECT prompt_id, name, version, updated_at FROM prompt_labels \
                 WHERE prompt_id = ?1 AND name = ?2",
                params![prompt_id.to_string(), name],
                label_from_row,
            )
            .optional()
            .map_err(db_err)?
            .map(into_label)
            .transpose()
        })
        .await
    }

    async fn list_labels(&self, prompt_id: PromptId) -> AppResult<Vec<Label>> {
        self.run(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT prompt_id, name, version, updated_at FROM prompt_labels \
                     WHERE prompt_id = ?1 ORDER BY name",
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map([prompt_id.to_string()], label_from_row)
                .map_err(db_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err)?;
            rows.into_iter().map(into_label).collect()
        })
        .await
    }
}
