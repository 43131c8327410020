//! Sinks for coding assistants that read prompts from tool directories
//!
//! Claude Code picks up slash commands from `.claude/commands/*.md`, either
//! in the home directory or in a project. Cursor reads project rules from
//! `.cursor/rules/*.mdc`, each with a small YAML header.

use crate::config::SinkConfig;
use crate::core::data::PromptRecord;
use crate::core::scope::{ScopeModel, ScopeRoot};
use crate::core::traits::{Capabilities, PromptSink, WriteOutcome};
use crate::utils::error::SyncError;
use crate::utils::format::{render_front_matter, slugify};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

const DEFAULT_DESCRIPTION_KEY: &str = "description";
const DEFAULT_MAX_WRITES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assistant {
    ClaudeCode,
    Cursor,
}

impl Assistant {
    fn capabilities(self) -> Capabilities {
        match self {
            Assistant::ClaudeCode => Capabilities {
                supports_metadata: false,
                scope_model: ScopeModel::GlobalOrProject,
                scope_dir: Some(".claude"),
            },
            Assistant::Cursor => Capabilities {
                supports_metadata: false,
                scope_model: ScopeModel::Project,
                scope_dir: Some(".cursor"),
            },
        }
    }

    fn subdirectory(self) -> &'static str {
        match self {
            Assistant::ClaudeCode => "commands",
            Assistant::Cursor => "rules",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Assistant::ClaudeCode => "md",
            Assistant::Cursor => "mdc",
        }
    }
}

#[derive(Debug, Serialize)]
struct CursorRule<'a> {
    description: &'a str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    globs: &'a [String],
    #[serde(rename = "alwaysApply")]
    always_apply: bool,
}

pub struct CodingAssistantSink {
    name: String,
    assistant: Assistant,
    overwrite_existing: bool,
    always_apply: bool,
    globs: Vec<String>,
    description_key: String,
    max_writes: usize,
    claims: Mutex<HashMap<PathBuf, String>>,
}

impl CodingAssistantSink {
    pub fn from_config(config: &SinkConfig, assistant: Assistant) -> Self {
        Self {
            name: config.name.clone(),
            assistant,
            overwrite_existing: config.overwrite_existing,
            always_apply: config.always_apply,
            globs: config.globs.clone(),
            description_key: config
                .description_key
                .clone()
                .unwrap_or_else(|| DEFAULT_DESCRIPTION_KEY.to_string()),
            max_writes: config.max_concurrent_writes.unwrap_or(DEFAULT_MAX_WRITES),
            claims: Mutex::new(HashMap::new()),
        }
    }

    fn target_for(&self, root: &Path, record: &PromptRecord) -> PathBuf {
        let dir = root.join(self.assistant.subdirectory());
        let ext = self.assistant.extension();
        let slug = slugify(record.name());
        let preferred = dir.join(format!("{}.{}", slug, ext));

        let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        let path = match claims.get(&preferred) {
            Some(owner) if owner != record.identifier() => {
                dir.join(format!("{}-{}.{}", slug, slugify(record.identifier()), ext))
            }
            _ => preferred,
        };
        claims.insert(path.clone(), record.identifier().to_string());
        path
    }

    fn render(&self, record: &PromptRecord) -> Result<String, SyncError> {
        match self.assistant {
            Assistant::ClaudeCode => Ok(record.body().to_string()),
            Assistant::Cursor => {
                let description = record
                    .metadata()
                    .get(&self.description_key)
                    .map(ToString::to_string)
                    .unwrap_or_else(|| record.name().to_string());
                let header = CursorRule {
                    description: &description,
                    globs: &self.globs,
                    always_apply: self.always_apply,
                };
                render_front_matter(&header, record.body()).map_err(|e| {
                    SyncError::validation(
                        format!("record '{}'", record.identifier()),
                        format!("cannot render rule header: {}", e),
                    )
                })
            }
        }
    }
}

#[async_trait]
impl PromptSink for CodingAssistantSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        self.assistant.capabilities()
    }

    fn max_concurrent_writes(&self) -> usize {
        self.max_writes
    }

    async fn prepare(&self, records: &[PromptRecord], scope: &ScopeRoot) {
        let Some(root) = scope.path() else {
            return;
        };
        let mut ordered: Vec<&PromptRecord> = records.iter().collect();
        ordered.sort_by(|a, b| a.identifier().cmp(b.identifier()));
        for record in ordered {
            self.target_for(root, record);
        }
    }

    async fn write(&self, record: &PromptRecord, scope: &ScopeRoot) -> Result<WriteOutcome, SyncError> {
        let root = scope.path().ok_or_else(|| {
            SyncError::validation(format!("sink '{}'", self.name), "no scope directory was resolved")
        })?;
        let path = self.target_for(root, record);
        let target = path.display().to_string();

        if !self.overwrite_existing && tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(WriteOutcome::skipped("file exists and overwrite_existing is off").with_target(target));
        }

        let content = self.render(record)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(&self.name, parent, e))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| io_error(&self.name, &path, e))?;

        debug!(sink = %self.name, record = record.identifier(), path = %target, "wrote file");
        Ok(WriteOutcome::written(target))
    }
}

fn io_error(sink: &str, path: &Path, err: std::io::Error) -> SyncError {
    let message = format!("{}: {}", path.display(), err);
    match err.kind() {
        std::io::ErrorKind::PermissionDenied => SyncError::sink_rejected(sink, message),
        _ => SyncError::sink_unavailable(sink, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::RecordDraft;
    use crate::core::scope::Scope;
    use crate::utils::format::split_front_matter;
    use pretty_assertions::assert_eq;

    fn config(kind: &str) -> SinkConfig {
        toml::from_str(&format!("name = \"assistant\"\ntype = \"{}\"\n", kind)).unwrap()
    }

    fn record(name: &str) -> PromptRecord {
        let mut draft = RecordDraft {
            identifier: name.to_string(),
            name: name.to_string(),
            body: "Prefer small functions.".to_string(),
            version: 1,
            tags: vec!["ide".to_string()],
            ..Default::default()
        };
        draft.metadata.insert("description".into(), "Coding style".into());
        PromptRecord::from_draft(draft, "langfuse").unwrap()
    }

    fn project_root(path: &Path, dir: &str) -> ScopeRoot {
        ScopeRoot::Directory {
            scope: Scope::Project,
            path: path.join(dir),
        }
    }

    #[test]
    fn test_capabilities() {
        let claude = CodingAssistantSink::from_config(&config("claude-code"), Assistant::ClaudeCode);
        assert_eq!(claude.capabilities().scope_model, ScopeModel::GlobalOrProject);
        let cursor = CodingAssistantSink::from_config(&config("cursor"), Assistant::Cursor);
        assert_eq!(cursor.capabilities().scope_model, ScopeModel::Project);
        assert!(!cursor.capabilities().supports_metadata);
    }

    #[tokio::test]
    async fn test_claude_code_writes_plain_command() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CodingAssistantSink::from_config(&config("claude-code"), Assistant::ClaudeCode);

        let outcome = sink
            .write(&record("Style Guide"), &project_root(dir.path(), ".claude"))
            .await
            .unwrap();

        let path = dir.path().join(".claude/commands/style-guide.md");
        assert_eq!(outcome, WriteOutcome::written(path.display().to_string()));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "Prefer small functions.");
    }

    #[tokio::test]
    async fn test_cursor_rule_header() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config("cursor");
        cfg.always_apply = true;
        cfg.globs = vec!["**/*.rs".to_string()];
        let sink = CodingAssistantSink::from_config(&cfg, Assistant::Cursor);

        sink.write(&record("Style Guide"), &project_root(dir.path(), ".cursor"))
            .await
            .unwrap();

        let text = std::fs::read_to_string(dir.path().join(".cursor/rules/style-guide.mdc")).unwrap();
        let (yaml, body) = split_front_matter(&text).unwrap();
        let header: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(header["description"], "Coding style");
        assert_eq!(header["alwaysApply"], true);
        assert_eq!(header["globs"][0], "**/*.rs");
        assert_eq!(body, "Prefer small functions.");
    }

    fn named(identifier: &str, name: &str) -> PromptRecord {
        let draft = RecordDraft {
            identifier: identifier.to_string(),
            name: name.to_string(),
            body: format!("{} body", identifier),
            version: 1,
            ..Default::default()
        };
        PromptRecord::from_draft(draft, "langfuse").unwrap()
    }

    #[tokio::test]
    async fn test_colliding_names_map_the_same_way_every_pass() {
        let dir = tempfile::tempdir().unwrap();
        let root = project_root(dir.path(), ".claude");
        let records = vec![named("zeta", "Style Guide"), named("alpha", "style guide")];

        let mut passes = Vec::new();
        for order in [[0, 1], [1, 0]] {
            let sink = CodingAssistantSink::from_config(&config("claude-code"), Assistant::ClaudeCode);
            sink.prepare(&records, &root).await;
            let mut targets = Vec::new();
            for i in order {
                let outcome = sink.write(&records[i], &root).await.unwrap();
                targets.push((records[i].identifier().to_string(), outcome.target.unwrap()));
            }
            targets.sort();
            passes.push(targets);
        }

        assert_eq!(passes[0], passes[1]);
        let commands = dir.path().join(".claude/commands");
        assert_eq!(
            std::fs::read_to_string(commands.join("style-guide.md")).unwrap(),
            "alpha body"
        );
        assert_eq!(
            std::fs::read_to_string(commands.join("style-guide-zeta.md")).unwrap(),
            "zeta body"
        );
    }

    #[tokio::test]
    async fn test_unscoped_root_is_rejected() {
        let sink = CodingAssistantSink::from_config(&config("cursor"), Assistant::Cursor);
        let err = sink.write(&record("x"), &ScopeRoot::Unscoped).await.unwrap_err();
        assert!(matches!(err, SyncError::Validation { .. }));
    }
}
