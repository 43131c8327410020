//! Filesystem sink
//!
//! Each record becomes one file under the configured directory. With
//! metadata enabled the file opens with a YAML front matter header that
//! carries the identifier, so a later pass recognises its own files.

use crate::config::SinkConfig;
use crate::core::data::{Metadata, PromptRecord};
use crate::core::scope::ScopeRoot;
use crate::core::traits::{Capabilities, PromptSink, WriteOutcome};
use crate::utils::error::SyncError;
use crate::utils::format::{parse_front_matter, render_front_matter, slugify};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

const DEFAULT_EXTENSION: &str = "md";
const UNTAGGED_DIR: &str = "untagged";
const DEFAULT_MAX_WRITES: usize = 4;

/// Header written above the body when metadata is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrontMatter {
    pub identifier: String,
    pub name: String,
    pub version: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl FrontMatter {
    fn of(record: &PromptRecord) -> Self {
        Self {
            identifier: record.identifier().to_string(),
            name: record.name().to_string(),
            version: record.version(),
            tags: record.tags().iter().cloned().collect(),
            metadata: record.metadata().clone(),
        }
    }
}

/// Parse a file written by this sink back into its header and body.
pub fn parse_document(text: &str) -> Option<(FrontMatter, &str)> {
    parse_front_matter(text)
}

pub struct FilesystemSink {
    name: String,
    root: PathBuf,
    include_metadata: bool,
    extension: String,
    create_subdirectories: bool,
    subdirectory_tag: Option<String>,
    overwrite_existing: bool,
    max_writes: usize,
    /// Paths handed out during this pass and the identifier that owns each.
    /// Held across the on-disk owner check so choosing and claiming a path
    /// is one step.
    claims: Mutex<HashMap<PathBuf, String>>,
}

impl FilesystemSink {
    pub fn from_config(config: &SinkConfig) -> Result<Self, SyncError> {
        let root = config.path.clone().ok_or_else(|| {
            SyncError::validation(format!("sink '{}'", config.name), "filesystem sink requires a path")
        })?;
        let extension = config
            .extension
            .as_deref()
            .map(|e| e.trim_start_matches('.').to_string())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

        Ok(Self {
            name: config.name.clone(),
            root,
            include_metadata: config.include_metadata,
            extension,
            create_subdirectories: config.create_subdirectories,
            subdirectory_tag: config.subdirectory_tag.clone(),
            overwrite_existing: config.overwrite_existing,
            max_writes: config.max_concurrent_writes.unwrap_or(DEFAULT_MAX_WRITES),
            claims: Mutex::new(HashMap::new()),
        })
    }

    fn directory_for(&self, record: &PromptRecord) -> PathBuf {
        if !self.create_subdirectories {
            return self.root.clone();
        }
        let tag = match &self.subdirectory_tag {
            Some(tag) if record.has_tag(tag) => Some(tag.as_str()),
            _ => record.tags().iter().next().map(String::as_str),
        };
        match tag {
            Some(tag) => self.root.join(slugify(tag)),
            None => self.root.join(UNTAGGED_DIR),
        }
    }

    /// Choose the target path, giving a record a longer file name when its
    /// slug is already taken by a different identifier, either earlier in
    /// this pass or by the header of the file already on disk.
    async fn target_for(&self, record: &PromptRecord) -> PathBuf {
        let dir = self.directory_for(record);
        let slug = slugify(record.name());
        let preferred = dir.join(format!("{}.{}", slug, self.extension));

        let mut claims = self.claims.lock().await;
        let taken = match claims.get(&preferred) {
            Some(owner) => owner != record.identifier(),
            None => on_disk_owner(&preferred)
                .await
                .is_some_and(|owner| owner != record.identifier()),
        };

        let path = if taken {
            dir.join(format!(
                "{}-{}.{}",
                slug,
                slugify(record.identifier()),
                self.extension
            ))
        } else {
            preferred
        };

        claims.insert(path.clone(), record.identifier().to_string());
        path
    }

    fn render(&self, record: &PromptRecord) -> Result<String, SyncError> {
        if !self.include_metadata {
            return Ok(record.body().to_string());
        }
        render_front_matter(&FrontMatter::of(record), record.body()).map_err(|e| {
            SyncError::validation(
                format!("record '{}'", record.identifier()),
                format!("cannot render front matter: {}", e),
            )
        })
    }

    fn io_error(&self, path: &Path, err: std::io::Error) -> SyncError {
        let message = format!("{}: {}", path.display(), err);
        match err.kind() {
            IoErrorKind::PermissionDenied => SyncError::sink_rejected(&self.name, message),
            _ => SyncError::sink_unavailable(&self.name, message),
        }
    }
}

/// Identifier recorded in the header of an existing file, if any.
async fn on_disk_owner(path: &Path) -> Option<String> {
    let text = tokio::fs::read_to_string(path).await.ok()?;
    parse_document(&text).map(|(header, _)| header.identifier)
}

#[async_trait]
impl PromptSink for FilesystemSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::unscoped(self.include_metadata)
    }

    fn max_concurrent_writes(&self) -> usize {
        self.max_writes
    }

    async fn prepare(&self, records: &[PromptRecord], _scope: &ScopeRoot) {
        let mut ordered: Vec<&PromptRecord> = records.iter().collect();
        ordered.sort_by(|a, b| a.identifier().cmp(b.identifier()));
        for record in ordered {
            self.target_for(record).await;
        }
    }

    async fn write(&self, record: &PromptRecord, _scope: &ScopeRoot) -> Result<WriteOutcome, SyncError> {
        let path = self.target_for(record).await;
        let target = path.display().to_string();

        if !self.overwrite_existing && tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(WriteOutcome::skipped("file exists and overwrite_existing is off").with_target(target));
        }

        let content = self.render(record)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(parent, e))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| self.io_error(&path, e))?;

        debug!(sink = %self.name, record = record.identifier(), path = %target, "wrote file");
        Ok(WriteOutcome::written(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::{MetadataValue, RecordDraft};
    use crate::core::traits::WriteStatus;
    use pretty_assertions::assert_eq;

    fn config(path: &Path) -> SinkConfig {
        toml::from_str(&format!(
            "name = \"notes\"\ntype = \"filesystem\"\npath = {:?}\n",
            path.display().to_string()
        ))
        .unwrap()
    }

    fn record(identifier: &str, name: &str, tags: &[&str]) -> PromptRecord {
        let mut metadata = Metadata::new();
        metadata.insert("source_platform".into(), "langfuse".into());
        metadata.insert("langfuse_version".into(), MetadataValue::Integer(2));
        PromptRecord::from_draft(
            RecordDraft {
                identifier: identifier.to_string(),
                name: name.to_string(),
                body: "You review code.\n\nBe kind.".to_string(),
                version: 2,
                tags: tags.iter().map(|t| t.to_string()).collect(),
                metadata,
            },
            "langfuse",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_writes_front_matter_that_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FilesystemSink::from_config(&config(dir.path())).unwrap();
        let rec = record("p1", "Review Code", &["technical", "ide"]);

        let outcome = sink.write(&rec, &ScopeRoot::Unscoped).await.unwrap();
        let path = dir.path().join("review-code.md");
        assert_eq!(outcome, WriteOutcome::written(path.display().to_string()));

        let text = std::fs::read_to_string(&path).unwrap();
        let (header, body) = parse_document(&text).unwrap();
        assert_eq!(header, FrontMatter::of(&rec));
        assert_eq!(header.tags, vec!["ide", "technical"]);
        assert_eq!(body, rec.body());
    }

    #[tokio::test]
    async fn test_rewrite_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FilesystemSink::from_config(&config(dir.path())).unwrap();
        let rec = record("p1", "Review Code", &["technical"]);

        sink.write(&rec, &ScopeRoot::Unscoped).await.unwrap();
        let first = std::fs::read(dir.path().join("review-code.md")).unwrap();
        sink.write(&rec, &ScopeRoot::Unscoped).await.unwrap();
        let second = std::fs::read(dir.path().join("review-code.md")).unwrap();
        assert_eq!(first, second);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_slug_collision_gets_distinct_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FilesystemSink::from_config(&config(dir.path())).unwrap();

        sink.write(&record("a", "Review Code", &[]), &ScopeRoot::Unscoped).await.unwrap();
        let outcome = sink
            .write(&record("b", "review_code", &[]), &ScopeRoot::Unscoped)
            .await
            .unwrap();

        assert_eq!(
            outcome.target,
            Some(dir.path().join("review-code-b.md").display().to_string())
        );
        let (header, _) =
            parse_document(&std::fs::read_to_string(dir.path().join("review-code.md")).unwrap()).unwrap();
        assert_eq!(header.identifier, "a");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_collisions_land_in_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FilesystemSink::from_config(&config(dir.path())).unwrap();
        let a = record("a", "Review Code", &[]);
        let b = record("b", "review_code", &[]);

        let (first, second) = tokio::join!(
            sink.write(&a, &ScopeRoot::Unscoped),
            sink.write(&b, &ScopeRoot::Unscoped)
        );
        let first = first.unwrap().target.unwrap();
        let second = second.unwrap().target.unwrap();

        assert_ne!(first, second);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
        for (target, id) in [(first, "a"), (second, "b")] {
            let (header, _) = parse_document(&std::fs::read_to_string(target).unwrap()).unwrap();
            assert_eq!(header.identifier, id);
        }
    }

    #[tokio::test]
    async fn test_prepare_gives_plain_name_to_first_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FilesystemSink::from_config(&config(dir.path())).unwrap();
        let a = record("a", "Review Code", &[]);
        let b = record("b", "review_code", &[]);

        sink.prepare(&[b.clone(), a.clone()], &ScopeRoot::Unscoped).await;
        let second = sink.write(&b, &ScopeRoot::Unscoped).await.unwrap();
        let first = sink.write(&a, &ScopeRoot::Unscoped).await.unwrap();

        assert_eq!(first.target, Some(dir.path().join("review-code.md").display().to_string()));
        assert_eq!(second.target, Some(dir.path().join("review-code-b.md").display().to_string()));
    }

    #[tokio::test]
    async fn test_subdirectories_and_plain_body() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.create_subdirectories = true;
        cfg.include_metadata = false;
        cfg.extension = Some(".txt".to_string());
        let sink = FilesystemSink::from_config(&cfg).unwrap();
        assert!(!sink.capabilities().supports_metadata);

        sink.write(&record("p1", "One", &["technical"]), &ScopeRoot::Unscoped).await.unwrap();
        sink.write(&record("p2", "Two", &[]), &ScopeRoot::Unscoped).await.unwrap();

        let one = std::fs::read_to_string(dir.path().join("technical/one.txt")).unwrap();
        assert_eq!(one, "You review code.\n\nBe kind.");
        assert!(dir.path().join("untagged/two.txt").exists());
    }

    #[tokio::test]
    async fn test_existing_file_is_kept_without_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("one.md"), "hand written").unwrap();
        let mut cfg = config(dir.path());
        cfg.overwrite_existing = false;
        let sink = FilesystemSink::from_config(&cfg).unwrap();

        let outcome = sink.write(&record("p1", "One", &[]), &ScopeRoot::Unscoped).await.unwrap();
        assert_eq!(outcome.status, WriteStatus::Skipped);
        assert_eq!(std::fs::read_to_string(dir.path().join("one.md")).unwrap(), "hand written");
    }

    #[test]
    fn test_path_is_required() {
        let mut cfg = config(Path::new("/tmp"));
        cfg.path = None;
        assert!(matches!(
            FilesystemSink::from_config(&cfg),
            Err(SyncError::Validation { .. })
        ));
    }
}
