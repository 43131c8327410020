//! Source and sink adapters and the registry that builds them
//!
//! Every supported `type` string maps to exactly one variant of [`SourceKind`]
//! or [`SinkKind`]. Adding a platform means adding a variant, a module and one
//! arm in [`Registry`]; the orchestrator never changes.

pub mod coding_assistant;
pub mod filesystem;
pub mod langfuse;
pub mod openwebui;
pub mod unsupported;

use crate::config::{SinkConfig, SourceConfig};
use crate::core::plan::AdapterFactory;
use crate::core::traits::{PromptSink, PromptSource};
use crate::utils::error::SyncError;
use reqwest::Client;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const USER_AGENT: &str = concat!("prompt-pidgeon/", env!("CARGO_PKG_VERSION"));

/// Platforms recognised as sink types but not implemented in this build.
pub const UNSUPPORTED_PLATFORMS: [&str; 4] = ["windsurf", "github-copilot", "cline", "roo-code"];

/// Read access to credentials and other environment settings.
pub trait EnvLookup: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl EnvLookup for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.trim().is_empty()).cloned()
    }
}

/// First non-empty variable among `keys`, with an explicit override tried first.
pub fn lookup_var(env: &dyn EnvLookup, override_key: Option<&str>, keys: &[&str]) -> Option<String> {
    match override_key {
        Some(key) => env.var(key),
        None => keys.iter().find_map(|key| env.var(key)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Langfuse,
}

impl FromStr for SourceKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "langfuse" => Ok(SourceKind::Langfuse),
            other => Err(SyncError::validation(
                "source type",
                format!("unknown source type '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Filesystem,
    OpenWebUi,
    ClaudeCode,
    Cursor,
    Unsupported(&'static str),
}

impl FromStr for SinkKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "filesystem" => Ok(SinkKind::Filesystem),
            "open-webui" | "openwebui" => Ok(SinkKind::OpenWebUi),
            "claude-code" => Ok(SinkKind::ClaudeCode),
            "cursor" => Ok(SinkKind::Cursor),
            other => UNSUPPORTED_PLATFORMS
                .iter()
                .copied()
                .find(|p| *p == other)
                .map(SinkKind::Unsupported)
                .ok_or_else(|| {
                    SyncError::validation("sink type", format!("unknown sink type '{}'", other))
                }),
        }
    }
}

/// Builds adapters from configuration, resolving credentials from the
/// environment.
pub struct Registry {
    env: Arc<dyn EnvLookup>,
    timeout: Duration,
}

impl Registry {
    pub fn new(env: Arc<dyn EnvLookup>, timeout: Duration) -> Self {
        Self { env, timeout }
    }

    pub fn from_process_env(timeout: Duration) -> Self {
        Self::new(Arc::new(ProcessEnv), timeout)
    }
}

impl AdapterFactory for Registry {
    fn source(&self, config: &SourceConfig) -> Result<Arc<dyn PromptSource>, SyncError> {
        match config.kind.parse::<SourceKind>()? {
            SourceKind::Langfuse => Ok(Arc::new(langfuse::LangfuseSource::from_config(
                config,
                self.env.as_ref(),
                self.timeout,
            )?)),
        }
    }

    fn sink(&self, config: &SinkConfig) -> Result<Arc<dyn PromptSink>, SyncError> {
        let sink: Arc<dyn PromptSink> = match config.kind.parse::<SinkKind>()? {
            SinkKind::Filesystem => Arc::new(filesystem::FilesystemSink::from_config(config)?),
            SinkKind::OpenWebUi => Arc::new(openwebui::OpenWebUiSink::from_config(
                config,
                self.env.as_ref(),
                self.timeout,
            )?),
            SinkKind::ClaudeCode => Arc::new(coding_assistant::CodingAssistantSink::from_config(
                config,
                coding_assistant::Assistant::ClaudeCode,
            )),
            SinkKind::Cursor => Arc::new(coding_assistant::CodingAssistantSink::from_config(
                config,
                coding_assistant::Assistant::Cursor,
            )),
            SinkKind::Unsupported(platform) => {
                Arc::new(unsupported::UnsupportedSink::new(&config.name, platform))
            }
        };
        Ok(sink)
    }
}

/// HTTP client shared by the network adapters.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}
