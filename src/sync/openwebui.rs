//! Open-WebUI sink
//!
//! Records named `user/...` become slash commands through the prompts API;
//! records named `system/...` become one custom model per configured base
//! model through the models API. Both paths look the target up first and
//! update it in place, so repeated passes never create duplicates.

use super::{EnvLookup, http_client, lookup_var};
use crate::config::{BaseModelConfig, SinkConfig};
use crate::core::data::PromptRecord;
use crate::core::scope::ScopeRoot;
use crate::core::traits::{Capabilities, PromptSink, WriteOutcome};
use crate::utils::error::SyncError;
use crate::utils::format::slugify;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const API_KEY_VARS: [&str; 2] = ["PROMPT_PIDGEON_OPEN_WEBUI_API_KEY", "OPEN_WEBUI_API_KEY"];
const URL_VARS: [&str; 2] = ["PROMPT_PIDGEON_OPEN_WEBUI_URL", "OPEN_WEBUI_URL"];
const DEFAULT_COMMAND_PREFIX: &str = "lf";
const DEFAULT_MODEL_PREFIX: &str = "sme";
const MANAGED_TAG: &str = "prompt-pidgeon-managed";
const DEFAULT_MAX_WRITES: usize = 4;

const USER_PREFIX: &str = "user/";
const SYSTEM_PREFIX: &str = "system/";

/// How a record maps onto Open-WebUI, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category<'a> {
    User(&'a str),
    System(&'a str),
}

impl<'a> Category<'a> {
    pub fn of(name: &'a str) -> Option<Self> {
        if let Some(rest) = name.strip_prefix(USER_PREFIX) {
            Some(Category::User(rest))
        } else {
            name.strip_prefix(SYSTEM_PREFIX).map(Category::System)
        }
    }
}

#[derive(Debug, Serialize)]
struct UserPrompt<'a> {
    command: String,
    title: String,
    content: &'a str,
    access_control: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ModelForm<'a> {
    id: String,
    name: String,
    base_model_id: &'a str,
    params: serde_json::Value,
    is_active: bool,
    meta: serde_json::Value,
    tags: Vec<String>,
}

pub struct OpenWebUiSink {
    name: String,
    client: Client,
    base_url: Url,
    api_key: String,
    command_prefix: String,
    model_prefix: String,
    base_models: Vec<BaseModelConfig>,
    default_tags: Vec<String>,
    max_writes: usize,
}

impl OpenWebUiSink {
    pub fn from_config(
        config: &SinkConfig,
        env: &dyn EnvLookup,
        timeout: Duration,
    ) -> Result<Self, SyncError> {
        let subject = || format!("sink '{}'", config.name);

        let url = config
            .url
            .clone()
            .or_else(|| lookup_var(env, config.url_env.as_deref(), &URL_VARS))
            .ok_or_else(|| SyncError::validation(subject(), "Open-WebUI url is not set"))?;
        let base_url = Url::parse(&url)
            .map_err(|e| SyncError::validation(subject(), format!("invalid url '{}': {}", url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::validation(subject(), format!("url '{}' cannot carry a path", url)));
        }

        let api_key = lookup_var(env, config.api_key_env.as_deref(), &API_KEY_VARS)
            .ok_or_else(|| SyncError::validation(subject(), "Open-WebUI API key is not set"))?;

        let client = http_client(timeout)
            .map_err(|e| SyncError::validation(subject(), format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            name: config.name.clone(),
            client,
            base_url,
            api_key,
            command_prefix: config
                .command_prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_COMMAND_PREFIX.to_string()),
            model_prefix: config
                .model_prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL_PREFIX.to_string()),
            base_models: config.base_models.clone(),
            default_tags: config
                .default_tags
                .clone()
                .unwrap_or_else(|| vec![MANAGED_TAG.to_string()]),
            max_writes: config.max_concurrent_writes.unwrap_or(DEFAULT_MAX_WRITES),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn unavailable(&self, message: impl Into<String>) -> SyncError {
        SyncError::sink_unavailable(&self.name, message)
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<Response, SyncError> {
        request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| self.unavailable(format!("{} failed: {}", what, e)))
    }

    /// Turn a non-2xx response into the matching sink error.
    async fn check_status(&self, response: Response, what: &str) -> Result<Response, SyncError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = format!("{} returned {} {}", what, status, body.trim());
        if status.is_server_error() {
            Err(self.unavailable(message))
        } else {
            Err(SyncError::sink_rejected(&self.name, message))
        }
    }

    /// Whether the resource behind `url` already exists.
    async fn exists(&self, url: Url, what: &str) -> Result<bool, SyncError> {
        let response = self.send(self.client.get(url), what).await?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED => Ok(false),
            _ => self.check_status(response, what).await.map(|_| true),
        }
    }

    async fn post_json<T: Serialize>(&self, url: Url, body: &T, what: &str) -> Result<(), SyncError> {
        let response = self.send(self.client.post(url).json(body), what).await?;
        self.check_status(response, what).await.map(|_| ())
    }

    async fn write_user_prompt(&self, record: &PromptRecord, rest: &str) -> Result<WriteOutcome, SyncError> {
        let command = format!("{}-{}", self.command_prefix, slugify(rest));
        let form = UserPrompt {
            command: format!("/{}", command),
            title: rest.to_string(),
            content: record.body(),
            access_control: json!({}),
        };

        let lookup = self.endpoint(&["api", "v1", "prompts", "command", &command]);
        if self.exists(lookup, "prompt lookup").await? {
            debug!(sink = %self.name, command = %command, "updating prompt");
            let url = self.endpoint(&["api", "v1", "prompts", "command", &command, "update"]);
            self.post_json(url, &form, "prompt update").await?;
        } else {
            debug!(sink = %self.name, command = %command, "creating prompt");
            let url = self.endpoint(&["api", "v1", "prompts", "create"]);
            self.post_json(url, &form, "prompt create").await?;
        }

        Ok(WriteOutcome::written(form.command))
    }

    async fn write_system_prompt(&self, record: &PromptRecord, rest: &str) -> Result<WriteOutcome, SyncError> {
        if self.base_models.is_empty() {
            return Ok(WriteOutcome::skipped("no base models configured for system prompts"));
        }

        let slug = slugify(rest);
        let mut tags = self.default_tags.clone();
        tags.extend(record.tags().iter().cloned());

        let mut written = Vec::with_capacity(self.base_models.len());
        for base in &self.base_models {
            let id = format!("{}-{}-{}", self.model_prefix, slug, base.short_name);
            let form = ModelForm {
                id: id.clone(),
                name: id.clone(),
                base_model_id: &base.id,
                params: json!({ "system": record.body() }),
                is_active: base.active,
                meta: json!({}),
                tags: tags.clone(),
            };

            let mut lookup = self.endpoint(&["api", "v1", "models", "model"]);
            lookup.query_pairs_mut().append_pair("id", &id);
            if self.exists(lookup, "model lookup").await? {
                debug!(sink = %self.name, model = %id, "updating model");
                let mut url = self.endpoint(&["api", "v1", "models", "model", "update"]);
                url.query_pairs_mut().append_pair("id", &id);
                self.post_json(url, &form, "model update").await?;
            } else {
                debug!(sink = %self.name, model = %id, "creating model");
                let url = self.endpoint(&["api", "v1", "models", "create"]);
                self.post_json(url, &form, "model create").await?;
            }
            written.push(id);
        }

        Ok(WriteOutcome::written(written.join(",")))
    }
}

#[async_trait]
impl PromptSink for OpenWebUiSink {
    fn name(&self) -> &str {
        &self.name
    }

    /// Neither prompts nor models carry record metadata; only the body and,
    /// for models, the tags reach Open-WebUI.
    fn capabilities(&self) -> Capabilities {
        Capabilities::unscoped(false)
    }

    fn max_concurrent_writes(&self) -> usize {
        self.max_writes
    }

    async fn write(&self, record: &PromptRecord, _scope: &ScopeRoot) -> Result<WriteOutcome, SyncError> {
        match Category::of(record.name()) {
            Some(Category::User(rest)) => self.write_user_prompt(record, rest).await,
            Some(Category::System(rest)) => self.write_system_prompt(record, rest).await,
            None => Ok(WriteOutcome::skipped(
                "name has neither a 'user/' nor a 'system/' prefix",
            )),
        }
    }
}
