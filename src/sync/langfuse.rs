//! Langfuse prompt-management source
//!
//! Lists prompts page by page, then fetches the latest version of each one.
//! Record identifiers are prompt names, which stay stable across versions.

use super::{EnvLookup, http_client, lookup_var};
use crate::config::SourceConfig;
use crate::core::data::{Metadata, MetadataValue, RecordDraft, RejectedRecord, validate_drafts};
use crate::core::filter::TagFilter;
use crate::core::traits::{FetchedBatch, PromptSource};
use crate::utils::error::SyncError;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_HOST: &str = "https://cloud.langfuse.com";
const DEFAULT_BATCH_SIZE: u32 = 50;
const PROMPTS_PATH: [&str; 4] = ["api", "public", "v2", "prompts"];

const PUBLIC_KEY_VARS: [&str; 2] = ["PROMPT_PIDGEON_LANGFUSE_PUBLIC_KEY", "LANGFUSE_PUBLIC_KEY"];
const SECRET_KEY_VARS: [&str; 2] = ["PROMPT_PIDGEON_LANGFUSE_SECRET_KEY", "LANGFUSE_SECRET_KEY"];
const HOST_VARS: [&str; 2] = ["PROMPT_PIDGEON_LANGFUSE_HOST", "LANGFUSE_HOST"];

#[derive(Debug, Deserialize)]
struct PromptPage {
    data: Vec<PromptSummary>,
    meta: PageMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageMeta {
    page: u32,
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct PromptSummary {
    name: String,
    #[serde(default)]
    versions: Vec<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptDetail {
    #[serde(default)]
    id: Option<String>,
    name: String,
    version: u64,
    #[serde(rename = "type", default)]
    prompt_type: Option<String>,
    prompt: serde_json::Value,
    #[serde(default)]
    config: serde_json::Value,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

pub struct LangfuseSource {
    name: String,
    client: Client,
    host: Url,
    public_key: String,
    secret_key: String,
    batch_size: u32,
    label: Option<String>,
    include_labels_as_tags: bool,
}

impl LangfuseSource {
    pub fn from_config(
        config: &SourceConfig,
        env: &dyn EnvLookup,
        timeout: Duration,
    ) -> Result<Self, SyncError> {
        let subject = || format!("source '{}'", config.name);

        let public_key = lookup_var(env, config.public_key_env.as_deref(), &PUBLIC_KEY_VARS)
            .ok_or_else(|| SyncError::validation(subject(), "Langfuse public key is not set"))?;
        let secret_key = lookup_var(env, config.secret_key_env.as_deref(), &SECRET_KEY_VARS)
            .ok_or_else(|| SyncError::validation(subject(), "Langfuse secret key is not set"))?;

        let host = config
            .host
            .clone()
            .or_else(|| lookup_var(env, config.host_env.as_deref(), &HOST_VARS))
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let host = Url::parse(&host)
            .map_err(|e| SyncError::validation(subject(), format!("invalid host '{}': {}", host, e)))?;

        let batch_size = config.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(SyncError::validation(subject(), "batch_size must be at least 1"));
        }

        let client = http_client(timeout)
            .map_err(|e| SyncError::validation(subject(), format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            name: config.name.clone(),
            client,
            host,
            public_key,
            secret_key,
            batch_size,
            label: config.label.clone(),
            include_labels_as_tags: config.include_labels_as_tags,
        })
    }

    fn unavailable(&self, message: impl Into<String>) -> SyncError {
        SyncError::source_unavailable(&self.name, message)
    }

    fn prompts_url(&self, prompt_name: Option<&str>) -> Result<Url, SyncError> {
        let mut url = self.host.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| self.unavailable(format!("host '{}' cannot carry a path", self.host)))?;
            segments.pop_if_empty().extend(PROMPTS_PATH);
            if let Some(name) = prompt_name {
                segments.push(name);
            }
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, SyncError> {
        let response = self
            .client
            .get(url.clone())
            .basic_auth(&self.public_key, Some(&self.secret_key))
            .send()
            .await
            .map_err(|e| self.unavailable(format!("request to {} failed: {}", url.path(), e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.unavailable(format!("{} returned {} {}", url.path(), status, body.trim())));
        }

        response
            .json()
            .await
            .map_err(|e| self.unavailable(format!("unexpected response from {}: {}", url.path(), e)))
    }

    /// Names and latest versions of every prompt the listing returns.
    async fn list(&self, filter: &TagFilter) -> Result<Vec<(String, u64)>, SyncError> {
        // Labels can become tags locally, so a label-derived tag must not
        // narrow the remote listing.
        let pushdown = if self.include_labels_as_tags {
            None
        } else {
            filter.pushdown_tag()
        };

        let mut listed = Vec::new();
        let mut page = 1;
        loop {
            let mut url = self.prompts_url(None)?;
            {
                let mut query = url.query_pairs_mut();
                query
                    .append_pair("page", &page.to_string())
                    .append_pair("limit", &self.batch_size.to_string());
                if let Some(tag) = pushdown {
                    query.append_pair("tag", tag);
                }
                if let Some(label) = &self.label {
                    query.append_pair("label", label);
                }
            }

            let body: PromptPage = self.get_json(url).await?;
            debug!(source = %self.name, page, count = body.data.len(), "listed prompts");
            let empty = body.data.is_empty();
            listed.extend(body.data.into_iter().map(|p| {
                let latest = p.versions.iter().copied().max().unwrap_or(0);
                (p.name, latest)
            }));

            if empty || body.meta.page >= body.meta.total_pages {
                break;
            }
            page += 1;
        }
        Ok(listed)
    }

    async fn detail(&self, name: &str, version: u64) -> Result<PromptDetail, SyncError> {
        let mut url = self.prompts_url(Some(name))?;
        if let Some(label) = &self.label {
            url.query_pairs_mut().append_pair("label", label);
        } else if version > 0 {
            url.query_pairs_mut().append_pair("version", &version.to_string());
        }
        self.get_json(url).await
    }

    fn record_draft(&self, detail: PromptDetail) -> Result<RecordDraft, SyncError> {
        let body = match detail.prompt {
            serde_json::Value::String(text) => text,
            _ => {
                return Err(SyncError::validation(
                    format!("record '{}' from source '{}'", detail.name, self.name),
                    format!(
                        "prompt type '{}' is not a text prompt",
                        detail.prompt_type.as_deref().unwrap_or("unknown")
                    ),
                ));
            }
        };

        let mut metadata = Metadata::new();
        metadata.insert("source_platform".into(), "langfuse".into());
        if let Some(id) = detail.id {
            metadata.insert("langfuse_id".into(), id.into());
        }
        metadata.insert("langfuse_version".into(), version_value(detail.version));
        if let Some(kind) = detail.prompt_type {
            metadata.insert("langfuse_type".into(), kind.into());
        }
        if !detail.labels.is_empty() {
            metadata.insert("langfuse_labels".into(), detail.labels.join(",").into());
        }
        if !is_empty_config(&detail.config) {
            metadata.insert("langfuse_config".into(), detail.config.to_string().into());
        }
        if let Some(created) = detail.created_at {
            metadata.insert("created_at".into(), created.into());
        }
        if let Some(updated) = detail.updated_at {
            metadata.insert("updated_at".into(), updated.into());
        }

        let mut tags = detail.tags;
        if self.include_labels_as_tags {
            tags.extend(detail.labels);
        }

        Ok(RecordDraft {
            identifier: detail.name.clone(),
            name: detail.name,
            body,
            version: detail.version,
            tags,
            metadata,
        })
    }
}

fn version_value(version: u64) -> MetadataValue {
    i64::try_from(version)
        .map(MetadataValue::Integer)
        .unwrap_or_else(|_| MetadataValue::Text(version.to_string()))
}

fn is_empty_config(config: &serde_json::Value) -> bool {
    match config {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[async_trait]
impl PromptSource for LangfuseSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, filter: &TagFilter) -> Result<FetchedBatch, SyncError> {
        let listed = self.list(filter).await?;

        let mut drafts = Vec::with_capacity(listed.len());
        let mut rejected = Vec::new();
        for (name, version) in listed {
            let detail = self.detail(&name, version).await?;
            match self.record_draft(detail) {
                Ok(draft) => drafts.push(draft),
                Err(error) => rejected.push(RejectedRecord { identifier: name, error }),
            }
        }

        let (records, invalid) = validate_drafts(drafts, &self.name);
        rejected.extend(invalid);
        info!(source = %self.name, records = records.len(), rejected = rejected.len(), "fetched prompts");
        Ok(FetchedBatch { records, rejected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;
    use wiremock::matchers::{header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn env() -> HashMap<String, String> {
        HashMap::from([
            ("LANGFUSE_PUBLIC_KEY".to_string(), "pk-test".to_string()),
            ("LANGFUSE_SECRET_KEY".to_string(), "sk-test".to_string()),
        ])
    }

    fn config(host: &str) -> SourceConfig {
        SourceConfig {
            name: "langfuse".to_string(),
            kind: "langfuse".to_string(),
            enabled: true,
            host: Some(host.to_string()),
            host_env: None,
            public_key_env: None,
            secret_key_env: None,
            batch_size: Some(1),
            label: None,
            include_labels_as_tags: false,
        }
    }

    fn source(server: &MockServer) -> LangfuseSource {
        LangfuseSource::from_config(&config(&server.uri()), &env(), Duration::from_secs(5)).unwrap()
    }

    fn page(name: &str, versions: &[u64], page: u32, total: u32) -> serde_json::Value {
        json!({
            "data": [{ "name": name, "versions": versions, "labels": [], "tags": [] }],
            "meta": { "page": page, "limit": 1, "totalItems": total, "totalPages": total }
        })
    }

    #[test]
    fn test_missing_credentials_is_validation_error() {
        let err = LangfuseSource::from_config(
            &config(DEFAULT_HOST),
            &HashMap::<String, String>::new(),
            Duration::from_secs(5),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SyncError::Validation { .. }));
        assert!(err.to_string().contains("public key"));
    }

    #[tokio::test]
    async fn test_fetch_pages_and_latest_versions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/public/v2/prompts"))
            .and(query_param("page", "1"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page("p1", &[1, 3, 2], 1, 2)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/public/v2/prompts"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page("p2", &[1], 2, 2)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/public/v2/prompts/p1"))
            .and(query_param("version", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "abc",
                "name": "p1",
                "version": 3,
                "type": "text",
                "prompt": "Review this code.",
                "config": {"temperature": 0.2},
                "labels": ["production"],
                "tags": ["technical", "ide"],
                "createdAt": "2025-01-01T00:00:00Z",
                "updatedAt": "2025-01-02T00:00:00Z"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/public/v2/prompts/p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "p2",
                "version": 1,
                "type": "chat",
                "prompt": [{"role": "system", "content": "hi"}],
                "tags": ["general"]
            })))
            .mount(&server)
            .await;

        let batch = source(&server).fetch(&TagFilter::default()).await.unwrap();
        assert_eq!(batch.fetched(), 2);
        assert_eq!(batch.records.len(), 1);

        let record = &batch.records[0];
        assert_eq!(record.identifier(), "p1");
        assert_eq!(record.version(), 3);
        assert!(record.has_tag("ide"));
        assert!(!record.has_tag("production"));
        let keys: Vec<_> = record.metadata().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "source_platform",
                "langfuse_id",
                "langfuse_version",
                "langfuse_type",
                "langfuse_labels",
                "langfuse_config",
                "created_at",
                "updated_at"
            ]
        );

        assert_eq!(batch.rejected[0].identifier, "p2");
        assert!(batch.rejected[0].error.to_string().contains("chat"));
    }

    #[tokio::test]
    async fn test_tag_is_pushed_down() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/public/v2/prompts"))
            .and(query_param("tag", "technical"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [],
                "meta": { "page": 1, "limit": 1, "totalItems": 0, "totalPages": 0 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let batch = source(&server)
            .fetch(&TagFilter::new(["technical"]))
            .await
            .unwrap();
        assert_eq!(batch.fetched(), 0);
    }

    #[tokio::test]
    async fn test_auth_failure_is_source_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let err = source(&server).fetch(&TagFilter::default()).await.unwrap_err();
        assert!(matches!(err, SyncError::SourceUnavailable { .. }));
        assert!(err.to_string().contains("401"));
    }
}
