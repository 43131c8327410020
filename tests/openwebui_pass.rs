//! Two passes against a mock Open-WebUI: the first creates, the second updates.

use async_trait::async_trait;
use prompt_pidgeon::config::{Config, SinkConfig, SourceConfig};
use prompt_pidgeon::sync::Registry;
use prompt_pidgeon::{
    AdapterFactory, FetchedBatch, PassStatus, PlanOptions, PromptRecord, PromptSink, PromptSource,
    RecordDraft, ScopeContext, SyncError, SyncOrchestrator, TagFilter, build_plan,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct OneRecord(PromptRecord);

#[async_trait]
impl PromptSource for OneRecord {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch(&self, _filter: &TagFilter) -> Result<FetchedBatch, SyncError> {
        Ok(FetchedBatch {
            records: vec![self.0.clone()],
            rejected: Vec::new(),
        })
    }
}

struct Factory {
    record: PromptRecord,
    sinks: Registry,
}

impl AdapterFactory for Factory {
    fn source(&self, _config: &SourceConfig) -> Result<Arc<dyn PromptSource>, SyncError> {
        Ok(Arc::new(OneRecord(self.record.clone())))
    }

    fn sink(&self, config: &SinkConfig) -> Result<Arc<dyn PromptSink>, SyncError> {
        self.sinks.sink(config)
    }
}

#[tokio::test]
async fn repeated_pass_updates_instead_of_duplicating() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/prompts/command/lf-review-code"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/prompts/command/lf-review-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "command": "/lf-review-code"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/prompts/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/prompts/command/lf-review-code/update"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config::from_toml_str(&format!(
        r#"
[[sources]]
name = "memory"
type = "langfuse"

[[sinks]]
name = "openwebui"
type = "open-webui"
url = "{}"

[[sync]]
name = "user prompts"
source = "memory"
sink = "openwebui"
"#,
        server.uri()
    ))
    .unwrap();

    let record = PromptRecord::from_draft(
        RecordDraft {
            identifier: "user/review-code".to_string(),
            name: "user/review-code".to_string(),
            body: "Review the diff.".to_string(),
            version: 4,
            ..Default::default()
        },
        "memory",
    )
    .unwrap();
    let env = HashMap::from([("OPEN_WEBUI_API_KEY".to_string(), "key".to_string())]);
    let factory = Factory {
        record,
        sinks: Registry::new(Arc::new(env), Duration::from_secs(5)),
    };
    let ctx = ScopeContext::new(None, std::env::temp_dir());

    for _ in 0..2 {
        let plan = build_plan(&config, &factory, &ctx, &PlanOptions::default()).unwrap();
        let report = SyncOrchestrator::from_settings(&config.settings).run(plan).await;
        assert_eq!(report.status, PassStatus::Success);
        assert_eq!(report.totals.written, 1);
    }
}
