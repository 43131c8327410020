use crate::core::filter::TagFilter;
use crate::core::scope::Scope;
use crate::utils::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "prompt-pidgeon.toml";
const LEGACY_CONFIG_FILES: [&str; 2] = ["prompt-pidgeon.yml", "prompt-pidgeon.yaml"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
    #[serde(default)]
    pub sync: Vec<SyncJobConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub host_env: Option<String>,
    #[serde(default)]
    pub public_key_env: Option<String>,
    #[serde(default)]
    pub secret_key_env: Option<String>,
    #[serde(default)]
    pub batch_size: Option<u32>,
    /// Restrict the fetch to versions carrying this label.
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub include_labels_as_tags: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub url_env: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub scope: Option<Scope>,
    #[serde(default)]
    pub project_path: Option<PathBuf>,
    #[serde(default = "enabled_by_default")]
    pub include_metadata: bool,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub create_subdirectories: bool,
    #[serde(default)]
    pub subdirectory_tag: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub overwrite_existing: bool,
    #[serde(default)]
    pub command_prefix: Option<String>,
    #[serde(default)]
    pub model_prefix: Option<String>,
    #[serde(default)]
    pub base_models: Vec<BaseModelConfig>,
    #[serde(default)]
    pub default_tags: Option<Vec<String>>,
    #[serde(default)]
    pub always_apply: bool,
    #[serde(default)]
    pub globs: Vec<String>,
    #[serde(default)]
    pub description_key: Option<String>,
    #[serde(default)]
    pub max_concurrent_writes: Option<usize>,
}

/// A chat model that system prompts are attached to in Open-WebUI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BaseModelConfig {
    pub id: String,
    pub short_name: String,
    #[serde(default = "enabled_by_default")]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJobConfig {
    pub name: String,
    pub source: String,
    pub sink: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub scope: Option<Scope>,
    #[serde(default)]
    pub filter: Option<TagFilter>,
}

fn default_version() -> String {
    "1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_concurrent_jobs() -> usize {
    5
}

fn default_timeout_seconds() -> u64 {
    300
}

fn enabled_by_default() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            settings: Settings::default(),
            sources: Vec::new(),
            sinks: Vec::new(),
            sync: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml") => {
                ConfigFormat::Yaml
            }
            _ => ConfigFormat::Toml,
        }
    }
}

impl Config {
    /// Load the configuration file from the working directory.
    pub fn load() -> AppResult<Self> {
        Self::load_custom(&Self::config_file_path())
    }

    pub fn load_custom(config_path: &Path) -> AppResult<Self> {
        if !config_path.exists() {
            return Err(AppError::Config(format!(
                "Configuration file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let config = Self::parse(&content, ConfigFormat::for_path(config_path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        Self::parse(content, ConfigFormat::Toml)
    }

    pub fn from_yaml_str(content: &str) -> AppResult<Self> {
        Self::parse(content, ConfigFormat::Yaml)
    }

    fn parse(content: &str, format: ConfigFormat) -> AppResult<Self> {
        match format {
            ConfigFormat::Toml => toml::from_str(content)
                .map_err(|e| AppError::Config(format!("Failed to parse config file: {}", e))),
            ConfigFormat::Yaml => serde_yaml::from_str(content)
                .map_err(|e| AppError::Config(format!("Failed to parse config file: {}", e))),
        }
    }

    /// Whole-file problems that make the configuration unusable.
    ///
    /// Problems local to one job (unknown adapter types, scope mismatches,
    /// missing credentials) are not listed here; they are reported per job
    /// when the sync plan is built.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.settings.max_concurrent_jobs == 0 {
            issues.push("settings.max_concurrent_jobs must be at least 1".to_string());
        }
        if self.settings.timeout_seconds == 0 {
            issues.push("settings.timeout_seconds must be at least 1".to_string());
        }

        check_names(&mut issues, "source", self.sources.iter().map(|s| s.name.as_str()));
        check_names(&mut issues, "sink", self.sinks.iter().map(|s| s.name.as_str()));
        check_names(&mut issues, "sync job", self.sync.iter().map(|j| j.name.as_str()));

        for sink in &self.sinks {
            if sink.max_concurrent_writes == Some(0) {
                issues.push(format!(
                    "sink '{}': max_concurrent_writes must be at least 1",
                    sink.name
                ));
            }
        }

        issues
    }

    pub fn validate(&self) -> AppResult<()> {
        let issues = self.issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(AppError::Config(issues.join("; ")))
        }
    }

    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }

    pub fn sink(&self, name: &str) -> Option<&SinkConfig> {
        self.sinks.iter().find(|s| s.name == name)
    }

    pub fn enabled_jobs(&self) -> impl Iterator<Item = &SyncJobConfig> {
        self.sync.iter().filter(|j| j.enabled)
    }

    /// `prompt-pidgeon.toml` in the working directory, falling back to an
    /// existing `prompt-pidgeon.yml`.
    pub fn config_file_path() -> PathBuf {
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        if default.exists() {
            return default;
        }
        LEGACY_CONFIG_FILES
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .unwrap_or(default)
    }
}

fn check_names<'a>(issues: &mut Vec<String>, what: &str, names: impl Iterator<Item = &'a str>) {
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            issues.push(format!("a {} has an empty name", what));
        } else if !seen.insert(name) {
            issues.push(format!("duplicate {} name '{}'", what, name));
        }
    }
}
