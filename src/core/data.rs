//! Core data structures for prompt synchronization
//!
//! A [`PromptRecord`] is the canonical in-memory form of a prompt. Records are
//! only created through validation and never change once fetched; sinks derive
//! their own representations from them.

use crate::utils::error::SyncError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A scalar metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl std::fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataValue::Bool(v) => write!(f, "{}", v),
            MetadataValue::Integer(v) => write!(f, "{}", v),
            MetadataValue::Float(v) => write!(f, "{}", v),
            MetadataValue::Text(v) => f.write_str(v),
        }
    }
}

/// Insertion-ordered metadata carried end to end.
pub type Metadata = IndexMap<String, MetadataValue>;

/// Unvalidated record fields as produced by a source adapter.
#[derive(Debug, Clone, Default)]
pub struct RecordDraft {
    pub identifier: String,
    pub name: String,
    pub body: String,
    pub version: u64,
    pub tags: Vec<String>,
    pub metadata: Metadata,
}

/// A single prompt and its metadata, validated and immutable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptRecord {
    identifier: String,
    name: String,
    body: String,
    version: u64,
    tags: BTreeSet<String>,
    metadata: Metadata,
}

impl PromptRecord {
    /// Validate a draft coming from `source`.
    ///
    /// The identifier and body must be non-empty and no tag may be blank.
    /// Duplicate tags collapse; an empty name falls back to the identifier.
    pub fn from_draft(draft: RecordDraft, source: &str) -> Result<Self, SyncError> {
        let subject = || format!("record '{}' from source '{}'", draft.identifier, source);

        if draft.identifier.trim().is_empty() {
            return Err(SyncError::validation(
                format!("record from source '{}'", source),
                "identifier is empty",
            ));
        }
        if draft.body.trim().is_empty() {
            return Err(SyncError::validation(subject(), "body is empty"));
        }
        if draft.tags.iter().any(|t| t.trim().is_empty()) {
            return Err(SyncError::validation(subject(), "tags contain an empty string"));
        }

        let name = if draft.name.trim().is_empty() {
            draft.identifier.clone()
        } else {
            draft.name
        };

        Ok(Self {
            identifier: draft.identifier,
            name,
            body: draft.body,
            version: draft.version,
            tags: draft.tags.into_iter().collect(),
            metadata: draft.metadata,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// A record that failed validation and was dropped from its batch.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    pub identifier: String,
    pub error: SyncError,
}

/// Validate drafts, keeping the good ones and collecting the rejects.
pub fn validate_drafts(
    drafts: Vec<RecordDraft>,
    source: &str,
) -> (Vec<PromptRecord>, Vec<RejectedRecord>) {
    let mut records = Vec::with_capacity(drafts.len());
    let mut rejected = Vec::new();

    for draft in drafts {
        let identifier = draft.identifier.clone();
        match PromptRecord::from_draft(draft, source) {
            Ok(record) => records.push(record),
            Err(error) => rejected.push(RejectedRecord { identifier, error }),
        }
    }

    (records, rejected)
}

/// Keep only the latest version of each identifier.
///
/// When the highest version of an identifier appears more than once there is
/// no way to prefer one copy, so every copy at that version is rejected. The
/// result is ordered by identifier.
pub fn resolve_latest(
    records: Vec<PromptRecord>,
    source: &str,
) -> (Vec<PromptRecord>, Vec<RejectedRecord>) {
    let mut by_id: BTreeMap<String, Vec<PromptRecord>> = BTreeMap::new();
    for record in records {
        by_id.entry(record.identifier.clone()).or_default().push(record);
    }

    let mut latest = Vec::with_capacity(by_id.len());
    let mut rejected = Vec::new();

    for (identifier, mut versions) in by_id {
        versions.sort_by_key(|r| std::cmp::Reverse(r.version));
        let top = versions[0].version;
        let tied = versions.iter().take_while(|r| r.version == top).count();

        if tied > 1 {
            let error = SyncError::validation(
                format!("record '{}' from source '{}'", identifier, source),
                format!("{} copies share the latest version {}", tied, top),
            );
            rejected.extend((0..tied).map(|_| RejectedRecord {
                identifier: identifier.clone(),
                error: error.clone(),
            }));
        } else {
            latest.push(versions.swap_remove(0));
        }
    }

    (latest, rejected)
}
