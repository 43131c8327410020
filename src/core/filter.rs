//! Tag-based record selection

use crate::core::data::PromptRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Predicate over a record's tag set.
///
/// A record passes when it carries every tag in `tags` and none in `exclude`.
/// An empty filter passes everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilter {
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub exclude: BTreeSet<String>,
}

impl TagFilter {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            exclude: BTreeSet::new(),
        }
    }

    pub fn excluding<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.exclude.is_empty()
    }

    pub fn matches(&self, tags: &BTreeSet<String>) -> bool {
        self.tags.is_subset(tags) && self.exclude.is_disjoint(tags)
    }

    pub fn matches_record(&self, record: &PromptRecord) -> bool {
        self.matches(record.tags())
    }

    /// Keep the records this filter selects, preserving their order.
    pub fn apply(&self, records: Vec<PromptRecord>) -> Vec<PromptRecord> {
        records.into_iter().filter(|r| self.matches_record(r)).collect()
    }

    /// A single required tag a source may push down to narrow its fetch.
    ///
    /// Whatever the source returns is still run through [`TagFilter::apply`].
    pub fn pushdown_tag(&self) -> Option<&str> {
        self.tags.iter().next().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn set(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_empty_filter_passes_everything() {
        let filter = TagFilter::default();
        assert!(filter.matches(&set(&[])));
        assert!(filter.matches(&set(&["anything"])));
    }

    #[test]
    fn test_requires_all_tags() {
        let filter = TagFilter::new(["technical", "ide"]);
        assert!(filter.matches(&set(&["technical", "ide", "extra"])));
        assert!(!filter.matches(&set(&["technical"])));
        assert!(!filter.matches(&set(&["general"])));
    }

    #[test]
    fn test_exclude_tags() {
        let filter = TagFilter::new(["technical"]).excluding(["draft"]);
        assert!(filter.matches(&set(&["technical"])));
        assert!(!filter.matches(&set(&["technical", "draft"])));
    }

    #[test]
    fn test_pushdown_tag() {
        assert_eq!(TagFilter::default().pushdown_tag(), None);
        assert_eq!(TagFilter::new(["b", "a"]).pushdown_tag(), Some("a"));
    }

    #[test]
    fn test_deserialize_from_toml() {
        let filter: TagFilter = toml::from_str(r#"tags = ["technical", "ide"]"#).unwrap();
        assert_eq!(filter, TagFilter::new(["ide", "technical"]));
    }

    proptest! {
        #[test]
        fn prop_matches_iff_subset(
            record in proptest::collection::vec("[a-d]", 0..5),
            wanted in proptest::collection::vec("[a-d]", 0..3),
        ) {
            let record_tags: BTreeSet<String> = record.iter().cloned().collect();
            let filter = TagFilter::new(wanted.clone());
            let expected = wanted.iter().all(|t| record_tags.contains(t));
            prop_assert_eq!(filter.matches(&record_tags), expected);
        }

        #[test]
        fn prop_order_independent(
            record in proptest::collection::vec("[a-d]", 0..5),
            wanted in proptest::collection::vec("[a-d]", 0..3),
        ) {
            let mut reversed_record = record.clone();
            reversed_record.reverse();
            let mut reversed_wanted = wanted.clone();
            reversed_wanted.reverse();

            let a = TagFilter::new(wanted).matches(&record.into_iter().collect());
            let b = TagFilter::new(reversed_wanted).matches(&reversed_record.into_iter().collect());
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_apply_is_idempotent(
            records in proptest::collection::vec(proptest::collection::vec("[a-d]", 0..4), 0..6),
            wanted in proptest::collection::vec("[a-d]", 0..3),
            excluded in proptest::collection::vec("[e-f]", 0..2),
        ) {
            let records: Vec<PromptRecord> = records
                .into_iter()
                .enumerate()
                .map(|(i, tags)| {
                    PromptRecord::from_draft(
                        crate::core::data::RecordDraft {
                            identifier: format!("p{}", i),
                            body: "body".to_string(),
                            tags,
                            ..Default::default()
                        },
                        "prop",
                    )
                    .unwrap()
                })
                .collect();
            let filter = TagFilter::new(wanted).excluding(excluded);

            let once = filter.apply(records);
            let twice = filter.apply(once.clone());
            prop_assert_eq!(once, twice);
        }
    }
}
