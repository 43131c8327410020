use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::LazyLock;

const FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const FENCE: &str = "---";

static NON_SLUG_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("static slug pattern"));

/// Lowercase a free-form name into a filesystem and URL safe slug.
///
/// Every run of characters outside `[a-z0-9]` collapses into a single `-`,
/// so `"user/Review Code_v2"` becomes `"user-review-code-v2"`.
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let slug = NON_SLUG_CHARS.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "prompt".to_string()
    } else {
        slug.to_string()
    }
}

/// Render `header` as a YAML front matter block followed by `body`.
///
/// The body is appended unchanged after one blank line.
pub fn render_front_matter<T: Serialize>(header: &T, body: &str) -> Result<String, serde_yaml::Error> {
    let yaml = serde_yaml::to_string(header)?;
    let mut out = String::with_capacity(yaml.len() + body.len() + 10);
    out.push_str(FENCE);
    out.push('\n');
    out.push_str(&yaml);
    if !yaml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(FENCE);
    out.push_str("\n\n");
    out.push_str(body);
    Ok(out)
}

/// Split a document into its front matter text and body.
///
/// Returns `None` when the document does not open with a `---` fence or the
/// block is never closed.
pub fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix("---\n")?;
    let (yaml, after) = if let Some(after) = rest.strip_prefix("---\n") {
        ("", after)
    } else {
        let end = rest.find("\n---\n")?;
        (&rest[..=end], &rest[end + 5..])
    };
    let body = after.strip_prefix('\n').unwrap_or(after);
    Some((yaml, body))
}

/// Parse the front matter of `text` into `T`, returning it with the body.
pub fn parse_front_matter<T: DeserializeOwned>(text: &str) -> Option<(T, &str)> {
    let (yaml, body) = split_front_matter(text)?;
    let header = serde_yaml::from_str(yaml).ok()?;
    Some((header, body))
}

pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format(FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Header {
        description: String,
        #[serde(rename = "alwaysApply")]
        always_apply: bool,
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Review Code"), "review-code");
        assert_eq!(slugify("user/review_code"), "user-review-code");
        assert_eq!(slugify("  --Design   Expert!! "), "design-expert");
        assert_eq!(slugify("Ünïcode"), "n-code");
        assert_eq!(slugify("///"), "prompt");
    }

    #[test]
    fn test_render_front_matter() {
        let header = Header {
            description: "Review code".to_string(),
            always_apply: false,
        };
        let rendered = render_front_matter(&header, "Body text\n").unwrap();
        assert_eq!(
            rendered,
            "---\ndescription: Review code\nalwaysApply: false\n---\n\nBody text\n"
        );
    }

    #[test]
    fn test_front_matter_round_trip_keeps_body() {
        let header = Header {
            description: "x: y".to_string(),
            always_apply: true,
        };
        let body = "---\nnot a fence inside the body\n\n";
        let rendered = render_front_matter(&header, body).unwrap();

        let (parsed, parsed_body): (Header, &str) = parse_front_matter(&rendered).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed_body, body);
    }

    #[test]
    fn test_split_front_matter_without_block() {
        assert!(split_front_matter("plain body").is_none());
        assert!(split_front_matter("---\nunterminated: true\n").is_none());
        assert_eq!(split_front_matter("---\n---\n\nbody"), Some(("", "body")));
    }
}
