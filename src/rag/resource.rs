//! Resource name resolution and import source normalization

use crate::rag::types::Corpus;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

fn corpus_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^projects/[^/]+/locations/[^/]+/ragCorpora/[^/]+$")
            .expect("corpus name pattern is valid")
    })
}

fn docs_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^https://docs\.google\.com/(?:document|spreadsheets|presentation)/d/([a-zA-Z0-9_-]+)(?:/|$)")
            .expect("docs pattern is valid")
    })
}

fn drive_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^https://drive\.google\.com/(?:file/d/|open\?id=)([a-zA-Z0-9_-]+)(?:/|$)")
            .expect("drive pattern is valid")
    })
}

/// Whether `name` is already a full corpus resource name
pub fn is_corpus_resource_name(name: &str) -> bool {
    corpus_name_pattern().is_match(name)
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`
pub fn sanitize_display_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Resolve a user-supplied corpus name to a full resource name
///
/// Full names pass through. A display name of a known corpus resolves to that
/// corpus. Anything else becomes `<parent>/ragCorpora/<sanitized last segment>`.
pub fn corpus_resource_name(name: &str, corpora: &[Corpus], parent: &str) -> String {
    let name = name.trim();
    if is_corpus_resource_name(name) {
        return name.to_string();
    }

    if let Some(corpus) = corpora.iter().find(|c| c.display_name == name) {
        return corpus.name.clone();
    }

    let id = name.rsplit('/').next().unwrap_or(name);
    format!("{}/ragCorpora/{}", parent, sanitize_display_name(id))
}

/// Last segment of a resource name
pub fn file_id(resource_name: &str) -> &str {
    resource_name.rsplit('/').next().unwrap_or(resource_name)
}

/// Resource name of a file inside a corpus
pub fn file_resource_name(corpus: &str, file_id: &str) -> String {
    format!("{}/ragFiles/{}", corpus.trim_end_matches('/'), file_id)
}

/// `projects/*/locations/*` prefix of any resource name below a location
pub fn parent_of(resource_name: &str) -> Option<String> {
    let segments: Vec<&str> = resource_name.split('/').collect();
    match segments.as_slice() {
        ["projects", project, "locations", location, ..]
            if !project.is_empty() && !location.is_empty() =>
        {
            Some(format!("projects/{}/locations/{}", project, location))
        }
        _ => None,
    }
}

/// A validated import location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Source {
    /// `gs://bucket/object` path
    Gcs { uri: String },
    /// Drive file, kept in canonical `file/d/<id>/view` form
    Drive { id: String, url: String },
}

impl Source {
    pub fn uri(&self) -> &str {
        match self {
            Source::Gcs { uri } => uri,
            Source::Drive { url, .. } => url,
        }
    }

    fn drive(id: &str) -> Self {
        Source::Drive {
            id: id.to_string(),
            url: format!("https://drive.google.com/file/d/{}/view", id),
        }
    }
}

/// Validate an import path, converting Docs/Drive share links to Drive file URLs
///
/// Returns `None` when the path is neither a Drive URL nor a `gs://` path.
pub fn normalize_source(path: &str) -> Option<Source> {
    let path = path.trim();
    if let Some(caps) = docs_pattern().captures(path) {
        return Some(Source::drive(&caps[1]));
    }
    if let Some(caps) = drive_pattern().captures(path) {
        return Some(Source::drive(&caps[1]));
    }
    if path.starts_with("gs://") && path.len() > "gs://".len() {
        return Some(Source::Gcs {
            uri: path.to_string(),
        });
    }
    None
}

/// Split `gs://bucket/object` into bucket and object
pub fn parse_gcs_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix("gs://")?;
    let (bucket, object) = rest.split_once('/')?;
    if bucket.is_empty() || object.is_empty() {
        return None;
    }
    Some((bucket, object))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARENT: &str = "projects/demo/locations/us-central1";

    fn corpora() -> Vec<Corpus> {
        vec![Corpus {
            name: format!("{}/ragCorpora/777", PARENT),
            display_name: "team_docs".to_string(),
            ..Default::default()
        }]
    }

    #[test]
    fn test_full_name_passes_through() {
        let name = "projects/x/locations/y/ragCorpora/42";
        assert_eq!(corpus_resource_name(name, &corpora(), PARENT), name);
    }

    #[test]
    fn test_display_name_resolves_to_known_corpus() {
        assert_eq!(
            corpus_resource_name("team_docs", &corpora(), PARENT),
            format!("{}/ragCorpora/777", PARENT)
        );
    }

    #[test]
    fn test_unknown_name_is_sanitized() {
        assert_eq!(
            corpus_resource_name("my corpus!", &[], PARENT),
            format!("{}/ragCorpora/my_corpus_", PARENT)
        );
        assert_eq!(
            corpus_resource_name("ragCorpora/abc", &[], PARENT),
            format!("{}/ragCorpora/abc", PARENT)
        );
    }

    #[test]
    fn test_file_names() {
        assert_eq!(file_id("a/b/ragFiles/123"), "123");
        assert_eq!(file_id("plain"), "plain");
        assert_eq!(file_resource_name("c/", "9"), "c/ragFiles/9");
    }

    #[test]
    fn test_parent_of() {
        assert_eq!(
            parent_of("projects/p/locations/l/ragCorpora/1").as_deref(),
            Some("projects/p/locations/l")
        );
        assert!(parent_of("ragCorpora/1").is_none());
    }

    #[test]
    fn test_normalize_docs_url() {
        let source =
            normalize_source("https://docs.google.com/document/d/1AbC_d-E/edit?usp=sharing").unwrap();
        assert_eq!(
            source,
            Source::Drive {
                id: "1AbC_d-E".to_string(),
                url: "https://drive.google.com/file/d/1AbC_d-E/view".to_string(),
            }
        );
    }

    #[test]
    fn test_normalize_drive_urls() {
        let open = normalize_source("https://drive.google.com/open?id=xyz").unwrap();
        assert_eq!(open.uri(), "https://drive.google.com/file/d/xyz/view");

        let file = normalize_source("https://drive.google.com/file/d/xyz/view").unwrap();
        assert_eq!(file.uri(), "https://drive.google.com/file/d/xyz/view");
    }

    #[test]
    fn test_normalize_gcs_and_invalid() {
        assert_eq!(
            normalize_source(" gs://bucket/logs/app.log "),
            Some(Source::Gcs {
                uri: "gs://bucket/logs/app.log".to_string()
            })
        );
        assert!(normalize_source("gs://").is_none());
        assert!(normalize_source("https://example.com/file.pdf").is_none());
        assert!(normalize_source("").is_none());
    }

    #[test]
    fn test_parse_gcs_uri() {
        assert_eq!(
            parse_gcs_uri("gs://bucket/dir/app.log"),
            Some(("bucket", "dir/app.log"))
        );
        assert!(parse_gcs_uri("gs://bucket").is_none());
        assert!(parse_gcs_uri("s3://bucket/x").is_none());
    }
}
