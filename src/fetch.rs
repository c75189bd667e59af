//! Source fetching from the remote extraction provider and local files.
//!
//! The fetcher performs exactly one attempt per call and writes no state:
//! remote failures surface immediately as [`PipelineError::FetchError`] (or
//! [`PipelineError::CredentialMissing`] before any request goes out) and the
//! bulk loader decides whether to fall back to a local path.

use chrono::Utc;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use walkdir::WalkDir;

use crate::config::ProviderConfig;
use crate::error::PipelineError;
use crate::models::{FrameworkSpec, RawBody, RawDocument, SourceType};
use crate::normalize::{self, content_type_for_path};

/// File patterns collected when a local source is a directory.
const DIR_INCLUDE_GLOBS: &[&str] = &[
    "**/*.md",
    "**/*.markdown",
    "**/*.txt",
    "**/*.html",
    "**/*.htm",
];

/// Remote provider response: a list of extracted document sections.
#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    documents: Vec<ExtractedDocument>,
}

#[derive(Debug, Deserialize)]
struct ExtractedDocument {
    #[serde(default)]
    content: String,
}

/// Client for both documentation providers.
pub struct Fetcher {
    provider: ProviderConfig,
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            provider,
            client: reqwest::Client::new(),
        }
    }

    /// Fetch a framework's documentation from the remote extraction service.
    ///
    /// Requires the provider credential in the environment and a canonical
    /// URL on the spec. Single attempt, fail fast.
    pub async fn fetch(&self, spec: &FrameworkSpec) -> Result<RawDocument, PipelineError> {
        let url = spec.url.as_deref().ok_or_else(|| {
            PipelineError::FetchError {
                framework: spec.name.clone(),
                status: None,
                detail: "no canonical URL configured".to_string(),
            }
        })?;

        let api_key = std::env::var(&self.provider.api_key_env)
            .map_err(|_| PipelineError::CredentialMissing(self.provider.api_key_env.clone()))?;

        let payload = serde_json::json!({
            "url": url,
            "framework": spec.name,
            "extract_code": true,
            "extract_examples": true,
        });

        let response = self
            .client
            .post(format!("{}/v1/extract", self.provider.endpoint.trim_end_matches('/')))
            .bearer_auth(api_key)
            .timeout(Duration::from_secs(self.provider.timeout_secs))
            .json(&payload)
            .send()
            .await
            .map_err(|e| PipelineError::FetchError {
                framework: spec.name.clone(),
                status: e.status().map(|s| s.as_u16()),
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PipelineError::FetchError {
                framework: spec.name.clone(),
                status: Some(status.as_u16()),
                detail,
            });
        }

        let extract: ExtractResponse =
            response
                .json()
                .await
                .map_err(|e| PipelineError::FetchError {
                    framework: spec.name.clone(),
                    status: Some(status.as_u16()),
                    detail: format!("malformed provider response: {}", e),
                })?;

        let body = extract
            .documents
            .iter()
            .map(|d| d.content.trim())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(RawDocument {
            framework: spec.name.clone(),
            source_type: SourceType::Remote,
            content_type: normalize::MIME_MARKDOWN.to_string(),
            body: RawBody::Text(body),
            fetched_at: Utc::now(),
        })
    }

    /// Fetch documentation from a local file or directory.
    ///
    /// A file is read whole (PDFs as bytes, everything else as text); a
    /// directory is walked for documentation files in sorted path order.
    /// Missing or empty sources fail with [`PipelineError::SourceNotFound`].
    pub fn fetch_local(
        &self,
        path: &Path,
        framework: &str,
    ) -> Result<RawDocument, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::SourceNotFound(path.display().to_string()));
        }

        let (content_type, body) = if path.is_dir() {
            (
                normalize::MIME_MARKDOWN.to_string(),
                RawBody::Text(read_directory(path)?),
            )
        } else {
            let content_type = content_type_for_path(path);
            let body = if content_type == normalize::MIME_PDF {
                RawBody::Bytes(std::fs::read(path).map_err(|e| {
                    PipelineError::SourceNotFound(format!("{}: {}", path.display(), e))
                })?)
            } else {
                RawBody::Text(std::fs::read_to_string(path).map_err(|e| {
                    PipelineError::SourceNotFound(format!("{}: {}", path.display(), e))
                })?)
            };
            (content_type.to_string(), body)
        };

        if body.is_empty() {
            return Err(PipelineError::SourceNotFound(format!(
                "{} contains no documentation content",
                path.display()
            )));
        }

        Ok(RawDocument {
            framework: framework.to_string(),
            source_type: SourceType::Local,
            content_type,
            body,
            fetched_at: Utc::now(),
        })
    }
}

/// Concatenate a directory's documentation files in sorted path order, so
/// repeated fetches of an unchanged tree produce identical raw bodies.
///
/// The joined body is typed markdown, so HTML files are reduced to plain
/// text here rather than letting raw tags pass through.
fn read_directory(root: &Path) -> Result<String, PipelineError> {
    let include_set = doc_globset()?;

    let mut paths: Vec<_> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            let relative = path.strip_prefix(root).unwrap_or(path);
            include_set.is_match(relative)
        })
        .collect();
    paths.sort();

    let mut parts = Vec::new();
    for path in paths {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| PipelineError::SourceNotFound(format!("{}: {}", path.display(), e)))?;
        let content = if content_type_for_path(&path) == normalize::MIME_HTML {
            normalize::html_to_text(&content)?
        } else {
            content
        };
        let trimmed = content.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed.to_string());
        }
    }

    Ok(parts.join("\n\n"))
}

fn doc_globset() -> Result<GlobSet, PipelineError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in DIR_INCLUDE_GLOBS {
        builder.add(Glob::new(pattern).map_err(|e| PipelineError::SourceNotFound(e.to_string()))?);
    }
    builder
        .build()
        .map_err(|e| PipelineError::SourceNotFound(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;

    fn fetcher() -> Fetcher {
        Fetcher::new(ProviderConfig::default())
    }

    #[test]
    fn missing_local_path_is_source_not_found() {
        let err = fetcher()
            .fetch_local(Path::new("/nonexistent/docs"), "Redis")
            .unwrap_err();
        assert!(matches!(err, PipelineError::SourceNotFound(_)));
    }

    #[test]
    fn empty_local_file_is_source_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("empty.md");
        std::fs::write(&file, "").unwrap();
        let err = fetcher().fetch_local(&file, "Redis").unwrap_err();
        assert!(matches!(err, PipelineError::SourceNotFound(_)));
    }

    #[test]
    fn local_file_fetch_tags_source_and_type() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("redis.md");
        std::fs::write(&file, "# Redis\n\nIn-memory data store.").unwrap();

        let doc = fetcher().fetch_local(&file, "Redis").unwrap();
        assert_eq!(doc.framework, "Redis");
        assert_eq!(doc.source_type, SourceType::Local);
        assert_eq!(doc.content_type, normalize::MIME_MARKDOWN);
        match &doc.body {
            RawBody::Text(t) => assert!(t.contains("In-memory data store.")),
            RawBody::Bytes(_) => panic!("markdown should be read as text"),
        }
    }

    #[test]
    fn directory_fetch_concatenates_in_sorted_order() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("b.md"), "second file").unwrap();
        std::fs::write(tmp.path().join("a.md"), "first file").unwrap();
        std::fs::write(tmp.path().join("ignored.bin"), "binary").unwrap();

        let doc = fetcher().fetch_local(tmp.path(), "Docs").unwrap();
        match &doc.body {
            RawBody::Text(t) => {
                let first = t.find("first file").unwrap();
                let second = t.find("second file").unwrap();
                assert!(first < second, "files must concatenate in sorted order");
                assert!(!t.contains("binary"));
            }
            RawBody::Bytes(_) => panic!("directory body should be text"),
        }
    }

    #[test]
    fn directory_fetch_strips_html_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("guide.html"),
            "<html><body><h1>Routing</h1><p>Routes map URLs to handlers.</p></body></html>",
        )
        .unwrap();
        std::fs::write(tmp.path().join("notes.md"), "plain markdown notes").unwrap();

        let doc = fetcher().fetch_local(tmp.path(), "Express.js").unwrap();
        match &doc.body {
            RawBody::Text(t) => {
                assert!(t.contains("Routes map URLs to handlers."));
                assert!(t.contains("plain markdown notes"));
                assert!(!t.contains("<p>"), "raw tags must not pass through: {:?}", t);
            }
            RawBody::Bytes(_) => panic!("directory body should be text"),
        }
    }

    #[tokio::test]
    async fn remote_fetch_without_credential_is_credential_missing() {
        let provider = ProviderConfig {
            api_key_env: "DOCBRIDGE_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..ProviderConfig::default()
        };
        let fetcher = Fetcher::new(provider);
        let spec = FrameworkSpec {
            name: "Redis".to_string(),
            url: Some("https://redis.io/docs/".to_string()),
            path: None,
            priority: 1,
            description: String::new(),
        };
        let err = fetcher.fetch(&spec).await.unwrap_err();
        assert!(matches!(err, PipelineError::CredentialMissing(_)));
    }
}
