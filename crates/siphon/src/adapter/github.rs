//! GitHub REST adapter for repository activity.
//!
//! A repository source follows one stream, chosen by the `stream` config key:
//! releases (default), issues (pull requests included) or commits. Pages are
//! chained through the `Link` header, so the page token is the full URL of the
//! next page.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use url::Url;

use crate::entity::platform::Platform;
use crate::entity::source::Model as SourceModel;
use crate::entity::source_type::SourceType;
use crate::http::{HttpHeaders, HttpRequest, header_get};
use crate::model::{CanonicalItem, FieldProjection, RawPayload};

use super::SourceAdapter;
use super::client::HttpFetcher;
use super::errors::{FetchError, NormalizationError, ResolveError};
use super::text::{first_line, non_empty};
use super::types::{Page, PageRequest, ResolvedSource};

const API_BASE: &str = "https://api.github.com";
const MAX_PAGE_SIZE: usize = 100;
const COMMIT_TITLE_CHARS: usize = 100;
/// Payload key carrying the item kind assigned at fetch time.
const KIND_KEY: &str = "item_type";

/// Which listing of a repository a source follows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GitHubStream {
    #[default]
    Releases,
    Issues,
    Commits,
}

impl GitHubStream {
    fn endpoint(self) -> &'static str {
        match self {
            Self::Releases => "releases",
            Self::Issues => "issues",
            Self::Commits => "commits",
        }
    }
}

impl fmt::Display for GitHubStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint())
    }
}

impl FromStr for GitHubStream {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "releases" | "release" => Ok(Self::Releases),
            "issues" | "issue" | "pulls" | "pull" => Ok(Self::Issues),
            "commits" | "commit" => Ok(Self::Commits),
            other => Err(format!("unknown GitHub stream: {other}")),
        }
    }
}

pub struct GitHubAdapter {
    http: HttpFetcher,
    token: Option<String>,
}

impl GitHubAdapter {
    pub fn new(http: HttpFetcher, token: Option<String>) -> Self {
        Self {
            http,
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    fn request(&self, url: impl Into<String>) -> HttpRequest {
        let request = HttpRequest::get(url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }

    /// URL of the first page of `stream` for `owner/repo`.
    fn first_page_url(repo: &str, stream: GitHubStream, page_size: usize) -> String {
        let per_page = page_size.clamp(1, MAX_PAGE_SIZE);
        let endpoint = stream.endpoint();
        match stream {
            GitHubStream::Issues => format!(
                "{API_BASE}/repos/{repo}/{endpoint}?state=all&sort=created&direction=desc&per_page={per_page}"
            ),
            _ => format!("{API_BASE}/repos/{repo}/{endpoint}?per_page={per_page}"),
        }
    }
}

/// Stream configured on a source.
fn stream_for(source: &SourceModel) -> Result<GitHubStream, FetchError> {
    source
        .config_str("stream")
        .map(str::parse)
        .transpose()
        .map(Option::unwrap_or_default)
        .map_err(FetchError::configuration)
}

/// URL of the `rel="next"` entry of a `Link` header.
///
/// GitHub Link headers look like:
/// `<https://api.github.com/repos/o/r/releases?per_page=50&page=2>; rel="next", <...&page=4>; rel="last"`
pub fn next_link(headers: &HttpHeaders) -> Option<String> {
    let link_header = header_get(headers, "link")?;

    for part in link_header.split(',') {
        let mut url = None;
        let mut rel = None;

        for segment in part.trim().split(';') {
            let segment = segment.trim();
            if segment.starts_with('<') && segment.ends_with('>') {
                url = Some(&segment[1..segment.len() - 1]);
            } else if let Some(rel_value) = segment.strip_prefix("rel=") {
                rel = Some(rel_value.trim_matches('"'));
            }
        }

        if let (Some(url), Some("next")) = (url, rel) {
            return Some(url.to_string());
        }
    }

    None
}

fn item_kind(payload: &RawPayload) -> &str {
    if let Some(kind) = payload.str_at(&format!("/{KIND_KEY}")) {
        return kind;
    }
    if payload.value_at("/tag_name").is_some() {
        "release"
    } else if payload.value_at("/sha").is_some() && payload.value_at("/commit").is_some() {
        "commit"
    } else if payload.value_at("/pull_request").is_some() {
        "pull"
    } else {
        "issue"
    }
}

fn parse_timestamp(
    field: &str,
    raw: Option<&str>,
) -> Result<Option<DateTime<Utc>>, NormalizationError> {
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| NormalizationError::invalid(field, e))
    })
    .transpose()
}

fn required_id(
    payload: &RawPayload,
    pointer: &str,
    field: &str,
) -> Result<String, NormalizationError> {
    payload
        .value_at(pointer)
        .and_then(|v| match v {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        })
        .ok_or_else(|| NormalizationError::missing(field))
}

#[async_trait]
impl SourceAdapter for GitHubAdapter {
    fn platform(&self) -> Platform {
        Platform::GitHub
    }

    fn resolve(&self, url: &Url) -> Result<Option<ResolvedSource>, ResolveError> {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        if host != "github.com" && host != "www.github.com" {
            return Ok(None);
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();
        let [owner, repo, rest @ ..] = segments.as_slice() else {
            return Err(ResolveError::unsupported(
                Platform::GitHub,
                url,
                "expected https://github.com/<owner>/<repo>",
            ));
        };
        let repo = repo.strip_suffix(".git").unwrap_or(*repo);
        let identifier = format!("{owner}/{repo}");

        let stream = match rest.first().copied() {
            Some("issues" | "pulls" | "pull") => GitHubStream::Issues,
            Some("commits" | "commit") => GitHubStream::Commits,
            _ => GitHubStream::Releases,
        };

        let mut resolved = ResolvedSource::new(
            Platform::GitHub,
            SourceType::Repo,
            identifier.as_str(),
            format!("https://github.com/{identifier}"),
        )
        .with_name(identifier.clone());
        if stream != GitHubStream::Releases {
            resolved = resolved.with_config("stream", stream.to_string());
        }
        Ok(Some(resolved))
    }

    fn max_page_size(&self) -> usize {
        MAX_PAGE_SIZE
    }

    async fn fetch_page(
        &self,
        source: &SourceModel,
        request: PageRequest,
    ) -> Result<Page, FetchError> {
        if source.source_type != SourceType::Repo {
            return Err(FetchError::configuration(format!(
                "GitHub cannot fetch {} sources",
                source.source_type
            )));
        }
        let stream = stream_for(source)?;

        // The next URL keeps the per_page of the first request, so offsets
        // stay aligned even when the final page is smaller.
        let url = match request.token {
            Some(next) => next,
            None => Self::first_page_url(&source.source_identifier, stream, request.page_size),
        };

        let (body, headers): (Value, _) = self.http.get_json(self.request(url)).await?;
        let Value::Array(entries) = body else {
            return Err(FetchError::malformed(format!(
                "expected an array of {stream} from GitHub"
            )));
        };

        let payloads = entries
            .into_iter()
            .map(|mut entry| {
                if let Some(obj) = entry.as_object_mut() {
                    let kind = match stream {
                        GitHubStream::Releases => "release",
                        GitHubStream::Commits => "commit",
                        GitHubStream::Issues if obj.contains_key("pull_request") => "pull",
                        GitHubStream::Issues => "issue",
                    };
                    obj.insert(KIND_KEY.to_string(), Value::from(kind));
                }
                RawPayload::new(entry)
            })
            .collect();

        Ok(Page::with_next(payloads, next_link(&headers)))
    }

    fn normalize(
        &self,
        payload: &RawPayload,
        fields: &FieldProjection,
    ) -> Result<CanonicalItem, NormalizationError> {
        let kind = item_kind(payload).to_string();
        let mut collector = fields.collector();
        collector
            .put("url", || payload.str_at("/html_url"))
            .put("kind", || Some(kind.clone()));

        let (external_identifier, title, content, published_at) = match kind.as_str() {
            "release" => {
                let id = required_id(payload, "/id", "id")?;
                let tag = non_empty(payload.str_at("/tag_name"));
                let title = non_empty(payload.str_at("/name"))
                    .or_else(|| tag.clone())
                    .ok_or_else(|| NormalizationError::missing("tag_name"))?;
                let published_at = parse_timestamp(
                    "published_at",
                    payload
                        .str_at("/published_at")
                        .or_else(|| payload.str_at("/created_at")),
                )?;
                collector
                    .put("author", || payload.str_at("/author/login"))
                    .put("tag_name", || tag.clone())
                    .put("prerelease", || payload.value_at("/prerelease").and_then(Value::as_bool))
                    .put("draft", || payload.value_at("/draft").and_then(Value::as_bool))
                    .put("download_count", || {
                        payload.value_at("/assets").and_then(Value::as_array).map(|assets| {
                            assets
                                .iter()
                                .filter_map(|a| a.get("download_count").and_then(Value::as_i64))
                                .sum::<i64>()
                        })
                    });
                (
                    format!("release:{id}"),
                    title,
                    non_empty(payload.str_at("/body")),
                    published_at,
                )
            }
            "issue" | "pull" => {
                let id = required_id(payload, "/id", "id")?;
                let title = non_empty(payload.str_at("/title"))
                    .ok_or_else(|| NormalizationError::missing("title"))?;
                let published_at = parse_timestamp("created_at", payload.str_at("/created_at"))?;
                collector
                    .put("author", || payload.str_at("/user/login"))
                    .put("number", || payload.i64_at("/number"))
                    .put("state", || payload.str_at("/state"))
                    .put("labels", || {
                        payload.value_at("/labels").and_then(Value::as_array).map(|labels| {
                            labels
                                .iter()
                                .filter_map(|l| l.get("name").and_then(Value::as_str))
                                .map(str::to_string)
                                .collect::<Vec<_>>()
                        })
                    })
                    .put("comments", || payload.i64_at("/comments"));
                (
                    format!("{kind}:{id}"),
                    title,
                    non_empty(payload.str_at("/body")),
                    published_at,
                )
            }
            "commit" => {
                let sha = required_id(payload, "/sha", "sha")?;
                let message = non_empty(payload.str_at("/commit/message"))
                    .ok_or_else(|| NormalizationError::missing("commit.message"))?;
                let published_at = parse_timestamp(
                    "commit.author.date",
                    payload
                        .str_at("/commit/author/date")
                        .or_else(|| payload.str_at("/commit/committer/date")),
                )?;
                collector.put("author", || {
                    payload
                        .str_at("/author/login")
                        .or_else(|| payload.str_at("/commit/author/name"))
                });
                (
                    format!("commit:{sha}"),
                    first_line(&message, COMMIT_TITLE_CHARS),
                    Some(message),
                    published_at,
                )
            }
            other => {
                return Err(NormalizationError::new(format!(
                    "unknown GitHub item type '{other}'"
                )));
            }
        };

        Ok(CanonicalItem {
            external_identifier,
            title,
            content,
            published_at,
            raw_fields: collector.finish(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::adapter::test_support::source_with;
    use crate::http::MockTransport;
    use crate::retry::RetryConfig;
    use crate::value::ConfigMap;

    fn adapter(transport: &MockTransport, token: Option<&str>) -> GitHubAdapter {
        let http =
            HttpFetcher::new(Arc::new(transport.clone())).with_retry(RetryConfig::disabled());
        GitHubAdapter::new(http, token.map(str::to_string))
    }

    fn resolve(url: &str) -> Result<Option<ResolvedSource>, ResolveError> {
        adapter(&MockTransport::new(), None).resolve(&Url::parse(url).unwrap())
    }

    fn repo(stream: Option<&str>) -> SourceModel {
        let mut config = ConfigMap::new();
        if let Some(stream) = stream {
            config.insert("stream", stream);
        }
        source_with(Platform::GitHub, SourceType::Repo, "rust-lang/rust", config)
    }

    fn release(id: i64, tag: &str, name: Option<&str>) -> Value {
        json!({
            "id": id,
            "tag_name": tag,
            "name": name,
            "body": "Notes",
            "html_url": format!("https://github.com/rust-lang/rust/releases/tag/{tag}"),
            "published_at": "2025-02-20T10:00:00Z",
            "created_at": "2025-02-19T10:00:00Z",
            "prerelease": false,
            "draft": false,
            "author": {"login": "octocat"},
            "assets": [{"download_count": 10}, {"download_count": 5}],
        })
    }

    #[test]
    fn parses_next_link() {
        let headers = vec![(
            "Link".to_string(),
            r#"<https://api.github.com/repos/o/r/releases?per_page=2&page=2>; rel="next", <https://api.github.com/repos/o/r/releases?per_page=2&page=5>; rel="last""#
                .to_string(),
        )];
        assert_eq!(
            next_link(&headers).as_deref(),
            Some("https://api.github.com/repos/o/r/releases?per_page=2&page=2")
        );

        let last_page = vec![(
            "link".to_string(),
            r#"<https://api.github.com/repos/o/r/releases?page=1>; rel="first""#.to_string(),
        )];
        assert_eq!(next_link(&last_page), None);
        assert_eq!(next_link(&Vec::new()), None);
    }

    #[test]
    fn resolve_repository_urls() {
        let resolved = resolve("https://github.com/rust-lang/rust").unwrap().unwrap();
        assert_eq!(resolved.source_type, SourceType::Repo);
        assert_eq!(resolved.source_identifier, "rust-lang/rust");
        assert!(resolved.config.get("stream").is_none());

        let git = resolve("https://github.com/tokio-rs/tokio.git").unwrap().unwrap();
        assert_eq!(git.source_identifier, "tokio-rs/tokio");

        let issues = resolve("https://github.com/tokio-rs/tokio/issues").unwrap().unwrap();
        assert_eq!(issues.config.get_str("stream"), Some("issues"));

        let commits = resolve("https://www.github.com/o/r/commits/main").unwrap().unwrap();
        assert_eq!(commits.config.get_str("stream"), Some("commits"));

        assert_eq!(resolve("https://gitlab.com/o/r").unwrap(), None);
        assert!(matches!(
            resolve("https://github.com/rust-lang"),
            Err(ResolveError::Unsupported { .. })
        ));
    }

    #[test]
    fn stream_parsing() {
        assert_eq!("Releases".parse::<GitHubStream>(), Ok(GitHubStream::Releases));
        assert_eq!("pulls".parse::<GitHubStream>(), Ok(GitHubStream::Issues));
        assert!("wiki".parse::<GitHubStream>().is_err());
        assert_eq!(stream_for(&repo(None)).unwrap(), GitHubStream::Releases);
        assert!(matches!(
            stream_for(&repo(Some("wiki"))),
            Err(FetchError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn fetch_releases_follows_link_header() {
        let transport = MockTransport::new();
        let adapter = adapter(&transport, Some("ghp_test"));
        let first = GitHubAdapter::first_page_url("rust-lang/rust", GitHubStream::Releases, 2);
        assert_eq!(
            first,
            "https://api.github.com/repos/rust-lang/rust/releases?per_page=2"
        );
        let second = "https://api.github.com/repos/rust-lang/rust/releases?per_page=2&page=2";

        let link = format!("<{second}>; rel=\"next\"");
        transport.push_json(
            first.as_str(),
            200,
            &[("Link", link.as_str())],
            json!([release(2, "v2", Some("Two")), release(1, "v1", None)]),
        );
        transport.push_json(second, 200, &[], json!([release(0, "v0", None)]));

        let source = repo(None);
        let page = adapter
            .fetch_page(&source, PageRequest { token: None, page_size: 2 })
            .await
            .expect("first page");
        assert_eq!(page.payloads.len(), 2);
        assert_eq!(page.payloads[0].str_at("/item_type"), Some("release"));
        assert_eq!(page.next_token.as_deref(), Some(second));

        let page = adapter
            .fetch_page(&source, PageRequest { token: page.next_token, page_size: 1 })
            .await
            .expect("second page");
        assert_eq!(page.payloads.len(), 1);
        assert_eq!(page.next_token, None);

        let requests = transport.requests();
        assert_eq!(
            header_get(&requests[0].headers, "authorization"),
            Some("Bearer ghp_test")
        );
        assert_eq!(
            header_get(&requests[0].headers, "accept"),
            Some("application/vnd.github+json")
        );
    }

    #[tokio::test]
    async fn fetch_issues_tags_pull_requests() {
        let transport = MockTransport::new();
        let adapter = adapter(&transport, None);
        let url = GitHubAdapter::first_page_url("rust-lang/rust", GitHubStream::Issues, 50);
        assert!(url.contains("state=all"));
        transport.push_json(
            url.as_str(),
            200,
            &[],
            json!([
                {"id": 11, "number": 5, "title": "Fix it", "created_at": "2025-01-02T00:00:00Z",
                 "pull_request": {"url": "x"}},
                {"id": 10, "number": 4, "title": "Broken", "created_at": "2025-01-01T00:00:00Z"},
            ]),
        );

        let page = adapter
            .fetch_page(&repo(Some("issues")), PageRequest { token: None, page_size: 50 })
            .await
            .expect("page");
        let ids: Vec<String> = page
            .payloads
            .iter()
            .map(|p| adapter.normalize(p, &FieldProjection::All).unwrap().external_identifier)
            .collect();
        assert_eq!(ids, ["pull:11", "issue:10"]);
        assert!(requests_have_no_auth(&transport));
    }

    fn requests_have_no_auth(transport: &MockTransport) -> bool {
        transport
            .requests()
            .iter()
            .all(|r| header_get(&r.headers, "authorization").is_none())
    }

    #[tokio::test]
    async fn non_array_body_is_malformed() {
        let transport = MockTransport::new();
        let adapter = adapter(&transport, None);
        let url = GitHubAdapter::first_page_url("rust-lang/rust", GitHubStream::Releases, 10);
        transport.push_json(url.as_str(), 200, &[], json!({"message": "Moved"}));

        let err = adapter
            .fetch_page(&repo(None), PageRequest { token: None, page_size: 10 })
            .await
            .expect_err("malformed");
        assert!(matches!(err, FetchError::Malformed { .. }));
    }

    #[test]
    fn normalize_release() {
        let adapter = adapter(&MockTransport::new(), None);
        let item = adapter
            .normalize(&RawPayload::new(release(7, "v1.2.0", None)), &FieldProjection::All)
            .expect("release");

        assert_eq!(item.external_identifier, "release:7");
        assert_eq!(item.title, "v1.2.0");
        assert_eq!(item.content.as_deref(), Some("Notes"));
        assert_eq!(item.published_at.unwrap().to_rfc3339(), "2025-02-20T10:00:00+00:00");
        assert_eq!(item.raw_fields["download_count"], json!(15));
        assert_eq!(item.raw_fields["author"], json!("octocat"));
        assert_eq!(item.raw_fields["kind"], json!("release"));
        assert_eq!(item.raw_fields["prerelease"], json!(false));
    }

    #[test]
    fn normalize_commit_uses_first_line() {
        let adapter = adapter(&MockTransport::new(), None);
        let commit = json!({
            "sha": "abc123",
            "html_url": "https://github.com/o/r/commit/abc123",
            "commit": {
                "message": "Fix parser\n\nLonger explanation",
                "author": {"name": "Ferris", "date": "2025-01-03T04:05:06Z"},
            },
            "author": null,
        });
        let item = adapter
            .normalize(&RawPayload::new(commit), &FieldProjection::only(["author"]))
            .expect("commit");

        assert_eq!(item.external_identifier, "commit:abc123");
        assert_eq!(item.title, "Fix parser");
        assert_eq!(item.content.as_deref(), Some("Fix parser\n\nLonger explanation"));
        assert_eq!(item.raw_fields.len(), 1);
        assert_eq!(item.raw_fields["author"], json!("Ferris"));
    }

    #[test]
    fn normalize_issue_fields_and_failures() {
        let adapter = adapter(&MockTransport::new(), None);
        let issue = json!({
            "id": 99, "number": 12, "title": "Crash on start", "state": "open",
            "user": {"login": "reporter"}, "comments": 3,
            "labels": [{"name": "bug"}, {"name": "P-high"}],
            "created_at": "2025-01-01T00:00:00Z",
        });
        let item = adapter
            .normalize(&RawPayload::new(issue), &FieldProjection::All)
            .expect("issue");
        assert_eq!(item.external_identifier, "issue:99");
        assert_eq!(item.raw_fields["labels"], json!(["bug", "P-high"]));
        assert_eq!(item.raw_fields["number"], json!(12));

        let untitled = json!({"id": 1, "item_type": "issue"});
        assert_eq!(
            adapter.normalize(&RawPayload::new(untitled), &FieldProjection::All).unwrap_err(),
            NormalizationError::missing("title")
        );

        let bad_date = json!({"id": 1, "title": "t", "created_at": "soon"});
        assert!(adapter.normalize(&RawPayload::new(bad_date), &FieldProjection::All).is_err());
    }
}
