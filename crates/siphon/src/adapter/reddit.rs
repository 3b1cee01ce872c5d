//! Reddit adapter over the public JSON listings.
//!
//! Subreddit sources read `/r/<name>/new.json`; user sources (stored as
//! `FEED` with identifier `u/<name>`) read `/user/<name>/submitted.json`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use url::Url;

use crate::entity::platform::Platform;
use crate::entity::source::Model as SourceModel;
use crate::entity::source_type::SourceType;
use crate::http::HttpRequest;
use crate::model::{CanonicalItem, FieldProjection, RawPayload};

use super::SourceAdapter;
use super::client::HttpFetcher;
use super::errors::{FetchError, NormalizationError, ResolveError};
use super::text::non_empty;
use super::types::{Page, PageRequest, ResolvedSource};

const BASE_URL: &str = "https://www.reddit.com";
const MAX_PAGE_SIZE: usize = 100;
const HOSTS: [&str; 4] = ["reddit.com", "www.reddit.com", "old.reddit.com", "new.reddit.com"];

pub struct RedditAdapter {
    http: HttpFetcher,
}

impl RedditAdapter {
    pub fn new(http: HttpFetcher) -> Self {
        Self { http }
    }

    /// Newest-first listing behind a source.
    fn listing_path(source: &SourceModel) -> Result<String, FetchError> {
        let identifier = source.source_identifier.as_str();
        match source.source_type {
            SourceType::Subreddit => Ok(format!("/r/{identifier}/new.json")),
            SourceType::Feed => identifier
                .strip_prefix("u/")
                .filter(|user| valid_username(user))
                .map(|user| format!("/user/{user}/submitted.json"))
                .ok_or_else(|| {
                    FetchError::configuration(format!(
                        "Reddit user source identifier must look like u/<name>, got '{identifier}'"
                    ))
                }),
            other => Err(FetchError::configuration(format!(
                "Reddit cannot fetch {other} sources"
            ))),
        }
    }

    fn listing_url(path: &str, page_size: usize, after: Option<&str>) -> String {
        let limit = page_size.clamp(1, MAX_PAGE_SIZE);
        let mut url = format!("{BASE_URL}{path}?limit={limit}&raw_json=1");
        if path.starts_with("/user/") {
            url.push_str("&sort=new");
        }
        if let Some(after) = after {
            url.push_str("&after=");
            url.push_str(after);
        }
        url
    }
}

fn valid_subreddit(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 21
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn valid_username(name: &str) -> bool {
    (3..=20).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[async_trait]
impl SourceAdapter for RedditAdapter {
    fn platform(&self) -> Platform {
        Platform::Reddit
    }

    fn resolve(&self, url: &Url) -> Result<Option<ResolvedSource>, ResolveError> {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        if !HOSTS.contains(&host.as_str()) {
            return Ok(None);
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();
        match segments.as_slice() {
            ["r", name, ..] if valid_subreddit(name) => Ok(Some(
                ResolvedSource::new(
                    Platform::Reddit,
                    SourceType::Subreddit,
                    *name,
                    format!("{BASE_URL}/r/{name}"),
                )
                .with_name(format!("r/{name}")),
            )),
            ["user" | "u", name, ..] if valid_username(name) => Ok(Some(
                ResolvedSource::new(
                    Platform::Reddit,
                    SourceType::Feed,
                    format!("u/{name}"),
                    format!("{BASE_URL}/user/{name}"),
                )
                .with_name(format!("u/{name}")),
            )),
            _ => Err(ResolveError::unsupported(
                Platform::Reddit,
                url,
                "expected https://www.reddit.com/r/<subreddit> or /user/<name>",
            )),
        }
    }

    fn max_page_size(&self) -> usize {
        MAX_PAGE_SIZE
    }

    async fn fetch_page(
        &self,
        source: &SourceModel,
        request: PageRequest,
    ) -> Result<Page, FetchError> {
        let path = Self::listing_path(source)?;
        let url = Self::listing_url(&path, request.page_size, request.token.as_deref());
        let (body, _): (Value, _) = self.http.get_json(HttpRequest::get(url)).await?;

        if body.get("kind").and_then(Value::as_str) != Some("Listing") {
            return Err(FetchError::malformed("expected a Reddit Listing"));
        }
        let payloads = body
            .pointer("/data/children")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|child| child.get("data").cloned())
            .map(RawPayload::new)
            .collect();
        let after = body
            .pointer("/data/after")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Page::with_next(payloads, after))
    }

    fn normalize(
        &self,
        payload: &RawPayload,
        fields: &FieldProjection,
    ) -> Result<CanonicalItem, NormalizationError> {
        let fullname = payload
            .str_at("/name")
            .map(str::to_string)
            .or_else(|| payload.str_at("/id").map(|id| format!("t3_{id}")))
            .filter(|name| name.len() > 3)
            .ok_or_else(|| NormalizationError::missing("name"))?;
        let title = non_empty(payload.str_at("/title"))
            .ok_or_else(|| NormalizationError::missing("title"))?;

        let published_at = match payload.value_at("/created_utc") {
            None => None,
            Some(raw) => {
                let secs = raw
                    .as_f64()
                    .ok_or_else(|| NormalizationError::invalid("created_utc", raw))?;
                Some(
                    DateTime::<Utc>::from_timestamp(secs as i64, 0)
                        .ok_or_else(|| NormalizationError::invalid("created_utc", secs))?,
                )
            }
        };

        let permalink = payload
            .str_at("/permalink")
            .map(|p| format!("{BASE_URL}{p}"));

        let mut collector = fields.collector();
        collector
            .put("url", || payload.str_at("/url"))
            .put("permalink", || permalink.clone())
            .put("author", || payload.str_at("/author"))
            .put("score", || payload.i64_at("/score"))
            .put("num_comments", || payload.i64_at("/num_comments"))
            .put("flair", || non_empty(payload.str_at("/link_flair_text")))
            .put("over_18", || payload.value_at("/over_18").and_then(Value::as_bool))
            .put("subreddit", || payload.str_at("/subreddit"));

        Ok(CanonicalItem {
            external_identifier: fullname,
            title,
            content: non_empty(payload.str_at("/selftext")),
            published_at,
            raw_fields: collector.finish(),
        })
    }
}
