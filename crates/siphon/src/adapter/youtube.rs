//! YouTube Data API v3 adapter.
//!
//! Channels are read through their uploads playlist, so every source type ends
//! up paging `playlistItems` (newest first for uploads) and then enriching the
//! page with one `videos` call for durations and statistics.

use std::collections::HashMap;
use std::sync::Mutex;

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

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const MAX_PAGE_SIZE: usize = 50;
const UNAVAILABLE_TITLES: [&str; 2] = ["Private video", "Deleted video"];

pub struct YouTubeAdapter {
    http: HttpFetcher,
    api_key: Option<String>,
    /// Channel identifier -> uploads playlist id.
    uploads: Mutex<HashMap<String, String>>,
}

impl YouTubeAdapter {
    pub fn new(http: HttpFetcher, api_key: Option<String>) -> Self {
        Self {
            http,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            uploads: Mutex::new(HashMap::new()),
        }
    }

    fn api_key(&self) -> Result<&str, FetchError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| FetchError::configuration("YouTube API key is not configured"))
    }

    fn api_url(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String, FetchError> {
        let mut url = Url::parse(&format!("{API_BASE}/{endpoint}"))
            .map_err(|e| FetchError::configuration(e.to_string()))?;
        url.query_pairs_mut()
            .extend_pairs(params)
            .append_pair("key", self.api_key()?);
        Ok(url.into())
    }

    fn playlist_items_url(
        &self,
        playlist_id: &str,
        page_size: usize,
        token: Option<&str>,
    ) -> Result<String, FetchError> {
        let size = page_size.clamp(1, MAX_PAGE_SIZE).to_string();
        let mut params = vec![
            ("part", "snippet,contentDetails"),
            ("playlistId", playlist_id),
            ("maxResults", size.as_str()),
        ];
        if let Some(token) = token {
            params.push(("pageToken", token));
        }
        self.api_url("playlistItems", &params)
    }

    fn videos_url(&self, ids: &[&str]) -> Result<String, FetchError> {
        let joined = ids.join(",");
        self.api_url(
            "videos",
            &[
                ("part", "snippet,contentDetails,statistics"),
                ("id", joined.as_str()),
            ],
        )
    }

    fn channel_lookup_url(&self, identifier: &str) -> Result<String, FetchError> {
        let (param, value) = match identifier.strip_prefix("user:") {
            Some(username) => ("forUsername", username),
            None => ("forHandle", identifier),
        };
        self.api_url("channels", &[("part", "contentDetails"), (param, value)])
    }

    /// Uploads playlist for a channel source.
    async fn uploads_playlist(&self, identifier: &str) -> Result<String, FetchError> {
        // UC... channel ids map directly onto UU... uploads playlists.
        if let Some(rest) = identifier.strip_prefix("UC") {
            return Ok(format!("UU{rest}"));
        }

        let cached = self
            .uploads
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(identifier)
            .cloned();
        if let Some(cached) = cached {
            return Ok(cached);
        }

        let url = self.channel_lookup_url(identifier)?;
        let (body, _): (Value, _) = self.http.get_json(HttpRequest::get(url)).await?;
        let playlist = body
            .pointer("/items/0/contentDetails/relatedPlaylists/uploads")
            .and_then(Value::as_str)
            .ok_or_else(|| FetchError::NotFound {
                resource: format!("YouTube channel {identifier}"),
            })?
            .to_string();

        self.uploads
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(identifier.to_string(), playlist.clone());
        Ok(playlist)
    }

    /// Full video resources keyed by id.
    async fn video_details(&self, ids: &[&str]) -> Result<HashMap<String, Value>, FetchError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let (body, _): (Value, _) = self
            .http
            .get_json(HttpRequest::get(self.videos_url(ids)?))
            .await?;
        Ok(body
            .get("items")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|video| {
                let id = video.get("id")?.as_str()?.to_string();
                Some((id, video.clone()))
            })
            .collect())
    }

    async fn playlist_page(
        &self,
        playlist_id: &str,
        request: &PageRequest,
    ) -> Result<Page, FetchError> {
        let url =
            self.playlist_items_url(playlist_id, request.page_size, request.token.as_deref())?;
        let (body, _): (Value, _) = self.http.get_json(HttpRequest::get(url)).await?;

        let items: Vec<Value> = body
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let next_token = body
            .get("nextPageToken")
            .and_then(Value::as_str)
            .map(str::to_string);

        let ids: Vec<&str> = items
            .iter()
            .filter_map(|item| item.pointer("/contentDetails/videoId").and_then(Value::as_str))
            .collect();
        let mut details = self.video_details(&ids).await?;

        let payloads = items
            .iter()
            .map(|item| {
                let position = item.pointer("/snippet/position").cloned();
                let video = item
                    .pointer("/contentDetails/videoId")
                    .and_then(Value::as_str)
                    .and_then(|id| details.remove(id));
                let mut payload = video.unwrap_or_else(|| item.clone());
                if let (Some(obj), Some(position)) = (payload.as_object_mut(), position) {
                    obj.insert("position".to_string(), position);
                }
                RawPayload::new(payload)
            })
            .collect();

        Ok(Page::with_next(payloads, next_token))
    }
}

#[async_trait]
impl SourceAdapter for YouTubeAdapter {
    fn platform(&self) -> Platform {
        Platform::YouTube
    }

    fn resolve(&self, url: &Url) -> Result<Option<ResolvedSource>, ResolveError> {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        let host = host.strip_prefix("m.").unwrap_or(host);

        if host == "youtu.be" {
            let id = first_segment(url).ok_or_else(|| {
                ResolveError::unsupported(Platform::YouTube, url, "missing video id")
            })?;
            return Ok(Some(video_source(id)));
        }
        if host != "youtube.com" && host != "music.youtube.com" {
            return Ok(None);
        }

        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();

        let resolved = match segments.as_slice() {
            ["playlist"] | ["watch"] if query.contains_key("list") => {
                let list = &query["list"];
                Some(
                    ResolvedSource::new(
                        Platform::YouTube,
                        SourceType::Playlist,
                        list.as_str(),
                        format!("https://www.youtube.com/playlist?list={list}"),
                    )
                    .with_name(format!("YouTube playlist {list}")),
                )
            }
            ["watch"] => query.get("v").map(|v| video_source(v)),
            ["shorts", id] | ["live", id] | ["embed", id] => Some(video_source(id)),
            ["channel", id] if id.starts_with("UC") => Some(channel_source(
                id,
                format!("https://www.youtube.com/channel/{id}"),
            )),
            ["user", name] => Some(channel_source(
                &format!("user:{name}"),
                format!("https://www.youtube.com/user/{name}"),
            )),
            ["c", name] => Some(channel_source(
                &format!("@{name}"),
                format!("https://www.youtube.com/@{name}"),
            )),
            [handle, ..] if handle.starts_with('@') && handle.len() > 1 => Some(channel_source(
                handle,
                format!("https://www.youtube.com/{handle}"),
            )),
            _ => None,
        };

        resolved.map(Some).ok_or_else(|| {
            ResolveError::unsupported(
                Platform::YouTube,
                url,
                "expected a channel, playlist or video URL",
            )
        })
    }

    fn max_page_size(&self) -> usize {
        MAX_PAGE_SIZE
    }

    async fn fetch_page(
        &self,
        source: &SourceModel,
        request: PageRequest,
    ) -> Result<Page, FetchError> {
        self.api_key()?;
        match source.source_type {
            SourceType::Channel => {
                let playlist = self.uploads_playlist(&source.source_identifier).await?;
                self.playlist_page(&playlist, &request).await
            }
            SourceType::Playlist => self.playlist_page(&source.source_identifier, &request).await,
            SourceType::Video => {
                let mut details = self
                    .video_details(&[source.source_identifier.as_str()])
                    .await?;
                let video = details.remove(&source.source_identifier).ok_or_else(|| {
                    FetchError::NotFound {
                        resource: format!("YouTube video {}", source.source_identifier),
                    }
                })?;
                Ok(Page::last(vec![RawPayload::new(video)]))
            }
            other => Err(FetchError::configuration(format!(
                "YouTube cannot fetch {other} sources"
            ))),
        }
    }

    fn normalize(
        &self,
        payload: &RawPayload,
        fields: &FieldProjection,
    ) -> Result<CanonicalItem, NormalizationError> {
        let video_id = payload
            .str_at("/contentDetails/videoId")
            .or_else(|| payload.str_at("/id/videoId"))
            .or_else(|| payload.str_at("/id"))
            .filter(|id| !id.is_empty())
            .ok_or_else(|| NormalizationError::missing("videoId"))?
            .to_string();

        let title = non_empty(payload.str_at("/snippet/title"))
            .ok_or_else(|| NormalizationError::missing("snippet.title"))?;
        if payload.value_at("/statistics").is_none() && UNAVAILABLE_TITLES.contains(&title.as_str())
        {
            return Err(NormalizationError::new(format!(
                "video {video_id} is private or deleted"
            )));
        }

        let published_at = payload
            .str_at("/contentDetails/videoPublishedAt")
            .or_else(|| payload.str_at("/snippet/publishedAt"))
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map(|ts| ts.with_timezone(&Utc))
                    .map_err(|e| NormalizationError::invalid("publishedAt", e))
            })
            .transpose()?;

        let mut collector = fields.collector();
        collector
            .put("url", || {
                Some(format!("https://www.youtube.com/watch?v={video_id}"))
            })
            .put("channel_id", || payload.str_at("/snippet/channelId"))
            .put("channel_title", || payload.str_at("/snippet/channelTitle"))
            .put("thumbnail_url", || {
                ["high", "medium", "default"]
                    .iter()
                    .find_map(|size| payload.str_at(&format!("/snippet/thumbnails/{size}/url")))
            })
            .put("position", || payload.i64_at("/position"))
            .put("duration", || payload.str_at("/contentDetails/duration"))
            .put("view_count", || payload.i64_at("/statistics/viewCount"))
            .put("like_count", || payload.i64_at("/statistics/likeCount"))
            .put("comment_count", || payload.i64_at("/statistics/commentCount"))
            .put("language", || {
                payload
                    .str_at("/snippet/defaultAudioLanguage")
                    .or_else(|| payload.str_at("/snippet/defaultLanguage"))
            });

        Ok(CanonicalItem {
            external_identifier: video_id,
            title,
            content: non_empty(payload.str_at("/snippet/description")),
            published_at,
            raw_fields: collector.finish(),
        })
    }
}

fn first_segment(url: &Url) -> Option<&str> {
    url.path_segments()?.find(|s| !s.is_empty())
}

fn video_source(id: &str) -> ResolvedSource {
    ResolvedSource::new(
        Platform::YouTube,
        SourceType::Video,
        id,
        format!("https://www.youtube.com/watch?v={id}"),
    )
    .with_name(format!("YouTube video {id}"))
}

fn channel_source(identifier: &str, url: String) -> ResolvedSource {
    ResolvedSource::new(Platform::YouTube, SourceType::Channel, identifier, url)
        .with_name(identifier.trim_start_matches("user:").to_string())
}

/// Minimal video resource, used by tests in this module and the coordinator.
#[cfg(test)]
pub(crate) fn sample_video(id: &str, title: &str, published: &str) -> Value {
    serde_json::json!({
        "id": id,
        "snippet": {
            "title": title,
            "description": format!("About {title}"),
            "publishedAt": published,
            "channelId": "UC123",
            "channelTitle": "Example Channel",
            "thumbnails": {"default": {"url": format!("https://i.ytimg.com/vi/{id}/default.jpg")}},
        },
        "contentDetails": {"duration": "PT4M13S"},
        "statistics": {"viewCount": "1500", "likeCount": "42", "commentCount": "7"},
    })
}
