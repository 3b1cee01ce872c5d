//! RSS 2.0 and Atom feed adapter.
//!
//! A feed is a single document, so each run issues one `GET` and yields every
//! entry in document order. Entries are flattened into small JSON objects by
//! [`parse_feed`] and mapped onto canonical items by `normalize`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use scraper::Html;
use serde_json::{Map, Value};
use url::Url;

use crate::entity::platform::Platform;
use crate::entity::source::Model as SourceModel;
use crate::entity::source_type::SourceType;
use crate::http::HttpRequest;
use crate::model::{CanonicalItem, FieldProjection, RawPayload};

use super::SourceAdapter;
use super::client::HttpFetcher;
use super::errors::{FetchError, NormalizationError, ResolveError};
use super::text::{metrics, non_empty, squash_whitespace};
use super::types::{Page, PageRequest, ResolvedSource};

const ACCEPT: &str = "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.8";
const SUMMARY_CHARS: usize = 500;

pub struct FeedAdapter {
    http: HttpFetcher,
}

impl FeedAdapter {
    pub fn new(http: HttpFetcher) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    fn platform(&self) -> Platform {
        Platform::Rss
    }

    fn resolve(&self, url: &Url) -> Result<Option<ResolvedSource>, ResolveError> {
        let Some(host) = url.host_str() else {
            return Ok(None);
        };
        let host = host.to_ascii_lowercase();
        if let Some(resolved) = resolve_substack(&host) {
            return Ok(Some(resolved));
        }
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.clone(),
        };
        let identifier = format!("{authority}{}", url.path());
        Ok(Some(
            ResolvedSource::new(Platform::Rss, SourceType::Feed, identifier, url.as_str())
                .with_name(host.trim_start_matches("www.").to_string()),
        ))
    }

    async fn fetch_page(
        &self,
        source: &SourceModel,
        _request: PageRequest,
    ) -> Result<Page, FetchError> {
        let response = self
            .http
            .get(HttpRequest::get(&source.url).header("Accept", ACCEPT))
            .await?;
        let entries = parse_feed(&response.text())?;
        tracing::debug!(source_id = %source.id, entries = entries.len(), "Parsed feed");
        Ok(Page::last(entries.into_iter().map(RawPayload::new).collect()))
    }

    fn normalize(
        &self,
        payload: &RawPayload,
        fields: &FieldProjection,
    ) -> Result<CanonicalItem, NormalizationError> {
        let identifier = ["/guid", "/id", "/link", "/enclosure_url"]
            .iter()
            .find_map(|p| non_empty(payload.str_at(p)))
            .ok_or_else(|| NormalizationError::missing("guid"))?;

        let title = non_empty(payload.str_at("/title"))
            .map(|t| squash_whitespace(&t))
            .unwrap_or_else(|| "Untitled".to_string());

        let content = ["/content", "/description", "/summary"]
            .iter()
            .find_map(|p| payload.str_at(p))
            .map(html_to_text)
            .filter(|text| !text.is_empty());

        let published_at = ["/published", "/updated"]
            .iter()
            .find_map(|p| non_empty(payload.str_at(p)))
            .and_then(|raw| {
                let parsed = parse_date(&raw);
                if parsed.is_none() {
                    tracing::warn!(identifier = %identifier, date = %raw, "Unparseable feed date");
                }
                parsed
            });

        let enclosure = non_empty(payload.str_at("/enclosure_url"));

        let mut collector = fields.collector();
        collector
            .put("url", || {
                non_empty(payload.str_at("/link")).or_else(|| enclosure.clone())
            })
            .put("author", || non_empty(payload.str_at("/author")))
            .put("categories", || {
                payload
                    .value_at("/categories")
                    .filter(|v| v.as_array().is_some_and(|a| !a.is_empty()))
                    .cloned()
            })
            .put("summary", || {
                ["/summary", "/description"]
                    .iter()
                    .find_map(|p| payload.str_at(p))
                    .map(html_to_text)
                    .filter(|s| !s.is_empty())
                    .map(|s| truncate(&s, SUMMARY_CHARS))
            })
            .put("word_count", || content.as_deref().map(|c| metrics(c).0))
            .put("char_count", || content.as_deref().map(|c| metrics(c).1))
            .put("enclosure_url", || enclosure.clone())
            .put("enclosure_type", || non_empty(payload.str_at("/enclosure_type")))
            .put("file_size", || {
                payload.i64_at("/enclosure_length").filter(|size| *size > 0)
            })
            .put("duration", || non_empty(payload.str_at("/duration")))
            .put("duration_seconds", || {
                payload.str_at("/duration").and_then(parse_duration)
            })
            .put("image", || non_empty(payload.str_at("/image")));

        Ok(CanonicalItem {
            external_identifier: identifier,
            title,
            content,
            published_at,
            raw_fields: collector.finish(),
        })
    }
}

/// Substack newsletters serve HTML at every page URL and the feed at `/feed`.
fn resolve_substack(host: &str) -> Option<ResolvedSource> {
    let publication = host
        .strip_prefix("www.")
        .unwrap_or(host)
        .strip_suffix(".substack.com")?;
    if publication.is_empty() || publication.contains('.') || publication == "www" {
        return None;
    }
    let feed_host = format!("{publication}.substack.com");
    Some(
        ResolvedSource::new(
            Platform::Rss,
            SourceType::Feed,
            format!("{feed_host}/feed"),
            format!("https://{feed_host}/feed"),
        )
        .with_name(feed_host),
    )
}

/// Parse an RSS or Atom document into one JSON object per entry.
///
/// Keys: `guid`, `id`, `link`, `title`, `description`, `summary`, `content`,
/// `author`, `categories`, `published`, `updated`, and for podcast episodes
/// `enclosure_url`, `enclosure_length`, `enclosure_type`, `duration`, `image`.
pub fn parse_feed(xml: &str) -> Result<Vec<Value>, FetchError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries: Vec<Value> = Vec::new();
    let mut saw_root = false;
    let mut entry: Option<EntryBuilder> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(event)) => {
                saw_root = true;
                let name = qualified_name(&event);
                match entry.as_mut() {
                    None if name == "item" || name == "entry" => {
                        entry = Some(EntryBuilder::default());
                    }
                    Some(builder) => builder.open(&name, &event),
                    None => {}
                }
            }
            Ok(Event::Empty(event)) => {
                saw_root = true;
                if let Some(builder) = entry.as_mut() {
                    builder.empty(&qualified_name(&event), &event);
                }
            }
            Ok(Event::End(event)) => {
                let name = String::from_utf8_lossy(event.name().as_ref()).to_ascii_lowercase();
                let closes_entry = entry.as_ref().is_some_and(|b| b.depth == 0)
                    && (name == "item" || name == "entry");
                if closes_entry {
                    if let Some(done) = entry.take() {
                        entries.push(done.finish());
                    }
                } else if let Some(builder) = entry.as_mut() {
                    builder.close();
                }
            }
            Ok(Event::Text(text)) => {
                if let Some(builder) = entry.as_mut() {
                    let value = text
                        .unescape()
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&text).into_owned());
                    builder.text(&value);
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(builder) = entry.as_mut() {
                    builder.text(&String::from_utf8_lossy(&data));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(FetchError::malformed(format!(
                    "feed XML error at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
    }

    if !saw_root {
        return Err(FetchError::malformed("document is not XML"));
    }
    Ok(entries)
}

fn qualified_name(event: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(event.name().as_ref()).to_ascii_lowercase()
}

fn attribute(event: &BytesStart<'_>, key: &str) -> Option<String> {
    event
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref().eq_ignore_ascii_case(key.as_bytes()))
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Key an entry child element is stored under, if any.
fn field_for(name: &str) -> Option<&'static str> {
    Some(match name {
        "guid" => "guid",
        "id" => "id",
        "link" => "link",
        "title" => "title",
        "description" => "description",
        "summary" => "summary",
        "content" | "content:encoded" => "content",
        "author" | "dc:creator" => "author",
        "category" => "categories",
        "pubdate" | "published" | "dc:date" => "published",
        "updated" => "updated",
        "itunes:duration" => "duration",
        _ => return None,
    })
}

#[derive(Default)]
struct EntryBuilder {
    fields: Map<String, Value>,
    categories: Vec<Value>,
    /// Depth below the entry element.
    depth: usize,
    /// Field collecting text, set while inside a recognized direct child.
    current: Option<&'static str>,
    buffer: String,
    /// Inside a nested element whose text is ignored (author email, uri).
    skipping: bool,
}

impl EntryBuilder {
    fn open(&mut self, name: &str, event: &BytesStart<'_>) {
        self.depth += 1;
        if self.depth == 1 {
            self.current = field_for(name);
            self.buffer.clear();
            match name {
                "link" => self.link_attribute(event),
                "enclosure" | "itunes:image" => self.media_attributes(name, event),
                _ => {}
            }
        } else if self.current == Some("author") {
            self.skipping = name != "name";
        }
    }

    fn empty(&mut self, name: &str, event: &BytesStart<'_>) {
        if self.depth != 0 {
            return;
        }
        match name {
            "link" => self.link_attribute(event),
            "category" => {
                if let Some(term) = attribute(event, "term").or_else(|| attribute(event, "label")) {
                    self.categories.push(Value::String(term));
                }
            }
            "enclosure" | "itunes:image" => self.media_attributes(name, event),
            _ => {}
        }
    }

    /// Atom links carry the URL in `href`; prefer `rel="alternate"` or no rel.
    fn link_attribute(&mut self, event: &BytesStart<'_>) {
        let rel = attribute(event, "rel");
        if let Some(href) = attribute(event, "href")
            && rel.as_deref().is_none_or(|r| r == "alternate")
            && !self.fields.contains_key("link")
        {
            self.fields.insert("link".to_string(), Value::String(href));
        }
    }

    /// First `<enclosure>` wins; `<itunes:image>` carries its URL in `href`.
    fn media_attributes(&mut self, name: &str, event: &BytesStart<'_>) {
        let keys: &[(&str, &str)] = if name == "enclosure" {
            if self.fields.contains_key("enclosure_url") {
                return;
            }
            &[
                ("url", "enclosure_url"),
                ("length", "enclosure_length"),
                ("type", "enclosure_type"),
            ]
        } else {
            &[("href", "image")]
        };
        for (attr, key) in keys {
            if let Some(value) = attribute(event, attr).filter(|v| !v.trim().is_empty()) {
                self.fields
                    .entry(key.to_string())
                    .or_insert(Value::String(value.trim().to_string()));
            }
        }
    }

    fn text(&mut self, value: &str) {
        if self.current.is_some() && !self.skipping {
            if !self.buffer.is_empty() {
                self.buffer.push(' ');
            }
            self.buffer.push_str(value);
        }
    }

    fn close(&mut self) {
        if self.depth > 1 {
            self.skipping = false;
        } else if self.depth == 1
            && let Some(field) = self.current.take()
        {
            let value = std::mem::take(&mut self.buffer).trim().to_string();
            if !value.is_empty() {
                if field == "categories" {
                    self.categories.push(Value::String(value));
                } else if !self.fields.contains_key(field) {
                    self.fields.insert(field.to_string(), Value::String(value));
                }
            }
        }
        self.depth = self.depth.saturating_sub(1);
    }

    fn finish(mut self) -> Value {
        if !self.categories.is_empty() {
            self.fields
                .insert("categories".to_string(), Value::Array(self.categories));
        }
        Value::Object(self.fields)
    }
}

/// Strip markup, keeping text separated by single spaces.
fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: Vec<&str> = fragment.root_element().text().collect();
    squash_whitespace(&text.join(" "))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

/// `HH:MM:SS`, `MM:SS` or plain seconds.
fn parse_duration(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if !raw.contains(':') {
        return raw.parse::<f64>().ok().map(|secs| secs as i64);
    }
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() > 3 {
        return None;
    }
    parts.iter().try_fold(0i64, |total, part| {
        part.trim().parse::<i64>().ok().map(|n| total * 60 + n)
    })
}

/// RFC 2822 (RSS), RFC 3339 (Atom), or a bare date.
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
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

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Example Blog</title>
    <link>https://blog.example.com</link>
    <item>
      <title>Second &amp; newer</title>
      <link>https://blog.example.com/2</link>
      <guid isPermaLink="false">g2</guid>
      <pubDate>Tue, 07 Jan 2025 10:00:00 GMT</pubDate>
      <dc:creator>Ada</dc:creator>
      <category>rust</category>
      <category>async</category>
      <description>Short &lt;b&gt;summary&lt;/b&gt;</description>
      <content:encoded><![CDATA[<p>Full <em>body</em> text here</p>]]></content:encoded>
    </item>
    <item>
      <title>First</title>
      <link>https://blog.example.com/1</link>
      <pubDate>not a date</pubDate>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example Atom</title>
  <link href="https://atom.example.com/"/>
  <entry>
    <title>Atom entry</title>
    <link rel="self" href="https://atom.example.com/self/1"/>
    <link rel="alternate" href="https://atom.example.com/posts/1"/>
    <id>urn:uuid:1225c695</id>
    <updated>2025-02-01T08:30:00Z</updated>
    <author><name>Grace</name><email>grace@example.com</email></author>
    <category term="compilers"/>
    <summary>Atom summary</summary>
  </entry>
</feed>"#;

    const PODCAST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Example Cast</title>
    <item>
      <title>Ep 2</title>
      <enclosure url="https://cdn.example.com/ep2.mp3" length="4096000" type="audio/mpeg"/>
      <enclosure url="https://cdn.example.com/ep2.ogg" length="1" type="audio/ogg"/>
      <itunes:duration>1:02:03</itunes:duration>
      <itunes:image href="https://cdn.example.com/ep2.jpg"/>
    </item>
    <item>
      <title>Ep 1</title>
      <guid>ep-1</guid>
      <enclosure url="https://cdn.example.com/ep1.mp3" length="0" type="audio/mpeg"></enclosure>
      <itunes:duration>754</itunes:duration>
    </item>
  </channel>
</rss>"#;

    fn adapter(transport: &MockTransport) -> FeedAdapter {
        FeedAdapter::new(
            HttpFetcher::new(Arc::new(transport.clone())).with_retry(RetryConfig::disabled()),
        )
    }

    #[test]
    fn parse_rss_items() {
        let entries = parse_feed(RSS).expect("parse");
        assert_eq!(entries.len(), 2);
        let first = &entries[0];
        assert_eq!(first["guid"], json!("g2"));
        assert_eq!(first["title"], json!("Second & newer"));
        assert_eq!(first["author"], json!("Ada"));
        assert_eq!(first["categories"], json!(["rust", "async"]));
        assert_eq!(first["content"], json!("<p>Full <em>body</em> text here</p>"));
        assert_eq!(first["description"], json!("Short <b>summary</b>"));
        assert!(entries[1].get("guid").is_none());
    }

    #[test]
    fn parse_atom_entries() {
        let entries = parse_feed(ATOM).expect("parse");
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry["link"], json!("https://atom.example.com/posts/1"));
        assert_eq!(entry["id"], json!("urn:uuid:1225c695"));
        assert_eq!(entry["author"], json!("Grace"));
        assert_eq!(entry["categories"], json!(["compilers"]));
    }

    #[test]
    fn parse_rejects_non_xml() {
        assert!(matches!(
            parse_feed("just some text"),
            Err(FetchError::Malformed { .. })
        ));
        assert!(parse_feed("<rss><channel><item><title>x</title></channel></rss>").is_err());
    }

    #[test]
    fn normalize_prefers_guid_and_strips_html() {
        let adapter = adapter(&MockTransport::new());
        let entries = parse_feed(RSS).unwrap();

        let item = adapter
            .normalize(&RawPayload::new(entries[0].clone()), &FieldProjection::All)
            .expect("normalize");
        assert_eq!(item.external_identifier, "g2");
        assert_eq!(item.title, "Second & newer");
        assert_eq!(item.content.as_deref(), Some("Full body text here"));
        assert_eq!(
            item.published_at.unwrap().to_rfc3339(),
            "2025-01-07T10:00:00+00:00"
        );
        assert_eq!(item.raw_fields["url"], json!("https://blog.example.com/2"));
        assert_eq!(item.raw_fields["summary"], json!("Short summary"));
        assert_eq!(item.raw_fields["word_count"], json!(4));
        assert_eq!(item.raw_fields["char_count"], json!(19));
    }

    #[test]
    fn normalize_falls_back_to_link_and_tolerates_bad_dates() {
        let adapter = adapter(&MockTransport::new());
        let entries = parse_feed(RSS).unwrap();
        let item = adapter
            .normalize(&RawPayload::new(entries[1].clone()), &FieldProjection::All)
            .expect("normalize");
        assert_eq!(item.external_identifier, "https://blog.example.com/1");
        assert!(item.published_at.is_none());
        assert!(item.content.is_none());
    }

    #[test]
    fn parse_podcast_enclosures() {
        let entries = parse_feed(PODCAST).expect("parse");
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0]["enclosure_url"],
            json!("https://cdn.example.com/ep2.mp3")
        );
        assert_eq!(entries[0]["enclosure_length"], json!("4096000"));
        assert_eq!(entries[0]["enclosure_type"], json!("audio/mpeg"));
        assert_eq!(entries[0]["duration"], json!("1:02:03"));
        assert_eq!(entries[0]["image"], json!("https://cdn.example.com/ep2.jpg"));
        assert_eq!(
            entries[1]["enclosure_url"],
            json!("https://cdn.example.com/ep1.mp3")
        );
    }

    #[test]
    fn normalize_episode_without_guid_uses_enclosure() {
        let adapter = adapter(&MockTransport::new());
        let entries = parse_feed(PODCAST).unwrap();

        let item = adapter
            .normalize(&RawPayload::new(entries[0].clone()), &FieldProjection::All)
            .expect("normalize");
        assert_eq!(item.external_identifier, "https://cdn.example.com/ep2.mp3");
        assert_eq!(item.title, "Ep 2");
        assert_eq!(item.raw_fields["url"], json!("https://cdn.example.com/ep2.mp3"));
        assert_eq!(item.raw_fields["enclosure_type"], json!("audio/mpeg"));
        assert_eq!(item.raw_fields["file_size"], json!(4_096_000));
        assert_eq!(item.raw_fields["duration"], json!("1:02:03"));
        assert_eq!(item.raw_fields["duration_seconds"], json!(3723));
        assert_eq!(item.raw_fields["image"], json!("https://cdn.example.com/ep2.jpg"));

        let item = adapter
            .normalize(
                &RawPayload::new(entries[1].clone()),
                &FieldProjection::only(["file_size", "duration_seconds"]),
            )
            .expect("normalize");
        assert_eq!(item.external_identifier, "ep-1");
        assert!(!item.raw_fields.contains_key("file_size"));
        assert_eq!(item.raw_fields["duration_seconds"], json!(754));
        assert_eq!(item.raw_fields.len(), 1);
    }

    #[test]
    fn parse_duration_formats() {
        assert_eq!(parse_duration("45"), Some(45));
        assert_eq!(parse_duration("12:34"), Some(754));
        assert_eq!(parse_duration("1:02:03"), Some(3723));
        assert_eq!(parse_duration("90.5"), Some(90));
        assert_eq!(parse_duration("1:2:3:4"), None);
        assert_eq!(parse_duration("about an hour"), None);
    }

    #[test]
    fn normalize_requires_an_identifier() {
        let adapter = adapter(&MockTransport::new());
        let err = adapter
            .normalize(&RawPayload::new(json!({"title": "orphan"})), &FieldProjection::All)
            .unwrap_err();
        assert_eq!(err, NormalizationError::missing("guid"));
    }

    #[test]
    fn resolve_uses_host_and_path() {
        let adapter = adapter(&MockTransport::new());
        let url = Url::parse("https://www.Example.com/blog/feed.xml?utm=1").unwrap();
        let resolved = adapter.resolve(&url).unwrap().unwrap();
        assert_eq!(resolved.platform, Platform::Rss);
        assert_eq!(resolved.source_type, SourceType::Feed);
        assert_eq!(resolved.source_identifier, "www.example.com/blog/feed.xml");
        assert_eq!(resolved.name, "example.com");
    }

    #[test]
    fn resolve_substack_pages_to_the_newsletter_feed() {
        let adapter = adapter(&MockTransport::new());
        for input in [
            "https://example.substack.com/",
            "https://example.substack.com",
            "https://Example.substack.com/p/some-post?utm_source=x",
            "https://example.substack.com/feed",
        ] {
            let url = Url::parse(input).unwrap();
            let resolved = adapter.resolve(&url).unwrap().unwrap();
            assert_eq!(resolved.source_identifier, "example.substack.com/feed", "{input}");
            assert_eq!(resolved.url, "https://example.substack.com/feed", "{input}");
            assert_eq!(resolved.name, "example.substack.com");
        }

        let url = Url::parse("https://substack.com/inbox").unwrap();
        let resolved = adapter.resolve(&url).unwrap().unwrap();
        assert_eq!(resolved.source_identifier, "substack.com/inbox");
    }

    #[tokio::test]
    async fn fetch_substack_source_reads_the_feed() {
        let transport = MockTransport::new();
        let adapter = adapter(&transport);
        let resolved = adapter
            .resolve(&Url::parse("https://example.substack.com/p/hello").unwrap())
            .unwrap()
            .unwrap();
        let mut source = source_with(
            Platform::Rss,
            SourceType::Feed,
            &resolved.source_identifier,
            ConfigMap::new(),
        );
        source.url = resolved.url.clone();
        transport.push_response(
            "https://example.substack.com/feed",
            crate::http::HttpResponse {
                status: 200,
                headers: vec![("Content-Type".into(), "application/rss+xml".into())],
                body: RSS.as_bytes().to_vec(),
            },
        );

        let page = adapter
            .fetch_page(&source, PageRequest { token: None, page_size: 10 })
            .await
            .expect("page");
        assert_eq!(page.payloads.len(), 2);
        assert_eq!(
            transport.requested_urls(),
            ["https://example.substack.com/feed"]
        );
    }

    #[test]
    fn parse_date_formats() {
        assert!(parse_date("Mon, 06 Jan 2025 09:00:00 +0100").is_some());
        assert!(parse_date("2025-01-06T09:00:00-05:00").is_some());
        assert_eq!(
            parse_date("2025-01-06").unwrap().to_rfc3339(),
            "2025-01-06T00:00:00+00:00"
        );
        assert!(parse_date("yesterday").is_none());
    }

    #[tokio::test]
    async fn fetch_page_returns_all_entries_in_one_page() {
        let transport = MockTransport::new();
        let adapter = adapter(&transport);
        let source = source_with(
            Platform::Rss,
            SourceType::Feed,
            "example.com/feed.xml",
            ConfigMap::new(),
        );
        transport.push_response(
            source.url.clone(),
            crate::http::HttpResponse {
                status: 200,
                headers: vec![("Content-Type".into(), "application/rss+xml".into())],
                body: RSS.as_bytes().to_vec(),
            },
        );

        let page = adapter
            .fetch_page(&source, PageRequest { token: None, page_size: 1 })
            .await
            .expect("page");
        assert_eq!(page.payloads.len(), 2);
        assert!(page.next_token.is_none());
    }

    #[tokio::test]
    async fn fetch_page_maps_gone_feeds_to_not_found() {
        let transport = MockTransport::new();
        let adapter = adapter(&transport);
        let source = source_with(Platform::Rss, SourceType::Feed, "gone", ConfigMap::new());
        transport.push_json(source.url.clone(), 410, &[], json!({}));

        let err = adapter
            .fetch_page(&source, PageRequest { token: None, page_size: 10 })
            .await
            .expect_err("gone");
        assert!(matches!(err, FetchError::NotFound { .. }));
    }
}
