//! RSS feed fetching and parsing.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;

use talkless_core::{ids, Article, Result, Source, TalklessError};

use crate::fetcher::Fetcher;
use crate::normalize::{collapse_whitespace, html_to_text};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    author: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

/// Parse an RSS timestamp. Feeds overwhelmingly use RFC 2822; a few emit
/// RFC 3339, so try both.
fn parse_published(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(ts)
        .or_else(|_| DateTime::parse_from_rfc3339(ts))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Fetches RSS sources over HTTP and normalizes their entries.
pub struct RssFetcher {
    http: reqwest::Client,
    strict_published: bool,
}

impl RssFetcher {
    /// Create a fetcher with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TalklessError::Fetch`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration, strict_published: bool) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("talkless/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| TalklessError::Fetch(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            strict_published,
        })
    }
}

/// Parse a feed document into articles for `source`.
///
/// Entries missing both a link and a title are skipped. Entries without a
/// published time are skipped under strict mode and otherwise stamped with
/// `fetched_at`.
///
/// # Examples
///
/// ```
/// use talkless_core::{Source, SourceKind};
/// use talkless_ingest::rss::parse_feed;
///
/// let source = Source {
///     id: "ap".into(),
///     name: "AP".into(),
///     kind: SourceKind::Rss,
///     url: "https://example.com/feed".into(),
///     credential_env: None,
///     declared_lean: None,
///     enabled: true,
///     requests_per_minute: 60,
///     api_fields: None,
/// };
/// let xml = r#"<rss><channel><item>
///   <title>Headline</title>
///   <link>https://example.com/story</link>
///   <pubDate>Mon, 02 Mar 2026 12:00:00 GMT</pubDate>
///   <description>&lt;p&gt;Body text.&lt;/p&gt;</description>
/// </item></channel></rss>"#;
/// let articles = parse_feed(xml, &source, chrono::Utc::now(), false).unwrap();
/// assert_eq!(articles.len(), 1);
/// assert_eq!(articles[0].content, "Body text.");
/// ```
pub fn parse_feed(
    xml: &str,
    source: &Source,
    fetched_at: DateTime<Utc>,
    strict_published: bool,
) -> Result<Vec<Article>> {
    let rss: Rss =
        from_str(xml).map_err(|e| TalklessError::Parse(format!("{}: {e}", source.id)))?;

    let mut articles = Vec::with_capacity(rss.channel.item.len());
    for item in rss.channel.item {
        let title = collapse_whitespace(item.title.as_deref().unwrap_or_default());
        let link = item.link.as_deref().unwrap_or_default().trim().to_string();
        if title.is_empty() && link.is_empty() {
            tracing::debug!(source = %source.id, "skipping entry without title or link");
            continue;
        }

        let published_at = match item.pub_date.as_deref().and_then(parse_published) {
            Some(ts) => ts,
            None if strict_published => {
                tracing::debug!(source = %source.id, title = %title, "skipping entry without published time");
                continue;
            }
            None => fetched_at,
        };

        let id = if link.is_empty() {
            ids::article_id_fallback(&source.id, &title, published_at)
        } else {
            ids::article_id(&link)
        };

        articles.push(Article {
            id,
            source_id: source.id.clone(),
            source_name: source.name.clone(),
            title,
            url: link,
            author: item.author.map(|a| collapse_whitespace(&a)),
            published_at,
            content: html_to_text(item.description.as_deref().unwrap_or_default()),
            fetched_at,
        });
    }

    Ok(articles)
}

#[async_trait]
impl Fetcher for RssFetcher {
    async fn fetch(&self, source: &Source) -> Result<Vec<Article>> {
        let response = self
            .http
            .get(&source.url)
            .send()
            .await
            .map_err(|e| TalklessError::Fetch(format!("{}: {e}", source.id)))?;

        if !response.status().is_success() {
            return Err(TalklessError::Fetch(format!(
                "{}: HTTP {}",
                source.id,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| TalklessError::Fetch(format!("{}: {e}", source.id)))?;

        parse_feed(&body, source, Utc::now(), self.strict_published)
    }

    fn name(&self) -> &str {
        "rss"
    }
}
