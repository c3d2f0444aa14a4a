//! JSON API source fetching.
//!
//! Issues an authenticated request (credential resolved through environment
//! indirection, never stored in config) and maps a JSON array of items to
//! articles using the source's field mapping.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use talkless_core::{ids, ApiFieldMap, Article, Result, Source, TalklessError};

use crate::fetcher::Fetcher;
use crate::normalize::{collapse_whitespace, html_to_text};

/// Fetches API sources over HTTP and maps their JSON payloads.
pub struct ApiFetcher {
    http: reqwest::Client,
    strict_published: bool,
}

impl ApiFetcher {
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

    /// Resolve the bearer token for `source`, if it declares one.
    ///
    /// # Errors
    ///
    /// Returns [`TalklessError::Fetch`] when the declared environment
    /// variable is unset — the ingestor turns this into a skip-with-warning.
    pub fn resolve_credential(source: &Source) -> Result<Option<String>> {
        match &source.credential_env {
            None => Ok(None),
            Some(var) => match std::env::var(var) {
                Ok(value) if !value.is_empty() => Ok(Some(value)),
                _ => Err(TalklessError::Fetch(format!(
                    "{}: credential env {var} is not set",
                    source.id
                ))),
            },
        }
    }
}

fn parse_published(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .or_else(|_| DateTime::parse_from_rfc2822(ts))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn str_field(item: &serde_json::Value, field: &str) -> Option<String> {
    item.get(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Map a JSON payload to articles for `source`.
///
/// # Examples
///
/// ```
/// use talkless_core::{Source, SourceKind};
/// use talkless_ingest::api::parse_payload;
///
/// let source = Source {
///     id: "wire".into(),
///     name: "Wire".into(),
///     kind: SourceKind::Api,
///     url: "https://example.com/api".into(),
///     credential_env: None,
///     declared_lean: None,
///     enabled: true,
///     requests_per_minute: 60,
///     api_fields: None,
/// };
/// let payload = serde_json::json!({"articles": [
///     {"title": "Hi", "url": "https://example.com/hi",
///      "content": "Body", "published_at": "2026-03-02T10:00:00Z"}
/// ]});
/// let articles = parse_payload(&payload, &source, chrono::Utc::now(), false).unwrap();
/// assert_eq!(articles.len(), 1);
/// ```
pub fn parse_payload(
    payload: &serde_json::Value,
    source: &Source,
    fetched_at: DateTime<Utc>,
    strict_published: bool,
) -> Result<Vec<Article>> {
    let fields = source.api_fields.clone().unwrap_or_default();
    let items = locate_items(payload, &fields).ok_or_else(|| {
        TalklessError::Parse(format!(
            "{}: expected an array under field '{}'",
            source.id, fields.items
        ))
    })?;

    let mut articles = Vec::with_capacity(items.len());
    for item in items {
        let title = collapse_whitespace(&str_field(item, &fields.title).unwrap_or_default());
        let url = str_field(item, &fields.url).unwrap_or_default();
        if title.is_empty() && url.is_empty() {
            tracing::debug!(source = %source.id, "skipping item without title or url");
            continue;
        }

        let published_at = match str_field(item, &fields.published_at)
            .as_deref()
            .and_then(parse_published)
        {
            Some(ts) => ts,
            None if strict_published => {
                tracing::debug!(source = %source.id, title = %title, "skipping item without published time");
                continue;
            }
            None => fetched_at,
        };

        let id = if url.is_empty() {
            ids::article_id_fallback(&source.id, &title, published_at)
        } else {
            ids::article_id(&url)
        };

        articles.push(Article {
            id,
            source_id: source.id.clone(),
            source_name: source.name.clone(),
            title,
            url,
            author: str_field(item, &fields.author).map(|a| collapse_whitespace(&a)),
            published_at,
            content: html_to_text(&str_field(item, &fields.content).unwrap_or_default()),
            fetched_at,
        });
    }

    Ok(articles)
}

fn locate_items<'a>(
    payload: &'a serde_json::Value,
    fields: &ApiFieldMap,
) -> Option<&'a Vec<serde_json::Value>> {
    if fields.items.is_empty() {
        payload.as_array()
    } else {
        payload.get(&fields.items).and_then(|v| v.as_array())
    }
}

#[async_trait]
impl Fetcher for ApiFetcher {
    async fn fetch(&self, source: &Source) -> Result<Vec<Article>> {
        let credential = Self::resolve_credential(source)?;

        let mut request = self.http.get(&source.url);
        if let Some(token) = credential {
            request = request.bearer_auth(token);
        }

        let response = request
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

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TalklessError::Parse(format!("{}: {e}", source.id)))?;

        parse_payload(&payload, source, Utc::now(), self.strict_published)
    }

    fn name(&self) -> &str {
        "api"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use talkless_core::SourceKind;

    fn source(api_fields: Option<ApiFieldMap>) -> Source {
        Source {
            id: "wire".into(),
            name: "Wire".into(),
            kind: SourceKind::Api,
            url: "https://example.com/api/articles".into(),
            credential_env: Some("WIRE_API_KEY".into()),
            declared_lean: None,
            enabled: true,
            requests_per_minute: 30,
            api_fields,
        }
    }

    #[test]
    fn maps_default_fields() {
        let payload = json!({"articles": [
            {"title": "One", "url": "https://example.com/1",
             "content": "<p>Body one.</p>", "published_at": "2026-03-02T10:00:00Z",
             "author": "A. Writer"},
            {"title": "Two", "url": "https://example.com/2",
             "content": "Body two.", "published_at": "2026-03-02T11:00:00Z"}
        ]});
        let articles = parse_payload(&payload, &source(None), Utc::now(), false).unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].content, "Body one.");
        assert_eq!(articles[0].author.as_deref(), Some("A. Writer"));
        assert_eq!(articles[0].id, ids::article_id("https://example.com/1"));
    }

    #[test]
    fn custom_field_map_applies() {
        let fields = ApiFieldMap {
            items: "data".into(),
            title: "headline".into(),
            url: "permalink".into(),
            content: "body".into(),
            published_at: "date".into(),
            author: "byline".into(),
        };
        let payload = json!({"data": [
            {"headline": "Custom", "permalink": "https://example.com/c",
             "body": "Mapped body.", "date": "2026-03-02T12:00:00Z"}
        ]});
        let articles =
            parse_payload(&payload, &source(Some(fields)), Utc::now(), false).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Custom");
        assert_eq!(articles[0].content, "Mapped body.");
    }

    #[test]
    fn root_array_when_items_field_empty() {
        let fields = ApiFieldMap {
            items: String::new(),
            ..ApiFieldMap::default()
        };
        let payload = json!([
            {"title": "Root", "url": "https://example.com/r",
             "content": "Body.", "published_at": "2026-03-02T12:00:00Z"}
        ]);
        let articles =
            parse_payload(&payload, &source(Some(fields)), Utc::now(), false).unwrap();
        assert_eq!(articles.len(), 1);
    }

    #[test]
    fn missing_items_field_is_a_parse_error() {
        let payload = json!({"unexpected": true});
        let err = parse_payload(&payload, &source(None), Utc::now(), false).unwrap_err();
        assert!(matches!(err, TalklessError::Parse(_)));
    }

    #[test]
    fn unparseable_items_are_skipped_not_fatal() {
        let payload = json!({"articles": [
            {"content": "no title or url"},
            {"title": "Good", "url": "https://example.com/g",
             "content": "Body.", "published_at": "2026-03-02T12:00:00Z"}
        ]});
        let articles = parse_payload(&payload, &source(None), Utc::now(), false).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Good");
    }

    #[test]
    fn missing_credential_is_an_error() {
        std::env::remove_var("WIRE_API_KEY");
        let err = ApiFetcher::resolve_credential(&source(None)).unwrap_err();
        assert!(err.to_string().contains("WIRE_API_KEY"));
    }

    #[test]
    fn no_credential_env_means_unauthenticated() {
        let mut src = source(None);
        src.credential_env = None;
        assert!(ApiFetcher::resolve_credential(&src).unwrap().is_none());
    }
}
